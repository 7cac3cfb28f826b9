//! Binary closing (dilation followed by erosion)
//!
//! Bridges gaps and fills notches narrower than the structuring element
//! while leaving larger background regions in place. Closing is extensive
//! (never removes a set cell) and increasing (a subset closes to a subset).

use vbet_core::raster::Raster;
use vbet_core::{Algorithm, Error, Result};

use super::dilate::dilate;
use super::element::StructuringElement;
use super::erode::erode;

/// Parameters for closing
#[derive(Debug, Clone, Default)]
pub struct ClosingParams {
    pub element: StructuringElement,
}

/// Closing algorithm
#[derive(Debug, Clone, Default)]
pub struct Closing;

impl Algorithm for Closing {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = ClosingParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Closing"
    }

    fn description(&self) -> &'static str {
        "Binary closing (dilation then erosion) to bridge small gaps"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        closing(&input, &params.element)
    }
}

/// Close a 0/1 mask with the given element
pub fn closing(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    let dilated = dilate(mask, element)?;
    erode(&dilated, element)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars_with_gap() -> Raster<u8> {
        // Two horizontal bars separated by a one-cell gap at column 4
        let mut mask: Raster<u8> = Raster::new(7, 9);
        for row in 2..5 {
            for col in (0..9).filter(|&c| c != 4) {
                mask.set(row, col, 1).unwrap();
            }
        }
        mask
    }

    #[test]
    fn test_closing_bridges_gap() {
        let closed = closing(&bars_with_gap(), &StructuringElement::Disk(1)).unwrap();
        assert_eq!(closed.get(3, 4).unwrap(), 1);
        // Far background is untouched
        assert_eq!(closed.get(0, 0).unwrap(), 0);
        assert_eq!(closed.get(6, 8).unwrap(), 0);
    }

    #[test]
    fn test_closing_is_extensive_and_increasing() {
        let big = bars_with_gap();
        let mut small = big.clone();
        for col in 0..4 {
            small.set(3, col, 0).unwrap();
        }

        let element = StructuringElement::Disk(2);
        let big_closed = closing(&big, &element).unwrap();
        let small_closed = closing(&small, &element).unwrap();

        for ((&orig, &cb), &cs) in big.data().iter().zip(big_closed.data().iter()).zip(small_closed.data().iter()) {
            assert!(cb >= orig);
            assert!(cb >= cs);
        }
    }

    #[test]
    fn test_algorithm_trait() {
        let params = ClosingParams {
            element: StructuringElement::Disk(1),
        };
        let closed = Closing.execute(bars_with_gap(), params).unwrap();
        assert_eq!(closed.get(3, 4).unwrap(), 1);
    }
}
