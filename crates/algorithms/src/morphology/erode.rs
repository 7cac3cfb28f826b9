//! Binary erosion

use vbet_core::raster::Raster;
use vbet_core::Result;

use super::dilate::{binary_filter, Outside};
use super::element::StructuringElement;

/// Erode a 0/1 mask. Cells beyond the grid count as foreground, so the
/// grid edge does not eat into regions that touch it.
pub fn erode(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    binary_filter(mask, element, false, Outside::Foreground)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erode_removes_thin_line() {
        let mut mask: Raster<u8> = Raster::new(5, 5);
        for col in 0..5 {
            mask.set(2, col, 1).unwrap();
        }
        let out = erode(&mask, &StructuringElement::Cross(1)).unwrap();
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_erode_keeps_full_grid() {
        let mask: Raster<u8> = Raster::filled(4, 4, 1);
        let out = erode(&mask, &StructuringElement::Disk(2)).unwrap();
        assert!(out.data().iter().all(|&v| v == 1));
    }
}
