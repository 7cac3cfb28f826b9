//! Structuring element shapes

use vbet_core::{Error, Result};

/// Shape of a structuring element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuringElement {
    /// Square of side `2 * radius + 1`
    Square(usize),
    /// Plus-shaped element
    Cross(usize),
    /// Cells whose center lies within `radius` cells of the origin
    Disk(usize),
}

impl Default for StructuringElement {
    fn default() -> Self {
        StructuringElement::Disk(1)
    }
}

impl StructuringElement {
    pub fn validate(&self) -> Result<()> {
        if self.radius() == 0 {
            return Err(Error::InvalidParameter {
                name: "radius",
                value: "0".to_string(),
                reason: "structuring element radius must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn radius(&self) -> usize {
        match self {
            StructuringElement::Square(r) | StructuringElement::Cross(r) | StructuringElement::Disk(r) => *r,
        }
    }

    /// (dr, dc) offsets of the active cells, origin included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius() as isize;
        let mut offsets = Vec::new();
        for dr in -r..=r {
            for dc in -r..=r {
                let active = match self {
                    StructuringElement::Square(_) => true,
                    StructuringElement::Cross(_) => dr == 0 || dc == 0,
                    StructuringElement::Disk(_) => dr * dr + dc * dc <= r * r,
                };
                if active {
                    offsets.push((dr, dc));
                }
            }
        }
        offsets
    }
}
