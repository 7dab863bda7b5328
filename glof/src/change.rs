//! Lake expansion between two observation dates.

use crate::{error::InputError, index::SpectralIndexGrid, C};
use raster::{Raster, RasterError};
use rayon::prelude::*;

/// Pixels that turned into water, plus the raw index difference.
#[derive(Debug)]
pub struct ChangeMask {
    expansion: Vec<bool>,

    /// `later - earlier`, aligned with both inputs.
    difference: Raster,
}

impl ChangeMask {
    /// Returns the expansion flags in row-major order.
    pub fn expansion(&self) -> &[bool] {
        &self.expansion
    }

    pub fn difference(&self) -> &Raster {
        &self.difference
    }

    pub fn is_expansion(&self, (col, row): (usize, usize)) -> bool {
        let width = self.difference.width();
        col < width && self.expansion.get(row * width + col).copied().unwrap_or(false)
    }

    /// Returns the number of newly flooded pixels.
    pub fn expansion_count(&self) -> usize {
        self.expansion.iter().filter(|&&e| e).count()
    }

    /// Returns the mask as a 0/1 grid aligned with the difference.
    pub fn to_raster(&self) -> Result<Raster, RasterError> {
        let samples = self
            .expansion
            .iter()
            .map(|&e| if e { 1.0 } else { 0.0 })
            .collect();
        self.difference.derive(samples)
    }

    /// The georeferencing every consumer of this mask must match.
    pub fn grid(&self) -> &Raster {
        &self.difference
    }
}

/// Fails with [InputError::GridMisaligned] unless `a` and `b` share
/// dimensions and transform.
pub fn ensure_aligned(a: &Raster, b: &Raster) -> Result<(), InputError> {
    if a.is_aligned(b) {
        Ok(())
    } else {
        Err(InputError::GridMisaligned {
            left: a.dimensions(),
            right: b.dimensions(),
        })
    }
}

/// Flags pixels where `later > threshold && earlier <= threshold`.
pub fn detect_expansion(
    earlier: &SpectralIndexGrid,
    later: &SpectralIndexGrid,
    threshold: C,
) -> Result<ChangeMask, InputError> {
    ensure_aligned(earlier.grid(), later.grid())?;
    let (before, after) = (earlier.values(), later.values());
    let (expansion, difference): (Vec<bool>, Vec<C>) = before
        .par_iter()
        .zip(after.par_iter())
        .map(|(&b, &a)| (expands(b, a, threshold), a - b))
        .unzip();
    let difference = earlier
        .grid()
        .derive(difference)
        .map_err(|_| InputError::GridMisaligned {
            left: earlier.grid().dimensions(),
            right: later.grid().dimensions(),
        })?;
    Ok(ChangeMask {
        expansion,
        difference,
    })
}

/// NaN fails both comparisons, so a NaN on either date never counts
/// as expansion.
fn expands(earlier: C, later: C, threshold: C) -> bool {
    later > threshold && earlier <= threshold
}
