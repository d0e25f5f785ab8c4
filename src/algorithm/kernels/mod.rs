//! Dense block kernels used by the panel pipeline
//!
//! All blocks are column-major: element `(r, c)` of a block with leading
//! dimension `ld` lives at `data[c * ld + r]`.

mod cpu;

pub use cpu::CpuKernels;

use crate::error::{Error, Result};

/// Minimum slice length for a `rows × cols` block with leading dimension `ld`
fn required_len(ld: usize, rows: usize, cols: usize) -> usize {
    if rows == 0 || cols == 0 {
        0
    } else {
        (cols - 1) * ld + rows
    }
}

fn check_block(data_len: usize, ld: usize, rows: usize, cols: usize) -> Result<()> {
    if ld < rows || data_len < required_len(ld, rows, cols) {
        return Err(Error::shape_mismatch(
            &[rows, cols, ld],
            &[data_len],
        ));
    }
    Ok(())
}

/// Read-only column-major block
#[derive(Debug, Clone, Copy)]
pub struct BlockRef<'a> {
    data: &'a [f64],
    ld: usize,
    rows: usize,
    cols: usize,
}

impl<'a> BlockRef<'a> {
    /// Wrap `data` as a `rows × cols` block with leading dimension `ld`
    pub fn new(data: &'a [f64], ld: usize, rows: usize, cols: usize) -> Result<Self> {
        check_block(data.len(), ld, rows, cols)?;
        Ok(Self { data, ld, rows, cols })
    }

    /// Caller guarantees the geometry fits `data`
    pub(crate) fn from_parts(data: &'a [f64], ld: usize, rows: usize, cols: usize) -> Self {
        debug_assert!(check_block(data.len(), ld, rows, cols).is_ok());
        Self { data, ld, rows, cols }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Leading dimension
    pub fn ld(&self) -> usize {
        self.ld
    }

    /// Element `(r, c)`
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[c * self.ld + r]
    }

    /// Column `c` (only its first `rows` entries)
    #[inline]
    pub fn col(&self, c: usize) -> &'a [f64] {
        let start = c * self.ld;
        &self.data[start..start + self.rows]
    }
}

/// Mutable column-major block
#[derive(Debug)]
pub struct BlockMut<'a> {
    data: &'a mut [f64],
    ld: usize,
    rows: usize,
    cols: usize,
}

impl<'a> BlockMut<'a> {
    /// Wrap `data` as a `rows × cols` block with leading dimension `ld`
    pub fn new(data: &'a mut [f64], ld: usize, rows: usize, cols: usize) -> Result<Self> {
        check_block(data.len(), ld, rows, cols)?;
        Ok(Self { data, ld, rows, cols })
    }

    pub(crate) fn from_parts(data: &'a mut [f64], ld: usize, rows: usize, cols: usize) -> Self {
        debug_assert!(check_block(data.len(), ld, rows, cols).is_ok());
        Self { data, ld, rows, cols }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Leading dimension
    pub fn ld(&self) -> usize {
        self.ld
    }

    /// Element `(r, c)`
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[c * self.ld + r]
    }

    /// Set element `(r, c)`
    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: f64) {
        self.data[c * self.ld + r] = value;
    }

    /// Read-only reborrow
    pub fn view(&self) -> BlockRef<'_> {
        BlockRef::from_parts(&*self.data, self.ld, self.rows, self.cols)
    }

    /// Underlying storage, starting at element `(0, 0)`
    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut *self.data
    }
}

/// Outcome of factoring one diagonal block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagFactorStatus {
    /// Block-local column of the first pivot below the threshold
    pub first_tiny: Option<usize>,
    /// Number of pivots below the threshold
    pub tiny_count: usize,
    /// Number of tiny pivots that were replaced by `±threshold`
    pub replaced: usize,
}

impl DiagFactorStatus {
    /// Whether every pivot cleared the threshold
    pub fn is_clean(&self) -> bool {
        self.tiny_count == 0
    }
}

/// Dense kernels for one supernode step.
///
/// The pipeline treats these as black boxes; implementations only need to
/// agree on the in-place factor layout:
///
/// ```text
/// diagonal block after diagonal_factor:
///   [ u00 u01 u02 ]
///   [ l10 u11 u12 ]     L unit lower (implicit ones), U upper
///   [ l20 l21 u22 ]
/// ```
///
/// # Implementation Requirements
///
/// Results must not depend on thread count: every replica of a panel is
/// expected to be bit-identical after the un-fold broadcast, and tests
/// compare panels across layers exactly.
pub trait DenseKernels: Sync {
    /// Factor a square diagonal block in place without pivoting.
    ///
    /// A pivot with `|p| < threshold` (or exactly zero) is recorded; when
    /// `replace_tiny` is set it is replaced by `threshold` carrying the sign
    /// of `p` (positive for zero). A pivot left at zero skips the scaling
    /// of its column, leaving that column of L unscaled.
    fn diagonal_factor(
        &self,
        block: BlockMut<'_>,
        threshold: f64,
        replace_tiny: bool,
    ) -> Result<DiagFactorStatus>;

    /// `x := l⁻¹ · x` with `l` unit lower triangular (only its strict lower
    /// part is read).
    fn solve_lower_unit(&self, l: BlockRef<'_>, x: BlockMut<'_>) -> Result<()>;

    /// `x := x · u⁻¹` with `u` upper triangular. A zero on the diagonal of
    /// `u` leaves the matching column of `x` unscaled.
    fn solve_upper(&self, u: BlockRef<'_>, x: BlockMut<'_>) -> Result<()>;

    /// `c := c - a · b`
    fn trailing_update(&self, a: BlockRef<'_>, b: BlockRef<'_>, c: BlockMut<'_>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_geometry_checked() {
        let data = vec![0.0; 10];
        assert!(BlockRef::new(&data, 4, 4, 2).is_ok());
        assert!(BlockRef::new(&data, 4, 4, 3).is_err());
        assert!(BlockRef::new(&data, 2, 3, 1).is_err());
        // (3 - 1) * 4 + 2 = 10 fits
        assert!(BlockRef::new(&data, 4, 2, 3).is_ok());
        assert!(BlockRef::new(&[], 0, 0, 5).is_ok());
    }

    #[test]
    fn test_block_access() {
        let mut data: Vec<f64> = (0..6).map(|v| v as f64).collect();
        let mut b = BlockMut::new(&mut data, 3, 2, 2).unwrap();
        assert_eq!(b.get(1, 1), 4.0);
        b.set(0, 1, -1.0);
        assert_eq!(b.view().col(1), &[-1.0, 4.0]);
        assert_eq!(data[3], -1.0);
    }
}
