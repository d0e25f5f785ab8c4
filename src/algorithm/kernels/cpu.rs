//! CPU implementation of the dense block kernels

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{BlockMut, BlockRef, DenseKernels, DiagFactorStatus};
use crate::error::{Error, Result};

/// Reference CPU kernels.
///
/// The trailing update runs column-parallel under the `rayon` feature once
/// the product is large enough; each output column is computed by exactly
/// one task in a fixed order, so results are identical with or without
/// threads.
#[derive(Debug, Clone)]
pub struct CpuKernels {
    /// Minimum `m * n * k` before the trailing update goes parallel
    pub parallel_threshold: usize,
    /// Minimum number of columns handed to one rayon task
    pub min_len: usize,
}

impl Default for CpuKernels {
    fn default() -> Self {
        Self {
            parallel_threshold: 32 * 32 * 32,
            min_len: 4,
        }
    }
}

impl CpuKernels {
    /// Kernels that never spawn parallel work
    pub fn sequential() -> Self {
        Self {
            parallel_threshold: usize::MAX,
            ..Self::default()
        }
    }
}

/// One column of `c -= a * b`: `c_col[..m] -= a · b[:, j]`
#[inline]
fn update_column(a: &BlockRef<'_>, b_col: &[f64], c_col: &mut [f64]) {
    let m = a.rows();
    for (p, &bpj) in b_col.iter().enumerate() {
        if bpj == 0.0 {
            continue;
        }
        let a_col = a.col(p);
        for (c, &aip) in c_col[..m].iter_mut().zip(a_col) {
            *c -= aip * bpj;
        }
    }
}

impl DenseKernels for CpuKernels {
    fn diagonal_factor(
        &self,
        mut block: BlockMut<'_>,
        threshold: f64,
        replace_tiny: bool,
    ) -> Result<DiagFactorStatus> {
        let n = block.rows();
        if block.cols() != n {
            return Err(Error::shape_mismatch(&[n, n], &[block.rows(), block.cols()]));
        }

        let mut status = DiagFactorStatus::default();
        for col in 0..n {
            let mut pivot = block.get(col, col);
            if pivot.abs() < threshold || pivot == 0.0 {
                status.first_tiny.get_or_insert(col);
                status.tiny_count += 1;
                if replace_tiny && threshold > 0.0 {
                    pivot = if pivot < 0.0 { -threshold } else { threshold };
                    block.set(col, col, pivot);
                    status.replaced += 1;
                }
            }
            if pivot == 0.0 {
                continue;
            }

            // Multipliers (L column)
            for row in (col + 1)..n {
                let v = block.get(row, col) / pivot;
                block.set(row, col, v);
            }

            // Rank-1 update of the trailing block
            for j in (col + 1)..n {
                let ucj = block.get(col, j);
                if ucj == 0.0 {
                    continue;
                }
                for row in (col + 1)..n {
                    let v = block.get(row, j) - block.get(row, col) * ucj;
                    block.set(row, j, v);
                }
            }
        }
        Ok(status)
    }

    fn solve_lower_unit(&self, l: BlockRef<'_>, mut x: BlockMut<'_>) -> Result<()> {
        let n = l.rows();
        if l.cols() != n || x.rows() != n {
            return Err(Error::shape_mismatch(&[n, n, n], &[l.rows(), l.cols(), x.rows()]));
        }
        for c in 0..x.cols() {
            for p in 0..n {
                let xp = x.get(p, c);
                if xp == 0.0 {
                    continue;
                }
                for r in (p + 1)..n {
                    let v = x.get(r, c) - l.get(r, p) * xp;
                    x.set(r, c, v);
                }
            }
        }
        Ok(())
    }

    fn solve_upper(&self, u: BlockRef<'_>, mut x: BlockMut<'_>) -> Result<()> {
        let n = u.rows();
        if u.cols() != n || x.cols() != n {
            return Err(Error::shape_mismatch(&[n, n, n], &[u.rows(), u.cols(), x.cols()]));
        }
        let m = x.rows();
        for j in 0..n {
            for p in 0..j {
                let upj = u.get(p, j);
                if upj == 0.0 {
                    continue;
                }
                for r in 0..m {
                    let v = x.get(r, j) - x.get(r, p) * upj;
                    x.set(r, j, v);
                }
            }
            let d = u.get(j, j);
            if d != 0.0 {
                for r in 0..m {
                    let v = x.get(r, j) / d;
                    x.set(r, j, v);
                }
            }
        }
        Ok(())
    }

    fn trailing_update(&self, a: BlockRef<'_>, b: BlockRef<'_>, mut c: BlockMut<'_>) -> Result<()> {
        let (m, k, n) = (a.rows(), a.cols(), b.cols());
        if b.rows() != k || c.rows() != m || c.cols() != n {
            return Err(Error::shape_mismatch(
                &[m, k, k, n, m, n],
                &[a.rows(), a.cols(), b.rows(), b.cols(), c.rows(), c.cols()],
            ));
        }
        if m == 0 || n == 0 || k == 0 {
            return Ok(());
        }

        let ldc = c.ld();
        // Only the first (n - 1) * ldc + m elements belong to the block
        let span = (n - 1) * ldc + m;
        let data = &mut c.data_mut()[..span];

        #[cfg(feature = "rayon")]
        {
            if m.saturating_mul(n).saturating_mul(k) >= self.parallel_threshold {
                data.par_chunks_mut(ldc)
                    .with_min_len(self.min_len)
                    .enumerate()
                    .for_each(|(j, c_col)| update_column(&a, b.col(j), c_col));
                return Ok(());
            }
        }

        for (j, c_col) in data.chunks_mut(ldc).enumerate() {
            update_column(&a, b.col(j), c_col);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matmul(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
        let mut c = vec![0.0; m * n];
        for j in 0..n {
            for p in 0..k {
                for i in 0..m {
                    c[j * m + i] += a[p * m + i] * b[j * k + p];
                }
            }
        }
        c
    }

    #[test]
    fn test_diagonal_factor_reconstructs() {
        // Column-major 3x3, diagonally dominant
        let orig = vec![4.0, 1.0, 2.0, 1.0, 5.0, 1.0, 0.5, 2.0, 6.0];
        let mut lu = orig.clone();
        let status = CpuKernels::default()
            .diagonal_factor(BlockMut::new(&mut lu, 3, 3, 3).unwrap(), 1e-12, false)
            .unwrap();
        assert!(status.is_clean());

        let mut l = vec![0.0; 9];
        let mut u = vec![0.0; 9];
        for j in 0..3 {
            for i in 0..3 {
                if i > j {
                    l[j * 3 + i] = lu[j * 3 + i];
                } else {
                    u[j * 3 + i] = lu[j * 3 + i];
                }
            }
            l[j * 3 + j] = 1.0;
        }
        let prod = matmul(&l, &u, 3, 3, 3);
        for (got, want) in prod.iter().zip(&orig) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_pivot_is_reported_not_fatal() {
        let mut block = vec![0.0, 1.0, 1.0, 1.0];
        let status = CpuKernels::default()
            .diagonal_factor(BlockMut::new(&mut block, 2, 2, 2).unwrap(), 1e-12, false)
            .unwrap();
        assert_eq!(status.first_tiny, Some(0));
        assert_eq!(status.tiny_count, 1);
        // Column skipped: multiplier left unscaled
        assert_eq!(block[1], 1.0);
        assert!(block.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_tiny_pivot_replacement() {
        let mut block = vec![-1e-20, 0.0, 0.0, 3.0];
        let status = CpuKernels::default()
            .diagonal_factor(BlockMut::new(&mut block, 2, 2, 2).unwrap(), 1e-8, true)
            .unwrap();
        assert_eq!(status.replaced, 1);
        assert_eq!(block[0], -1e-8);
    }

    #[test]
    fn test_triangular_solves() {
        // l = [1 0; 2 1], u = [2 1; 0 4] packed in one block
        let packed = vec![2.0, 2.0, 1.0, 4.0];
        let factor = BlockRef::new(&packed, 2, 2, 2).unwrap();
        let k = CpuKernels::default();

        // x = l^-1 * [1; 4] = [1; 2]
        let mut x = vec![1.0, 4.0];
        k.solve_lower_unit(factor, BlockMut::new(&mut x, 2, 2, 1).unwrap())
            .unwrap();
        assert_eq!(x, vec![1.0, 2.0]);

        // y = [2 9] * u^-1 = [1 2]
        let mut y = vec![2.0, 9.0];
        k.solve_upper(factor, BlockMut::new(&mut y, 1, 1, 2).unwrap())
            .unwrap();
        assert_eq!(y, vec![1.0, 2.0]);
    }

    #[test]
    fn test_trailing_update_respects_leading_dimension() {
        let a = vec![1.0, 2.0, 3.0, 4.0]; // 2x2
        let b = vec![1.0, 0.0, 0.0, 1.0]; // identity
        // c is a 2x2 block inside a 3-row buffer
        let mut c = vec![10.0, 10.0, 99.0, 10.0, 10.0, 99.0];
        CpuKernels::default()
            .trailing_update(
                BlockRef::new(&a, 2, 2, 2).unwrap(),
                BlockRef::new(&b, 2, 2, 2).unwrap(),
                BlockMut::new(&mut c, 3, 2, 2).unwrap(),
            )
            .unwrap();
        assert_eq!(c, vec![9.0, 8.0, 99.0, 7.0, 6.0, 99.0]);
    }

    #[test]
    fn test_trailing_update_parallel_matches_sequential() {
        let (m, k, n) = (40, 35, 50);
        let a: Vec<f64> = (0..m * k).map(|i| ((i * 7) % 13) as f64 - 6.0).collect();
        let b: Vec<f64> = (0..k * n).map(|i| ((i * 5) % 11) as f64 * 0.25).collect();
        let c0: Vec<f64> = (0..m * n).map(|i| i as f64).collect();

        let run = |kernels: CpuKernels| {
            let mut c = c0.clone();
            kernels
                .trailing_update(
                    BlockRef::new(&a, m, m, k).unwrap(),
                    BlockRef::new(&b, k, k, n).unwrap(),
                    BlockMut::new(&mut c, m, m, n).unwrap(),
                )
                .unwrap();
            c
        };
        let par = run(CpuKernels {
            parallel_threshold: 0,
            min_len: 1,
        });
        let seq = run(CpuKernels::sequential());
        assert_eq!(par, seq);

        let expected = matmul(&a, &b, m, k, n);
        for (i, v) in seq.iter().enumerate() {
            assert!((v - (c0[i] - expected[i])).abs() < 1e-9);
        }
    }

    #[test]
    fn test_shape_checks() {
        let a = vec![0.0; 4];
        let mut c = vec![0.0; 4];
        let r = CpuKernels::default().trailing_update(
            BlockRef::new(&a, 2, 2, 2).unwrap(),
            BlockRef::new(&a, 1, 1, 2).unwrap(),
            BlockMut::new(&mut c, 2, 2, 2).unwrap(),
        );
        assert!(matches!(r, Err(Error::ShapeMismatch { .. })));
    }
}
