//! Common test utilities
#![allow(dead_code)]

use std::time::Duration;

use lu3d::algorithm::SupernodeLayout;
use lu3d::runtime::local::LocalConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Backend configuration with a short collective timeout so a hung test
/// fails instead of stalling the suite
pub fn quick_config() -> LocalConfig {
    LocalConfig::with_timeout(Duration::from_secs(20))
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Whether global entry `(row, col)` lies in a structurally present block
pub fn in_pattern(layout: &SupernodeLayout, row: usize, col: usize) -> bool {
    match (layout.supernode_of(row), layout.supernode_of(col)) {
        (Some(bi), Some(bj)) => layout.has_block(bi, bj),
        _ => false,
    }
}

/// Random diagonally dominant matrix (column-major `n × n`) with entries
/// only inside the block pattern of `layout`
pub fn random_matrix(layout: &SupernodeLayout, seed: u64) -> Vec<f64> {
    let n = layout.n();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut a = vec![0.0; n * n];
    for c in 0..n {
        for r in 0..n {
            if in_pattern(layout, r, c) {
                a[c * n + r] = rng.random_range(-1.0..1.0);
            }
        }
        a[c * n + c] += 2.0 * n as f64;
    }
    a
}

/// Split `a` into `nlayers` partial contributions that sum back to `a`.
///
/// Layers `1..nlayers` get random values on the pattern; layer 0 holds the
/// remainder.
pub fn split_into_layers(
    layout: &SupernodeLayout,
    a: &[f64],
    nlayers: usize,
    seed: u64,
) -> Vec<Vec<f64>> {
    let n = layout.n();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut parts = vec![a.to_vec()];
    for _ in 1..nlayers {
        let mut part = vec![0.0; n * n];
        for c in 0..n {
            for r in 0..n {
                if in_pattern(layout, r, c) {
                    part[c * n + r] = rng.random_range(-0.5..0.5);
                }
            }
        }
        for (p0, p) in parts[0].iter_mut().zip(&part) {
            *p0 -= *p;
        }
        parts.push(part);
    }
    parts
}

/// Unpivoted dense LU in place (column-major `n × n`): unit lower factor
/// below the diagonal, upper factor on and above it
pub fn dense_lu(a: &mut [f64], n: usize) {
    for k in 0..n {
        let pivot = a[k * n + k];
        for r in (k + 1)..n {
            a[k * n + r] /= pivot;
        }
        for c in (k + 1)..n {
            let ukc = a[c * n + k];
            for r in (k + 1)..n {
                a[c * n + r] -= a[k * n + r] * ukc;
            }
        }
    }
}

/// Entries `(row, col, value)` gathered from several processes into one
/// dense column-major matrix, plus the number of entries seen
pub fn assemble(
    n: usize,
    entries: impl IntoIterator<Item = (usize, usize, f64)>,
) -> (Vec<f64>, usize) {
    let mut out = vec![0.0; n * n];
    let mut count = 0;
    for (r, c, v) in entries {
        out[c * n + r] = v;
        count += 1;
    }
    (out, count)
}

/// Number of entries inside the block pattern of `layout`
pub fn pattern_size(layout: &SupernodeLayout) -> usize {
    let n = layout.n();
    (0..n)
        .flat_map(|c| (0..n).map(move |r| (r, c)))
        .filter(|&(r, c)| in_pattern(layout, r, c))
        .count()
}
