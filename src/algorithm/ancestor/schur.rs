//! Scatter of the Schur complement update into locally owned blocks
//!
//! ```text
//! for each block row i of the received L piece (diagonal excluded):
//!   for each block column j of the received U piece:
//!     A(i, j) -= L(i, k) · U(k, j)
//! ```
//!
//! `i % nprow == myrow` and `j % npcol == mycol` by construction of the
//! pieces, so every target block is owned by the calling process: in L
//! column `j` when `i >= j`, in U row `i` otherwise.

use crate::algorithm::kernels::DenseKernels;
use crate::algorithm::layout::SupernodeLayout;
use crate::algorithm::panel::{ColumnView, LuPanels, RowView};
use crate::error::{Error, Result};

/// Check that every target block of node `k`'s update exists.
pub(crate) fn check_targets(
    layout: &SupernodeLayout,
    k: usize,
    l_blocks: &[usize],
    u_blocks: &[usize],
) -> Result<()> {
    for &i in l_blocks.iter().filter(|&&i| i != k) {
        for &j in u_blocks {
            if !layout.has_block(i, j) {
                return Err(Error::topology(
                    k,
                    format!("update target block ({i}, {j}) missing from the fill pattern"),
                ));
            }
        }
    }
    Ok(())
}

/// Apply node `k`'s update to `panels`. Returns the number of target
/// blocks updated.
pub(crate) fn scatter_update<K: DenseKernels + ?Sized>(
    kernels: &K,
    k: usize,
    l: &ColumnView<'_, &[f64]>,
    u: &RowView<'_, &[f64]>,
    panels: &mut LuPanels,
) -> Result<usize> {
    let mut updated = 0;
    for i in l.index().gids().filter(|&i| i != k) {
        let Some(a) = l.block(i) else { continue };
        for j in u.index().gids() {
            let Some(b) = u.block(j) else { continue };
            let missing =
                || Error::topology(k, format!("update target block ({i}, {j}) not stored"));
            if i >= j {
                let panel = panels.l_panel_mut(j)?;
                let mut view = panel.column_view_mut().ok_or_else(missing)?;
                let c = view.block_mut(i).ok_or_else(missing)?;
                kernels.trailing_update(a, b, c)?;
            } else {
                let panel = panels.u_panel_mut(i)?;
                let mut view = panel.row_view_mut().ok_or_else(missing)?;
                let c = view.block_mut(j).ok_or_else(missing)?;
                kernels.trailing_update(a, b, c)?;
            }
            updated += 1;
        }
    }
    tracing::trace!(k, updated, "schur update scattered");
    Ok(updated)
}
