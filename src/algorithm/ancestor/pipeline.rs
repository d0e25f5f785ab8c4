//! The per-node panel exchange protocol
//!
//! Every process runs the same sequence for every node and branches on
//! ownership. With `krow = k % nprow`, `kcol = k % npcol`:
//!
//! ```text
//! FOLD_REDUCE       fold group   L panel (mycol == kcol), U panel (myrow == krow)
//!                                summed onto the root, root in place
//! -- root replica only (rank_has_grid) --
//! FACTOR            diagonal owner factors in place, packs L and U factors
//! BCAST_DIAG        row comm    L factor from kcol   (myrow == krow)
//!                   col comm    U factor from krow   (mycol == kcol)
//! SOLVE             U panel := L⁻¹ U    (myrow == krow)
//!                   L panel := L U⁻¹    (mycol == kcol, off-diagonal rows)
//! BCAST_PANEL       col comm    U piece from krow    (if send count > 0)
//!                   row comm    L piece from kcol    (if send count > 0)
//! SCHUR_UPDATE      trailing update when both pieces are non-empty
//! -- all --
//! UNFOLD_BROADCAST  fold group  L and U panels from the root
//! ```

use crate::algorithm::hierarchy::FoldGroup;
use crate::algorithm::kernels::{BlockRef, DenseKernels};
use crate::algorithm::layout::SupernodeLayout;
use crate::algorithm::panel::{ColumnView, LuPanels, Panel, PanelIndex, RowView, index_len};
use crate::algorithm::scratch::{DiagFactorBufs, PanelRecvBuffers};
use crate::algorithm::topology::EliminationTopology;
use crate::error::{Error, Result};
use crate::grid::ProcessGrid3D;
use crate::runtime::{Communicator, ReduceBuffer};

use super::observer::{FactorObserver, StateEvent};
use super::schur;
use super::types::{
    FactorOptions, FactorStatus, ProtocolState, StateAction, TagSpace, TrailingUpdate,
};

/// Broadcast sizes of one panel piece: `(index length, value length)`
type Counts = (usize, usize);

/// A node resolved against the grid and fold group, validated before any
/// collective is issued for it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeStep {
    pub k0: usize,
    pub k: usize,
    pub ksupc: usize,
    pub root: usize,
    pub has_grid: bool,
    pub tag: i32,
    /// Position within its topological level (selects the scratch slot)
    pub offset: usize,
    /// L piece held by this process row
    pub l_counts: Counts,
    /// U piece held by this process column
    pub u_counts: Counts,
}

/// Shared context of one factorization call
pub(crate) struct Pipeline<'a, C: Communicator, K: DenseKernels + ?Sized> {
    pub grid: &'a ProcessGrid3D<C>,
    pub fold: FoldGroup<'a, C>,
    pub fold_level: usize,
    pub layout: &'a SupernodeLayout,
    pub kernels: &'a K,
    pub options: &'a FactorOptions,
    pub observer: &'a dyn FactorObserver,
}

fn piece_counts(layout: &SupernodeLayout, blocks: &[usize], width: usize) -> Counts {
    (index_len(blocks.len()), layout.extent(blocks) * width)
}

/// Largest L piece over all process rows and largest U piece over all
/// process columns of node `k`
fn widest_pieces(
    layout: &SupernodeLayout,
    k: usize,
    nprow: usize,
    npcol: usize,
) -> (Counts, Counts) {
    let width = layout.super_size(k);
    let widest = |a: Counts, b: Counts| (a.0.max(b.0), a.1.max(b.1));
    let l = (0..nprow)
        .map(|r| piece_counts(layout, &layout.l_piece(k, r, nprow), width))
        .fold((0, 0), widest);
    let u = (0..npcol)
        .map(|c| piece_counts(layout, &layout.u_piece(k, c, npcol), width))
        .fold((0, 0), widest);
    (l, u)
}

impl<C: Communicator, K: DenseKernels + ?Sized> Pipeline<'_, C, K> {
    /// Resolve and validate node `k0`.
    ///
    /// Checks against the replicated layout, topology, and scratch sizes come
    /// first and fail identically on every process; only the local panel
    /// shapes are checked per process.
    pub fn resolve(
        &self,
        topology: &EliminationTopology,
        k0: usize,
        offset: usize,
        panels: &LuPanels,
        recv: &PanelRecvBuffers,
        tags: &TagSpace,
    ) -> Result<NodeStep> {
        let grid = self.grid;
        let layout = self.layout;
        let k = topology.node(k0);
        if k >= layout.nsupers() {
            return Err(Error::topology(
                k,
                format!("node beyond the {} supernodes of the layout", layout.nsupers()),
            ));
        }

        let root = topology.root_rank(k0, self.fold_level)?;
        let has_grid = topology.rank_has_grid(k0, self.fold_level, self.fold.rank())?;

        if self.options.trailing_update == TrailingUpdate::Baseline {
            schur::check_targets(layout, k, layout.l_blocks(k), layout.u_blocks(k))?;
        }

        let ksupc = layout.super_size(k);
        let (l_widest, u_widest) = widest_pieces(layout, k, grid.nprow(), grid.npcol());
        let l_room = (recv.l_index.len(), recv.l_values.len());
        let u_room = (recv.u_index.len(), recv.u_values.len());
        if l_widest.0 > l_room.0 || l_widest.1 > l_room.1 {
            return Err(Error::shape_mismatch(&[l_widest.0, l_widest.1], &[l_room.0, l_room.1]));
        }
        if u_widest.0 > u_room.0 || u_widest.1 > u_room.1 {
            return Err(Error::shape_mismatch(&[u_widest.0, u_widest.1], &[u_room.0, u_room.1]));
        }

        let l_piece = layout.l_piece(k, grid.myrow(), grid.nprow());
        let u_piece = layout.u_piece(k, grid.mycol(), grid.npcol());
        let l_counts = piece_counts(layout, &l_piece, ksupc);
        let u_counts = piece_counts(layout, &u_piece, ksupc);

        if grid.mycol() == grid.kcol(k) && panels.l_panel(k)?.counts() != l_counts {
            return Err(Error::topology(
                k,
                format!(
                    "L panel holds {:?} entries, layout expects {:?}",
                    panels.l_panel(k)?.counts(),
                    l_counts
                ),
            ));
        }
        if grid.myrow() == grid.krow(k) && panels.u_panel(k)?.counts() != u_counts {
            return Err(Error::topology(
                k,
                format!(
                    "U panel holds {:?} entries, layout expects {:?}",
                    panels.u_panel(k)?.counts(),
                    u_counts
                ),
            ));
        }

        Ok(NodeStep {
            k0,
            k,
            ksupc,
            root,
            has_grid,
            tag: tags.node_tag(k0),
            offset,
            l_counts,
            u_counts,
        })
    }

    fn emit(&self, node: &NodeStep, state: ProtocolState, action: StateAction) {
        tracing::trace!(k = node.k, %state, ?action, "protocol state");
        self.observer.on_state(&StateEvent {
            k0: node.k0,
            node: node.k,
            tag: node.tag,
            state,
            action,
        });
    }

    /// Run all seven states for one node.
    pub fn process(
        &self,
        node: &NodeStep,
        panels: &mut LuPanels,
        slot: &mut DiagFactorBufs,
        recv: &mut PanelRecvBuffers,
        status: &mut FactorStatus,
    ) -> Result<()> {
        let span = tracing::debug_span!(
            "ancestor_node",
            k = node.k,
            k0 = node.k0,
            root = node.root,
            tag = node.tag,
            has_grid = node.has_grid
        );
        let _enter = span.enter();

        self.fold_reduce(node, panels)?;
        if node.has_grid {
            self.factor(node, panels, slot, status)?;
            self.bcast_diag(node, slot)?;
            self.solve(node, panels, slot)?;
            self.exchange_and_update(node, panels, recv)?;
        } else {
            for state in &ProtocolState::ALL[1..6] {
                self.emit(node, *state, StateAction::Skipped);
            }
        }
        self.unfold_broadcast(node, panels)?;

        status.nodes += 1;
        Ok(())
    }

    /// FOLD_REDUCE
    fn fold_reduce(&self, node: &NodeStep, panels: &mut LuPanels) -> Result<()> {
        let FoldGroup::Shared(comm) = self.fold else {
            tracing::debug!(k = node.k, "single replica, fold reduce skipped");
            self.emit(node, ProtocolState::FoldReduce, StateAction::Skipped);
            return Ok(());
        };

        let grid = self.grid;
        let k = node.k;
        let mut acted = false;
        if grid.mycol() == grid.kcol(k) {
            acted |= reduce_panel(comm, panels.l_panel_mut(k)?, node.has_grid, node.root)?;
        }
        if grid.myrow() == grid.krow(k) {
            acted |= reduce_panel(comm, panels.u_panel_mut(k)?, node.has_grid, node.root)?;
        }
        self.emit(node, ProtocolState::FoldReduce, action(acted));
        Ok(())
    }

    /// FACTOR
    fn factor(
        &self,
        node: &NodeStep,
        panels: &mut LuPanels,
        slot: &mut DiagFactorBufs,
        status: &mut FactorStatus,
    ) -> Result<()> {
        let k = node.k;
        if !self.grid.owns_diag(k) {
            self.emit(node, ProtocolState::Factor, StateAction::Skipped);
            return Ok(());
        }

        let ks = node.ksupc;
        let panel = panels.l_panel_mut(k)?;
        let mut view = panel
            .column_view_mut()
            .ok_or_else(|| Error::topology(k, "diagonal owner holds an empty L panel"))?;
        let block = view
            .block_mut(k)
            .ok_or_else(|| Error::topology(k, "diagonal block missing from L panel"))?;

        let diag = self.kernels.diagonal_factor(
            block,
            self.options.pivot_threshold,
            self.options.replace_tiny_pivot,
        )?;
        status.diagonal_blocks += 1;
        status.replaced_pivots += diag.replaced;
        if let Some(local) = diag.first_tiny {
            let column = self.layout.first_col(k) + local;
            tracing::warn!(
                k,
                column,
                tiny = diag.tiny_count,
                replaced = diag.replaced,
                "tiny pivot in diagonal block"
            );
            status.record_singular(column, diag.tiny_count);
        }

        let factored = view
            .block(k)
            .ok_or_else(|| Error::topology(k, "diagonal block missing from L panel"))?;
        pack_factors(factored, ks, slot);
        self.emit(node, ProtocolState::Factor, StateAction::Executed);
        Ok(())
    }

    /// BCAST_DIAG
    fn bcast_diag(&self, node: &NodeStep, slot: &mut DiagFactorBufs) -> Result<()> {
        let grid = self.grid;
        let (k, len) = (node.k, node.ksupc * node.ksupc);
        let mut acted = false;
        if grid.myrow() == grid.krow(k) {
            grid.row_comm()
                .broadcast_f64(&mut slot.block_l[..len], grid.kcol(k))?;
            acted = true;
        }
        if grid.mycol() == grid.kcol(k) {
            grid.col_comm()
                .broadcast_f64(&mut slot.block_u[..len], grid.krow(k))?;
            acted = true;
        }
        self.emit(node, ProtocolState::BcastDiag, action(acted));
        Ok(())
    }

    /// SOLVE
    fn solve(&self, node: &NodeStep, panels: &mut LuPanels, slot: &DiagFactorBufs) -> Result<()> {
        let grid = self.grid;
        let (k, ks) = (node.k, node.ksupc);
        let len = ks * ks;
        let mut acted = false;

        if grid.myrow() == grid.krow(k) {
            if let Some(mut view) = panels.u_panel_mut(k)?.row_view_mut() {
                let l = BlockRef::new(&slot.block_l[..len], ks, ks, ks)?;
                self.kernels.solve_lower_unit(l, view.all_mut())?;
                acted = true;
            }
        }
        if grid.mycol() == grid.kcol(k) {
            if let Some(mut view) = panels.l_panel_mut(k)?.column_view_mut() {
                let first = if grid.myrow() == grid.krow(k) { ks } else { 0 };
                let x = view.rows_from_mut(first);
                if x.rows() > 0 {
                    let u = BlockRef::new(&slot.block_u[..len], ks, ks, ks)?;
                    self.kernels.solve_upper(u, x)?;
                    acted = true;
                }
            }
        }
        self.emit(node, ProtocolState::Solve, action(acted));
        Ok(())
    }

    /// BCAST_PANEL and SCHUR_UPDATE.
    ///
    /// The panels of `k` are moved out of the store while the update runs so
    /// the store can be borrowed mutably for the targets; they are put back
    /// before returning, also on error.
    fn exchange_and_update(
        &self,
        node: &NodeStep,
        panels: &mut LuPanels,
        recv: &mut PanelRecvBuffers,
    ) -> Result<()> {
        let grid = self.grid;
        let k = node.k;
        let mut own_l = if grid.mycol() == grid.kcol(k) && node.l_counts.0 > 0 {
            Some(panels.take_l(k)?)
        } else {
            None
        };
        let mut own_u = if grid.myrow() == grid.krow(k) && node.u_counts.0 > 0 {
            match panels.take_u(k) {
                Ok(p) => Some(p),
                Err(e) => {
                    if let Some(p) = own_l.take() {
                        panels.restore_l(k, p)?;
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        let outcome = self.bcast_and_scatter(node, panels, recv, own_l.as_mut(), own_u.as_mut());

        if let Some(p) = own_l {
            panels.restore_l(k, p)?;
        }
        if let Some(p) = own_u {
            panels.restore_u(k, p)?;
        }
        outcome
    }

    fn bcast_and_scatter(
        &self,
        node: &NodeStep,
        panels: &mut LuPanels,
        recv: &mut PanelRecvBuffers,
        mut own_l: Option<&mut Panel>,
        mut own_u: Option<&mut Panel>,
    ) -> Result<()> {
        let grid = self.grid;
        let k = node.k;
        let (l_idx, l_val) = node.l_counts;
        let (u_idx, u_val) = node.u_counts;

        if u_idx > 0 {
            let comm = grid.col_comm();
            match own_u.as_deref_mut() {
                Some(p) => {
                    comm.broadcast_i64(p.index_mut(), grid.krow(k))?;
                    comm.broadcast_f64(p.values_mut(), grid.krow(k))?;
                }
                None => {
                    comm.broadcast_i64(&mut recv.u_index[..u_idx], grid.krow(k))?;
                    comm.broadcast_f64(&mut recv.u_values[..u_val], grid.krow(k))?;
                }
            }
        } else {
            tracing::debug!(k, "U piece has no dependents, broadcast skipped");
        }
        if l_idx > 0 {
            let comm = grid.row_comm();
            match own_l.as_deref_mut() {
                Some(p) => {
                    comm.broadcast_i64(p.index_mut(), grid.kcol(k))?;
                    comm.broadcast_f64(p.values_mut(), grid.kcol(k))?;
                }
                None => {
                    comm.broadcast_i64(&mut recv.l_index[..l_idx], grid.kcol(k))?;
                    comm.broadcast_f64(&mut recv.l_values[..l_val], grid.kcol(k))?;
                }
            }
        } else {
            tracing::debug!(k, "L piece has no dependents, broadcast skipped");
        }
        self.emit(node, ProtocolState::BcastPanel, action(l_idx > 0 || u_idx > 0));

        if self.options.trailing_update == TrailingUpdate::Deferred || l_idx == 0 || u_idx == 0 {
            self.emit(node, ProtocolState::SchurUpdate, StateAction::Skipped);
            return Ok(());
        }

        let (l_index, l_values) = match own_l.as_deref() {
            Some(p) => (p.index(), p.values()),
            None => (&recv.l_index[..l_idx], &recv.l_values[..l_val]),
        };
        let (u_index, u_values) = match own_u.as_deref() {
            Some(p) => (p.index(), p.values()),
            None => (&recv.u_index[..u_idx], &recv.u_values[..u_val]),
        };
        let l_view = ColumnView::new(PanelIndex::parse(l_index)?, l_values)?;
        let u_view = RowView::new(PanelIndex::parse(u_index)?, u_values)?;
        let updated = schur::scatter_update(self.kernels, k, &l_view, &u_view, panels)?;

        self.emit(node, ProtocolState::SchurUpdate, action(updated > 0));
        Ok(())
    }

    /// UNFOLD_BROADCAST
    fn unfold_broadcast(&self, node: &NodeStep, panels: &mut LuPanels) -> Result<()> {
        let FoldGroup::Shared(comm) = self.fold else {
            self.emit(node, ProtocolState::UnfoldBroadcast, StateAction::Skipped);
            return Ok(());
        };

        let grid = self.grid;
        let k = node.k;
        let mut acted = false;
        if grid.mycol() == grid.kcol(k) {
            let values = panels.l_panel_mut(k)?.values_mut();
            if !values.is_empty() {
                comm.broadcast_f64(values, node.root)?;
                acted = true;
            }
        }
        if grid.myrow() == grid.krow(k) {
            let values = panels.u_panel_mut(k)?.values_mut();
            if !values.is_empty() {
                comm.broadcast_f64(values, node.root)?;
                acted = true;
            }
        }
        self.emit(node, ProtocolState::UnfoldBroadcast, action(acted));
        Ok(())
    }
}

fn action(acted: bool) -> StateAction {
    if acted {
        StateAction::Executed
    } else {
        StateAction::Skipped
    }
}

/// Sum-reduce one panel over the fold group. Empty pieces are skipped on
/// every member alike since the layout is replicated.
fn reduce_panel<C: Communicator>(
    comm: &C,
    panel: &mut Panel,
    is_root: bool,
    root: usize,
) -> Result<bool> {
    let values = panel.values_mut();
    if values.is_empty() {
        return Ok(false);
    }
    let buf = if is_root {
        ReduceBuffer::InPlace(values)
    } else {
        ReduceBuffer::Send(values)
    };
    comm.reduce_sum(buf, root)?;
    Ok(true)
}

/// Pack the factored diagonal block into the slot: unit lower factor into
/// `block_l`, upper factor into `block_u`, both with leading dimension `ks`.
fn pack_factors(block: BlockRef<'_>, ks: usize, slot: &mut DiagFactorBufs) {
    for c in 0..ks {
        for r in 0..ks {
            let v = block.get(r, c);
            let (l, u) = match r.cmp(&c) {
                std::cmp::Ordering::Greater => (v, 0.0),
                std::cmp::Ordering::Equal => (1.0, v),
                std::cmp::Ordering::Less => (0.0, v),
            };
            slot.block_l[c * ks + r] = l;
            slot.block_u[c * ks + r] = u;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_factors_splits_triangles() {
        let lu = vec![2.0, 0.5, 3.0, 4.0];
        let mut slot = DiagFactorBufs {
            block_l: vec![9.0; 9],
            block_u: vec![9.0; 9],
        };
        pack_factors(BlockRef::new(&lu, 2, 2, 2).unwrap(), 2, &mut slot);
        assert_eq!(&slot.block_l[..4], &[1.0, 0.5, 0.0, 1.0]);
        assert_eq!(&slot.block_u[..4], &[2.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn test_widest_pieces_cover_every_process() {
        let layout = SupernodeLayout::uniform(5, 2).unwrap();
        // L column 0 on 2 rows: row 0 holds {0, 2, 4}, row 1 holds {1, 3}
        // U row 0 on 3 columns: column 1 holds {1, 4}
        let (l, u) = widest_pieces(&layout, 0, 2, 3);
        assert_eq!(l, (index_len(3), 12));
        assert_eq!(u, (index_len(2), 8));
    }

    #[test]
    fn test_piece_counts() {
        let layout = SupernodeLayout::uniform(4, 2).unwrap();
        assert_eq!(piece_counts(&layout, &[], 2), (0, 0));
        assert_eq!(piece_counts(&layout, &[1, 3], 2), (index_len(2), 8));
    }
}
