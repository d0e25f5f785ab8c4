//! Preallocated scratch buffers for the panel pipeline
//!
//! Two kinds of scratch are needed per process:
//!
//! - **Diagonal factor slots**: packed `L` and `U` factors of one diagonal
//!   block (`ldt × ldt` each, `ldt` the largest supernode). One slot per
//!   concurrently processed node, up to the lookahead depth.
//! - **Receive buffers**: space for an L and a U panel piece received from
//!   another process, sized for the largest piece any process can hold.

use super::layout::SupernodeLayout;
use super::panel::index_len;
use crate::error::{Error, Result, reserve_exact, try_zeroed};

/// Packed factors of one diagonal block.
#[derive(Debug, Clone)]
pub struct DiagFactorBufs {
    /// Unit lower factor, column-major `ldt × ldt` (strict lower part used)
    pub block_l: Vec<f64>,
    /// Upper factor, column-major `ldt × ldt` (upper part used)
    pub block_u: Vec<f64>,
}

/// Receive buffers for panels broadcast by other processes.
#[derive(Debug, Clone)]
pub struct PanelRecvBuffers {
    /// L panel index
    pub l_index: Vec<i64>,
    /// L panel values
    pub l_values: Vec<f64>,
    /// U panel index
    pub u_index: Vec<i64>,
    /// U panel values
    pub u_values: Vec<f64>,
}

/// Scratch pool for one ancestor factorization call.
#[derive(Debug, Clone)]
pub struct ScratchPool {
    ldt: usize,
    slots: Vec<DiagFactorBufs>,
    recv: PanelRecvBuffers,
}

impl ScratchPool {
    /// Size the pool for `layout` on an `nprow × npcol` layer with `nslots`
    /// diagonal factor slots.
    pub fn new(
        layout: &SupernodeLayout,
        nprow: usize,
        npcol: usize,
        nslots: usize,
    ) -> Result<Self> {
        if nprow == 0 || npcol == 0 {
            return Err(Error::invalid_argument("grid", "zero process rows or columns"));
        }
        let ldt = layout.max_super_size();
        let nslots = nslots.max(1);

        let mut slots = Vec::new();
        reserve_exact(&mut slots, "diagonal factor slots", nslots)?;
        for _ in 0..nslots {
            slots.push(DiagFactorBufs {
                block_l: try_zeroed("diagonal L factor", ldt * ldt)?,
                block_u: try_zeroed("diagonal U factor", ldt * ldt)?,
            });
        }

        let (mut l_idx, mut l_val, mut u_idx, mut u_val) = (0, 0, 0, 0);
        for k in 0..layout.nsupers() {
            let width = layout.super_size(k);
            for prow in 0..nprow {
                let piece = layout.l_piece(k, prow, nprow);
                l_idx = l_idx.max(index_len(piece.len()));
                l_val = l_val.max(layout.extent(&piece) * width);
            }
            for pcol in 0..npcol {
                let piece = layout.u_piece(k, pcol, npcol);
                u_idx = u_idx.max(index_len(piece.len()));
                u_val = u_val.max(layout.extent(&piece) * width);
            }
        }

        let recv = PanelRecvBuffers {
            l_index: try_zeroed("L receive index", l_idx)?,
            l_values: try_zeroed("L receive values", l_val)?,
            u_index: try_zeroed("U receive index", u_idx)?,
            u_values: try_zeroed("U receive values", u_val)?,
        };

        tracing::debug!(ldt, nslots, l_val, u_val, "scratch pool allocated");
        Ok(Self { ldt, slots, recv })
    }

    /// Leading dimension of the diagonal factor slots
    pub fn ldt(&self) -> usize {
        self.ldt
    }

    /// Number of diagonal factor slots
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Receive buffers
    pub fn recv(&self) -> &PanelRecvBuffers {
        &self.recv
    }

    /// Diagonal factor slot for the node at `offset` within its level,
    /// together with the receive buffers
    pub fn split(&mut self, offset: usize) -> (&mut DiagFactorBufs, &mut PanelRecvBuffers) {
        let n = self.slots.len();
        (&mut self.slots[offset % n], &mut self.recv)
    }

    /// Heap bytes held
    pub fn bytes(&self) -> usize {
        let slot_bytes = self.slots.len() * 2 * self.ldt * self.ldt * size_of::<f64>();
        let recv = &self.recv;
        slot_bytes
            + (recv.l_index.len() + recv.u_index.len()) * size_of::<i64>()
            + (recv.l_values.len() + recv.u_values.len()) * size_of::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_cover_largest_piece() {
        // sizes 2, 1, 3
        let layout = SupernodeLayout::dense(vec![0, 2, 3, 6]).unwrap();
        let pool = ScratchPool::new(&layout, 1, 1, 2).unwrap();
        assert_eq!(pool.ldt(), 3);
        assert_eq!(pool.num_slots(), 2);
        // Whole L column 0 on a single process: stride 6, width 2
        assert_eq!(pool.recv.l_values.len(), 12);
        assert_eq!(pool.recv.l_index.len(), index_len(3));
        // U row 0: blocks 1, 2 -> 4 columns of width 2
        assert_eq!(pool.recv.u_values.len(), 8);
    }

    #[test]
    fn test_slots_wrap() {
        let layout = SupernodeLayout::uniform(3, 2).unwrap();
        let mut pool = ScratchPool::new(&layout, 2, 2, 0).unwrap();
        assert_eq!(pool.num_slots(), 1);
        let (slot, _) = pool.split(5);
        assert_eq!(slot.block_l.len(), 4);
        assert!(pool.bytes() > 0);
    }
}
