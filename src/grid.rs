//! 3D process grid: a stack of 2D process layers
//!
//! World rank `r` of an `nprow × npcol × npdep` grid sits on layer
//! `z = r / (nprow * npcol)` at in-layer position
//! `(myrow, mycol) = ((r % (nprow * npcol)) / npcol, r % npcol)`.
//!
//! Supernode `k` is owned cyclically: its L column lives on process column
//! `k % npcol` (local column `k / npcol`), its U row on process row
//! `k % nprow` (local row `k / nprow`).

use crate::error::{Error, Result};
use crate::runtime::Communicator;

/// Logical 3D arrangement of processes with its row, column, and z handles.
///
/// Immutable after construction. The factorization only borrows it.
#[derive(Debug)]
pub struct ProcessGrid3D<C: Communicator> {
    nprow: usize,
    npcol: usize,
    npdep: usize,
    myrow: usize,
    mycol: usize,
    layer: usize,
    iam: usize,
    row: C,
    col: C,
    zcomm: C,
}

impl<C: Communicator> ProcessGrid3D<C> {
    /// Build the grid from a world communicator by splitting it into
    /// row, column, and z (same 2D position across layers) groups.
    ///
    /// Collective over `world`.
    pub fn new(world: &C, nprow: usize, npcol: usize, npdep: usize) -> Result<Self> {
        if nprow == 0 || npcol == 0 || npdep == 0 {
            return Err(Error::invalid_argument(
                "grid",
                format!("zero grid dimension {nprow}x{npcol}x{npdep}"),
            ));
        }
        if nprow * npcol * npdep != world.size() {
            return Err(Error::invalid_argument(
                "grid",
                format!(
                    "{nprow}x{npcol}x{npdep} grid needs {} processes, world has {}",
                    nprow * npcol * npdep,
                    world.size()
                ),
            ));
        }

        let iam = world.rank();
        let layer_size = nprow * npcol;
        let layer = iam / layer_size;
        let in_layer = iam % layer_size;
        let myrow = in_layer / npcol;
        let mycol = in_layer % npcol;

        let row = world.split(layer * nprow + myrow, mycol)?;
        let col = world.split(layer * npcol + mycol, myrow)?;
        let zcomm = world.split(in_layer, layer)?;

        tracing::debug!(iam, layer, myrow, mycol, "process grid ready");

        Ok(Self {
            nprow,
            npcol,
            npdep,
            myrow,
            mycol,
            layer,
            iam,
            row,
            col,
            zcomm,
        })
    }

    /// Process rows per layer
    pub fn nprow(&self) -> usize {
        self.nprow
    }

    /// Process columns per layer
    pub fn npcol(&self) -> usize {
        self.npcol
    }

    /// Number of layers
    pub fn npdep(&self) -> usize {
        self.npdep
    }

    /// This process's row in its layer
    pub fn myrow(&self) -> usize {
        self.myrow
    }

    /// This process's column in its layer
    pub fn mycol(&self) -> usize {
        self.mycol
    }

    /// This process's layer index
    pub fn layer(&self) -> usize {
        self.layer
    }

    /// This process's rank within its layer
    pub fn iam_2d(&self) -> usize {
        self.myrow * self.npcol + self.mycol
    }

    /// This process's world rank
    pub fn iam(&self) -> usize {
        self.iam
    }

    /// Group of the processes in this process row (ranked by column)
    pub fn row_comm(&self) -> &C {
        &self.row
    }

    /// Group of the processes in this process column (ranked by row)
    pub fn col_comm(&self) -> &C {
        &self.col
    }

    /// Group of the processes at this 2D position on every layer
    /// (ranked by layer); the base group for fold communicators
    pub fn z_comm(&self) -> &C {
        &self.zcomm
    }

    /// Process row owning U row / diagonal of supernode `k`
    pub fn krow(&self, k: usize) -> usize {
        k % self.nprow
    }

    /// Process column owning L column / diagonal of supernode `k`
    pub fn kcol(&self, k: usize) -> usize {
        k % self.npcol
    }

    /// Local index of supernode row `k` on its owning process row
    pub fn g2l_row(&self, k: usize) -> usize {
        k / self.nprow
    }

    /// Local index of supernode column `k` on its owning process column
    pub fn g2l_col(&self, k: usize) -> usize {
        k / self.npcol
    }

    /// In-layer rank of the process owning block `(i, j)`
    pub fn proc_ij(&self, i: usize, j: usize) -> usize {
        (i % self.nprow) * self.npcol + j % self.npcol
    }

    /// Whether this process owns the diagonal block of supernode `k`
    pub fn owns_diag(&self, k: usize) -> bool {
        self.myrow == self.krow(k) && self.mycol == self.kcol(k)
    }
}
