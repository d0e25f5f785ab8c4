//! # lu3d
//!
//! **Ancestor-level stage of a 3D distributed sparse LU factorization.**
//!
//! Processes are arranged as a stack of 2D process layers. Each layer
//! factors its own subtree of the elimination tree; supernodes above those
//! subtrees (the *ancestors*) receive contributions from several layers.
//! lu3d folds those contributions onto one replica, factors there, and
//! broadcasts the result back, level by level.
//!
//! ## Features
//!
//! - **Communicator hierarchy**: `ceil(log2(L))` nested fold groups by
//!   binary folding of the layers
//! - **Panel exchange protocol**: fold reduce, diagonal factor, panel
//!   solves and broadcasts, Schur update, un-fold broadcast
//! - **Pluggable seams**: [`runtime::Communicator`] for message passing,
//!   [`algorithm::DenseKernels`] for the dense block math
//! - **In-process backend**: [`runtime::local`] simulates a process group
//!   with one thread per rank
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lu3d::prelude::*;
//!
//! let results = run_ranks(8, &LocalConfig::default(), |world| {
//!     let grid = ProcessGrid3D::new(&world, 2, 2, 2)?;
//!     let hierarchy = CommHierarchy::build(grid.z_comm(), 2, grid.layer())?;
//!     let mut panels = LuPanels::for_grid(&grid, &layout)?;
//!     panels.fill_with(&layout, |r, c| my_share(grid.layer(), r, c));
//!
//!     let kernels = CpuKernels::default();
//!     let factor = AncestorFactor::new(&grid, &hierarchy, &kernels, FactorOptions::default());
//!     let mut scratch = factor.scratch_for(&layout, &topology)?;
//!     factor.run(&mut panels, 0, &topology, &mut scratch, &layout, &TagSpace::default())
//! });
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): column-parallel trailing update in [`algorithm::CpuKernels`]
//! - `mpi`: `runtime::mpi::MpiComm`, a [`runtime::Communicator`] over MPI

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithm;
pub mod error;
pub mod grid;
pub mod runtime;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::algorithm::{
        AncestorFactor, CommHierarchy, CpuKernels, DenseKernels, EliminationTopology,
        FactorObserver, FactorOptions, FactorStatus, LuPanels, ScratchPool, SupernodeLayout,
        TagSpace,
    };
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::grid::ProcessGrid3D;
    pub use crate::runtime::local::{LocalComm, LocalConfig, run_ranks};
    pub use crate::runtime::{Communicator, ReduceBuffer};
}
