//! Algorithms of the 3D ancestor factorization stage
//!
//! Every piece is written against the [`Communicator`](crate::runtime::Communicator)
//! and [`DenseKernels`] seams, so the same pipeline runs over any message
//! passing backend and any dense kernel implementation.
//!
//! # Available Components
//!
//! - [`CommHierarchy`] - Nested fold groups built by binary folding of layers
//! - [`EliminationTopology`] - Ancestor nodes grouped into topological levels
//! - [`SupernodeLayout`] - Supernode sizes and L/U block structure
//! - [`LuPanels`] / [`Panel`] - Per-process panel storage with row/column views
//! - [`DenseKernels`] - Diagonal factor, triangular solves, trailing update
//! - [`ScratchPool`] - Diagonal factor slots and panel receive buffers
//! - [`AncestorFactor`] - Scheduler and panel exchange protocol
//!
//! # Data Flow
//!
//! ```text
//!  layer 0 partials   layer 1 partials          (fold group at level a)
//!        │                  │
//!        └──── FOLD_REDUCE ─┘
//!                  ▼
//!          root replica: FACTOR → BCAST_DIAG → SOLVE → BCAST_PANEL → SCHUR_UPDATE
//!                  │
//!        ┌── UNFOLD_BROADCAST ┐
//!        ▼                    ▼
//!   layer 0 copy         layer 1 copy             (bit-identical)
//! ```

pub mod ancestor;
pub mod hierarchy;
pub mod kernels;
pub mod layout;
pub mod panel;
pub mod scratch;
pub mod topology;

pub use ancestor::{
    AncestorFactor, FactorObserver, FactorOptions, FactorStatus, MemoryUsage, NoopObserver,
    ObserverEvent, ProtocolState, RecordingObserver, StateAction, StateEvent, TagSpace,
    TrailingUpdate, ancestor_factor, ancestor_factor_status,
};
pub use hierarchy::{CommHierarchy, FoldGroup, fold_block_base, fold_block_size, fold_depth};
pub use kernels::{BlockMut, BlockRef, CpuKernels, DenseKernels, DiagFactorStatus};
pub use layout::SupernodeLayout;
pub use panel::{ColumnView, LuPanels, Panel, PanelIndex, RowView};
pub use scratch::{DiagFactorBufs, PanelRecvBuffers, ScratchPool};
pub use topology::EliminationTopology;
