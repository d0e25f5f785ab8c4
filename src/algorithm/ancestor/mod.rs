//! Ancestor factorization: scheduler and panel exchange protocol
//!
//! Ancestor supernodes are shared by several grid layers. Each layer holds a
//! partial contribution to their panels; the protocol folds those partials
//! onto one root replica, factors there, and broadcasts the result back so
//! every layer of the fold group ends with a bit-identical copy.
//!
//! # Module Organization
//!
//! - `types` - Options, tag namespace, protocol states, status
//! - `observer` - Observability hook with memory snapshots
//! - `pipeline` - The seven per-node protocol states
//! - `schur` - Trailing update scatter into owned blocks
//! - `scheduler` - Level-by-level driver and entry points

mod observer;
mod pipeline;
mod scheduler;
mod schur;
mod types;

pub use observer::{
    FactorObserver, MemoryUsage, NoopObserver, ObserverEvent, RecordingObserver, StateEvent,
};
pub use scheduler::{AncestorFactor, ancestor_factor, ancestor_factor_status};
pub use types::{
    ENV_NUM_LOOKAHEADS, ENV_PIVOT_THRESHOLD, ENV_REPLACE_TINY_PIVOT, FactorOptions, FactorStatus,
    ProtocolState, StateAction, TagSpace, TrailingUpdate,
};
