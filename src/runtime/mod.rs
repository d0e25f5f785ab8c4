//! Communication backends for the 3D factorization
//!
//! This module defines the [`Communicator`] trait, the only seam through
//! which the factorization talks to other processes. Two backends implement
//! it: [`local`], an in-process backend built on threads, and `mpi` (behind
//! the `mpi` feature), which runs every rank as an MPI process.
//!
//! # Architecture
//!
//! ```text
//! Communicator (one process's handle on a group)
//! ├── split      (MPI_Comm_split semantics)
//! ├── reduce_sum (sum to root, in-place at root)
//! ├── broadcast  (f64 / i64 payloads)
//! └── abort      (fail every group derived from the same world)
//! ```
//!
//! Every collective is a synchronization point for its participant set:
//! a member blocks until all members of that group have issued the matching
//! call; non-members are unaffected.

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi;
mod traits;

pub use traits::{CommStats, Communicator, ReduceBuffer};
