//! `Communicator` implementation over MPI
//!
//! Enabled with the `mpi` feature; needs an MPI installation at build time.
//! The caller initializes MPI and keeps the universe alive for as long as
//! any handle is in use:
//!
//! ```ignore
//! let universe = mpi::initialize().ok_or_else(|| Error::comm("init", "already initialized"))?;
//! let world = MpiComm::world(&universe);
//! let grid = ProcessGrid3D::new(&world, nprow, npcol, npdep)?;
//! ```
//!
//! MPI reports failed collectives through its error handler, which aborts
//! the job by default, so a collective that returns has succeeded. Local
//! argument errors (a root outside the group) abort the job as well.

use std::cell::Cell;

use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::{Color, SimpleCommunicator};
use mpi::traits::{Communicator as _, CommunicatorCollectives, Root};

use crate::error::{Error, Result};
use crate::runtime::{CommStats, Communicator, ReduceBuffer};

/// Exit code passed to `MPI_Abort`
const ABORT_CODE: i32 = 1;

/// MPI communicator handle.
pub struct MpiComm {
    comm: SimpleCommunicator,
    stats: Cell<CommStats>,
}

impl MpiComm {
    /// Wrap an existing MPI communicator
    pub fn new(comm: SimpleCommunicator) -> Self {
        Self {
            comm,
            stats: Cell::new(CommStats::default()),
        }
    }

    /// Handle on `MPI_COMM_WORLD`
    pub fn world(universe: &Universe) -> Self {
        Self::new(universe.world())
    }

    /// Underlying MPI communicator
    pub fn raw(&self) -> &SimpleCommunicator {
        &self.comm
    }

    fn record(&self, f: impl FnOnce(&mut CommStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    fn fail(&self, op: &'static str, reason: &str) -> ! {
        tracing::error!(rank = self.comm.rank(), op, reason, "aborting MPI job");
        self.comm.abort(ABORT_CODE)
    }

    fn root_rank(&self, op: &'static str, root: usize) -> i32 {
        match i32::try_from(root) {
            Ok(r) if r < self.comm.size() => r,
            _ => self.fail(
                op,
                &format!("root {root} out of range for group of {}", self.comm.size()),
            ),
        }
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.comm.rank() as usize
    }

    fn size(&self) -> usize {
        self.comm.size() as usize
    }

    fn split(&self, color: usize, key: usize) -> Result<Self> {
        self.record(|s| s.splits += 1);
        let color = i32::try_from(color)
            .map_err(|_| Error::invalid_argument("color", format!("{color} exceeds i32")))?;
        let key = i32::try_from(key)
            .map_err(|_| Error::invalid_argument("key", format!("{key} exceeds i32")))?;
        self.comm
            .split_by_color_with_key(Color::with_value(color), key)
            .map(Self::new)
            .ok_or_else(|| Error::comm("split", "caller left out of its own color"))
    }

    fn reduce_sum(&self, buf: ReduceBuffer<'_>, root: usize) -> Result<()> {
        let root = self.root_rank("reduce", root);
        self.record(|s| s.reduces += 1);
        let process = self.comm.process_at_rank(root);
        match buf {
            ReduceBuffer::InPlace(out) if self.comm.rank() == root => {
                let send = out.to_vec();
                process.reduce_into_root(&send[..], out, SystemOperation::sum());
            }
            ReduceBuffer::InPlace(out) => {
                process.reduce_into(&out[..], SystemOperation::sum());
            }
            ReduceBuffer::Send(_) if self.comm.rank() == root => {
                self.fail("reduce", "root must reduce in place")
            }
            ReduceBuffer::Send(data) => {
                process.reduce_into(data, SystemOperation::sum());
            }
        }
        Ok(())
    }

    fn broadcast_f64(&self, data: &mut [f64], root: usize) -> Result<()> {
        let root = self.root_rank("broadcast", root);
        self.record(|s| s.broadcasts += 1);
        self.comm.process_at_rank(root).broadcast_into(data);
        Ok(())
    }

    fn broadcast_i64(&self, data: &mut [i64], root: usize) -> Result<()> {
        let root = self.root_rank("broadcast", root);
        self.record(|s| s.broadcasts += 1);
        self.comm.process_at_rank(root).broadcast_into(data);
        Ok(())
    }

    fn barrier(&self) -> Result<()> {
        self.record(|s| s.barriers += 1);
        self.comm.barrier();
        Ok(())
    }

    fn abort(&self, reason: &str) {
        self.fail("abort", reason)
    }

    fn stats(&self) -> CommStats {
        self.stats.get()
    }
}
