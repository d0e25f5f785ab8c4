//! Trait for collective communication over a process group

use crate::error::Result;

/// Send/receive role of a process in a sum-reduction.
///
/// The root contributes its own buffer and receives the sum into it
/// (`InPlace`); every other member only sends (`Send`) and keeps its buffer
/// unchanged.
#[derive(Debug)]
pub enum ReduceBuffer<'a> {
    /// Contribute and receive the result in the same buffer (root only)
    InPlace(&'a mut [f64]),
    /// Contribute without receiving (non-root members)
    Send(&'a [f64]),
}

impl ReduceBuffer<'_> {
    /// Number of elements contributed
    pub fn len(&self) -> usize {
        match self {
            Self::InPlace(buf) => buf.len(),
            Self::Send(buf) => buf.len(),
        }
    }

    /// Whether the contribution is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only view of the contribution
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Self::InPlace(buf) => buf,
            Self::Send(buf) => buf,
        }
    }
}

/// Counters of collectives issued through one communicator handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommStats {
    /// Sum-reductions issued
    pub reduces: usize,
    /// Broadcasts issued (f64 and i64)
    pub broadcasts: usize,
    /// Group splits issued
    pub splits: usize,
    /// Barriers issued
    pub barriers: usize,
}

impl CommStats {
    /// Total number of collectives issued
    pub fn total(&self) -> usize {
        self.reduces + self.broadcasts + self.splits + self.barriers
    }
}

/// One process's handle on a communication group.
///
/// Ranks are dense in `0..size()`. All collective methods must be called by
/// every member of the group in the same order; a failed collective leaves
/// global state undefined, so implementations abort the whole process group
/// before returning [`crate::error::Error::CommunicationFailure`].
pub trait Communicator: Sized {
    /// Rank of the calling process in this group
    fn rank(&self) -> usize;

    /// Number of processes in this group
    fn size(&self) -> usize;

    /// Partition the group: members passing the same `color` form a new
    /// group, ordered by `key` and then by rank in this group.
    fn split(&self, color: usize, key: usize) -> Result<Self>;

    /// Element-wise sum of every member's buffer, delivered at `root`.
    ///
    /// The root must pass [`ReduceBuffer::InPlace`]. All members must pass
    /// buffers of the same length.
    fn reduce_sum(&self, buf: ReduceBuffer<'_>, root: usize) -> Result<()>;

    /// Copy `data` from `root` into every member's `data`.
    fn broadcast_f64(&self, data: &mut [f64], root: usize) -> Result<()>;

    /// Copy `data` from `root` into every member's `data`.
    fn broadcast_i64(&self, data: &mut [i64], root: usize) -> Result<()>;

    /// Block until every member has entered the barrier
    fn barrier(&self) -> Result<()>;

    /// Fail every group derived from the same world communicator.
    fn abort(&self, reason: &str);

    /// Collectives issued through this handle so far
    fn stats(&self) -> CommStats;
}
