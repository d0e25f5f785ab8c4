//! In-process communication backend
//!
//! Simulates a group of cooperating processes with one OS thread per rank.
//! Collectives rendezvous through a shared [`parking_lot`] mutex/condvar
//! pair; a collective that cannot complete within the configured timeout
//! aborts every group derived from the same world.
//!
//! # Usage
//!
//! ```ignore
//! use lu3d::runtime::Communicator;
//! use lu3d::runtime::local::{LocalConfig, run_ranks};
//!
//! let firsts = run_ranks(4, &LocalConfig::default(), |world| {
//!     let mut v = [world.rank() as f64];
//!     world.broadcast_f64(&mut v, 0)?;
//!     Ok(v[0])
//! });
//! ```

mod comm;
mod fabric;

use std::sync::Arc;
use std::time::Duration;

pub use comm::LocalComm;
use fabric::{Group, Universe};

use crate::error::Result;

/// Configuration for the in-process backend
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Longest a member waits inside one collective before the whole
    /// universe is aborted (default: 30 s)
    pub timeout: Duration,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl LocalConfig {
    /// Create a configuration with the given collective timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Create the world communicator handles for `n` simulated processes.
///
/// Handle `i` has rank `i`. Each handle must be driven by its own thread.
pub fn world(n: usize, config: &LocalConfig) -> Vec<LocalComm> {
    let universe = Arc::new(Universe::new(config.timeout));
    let group = Arc::new(Group::new(n, universe));
    (0..n)
        .map(|rank| LocalComm::new(Arc::clone(&group), rank))
        .collect()
}

/// Aborts the universe if the owning rank's thread unwinds.
struct PanicGuard<'a>(&'a Arc<Group>);

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.universe().abort("a rank panicked");
        }
    }
}

/// Run `f` once per rank of an `n`-process world, each on its own scoped
/// thread, and collect the per-rank results in rank order.
///
/// A panic on any rank aborts the universe so the remaining ranks fail out
/// of their collectives, then the panic is resumed on the caller.
pub fn run_ranks<T, F>(n: usize, config: &LocalConfig, f: F) -> Vec<Result<T>>
where
    T: Send,
    F: Fn(LocalComm) -> Result<T> + Sync,
{
    let universe = Arc::new(Universe::new(config.timeout));
    let group = Arc::new(Group::new(n, universe));
    let f = &f;

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..n)
            .map(|rank| {
                let group = Arc::clone(&group);
                s.spawn(move || {
                    let _guard = PanicGuard(&group);
                    f(LocalComm::new(Arc::clone(&group), rank))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runtime::{Communicator, ReduceBuffer};

    fn quick() -> LocalConfig {
        LocalConfig::with_timeout(Duration::from_secs(10))
    }

    #[test]
    fn test_world_ranks() {
        let comms = world(3, &quick());
        let ranks: Vec<usize> = comms.iter().map(|c| c.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
        assert!(comms.iter().all(|c| c.size() == 3));
    }

    #[test]
    fn test_reduce_in_place_at_root() {
        let results = run_ranks(4, &quick(), |comm| {
            let mut buf = vec![comm.rank() as f64 + 1.0, 10.0];
            let root = 2;
            if comm.rank() == root {
                comm.reduce_sum(ReduceBuffer::InPlace(&mut buf), root)?;
            } else {
                comm.reduce_sum(ReduceBuffer::Send(&buf), root)?;
            }
            Ok(buf)
        });
        let bufs: Vec<Vec<f64>> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(bufs[2], vec![10.0, 40.0]);
        // Senders keep their contribution
        assert_eq!(bufs[0], vec![1.0, 10.0]);
        assert_eq!(bufs[3], vec![4.0, 10.0]);
    }

    #[test]
    fn test_broadcast_and_split() {
        let results = run_ranks(6, &quick(), |world| {
            let sub = world.split(world.rank() % 2, world.rank())?;
            let mut v = [0i64; 2];
            if sub.rank() == 0 {
                v = [world.rank() as i64, 7];
            }
            sub.broadcast_i64(&mut v, 0)?;
            Ok((sub.rank(), sub.size(), v[0]))
        });
        let got: Vec<(usize, usize, i64)> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            got,
            vec![(0, 3, 0), (0, 3, 1), (1, 3, 0), (1, 3, 1), (2, 3, 0), (2, 3, 1)]
        );
    }

    #[test]
    fn test_split_key_orders_members() {
        let results = run_ranks(4, &quick(), |world| {
            // Reverse order inside one group
            let sub = world.split(0, 10 - world.rank())?;
            Ok(sub.rank())
        });
        let got: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(got, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_count_mismatch_fails_everyone() {
        let results = run_ranks(2, &quick(), |world| {
            let mut v = vec![0.0; 1 + world.rank()];
            world.broadcast_f64(&mut v, 0)
        });
        for r in results {
            assert!(matches!(r, Err(Error::CommunicationFailure { .. })));
        }
    }

    #[test]
    fn test_stats_count_issued_collectives() {
        let results = run_ranks(2, &quick(), |world| {
            world.barrier()?;
            let mut v = [1.0];
            world.broadcast_f64(&mut v, 1)?;
            Ok(world.stats())
        });
        for r in results {
            let stats = r.unwrap();
            assert_eq!(stats.barriers, 1);
            assert_eq!(stats.broadcasts, 1);
            assert_eq!(stats.total(), 2);
        }
    }
}
