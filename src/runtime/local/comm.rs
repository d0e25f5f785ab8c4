//! `Communicator` implementation over the local rendezvous fabric

use std::cell::Cell;
use std::sync::Arc;

use super::fabric::{Group, Payload};
use crate::error::{Error, Result};
use crate::runtime::{CommStats, Communicator, ReduceBuffer};

/// In-process communicator handle.
///
/// Each simulated process owns its handles; handles are `Send` so they can
/// be moved onto the thread that plays the process, but not shared.
#[derive(Debug)]
pub struct LocalComm {
    group: Arc<Group>,
    rank: usize,
    stats: Cell<CommStats>,
}

impl LocalComm {
    pub(super) fn new(group: Arc<Group>, rank: usize) -> Self {
        Self {
            group,
            rank,
            stats: Cell::new(CommStats::default()),
        }
    }

    fn record(&self, f: impl FnOnce(&mut CommStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    fn check_root(&self, op: &'static str, root: usize) -> Result<()> {
        if root >= self.group.size() {
            return Err(self.group.fail(
                op,
                format!("root {root} out of range for group of {}", self.group.size()),
            ));
        }
        Ok(())
    }

    fn broadcast_payload(
        &self,
        op: &'static str,
        len: usize,
        root: usize,
        payload: Payload,
    ) -> Result<Arc<Vec<Payload>>> {
        self.check_root(op, root)?;
        self.record(|s| s.broadcasts += 1);
        let mine = if self.rank == root {
            payload
        } else {
            Payload::Len(len)
        };
        let all = self.group.exchange(self.rank, op, mine)?;
        for (rank, p) in all.iter().enumerate() {
            let their_len = match p {
                Payload::Len(n) => *n,
                Payload::F64(v) => v.len(),
                Payload::I64(v) => v.len(),
                _ => {
                    return Err(self.group.fail(op, format!("rank {rank} sent no count")));
                }
            };
            if their_len != len {
                return Err(self.group.fail(
                    op,
                    format!(
                        "count mismatch: rank {rank} has {their_len}, rank {} has {len}",
                        self.rank
                    ),
                ));
            }
        }
        Ok(all)
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.size()
    }

    fn split(&self, color: usize, key: usize) -> Result<Self> {
        self.record(|s| s.splits += 1);
        let all = self
            .group
            .exchange(self.rank, "split", Payload::Color { color, key })?;

        let mut members: Vec<(usize, usize)> = all
            .iter()
            .enumerate()
            .filter_map(|(rank, p)| match p {
                Payload::Color { color: c, key: k } if *c == color => Some((*k, rank)),
                _ => None,
            })
            .collect();
        members.sort_unstable();

        let new_rank = members
            .iter()
            .position(|&(_, rank)| rank == self.rank)
            .ok_or_else(|| self.group.fail("split", "caller missing from its own color"))?;
        let leader = members[0].1;

        // The lowest-ordered member creates the group and publishes it.
        let mine = if new_rank == 0 {
            Payload::Group(Arc::new(Group::new(
                members.len(),
                Arc::clone(self.group.universe()),
            )))
        } else {
            Payload::Empty
        };
        let published = self.group.exchange(self.rank, "split", mine)?;
        match &published[leader] {
            Payload::Group(group) => Ok(LocalComm::new(Arc::clone(group), new_rank)),
            _ => Err(self.group.fail("split", "leader did not publish a group")),
        }
    }

    fn reduce_sum(&self, buf: ReduceBuffer<'_>, root: usize) -> Result<()> {
        self.check_root("reduce", root)?;
        self.record(|s| s.reduces += 1);
        if self.rank == root && matches!(buf, ReduceBuffer::Send(_)) {
            return Err(self.group.fail("reduce", "root must reduce in place"));
        }

        let len = buf.len();
        let all = self
            .group
            .exchange(self.rank, "reduce", Payload::F64(buf.as_slice().to_vec()))?;

        for (rank, p) in all.iter().enumerate() {
            match p {
                Payload::F64(v) if v.len() == len => {}
                Payload::F64(v) => {
                    return Err(self.group.fail(
                        "reduce",
                        format!(
                            "count mismatch: rank {rank} has {}, rank {} has {len}",
                            v.len(),
                            self.rank
                        ),
                    ));
                }
                _ => return Err(self.group.fail("reduce", format!("rank {rank} sent no data"))),
            }
        }

        if let ReduceBuffer::InPlace(out) = buf {
            if self.rank != root {
                return Ok(());
            }
            // Ascending rank order keeps the sum bit-reproducible.
            out.fill(0.0);
            for p in all.iter() {
                if let Payload::F64(v) = p {
                    for (o, x) in out.iter_mut().zip(v) {
                        *o += *x;
                    }
                }
            }
        }
        Ok(())
    }

    fn broadcast_f64(&self, data: &mut [f64], root: usize) -> Result<()> {
        let payload = if self.rank == root {
            Payload::F64(data.to_vec())
        } else {
            Payload::Empty
        };
        let all = self.broadcast_payload("broadcast", data.len(), root, payload)?;
        if self.rank != root {
            match &all[root] {
                Payload::F64(v) => data.copy_from_slice(v),
                _ => return Err(self.group.fail("broadcast", "root sent the wrong element type")),
            }
        }
        Ok(())
    }

    fn broadcast_i64(&self, data: &mut [i64], root: usize) -> Result<()> {
        let payload = if self.rank == root {
            Payload::I64(data.to_vec())
        } else {
            Payload::Empty
        };
        let all = self.broadcast_payload("broadcast", data.len(), root, payload)?;
        if self.rank != root {
            match &all[root] {
                Payload::I64(v) => data.copy_from_slice(v),
                _ => return Err(self.group.fail("broadcast", "root sent the wrong element type")),
            }
        }
        Ok(())
    }

    fn barrier(&self) -> Result<()> {
        self.record(|s| s.barriers += 1);
        self.group.exchange(self.rank, "barrier", Payload::Empty)?;
        Ok(())
    }

    fn abort(&self, reason: &str) {
        tracing::error!(rank = self.rank, reason, "aborting process group");
        self.group.universe().abort(reason);
    }

    fn stats(&self) -> CommStats {
        self.stats.get()
    }
}

impl LocalComm {
    /// Reason the universe was aborted, if it was
    pub fn abort_reason(&self) -> Option<String> {
        self.group.universe().abort_reason()
    }

    /// Fail with the standard error if the universe has been aborted
    pub fn check_alive(&self) -> Result<()> {
        match self.abort_reason() {
            Some(reason) => Err(Error::comm("check_alive", reason)),
            None => Ok(()),
        }
    }
}
