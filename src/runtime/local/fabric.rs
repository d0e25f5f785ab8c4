//! Rendezvous fabric shared by the members of a local group
//!
//! Every collective is expressed as one or more all-to-all exchanges: each
//! member deposits a payload, the last arrival publishes the full set, and
//! every member reads it before the next round may start.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{Error, Result};

/// How often a blocked member re-checks the universe abort flag.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// State shared by every group derived from one world.
#[derive(Debug)]
pub(super) struct Universe {
    aborted: AtomicBool,
    reason: Mutex<Option<String>>,
    timeout: Duration,
}

impl Universe {
    pub(super) fn new(timeout: Duration) -> Self {
        Self {
            aborted: AtomicBool::new(false),
            reason: Mutex::new(None),
            timeout,
        }
    }

    /// Mark the universe failed. The first reason wins.
    pub(super) fn abort(&self, reason: &str) {
        let mut slot = self.reason.lock();
        if slot.is_none() {
            *slot = Some(reason.to_string());
        }
        self.aborted.store(true, Ordering::Release);
    }

    pub(super) fn abort_reason(&self) -> Option<String> {
        if self.aborted.load(Ordering::Acquire) {
            Some(self.reason.lock().clone().unwrap_or_default())
        } else {
            None
        }
    }
}

/// Data deposited by one member for one exchange round.
#[derive(Debug)]
pub(super) enum Payload {
    Empty,
    Len(usize),
    F64(Vec<f64>),
    I64(Vec<i64>),
    Color { color: usize, key: usize },
    Group(Arc<Group>),
}

#[derive(Debug)]
struct Round {
    op: Option<&'static str>,
    arrived: usize,
    slots: Vec<Option<Payload>>,
    result: Option<Arc<Vec<Payload>>>,
    readers_left: usize,
}

/// One communication group: a fixed member count and its rendezvous state.
#[derive(Debug)]
pub(super) struct Group {
    size: usize,
    universe: Arc<Universe>,
    round: Mutex<Round>,
    cond: Condvar,
}

impl Group {
    pub(super) fn new(size: usize, universe: Arc<Universe>) -> Self {
        Self {
            size,
            universe,
            round: Mutex::new(Round {
                op: None,
                arrived: 0,
                slots: (0..size).map(|_| None).collect(),
                result: None,
                readers_left: 0,
            }),
            cond: Condvar::new(),
        }
    }

    pub(super) fn size(&self) -> usize {
        self.size
    }

    pub(super) fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Abort the universe and build the error every caller returns.
    pub(super) fn fail(&self, op: &'static str, reason: impl Into<String>) -> Error {
        let reason = reason.into();
        tracing::error!(op, %reason, "collective failed, aborting process group");
        self.universe.abort(&reason);
        Error::comm(op, reason)
    }

    /// Deposit `payload` as member `rank` and return every member's payload
    /// in rank order once all members have arrived.
    pub(super) fn exchange(
        &self,
        rank: usize,
        op: &'static str,
        payload: Payload,
    ) -> Result<Arc<Vec<Payload>>> {
        if let Some(reason) = self.universe.abort_reason() {
            return Err(Error::comm(op, format!("process group aborted: {reason}")));
        }
        if self.size == 1 {
            return Ok(Arc::new(vec![payload]));
        }

        let deadline = Instant::now() + self.universe.timeout;
        let mut round = self.round.lock();

        // The previous round is still being read by slower members.
        while round.result.is_some() {
            self.wait(&mut round, deadline, op)?;
        }

        match round.op {
            None => round.op = Some(op),
            Some(pending) if pending != op => {
                drop(round);
                return Err(self.fail(
                    op,
                    format!("rank {rank} issued {op} while the group is in {pending}"),
                ));
            }
            Some(_) => {}
        }
        if round.slots[rank].is_some() {
            drop(round);
            return Err(self.fail(op, format!("rank {rank} entered {op} twice")));
        }

        round.slots[rank] = Some(payload);
        round.arrived += 1;

        if round.arrived == self.size {
            let all: Vec<Payload> = round
                .slots
                .iter_mut()
                .map(|slot| slot.take().unwrap_or(Payload::Empty))
                .collect();
            let all = Arc::new(all);
            round.arrived = 0;
            round.op = None;
            round.result = Some(Arc::clone(&all));
            round.readers_left = self.size - 1;
            self.cond.notify_all();
            return Ok(all);
        }

        loop {
            self.wait(&mut round, deadline, op)?;
            if let Some(all) = round.result.as_ref().map(Arc::clone) {
                round.readers_left -= 1;
                if round.readers_left == 0 {
                    round.result = None;
                    self.cond.notify_all();
                }
                return Ok(all);
            }
        }
    }

    fn wait(
        &self,
        round: &mut MutexGuard<'_, Round>,
        deadline: Instant,
        op: &'static str,
    ) -> Result<()> {
        if let Some(reason) = self.universe.abort_reason() {
            return Err(Error::comm(op, format!("process group aborted: {reason}")));
        }
        let now = Instant::now();
        if now >= deadline {
            let reason = format!(
                "timed out after {:?} waiting for {} of {} members",
                self.universe.timeout,
                self.size - round.arrived,
                self.size
            );
            tracing::error!(op, %reason, "collective failed, aborting process group");
            self.universe.abort(&reason);
            return Err(Error::comm(op, reason));
        }
        let slice = POLL_INTERVAL.min(deadline - now);
        self.cond.wait_for(round, slice);
        Ok(())
    }
}
