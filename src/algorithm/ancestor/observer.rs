//! Observability hook for the ancestor factorization

use parking_lot::Mutex;

use super::types::{FactorStatus, ProtocolState, StateAction};

/// Bytes held by the structures a factorization call works on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    /// L and U panels of this process
    pub panel_bytes: usize,
    /// Diagonal factor slots and receive buffers
    pub scratch_bytes: usize,
}

impl MemoryUsage {
    /// Total bytes
    pub fn total(&self) -> usize {
        self.panel_bytes + self.scratch_bytes
    }
}

/// One protocol state as seen by one process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEvent {
    /// Position of the node in the topology
    pub k0: usize,
    /// Global supernode id
    pub node: usize,
    /// Message tag of the node
    pub tag: i32,
    /// The state
    pub state: ProtocolState,
    /// What this process did
    pub action: StateAction,
}

/// Hooks called by [`super::AncestorFactor::run`].
///
/// All methods default to doing nothing.
pub trait FactorObserver {
    /// Called once before the first node
    fn on_enter(&self, _usage: &MemoryUsage) {}

    /// Called after every protocol state of every node
    fn on_state(&self, _event: &StateEvent) {}

    /// Called once when the run ends, after the last node or at the first
    /// error. `status` then counts the nodes completed before the error.
    fn on_exit(&self, _usage: &MemoryUsage, _status: &FactorStatus) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FactorObserver for NoopObserver {}

/// Recorded observer event
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    /// See [`FactorObserver::on_enter`]
    Enter(MemoryUsage),
    /// See [`FactorObserver::on_state`]
    State(StateEvent),
    /// See [`FactorObserver::on_exit`]
    Exit(MemoryUsage, FactorStatus),
}

/// Observer that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events so far
    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().clone()
    }

    /// State events of global supernode `node`, in order
    pub fn states_of(&self, node: usize) -> Vec<(ProtocolState, StateAction)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::State(s) if s.node == node => Some((s.state, s.action)),
                _ => None,
            })
            .collect()
    }
}

impl FactorObserver for RecordingObserver {
    fn on_enter(&self, usage: &MemoryUsage) {
        self.events.lock().push(ObserverEvent::Enter(*usage));
    }

    fn on_state(&self, event: &StateEvent) {
        self.events.lock().push(ObserverEvent::State(*event));
    }

    fn on_exit(&self, usage: &MemoryUsage, status: &FactorStatus) {
        self.events
            .lock()
            .push(ObserverEvent::Exit(*usage, status.clone()));
    }
}
