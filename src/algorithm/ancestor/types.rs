//! Types for the ancestor factorization stage
//!
//! Options, the message-tag namespace, protocol states, and the status
//! returned to the factorization driver.

use crate::error::{Error, ErrorKind, Result};

// ============================================================================
// Options
// ============================================================================

/// How the trailing (Schur complement) update is applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrailingUpdate {
    /// Update on the layer replica that factored the node (default)
    #[default]
    Baseline,
    /// Skip the update; the caller applies it with its own scheme
    Deferred,
}

/// Configuration for the ancestor factorization
#[derive(Debug, Clone, PartialEq)]
pub struct FactorOptions {
    /// Minimum acceptable pivot magnitude (default: 1e-12)
    /// Smaller pivots are reported through [`FactorStatus`]
    pub pivot_threshold: f64,

    /// Replace tiny pivots by `±pivot_threshold` (default: false)
    pub replace_tiny_pivot: bool,

    /// Diagonal factor slots kept in flight per level (default: 8)
    pub num_lookaheads: usize,

    /// Trailing update mode (default: [`TrailingUpdate::Baseline`])
    pub trailing_update: TrailingUpdate,
}

impl Default for FactorOptions {
    fn default() -> Self {
        Self {
            pivot_threshold: 1e-12,
            replace_tiny_pivot: false,
            num_lookaheads: 8,
            trailing_update: TrailingUpdate::Baseline,
        }
    }
}

/// Environment variable overriding [`FactorOptions::num_lookaheads`]
pub const ENV_NUM_LOOKAHEADS: &str = "LU3D_NUM_LOOKAHEADS";
/// Environment variable overriding [`FactorOptions::pivot_threshold`]
pub const ENV_PIVOT_THRESHOLD: &str = "LU3D_PIVOT_THRESHOLD";
/// Environment variable overriding [`FactorOptions::replace_tiny_pivot`]
pub const ENV_REPLACE_TINY_PIVOT: &str = "LU3D_REPLACE_TINY_PIVOT";

impl FactorOptions {
    /// Set the lookahead depth
    pub fn with_lookaheads(mut self, n: usize) -> Self {
        self.num_lookaheads = n;
        self
    }

    /// Set the pivot threshold
    pub fn with_pivot_threshold(mut self, threshold: f64) -> Self {
        self.pivot_threshold = threshold;
        self
    }

    /// Enable tiny pivot replacement
    pub fn replace_tiny_pivot(mut self) -> Self {
        self.replace_tiny_pivot = true;
        self
    }

    /// Set the trailing update mode
    pub fn with_trailing_update(mut self, mode: TrailingUpdate) -> Self {
        self.trailing_update = mode;
        self
    }

    /// Defaults overlaid with the `LU3D_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay settings found through `lookup` (variable name to value).
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup(ENV_NUM_LOOKAHEADS) {
            self.num_lookaheads = v.trim().parse().map_err(|_| {
                Error::invalid_argument("num_lookaheads", format!("{ENV_NUM_LOOKAHEADS}={v}"))
            })?;
        }
        if let Some(v) = lookup(ENV_PIVOT_THRESHOLD) {
            self.pivot_threshold = v.trim().parse().map_err(|_| {
                Error::invalid_argument("pivot_threshold", format!("{ENV_PIVOT_THRESHOLD}={v}"))
            })?;
        }
        if let Some(v) = lookup(ENV_REPLACE_TINY_PIVOT) {
            self.replace_tiny_pivot = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(Error::invalid_argument(
                        "replace_tiny_pivot",
                        format!("{ENV_REPLACE_TINY_PIVOT}={v}"),
                    ));
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    /// Check option ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.pivot_threshold >= 0.0 && self.pivot_threshold.is_finite()) {
            return Err(Error::invalid_argument(
                "pivot_threshold",
                format!("{} is not a finite non-negative value", self.pivot_threshold),
            ));
        }
        if self.num_lookaheads == 0 {
            return Err(Error::invalid_argument("num_lookaheads", "must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Message tags
// ============================================================================

/// Message-tag namespace reserved for one factorization call.
///
/// Node `k0` is tagged `base + k0 mod (upper_bound - base)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpace {
    base: i32,
    upper_bound: i32,
}

impl Default for TagSpace {
    /// The range every message-passing library must support: `[0, 32767)`
    fn default() -> Self {
        Self {
            base: 0,
            upper_bound: 32767,
        }
    }
}

impl TagSpace {
    /// Reserve tags `base..upper_bound`
    pub fn new(base: i32, upper_bound: i32) -> Result<Self> {
        if base < 0 || upper_bound <= base {
            return Err(Error::invalid_argument(
                "tags",
                format!("empty or negative tag range {base}..{upper_bound}"),
            ));
        }
        Ok(Self { base, upper_bound })
    }

    /// First tag
    pub fn base(&self) -> i32 {
        self.base
    }

    /// One past the last tag
    pub fn upper_bound(&self) -> i32 {
        self.upper_bound
    }

    /// Tag of node position `k0`
    pub fn node_tag(&self, k0: usize) -> i32 {
        let span = (self.upper_bound - self.base) as usize;
        self.base + (k0 % span) as i32
    }
}

// ============================================================================
// Protocol states
// ============================================================================

/// The per-node states, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolState {
    /// Sum-reduce the node's panels onto the fold root
    FoldReduce,
    /// Factor the diagonal block and pack its factors
    Factor,
    /// Broadcast the packed diagonal factors along row and column
    BcastDiag,
    /// Triangular solves of the L and U panels
    Solve,
    /// Broadcast the solved panels along row and column
    BcastPanel,
    /// Trailing rank-k update
    SchurUpdate,
    /// Broadcast the factored panels back to every fold member
    UnfoldBroadcast,
}

impl ProtocolState {
    /// All states in execution order
    pub const ALL: [ProtocolState; 7] = [
        Self::FoldReduce,
        Self::Factor,
        Self::BcastDiag,
        Self::Solve,
        Self::BcastPanel,
        Self::SchurUpdate,
        Self::UnfoldBroadcast,
    ];

    /// Upper-case name used in logs
    pub fn name(self) -> &'static str {
        match self {
            Self::FoldReduce => "FOLD_REDUCE",
            Self::Factor => "FACTOR",
            Self::BcastDiag => "BCAST_DIAG",
            Self::Solve => "SOLVE",
            Self::BcastPanel => "BCAST_PANEL",
            Self::SchurUpdate => "SCHUR_UPDATE",
            Self::UnfoldBroadcast => "UNFOLD_BROADCAST",
        }
    }
}

impl std::fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a process did in one protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateAction {
    /// Local work or a collective was issued
    Executed,
    /// Nothing to do on this process (not a member, empty panel, or a
    /// single replica)
    Skipped,
}

// ============================================================================
// Status
// ============================================================================

/// Numeric outcome of one ancestor factorization call on one process.
///
/// Only the process owning a diagonal block observes its pivots, so
/// singular pivot information is local; drivers combine it across
/// processes as needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactorStatus {
    /// Global column of the first tiny pivot encountered
    pub first_singular_column: Option<usize>,
    /// Number of tiny pivots encountered
    pub singular_pivots: usize,
    /// Number of tiny pivots replaced by `±pivot_threshold`
    pub replaced_pivots: usize,
    /// Nodes this process went through
    pub nodes: usize,
    /// Diagonal blocks this process factored
    pub diagonal_blocks: usize,
}

impl FactorStatus {
    /// Whether no tiny pivot was encountered
    pub fn is_success(&self) -> bool {
        self.singular_pivots == 0
    }

    /// Status kind
    pub fn kind(&self) -> ErrorKind {
        if self.is_success() {
            ErrorKind::Success
        } else {
            ErrorKind::SingularPivot
        }
    }

    /// Integer status code (0 = success)
    pub fn code(&self) -> i32 {
        self.kind().code()
    }

    /// Turn a singular status into [`Error::SingularPivot`]
    pub fn into_result(self) -> Result<Self> {
        match self.first_singular_column {
            Some(column) => Err(Error::SingularPivot { column }),
            None => Ok(self),
        }
    }

    pub(crate) fn record_singular(&mut self, column: usize, count: usize) {
        self.first_singular_column.get_or_insert(column);
        self.singular_pivots += count;
    }
}
