//! Elimination topology of an ancestor forest
//!
//! Supernodes are grouped into topological levels: every node in a level
//! depends only on nodes of earlier levels, so levels run strictly in
//! sequence while nodes inside a level are mutually independent.
//!
//! # Algorithm
//!
//! For an elimination tree where `parent[k] > k` (postordered supernodes):
//!
//! ```text
//! level[k] = 0                                  if k has no child in the forest
//! level[k] = max(level[c] for children c) + 1   otherwise
//! ```
//!
//! which is the same leaves-first level scheduling used for sparse
//! triangular solves, applied to the supernodal tree.

use std::ops::Range;

use crate::error::{Error, Result};

/// Ordered node list grouped into topological levels, plus the root layer
/// of every node at each fold level.
///
/// Produced by symbolic analysis; read-only to the factorization.
#[derive(Debug, Clone, Default)]
pub struct EliminationTopology {
    /// Global supernode ids in factorization order
    node_list: Vec<usize>,

    /// `node_list[level_limits[t]..level_limits[t + 1]]` is level `t`
    level_limits: Vec<usize>,

    /// `root_ranks[a][k0]`: fold-group rank holding node `k0` at level `a`
    root_ranks: Vec<Vec<usize>>,
}

impl EliminationTopology {
    /// Create a topology from a node list and level limits.
    ///
    /// `level_limits` must start at 0, be non-decreasing, and end at
    /// `node_list.len()`.
    pub fn new(node_list: Vec<usize>, level_limits: Vec<usize>) -> Result<Self> {
        if node_list.is_empty() && level_limits.iter().all(|&l| l == 0) {
            return Ok(Self {
                node_list,
                level_limits: vec![0],
                root_ranks: Vec::new(),
            });
        }
        if level_limits.first() != Some(&0) || level_limits.last() != Some(&node_list.len()) {
            return Err(Error::topology(
                0,
                format!(
                    "level limits {:?} do not cover {} nodes",
                    level_limits,
                    node_list.len()
                ),
            ));
        }
        if let Some(t) = level_limits.windows(2).position(|w| w[0] > w[1]) {
            return Err(Error::topology(
                t,
                format!("level limits decrease at level {t}"),
            ));
        }
        Ok(Self {
            node_list,
            level_limits,
            root_ranks: Vec::new(),
        })
    }

    /// Compute topological levels for the forest `nodes` of an elimination
    /// tree given by `parent` (`parent[k] == parent.len()` marks a root).
    ///
    /// Children outside `nodes` are ignored: their contributions are
    /// assumed folded in already. Within a level nodes are ordered by id.
    pub fn from_etree(parent: &[usize], nodes: &[usize]) -> Result<Self> {
        let n = parent.len();
        let mut in_forest = vec![false; n];
        for &k in nodes {
            if k >= n {
                return Err(Error::topology(k, format!("node outside tree of {n} supernodes")));
            }
            if in_forest[k] {
                return Err(Error::topology(k, "node listed twice"));
            }
            in_forest[k] = true;
        }

        let mut sorted = nodes.to_vec();
        sorted.sort_unstable();

        // Forward pass: children precede parents in a postordered tree
        let mut level = vec![0usize; n];
        for &k in &sorted {
            let p = parent[k];
            if p == n {
                continue;
            }
            if p <= k || p > n {
                return Err(Error::topology(
                    k,
                    format!("parent {p} does not follow its child"),
                ));
            }
            if in_forest[p] {
                level[p] = level[p].max(level[k] + 1);
            }
        }

        let num_levels = sorted.iter().map(|&k| level[k] + 1).max().unwrap_or(0);
        let mut per_level: Vec<Vec<usize>> = vec![Vec::new(); num_levels];
        for &k in &sorted {
            per_level[level[k]].push(k);
        }

        let mut node_list = Vec::with_capacity(sorted.len());
        let mut level_limits = Vec::with_capacity(num_levels + 1);
        level_limits.push(0);
        for nodes_at_level in &per_level {
            node_list.extend_from_slice(nodes_at_level);
            level_limits.push(node_list.len());
        }

        Self::new(node_list, level_limits)
    }

    /// Number of nodes in the forest
    pub fn num_nodes(&self) -> usize {
        self.node_list.len()
    }

    /// Whether the forest has no nodes
    pub fn is_empty(&self) -> bool {
        self.node_list.is_empty()
    }

    /// Number of topological levels
    pub fn num_levels(&self) -> usize {
        self.level_limits.len().saturating_sub(1)
    }

    /// Positions (`k0`) of the nodes at topological level `t`
    pub fn level_range(&self, t: usize) -> Range<usize> {
        self.level_limits[t]..self.level_limits[t + 1]
    }

    /// Global supernode id at position `k0`
    pub fn node(&self, k0: usize) -> usize {
        self.node_list[k0]
    }

    /// Global supernode ids in factorization order
    pub fn nodes(&self) -> &[usize] {
        &self.node_list
    }

    /// Level limits (`num_levels + 1` entries)
    pub fn level_limits(&self) -> &[usize] {
        &self.level_limits
    }

    /// Largest number of nodes in one level
    pub fn max_level_width(&self) -> usize {
        self.level_limits
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0)
    }

    /// Set the root ranks of every node for `fold_level`, indexed by `k0`.
    pub fn set_root_ranks(&mut self, fold_level: usize, ranks: Vec<usize>) -> Result<()> {
        if ranks.len() != self.node_list.len() {
            return Err(Error::shape_mismatch(&[self.node_list.len()], &[ranks.len()]));
        }
        if self.root_ranks.len() <= fold_level {
            self.root_ranks.resize(fold_level + 1, Vec::new());
        }
        self.root_ranks[fold_level] = ranks;
        Ok(())
    }

    /// Set root ranks for `fold_level` from `f(k0, k)`.
    pub fn assign_roots(&mut self, fold_level: usize, f: impl Fn(usize, usize) -> usize) {
        let ranks = self
            .node_list
            .iter()
            .enumerate()
            .map(|(k0, &k)| f(k0, k))
            .collect();
        // Length matches by construction
        if self.root_ranks.len() <= fold_level {
            self.root_ranks.resize(fold_level + 1, Vec::new());
        }
        self.root_ranks[fold_level] = ranks;
    }

    /// Fold-group rank designated to hold node `k0` at `fold_level`
    pub fn root_rank(&self, k0: usize, fold_level: usize) -> Result<usize> {
        self.root_ranks
            .get(fold_level)
            .and_then(|ranks| ranks.get(k0))
            .copied()
            .ok_or_else(|| {
                Error::topology(k0, format!("no root rank at fold level {fold_level}"))
            })
    }

    /// Whether the fold-group member `fold_rank` holds the grid replica
    /// that factors node `k0` at `fold_level`
    pub fn rank_has_grid(&self, k0: usize, fold_level: usize, fold_rank: usize) -> Result<bool> {
        Ok(self.root_rank(k0, fold_level)? == fold_rank)
    }

    /// Check that every root at `fold_level` is a member of a fold group of
    /// `fold_size` layers.
    pub fn validate_roots(&self, fold_level: usize, fold_size: usize) -> Result<()> {
        for k0 in 0..self.node_list.len() {
            let root = self.root_rank(k0, fold_level)?;
            if root >= fold_size {
                return Err(Error::topology(
                    self.node_list[k0],
                    format!("root rank {root} outside fold group of {fold_size}"),
                ));
            }
        }
        Ok(())
    }
}
