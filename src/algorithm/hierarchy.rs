//! Communicator hierarchy for binary layer folding
//!
//! At fold level `a` the layer index space is cut into contiguous blocks of
//! `2^(a+1)` layers. Each block becomes one communicator:
//!
//! ```text
//! L = 16
//! level 0: [0,1] [2,3] [4,5] [6,7] [8,9] [10,11] [12,13] [14,15]
//! level 1: [0..3] [4..7] [8..11] [12..15]
//! level 2: [0..7] [8..15]
//! level 3: [0..15]
//! ```
//!
//! The implicit level whose block covers every layer is the base group
//! itself; for a power-of-two `L` the hierarchy holds `log2(L)` levels, the
//! last of which spans all layers.

use crate::error::{Error, Result, reserve_exact};
use crate::runtime::Communicator;

/// Number of fold levels for `nlayers` layers: `ceil(log2(nlayers))`.
pub fn fold_depth(nlayers: usize) -> usize {
    if nlayers <= 1 {
        0
    } else {
        (usize::BITS - (nlayers - 1).leading_zeros()) as usize
    }
}

/// Layers per fold block at `fold_level`: `2^(fold_level + 1)`.
pub fn fold_block_size(fold_level: usize) -> usize {
    1usize << (fold_level + 1)
}

/// First layer of the fold block containing `layer` at `fold_level`.
pub fn fold_block_base(layer: usize, fold_level: usize) -> usize {
    let size = fold_block_size(fold_level);
    (layer / size) * size
}

/// Rank of `layer` inside its fold block at `fold_level`.
pub fn fold_local_rank(layer: usize, fold_level: usize) -> usize {
    layer - fold_block_base(layer, fold_level)
}

/// The fold communicators of one process, indexed by fold level.
///
/// Built once, immutable afterwards.
#[derive(Debug)]
pub struct CommHierarchy<C: Communicator> {
    nlayers: usize,
    layer: usize,
    levels: Vec<C>,
}

/// The fold group a node is processed in.
#[derive(Debug)]
pub enum FoldGroup<'a, C: Communicator> {
    /// Only one layer: no reduction or un-fold broadcast is needed
    Solo,
    /// A group of two or more layers
    Shared(&'a C),
}

impl<C: Communicator> Clone for FoldGroup<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Communicator> Copy for FoldGroup<'_, C> {}

impl<C: Communicator> FoldGroup<'_, C> {
    /// This process's rank within the fold group
    pub fn rank(&self) -> usize {
        match self {
            Self::Solo => 0,
            Self::Shared(comm) => comm.rank(),
        }
    }

    /// Number of layers in the fold group
    pub fn size(&self) -> usize {
        match self {
            Self::Solo => 1,
            Self::Shared(comm) => comm.size(),
        }
    }
}

impl<C: Communicator> CommHierarchy<C> {
    /// Split `base` (one member per layer, ranked by layer) into the nested
    /// fold groups.
    ///
    /// Collective over `base`. `nlayers` must equal `base.size()` and
    /// `layer` the caller's rank in it.
    pub fn build(base: &C, nlayers: usize, layer: usize) -> Result<Self> {
        if nlayers == 0 || nlayers != base.size() {
            return Err(Error::invalid_argument(
                "nlayers",
                format!("{nlayers} layers for a base group of {}", base.size()),
            ));
        }
        if layer != base.rank() {
            return Err(Error::invalid_argument(
                "layer",
                format!("layer {layer} differs from base rank {}", base.rank()),
            ));
        }

        let depth = fold_depth(nlayers);
        let mut levels = Vec::new();
        reserve_exact(&mut levels, "fold communicator array", depth)?;

        for alvl in 0..depth {
            let base_layer = fold_block_base(layer, alvl);
            let local_rank = layer - base_layer;
            let comm = base.split(base_layer, local_rank)?;
            tracing::trace!(
                alvl,
                base_layer,
                local_rank,
                size = comm.size(),
                "fold communicator"
            );
            levels.push(comm);
        }

        Ok(Self {
            nlayers,
            layer,
            levels,
        })
    }

    /// Number of fold levels
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Total layer count the hierarchy was built for
    pub fn nlayers(&self) -> usize {
        self.nlayers
    }

    /// This process's layer
    pub fn layer(&self) -> usize {
        self.layer
    }

    /// Communicator of fold level `fold_level`, if it exists
    pub fn comm(&self, fold_level: usize) -> Option<&C> {
        self.levels.get(fold_level)
    }

    /// Fold group for `fold_level`.
    ///
    /// A single-layer grid has no fold levels; level 0 then resolves to
    /// [`FoldGroup::Solo`].
    pub fn fold_group(&self, fold_level: usize) -> Result<FoldGroup<'_, C>> {
        match self.levels.get(fold_level) {
            Some(comm) if comm.size() > 1 => Ok(FoldGroup::Shared(comm)),
            Some(_) => Ok(FoldGroup::Solo),
            None if self.levels.is_empty() && fold_level == 0 => Ok(FoldGroup::Solo),
            None => Err(Error::invalid_argument(
                "fold_level",
                format!(
                    "fold level {fold_level} out of range for {} levels",
                    self.levels.len()
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::local::{LocalConfig, run_ranks};

    #[test]
    fn test_fold_depth() {
        assert_eq!(fold_depth(1), 0);
        assert_eq!(fold_depth(2), 1);
        assert_eq!(fold_depth(4), 2);
        assert_eq!(fold_depth(8), 3);
        assert_eq!(fold_depth(16), 4);
        // Non power of two rounds up
        assert_eq!(fold_depth(6), 3);
    }

    #[test]
    fn test_block_geometry() {
        assert_eq!(fold_block_size(0), 2);
        assert_eq!(fold_block_size(2), 8);
        assert_eq!(fold_block_base(5, 0), 4);
        assert_eq!(fold_block_base(5, 1), 4);
        assert_eq!(fold_block_base(5, 2), 0);
        assert_eq!(fold_local_rank(11, 1), 3);
    }

    #[test]
    fn test_build_eight_layers() {
        let results = run_ranks(8, &LocalConfig::default(), |base| {
            let layer = base.rank();
            let h = CommHierarchy::build(&base, 8, layer)?;
            let shape: Vec<(usize, usize)> = (0..h.depth())
                .map(|a| {
                    let c = h.comm(a).unwrap();
                    (c.rank(), c.size())
                })
                .collect();
            Ok(shape)
        });
        for (layer, r) in results.into_iter().enumerate() {
            let shape = r.unwrap();
            assert_eq!(shape.len(), 3);
            for (a, &(rank, size)) in shape.iter().enumerate() {
                assert_eq!(size, fold_block_size(a));
                assert_eq!(rank, fold_local_rank(layer, a));
            }
        }
    }

    #[test]
    fn test_single_layer_is_solo() {
        let results = run_ranks(1, &LocalConfig::default(), |base| {
            let h = CommHierarchy::build(&base, 1, 0)?;
            assert_eq!(h.depth(), 0);
            assert!(matches!(h.fold_group(0)?, FoldGroup::Solo));
            assert!(h.fold_group(1).is_err());
            Ok(())
        });
        results.into_iter().for_each(|r| r.unwrap());
    }
}
