//! Level-by-level driver of the ancestor factorization

use crate::algorithm::hierarchy::CommHierarchy;
use crate::algorithm::kernels::DenseKernels;
use crate::algorithm::layout::SupernodeLayout;
use crate::algorithm::panel::LuPanels;
use crate::algorithm::scratch::ScratchPool;
use crate::algorithm::topology::EliminationTopology;
use crate::error::{Error, Result, reserve_exact};
use crate::grid::ProcessGrid3D;
use crate::runtime::Communicator;

use super::observer::{FactorObserver, MemoryUsage, NoopObserver};
use super::pipeline::Pipeline;
use super::types::{FactorOptions, FactorStatus, TagSpace};

static NOOP: NoopObserver = NoopObserver;

/// Factorization of the ancestor nodes shared by several grid layers.
///
/// # Algorithm
///
/// ```text
/// for each topological level t (strictly in sequence):
///   for each node k0 in level t (caller order):
///     root     = topology.root_rank(k0, fold_level)
///     has_grid = (my fold rank == root)
///     FOLD_REDUCE, [FACTOR, BCAST_DIAG, SOLVE, BCAST_PANEL,
///     SCHUR_UPDATE if has_grid], UNFOLD_BROADCAST
/// ```
///
/// Every process of the 3D grid calls [`Self::run`] with the same topology,
/// layout, and fold level. Collectives are issued synchronously, so nodes of
/// one level never overlap; each uses the diagonal factor slot
/// `offset % slots`, where `offset` is its position within the level.
///
/// # Example
///
/// ```ignore
/// let grid = ProcessGrid3D::new(&world, 2, 2, 2)?;
/// let hierarchy = CommHierarchy::build(grid.z_comm(), 2, grid.layer())?;
/// let kernels = CpuKernels::default();
/// let status = AncestorFactor::new(&grid, &hierarchy, &kernels, FactorOptions::default())
///     .run(&mut panels, 0, &topology, &mut scratch, &layout, &TagSpace::default())?;
/// ```
pub struct AncestorFactor<'a, C: Communicator, K: DenseKernels + ?Sized> {
    grid: &'a ProcessGrid3D<C>,
    hierarchy: &'a CommHierarchy<C>,
    kernels: &'a K,
    options: FactorOptions,
    observer: &'a dyn FactorObserver,
}

impl<'a, C: Communicator, K: DenseKernels + ?Sized> AncestorFactor<'a, C, K> {
    /// Create a factorization context
    pub fn new(
        grid: &'a ProcessGrid3D<C>,
        hierarchy: &'a CommHierarchy<C>,
        kernels: &'a K,
        options: FactorOptions,
    ) -> Self {
        Self {
            grid,
            hierarchy,
            kernels,
            options,
            observer: &NOOP,
        }
    }

    /// Report progress to `observer`
    pub fn with_observer(mut self, observer: &'a dyn FactorObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Options in effect
    pub fn options(&self) -> &FactorOptions {
        &self.options
    }

    /// Allocate a scratch pool sized for `topology` and the lookahead depth
    pub fn scratch_for(
        &self,
        layout: &SupernodeLayout,
        topology: &EliminationTopology,
    ) -> Result<ScratchPool> {
        let slots = self.options.num_lookaheads.min(topology.max_level_width());
        ScratchPool::new(layout, self.grid.nprow(), self.grid.npcol(), slots)
    }

    /// Factor every node of `topology` at `fold_level`.
    ///
    /// Returns the local numeric status; tiny pivots do not stop the
    /// pipeline. Topology and sizing errors are reported before any
    /// collective is issued. A failed collective has already aborted the
    /// process group when its error is returned. Once the options are valid
    /// the observer sees both `on_enter` and `on_exit`, also on error.
    pub fn run(
        &self,
        panels: &mut LuPanels,
        fold_level: usize,
        topology: &EliminationTopology,
        scratch: &mut ScratchPool,
        layout: &SupernodeLayout,
        tags: &TagSpace,
    ) -> Result<FactorStatus> {
        self.options.validate()?;
        self.observer.on_enter(&MemoryUsage {
            panel_bytes: panels.bytes(),
            scratch_bytes: scratch.bytes(),
        });

        let mut status = FactorStatus::default();
        let outcome =
            self.run_levels(panels, fold_level, topology, scratch, layout, tags, &mut status);

        let usage = MemoryUsage {
            panel_bytes: panels.bytes(),
            scratch_bytes: scratch.bytes(),
        };
        self.observer.on_exit(&usage, &status);
        outcome.map(|()| status)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_levels(
        &self,
        panels: &mut LuPanels,
        fold_level: usize,
        topology: &EliminationTopology,
        scratch: &mut ScratchPool,
        layout: &SupernodeLayout,
        tags: &TagSpace,
        status: &mut FactorStatus,
    ) -> Result<()> {
        if topology.is_empty() {
            tracing::debug!(fold_level, "no ancestor nodes");
            return Ok(());
        }

        if self.hierarchy.layer() != self.grid.layer() {
            return Err(Error::invalid_argument(
                "hierarchy",
                format!(
                    "built for layer {}, grid is on layer {}",
                    self.hierarchy.layer(),
                    self.grid.layer()
                ),
            ));
        }
        if scratch.ldt() < layout.max_super_size() {
            return Err(Error::shape_mismatch(&[layout.max_super_size()], &[scratch.ldt()]));
        }

        let pipeline = Pipeline {
            grid: self.grid,
            fold: self.hierarchy.fold_group(fold_level)?,
            fold_level,
            layout,
            kernels: self.kernels,
            options: &self.options,
            observer: self.observer,
        };
        topology.validate_roots(fold_level, pipeline.fold.size())?;

        // Validate every node before the first collective
        let mut steps = Vec::new();
        reserve_exact(&mut steps, "ancestor node steps", topology.num_nodes())?;
        for t in 0..topology.num_levels() {
            let range = topology.level_range(t);
            let k_st = range.start;
            for k0 in range {
                let step = pipeline.resolve(topology, k0, k0 - k_st, panels, scratch.recv(), tags)?;
                steps.push(step);
            }
        }

        tracing::debug!(
            fold_level,
            nodes = steps.len(),
            levels = topology.num_levels(),
            fold_size = pipeline.fold.size(),
            "ancestor factorization start"
        );

        for step in &steps {
            let (slot, recv) = scratch.split(step.offset);
            pipeline.process(step, panels, slot, recv, status)?;
        }

        tracing::debug!(
            fold_level,
            code = status.code(),
            singular = status.singular_pivots,
            "ancestor factorization done"
        );
        Ok(())
    }
}

/// Factor the ancestor nodes of `topology` at `fold_level` with default
/// observation.
///
/// See [`AncestorFactor::run`].
#[allow(clippy::too_many_arguments)]
pub fn ancestor_factor<C: Communicator, K: DenseKernels + ?Sized>(
    grid: &ProcessGrid3D<C>,
    hierarchy: &CommHierarchy<C>,
    kernels: &K,
    options: &FactorOptions,
    panels: &mut LuPanels,
    fold_level: usize,
    topology: &EliminationTopology,
    scratch: &mut ScratchPool,
    layout: &SupernodeLayout,
    tags: &TagSpace,
) -> Result<FactorStatus> {
    AncestorFactor::new(grid, hierarchy, kernels, options.clone())
        .run(panels, fold_level, topology, scratch, layout, tags)
}

/// [`ancestor_factor`] reduced to an integer status: 0 on success, otherwise
/// the [`crate::error::ErrorKind`] code of the first problem encountered
/// (2 for a tiny pivot).
#[allow(clippy::too_many_arguments)]
pub fn ancestor_factor_status<C: Communicator, K: DenseKernels + ?Sized>(
    grid: &ProcessGrid3D<C>,
    hierarchy: &CommHierarchy<C>,
    kernels: &K,
    options: &FactorOptions,
    panels: &mut LuPanels,
    fold_level: usize,
    topology: &EliminationTopology,
    scratch: &mut ScratchPool,
    layout: &SupernodeLayout,
    tags: &TagSpace,
) -> i32 {
    match ancestor_factor(
        grid, hierarchy, kernels, options, panels, fold_level, topology, scratch, layout, tags,
    ) {
        Ok(status) => status.code(),
        Err(e) => {
            tracing::error!(error = %e, "ancestor factorization failed");
            e.code()
        }
    }
}
