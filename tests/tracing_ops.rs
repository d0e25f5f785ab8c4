//! Structured logging emitted by the ancestor factorization

mod common;

use std::fmt;
use std::sync::Arc;

use common::quick_config;
use lu3d::prelude::*;
use parking_lot::Mutex;
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

struct Recorder {
    lines: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for Recorder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::Id,
        _ctx: Context<'_, S>,
    ) {
        self.lines
            .lock()
            .push(format!("span: {}", attrs.metadata().name()));
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.lines
            .lock()
            .push(format!("{}: {}", event.metadata().level(), visitor.0));
    }
}

#[test]
fn test_node_spans_and_pivot_warning() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(Recorder {
        lines: Arc::clone(&lines),
    });
    // Rank threads log through the global dispatcher
    tracing::subscriber::set_global_default(subscriber)
        .expect("no other subscriber in this binary");

    let layout = SupernodeLayout::uniform(2, 1).unwrap();
    let mut topology = EliminationTopology::from_etree(&[1, 2], &[0, 1]).unwrap();
    topology.assign_roots(0, |_, _| 0);

    let results = run_ranks(1, &quick_config(), |world| {
        let grid = ProcessGrid3D::new(&world, 1, 1, 1)?;
        let hierarchy = CommHierarchy::build(grid.z_comm(), 1, 0)?;
        let mut panels = LuPanels::for_grid(&grid, &layout)?;
        panels.fill_with(&layout, |r, c| if r == c { 0.0 } else { 1.0 });
        let kernels = CpuKernels::default();
        let factor = AncestorFactor::new(&grid, &hierarchy, &kernels, FactorOptions::default());
        let mut scratch = factor.scratch_for(&layout, &topology)?;
        factor.run(&mut panels, 0, &topology, &mut scratch, &layout, &TagSpace::default())
    });
    assert!(!results[0].as_ref().unwrap().is_success());

    let lines = lines.lock();
    let node_spans = lines.iter().filter(|l| *l == "span: ancestor_node").count();
    assert_eq!(node_spans, 2);
    assert!(
        lines.iter().any(|l| l == "WARN: tiny pivot in diagonal block"),
        "{lines:?}"
    );
}
