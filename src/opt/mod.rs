//! Optimization passes over the mid-level SSA graph.
//!
//! The pipeline runs these after value numbering, on a graph whose blocks
//! are already numbered in reverse postorder. Each pass runs to completion
//! in one synchronous call and owns the graph exclusively for its duration.

use crate::mir::{InstRef, MirGraph, writer::graph_to_string};

pub mod bounds_check;
pub mod constant_propagation;
pub mod induction_variable;
pub mod worklist;

pub use bounds_check::BoundsCheckElimination;
pub use constant_propagation::ConstantPropagation;
pub use induction_variable::InductionVariable;
pub use worklist::InstWorklist;

/// Which passes the driver runs.
#[derive(Debug, Clone, Copy)]
pub struct OptOptions {
    pub constant_propagation: bool,
    pub bounds_check_elimination: bool,
}

impl Default for OptOptions {
    fn default() -> Self {
        Self { constant_propagation: true, bounds_check_elimination: true }
    }
}

/// Optional observer the passes report events to. Purely diagnostic; the
/// passes behave identically with or without one.
pub trait IOptObserver {
    fn on_fold(&mut self, _graph: &MirGraph, _def: InstRef, _folded_to: InstRef) {}
    fn on_check_eliminated(&mut self, _graph: &MirGraph, _check: InstRef) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CpStats {
    /// Definitions (phis included) visited while seeding.
    pub total_definitions: u32,
    /// Definitions replaced by a constant or an existing instruction.
    pub folded: u32,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BceStats {
    /// Loop headers where an induction variable pattern matched.
    pub induction_variables: u32,
    /// Bounds checks proven redundant and discarded.
    pub eliminated: u32,
}

pub fn optimize_graph(graph: &mut MirGraph, options: &OptOptions) -> bool {
    let mut changed = false;
    if options.constant_propagation {
        let mut cp = ConstantPropagation::new();
        changed |= cp.analyze(graph);
    }
    if options.bounds_check_elimination {
        let mut bce = BoundsCheckElimination::new();
        bce.analyze(graph);
        changed |= bce.stats.eliminated > 0;
    }
    if log::log_enabled!(log::Level::Trace) {
        log::trace!(target: "opt", "graph after optimization:\n{}", graph_to_string(graph));
    }
    changed
}

/// Same as [`optimize_graph`], reporting per-event diagnostics to
/// `observer`.
pub fn optimize_graph_observed(
    graph: &mut MirGraph,
    options: &OptOptions,
    observer: &mut dyn IOptObserver,
) -> bool {
    let mut changed = false;
    if options.constant_propagation {
        let mut cp = ConstantPropagation::with_observer(&mut *observer);
        changed |= cp.analyze(graph);
    }
    if options.bounds_check_elimination {
        let mut bce = BoundsCheckElimination::with_observer(&mut *observer);
        bce.analyze(graph);
        changed |= bce.stats.eliminated > 0;
    }
    changed
}
