//! Constant propagation with phi-cycle resolution.
//!
//! The pass seeds a worklist with the consumers of every constant in the
//! graph, then repeatedly folds definitions whose operands became constant
//! and rewrites their uses. Phis that refuse to fold are collected and
//! resolved afterwards as a group: each gets a three-point lattice entry
//! (`Bottom` → `Constant` → `Top`) relaxed to a fixed point over the whole
//! pending set, which is what cracks cycles like `p = phi(c, p)` that no
//! amount of acyclic folding can reach. Phis proven constant are rewritten
//! and re-queued, and the drain/resolve rounds repeat until neither makes
//! progress.
//!
//! Opcodes that carry call or allocation semantics (`PassArg`, `Call`,
//! `CreateThis`) are never folded and never queued: their operands must
//! remain actual instructions.

use crate::{
    base::{INullableValue, SlabRef},
    mir::{ConstValue, InstData, InstOp, InstRef, MirGraph},
    opt::{CpStats, IOptObserver, InstWorklist},
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LatticeState {
    /// Nothing known yet.
    Bottom,
    /// Always the value of the carried constant instruction.
    Constant,
    /// Proven not reducible to a single constant.
    Top,
}

#[derive(Debug, Clone, Copy)]
struct PhiLatticeEntry {
    state: LatticeState,
    /// Constant instruction backing the `Constant` state; null otherwise.
    constant: InstRef,
}

impl Default for PhiLatticeEntry {
    fn default() -> Self {
        Self { state: LatticeState::Bottom, constant: InstRef::new_null() }
    }
}

impl PhiLatticeEntry {
    fn constant(inst: InstRef) -> Self {
        Self { state: LatticeState::Constant, constant: inst }
    }
    fn top() -> Self {
        Self { state: LatticeState::Top, constant: InstRef::new_null() }
    }
}

/// What a fold produced.
enum FoldResult {
    /// No rule applied or an operand is not constant.
    Unchanged,
    /// The definition reduces to an instruction already in the graph.
    Existing(InstRef),
    /// The definition evaluates to a fresh constant.
    Folded(ConstValue),
}

pub struct ConstantPropagation<'obs> {
    worklist: InstWorklist,
    pending_phis: HashMap<InstRef, PhiLatticeEntry>,
    observer: Option<&'obs mut dyn IOptObserver>,
    pub stats: CpStats,
}

impl<'obs> ConstantPropagation<'obs> {
    pub fn new() -> Self {
        Self {
            worklist: InstWorklist::new(),
            pending_phis: HashMap::new(),
            observer: None,
            stats: CpStats::default(),
        }
    }

    pub fn with_observer(observer: &'obs mut dyn IOptObserver) -> Self {
        Self { observer: Some(observer), ..Self::new() }
    }

    /// Run to a fixed point. Returns whether anything was rewritten.
    pub fn analyze(&mut self, graph: &mut MirGraph) -> bool {
        log::debug!(target: "cp", "beginning constant propagation on `{}`", graph.name);
        let mut updated = false;

        self.init_worklist(graph);
        loop {
            while let Some(def) = self.worklist.pop() {
                updated |= self.visit(graph, def);
            }
            self.solve_phi_cycles(graph);
            if self.worklist.is_empty() {
                break;
            }
        }

        log::debug!(
            target: "cp",
            "constant propagation end: folded {}/{} definitions",
            self.stats.folded,
            self.stats.total_definitions
        );
        updated
    }

    /// Seed: consumers of every constant already in the graph.
    fn init_worklist(&mut self, graph: &MirGraph) {
        for &block in graph.block_order() {
            self.stats.total_definitions += graph.block(block).phis().len() as u32;
            for &inst in graph.block(block).insts() {
                self.stats.total_definitions += 1;
                let data = graph.inst(inst);
                if data.is_constant() && !is_denylisted(data) {
                    self.add_uses_to_worklist(graph, inst);
                }
            }
        }
    }

    /// Fold one definition and, on success, rewrite its consumers.
    fn visit(&mut self, graph: &mut MirGraph, def: InstRef) -> bool {
        let folded = match fold_to_constant(graph, def) {
            FoldResult::Unchanged => def,
            FoldResult::Existing(inst) => inst,
            FoldResult::Folded(value) => graph.insert_constant_before(def, value),
        };
        if folded == def {
            // An unfoldable phi may still be part of a resolvable cycle.
            if graph.inst(def).is_phi() {
                self.pending_phis.entry(def).or_default();
            }
            return false;
        }

        // The consumers may become foldable now that this value is known.
        self.add_uses_to_worklist(graph, def);

        let phi_slot = graph.inst(def).as_phi().map(|p| p.slot as usize);
        if let Some(slot) = phi_slot {
            let start = graph.inst(def).parent();
            graph.replace_all_uses(def, folded);
            // Blocks downstream still record the phi in their entry slot
            // tables; patch those through to the replacement.
            let blocks = graph.blocks_from(start).to_vec();
            for block in blocks {
                let body = graph.block_mut(block);
                if slot < body.stack_depth() && body.get_slot(slot) == def {
                    body.init_slot(slot, folded);
                }
            }
        } else {
            graph.replace_all_uses(def, folded);
        }

        self.stats.folded += 1;
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_fold(graph, def, folded);
        }
        log::debug!(
            target: "cp",
            "definition %{} folded to %{}",
            def.get_handle(),
            folded.get_handle()
        );
        true
    }

    fn add_uses_to_worklist(&mut self, graph: &MirGraph, def: InstRef) {
        for edge in graph.inst(def).uses() {
            if !is_denylisted(graph.inst(edge.user)) {
                self.worklist.insert(edge.user);
            }
        }
    }

    /// Relax the pending phi lattice to a fixed point, then rewrite every
    /// phi that settled on `Constant` and hand it back to the worklist.
    fn solve_phi_cycles(&mut self, graph: &mut MirGraph) {
        if self.pending_phis.is_empty() {
            return;
        }
        loop {
            let mut updated = false;
            let pending: Vec<InstRef> = self.pending_phis.keys().copied().collect();
            for phi in pending {
                let mut entry = self.pending_phis[&phi];
                if self.analyze_phi(graph, phi, &mut entry) {
                    updated = true;
                }
                self.pending_phis.insert(phi, entry);
            }
            if !updated {
                break;
            }
        }

        let (mut bottom, mut constant, mut top) = (0u32, 0u32, 0u32);
        let resolved: Vec<(InstRef, PhiLatticeEntry)> = self.pending_phis.drain().collect();
        for (phi, entry) in resolved {
            match entry.state {
                LatticeState::Bottom => bottom += 1,
                LatticeState::Top => top += 1,
                LatticeState::Constant => {
                    constant += 1;
                    let c = entry.constant;
                    assert!(
                        c.is_nonnull(),
                        "Lattice entry claims a constant but carries none"
                    );
                    for slot in 0..graph.inst(phi).num_operands() {
                        graph.set_operand(phi, slot, c);
                    }
                    self.worklist.insert(phi);
                }
            }
        }
        log::debug!(
            target: "cp",
            "phi cycles [bottom, constant, top] = [{bottom}, {constant}, {top}]"
        );
    }

    /// Re-fold one phi's lattice entry over its operands. Constants
    /// contribute their value, pending phis contribute their current entry
    /// (created at `Bottom` on first sight), everything else contributes
    /// `Top`.
    fn analyze_phi(
        &mut self,
        graph: &MirGraph,
        phi: InstRef,
        entry: &mut PhiLatticeEntry,
    ) -> bool {
        let mut updated = false;
        for slot in 0..graph.inst(phi).num_operands() {
            let operand = graph.inst(phi).operand(slot);
            let from = if graph.inst(operand).is_constant() {
                PhiLatticeEntry::constant(operand)
            } else if graph.inst(operand).is_phi() {
                *self.pending_phis.entry(operand).or_default()
            } else {
                PhiLatticeEntry::top()
            };
            updated |= propagate(graph, entry, from);
        }
        updated
    }
}

/// Lattice merge. States only ever move up (`Bottom` → `Constant` → `Top`);
/// returns whether `to` changed.
fn propagate(graph: &MirGraph, to: &mut PhiLatticeEntry, from: PhiLatticeEntry) -> bool {
    match to.state {
        LatticeState::Bottom => {
            if from.state != LatticeState::Bottom {
                *to = from;
                return true;
            }
            false
        }
        LatticeState::Constant => {
            assert!(to.constant.is_nonnull(), "Constant lattice entry lost its value");
            let conflicts = match from.state {
                LatticeState::Top => true,
                LatticeState::Constant => {
                    graph.const_value(from.constant) != graph.const_value(to.constant)
                }
                LatticeState::Bottom => false,
            };
            if conflicts {
                *to = PhiLatticeEntry::top();
                return true;
            }
            false
        }
        LatticeState::Top => false,
    }
}

/// Opcodes whose operands must stay actual instructions: folding them away
/// would drop call/allocation semantics.
fn is_denylisted(data: &InstData) -> bool {
    matches!(data.op(), InstOp::PassArg | InstOp::Call | InstOp::CreateThis)
}

/// Pure, opcode-specific evaluation of `def` over its current operands.
fn fold_to_constant(graph: &MirGraph, def: InstRef) -> FoldResult {
    let data = graph.inst(def);
    match data.op() {
        // A phi folds without lattice help only when every input is the
        // same instruction, or all inputs are value-equal constants.
        InstOp::Phi(_) => {
            let operands = data.operands();
            let Some(&first) = operands.first() else {
                return FoldResult::Unchanged;
            };
            if operands.iter().all(|&o| o == first) {
                return FoldResult::Existing(first);
            }
            let Some(value) = graph.inst(first).as_constant() else {
                return FoldResult::Unchanged;
            };
            if operands[1..].iter().all(|&o| graph.inst(o).as_constant() == Some(value)) {
                FoldResult::Existing(first)
            } else {
                FoldResult::Unchanged
            }
        }
        InstOp::Add => {
            let (Some(lhs), Some(rhs)) = (
                graph.inst(data.operand(0)).as_int32_constant(),
                graph.inst(data.operand(1)).as_int32_constant(),
            ) else {
                return FoldResult::Unchanged;
            };
            // Overflow would bail out at runtime; folding it away would
            // change behavior.
            match lhs.checked_add(rhs) {
                Some(sum) => FoldResult::Folded(ConstValue::Int32(sum)),
                None => FoldResult::Unchanged,
            }
        }
        InstOp::Compare(cond) => {
            let (Some(lhs), Some(rhs)) = (
                graph.inst(data.operand(0)).as_int32_constant(),
                graph.inst(data.operand(1)).as_int32_constant(),
            ) else {
                return FoldResult::Unchanged;
            };
            FoldResult::Folded(ConstValue::Boolean(cond.eval(lhs, rhs)))
        }
        InstOp::ToInt32 => {
            let input = data.operand(0);
            match graph.inst(input).as_int32_constant() {
                Some(_) => FoldResult::Existing(input),
                None => FoldResult::Unchanged,
            }
        }
        // Box/unbox of a known value is the value itself.
        InstOp::Box | InstOp::Unbox => {
            let input = data.operand(0);
            if graph.inst(input).is_constant() {
                FoldResult::Existing(input)
            } else {
                FoldResult::Unchanged
            }
        }
        _ => FoldResult::Unchanged,
    }
}
