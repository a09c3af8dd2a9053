//! Bounds-check elimination.
//!
//! For every loop header with a recognized induction variable, the pass
//! scans the variable's consumers (looking one level through `ToInt32` and
//! `Unbox` re-typings) for bounds checks it can prove redundant from the
//! variable's static range and an array length that provably never changes.
//! Proven checks are collected first and deleted in a separate batch so no
//! use-list is invalidated mid-scan; a check whose consumers cannot all be
//! rewritten is kept, correctness over aggressiveness.
//!
//! The unchanging-length proof is syntactic: any store-classified consumer
//! of the array constant blocks elimination, even one writing an unrelated
//! array. That costs optimizations, never correctness.

use crate::{
    base::SlabRef,
    mir::{InstRef, MirGraph},
    opt::{BceStats, IOptObserver, InductionVariable},
};
use std::collections::BTreeSet;

pub struct BoundsCheckElimination<'obs> {
    /// Checks proven redundant during the scan, keyed by id; consumed by
    /// the deletion phase.
    unneeded_checks: BTreeSet<InstRef>,
    observer: Option<&'obs mut dyn IOptObserver>,
    pub stats: BceStats,
}

impl<'obs> BoundsCheckElimination<'obs> {
    pub fn new() -> Self {
        Self {
            unneeded_checks: BTreeSet::new(),
            observer: None,
            stats: BceStats::default(),
        }
    }

    pub fn with_observer(observer: &'obs mut dyn IOptObserver) -> Self {
        Self { observer: Some(observer), ..Self::new() }
    }

    /// Scan the whole graph, then delete what was proven redundant. The
    /// return value signals completion, not whether anything was removed.
    pub fn analyze(&mut self, graph: &mut MirGraph) -> bool {
        log::debug!(target: "bce", "beginning bounds check elimination on `{}`", graph.name);

        for &block in graph.block_order() {
            let mut ind_var = InductionVariable::new(block);
            if !ind_var.extract_pattern(graph) {
                continue;
            }
            self.stats.induction_variables += 1;
            log::debug!(
                target: "bce",
                "induction variable found: %{} in block{}",
                ind_var.variable().get_handle(),
                graph.block(block).id()
            );

            for edge in graph.inst(ind_var.variable()).uses() {
                let use_node = edge.user;
                if self.try_elimination(graph, &ind_var, use_node) {
                    continue;
                }
                // The consumer may re-type the index before it reaches the
                // bounds check; look one level through those.
                let data = graph.inst(use_node);
                if data.is_to_int32() || data.is_unbox() {
                    for converted_edge in data.uses() {
                        self.try_elimination(graph, &ind_var, converted_edge.user);
                    }
                }
            }
        }

        self.eliminate_unneeded_checks(graph);
        true
    }

    /// Dispatch on the check shape. Nothing is mutated here; proven checks
    /// are queued for the deletion phase.
    fn try_elimination(
        &mut self,
        graph: &MirGraph,
        ind_var: &InductionVariable,
        def: InstRef,
    ) -> bool {
        // The range must hold in the block the consumer sits in.
        if !ind_var.range_is_valid(graph, graph.inst(def).parent()) {
            return false;
        }

        if let Some(check) = graph.inst(def).as_bounds_check() {
            if check.minimum == 0 && check.maximum == 0 {
                self.eliminate_exact_check(graph, ind_var, def)
            } else {
                self.eliminate_range_check(graph, ind_var, def)
            }
        } else if graph.inst(def).as_bounds_check_lower().is_some() {
            self.eliminate_lower_check(graph, ind_var, def)
        } else {
            false
        }
    }

    /// Plain `0 <= index < length` check. Provable either against a length
    /// that is itself a compile-time integer, or against the initialized
    /// length of a known dense array that no store can reach.
    fn eliminate_exact_check(
        &mut self,
        graph: &MirGraph,
        ind_var: &InductionVariable,
        check: InstRef,
    ) -> bool {
        if !ind_var.has_upper_bound() {
            return false;
        }
        let upper_bound = ind_var.upper_bound();
        let length = graph.inst(check).operand(1);

        if let Some(constant_length) = graph.inst(length).as_int32_constant() {
            if upper_bound <= constant_length {
                self.mark_unneeded(check);
                return true;
            }
            return false;
        }

        let Some(array) = constant_dense_array_behind_length(graph, length) else {
            return false;
        };
        if !has_unchangeable_length(graph, array) {
            return false;
        }
        let initialized_length = graph
            .const_value(array)
            .dense_array_initialized_length()
            .expect("Checked to be a dense array above");

        // Matches the machine comparison of a possibly-negative bound
        // against an unsigned length: a negative bound never qualifies.
        if upper_bound >= 0 && (upper_bound as u32) <= initialized_length {
            self.mark_unneeded(check);
            return true;
        }
        false
    }

    /// Offset check `index + minimum >= 0 && index + maximum < length`.
    /// Needs both ends of the variable's range.
    fn eliminate_range_check(
        &mut self,
        graph: &MirGraph,
        ind_var: &InductionVariable,
        check: InstRef,
    ) -> bool {
        let bounds = graph.inst(check).as_bounds_check().expect("Dispatched on shape");
        let (minimum, maximum) = (bounds.minimum, bounds.maximum);

        if !ind_var.has_lower_bound() || !ind_var.has_upper_bound() {
            return false;
        }

        let length = graph.inst(check).operand(1);
        let Some(array) = constant_dense_array_behind_length(graph, length) else {
            return false;
        };
        if !has_unchangeable_length(graph, array) {
            return false;
        }
        let initialized_length = graph
            .const_value(array)
            .dense_array_initialized_length()
            .expect("Checked to be a dense array above") as i64;

        let lowest = ind_var.lower_bound() as i64 + minimum as i64;
        let highest = ind_var.upper_bound() as i64 + maximum as i64;
        if lowest >= 0 && highest >= 0 && highest <= initialized_length {
            self.mark_unneeded(check);
            return true;
        }
        false
    }

    /// `index >= minimum` alone; no length involved.
    fn eliminate_lower_check(
        &mut self,
        graph: &MirGraph,
        ind_var: &InductionVariable,
        check: InstRef,
    ) -> bool {
        let minimum =
            graph.inst(check).as_bounds_check_lower().expect("Dispatched on shape").minimum;
        if !ind_var.has_lower_bound() {
            return false;
        }
        if ind_var.lower_bound() >= minimum {
            self.mark_unneeded(check);
            return true;
        }
        false
    }

    fn mark_unneeded(&mut self, check: InstRef) {
        self.unneeded_checks.insert(check);
    }

    /// Deletion phase. Element loads guarded by a proven check are rewired
    /// to read through the check's index operand; the check is discarded
    /// only when every consumer could be rewritten that way.
    fn eliminate_unneeded_checks(&mut self, graph: &mut MirGraph) {
        while let Some(check) = self.unneeded_checks.pop_first() {
            let index = graph.inst(check).operand(0);
            let mut can_delete = true;
            for edge in graph.inst(check).uses().to_vec() {
                if graph.inst(edge.user).is_load_element() {
                    graph.set_operand(edge.user, edge.slot as usize, index);
                } else {
                    can_delete = false;
                }
            }
            if !can_delete {
                continue;
            }

            if let Some(observer) = self.observer.as_deref_mut() {
                observer.on_check_eliminated(graph, check);
            }
            graph.discard(check);
            self.stats.eliminated += 1;
            log::debug!(target: "bce", "bounds check %{} eliminated", check.get_handle());
        }
    }
}

/// Walk `length -> initialized-length -> elements -> object` and require the
/// object to be a compile-time dense-array constant.
fn constant_dense_array_behind_length(graph: &MirGraph, length: InstRef) -> Option<InstRef> {
    if !graph.inst(length).is_initialized_length() {
        return None;
    }
    let elements = graph.inst(length).operand(0);
    if !graph.inst(elements).is_elements() {
        return None;
    }
    let object = graph.inst(elements).operand(0);
    let value = graph.inst(object).as_constant()?;
    if value.dense_array_initialized_length().is_some() {
        Some(object)
    } else {
        None
    }
}

/// Syntactic proof that the array's initialized length cannot change: no
/// consumer of the array constant may write memory. No alias analysis is
/// attempted, so any store using the array blocks every elimination against
/// it.
fn has_unchangeable_length(graph: &MirGraph, array: InstRef) -> bool {
    for edge in graph.inst(array).uses() {
        if graph.inst(edge.user).alias_set().is_store() {
            return false;
        }
    }
    true
}
