//! Loop-counter recognition and range extraction.
//!
//! Matches "upper bounded continuous sum" counters at loop headers:
//!
//! ```text
//! for (i = lower; i < upper; i += step)      // for / while shape
//! i = lower; do { ...; i += step } while (i < upper)   // do-while shape
//! ```
//!
//! The counter is the phi merging the initial value with the incremented
//! value flowing in over the backedge. The index may pass through one
//! `ToInt32`/`Unbox`/`Box` conversion on either side of the pattern; the
//! increment must be a non-negative `Int32` constant. A `<=` exit test
//! stores `upper - 1` so the recorded range always denotes the strict `<`
//! relation.

use crate::{
    base::INullableValue,
    mir::{BlockRef, CmpCond, InstRef, MirGraph},
};

pub struct InductionVariable {
    block: BlockRef,
    variable: InstRef,
    lower_bound: Option<i32>,
    upper_bound: Option<i32>,
    do_while: bool,
}

impl InductionVariable {
    pub fn new(block: BlockRef) -> Self {
        Self {
            block,
            variable: InstRef::new_null(),
            lower_bound: None,
            upper_bound: None,
            do_while: false,
        }
    }

    /// Try the known counter patterns, most common first. Returns whether a
    /// counter was recognized; the accessors below are only meaningful after
    /// a successful match.
    pub fn extract_pattern(&mut self, graph: &MirGraph) -> bool {
        let matched = self.extract_for_loop(graph) || self.extract_do_while(graph);
        matched && self.variable.is_nonnull()
    }

    /// The phi backing the counter. Panics when no pattern was matched.
    pub fn variable(&self) -> InstRef {
        assert!(self.variable.is_nonnull(), "No induction variable pattern was matched");
        self.variable
    }

    pub fn has_lower_bound(&self) -> bool {
        self.lower_bound.is_some()
    }
    pub fn lower_bound(&self) -> i32 {
        self.lower_bound.expect("Induction variable has no lower bound")
    }

    pub fn has_upper_bound(&self) -> bool {
        self.upper_bound.is_some()
    }
    pub fn upper_bound(&self) -> i32 {
        self.upper_bound.expect("Induction variable has no upper bound")
    }

    pub fn is_do_while(&self) -> bool {
        self.do_while
    }

    /// Whether the recorded range holds in `block`. The range is only valid
    /// inside the loop body: `header < id <= backedge` for the for-loop
    /// shape (the header phi still merges the pre-loop value), and
    /// `header <= id <= backedge` for do-while loops, whose header is
    /// already part of the body.
    pub fn range_is_valid(&self, graph: &MirGraph, block: BlockRef) -> bool {
        if self.variable.is_null() {
            return false;
        }
        let header = graph.inst(self.variable).parent();
        let header_data = graph.block(header);
        if !header_data.is_loop_header() || header_data.backedge().is_null() {
            return false;
        }
        let block_id = graph.block(block).id();
        let header_id = header_data.id();
        let backedge_id = graph.block(header_data.backedge()).id();

        if header_id < block_id && block_id <= backedge_id {
            return true;
        }
        if self.do_while && header_id <= block_id && block_id <= backedge_id {
            return true;
        }
        false
    }

    /// `for`/`while` shape: the header ends in a `<`/`<=` test whose left
    /// side unwraps to a two-operand phi; one phi input is the increment add
    /// sitting in the backedge block, the other is the initial value.
    fn extract_for_loop(&mut self, graph: &MirGraph) -> bool {
        if !graph.block(self.block).is_loop_header() {
            return false;
        }
        let Some((compare, cond)) = exit_compare(graph, self.block) else {
            return false;
        };
        let compare_lhs = graph.inst(compare).operand(0);
        let Some(phi) = phi_behind(graph, compare_lhs) else {
            return false;
        };
        if graph.inst(phi).num_operands() != 2 {
            return false;
        }

        // Find the increment add among the phi inputs, possibly behind a
        // conversion; its block must be the loop backedge.
        let mut add = InstRef::new_null();
        let mut may_be_lower_bound = InstRef::new_null();
        for (candidate_slot, other_slot) in [(0usize, 1usize), (1, 0)] {
            let candidate = graph.inst(phi).operand(candidate_slot);
            let candidate_data = graph.inst(candidate);
            let behind = if candidate_data.is_add() {
                candidate
            } else if candidate_data.is_conversion()
                && graph.inst(candidate_data.operand(0)).is_add()
            {
                candidate_data.operand(0)
            } else {
                continue;
            };
            if !graph.block(candidate_data.parent()).is_loop_backedge() {
                continue;
            }
            add = behind;
            may_be_lower_bound = graph.inst(phi).operand(other_slot);
            break;
        }
        if add.is_null() {
            return false;
        }
        if !increment_is_non_negative(graph, add) {
            return false;
        }

        self.variable = phi;

        // The initial value is the lower bound when it is a non-negative
        // integer constant, or a phi of two of them (their minimum).
        let mut value = None;
        let lower_data = graph.inst(may_be_lower_bound);
        if let Some(c) = lower_data.as_int32_constant() {
            value = Some(c);
        } else if lower_data.is_phi() && lower_data.num_operands() == 2 {
            let lhs = graph.inst(lower_data.operand(0)).as_int32_constant();
            let rhs = graph.inst(lower_data.operand(1)).as_int32_constant();
            if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
                value = Some(lhs.min(rhs));
            }
        }
        if let Some(lower) = value {
            if lower >= 0 {
                self.lower_bound = Some(lower);
            }
        }

        self.extract_upper_bound(graph, compare, cond);
        true
    }

    /// Do-while shape: the test lives at the bottom of the body, in the
    /// backedge's predecessor, and compares the already-incremented value.
    fn extract_do_while(&mut self, graph: &MirGraph) -> bool {
        if !graph.block(self.block).is_loop_header() {
            return false;
        }
        let backedge = graph.block(self.block).backedge();
        if backedge.is_null() {
            return false;
        }
        let Some(&scan) = graph.block(backedge).preds().first() else {
            return false;
        };

        let Some((compare, cond)) = exit_compare(graph, scan) else {
            return false;
        };
        if !graph.inst(graph.inst(compare).operand(1)).is_constant() {
            return false;
        }
        let compare_lhs = graph.inst(compare).operand(0);
        if !graph.inst(compare_lhs).is_add() {
            return false;
        }
        let add = compare_lhs;

        let add_lhs = graph.inst(add).operand(0);
        let Some(phi) = phi_behind(graph, add_lhs) else {
            return false;
        };
        if graph.inst(phi).num_operands() != 2 {
            return false;
        }

        // The initial value sits in the phi's first operand, possibly one
        // more phi level down, possibly boxed.
        let phi_operand0 = graph.inst(phi).operand(0);
        let other_phi = if graph.inst(phi_operand0).is_phi() { phi_operand0 } else { phi };
        let initial = graph.inst(other_phi).operand(0);
        let initial_data = graph.inst(initial);
        let lower_const = if initial_data.is_box()
            && graph.inst(initial_data.operand(0)).is_constant()
        {
            initial_data.operand(0)
        } else if initial_data.is_constant() {
            initial
        } else {
            return false;
        };

        if !increment_is_non_negative(graph, add) {
            return false;
        }

        self.variable = phi;

        if let Some(lower) = graph.inst(lower_const).as_int32_constant() {
            if lower >= 0 {
                self.lower_bound = Some(lower);
            }
        }
        self.extract_upper_bound(graph, compare, cond);
        self.do_while = true;
        true
    }

    fn extract_upper_bound(&mut self, graph: &MirGraph, compare: InstRef, cond: CmpCond) {
        let rhs = graph.inst(compare).operand(1);
        if let Some(upper) = graph.inst(rhs).as_int32_constant() {
            if upper >= 0 {
                // Store the bound so it always expresses the `<` relation.
                self.upper_bound =
                    Some(if cond == CmpCond::Le { upper - 1 } else { upper });
            }
        }
    }
}

/// The `<`/`<=` comparison feeding `block`'s terminating test, if that is
/// how the block ends.
fn exit_compare(graph: &MirGraph, block: BlockRef) -> Option<(InstRef, CmpCond)> {
    let last = graph.block(block).last_ins()?;
    if !graph.inst(last).is_test() {
        return None;
    }
    let compare = graph.inst(last).operand(0);
    let cond = graph.inst(compare).as_compare()?;
    if !cond.is_below() {
        return None;
    }
    Some((compare, cond))
}

/// Unwrap at most one value conversion and require a phi underneath.
fn phi_behind(graph: &MirGraph, def: InstRef) -> Option<InstRef> {
    let data = graph.inst(def);
    if data.is_phi() {
        return Some(def);
    }
    if data.is_conversion() {
        let input = data.operand(0);
        if graph.inst(input).is_phi() {
            return Some(input);
        }
    }
    None
}

/// The add must increment by a non-negative `Int32` constant on either side.
fn increment_is_non_negative(graph: &MirGraph, add: InstRef) -> bool {
    let data = graph.inst(add);
    let increment = if graph.inst(data.operand(0)).is_constant() {
        data.operand(0)
    } else if graph.inst(data.operand(1)).is_constant() {
        data.operand(1)
    } else {
        return false;
    };
    match graph.inst(increment).as_int32_constant() {
        Some(step) => step >= 0,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mir::{CmpCond, ConstValue, GraphBuilder, ObjectShape},
        testing::cases::{self, ForLoopShape},
    };

    #[test]
    fn for_loop_pattern_extracts_bounds() {
        let case = cases::for_loop_array_walk(ForLoopShape::default());
        let mut var = InductionVariable::new(case.header);
        assert!(var.extract_pattern(&case.graph));
        assert_eq!(var.variable(), case.phi);
        assert!(!var.is_do_while());
        assert!(var.has_lower_bound());
        assert_eq!(var.lower_bound(), 0);
        assert!(var.has_upper_bound());
        assert_eq!(var.upper_bound(), 10);
    }

    #[test]
    fn le_comparison_stores_reduced_upper_bound() {
        let case =
            cases::for_loop_array_walk(ForLoopShape { cond: CmpCond::Le, ..Default::default() });
        let mut var = InductionVariable::new(case.header);
        assert!(var.extract_pattern(&case.graph));
        assert_eq!(var.upper_bound(), 9);
    }

    #[test]
    fn range_is_strictly_inside_for_loops() {
        let case = cases::for_loop_array_walk(ForLoopShape::default());
        let mut var = InductionVariable::new(case.header);
        assert!(var.extract_pattern(&case.graph));
        assert!(var.range_is_valid(&case.graph, case.body));
        assert!(!var.range_is_valid(&case.graph, case.header));
        assert!(!var.range_is_valid(&case.graph, case.exit));
        assert!(!var.range_is_valid(&case.graph, case.entry));
    }

    #[test]
    fn do_while_pattern_includes_the_header() {
        let case = cases::do_while_array_walk(12, 12);
        let mut var = InductionVariable::new(case.header);
        assert!(var.extract_pattern(&case.graph));
        assert!(var.is_do_while());
        assert_eq!(var.variable(), case.phi);
        assert_eq!(var.lower_bound(), 0);
        assert_eq!(var.upper_bound(), 12);
        assert!(var.range_is_valid(&case.graph, case.header));
        assert!(var.range_is_valid(&case.graph, case.backedge));
        assert!(!var.range_is_valid(&case.graph, case.exit));
    }

    #[test]
    fn non_loop_header_is_rejected() {
        let case = cases::for_loop_array_walk(ForLoopShape::default());
        let mut var = InductionVariable::new(case.entry);
        assert!(!var.extract_pattern(&case.graph));
    }

    #[test]
    #[should_panic]
    fn variable_access_before_match_panics() {
        let var = InductionVariable::new(BlockRef::new_null());
        var.variable();
    }

    #[test]
    fn negative_increment_is_rejected() {
        let graph = counting_loop(-1, CmpCond::Lt);
        let header = graph.block_order()[1];
        let mut var = InductionVariable::new(header);
        assert!(!var.extract_pattern(&graph));
    }

    #[test]
    fn positive_increment_with_nonconstant_limit_has_no_upper_bound() {
        let mut builder = GraphBuilder::new("nonconstant_limit");
        let entry = builder.new_block();
        let header = builder.new_block();
        let body = builder.new_block();
        let exit = builder.new_block();
        builder.mark_loop(header, body);
        builder.switch_to(entry);
        let c0 = builder.int32(0);
        let c1 = builder.int32(1);
        let limit = builder.call(&[]);
        builder.goto(header).unwrap();
        builder.switch_to(header);
        let phi = builder.phi(0, 2);
        let cmp = builder.compare(CmpCond::Lt, phi, limit);
        builder.test(cmp, body, exit).unwrap();
        builder.switch_to(body);
        let add = builder.add(phi, c1);
        builder.goto(header).unwrap();
        builder.switch_to(exit);
        builder.ret(c0).unwrap();
        builder.fill_phi(phi, 0, c0).unwrap();
        builder.fill_phi(phi, 1, add).unwrap();
        let graph = builder.seal().unwrap();

        let mut var = InductionVariable::new(header);
        assert!(var.extract_pattern(&graph));
        assert!(var.has_lower_bound());
        assert!(!var.has_upper_bound());
    }

    #[test]
    fn index_conversions_are_unwrapped() {
        // Compare sees toint32(phi); the backedge feeds toint32(add).
        let mut builder = GraphBuilder::new("converted_counter");
        let entry = builder.new_block();
        let header = builder.new_block();
        let body = builder.new_block();
        let exit = builder.new_block();
        builder.mark_loop(header, body);
        builder.switch_to(entry);
        let c0 = builder.int32(0);
        let c1 = builder.int32(1);
        let limit = builder.int32(8);
        builder.goto(header).unwrap();
        builder.switch_to(header);
        let phi = builder.phi(0, 2);
        let narrowed = builder.to_int32(phi);
        let cmp = builder.compare(CmpCond::Lt, narrowed, limit);
        builder.test(cmp, body, exit).unwrap();
        builder.switch_to(body);
        let add = builder.add(phi, c1);
        let widened = builder.to_int32(add);
        builder.goto(header).unwrap();
        builder.switch_to(exit);
        builder.ret(c0).unwrap();
        builder.fill_phi(phi, 0, c0).unwrap();
        builder.fill_phi(phi, 1, widened).unwrap();
        let graph = builder.seal().unwrap();

        let mut var = InductionVariable::new(header);
        assert!(var.extract_pattern(&graph));
        assert_eq!(var.variable(), phi);
        assert_eq!(var.lower_bound(), 0);
        assert_eq!(var.upper_bound(), 8);
    }

    #[test]
    fn phi_of_two_constants_yields_minimum_lower_bound() {
        // The initial value merges two constants before entering the loop.
        let mut builder = GraphBuilder::new("merged_lower_bound");
        let entry = builder.new_block();
        let left = builder.new_block();
        let right = builder.new_block();
        let preheader = builder.new_block();
        let header = builder.new_block();
        let body = builder.new_block();
        let exit = builder.new_block();
        builder.mark_loop(header, body);

        builder.switch_to(entry);
        let c2 = builder.int32(2);
        let c7 = builder.int32(7);
        let c1 = builder.int32(1);
        let limit = builder.int32(10);
        let cond = builder.call(&[]);
        builder.test(cond, left, right).unwrap();
        builder.switch_to(left);
        builder.goto(preheader).unwrap();
        builder.switch_to(right);
        builder.goto(preheader).unwrap();
        builder.switch_to(preheader);
        let lower = builder.phi(0, 2);
        builder.fill_phi(lower, 0, c2).unwrap();
        builder.fill_phi(lower, 1, c7).unwrap();
        builder.goto(header).unwrap();
        builder.switch_to(header);
        let phi = builder.phi(1, 2);
        let cmp = builder.compare(CmpCond::Lt, phi, limit);
        builder.test(cmp, body, exit).unwrap();
        builder.switch_to(body);
        let add = builder.add(phi, c1);
        builder.goto(header).unwrap();
        builder.switch_to(exit);
        builder.ret(phi).unwrap();
        builder.fill_phi(phi, 0, lower).unwrap();
        builder.fill_phi(phi, 1, add).unwrap();
        let graph = builder.seal().unwrap();

        let mut var = InductionVariable::new(header);
        assert!(var.extract_pattern(&graph));
        assert_eq!(var.lower_bound(), 2);
        assert_eq!(var.upper_bound(), 10);
    }

    #[test]
    fn object_initial_value_gives_no_lower_bound() {
        let graph = loop_with_initial(ConstValue::Object(ObjectShape::Opaque));
        let header = graph.block_order()[1];
        let mut var = InductionVariable::new(header);
        assert!(var.extract_pattern(&graph));
        assert!(!var.has_lower_bound());
        assert!(var.has_upper_bound());
    }

    /// `for (i = <init>; i < 10; i += 1)` with a caller-chosen initial value.
    fn loop_with_initial(init: ConstValue) -> crate::mir::MirGraph {
        let mut builder = GraphBuilder::new("loop_with_initial");
        let entry = builder.new_block();
        let header = builder.new_block();
        let body = builder.new_block();
        let exit = builder.new_block();
        builder.mark_loop(header, body);
        builder.switch_to(entry);
        let c_init = builder.constant(init);
        let c1 = builder.int32(1);
        let limit = builder.int32(10);
        builder.goto(header).unwrap();
        builder.switch_to(header);
        let phi = builder.phi(0, 2);
        let cmp = builder.compare(CmpCond::Lt, phi, limit);
        builder.test(cmp, body, exit).unwrap();
        builder.switch_to(body);
        let add = builder.add(phi, c1);
        builder.goto(header).unwrap();
        builder.switch_to(exit);
        builder.ret(c1).unwrap();
        builder.fill_phi(phi, 0, c_init).unwrap();
        builder.fill_phi(phi, 1, add).unwrap();
        builder.seal().unwrap()
    }

    /// `for (i = 0; i < 10; i += <step>)`.
    fn counting_loop(step: i32, cond: CmpCond) -> crate::mir::MirGraph {
        let mut builder = GraphBuilder::new("counting_loop");
        let entry = builder.new_block();
        let header = builder.new_block();
        let body = builder.new_block();
        let exit = builder.new_block();
        builder.mark_loop(header, body);
        builder.switch_to(entry);
        let c0 = builder.int32(0);
        let c_step = builder.int32(step);
        let limit = builder.int32(10);
        builder.goto(header).unwrap();
        builder.switch_to(header);
        let phi = builder.phi(0, 2);
        let cmp = builder.compare(cond, phi, limit);
        builder.test(cmp, body, exit).unwrap();
        builder.switch_to(body);
        let add = builder.add(phi, c_step);
        builder.goto(header).unwrap();
        builder.switch_to(exit);
        builder.ret(c0).unwrap();
        builder.fill_phi(phi, 0, c0).unwrap();
        builder.fill_phi(phi, 1, add).unwrap();
        builder.seal().unwrap()
    }
}
