//! Graph construction.
//!
//! The frontend (and the test suite) builds graphs through [`GraphBuilder`]:
//! create the blocks, fill each one, wire branches and phis, then [`seal`]
//! to validate the result. Blocks are numbered in creation order, which the
//! caller is responsible for making reverse postorder. Predecessor lists
//! record incoming edges in the order the branches are emitted, and phi
//! operand slots follow that same order.
//!
//! [`seal`]: GraphBuilder::seal

use crate::{
    base::INullableValue,
    mir::{
        BlockRef, BoundsCheckLowerOp, BoundsCheckOp, CmpCond, ConstValue, InstOp, InstRef,
        MirGraph,
    },
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("block {0:?} already has a terminator")]
    TerminatorAlreadySet(BlockRef),
    #[error("block {0:?} has no terminator")]
    MissingTerminator(BlockRef),
    #[error("phi {phi:?} has {operands} operands but its block has {preds} predecessors")]
    PhiArityMismatch { phi: InstRef, operands: usize, preds: usize },
    #[error("operand {slot} of phi {phi:?} was never filled")]
    UnfilledPhiOperand { phi: InstRef, slot: usize },
    #[error("operand {slot} of phi {phi:?} is already filled")]
    PhiOperandAlreadyFilled { phi: InstRef, slot: usize },
}

pub struct GraphBuilder {
    graph: MirGraph,
    current: BlockRef,
}

impl GraphBuilder {
    pub fn new(name: &str) -> Self {
        Self { graph: MirGraph::new(name), current: BlockRef::new_null() }
    }

    /// Create a block with the next id. Does not change the insertion point.
    pub fn new_block(&mut self) -> BlockRef {
        self.graph.new_block()
    }

    pub fn switch_to(&mut self, block: BlockRef) {
        self.current = block;
    }
    pub fn current_block(&self) -> BlockRef {
        self.current
    }

    /// Mark `header` as a loop header whose backedge is `backedge`.
    pub fn mark_loop(&mut self, header: BlockRef, backedge: BlockRef) {
        let h = self.graph.block_mut(header);
        h.loop_header = true;
        h.backedge = backedge;
        self.graph.block_mut(backedge).loop_backedge = true;
    }

    /// Record `value` in `block`'s entry slot table.
    pub fn set_entry_slot(&mut self, block: BlockRef, slot: usize, value: InstRef) {
        self.graph.block_mut(block).init_slot(slot, value);
    }

    fn push(&mut self, op: InstOp, operands: &[InstRef]) -> InstRef {
        assert!(self.current.is_nonnull(), "No block selected");
        self.graph.append_inst(self.current, op, operands)
    }

    fn push_terminator(
        &mut self,
        op: InstOp,
        operands: &[InstRef],
        targets: &[BlockRef],
    ) -> Result<InstRef, GraphError> {
        assert!(self.current.is_nonnull(), "No block selected");
        if let Some(last) = self.graph.block(self.current).last_ins() {
            if self.graph.inst(last).is_terminator() {
                return Err(GraphError::TerminatorAlreadySet(self.current));
            }
        }
        let inst = self.push(op, operands);
        for &target in targets {
            self.graph.block_mut(self.current).succs.push(target);
            let current = self.current;
            self.graph.block_mut(target).preds.push(current);
        }
        Ok(inst)
    }

    pub fn constant(&mut self, value: ConstValue) -> InstRef {
        self.push(InstOp::Constant(value), &[])
    }
    pub fn int32(&mut self, value: i32) -> InstRef {
        self.constant(ConstValue::Int32(value))
    }

    pub fn add(&mut self, lhs: InstRef, rhs: InstRef) -> InstRef {
        self.push(InstOp::Add, &[lhs, rhs])
    }
    pub fn compare(&mut self, cond: CmpCond, lhs: InstRef, rhs: InstRef) -> InstRef {
        self.push(InstOp::Compare(cond), &[lhs, rhs])
    }

    pub fn to_int32(&mut self, input: InstRef) -> InstRef {
        self.push(InstOp::ToInt32, &[input])
    }
    pub fn unbox(&mut self, input: InstRef) -> InstRef {
        self.push(InstOp::Unbox, &[input])
    }
    pub fn box_value(&mut self, input: InstRef) -> InstRef {
        self.push(InstOp::Box, &[input])
    }

    pub fn elements(&mut self, object: InstRef) -> InstRef {
        self.push(InstOp::Elements, &[object])
    }
    pub fn initialized_length(&mut self, elements: InstRef) -> InstRef {
        self.push(InstOp::InitializedLength, &[elements])
    }
    pub fn bounds_check(
        &mut self,
        index: InstRef,
        length: InstRef,
        minimum: i32,
        maximum: i32,
    ) -> InstRef {
        self.push(InstOp::BoundsCheck(BoundsCheckOp { minimum, maximum }), &[index, length])
    }
    pub fn bounds_check_lower(&mut self, index: InstRef, minimum: i32) -> InstRef {
        self.push(InstOp::BoundsCheckLower(BoundsCheckLowerOp { minimum }), &[index])
    }
    pub fn load_element(&mut self, elements: InstRef, index: InstRef) -> InstRef {
        self.push(InstOp::LoadElement, &[elements, index])
    }
    pub fn store_element(&mut self, elements: InstRef, index: InstRef, value: InstRef) -> InstRef {
        self.push(InstOp::StoreElement, &[elements, index, value])
    }

    pub fn pass_arg(&mut self, value: InstRef) -> InstRef {
        self.push(InstOp::PassArg, &[value])
    }
    pub fn call(&mut self, operands: &[InstRef]) -> InstRef {
        self.push(InstOp::Call, operands)
    }
    pub fn create_this(&mut self, callee: InstRef) -> InstRef {
        self.push(InstOp::CreateThis, &[callee])
    }

    /// Create a phi with `arity` pending operand slots in the current block.
    /// Slots are filled later with [`GraphBuilder::fill_phi`], one per
    /// predecessor in predecessor order.
    pub fn phi(&mut self, slot: u32, arity: usize) -> InstRef {
        assert!(self.current.is_nonnull(), "No block selected");
        self.graph.append_phi(self.current, slot, arity)
    }

    pub fn fill_phi(
        &mut self,
        phi: InstRef,
        slot: usize,
        value: InstRef,
    ) -> Result<(), GraphError> {
        if self.graph.inst(phi).operand(slot).is_nonnull() {
            return Err(GraphError::PhiOperandAlreadyFilled { phi, slot });
        }
        self.graph.set_operand(phi, slot, value);
        Ok(())
    }

    pub fn test(
        &mut self,
        cond: InstRef,
        if_true: BlockRef,
        if_false: BlockRef,
    ) -> Result<InstRef, GraphError> {
        self.push_terminator(InstOp::Test, &[cond], &[if_true, if_false])
    }
    pub fn goto(&mut self, target: BlockRef) -> Result<InstRef, GraphError> {
        self.push_terminator(InstOp::Goto, &[], &[target])
    }
    pub fn ret(&mut self, value: InstRef) -> Result<InstRef, GraphError> {
        self.push_terminator(InstOp::Return, &[value], &[])
    }

    /// Validate and hand over the finished graph: every block terminated,
    /// every phi filled and arity-matched to its predecessors.
    pub fn seal(self) -> Result<MirGraph, GraphError> {
        let graph = self.graph;
        for &block in graph.block_order() {
            let body = graph.block(block);
            match body.last_ins() {
                Some(last) if graph.inst(last).is_terminator() => {}
                _ => return Err(GraphError::MissingTerminator(block)),
            }
            for &phi in body.phis() {
                let operands = graph.inst(phi).operands();
                if operands.len() != body.preds().len() {
                    return Err(GraphError::PhiArityMismatch {
                        phi,
                        operands: operands.len(),
                        preds: body.preds().len(),
                    });
                }
                if let Some(slot) = operands.iter().position(|o| o.is_null()) {
                    return Err(GraphError::UnfilledPhiOperand { phi, slot });
                }
            }
        }
        if cfg!(debug_assertions) {
            graph.assert_coherent();
        }
        Ok(graph)
    }
}

/// Small prebuilt graphs shared by the unit tests in this module tree.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// `a = 3; b = 4; c = a + b; return c` in a single block.
    pub(crate) fn two_constant_add() -> MirGraph {
        let mut builder = GraphBuilder::new("two_constant_add");
        let entry = builder.new_block();
        builder.switch_to(entry);
        let a = builder.int32(3);
        let b = builder.int32(4);
        let c = builder.add(a, b);
        builder.ret(c).unwrap();
        builder.seal().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::writer::graph_to_string;

    #[test]
    fn straight_line_graph_seals() {
        let graph = tests_support::two_constant_add();
        assert_eq!(graph.block_order().len(), 1);
        let entry = graph.block_order()[0];
        assert_eq!(graph.block(entry).insts().len(), 4);
        graph.assert_coherent();
    }

    #[test]
    fn missing_terminator_is_rejected() {
        let mut builder = GraphBuilder::new("no_terminator");
        let entry = builder.new_block();
        builder.switch_to(entry);
        builder.int32(1);
        assert!(matches!(builder.seal(), Err(GraphError::MissingTerminator(_))));
    }

    #[test]
    fn double_terminator_is_rejected() {
        let mut builder = GraphBuilder::new("double_terminator");
        let entry = builder.new_block();
        let next = builder.new_block();
        builder.switch_to(entry);
        builder.goto(next).unwrap();
        assert!(matches!(
            builder.goto(next),
            Err(GraphError::TerminatorAlreadySet(_))
        ));
    }

    #[test]
    fn phi_arity_must_match_preds() {
        let mut builder = GraphBuilder::new("phi_arity");
        let entry = builder.new_block();
        let merge = builder.new_block();
        builder.switch_to(entry);
        let c = builder.int32(5);
        builder.goto(merge).unwrap();
        builder.switch_to(merge);
        // One predecessor, two operand slots.
        let phi = builder.phi(0, 2);
        builder.fill_phi(phi, 0, c).unwrap();
        builder.fill_phi(phi, 1, c).unwrap();
        builder.ret(phi).unwrap();
        assert!(matches!(
            builder.seal(),
            Err(GraphError::PhiArityMismatch { .. })
        ));
    }

    #[test]
    fn unfilled_phi_operand_is_rejected() {
        let mut builder = GraphBuilder::new("phi_unfilled");
        let entry = builder.new_block();
        let body = builder.new_block();
        let merge = builder.new_block();
        builder.switch_to(entry);
        let c = builder.int32(5);
        let cond = builder.call(&[]);
        builder.test(cond, body, merge).unwrap();
        builder.switch_to(body);
        builder.goto(merge).unwrap();
        builder.switch_to(merge);
        let phi = builder.phi(0, 2);
        builder.fill_phi(phi, 0, c).unwrap();
        builder.ret(phi).unwrap();
        assert!(matches!(
            builder.seal(),
            Err(GraphError::UnfilledPhiOperand { slot: 1, .. })
        ));
    }

    #[test]
    fn refilling_a_phi_slot_is_rejected() {
        let mut builder = GraphBuilder::new("phi_refill");
        let entry = builder.new_block();
        builder.switch_to(entry);
        let c = builder.int32(5);
        let phi = builder.phi(0, 1);
        builder.fill_phi(phi, 0, c).unwrap();
        assert!(matches!(
            builder.fill_phi(phi, 0, c),
            Err(GraphError::PhiOperandAlreadyFilled { .. })
        ));
    }

    #[test]
    fn writer_renders_the_graph() {
        let graph = tests_support::two_constant_add();
        let text = graph_to_string(&graph);
        assert!(text.contains("two_constant_add"));
        assert!(text.contains("add"));
        assert!(text.contains("constant 3"));
    }
}
