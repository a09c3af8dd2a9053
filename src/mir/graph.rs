//! The graph container: arenas for blocks and instructions plus the
//! reverse-postorder block sequence.
//!
//! All mutation of operands and instruction lists goes through this type so
//! the consumer-edge sets stay exactly consistent with the operand slots:
//! `set_operand` and `replace_all_uses` are the only ways an operand slot
//! changes, and `discard` is the only way an instruction leaves its block.

use crate::{
    base::{INullableValue, SlabRef},
    mir::{
        BlockData, BlockRef, ConstValue, InstData, InstOp, InstRef, PhiOp, UseEdge,
    },
};
use slab::Slab;
use smallvec::{SmallVec, smallvec};
use smol_str::SmolStr;

pub struct MirGraph {
    pub name: SmolStr,
    pub(crate) insts: Slab<InstData>,
    pub(crate) blocks: Slab<BlockData>,
    /// Blocks in reverse-postorder id order.
    pub(crate) order: Vec<BlockRef>,
}

impl MirGraph {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            insts: Slab::new(),
            blocks: Slab::new(),
            order: Vec::new(),
        }
    }

    pub fn inst(&self, inst: InstRef) -> &InstData {
        inst.to_data(&self.insts)
    }
    pub(crate) fn inst_mut(&mut self, inst: InstRef) -> &mut InstData {
        inst.to_data_mut(&mut self.insts)
    }

    pub fn block(&self, block: BlockRef) -> &BlockData {
        block.to_data(&self.blocks)
    }
    pub(crate) fn block_mut(&mut self, block: BlockRef) -> &mut BlockData {
        block.to_data_mut(&mut self.blocks)
    }

    /// Blocks in id order.
    pub fn block_order(&self) -> &[BlockRef] {
        &self.order
    }

    /// Blocks from `start` (inclusive) to the end of the graph, in id order.
    pub fn blocks_from(&self, start: BlockRef) -> &[BlockRef] {
        let pos = self
            .order
            .iter()
            .position(|&b| b == start)
            .expect("Block is not part of this graph");
        &self.order[pos..]
    }

    /// Whether `inst` is still live in the arena (not yet discarded).
    pub fn contains_inst(&self, inst: InstRef) -> bool {
        self.insts.contains(inst.get_handle())
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    /// Value of a `Constant` instruction. Panics on anything else; callers
    /// check the opcode first.
    pub fn const_value(&self, inst: InstRef) -> ConstValue {
        *self
            .inst(inst)
            .as_constant()
            .unwrap_or_else(|| panic!("{inst:?} is not a constant"))
    }

    pub(crate) fn new_block(&mut self) -> BlockRef {
        let id = self.order.len() as u32;
        let block = BlockRef::from_handle(self.blocks.insert(BlockData::new(id)));
        self.order.push(block);
        block
    }

    /// Append a non-phi instruction with fully known operands.
    pub(crate) fn append_inst(
        &mut self,
        block: BlockRef,
        op: InstOp,
        operands: &[InstRef],
    ) -> InstRef {
        debug_assert!(!matches!(op, InstOp::Phi(_)), "phis go through append_phi");
        let mut data = InstData::new(block, op);
        data.operands = SmallVec::from_slice(operands);
        let inst = InstRef::from_handle(self.insts.insert(data));
        for (slot, &operand) in operands.iter().enumerate() {
            assert!(operand.is_nonnull(), "Operand {slot} of {inst:?} is null");
            self.inst_mut(operand).uses.push(UseEdge { user: inst, slot: slot as u32 });
        }
        self.block_mut(block).insts.push(inst);
        inst
    }

    /// Append a phi with `arity` unfilled operand slots. Slots are wired
    /// afterwards with [`MirGraph::set_operand`]; the graph is not coherent
    /// until every slot is filled.
    pub(crate) fn append_phi(&mut self, block: BlockRef, slot: u32, arity: usize) -> InstRef {
        let mut data = InstData::new(block, InstOp::Phi(PhiOp { slot }));
        data.operands = smallvec![InstRef::new_null(); arity];
        let inst = InstRef::from_handle(self.insts.insert(data));
        self.block_mut(block).phis.push(inst);
        self.block_mut(block).init_slot(slot as usize, inst);
        inst
    }

    /// Point operand `slot` of `user` at `value`, maintaining both
    /// consumer-edge sets. A no-op when the slot already holds `value`.
    pub fn set_operand(&mut self, user: InstRef, slot: usize, value: InstRef) {
        assert!(value.is_nonnull(), "Cannot set a null operand");
        let old = self.inst(user).operand(slot);
        if old == value {
            return;
        }
        if old.is_nonnull() {
            self.remove_use_edge(old, user, slot as u32);
        }
        self.inst_mut(user).operands[slot] = value;
        self.inst_mut(value).uses.push(UseEdge { user, slot: slot as u32 });
    }

    /// Rewrite every consumer of `old` to refer to `new` instead. `old`
    /// keeps its operands and stays in its block; it simply ends up with no
    /// uses.
    pub fn replace_all_uses(&mut self, old: InstRef, new: InstRef) {
        if old == new {
            return;
        }
        let edges = std::mem::take(&mut self.inst_mut(old).uses);
        for &UseEdge { user, slot } in &edges {
            self.inst_mut(user).operands[slot as usize] = new;
        }
        self.inst_mut(new).uses.extend_from_slice(&edges);
        log::trace!(
            target: "mir",
            "replaced {} uses of %{} with %{}",
            edges.len(),
            old.get_handle(),
            new.get_handle()
        );
    }

    /// Materialize a constant in front of `before`, in the same block.
    pub fn insert_constant_before(&mut self, before: InstRef, value: ConstValue) -> InstRef {
        let block = self.inst(before).parent();
        let inst = InstRef::from_handle(
            self.insts.insert(InstData::new(block, InstOp::Constant(value))),
        );
        let body = &mut self.block_mut(block).insts;
        let pos = body.iter().position(|&i| i == before).unwrap_or(0);
        body.insert(pos, inst);
        inst
    }

    /// Detach `inst` from its block and free it. The instruction must have
    /// no remaining uses; operand edges are cleaned up here.
    pub fn discard(&mut self, inst: InstRef) {
        assert!(
            !self.inst(inst).has_uses(),
            "Discarding {inst:?} while consumers still refer to it"
        );
        let operands: SmallVec<[InstRef; 2]> =
            SmallVec::from_slice(self.inst(inst).operands());
        for (slot, &operand) in operands.iter().enumerate() {
            if operand.is_nonnull() {
                self.remove_use_edge(operand, inst, slot as u32);
            }
        }
        let block = self.inst(inst).parent();
        let body = self.block_mut(block);
        if let Some(pos) = body.insts.iter().position(|&i| i == inst) {
            body.insts.remove(pos);
        } else if let Some(pos) = body.phis.iter().position(|&i| i == inst) {
            body.phis.remove(pos);
        }
        self.insts.remove(inst.get_handle());
    }

    fn remove_use_edge(&mut self, value: InstRef, user: InstRef, slot: u32) {
        let uses = &mut self.inst_mut(value).uses;
        let pos = uses
            .iter()
            .position(|e| e.user == user && e.slot == slot)
            .expect("Use-edge bookkeeping out of sync");
        uses.swap_remove(pos);
    }

    /// Verify the def-use bookkeeping and phi arities. Test and debug aid;
    /// panics on the first inconsistency.
    pub fn assert_coherent(&self) {
        for &block in &self.order {
            let body = self.block(block);
            for &phi in body.phis() {
                assert!(self.inst(phi).is_phi(), "{phi:?} in phi row is not a phi");
                assert_eq!(
                    self.inst(phi).num_operands(),
                    body.preds().len(),
                    "phi {phi:?} arity does not match predecessor count"
                );
            }
            for inst in body.phis().iter().chain(body.insts().iter()).copied() {
                let data = self.inst(inst);
                assert_eq!(data.parent(), block, "{inst:?} parent link is wrong");
                for (slot, &operand) in data.operands().iter().enumerate() {
                    assert!(operand.is_nonnull(), "{inst:?} operand {slot} is null");
                    let back = self
                        .inst(operand)
                        .uses()
                        .iter()
                        .filter(|e| e.user == inst && e.slot == slot as u32)
                        .count();
                    assert_eq!(back, 1, "{inst:?} operand {slot} has {back} back edges");
                }
                for edge in data.uses() {
                    assert_eq!(
                        self.inst(edge.user).operand(edge.slot as usize),
                        inst,
                        "use edge {edge:?} does not point back at {inst:?}"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::{GraphBuilder, builder::tests_support};

    #[test]
    fn set_operand_moves_edges() {
        let mut graph = tests_support::two_constant_add();
        let add = graph.block(graph.block_order()[0]).insts()[2];
        let a = graph.inst(add).operand(0);
        let b = graph.inst(add).operand(1);
        graph.set_operand(add, 0, b);
        assert_eq!(graph.inst(add).operand(0), b);
        assert!(graph.inst(a).uses().is_empty());
        assert_eq!(graph.inst(b).uses().len(), 2);
        graph.assert_coherent();
    }

    #[test]
    fn replace_all_uses_rewrites_consumers() {
        let mut graph = tests_support::two_constant_add();
        let entry = graph.block_order()[0];
        let insts = graph.block(entry).insts().to_vec();
        let (a, b, add) = (insts[0], insts[1], insts[2]);
        graph.replace_all_uses(a, b);
        assert_eq!(graph.inst(add).operand(0), b);
        assert!(graph.inst(a).uses().is_empty());
        assert_eq!(graph.inst(b).uses().len(), 2);
        graph.assert_coherent();
    }

    #[test]
    fn insert_constant_before_lands_in_front() {
        let mut graph = tests_support::two_constant_add();
        let entry = graph.block_order()[0];
        let add = graph.block(entry).insts()[2];
        let c = graph.insert_constant_before(add, ConstValue::Int32(9));
        let body = graph.block(entry).insts();
        let c_pos = body.iter().position(|&i| i == c).unwrap();
        let add_pos = body.iter().position(|&i| i == add).unwrap();
        assert_eq!(c_pos + 1, add_pos);
        assert_eq!(graph.const_value(c), ConstValue::Int32(9));
    }

    #[test]
    fn discard_detaches_operand_edges() {
        let mut graph = tests_support::two_constant_add();
        let entry = graph.block_order()[0];
        let insts = graph.block(entry).insts().to_vec();
        let (a, b, add, ret) = (insts[0], insts[1], insts[2], insts[3]);
        // Point the return at a constant so the add becomes dead.
        graph.set_operand(ret, 0, a);
        graph.discard(add);
        assert!(!graph.contains_inst(add));
        assert!(graph.inst(b).uses().is_empty());
        assert_eq!(graph.block(entry).insts().len(), 3);
        graph.assert_coherent();
    }

    #[test]
    #[should_panic]
    fn discard_with_uses_panics() {
        let mut graph = tests_support::two_constant_add();
        let entry = graph.block_order()[0];
        let add = graph.block(entry).insts()[2];
        graph.discard(add);
    }

    #[test]
    fn blocks_from_slices_the_order() {
        let mut builder = GraphBuilder::new("blocks_from");
        let b0 = builder.new_block();
        let b1 = builder.new_block();
        let b2 = builder.new_block();
        builder.switch_to(b0);
        let c = builder.int32(0);
        builder.goto(b1).unwrap();
        builder.switch_to(b1);
        builder.goto(b2).unwrap();
        builder.switch_to(b2);
        builder.ret(c).unwrap();
        let graph = builder.seal().unwrap();
        assert_eq!(graph.blocks_from(b1), &[b1, b2]);
        assert_eq!(graph.blocks_from(b0).len(), 3);
    }
}
