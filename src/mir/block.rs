//! Basic blocks.
//!
//! Block topology is fixed before the optimization passes run: the passes
//! rewrite instruction operands and discard instructions, never edges. Block
//! ids are assigned in reverse postorder by the pipeline; the loop markers
//! (`loop_header`, `backedge`) are set when the graph is built.

use crate::{
    base::INullableValue,
    impl_slabref,
    mir::InstRef,
};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockRef(usize);
impl_slabref!(BlockRef, BlockData);

pub struct BlockData {
    pub(crate) id: u32,
    pub(crate) preds: SmallVec<[BlockRef; 2]>,
    pub(crate) succs: SmallVec<[BlockRef; 2]>,
    pub(crate) phis: Vec<InstRef>,
    pub(crate) insts: Vec<InstRef>,
    pub(crate) loop_header: bool,
    pub(crate) loop_backedge: bool,
    /// Backedge block of the loop this block heads; null unless
    /// `loop_header` is set.
    pub(crate) backedge: BlockRef,
    /// Entry stack-slot table: the value live in each interpreter stack slot
    /// when control enters this block.
    pub(crate) slots: Vec<InstRef>,
}

impl BlockData {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id,
            preds: SmallVec::new(),
            succs: SmallVec::new(),
            phis: Vec::new(),
            insts: Vec::new(),
            loop_header: false,
            loop_backedge: false,
            backedge: BlockRef::new_null(),
            slots: Vec::new(),
        }
    }

    /// Reverse-postorder id.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn preds(&self) -> &[BlockRef] {
        &self.preds
    }
    pub fn succs(&self) -> &[BlockRef] {
        &self.succs
    }

    pub fn phis(&self) -> &[InstRef] {
        &self.phis
    }
    pub fn insts(&self) -> &[InstRef] {
        &self.insts
    }

    pub fn is_loop_header(&self) -> bool {
        self.loop_header
    }
    pub fn is_loop_backedge(&self) -> bool {
        self.loop_backedge
    }
    pub fn backedge(&self) -> BlockRef {
        self.backedge
    }

    /// Last instruction of the block; the terminator once the graph is
    /// sealed.
    pub fn last_ins(&self) -> Option<InstRef> {
        self.insts.last().copied()
    }

    pub fn stack_depth(&self) -> usize {
        self.slots.len()
    }
    pub fn get_slot(&self, slot: usize) -> InstRef {
        self.slots[slot]
    }
    pub(crate) fn init_slot(&mut self, slot: usize, value: InstRef) {
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, InstRef::new_null());
        }
        self.slots[slot] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::SlabRef;

    #[test]
    fn slot_table_growth() {
        let mut block = BlockData::new(0);
        assert_eq!(block.stack_depth(), 0);
        let v = InstRef::from_handle(3);
        block.init_slot(2, v);
        assert_eq!(block.stack_depth(), 3);
        assert_eq!(block.get_slot(2), v);
        assert!(block.get_slot(0).is_null());
    }

    #[test]
    fn fresh_block_shape() {
        let block = BlockData::new(7);
        assert_eq!(block.id(), 7);
        assert!(!block.is_loop_header());
        assert!(!block.is_loop_backedge());
        assert!(block.backedge().is_null());
        assert!(block.last_ins().is_none());
    }
}
