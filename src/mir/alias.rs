//! Coarse alias classification of instructions.
//!
//! Every opcode maps to a fixed [`AliasSet`]: the memory categories it may
//! touch plus whether it writes through them. Bounds-check elimination uses
//! the store bit to decide whether an observed array length could have been
//! invalidated; it never performs real alias analysis.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct AliasSet: u8 {
        /// Object headers and fixed metadata (lengths, flags).
        const OBJECT_FIELDS = 1 << 0;
        /// Dense element storage.
        const ELEMENT = 1 << 1;
        /// Named slots on objects.
        const SLOT = 1 << 2;
        /// Marks the set as writing rather than reading.
        const STORE = 1 << 7;
    }
}

impl AliasSet {
    pub const fn none() -> Self {
        Self::empty()
    }

    pub fn load(categories: AliasSet) -> Self {
        debug_assert!(!categories.contains(AliasSet::STORE));
        categories
    }

    pub fn store(categories: AliasSet) -> Self {
        categories | AliasSet::STORE
    }

    /// A store touching every category; used for calls and anything else
    /// that may write arbitrary memory.
    pub fn any_store() -> Self {
        Self::store(AliasSet::OBJECT_FIELDS | AliasSet::ELEMENT | AliasSet::SLOT)
    }

    pub fn is_none(self) -> bool {
        self.is_empty()
    }
    pub fn is_store(self) -> bool {
        self.contains(AliasSet::STORE)
    }
    pub fn is_load(self) -> bool {
        !self.is_none() && !self.is_store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_classification() {
        assert!(AliasSet::store(AliasSet::ELEMENT).is_store());
        assert!(!AliasSet::load(AliasSet::ELEMENT).is_store());
        assert!(AliasSet::load(AliasSet::ELEMENT).is_load());
        assert!(AliasSet::any_store().is_store());
        assert!(AliasSet::none().is_none());
        assert!(!AliasSet::none().is_load());
    }
}
