//! Arena handle plumbing shared by every entity kind in the IR.

use slab::Slab;

/// Null-encodable value. Handles reserve `usize::MAX` as the null pattern so
/// that "no instruction"/"no block" never needs an `Option` in hot structs.
pub trait INullableValue {
    fn new_null() -> Self;
    fn is_null(&self) -> bool;

    fn is_nonnull(&self) -> bool {
        !self.is_null()
    }
}

/// Copyable handle into a [`Slab`] arena.
///
/// Entities are stored flat in arenas owned by the graph; a `SlabRef` is the
/// only way code outside the arena owner refers to them. Dereferencing a
/// stale or null handle is a contract violation and panics.
pub trait SlabRef: Copy + Eq + std::fmt::Debug {
    type RefObject: Sized;

    fn from_handle(handle: usize) -> Self;
    fn get_handle(&self) -> usize;

    fn as_data<'a>(&self, slab: &'a Slab<Self::RefObject>) -> Option<&'a Self::RefObject> {
        slab.get(self.get_handle())
    }
    fn as_data_mut<'a>(
        &self,
        slab: &'a mut Slab<Self::RefObject>,
    ) -> Option<&'a mut Self::RefObject> {
        slab.get_mut(self.get_handle())
    }

    fn to_data<'a>(&self, slab: &'a Slab<Self::RefObject>) -> &'a Self::RefObject {
        if self.is_null() {
            panic!("Cannot dereference a null {}", std::any::type_name::<Self>());
        }
        self.as_data(slab)
            .unwrap_or_else(|| panic!("Stale handle {self:?} (use after free?)"))
    }
    fn to_data_mut<'a>(&self, slab: &'a mut Slab<Self::RefObject>) -> &'a mut Self::RefObject {
        if self.is_null() {
            panic!("Cannot dereference a null {}", std::any::type_name::<Self>());
        }
        if slab.get(self.get_handle()).is_none() {
            panic!("Stale handle {self:?} (use after free?)");
        }
        slab.get_mut(self.get_handle()).unwrap()
    }
}

impl<T: SlabRef> INullableValue for T {
    fn new_null() -> Self {
        Self::from_handle(usize::MAX)
    }
    fn is_null(&self) -> bool {
        self.get_handle() == usize::MAX
    }
}

#[macro_export]
macro_rules! impl_slabref {
    ($ref_typename:ident, $data_typename:ident) => {
        impl $crate::base::SlabRef for $ref_typename {
            type RefObject = $data_typename;

            fn from_handle(handle: usize) -> Self {
                Self(handle)
            }
            fn get_handle(&self) -> usize {
                self.0
            }
        }
    };
}
