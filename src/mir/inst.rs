//! SSA instructions.
//!
//! One [`InstData`] per instruction: the shared fields (owning block, operand
//! slots, consumer edges) plus a closed [`InstOp`] payload describing the
//! opcode. The passes match exhaustively on `InstOp`, so adding an opcode
//! forces every fold/elimination rule to take a position on it.

use crate::{
    impl_slabref,
    mir::{AliasSet, BlockRef, CmpCond, ConstValue},
};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstRef(usize);
impl_slabref!(InstRef, InstData);

/// One def-use edge: operand slot `slot` of `user` currently refers to the
/// instruction owning this edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseEdge {
    pub user: InstRef,
    pub slot: u32,
}

/// Opcode payloads. Operand arity and meaning per variant:
///
/// | variant             | operands                    |
/// |---------------------|-----------------------------|
/// | `Constant`          | none                        |
/// | `Phi`               | one per predecessor         |
/// | `Add`               | lhs, rhs                    |
/// | `Compare`           | lhs, rhs                    |
/// | `Test`              | condition (targets on block)|
/// | `Goto`              | none (target on block)      |
/// | `Return`            | value                       |
/// | `ToInt32`/`Unbox`/`Box` | input                   |
/// | `BoundsCheck`       | index, length               |
/// | `BoundsCheckLower`  | index                       |
/// | `LoadElement`       | elements, index             |
/// | `StoreElement`      | elements, index, value      |
/// | `InitializedLength` | elements                    |
/// | `Elements`          | object                      |
/// | `PassArg`           | value                       |
/// | `Call`              | callee + args               |
/// | `CreateThis`        | callee                      |
///
/// The bounds-check variants produce the checked index, so element accesses
/// take the check itself as their index operand until the check is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstOp {
    Constant(ConstValue),
    Phi(PhiOp),
    Add,
    Compare(CmpCond),
    Test,
    Goto,
    Return,
    ToInt32,
    Unbox,
    Box,
    BoundsCheck(BoundsCheckOp),
    BoundsCheckLower(BoundsCheckLowerOp),
    LoadElement,
    StoreElement,
    InitializedLength,
    Elements,
    PassArg,
    Call,
    CreateThis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiOp {
    /// Stack slot this phi merges; blocks record the merged value in their
    /// entry slot tables under the same index.
    pub slot: u32,
}

/// Guard proving `index + minimum >= 0` and `index + maximum < length`.
/// The common exact form is `minimum == maximum == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsCheckOp {
    pub minimum: i32,
    pub maximum: i32,
}

/// Guard proving `index >= minimum` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsCheckLowerOp {
    pub minimum: i32,
}

pub struct InstData {
    pub(crate) parent: BlockRef,
    pub(crate) operands: SmallVec<[InstRef; 2]>,
    pub(crate) uses: Vec<UseEdge>,
    pub(crate) op: InstOp,
}

impl InstData {
    pub(crate) fn new(parent: BlockRef, op: InstOp) -> Self {
        Self { parent, operands: SmallVec::new(), uses: Vec::new(), op }
    }

    pub fn op(&self) -> &InstOp {
        &self.op
    }
    pub fn parent(&self) -> BlockRef {
        self.parent
    }

    pub fn operands(&self) -> &[InstRef] {
        &self.operands
    }
    pub fn operand(&self, index: usize) -> InstRef {
        self.operands[index]
    }
    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    /// Consumers currently referring to this instruction, one edge per
    /// occupied operand slot.
    pub fn uses(&self) -> &[UseEdge] {
        &self.uses
    }
    pub fn has_uses(&self) -> bool {
        !self.uses.is_empty()
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.op, InstOp::Constant(_))
    }
    pub fn as_constant(&self) -> Option<&ConstValue> {
        match &self.op {
            InstOp::Constant(v) => Some(v),
            _ => None,
        }
    }
    /// The constant's value if this is an `Int32` constant.
    pub fn as_int32_constant(&self) -> Option<i32> {
        self.as_constant().and_then(ConstValue::as_int32)
    }

    pub fn is_phi(&self) -> bool {
        matches!(self.op, InstOp::Phi(_))
    }
    pub fn as_phi(&self) -> Option<&PhiOp> {
        match &self.op {
            InstOp::Phi(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self.op, InstOp::Add)
    }
    pub fn as_compare(&self) -> Option<CmpCond> {
        match self.op {
            InstOp::Compare(cond) => Some(cond),
            _ => None,
        }
    }
    pub fn is_test(&self) -> bool {
        matches!(self.op, InstOp::Test)
    }

    pub fn is_to_int32(&self) -> bool {
        matches!(self.op, InstOp::ToInt32)
    }
    pub fn is_unbox(&self) -> bool {
        matches!(self.op, InstOp::Unbox)
    }
    pub fn is_box(&self) -> bool {
        matches!(self.op, InstOp::Box)
    }
    /// Any of the single-input value conversions an index may pass through
    /// on its way to a bounds check.
    pub fn is_conversion(&self) -> bool {
        self.is_to_int32() || self.is_unbox() || self.is_box()
    }

    pub fn as_bounds_check(&self) -> Option<&BoundsCheckOp> {
        match &self.op {
            InstOp::BoundsCheck(b) => Some(b),
            _ => None,
        }
    }
    pub fn as_bounds_check_lower(&self) -> Option<&BoundsCheckLowerOp> {
        match &self.op {
            InstOp::BoundsCheckLower(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_load_element(&self) -> bool {
        matches!(self.op, InstOp::LoadElement)
    }
    pub fn is_initialized_length(&self) -> bool {
        matches!(self.op, InstOp::InitializedLength)
    }
    pub fn is_elements(&self) -> bool {
        matches!(self.op, InstOp::Elements)
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self.op, InstOp::Test | InstOp::Goto | InstOp::Return)
    }

    pub fn alias_set(&self) -> AliasSet {
        match self.op {
            InstOp::LoadElement => AliasSet::load(AliasSet::ELEMENT),
            InstOp::StoreElement => AliasSet::store(AliasSet::ELEMENT),
            InstOp::InitializedLength | InstOp::Elements => {
                AliasSet::load(AliasSet::OBJECT_FIELDS)
            }
            InstOp::Call | InstOp::CreateThis => AliasSet::any_store(),
            _ => AliasSet::none(),
        }
    }

    pub fn opcode_name(&self) -> &'static str {
        match self.op {
            InstOp::Constant(_) => "constant",
            InstOp::Phi(_) => "phi",
            InstOp::Add => "add",
            InstOp::Compare(_) => "compare",
            InstOp::Test => "test",
            InstOp::Goto => "goto",
            InstOp::Return => "return",
            InstOp::ToInt32 => "toint32",
            InstOp::Unbox => "unbox",
            InstOp::Box => "box",
            InstOp::BoundsCheck(_) => "boundscheck",
            InstOp::BoundsCheckLower(_) => "boundschecklower",
            InstOp::LoadElement => "loadelement",
            InstOp::StoreElement => "storeelement",
            InstOp::InitializedLength => "initializedlength",
            InstOp::Elements => "elements",
            InstOp::PassArg => "passarg",
            InstOp::Call => "call",
            InstOp::CreateThis => "createthis",
        }
    }
}
