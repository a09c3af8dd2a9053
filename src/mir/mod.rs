//! The mid-level SSA IR: blocks, instructions, def-use bookkeeping, and the
//! graph container the optimization passes operate on.

pub mod alias;
pub mod block;
pub mod builder;
pub mod cmp_cond;
pub mod graph;
pub mod inst;
pub mod value;
pub mod writer;

pub use alias::AliasSet;
pub use block::{BlockData, BlockRef};
pub use builder::{GraphBuilder, GraphError};
pub use cmp_cond::CmpCond;
pub use graph::MirGraph;
pub use inst::{
    BoundsCheckLowerOp, BoundsCheckOp, InstData, InstOp, InstRef, PhiOp, UseEdge,
};
pub use value::{ConstValue, ObjectShape};
