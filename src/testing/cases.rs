//! Canonical hand-built graphs used across the pass tests.
//!
//! Each constructor returns the sealed graph plus handles to the
//! instructions the tests assert on.

use crate::mir::{
    BlockRef, CmpCond, ConstValue, GraphBuilder, InstRef, MirGraph, ObjectShape,
};

/// ```js
/// var a = 3, b = 4;
/// return a + b;
/// ```
pub struct StraightLineCase {
    pub graph: MirGraph,
    pub a: InstRef,
    pub b: InstRef,
    pub add: InstRef,
    pub ret: InstRef,
}

pub fn straight_line_sum() -> StraightLineCase {
    let mut builder = GraphBuilder::new("straight_line_sum");
    let entry = builder.new_block();
    builder.switch_to(entry);
    let a = builder.int32(3);
    let b = builder.int32(4);
    let add = builder.add(a, b);
    let ret = builder.ret(add).unwrap();
    StraightLineCase { graph: builder.seal().unwrap(), a, b, add, ret }
}

/// A loop-carried value that is never modified inside the loop:
///
/// ```js
/// var n = 5;
/// while (n < 10) { }
/// return n;
/// ```
///
/// The header phi merges the constant with itself through the backedge, so
/// only cycle resolution can prove it constant.
pub struct LoopPhiCase {
    pub graph: MirGraph,
    pub phi: InstRef,
    pub ret: InstRef,
}

pub fn self_referential_loop_phi() -> LoopPhiCase {
    let mut builder = GraphBuilder::new("self_referential_loop_phi");
    let entry = builder.new_block();
    let header = builder.new_block();
    let backedge = builder.new_block();
    let exit = builder.new_block();
    builder.mark_loop(header, backedge);

    builder.switch_to(entry);
    let c5 = builder.int32(5);
    let c10 = builder.int32(10);
    builder.goto(header).unwrap();

    builder.switch_to(header);
    let phi = builder.phi(0, 2);
    let cmp = builder.compare(CmpCond::Lt, phi, c10);
    builder.test(cmp, backedge, exit).unwrap();

    builder.switch_to(backedge);
    builder.goto(header).unwrap();

    builder.switch_to(exit);
    let ret = builder.ret(phi).unwrap();

    builder.fill_phi(phi, 0, c5).unwrap();
    builder.fill_phi(phi, 1, phi).unwrap();
    LoopPhiCase { graph: builder.seal().unwrap(), phi, ret }
}

/// Two constants merge into one phi whose value then merges with an
/// unknown:
///
/// ```js
/// var v = cond1() ? 1 : 2;
/// return cond2() ? compute() : v;
/// ```
pub struct PhiMergeCase {
    pub graph: MirGraph,
    /// `phi(1, 2)` — resolves to `Top`.
    pub merge_phi: InstRef,
    /// `phi(compute(), merge_phi)`.
    pub outer_phi: InstRef,
    pub ret: InstRef,
}

pub fn phi_merge_to_top() -> PhiMergeCase {
    let mut builder = GraphBuilder::new("phi_merge_to_top");
    let entry = builder.new_block();
    let left = builder.new_block();
    let right = builder.new_block();
    let merge = builder.new_block();
    let compute = builder.new_block();
    let skip = builder.new_block();
    let tail = builder.new_block();

    builder.switch_to(entry);
    let c1 = builder.int32(1);
    let c2 = builder.int32(2);
    let cond1 = builder.call(&[]);
    builder.test(cond1, left, right).unwrap();

    builder.switch_to(left);
    builder.goto(merge).unwrap();
    builder.switch_to(right);
    builder.goto(merge).unwrap();

    builder.switch_to(merge);
    let merge_phi = builder.phi(0, 2);
    builder.fill_phi(merge_phi, 0, c1).unwrap();
    builder.fill_phi(merge_phi, 1, c2).unwrap();
    let cond2 = builder.call(&[]);
    builder.test(cond2, compute, skip).unwrap();

    builder.switch_to(compute);
    let unknown = builder.call(&[]);
    builder.goto(tail).unwrap();
    builder.switch_to(skip);
    builder.goto(tail).unwrap();

    builder.switch_to(tail);
    let outer_phi = builder.phi(1, 2);
    builder.fill_phi(outer_phi, 0, unknown).unwrap();
    builder.fill_phi(outer_phi, 1, merge_phi).unwrap();
    let ret = builder.ret(outer_phi).unwrap();

    PhiMergeCase { graph: builder.seal().unwrap(), merge_phi, outer_phi, ret }
}

/// A diamond whose phi merges two distinct constant instructions carrying
/// the same value; downstream blocks record the phi in their entry slot
/// tables.
pub struct DiamondPhiCase {
    pub graph: MirGraph,
    pub merge: BlockRef,
    pub tail: BlockRef,
    /// The constant the phi folds to.
    pub first_constant: InstRef,
}

pub fn diamond_phi_of_equal_constants() -> DiamondPhiCase {
    let mut builder = GraphBuilder::new("diamond_phi_of_equal_constants");
    let entry = builder.new_block();
    let left = builder.new_block();
    let right = builder.new_block();
    let merge = builder.new_block();
    let tail = builder.new_block();

    builder.switch_to(entry);
    let c5a = builder.int32(5);
    let c5b = builder.int32(5);
    let cond = builder.call(&[]);
    builder.test(cond, left, right).unwrap();

    builder.switch_to(left);
    builder.goto(merge).unwrap();
    builder.switch_to(right);
    builder.goto(merge).unwrap();

    builder.switch_to(merge);
    let phi = builder.phi(0, 2);
    builder.fill_phi(phi, 0, c5a).unwrap();
    builder.fill_phi(phi, 1, c5b).unwrap();
    builder.goto(tail).unwrap();

    builder.switch_to(tail);
    builder.set_entry_slot(tail, 0, phi);
    builder.ret(phi).unwrap();

    DiamondPhiCase { graph: builder.seal().unwrap(), merge, tail, first_constant: c5a }
}

/// Shape of [`for_loop_array_walk`].
#[derive(Clone, Copy)]
pub struct ForLoopShape {
    /// Exit comparison, `<` or `<=`.
    pub cond: CmpCond,
    /// Initial counter value.
    pub lower: i32,
    /// Right side of the exit comparison.
    pub limit: i32,
    /// Initialized length of the dense-array literal being indexed.
    pub initialized_length: u32,
    /// `minimum` of the bounds check.
    pub check_minimum: i32,
    /// `maximum` of the bounds check.
    pub check_maximum: i32,
    /// Emit a store that uses the array constant as an operand.
    pub with_store: bool,
    /// Give the bounds check a consumer the deletion phase cannot rewrite.
    pub extra_check_consumer: bool,
}

impl Default for ForLoopShape {
    fn default() -> Self {
        Self {
            cond: CmpCond::Lt,
            lower: 0,
            limit: 10,
            initialized_length: 10,
            check_minimum: 0,
            check_maximum: 0,
            with_store: false,
            extra_check_consumer: false,
        }
    }
}

/// ```js
/// var arr = [/* initialized_length elements */];
/// for (var i = lower; i < limit; i++)
///     n = arr[i];
/// ```
///
/// The element access goes through the full guard chain: the check reads
/// the array's initialized length and the load indexes through the check.
pub struct ForLoopCase {
    pub graph: MirGraph,
    pub entry: BlockRef,
    pub header: BlockRef,
    pub body: BlockRef,
    pub exit: BlockRef,
    pub array: InstRef,
    pub phi: InstRef,
    pub check: InstRef,
    pub load: InstRef,
    pub add: InstRef,
}

pub fn for_loop_array_walk(shape: ForLoopShape) -> ForLoopCase {
    let mut builder = GraphBuilder::new("for_loop_array_walk");
    let entry = builder.new_block();
    let header = builder.new_block();
    let body = builder.new_block();
    let exit = builder.new_block();
    builder.mark_loop(header, body);

    builder.switch_to(entry);
    let c_lower = builder.int32(shape.lower);
    let c1 = builder.int32(1);
    let c_limit = builder.int32(shape.limit);
    let array = builder.constant(ConstValue::Object(ObjectShape::DenseArray {
        initialized_length: shape.initialized_length,
    }));
    builder.goto(header).unwrap();

    builder.switch_to(header);
    let phi = builder.phi(0, 2);
    let cmp = builder.compare(shape.cond, phi, c_limit);
    builder.test(cmp, body, exit).unwrap();

    builder.switch_to(body);
    let elements = builder.elements(array);
    let length = builder.initialized_length(elements);
    let check =
        builder.bounds_check(phi, length, shape.check_minimum, shape.check_maximum);
    let load = builder.load_element(elements, check);
    if shape.with_store {
        builder.store_element(elements, c_lower, array);
    }
    if shape.extra_check_consumer {
        builder.pass_arg(check);
    }
    let add = builder.add(phi, c1);
    builder.goto(header).unwrap();

    builder.switch_to(exit);
    builder.ret(c_lower).unwrap();

    builder.fill_phi(phi, 0, c_lower).unwrap();
    builder.fill_phi(phi, 1, add).unwrap();

    ForLoopCase {
        graph: builder.seal().unwrap(),
        entry,
        header,
        body,
        exit,
        array,
        phi,
        check,
        load,
        add,
    }
}

/// ```js
/// var arr = [/* initialized_length elements */];
/// var i = 0;
/// do {
///     n = arr[i];
///     i++;
/// } while (i < limit);
/// ```
///
/// The exit test sits at the bottom of the body and compares the already
/// incremented counter, so the header itself is part of the loop body.
pub struct DoWhileCase {
    pub graph: MirGraph,
    pub entry: BlockRef,
    pub header: BlockRef,
    pub backedge: BlockRef,
    pub exit: BlockRef,
    pub phi: InstRef,
    pub check: InstRef,
    pub load: InstRef,
}

pub fn do_while_array_walk(limit: i32, initialized_length: u32) -> DoWhileCase {
    let mut builder = GraphBuilder::new("do_while_array_walk");
    let entry = builder.new_block();
    let header = builder.new_block();
    let backedge = builder.new_block();
    let exit = builder.new_block();
    builder.mark_loop(header, backedge);

    builder.switch_to(entry);
    let c0 = builder.int32(0);
    let c1 = builder.int32(1);
    let c_limit = builder.int32(limit);
    let array = builder
        .constant(ConstValue::Object(ObjectShape::DenseArray { initialized_length }));
    builder.goto(header).unwrap();

    builder.switch_to(header);
    let phi = builder.phi(0, 2);
    let elements = builder.elements(array);
    let length = builder.initialized_length(elements);
    let check = builder.bounds_check(phi, length, 0, 0);
    let load = builder.load_element(elements, check);
    let add = builder.add(phi, c1);
    let cmp = builder.compare(CmpCond::Lt, add, c_limit);
    builder.test(cmp, backedge, exit).unwrap();

    builder.switch_to(backedge);
    builder.goto(header).unwrap();

    builder.switch_to(exit);
    builder.ret(c0).unwrap();

    builder.fill_phi(phi, 0, c0).unwrap();
    builder.fill_phi(phi, 1, add).unwrap();

    DoWhileCase {
        graph: builder.seal().unwrap(),
        entry,
        header,
        backedge,
        exit,
        phi,
        check,
        load,
    }
}

/// The counting loop from [`for_loop_array_walk`] guarding its access with
/// a lower-bound-only check of the given `minimum`.
pub struct LowerCheckCase {
    pub graph: MirGraph,
    pub phi: InstRef,
    pub check: InstRef,
    pub load: InstRef,
}

pub fn lower_check_loop(minimum: i32) -> LowerCheckCase {
    let mut builder = GraphBuilder::new("lower_check_loop");
    let entry = builder.new_block();
    let header = builder.new_block();
    let body = builder.new_block();
    let exit = builder.new_block();
    builder.mark_loop(header, body);

    builder.switch_to(entry);
    let c0 = builder.int32(0);
    let c1 = builder.int32(1);
    let c_limit = builder.int32(10);
    let array = builder
        .constant(ConstValue::Object(ObjectShape::DenseArray { initialized_length: 10 }));
    builder.goto(header).unwrap();

    builder.switch_to(header);
    let phi = builder.phi(0, 2);
    let cmp = builder.compare(CmpCond::Lt, phi, c_limit);
    builder.test(cmp, body, exit).unwrap();

    builder.switch_to(body);
    let elements = builder.elements(array);
    let check = builder.bounds_check_lower(phi, minimum);
    let load = builder.load_element(elements, check);
    let add = builder.add(phi, c1);
    builder.goto(header).unwrap();

    builder.switch_to(exit);
    builder.ret(c0).unwrap();

    builder.fill_phi(phi, 0, c0).unwrap();
    builder.fill_phi(phi, 1, add).unwrap();

    LowerCheckCase { graph: builder.seal().unwrap(), phi, check, load }
}
