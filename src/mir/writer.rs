//! Plain-text rendering of graphs, for trace output and debugging.

use crate::{
    base::SlabRef,
    mir::{InstOp, InstRef, MirGraph},
};
use std::fmt::{self, Write};

pub fn graph_to_string(graph: &MirGraph) -> String {
    let mut out = String::new();
    write_graph(&mut out, graph).expect("Writing to a String cannot fail");
    out
}

pub fn write_graph(w: &mut impl Write, graph: &MirGraph) -> fmt::Result {
    writeln!(w, "graph `{}` {{", graph.name)?;
    for &block in graph.block_order() {
        let body = graph.block(block);
        write!(w, "block{}:", body.id())?;
        if body.is_loop_header() {
            write!(w, "  ; loop header, backedge=block{}", graph.block(body.backedge()).id())?;
        } else if body.is_loop_backedge() {
            write!(w, "  ; loop backedge")?;
        }
        writeln!(w)?;
        for &phi in body.phis() {
            write_inst(w, graph, phi)?;
        }
        for &inst in body.insts() {
            write_inst(w, graph, inst)?;
        }
    }
    writeln!(w, "}}")
}

fn write_inst(w: &mut impl Write, graph: &MirGraph, inst: InstRef) -> fmt::Result {
    let data = graph.inst(inst);
    write!(w, "  %{} = {}", inst.get_handle(), data.opcode_name())?;
    match data.op() {
        InstOp::Constant(value) => write!(w, " {value}")?,
        InstOp::Phi(p) => write!(w, " slot{}", p.slot)?,
        InstOp::Compare(cond) => write!(w, " {}", cond.mnemonic())?,
        InstOp::BoundsCheck(b) => write!(w, " (min={}, max={})", b.minimum, b.maximum)?,
        InstOp::BoundsCheckLower(b) => write!(w, " (min={})", b.minimum)?,
        _ => {}
    }
    let mut first = true;
    for &operand in data.operands() {
        if first {
            write!(w, " ")?;
            first = false;
        } else {
            write!(w, ", ")?;
        }
        write!(w, "%{}", operand.get_handle())?;
    }
    if data.is_terminator() {
        let succs = graph.block(data.parent()).succs();
        if !succs.is_empty() {
            write!(w, " ->")?;
            for (i, &succ) in succs.iter().enumerate() {
                write!(w, "{}block{}", if i == 0 { " " } else { ", " }, graph.block(succ).id())?;
            }
        }
    }
    writeln!(w)
}
