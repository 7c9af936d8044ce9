//! Runs the pipeline over a small hand-built design and prints the
//! usage statistics, plus the two netlist files if an output directory
//! is given.

use elabast::{Access::*, AstNode, VarDirection};
use hiernetlist::{Netlist, NetlistConfig};
use std::env;

fn demo_design() -> AstNode {
    use VarDirection::{Input, Output};
    // top
    //  +- adder2 u_add   (a ripple row over FA cells)
    //  +- PLL    u_pll   (an empty library cell)
    AstNode::netlist(vec![
        AstNode::module("FA", 0, vec![
            AstNode::var("a", Input, 1),
            AstNode::var("b", Input, 1),
            AstNode::var("ci", Input, 1),
            AstNode::var("s", Output, 1),
            AstNode::var("co", Output, 1),
        ]),
        AstNode::module("PLL", 0, vec![
            AstNode::var("clk", Input, 1),
            AstNode::var("out", Output, 1),
        ]),
        AstNode::module("adder2", 1, vec![
            AstNode::var("x", Input, 2),
            AstNode::var("y", Input, 2),
            AstNode::var("s", Output, 2),
            AstNode::var("co", Output, 1),
            AstNode::var("c0", VarDirection::None, 1),
            AstNode::cell("fa0", "FA", vec![
                AstNode::pin("a", AstNode::sel(AstNode::varref("x", Read, 1, 0), 0, 1)),
                AstNode::pin("b", AstNode::sel(AstNode::varref("y", Read, 1, 0), 0, 1)),
                AstNode::pin("ci", AstNode::const_u64(1, 0)),
                AstNode::pin("s", AstNode::sel(AstNode::varref("s", Write, 1, 0), 0, 1)),
                AstNode::pin("co", AstNode::varref("c0", Write, 0, 0)),
            ]),
            AstNode::cell("fa1", "FA", vec![
                AstNode::pin("a", AstNode::sel(AstNode::varref("x", Read, 1, 0), 1, 1)),
                AstNode::pin("b", AstNode::sel(AstNode::varref("y", Read, 1, 0), 1, 1)),
                AstNode::pin("ci", AstNode::varref("c0", Read, 0, 0)),
                AstNode::pin("s", AstNode::sel(AstNode::varref("s", Write, 1, 0), 1, 1)),
                AstNode::pin("co", AstNode::varref("co", Write, 0, 0)),
            ]),
        ]),
        AstNode::module("top", 2, vec![
            AstNode::var("clk", Input, 1),
            AstNode::var("in1", Input, 2),
            AstNode::var("in2", Input, 2),
            AstNode::var("sum", Output, 3),
            AstNode::var("clk_out", Output, 1),
            AstNode::cell("u_add", "adder2", vec![
                AstNode::pin("x", AstNode::varref("in1", Read, 1, 0)),
                AstNode::pin("y", AstNode::varref("in2", Read, 1, 0)),
                AstNode::pin("s", AstNode::sel(AstNode::varref("sum", Write, 2, 0), 0, 2)),
                AstNode::pin("co", AstNode::sel(AstNode::varref("sum", Write, 2, 0), 2, 1)),
            ]),
            AstNode::cell("u_pll", "PLL", vec![
                AstNode::pin("clk", AstNode::varref("clk", Read, 0, 0)),
                AstNode::pin("out", AstNode::varref("clk_out", Write, 0, 0)),
            ]),
        ]),
    ])
}

fn main() {
    clilog::init_stderr_color_debug();

    let root = demo_design();
    let netlist = Netlist::from_ast(&root, &NetlistConfig::default())
        .expect("Error extracting the netlist");

    println!("top module:              {}",
             netlist.flat_top().def_name);
    println!("modules:                 {}", netlist.hier.len());
    println!("used std cells:          {}", netlist.total_used_std_cells);
    println!("used non-empty cells:    {}",
             netlist.total_used_not_empty_std_cells);
    println!("black boxes:             {}", netlist.total_used_black_boxes);
    println!("non-tie assigns in top:  {}",
             netlist.total_not_tie_constant_assign);
    println!("non-empty insts in top:  {}",
             netlist.total_used_not_empty_ins_in_top);

    if let Some(dir) = env::args().nth(1) {
        let dir = std::path::Path::new(&dir);
        netlist.write_hier(dir.join("HierNetlist.v"))
            .expect("Error writing HierNetlist.v");
        netlist.write_flat(dir.join("FlatNetlist.v"))
            .expect("Error writing FlatNetlist.v");
        println!("wrote {} and {}",
                 dir.join("HierNetlist.v").display(),
                 dir.join("FlatNetlist.v").display());
    }
}
