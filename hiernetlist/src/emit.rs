//! Structural verilog text output.

use std::collections::HashMap;
use std::fmt::{self, Write};
use compact_str::CompactString;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;

use super::*;

lazy_static! {
    static ref RE_SAFE_IDENT: Regex =
        Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_\$]*$").unwrap();
}

pub(crate) struct VIdentFmt<'i>(pub &'i str);

impl fmt::Display for VIdentFmt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if RE_SAFE_IDENT.is_match(self.0) {
            write!(f, "{}", self.0)
        }
        else {
            write!(f, "\\{} ", self.0)
        }
    }
}

impl fmt::Display for BitRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.is_vector {
            true => write!(f, "{}[{}]", VIdentFmt(&self.name), self.index),
            false => write!(f, "{}", VIdentFmt(&self.name)),
        }
    }
}

impl fmt::Display for RefOne {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RefOne::Var(b) => write!(f, "{}", b),
            RefOne::Const(v) => write!(f, "1'b{}", v),
        }
    }
}

impl fmt::Display for AssignOne {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "assign {} = {};", self.lhs, self.rhs)
    }
}

impl fmt::Display for PortDir {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            PortDir::Input => "input",
            PortDir::Output => "output",
            PortDir::Inout => "inout",
            PortDir::Wire => "wire",
        })
    }
}

impl fmt::Display for PortDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.is_vector {
            false => write!(f, "{} {};", self.dir, VIdentFmt(&self.name)),
            true => write!(f, "{} [{}:0] {};", self.dir,
                           self.width - 1, VIdentFmt(&self.name)),
        }
    }
}

/// One instance line. Connections print in the port-declaration order
/// of the instantiated definition; a port the instance does not
/// connect prints open.
fn write_instance(
    f: &mut impl Write,
    inst: &SubInstanceOne,
    def: Option<&ModuleOne>,
) -> fmt::Result {
    let conn_str = |conn: Option<&PortConnOne>| -> String {
        match conn.map(|c| c.bits.as_slice()) {
            None | Some([]) => String::new(),
            Some([b]) => format!("{}", b),
            Some(bits) => format!("{{{}}}", bits.iter().format(", ")),
        }
    };
    let ports: Vec<String> = match def {
        Some(def) => def.ports().map(|p| format!(
            ".{}({})",
            VIdentFmt(&p.name),
            conn_str(inst.conns.iter().find(|c| c.port == p.name)),
        )).collect(),
        // an unknown definition cannot be reordered; keep the stored
        // connection order.
        None => inst.conns.iter().map(|c| format!(
            ".{}({})", VIdentFmt(&c.port), conn_str(Some(c)),
        )).collect(),
    };
    writeln!(f, "{} {} ({});",
             VIdentFmt(&inst.def_name), VIdentFmt(&inst.inst_name),
             ports.iter().format(", "))
}

fn write_module(
    f: &mut impl Write,
    m: &ModuleOne,
    black_box: bool,
    lookup: &impl Fn(&CompactString) -> Option<usize>,
    all: &[ModuleOne],
) -> fmt::Result {
    writeln!(f, "module {}({});",
             VIdentFmt(&m.def_name),
             m.ports().map(|p| VIdentFmt(&p.name)).format(", "))?;
    {
        let mut ind = indenter::indented(f)
            .with_format(indenter::Format::Uniform { indentation: "  " });
        for p in m.ports() {
            writeln!(ind, "{}", p)?;
        }
        if !black_box {
            for w in &m.wires {
                writeln!(ind, "{}", w)?;
            }
            writeln!(ind)?;
            for a in &m.assigns {
                writeln!(ind, "{}", a)?;
            }
            for inst in &m.sub_insts {
                write_instance(
                    &mut ind, inst,
                    lookup(&inst.def_name).map(|i| &all[i]))?;
            }
        }
    }
    writeln!(f, "endmodule")
}

/// Displays a netlist: the first `num_leaves` modules of `hier` print
/// as black boxes. With `flat_top` unset, the remaining hierarchy
/// follows; with it set, only that module follows.
struct NetlistDisplay<'i> {
    hier: &'i [ModuleOne],
    index: &'i HashMap<CompactString, usize>,
    num_leaves: usize,
    flat_top: Option<&'i ModuleOne>,
}

impl fmt::Display for NetlistDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use either::Either;
        let lookup = |name: &CompactString| self.index.get(name).copied();
        for m in &self.hier[..self.num_leaves] {
            write_module(f, m, true, &lookup, self.hier)?;
        }
        let bodies = match self.flat_top {
            None => Either::Left(self.hier[self.num_leaves..].iter()),
            Some(top) => Either::Right(std::iter::once(top)),
        };
        for m in bodies {
            write_module(f, m, false, &lookup, self.hier)?;
        }
        Ok(())
    }
}

pub(crate) fn format_netlist(
    hier: &[ModuleOne],
    index: &HashMap<CompactString, usize>,
    num_leaves: usize,
    flat_top: Option<&ModuleOne>,
) -> String {
    format!("{}", NetlistDisplay { hier, index, num_leaves, flat_top })
}
