//! A hierarchical, bit-exact netlist extracted from an elaborated
//! hardware design AST.
//!
//! The pipeline runs three stages over an [`elabast::AstNode`] root:
//!
//! 1. *extract* -- walk the AST and collect one multi-bit
//!    [`ModuleMulti`] record per module definition, with operands
//!    keeping their declared widths and slice ranges;
//! 2. *explode* -- rewrite every assignment and port connection into
//!    ordered single-bit references, producing [`ModuleOne`] records;
//! 3. *flatten* -- inline every non-leaf module bottom-up until the
//!    top module instantiates leaf cells only.
//!
//! The frozen result is a [`Netlist`]: the level-sorted one-bit
//! hierarchical netlist, the flat netlist, usage counters, and writers
//! for the `HierNetlist.v` / `FlatNetlist.v` text outputs.

use std::collections::{HashMap, HashSet};
use compact_str::CompactString;
use elabast::AstNode;
pub use elabast::ConstBits;

mod error;
pub use error::NetlistError;

mod extract;
mod explode;
mod flatten;
mod emit;
mod utils;

/// Module definitions carrying this name are elaborator-internal
/// constant pools; the extractor skips them.
pub(crate) const CONST_POOL: &str = "@CONST-POOL@";

/// An inclusive bit interval with `start <= end`, zero-based after
/// extraction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BitRange {
    pub start: u32,
    pub end: u32,
}

impl BitRange {
    #[inline]
    pub fn width(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// Role of a declared net.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDir {
    Input,
    Output,
    Inout,
    /// Internal net.
    Wire,
}

/// A declared port or internal net.
#[derive(Debug, Clone, PartialEq)]
pub struct PortDef {
    pub name: CompactString,
    pub dir: PortDir,
    pub width: u32,
    pub is_vector: bool,
}

/// A named multi-bit reference: a whole vector or a slice of one.
///
/// `is_vector` records whether the *declaration* is a vector; a 1-bit
/// slice of a vector keeps it set so the emitter prints an index.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VarBits {
    pub name: CompactString,
    pub range: BitRange,
    pub is_vector: bool,
}

/// One operand of a multi-bit assignment or port connection.
#[derive(Debug, Clone, PartialEq)]
pub enum RefMulti {
    Var(VarBits),
    Const(ConstBits),
}

impl RefMulti {
    #[inline]
    pub fn width(&self) -> u32 {
        match self {
            RefMulti::Var(v) => v.range.width(),
            RefMulti::Const(c) => c.width,
        }
    }
}

/// A continuous assignment before bit explosion. The rhs operands are
/// most-significant first and their widths sum to the lhs width.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignMulti {
    pub lhs: VarBits,
    pub rhs: Vec<RefMulti>,
}

/// One named port connection before bit explosion, actuals MSB-first.
#[derive(Debug, Clone, PartialEq)]
pub struct PortConnMulti {
    pub port: CompactString,
    pub actuals: Vec<RefMulti>,
}

/// A submodule instantiation before bit explosion.
#[derive(Debug, Clone, PartialEq)]
pub struct SubInstance {
    pub inst_name: CompactString,
    pub def_name: CompactString,
    pub conns: Vec<PortConnMulti>,
}

/// A module definition with multi-bit operands. `assigns` and
/// `sub_insts` keep AST source order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleMulti {
    pub def_name: CompactString,
    /// Canonical hierarchy level: leaves 0, otherwise one more than
    /// the deepest instantiated definition.
    pub level: u32,
    /// Hierarchy level as reported by the AST provider.
    pub ast_level: u32,
    pub inputs: Vec<PortDef>,
    pub outputs: Vec<PortDef>,
    pub inouts: Vec<PortDef>,
    pub wires: Vec<PortDef>,
    pub assigns: Vec<AssignMulti>,
    pub sub_insts: Vec<SubInstance>,
}

impl ModuleMulti {
    pub(crate) fn new(def_name: CompactString, ast_level: u32) -> ModuleMulti {
        ModuleMulti {
            def_name,
            level: 0,
            ast_level,
            inputs: Vec::new(),
            outputs: Vec::new(),
            inouts: Vec::new(),
            wires: Vec::new(),
            assigns: Vec::new(),
            sub_insts: Vec::new(),
        }
    }

    /// I/O ports in declaration order: inputs, outputs, inouts.
    pub fn ports(&self) -> impl Iterator<Item = &PortDef> {
        self.inputs.iter()
            .chain(self.outputs.iter())
            .chain(self.inouts.iter())
    }

    pub fn port(&self, name: &str) -> Option<&PortDef> {
        self.ports().find(|p| p.name == name)
    }

    /// A module whose body carries nothing is a leaf (black box):
    /// flattening stops at it.
    pub fn is_leaf_body(&self) -> bool {
        self.assigns.is_empty()
            && self.sub_insts.is_empty()
            && self.wires.is_empty()
    }
}

/// A single-bit reference to a declared net.
#[derive(Debug, Clone, PartialEq)]
pub struct BitRef {
    pub name: CompactString,
    pub index: u32,
    pub is_vector: bool,
}

/// One operand bit after explosion: a net bit or a tie constant.
#[derive(Debug, Clone, PartialEq)]
pub enum RefOne {
    Var(BitRef),
    /// A tie-low/tie-high bit, printed `1'b0` / `1'b1`.
    Const(u8),
}

/// A single-bit continuous assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignOne {
    pub lhs: BitRef,
    pub rhs: RefOne,
}

/// One named port connection after explosion, bits MSB-first.
#[derive(Debug, Clone, PartialEq)]
pub struct PortConnOne {
    pub port: CompactString,
    pub bits: Vec<RefOne>,
}

/// A submodule instantiation after explosion.
#[derive(Debug, Clone, PartialEq)]
pub struct SubInstanceOne {
    pub inst_name: CompactString,
    pub def_name: CompactString,
    pub conns: Vec<PortConnOne>,
}

/// A module definition in the one-bit netlist.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOne {
    pub def_name: CompactString,
    pub level: u32,
    pub inputs: Vec<PortDef>,
    pub outputs: Vec<PortDef>,
    pub inouts: Vec<PortDef>,
    pub wires: Vec<PortDef>,
    pub assigns: Vec<AssignOne>,
    pub sub_insts: Vec<SubInstanceOne>,
}

impl ModuleOne {
    /// I/O ports in declaration order: inputs, outputs, inouts.
    pub fn ports(&self) -> impl Iterator<Item = &PortDef> {
        self.inputs.iter()
            .chain(self.outputs.iter())
            .chain(self.inouts.iter())
    }

    pub fn port(&self, name: &str) -> Option<&PortDef> {
        self.ports().find(|p| p.name == name)
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct NetlistConfig {
    /// Leaf cell names known to be empty in the library. They are
    /// excluded from the "not empty" usage counters only.
    pub empty_leaf_names: HashSet<CompactString>,
}

impl Default for NetlistConfig {
    fn default() -> NetlistConfig {
        NetlistConfig {
            empty_leaf_names: ["MemGen_16_10", "PLL"]
                .into_iter().map(CompactString::from).collect(),
        }
    }
}

/// The frozen pipeline result.
///
/// The public members are all READ-ONLY outside. A `Netlist` is
/// produced in one shot by [`Netlist::from_ast`] and never mutated
/// afterwards.
#[readonly::make]
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Netlist {
    /// One-bit hierarchical netlist, ascending level, leaves first.
    pub hier: Vec<ModuleOne>,
    /// One-bit flat netlist: leaves carried over unchanged, every
    /// user module inlined down to leaf instances.
    pub flat: Vec<ModuleOne>,
    /// Module definition name to index in [`Netlist::hier`] (and
    /// [`Netlist::flat`], which is index-parallel).
    pub module_index: HashMap<CompactString, usize>,
    /// Number of leaf (black box) modules; they occupy indices
    /// `0..num_leaf_modules`.
    pub num_leaf_modules: usize,
    /// Index of the top module.
    pub top_index: usize,
    /// Leaf definitions instantiated at least once.
    pub total_used_std_cells: usize,
    /// Used leaf definitions not named in the empty-leaf set.
    pub total_used_not_empty_std_cells: usize,
    /// All leaf definitions.
    pub total_used_black_boxes: usize,
    /// Flat-top one-bit assignments whose rhs is a named reference
    /// rather than a tie constant.
    pub total_not_tie_constant_assign: usize,
    /// Flat-top leaf instances whose definition is not in the
    /// empty-leaf set.
    pub total_used_not_empty_ins_in_top: usize,
}

impl Netlist {
    /// Run the full pipeline over an AST root.
    pub fn from_ast(
        root: &AstNode, config: &NetlistConfig
    ) -> Result<Netlist, NetlistError> {
        let time_extract = clilog::stimer!("netlist_extract");
        let extract::Extraction { mut modules, mut order } =
            extract::extract(root)?;
        clilog::finish!(time_extract);

        utils::synthesize_leaf_defs(&mut modules, &mut order);
        let levels = utils::compute_levels(&modules, &order)?;
        for name in &order {
            let m = modules.get_mut(name).unwrap();
            m.level = *levels.get(name).unwrap();
            if m.ast_level != 0 && m.ast_level != m.level {
                clilog::warn!(
                    NL_LEVEL_MISMATCH,
                    "module {} reports hierarchy level {} but resolves \
                     to {}; using the resolved level",
                    name, m.ast_level, m.level);
            }
        }

        // sort ascending by level, stable within a level (leaves first,
        // top last).
        let mut names = order;
        names.sort_by_key(|n| modules.get(n).unwrap().level);
        let module_index: HashMap<CompactString, usize> = names.iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        let sorted: Vec<ModuleMulti> = names.iter()
            .map(|n| modules.remove(n).unwrap())
            .collect();
        let num_leaf_modules = sorted.iter()
            .take_while(|m| m.level == 0)
            .count();

        let top_index = utils::find_top(&sorted, num_leaf_modules)?;

        let time_explode = clilog::stimer!("netlist_explode");
        let hier: Vec<ModuleOne> = sorted.iter()
            .map(|m| explode::explode_module(m, &sorted, &module_index))
            .collect::<Result<_, _>>()?;
        clilog::finish!(time_explode);

        let time_flatten = clilog::stimer!("netlist_flatten");
        let flat = flatten::flatten_netlist(
            &hier, num_leaf_modules, &module_index);
        clilog::finish!(time_flatten);

        // usage counters.
        let mut used_leaves: HashSet<&CompactString> = HashSet::new();
        for m in &sorted[num_leaf_modules..] {
            for inst in &m.sub_insts {
                if module_index.get(&inst.def_name)
                    .is_some_and(|&i| i < num_leaf_modules)
                {
                    used_leaves.insert(&inst.def_name);
                }
            }
        }
        let total_used_std_cells = used_leaves.len();
        let total_used_not_empty_std_cells = used_leaves.iter()
            .filter(|n| !config.empty_leaf_names.contains(n.as_str()))
            .count();
        let flat_top = &flat[top_index];
        let total_not_tie_constant_assign = flat_top.assigns.iter()
            .filter(|a| matches!(a.rhs, RefOne::Var(_)))
            .count();
        let total_used_not_empty_ins_in_top = flat_top.sub_insts.iter()
            .filter(|i| !config.empty_leaf_names.contains(i.def_name.as_str()))
            .count();

        Ok(Netlist {
            hier,
            flat,
            module_index,
            num_leaf_modules,
            top_index,
            total_used_std_cells,
            total_used_not_empty_std_cells,
            total_used_black_boxes: num_leaf_modules,
            total_not_tie_constant_assign,
            total_used_not_empty_ins_in_top,
        })
    }

    /// The single flattened top module.
    #[inline]
    pub fn flat_top(&self) -> &ModuleOne {
        &self.flat[self.top_index]
    }

    /// The one-bit hierarchical module record of a definition.
    pub fn hier_module(&self, def_name: &str) -> Option<&ModuleOne> {
        self.module_index.get(def_name).map(|&i| &self.hier[i])
    }

    /// Format the hierarchical netlist: black boxes first, then every
    /// user module in ascending level order.
    pub fn format_hier(&self) -> String {
        emit::format_netlist(
            &self.hier, &self.module_index, self.num_leaf_modules, None)
    }

    /// Format the flat netlist: black boxes plus the flattened top.
    pub fn format_flat(&self) -> String {
        emit::format_netlist(
            &self.hier, &self.module_index, self.num_leaf_modules,
            Some(self.flat_top()))
    }

    /// Write the hierarchical netlist, conventionally `HierNetlist.v`.
    pub fn write_hier(
        &self, path: impl AsRef<std::path::Path>
    ) -> Result<(), NetlistError> {
        std::fs::write(path, self.format_hier())?;
        Ok(())
    }

    /// Write the flat netlist, conventionally `FlatNetlist.v`.
    pub fn write_flat(
        &self, path: impl AsRef<std::path::Path>
    ) -> Result<(), NetlistError> {
        std::fs::write(path, self.format_flat())?;
        Ok(())
    }
}
