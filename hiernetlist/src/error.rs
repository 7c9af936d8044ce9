//! Fatal pipeline errors.

use std::fmt;
use compact_str::CompactString;

/// An error that aborts the pipeline. Recoverable conditions are
/// logged and worked around instead; see the `clilog` messages.
#[derive(Debug)]
pub enum NetlistError {
    /// A variable carries a `ref`/`constref` direction, which has no
    /// structural-netlist meaning.
    UnsupportedDirection {
        module: CompactString,
        var: CompactString,
    },
    /// The rhs operand widths of an assignment do not sum to its lhs
    /// width.
    AssignWidthMismatch {
        module: CompactString,
        assign_index: usize,
        lhs_width: u32,
        rhs_width: u32,
    },
    /// The actual widths of a port connection do not sum to the
    /// declared port width.
    PortWidthMismatch {
        module: CompactString,
        inst: CompactString,
        port: CompactString,
        port_width: u32,
        actual_width: u32,
    },
    /// A port connection names a port the instantiated definition does
    /// not declare.
    UnknownPort {
        module: CompactString,
        inst: CompactString,
        port: CompactString,
    },
    /// An instance references a definition that was neither extracted
    /// nor recognized as a leaf.
    MissingModuleDef {
        module: CompactString,
        def_name: CompactString,
    },
    /// A replication whose count is missing, non-constant, or zero.
    BadReplicate { module: CompactString },
    /// The instantiation graph is cyclic.
    RecursiveHierarchy { module: CompactString },
    /// The top module cannot be determined.
    NoTopModule { candidates: usize },
    /// Writing a netlist file failed.
    EmitterIo(std::io::Error),
}

impl fmt::Display for NetlistError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use NetlistError::*;
        match self {
            UnsupportedDirection { module, var } => write!(
                f, "variable {} in module {} has an unsupported \
                    direction; only input, output, inout and plain \
                    nets are representable",
                var, module),
            AssignWidthMismatch {
                module, assign_index, lhs_width, rhs_width
            } => write!(
                f, "assignment #{} in module {} is incompatible: \
                    lhs has {} bits, rhs has {}",
                assign_index, module, lhs_width, rhs_width),
            PortWidthMismatch {
                module, inst, port, port_width, actual_width
            } => write!(
                f, "connection to port {} of instance {} in module {} \
                    is incompatible: port has {} bits, actuals have {}",
                port, inst, module, port_width, actual_width),
            UnknownPort { module, inst, port } => write!(
                f, "instance {} in module {} connects port {} which \
                    its definition does not declare",
                inst, module, port),
            MissingModuleDef { module, def_name } => write!(
                f, "module {} instantiates {}, which has no definition",
                module, def_name),
            BadReplicate { module } => write!(
                f, "a replication in module {} has a missing, \
                    non-constant, or zero count",
                module),
            RecursiveHierarchy { module } => write!(
                f, "module {} instantiates itself through the hierarchy",
                module),
            NoTopModule { candidates } => write!(
                f, "cannot determine the top module ({} candidates)",
                candidates),
            EmitterIo(e) => write!(f, "netlist output failed: {}", e),
        }
    }
}

impl From<std::io::Error> for NetlistError {
    fn from(e: std::io::Error) -> NetlistError {
        NetlistError::EmitterIo(e)
    }
}
