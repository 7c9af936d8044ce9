//! Data model of an elaborated, typed hardware design AST.
//!
//! The upstream elaborator resolves parameters, generates, and types,
//! and hands over a tree of [`AstNode`]s. This crate only describes
//! that tree; walking it and turning it into a netlist is the job of
//! the `hiernetlist` crate.
//!
//! # Usage
//!
//! Trees are built with the constructor shortcuts on [`AstNode`]:
//! ```
//! use elabast::{AstNode, Access, VarDirection};
//!
//! let _root = AstNode::netlist(vec![
//!     AstNode::module("buf1", 1, vec![
//!         AstNode::var("a", VarDirection::Input, 1),
//!         AstNode::var("y", VarDirection::Output, 1),
//!         AstNode::assign_w(
//!             AstNode::varref("y", Access::Write, 0, 0),
//!             AstNode::varref("a", Access::Read, 0, 0),
//!         ),
//!     ]),
//! ]);
//! ```

use compact_str::CompactString;

mod constbits;
pub use constbits::ConstBits;

/// Declared direction of a variable.
///
/// `ScopedRef` and `ConstRef` exist in the upstream node dump but are
/// not representable in a structural netlist; consumers reject them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarDirection {
    Input,
    Output,
    Inout,
    /// Plain net, no I/O direction.
    None,
    ScopedRef,
    ConstRef,
}

/// Access mode of a variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Kind tag and payload of an AST node.
///
/// Children live in [`AstNode::children`], ordered as in source. This
/// is the flattened rendition of the upstream first-child/next-sibling
/// links: `Concat` children are most-significant first, `Sel` children
/// are `[base, start offset, width]`, `Replicate` children are
/// `[element, count]`.
#[derive(Debug, Clone, PartialEq)]
pub enum AstKind {
    /// The design root. Children are modules and auxiliary tables.
    Netlist,
    /// A module definition. `level` is the provider's hierarchy level,
    /// kept for cross-checking only.
    Module { name: CompactString, level: u32 },
    /// A variable (port, net, or parameter) declaration.
    Var {
        name: CompactString,
        direction: VarDirection,
        width: u32,
        is_param: bool,
    },
    /// Continuous assignment.
    AssignW,
    /// Blocking assignment (post-elaboration these are structural too).
    Assign,
    /// A submodule instantiation. Children are `Pin`s.
    Cell {
        inst_name: CompactString,
        def_name: CompactString,
    },
    /// One named port connection under a `Cell`. The single child is
    /// the connected expression.
    Pin { port_name: CompactString },
    /// Concatenation, children MSB-first.
    Concat,
    /// Bit slice of a base reference.
    Sel,
    /// Reference to a declared variable. `decl_left`/`decl_right` are
    /// the declared range bounds in either orientation; scalars carry
    /// `0, 0`.
    VarRef {
        name: CompactString,
        access: Access,
        decl_left: i32,
        decl_right: i32,
    },
    /// Zero extension of the single child up to `width` bits.
    Extend { width: u32 },
    /// Sign extension of the single child up to `width` bits.
    ExtendS { width: u32 },
    /// Replication; children are `[element, count constant]`.
    Replicate,
    /// A constant literal.
    Const { bits: ConstBits },
    /// Type table; carries no netlist information.
    TypeTable,
    /// Any node kind this model does not describe. Consumers recurse
    /// through it transparently.
    Other,
}

/// One node of the elaborated AST.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: AstKind,
    pub children: Vec<AstNode>,
}

impl AstNode {
    #[inline]
    fn leaf(kind: AstKind) -> AstNode {
        AstNode { kind, children: Vec::new() }
    }

    pub fn netlist(children: Vec<AstNode>) -> AstNode {
        AstNode { kind: AstKind::Netlist, children }
    }

    pub fn module(
        name: impl Into<CompactString>, level: u32, children: Vec<AstNode>
    ) -> AstNode {
        AstNode {
            kind: AstKind::Module { name: name.into(), level },
            children,
        }
    }

    pub fn var(
        name: impl Into<CompactString>, direction: VarDirection, width: u32
    ) -> AstNode {
        AstNode::leaf(AstKind::Var {
            name: name.into(), direction, width, is_param: false,
        })
    }

    /// A parameter declaration. Parameters survive elaboration as
    /// informational nodes only.
    pub fn param(name: impl Into<CompactString>, width: u32) -> AstNode {
        AstNode::leaf(AstKind::Var {
            name: name.into(),
            direction: VarDirection::None,
            width,
            is_param: true,
        })
    }

    pub fn assign_w(lhs: AstNode, rhs: AstNode) -> AstNode {
        AstNode { kind: AstKind::AssignW, children: vec![lhs, rhs] }
    }

    pub fn assign(lhs: AstNode, rhs: AstNode) -> AstNode {
        AstNode { kind: AstKind::Assign, children: vec![lhs, rhs] }
    }

    pub fn cell(
        inst_name: impl Into<CompactString>,
        def_name: impl Into<CompactString>,
        pins: Vec<AstNode>,
    ) -> AstNode {
        AstNode {
            kind: AstKind::Cell {
                inst_name: inst_name.into(),
                def_name: def_name.into(),
            },
            children: pins,
        }
    }

    pub fn pin(port_name: impl Into<CompactString>, actual: AstNode) -> AstNode {
        AstNode {
            kind: AstKind::Pin { port_name: port_name.into() },
            children: vec![actual],
        }
    }

    pub fn concat(parts: Vec<AstNode>) -> AstNode {
        AstNode { kind: AstKind::Concat, children: parts }
    }

    /// A slice of `width` bits of `base`, starting at zero-based bit
    /// offset `start`. The offsets become 32-bit constant children, as
    /// the elaborator emits them.
    pub fn sel(base: AstNode, start: u32, width: u32) -> AstNode {
        AstNode {
            kind: AstKind::Sel,
            children: vec![
                base,
                AstNode::const_u64(32, start as u64),
                AstNode::const_u64(32, width as u64),
            ],
        }
    }

    pub fn varref(
        name: impl Into<CompactString>, access: Access,
        decl_left: i32, decl_right: i32,
    ) -> AstNode {
        AstNode::leaf(AstKind::VarRef {
            name: name.into(), access, decl_left, decl_right,
        })
    }

    pub fn extend(width: u32, operand: AstNode) -> AstNode {
        AstNode { kind: AstKind::Extend { width }, children: vec![operand] }
    }

    pub fn extend_signed(width: u32, operand: AstNode) -> AstNode {
        AstNode { kind: AstKind::ExtendS { width }, children: vec![operand] }
    }

    pub fn replicate(element: AstNode, count: u32) -> AstNode {
        AstNode {
            kind: AstKind::Replicate,
            children: vec![element, AstNode::const_u64(32, count as u64)],
        }
    }

    pub fn constant(bits: ConstBits) -> AstNode {
        AstNode::leaf(AstKind::Const { bits })
    }

    /// Shortcut for a constant of up to 64 bits.
    pub fn const_u64(width: u32, value: u64) -> AstNode {
        AstNode::constant(ConstBits::from_u64(width, value))
    }

    pub fn type_table() -> AstNode {
        AstNode::leaf(AstKind::TypeTable)
    }

    pub fn other(children: Vec<AstNode>) -> AstNode {
        AstNode { kind: AstKind::Other, children }
    }

    /// Bit width of an expression node. Statement-level nodes report 0.
    pub fn width(&self) -> u32 {
        match &self.kind {
            AstKind::Var { width, .. } => *width,
            AstKind::VarRef { decl_left, decl_right, .. } => {
                (decl_left - decl_right).unsigned_abs() + 1
            }
            AstKind::Const { bits } => bits.width,
            AstKind::Concat => self.children.iter().map(|c| c.width()).sum(),
            AstKind::Sel => match self.children.get(2).map(|c| &c.kind) {
                Some(AstKind::Const { bits }) => bits.as_u32(),
                _ => 0,
            },
            AstKind::Extend { width } | AstKind::ExtendS { width } => *width,
            AstKind::Replicate => {
                let elem = self.children.first().map(|c| c.width()).unwrap_or(0);
                let count = match self.children.get(1).map(|c| &c.kind) {
                    Some(AstKind::Const { bits }) => bits.as_u32(),
                    _ => 0,
                };
                elem * count
            }
            _ => 0,
        }
    }
}

#[test]
fn test_expr_width() {
    use Access::*;
    let e = AstNode::concat(vec![
        AstNode::sel(AstNode::varref("c", Read, 1, 0), 0, 2),
        AstNode::varref("d", Read, 0, 0),
    ]);
    assert_eq!(e.width(), 3);
    let e = AstNode::replicate(AstNode::varref("a", Read, 1, 0), 3);
    assert_eq!(e.width(), 6);
    let e = AstNode::extend(8, AstNode::varref("a", Read, 4, 2));
    assert_eq!(e.width(), 8);
    // declared ranges may be given in either orientation.
    assert_eq!(AstNode::varref("v", Read, 0, 7).width(), 8);
}
