//! The AST walk that builds the multi-bit hierarchical netlist.
//!
//! A single recursive [`HierExtractor::visit`] drives the walk, with
//! all scratch state in explicit fields: `in_assign`/`lhs_pending`
//! track the assignment context, `sel` tracks the position inside a
//! `Sel` node
//! (0 outside, 1 at the base reference, 2 at the start-offset
//! constant, 3 at the width constant), and `scratch` accumulates the
//! slice reference being built.

use std::collections::HashMap;
use std::mem;
use compact_str::CompactString;
use elabast::{Access, AstKind, AstNode, ConstBits, VarDirection};

use super::*;

/// Extraction output: module records plus their definition order.
pub(crate) struct Extraction {
    pub modules: HashMap<CompactString, ModuleMulti>,
    pub order: Vec<CompactString>,
}

/// Walk the AST root and extract one [`ModuleMulti`] per definition.
pub(crate) fn extract(root: &AstNode) -> Result<Extraction, NetlistError> {
    let mut walker = HierExtractor {
        modules: HashMap::new(),
        order: Vec::new(),
        cur_module: None,
        cur_inst: None,
        cur_conn: None,
        in_assign: false,
        lhs_pending: false,
        cur_lhs: None,
        cur_rhs: Vec::new(),
        sel: 0,
        scratch: VarBits::default(),
    };
    walker.visit(root)?;
    Ok(Extraction { modules: walker.modules, order: walker.order })
}

struct HierExtractor {
    modules: HashMap<CompactString, ModuleMulti>,
    order: Vec<CompactString>,
    /// Definition being populated.
    cur_module: Option<CompactString>,
    /// Instance being gathered while inside a `Cell`.
    cur_inst: Option<SubInstance>,
    /// Connection being gathered while inside a `Pin`.
    cur_conn: Option<PortConnMulti>,
    /// Inside an `AssignW`/`Assign` subtree.
    in_assign: bool,
    /// The write reference of the current assignment sits inside a
    /// `Sel` whose exit has not run yet.
    lhs_pending: bool,
    cur_lhs: Option<VarBits>,
    cur_rhs: Vec<RefMulti>,
    /// Position inside a `Sel` node, 0..=3.
    sel: u8,
    /// The slice reference currently being assembled.
    scratch: VarBits,
}

impl HierExtractor {
    fn visit_children(&mut self, node: &AstNode) -> Result<(), NetlistError> {
        for child in &node.children {
            self.visit(child)?;
        }
        Ok(())
    }

    fn cur_module_name(&self) -> CompactString {
        self.cur_module.clone().unwrap_or_default()
    }

    fn cur_mod_mut(&mut self) -> Option<&mut ModuleMulti> {
        let name = self.cur_module.as_ref()?;
        self.modules.get_mut(name)
    }

    /// The operand list the current context appends to: the rhs of the
    /// assignment being built, or the actuals of the pin being built.
    fn dest_mut(&mut self) -> Option<&mut Vec<RefMulti>> {
        if self.in_assign {
            Some(&mut self.cur_rhs)
        } else {
            self.cur_conn.as_mut().map(|c| &mut c.actuals)
        }
    }

    fn dest_len(&self) -> usize {
        if self.in_assign {
            self.cur_rhs.len()
        } else {
            self.cur_conn.as_ref().map(|c| c.actuals.len()).unwrap_or(0)
        }
    }

    fn push_ref(&mut self, r: RefMulti) {
        match self.dest_mut() {
            Some(dest) => dest.push(r),
            None => {
                clilog::debug!(
                    NL_EX_ORPHAN,
                    "operand outside any assignment or pin, ignored");
            }
        }
    }

    fn visit(&mut self, node: &AstNode) -> Result<(), NetlistError> {
        match &node.kind {
            AstKind::Netlist | AstKind::Concat | AstKind::Other => {
                self.visit_children(node)?;
            }
            AstKind::TypeTable => {}
            AstKind::Module { name, level } => {
                self.visit_module(name, *level, node)?;
            }
            AstKind::Var { name, direction, width, is_param } => {
                self.visit_var(name, *direction, *width, *is_param)?;
            }
            AstKind::AssignW | AstKind::Assign => {
                self.visit_assign(node)?;
            }
            AstKind::Cell { inst_name, def_name } => {
                self.cur_inst = Some(SubInstance {
                    inst_name: inst_name.clone(),
                    def_name: def_name.clone(),
                    conns: Vec::new(),
                });
                self.visit_children(node)?;
                let inst = self.cur_inst.take().unwrap();
                if let Some(m) = self.cur_mod_mut() {
                    m.sub_insts.push(inst);
                }
            }
            AstKind::Pin { port_name } => {
                self.cur_conn = Some(PortConnMulti {
                    port: port_name.clone(),
                    actuals: Vec::new(),
                });
                self.visit_children(node)?;
                let conn = self.cur_conn.take().unwrap();
                if let Some(inst) = self.cur_inst.as_mut() {
                    inst.conns.push(conn);
                }
            }
            AstKind::Sel => {
                self.sel = 1;
                self.visit_children(node)?;
                self.sel = 0;
                let vb = mem::take(&mut self.scratch);
                if self.in_assign {
                    if self.lhs_pending {
                        self.cur_lhs = Some(vb);
                        self.lhs_pending = false;
                    } else {
                        self.cur_rhs.push(RefMulti::Var(vb));
                    }
                } else if let Some(conn) = self.cur_conn.as_mut() {
                    conn.actuals.push(RefMulti::Var(vb));
                }
            }
            AstKind::VarRef { name, access, decl_left, decl_right } => {
                self.visit_varref(name, *access, *decl_left, *decl_right);
            }
            AstKind::Const { bits } => {
                self.visit_const(bits);
            }
            AstKind::Extend { width } | AstKind::ExtendS { width } => {
                let signed = matches!(node.kind, AstKind::ExtendS { .. });
                self.visit_extend(*width, signed, node)?;
            }
            AstKind::Replicate => {
                self.visit_replicate(node)?;
            }
        }
        Ok(())
    }

    fn visit_module(
        &mut self, name: &CompactString, level: u32, node: &AstNode
    ) -> Result<(), NetlistError> {
        if name.as_str() == CONST_POOL {
            return Ok(());
        }
        if self.modules.contains_key(name) {
            clilog::warn!(
                NL_EX_REDEF, "module {} is defined twice, the later \
                              definition wins", name);
        } else {
            self.order.push(name.clone());
        }
        self.modules.insert(name.clone(), ModuleMulti::new(name.clone(), level));
        self.cur_module = Some(name.clone());
        self.visit_children(node)
    }

    fn visit_var(
        &mut self, name: &CompactString, direction: VarDirection,
        width: u32, is_param: bool,
    ) -> Result<(), NetlistError> {
        let module = self.cur_module_name();
        if is_param {
            clilog::info!(
                NL_EX_PARAM, "parameter {} in module {} carries no \
                              netlist information, ignored",
                name, module);
            return Ok(());
        }
        let dir = match direction {
            VarDirection::Input => PortDir::Input,
            VarDirection::Output => PortDir::Output,
            VarDirection::Inout => PortDir::Inout,
            VarDirection::None => PortDir::Wire,
            VarDirection::ScopedRef | VarDirection::ConstRef => {
                clilog::error!(
                    NL_EX_DIR, "variable {} in module {} has a ref-like \
                                direction, which is not supported",
                    name, module);
                return Err(NetlistError::UnsupportedDirection {
                    module, var: name.clone(),
                });
            }
        };
        let def = PortDef {
            name: name.clone(),
            dir,
            width,
            is_vector: width > 1,
        };
        let Some(m) = self.cur_mod_mut() else { return Ok(()) };
        match dir {
            PortDir::Input => m.inputs.push(def),
            PortDir::Output => m.outputs.push(def),
            PortDir::Inout => m.inouts.push(def),
            PortDir::Wire => m.wires.push(def),
        }
        Ok(())
    }

    fn visit_assign(&mut self, node: &AstNode) -> Result<(), NetlistError> {
        self.in_assign = true;
        self.cur_lhs = None;
        self.cur_rhs.clear();
        self.visit_children(node)?;
        self.in_assign = false;

        let module = self.cur_module_name();
        let Some(lhs) = self.cur_lhs.take() else {
            clilog::warn!(
                NL_EX_NOLHS, "an assignment in module {} has no named \
                              lvalue, dropped", module);
            self.cur_rhs.clear();
            return Ok(());
        };
        let rhs = mem::take(&mut self.cur_rhs);
        let rhs_width: u32 = rhs.iter().map(|r| r.width()).sum();
        let Some(m) = self.cur_mod_mut() else { return Ok(()) };
        if rhs_width != lhs.range.width() {
            return Err(NetlistError::AssignWidthMismatch {
                module,
                assign_index: m.assigns.len(),
                lhs_width: lhs.range.width(),
                rhs_width,
            });
        }
        m.assigns.push(AssignMulti { lhs, rhs });
        Ok(())
    }

    fn visit_varref(
        &mut self, name: &CompactString, access: Access,
        decl_left: i32, decl_right: i32,
    ) {
        if self.sel > 0 {
            // base reference of a slice: the range comes from the two
            // constant children that follow.
            self.scratch.name = name.clone();
            self.sel += 1;
            if self.in_assign && access == Access::Write {
                self.lhs_pending = true;
            }
            return;
        }
        // a whole-vector reference. A declaration [l:r] in either
        // orientation reads as the zero-based [0, width-1].
        let width = (decl_left - decl_right).unsigned_abs() + 1;
        let vb = VarBits {
            name: name.clone(),
            range: BitRange { start: 0, end: width - 1 },
            is_vector: width > 1,
        };
        if self.in_assign && access == Access::Write {
            self.cur_lhs = Some(vb);
        } else {
            self.push_ref(RefMulti::Var(vb));
        }
    }

    fn visit_const(&mut self, bits: &ConstBits) {
        match self.sel {
            2 => {
                self.scratch.range.start = bits.as_u32();
                self.sel = 3;
            }
            3 => {
                // a select is at least one bit wide.
                let width = bits.as_u32().max(1);
                self.scratch.range.end =
                    self.scratch.range.start + width - 1;
                self.scratch.is_vector = true;
            }
            _ => {
                self.push_ref(RefMulti::Const(bits.clone()));
            }
        }
    }

    /// Extension nodes contribute `[pad, operand]`, MSB-first. The
    /// operand is visited first so a signed pad can replicate its
    /// actual most significant bit; the pad is then spliced in front.
    fn visit_extend(
        &mut self, width: u32, signed: bool, node: &AstNode
    ) -> Result<(), NetlistError> {
        let operand_width = node.children.first()
            .map(|c| c.width())
            .unwrap_or(0);
        let pad_width = width.saturating_sub(operand_width);
        let mark = self.dest_len();
        self.visit_children(node)?;
        if pad_width == 0 {
            return Ok(());
        }
        let Some(dest) = self.dest_mut() else { return Ok(()) };
        let pad: Vec<RefMulti> = if !signed {
            vec![RefMulti::Const(ConstBits::zeros(pad_width))]
        } else {
            match dest.get(mark) {
                Some(RefMulti::Var(vb)) => {
                    let msb = VarBits {
                        name: vb.name.clone(),
                        range: BitRange {
                            start: vb.range.end,
                            end: vb.range.end,
                        },
                        is_vector: vb.is_vector,
                    };
                    vec![RefMulti::Var(msb); pad_width as usize]
                }
                Some(RefMulti::Const(c)) => {
                    let all = match c.width > 0 && c.bit(c.width - 1) == 1 {
                        true => ConstBits::ones(pad_width),
                        false => ConstBits::zeros(pad_width),
                    };
                    vec![RefMulti::Const(all)]
                }
                None => {
                    clilog::warn!(
                        NL_EX_EXT, "sign extension with an empty \
                                    operand, padding with zeros");
                    vec![RefMulti::Const(ConstBits::zeros(pad_width))]
                }
            }
        };
        dest.splice(mark..mark, pad);
        Ok(())
    }

    /// Replication: the element entries land in the destination list
    /// first, the count constant last. The count is popped back off
    /// and the element entries are duplicated in place.
    fn visit_replicate(&mut self, node: &AstNode) -> Result<(), NetlistError> {
        let module = self.cur_module_name();
        let mark = self.dest_len();
        self.visit_children(node)?;
        let Some(dest) = self.dest_mut() else { return Ok(()) };
        let count = match dest.pop() {
            Some(RefMulti::Const(c)) => c.as_u32(),
            _ => return Err(NetlistError::BadReplicate { module }),
        };
        if count == 0 {
            return Err(NetlistError::BadReplicate { module });
        }
        let element: Vec<RefMulti> = dest[mark..].to_vec();
        for _ in 1..count {
            dest.extend(element.iter().cloned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elabast::Access::*;

    fn extract_one(items: Vec<AstNode>) -> ModuleMulti {
        let root = AstNode::netlist(vec![AstNode::module("m", 1, items)]);
        let mut ext = extract(&root).unwrap();
        ext.modules.remove("m").unwrap()
    }

    #[test]
    fn whole_and_sliced_refs() {
        // assign x = {c[1:0], d};  with x[2:0], c[3:0], d scalar.
        let m = extract_one(vec![
            AstNode::var("x", VarDirection::Output, 3),
            AstNode::var("c", VarDirection::Input, 4),
            AstNode::var("d", VarDirection::Input, 1),
            AstNode::assign_w(
                AstNode::varref("x", Write, 2, 0),
                AstNode::concat(vec![
                    AstNode::sel(AstNode::varref("c", Read, 3, 0), 0, 2),
                    AstNode::varref("d", Read, 0, 0),
                ]),
            ),
        ]);
        assert_eq!(m.assigns.len(), 1);
        let a = &m.assigns[0];
        assert_eq!(a.lhs, VarBits {
            name: "x".into(),
            range: BitRange { start: 0, end: 2 },
            is_vector: true,
        });
        assert_eq!(a.rhs, vec![
            RefMulti::Var(VarBits {
                name: "c".into(),
                range: BitRange { start: 0, end: 1 },
                is_vector: true,
            }),
            RefMulti::Var(VarBits {
                name: "d".into(),
                range: BitRange { start: 0, end: 0 },
                is_vector: false,
            }),
        ]);
    }

    #[test]
    fn decl_range_normalized() {
        // declarations like [3:1] or [1:3] both read as [0, width-1];
        // blocking assignments extract like continuous ones.
        let m = extract_one(vec![
            AstNode::var("y", VarDirection::Output, 3),
            AstNode::var("a", VarDirection::Input, 3),
            AstNode::assign(
                AstNode::varref("y", Write, 3, 1),
                AstNode::varref("a", Read, 1, 3),
            ),
        ]);
        let a = &m.assigns[0];
        assert_eq!(a.lhs.range, BitRange { start: 0, end: 2 });
        assert_eq!(a.rhs[0].width(), 3);
    }

    #[test]
    fn replicate_clones_element() {
        // assign y = {3{a}};  with a[1:0], y[5:0].
        let m = extract_one(vec![
            AstNode::var("y", VarDirection::Output, 6),
            AstNode::var("a", VarDirection::Input, 2),
            AstNode::assign_w(
                AstNode::varref("y", Write, 5, 0),
                AstNode::replicate(AstNode::varref("a", Read, 1, 0), 3),
            ),
        ]);
        let a = &m.assigns[0];
        assert_eq!(a.rhs.len(), 3);
        assert!(a.rhs.iter().all(|r| matches!(
            r, RefMulti::Var(v) if v.name == "a" && v.range.width() == 2)));
    }

    #[test]
    fn extend_pads_in_front() {
        // assign y = {4'b0, a};  expressed as a zero extension.
        let m = extract_one(vec![
            AstNode::var("y", VarDirection::Output, 8),
            AstNode::var("a", VarDirection::Input, 4),
            AstNode::assign_w(
                AstNode::varref("y", Write, 7, 0),
                AstNode::extend(8, AstNode::varref("a", Read, 3, 0)),
            ),
        ]);
        let a = &m.assigns[0];
        assert_eq!(a.rhs.len(), 2);
        assert_eq!(a.rhs[0], RefMulti::Const(ConstBits::zeros(4)));
        assert_eq!(a.rhs[1].width(), 4);
    }

    #[test]
    fn extend_signed_replicates_msb() {
        let m = extract_one(vec![
            AstNode::var("y", VarDirection::Output, 6),
            AstNode::var("a", VarDirection::Input, 4),
            AstNode::assign_w(
                AstNode::varref("y", Write, 5, 0),
                AstNode::extend_signed(6, AstNode::varref("a", Read, 3, 0)),
            ),
        ]);
        let a = &m.assigns[0];
        // two copies of a[3], then the whole of a.
        assert_eq!(a.rhs.len(), 3);
        let msb = RefMulti::Var(VarBits {
            name: "a".into(),
            range: BitRange { start: 3, end: 3 },
            is_vector: true,
        });
        assert_eq!(a.rhs[0], msb);
        assert_eq!(a.rhs[1], msb);
        assert_eq!(a.rhs[2].width(), 4);
    }

    #[test]
    fn extend_signed_constant_operand() {
        // a negative constant extends with ones, a positive one with
        // zeros.
        let m = extract_one(vec![
            AstNode::var("y", VarDirection::Output, 8),
            AstNode::assign_w(
                AstNode::varref("y", Write, 7, 0),
                AstNode::extend_signed(8, AstNode::const_u64(4, 0b1000)),
            ),
        ]);
        assert_eq!(m.assigns[0].rhs[0], RefMulti::Const(ConstBits::ones(4)));

        let m = extract_one(vec![
            AstNode::var("y", VarDirection::Output, 8),
            AstNode::assign_w(
                AstNode::varref("y", Write, 7, 0),
                AstNode::extend_signed(8, AstNode::const_u64(4, 0b0100)),
            ),
        ]);
        assert_eq!(m.assigns[0].rhs[0], RefMulti::Const(ConstBits::zeros(4)));
    }

    #[test]
    fn cell_pins_keep_order() {
        let m = extract_one(vec![
            AstNode::var("a", VarDirection::Input, 2),
            AstNode::var("y", VarDirection::Output, 1),
            AstNode::cell("u1", "sub", vec![
                AstNode::pin("p", AstNode::varref("a", Read, 1, 0)),
                AstNode::pin("q", AstNode::varref("y", Write, 0, 0)),
            ]),
        ]);
        assert_eq!(m.sub_insts.len(), 1);
        let inst = &m.sub_insts[0];
        assert_eq!(inst.inst_name, "u1");
        assert_eq!(inst.def_name, "sub");
        assert_eq!(inst.conns.iter().map(|c| c.port.as_str())
                   .collect::<Vec<_>>(), vec!["p", "q"]);
        assert_eq!(inst.conns[0].actuals.len(), 1);
    }

    #[test]
    fn const_pool_skipped_and_params_ignored() {
        let root = AstNode::netlist(vec![
            AstNode::module(CONST_POOL, 0, vec![
                AstNode::var("junk", VarDirection::None, 8),
            ]),
            AstNode::type_table(),
            AstNode::module("m", 1, vec![
                AstNode::param("WIDTH", 32),
                AstNode::var("w", VarDirection::None, 2),
            ]),
        ]);
        let ext = extract(&root).unwrap();
        assert_eq!(ext.order, vec![CompactString::from("m")]);
        let m = &ext.modules["m"];
        assert_eq!(m.wires.len(), 1);
        assert_eq!(m.wires[0].name, "w");
    }

    #[test]
    fn assign_width_mismatch_is_fatal() {
        let root = AstNode::netlist(vec![AstNode::module("m", 1, vec![
            AstNode::var("y", VarDirection::Output, 3),
            AstNode::var("a", VarDirection::Input, 2),
            AstNode::assign_w(
                AstNode::varref("y", Write, 2, 0),
                AstNode::varref("a", Read, 1, 0),
            ),
        ])]);
        assert!(matches!(
            extract(&root),
            Err(NetlistError::AssignWidthMismatch {
                lhs_width: 3, rhs_width: 2, ..
            })));
    }

    #[test]
    fn ref_direction_is_fatal() {
        let root = AstNode::netlist(vec![AstNode::module("m", 1, vec![
            AstNode::var("r", VarDirection::ScopedRef, 1),
        ])]);
        assert!(matches!(
            extract(&root),
            Err(NetlistError::UnsupportedDirection { .. })));
    }

    #[test]
    fn unknown_nodes_are_transparent() {
        // an operator node the walker does not know sits between the
        // assignment and its operand; the operand still lands.
        let m = extract_one(vec![
            AstNode::var("y", VarDirection::Output, 1),
            AstNode::var("a", VarDirection::Input, 1),
            AstNode::assign_w(
                AstNode::varref("y", Write, 0, 0),
                AstNode::other(vec![AstNode::varref("a", Read, 0, 0)]),
            ),
        ]);
        assert_eq!(m.assigns[0].rhs.len(), 1);
    }
}
