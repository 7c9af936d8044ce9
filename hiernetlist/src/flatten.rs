//! Bottom-up hierarchy inlining.
//!
//! Modules arrive sorted by ascending level, leaves first, so every
//! user module is flattened after all the definitions it instantiates.
//! Inlining a child clones its already-flat body, renames its local
//! wires and instances with the `"<inst>__"` prefix, and rewrites
//! every reference to a child port bit into the actual the parent
//! connected there.

use std::collections::HashMap;
use compact_str::CompactString;

use super::*;

/// Flatten every user module of a level-sorted one-bit netlist. The
/// result is index-parallel to `hier`; entries below `num_leaves` are
/// carried over unchanged.
pub(crate) fn flatten_netlist(
    hier: &[ModuleOne],
    num_leaves: usize,
    index: &HashMap<CompactString, usize>,
) -> Vec<ModuleOne> {
    let mut flat: Vec<ModuleOne> = Vec::with_capacity(hier.len());
    for m in &hier[..num_leaves] {
        flat.push(m.clone());
    }
    for m in &hier[num_leaves..] {
        let mut f = ModuleOne {
            def_name: m.def_name.clone(),
            level: m.level,
            inputs: m.inputs.clone(),
            outputs: m.outputs.clone(),
            inouts: m.inouts.clone(),
            wires: m.wires.clone(),
            // the module's own assigns wire its ports and wires; they
            // survive unchanged.
            assigns: m.assigns.clone(),
            sub_insts: Vec::new(),
        };
        for inst in &m.sub_insts {
            match index.get(&inst.def_name).copied() {
                Some(ci) if ci >= num_leaves => {
                    // the child is index-parallel in `flat` and, being
                    // of a lower level, already flattened.
                    inline_child(&mut f, inst, &flat[ci]);
                }
                _ => {
                    // leaf instances keep their local references.
                    f.sub_insts.push(inst.clone());
                }
            }
        }
        flat.push(f);
    }
    flat
}

/// Inline one already-flat child instance into `f`.
fn inline_child(f: &mut ModuleOne, inst: &SubInstanceOne, child: &ModuleOne) {
    let prefix = format!("{}__", inst.inst_name);
    let rename = |name: &CompactString| -> CompactString {
        let mut s = CompactString::from(prefix.as_str());
        s.push_str(name);
        s
    };

    // per-bit substitution for the child's ports. A connected port bit
    // maps to its actual; an open port surfaces as a fresh prefixed
    // wire so nothing dangles silently.
    let mut port_map: HashMap<(CompactString, u32), RefOne> = HashMap::new();
    for port in child.ports() {
        match inst.conns.iter().find(|c| c.port == port.name) {
            Some(conn) => {
                // conn bits are MSB-first: bits[k] connects
                // port[width - 1 - k].
                for (k, b) in conn.bits.iter().enumerate() {
                    port_map.insert(
                        (port.name.clone(), port.width - 1 - k as u32),
                        b.clone());
                }
            }
            None => {
                clilog::warn!(
                    NL_FLAT_OPEN, "port {} of instance {} ({}) is left \
                                   open, kept as a dangling wire",
                    port.name, inst.inst_name, child.def_name);
                let wname = rename(&port.name);
                f.wires.push(PortDef {
                    name: wname.clone(),
                    dir: PortDir::Wire,
                    width: port.width,
                    is_vector: port.is_vector,
                });
                for b in 0..port.width {
                    port_map.insert(
                        (port.name.clone(), b),
                        RefOne::Var(BitRef {
                            name: wname.clone(),
                            index: b,
                            is_vector: port.is_vector,
                        }));
                }
            }
        }
    }

    let subst = |r: &RefOne| -> RefOne {
        match r {
            RefOne::Const(b) => RefOne::Const(*b),
            RefOne::Var(br) => {
                match port_map.get(&(br.name.clone(), br.index)) {
                    Some(actual) => actual.clone(),
                    None => RefOne::Var(BitRef {
                        name: rename(&br.name),
                        index: br.index,
                        is_vector: br.is_vector,
                    }),
                }
            }
        }
    };

    for w in &child.wires {
        f.wires.push(PortDef { name: rename(&w.name), ..w.clone() });
    }

    for a in &child.assigns {
        let lhs = match port_map.get(&(a.lhs.name.clone(), a.lhs.index)) {
            None => BitRef {
                name: rename(&a.lhs.name),
                index: a.lhs.index,
                is_vector: a.lhs.is_vector,
            },
            Some(RefOne::Var(actual)) => actual.clone(),
            Some(RefOne::Const(_)) => {
                // the parent tied this child output to a constant;
                // there is no wire left to drive.
                clilog::warn!(
                    NL_FLAT_TIE, "instance {} drives a constant-tied \
                                  port bit {}[{}], assignment dropped",
                    inst.inst_name, a.lhs.name, a.lhs.index);
                continue;
            }
        };
        f.assigns.push(AssignOne { lhs, rhs: subst(&a.rhs) });
    }

    for li in &child.sub_insts {
        f.sub_insts.push(SubInstanceOne {
            inst_name: rename(&li.inst_name),
            def_name: li.def_name.clone(),
            conns: li.conns.iter().map(|c| PortConnOne {
                port: c.port.clone(),
                bits: c.bits.iter().map(&subst).collect(),
            }).collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, dir: PortDir, width: u32) -> PortDef {
        PortDef { name: name.into(), dir, width, is_vector: width > 1 }
    }

    fn bit(name: &str, index: u32, is_vector: bool) -> RefOne {
        RefOne::Var(BitRef { name: name.into(), index, is_vector })
    }

    /// Leaf L(i, o); M wraps it through a wire; T instantiates M twice.
    fn two_level_netlist() -> (Vec<ModuleOne>, HashMap<CompactString, usize>) {
        let leaf = ModuleOne {
            def_name: "L".into(),
            level: 0,
            inputs: vec![port("i", PortDir::Input, 1)],
            outputs: vec![port("o", PortDir::Output, 1)],
            inouts: vec![],
            wires: vec![],
            assigns: vec![],
            sub_insts: vec![],
        };
        let mid = ModuleOne {
            def_name: "M".into(),
            level: 1,
            inputs: vec![port("mi", PortDir::Input, 1)],
            outputs: vec![port("mo", PortDir::Output, 1)],
            inouts: vec![],
            wires: vec![port("n", PortDir::Wire, 1)],
            assigns: vec![AssignOne {
                lhs: BitRef { name: "n".into(), index: 0, is_vector: false },
                rhs: bit("mi", 0, false),
            }],
            sub_insts: vec![SubInstanceOne {
                inst_name: "l".into(),
                def_name: "L".into(),
                conns: vec![
                    PortConnOne { port: "i".into(), bits: vec![bit("n", 0, false)] },
                    PortConnOne { port: "o".into(), bits: vec![bit("mo", 0, false)] },
                ],
            }],
        };
        let top = ModuleOne {
            def_name: "T".into(),
            level: 2,
            inputs: vec![port("ti", PortDir::Input, 1)],
            outputs: vec![port("to", PortDir::Output, 2)],
            inouts: vec![],
            wires: vec![],
            assigns: vec![],
            sub_insts: vec![
                SubInstanceOne {
                    inst_name: "u1".into(),
                    def_name: "M".into(),
                    conns: vec![
                        PortConnOne { port: "mi".into(), bits: vec![bit("ti", 0, false)] },
                        PortConnOne { port: "mo".into(), bits: vec![bit("to", 1, true)] },
                    ],
                },
                SubInstanceOne {
                    inst_name: "u2".into(),
                    def_name: "M".into(),
                    conns: vec![
                        PortConnOne { port: "mi".into(), bits: vec![bit("ti", 0, false)] },
                        PortConnOne { port: "mo".into(), bits: vec![bit("to", 0, true)] },
                    ],
                },
            ],
        };
        let index = [("L".into(), 0), ("M".into(), 1), ("T".into(), 2)]
            .into_iter().collect();
        (vec![leaf, mid, top], index)
    }

    #[test]
    fn inlines_two_instances_without_collision() {
        let (hier, index) = two_level_netlist();
        let flat = flatten_netlist(&hier, 1, &index);
        let top = &flat[2];

        // only leaf instances remain, uniquely renamed.
        assert_eq!(top.sub_insts.iter().map(|i| i.inst_name.as_str())
                   .collect::<Vec<_>>(), vec!["u1__l", "u2__l"]);
        assert!(top.sub_insts.iter().all(|i| i.def_name == "L"));

        // M's internal wire appears once per instance.
        assert_eq!(top.wires.iter().map(|w| w.name.as_str())
                   .collect::<Vec<_>>(), vec!["u1__n", "u2__n"]);

        // M's assign n = mi lands with ports substituted.
        assert_eq!(top.assigns, vec![
            AssignOne {
                lhs: BitRef { name: "u1__n".into(), index: 0, is_vector: false },
                rhs: bit("ti", 0, false),
            },
            AssignOne {
                lhs: BitRef { name: "u2__n".into(), index: 0, is_vector: false },
                rhs: bit("ti", 0, false),
            },
        ]);

        // the leaf pins read through the renamed wire and the actual.
        assert_eq!(top.sub_insts[0].conns, vec![
            PortConnOne { port: "i".into(), bits: vec![bit("u1__n", 0, false)] },
            PortConnOne { port: "o".into(), bits: vec![bit("to", 1, true)] },
        ]);
    }

    #[test]
    fn flatten_is_idempotent() {
        let (hier, index) = two_level_netlist();
        let flat = flatten_netlist(&hier, 1, &index);
        let again = flatten_netlist(&flat, 1, &index);
        assert_eq!(flat, again);
    }

    #[test]
    fn empty_module_flattens_to_itself() {
        let lone = ModuleOne {
            def_name: "lone".into(),
            level: 0,
            inputs: vec![port("a", PortDir::Input, 1)],
            outputs: vec![],
            inouts: vec![],
            wires: vec![],
            assigns: vec![],
            sub_insts: vec![],
        };
        let index = [("lone".into(), 0)].into_iter().collect();
        let flat = flatten_netlist(&[lone.clone()], 1, &index);
        assert_eq!(flat, vec![lone]);
    }

    #[test]
    fn open_port_surfaces_as_dangling_wire() {
        let (mut hier, index) = two_level_netlist();
        // drop u2 and leave u1's mo open.
        hier[2].sub_insts.truncate(1);
        hier[2].sub_insts[0].conns.truncate(1);
        let flat = flatten_netlist(&hier, 1, &index);
        let top = &flat[2];
        assert!(top.wires.iter().any(|w| w.name == "u1__mo"));
        assert_eq!(top.sub_insts[0].conns[1],
                   PortConnOne { port: "o".into(),
                                 bits: vec![bit("u1__mo", 0, false)] });
    }

    #[test]
    fn constant_actual_reaches_leaf_pin() {
        let (mut hier, index) = two_level_netlist();
        // tie u1.mi to 1'b1; u2 removed for brevity.
        hier[2].sub_insts.truncate(1);
        hier[2].sub_insts[0].conns[0].bits = vec![RefOne::Const(1)];
        let flat = flatten_netlist(&hier, 1, &index);
        let top = &flat[2];
        // the assign u1__n = mi becomes a tie.
        assert_eq!(top.assigns[0].rhs, RefOne::Const(1));
    }
}
