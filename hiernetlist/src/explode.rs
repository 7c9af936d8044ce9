//! Multi-bit to one-bit conversion.

use std::collections::HashMap;
use compact_str::CompactString;

use super::*;

/// Expand one multi-bit operand into single bits, most significant
/// first. Named references walk their range downwards; constants walk
/// their bit positions downwards. Constants carrying an x/z mask
/// degrade to their binary value.
fn expand_into(bits: &mut Vec<RefOne>, r: &RefMulti) {
    match r {
        RefMulti::Var(v) => {
            for index in (v.range.start..=v.range.end).rev() {
                bits.push(RefOne::Var(BitRef {
                    name: v.name.clone(),
                    index,
                    is_vector: v.is_vector,
                }));
            }
        }
        RefMulti::Const(c) => {
            if c.has_xz() {
                clilog::warn!(
                    NL_BIT_XZ, "x/z constant bits unsupported in the \
                                one-bit netlist, treating as 0");
            }
            for pos in (0..c.width).rev() {
                bits.push(RefOne::Const(c.bit(pos)));
            }
        }
    }
}

/// Convert one module to its one-bit form. `all` and `index` give
/// access to the instantiated definitions for port width checks.
pub(crate) fn explode_module(
    m: &ModuleMulti,
    all: &[ModuleMulti],
    index: &HashMap<CompactString, usize>,
) -> Result<ModuleOne, NetlistError> {
    let mut out = ModuleOne {
        def_name: m.def_name.clone(),
        level: m.level,
        inputs: m.inputs.clone(),
        outputs: m.outputs.clone(),
        inouts: m.inouts.clone(),
        wires: m.wires.clone(),
        assigns: Vec::new(),
        sub_insts: Vec::new(),
    };

    for (assign_index, a) in m.assigns.iter().enumerate() {
        let mut rhs_bits = Vec::with_capacity(a.lhs.range.width() as usize);
        for r in &a.rhs {
            expand_into(&mut rhs_bits, r);
        }
        if rhs_bits.len() as u32 != a.lhs.range.width() {
            return Err(NetlistError::AssignWidthMismatch {
                module: m.def_name.clone(),
                assign_index,
                lhs_width: a.lhs.range.width(),
                rhs_width: rhs_bits.len() as u32,
            });
        }
        for (k, rhs) in rhs_bits.into_iter().enumerate() {
            out.assigns.push(AssignOne {
                lhs: BitRef {
                    name: a.lhs.name.clone(),
                    index: a.lhs.range.end - k as u32,
                    is_vector: a.lhs.is_vector,
                },
                rhs,
            });
        }
    }

    for inst in &m.sub_insts {
        let def = index.get(&inst.def_name)
            .map(|&i| &all[i])
            .ok_or_else(|| NetlistError::MissingModuleDef {
                module: m.def_name.clone(),
                def_name: inst.def_name.clone(),
            })?;
        let mut conns = Vec::with_capacity(inst.conns.len());
        for conn in &inst.conns {
            let port = def.port(&conn.port)
                .ok_or_else(|| NetlistError::UnknownPort {
                    module: m.def_name.clone(),
                    inst: inst.inst_name.clone(),
                    port: conn.port.clone(),
                })?;
            let mut bits = Vec::with_capacity(port.width as usize);
            for r in &conn.actuals {
                expand_into(&mut bits, r);
            }
            if bits.len() as u32 != port.width {
                return Err(NetlistError::PortWidthMismatch {
                    module: m.def_name.clone(),
                    inst: inst.inst_name.clone(),
                    port: conn.port.clone(),
                    port_width: port.width,
                    actual_width: bits.len() as u32,
                });
            }
            conns.push(PortConnOne { port: conn.port.clone(), bits });
        }
        out.sub_insts.push(SubInstanceOne {
            inst_name: inst.inst_name.clone(),
            def_name: inst.def_name.clone(),
            conns,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit(name: &str, index: u32, is_vector: bool) -> RefOne {
        RefOne::Var(BitRef { name: name.into(), index, is_vector })
    }

    #[test]
    fn const_expands_msb_first() {
        // assign x[7:0] = 8'ha5;
        let mut bits = Vec::new();
        expand_into(&mut bits,
                    &RefMulti::Const(ConstBits::from_u64(8, 0xa5)));
        assert_eq!(bits, vec![
            RefOne::Const(1), RefOne::Const(0), RefOne::Const(1),
            RefOne::Const(0), RefOne::Const(0), RefOne::Const(1),
            RefOne::Const(0), RefOne::Const(1),
        ]);
    }

    #[test]
    fn wide_const_expands_across_chunks() {
        let c = ConstBits::from_radix_str(65, 16, b"10000000000000001");
        let mut bits = Vec::new();
        expand_into(&mut bits, &RefMulti::Const(c));
        assert_eq!(bits.len(), 65);
        assert_eq!(bits[0], RefOne::Const(1));
        assert!(bits[1..64].iter().all(|b| *b == RefOne::Const(0)));
        assert_eq!(bits[64], RefOne::Const(1));
    }

    #[test]
    fn assign_pairs_descending_indices() {
        // x[2:0] = {c[1:0], d}
        let mut m = ModuleMulti::new("m".into(), 0);
        m.assigns.push(AssignMulti {
            lhs: VarBits {
                name: "x".into(),
                range: BitRange { start: 0, end: 2 },
                is_vector: true,
            },
            rhs: vec![
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
            ],
        });
        let one = explode_module(&m, &[], &HashMap::new()).unwrap();
        let pairs: Vec<(RefOne, RefOne)> = one.assigns.iter()
            .map(|a| (RefOne::Var(a.lhs.clone()), a.rhs.clone()))
            .collect();
        assert_eq!(pairs, vec![
            (bit("x", 2, true), bit("c", 1, true)),
            (bit("x", 1, true), bit("c", 0, true)),
            (bit("x", 0, true), bit("d", 0, false)),
        ]);
    }

    #[test]
    fn port_conn_checked_against_decl() {
        let mut leaf = ModuleMulti::new("sub".into(), 0);
        leaf.inputs.push(PortDef {
            name: "p".into(), dir: PortDir::Input,
            width: 3, is_vector: true,
        });

        let mut m = ModuleMulti::new("m".into(), 1);
        m.sub_insts.push(SubInstance {
            inst_name: "u".into(),
            def_name: "sub".into(),
            conns: vec![PortConnMulti {
                port: "p".into(),
                actuals: vec![
                    RefMulti::Var(VarBits {
                        name: "w1".into(),
                        range: BitRange { start: 0, end: 0 },
                        is_vector: false,
                    }),
                    RefMulti::Var(VarBits {
                        name: "w2".into(),
                        range: BitRange { start: 0, end: 1 },
                        is_vector: true,
                    }),
                ],
            }],
        });

        let all = vec![leaf, m];
        let index: HashMap<CompactString, usize> =
            [("sub".into(), 0), ("m".into(), 1)].into_iter().collect();
        let one = explode_module(&all[1], &all, &index).unwrap();
        assert_eq!(one.sub_insts[0].conns[0].bits, vec![
            bit("w1", 0, false), bit("w2", 1, true), bit("w2", 0, true),
        ]);

        // shrink the port: the same connection must now be fatal.
        let mut all2 = all.clone();
        all2[0].inputs[0].width = 2;
        assert!(matches!(
            explode_module(&all2[1], &all2, &index),
            Err(NetlistError::PortWidthMismatch {
                port_width: 2, actual_width: 3, ..
            })));
    }
}
