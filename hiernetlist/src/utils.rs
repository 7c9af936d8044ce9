//! Private pipeline helpers: leaf synthesis, hierarchy levels, and
//! top module discovery.

use std::collections::{HashMap, HashSet};
use compact_str::CompactString;

use super::*;

/// Instances may reference definitions the AST never defines (library
/// cells linked in later). Such names get a synthesized black box
/// whose ports are inferred from the first referencing connection
/// list: the port name, the summed actual width, and an `inout`
/// direction, since nothing better is known.
pub(crate) fn synthesize_leaf_defs(
    modules: &mut HashMap<CompactString, ModuleMulti>,
    order: &mut Vec<CompactString>,
) {
    let mut synth: Vec<ModuleMulti> = Vec::new();
    for name in order.iter() {
        for inst in &modules[name].sub_insts {
            if modules.contains_key(&inst.def_name)
                || synth.iter().any(|s| s.def_name == inst.def_name)
            {
                continue;
            }
            clilog::warn!(
                NL_LEAF_SYNTH, "module {} has no definition; treating \
                                it as a black box with ports inferred \
                                from instance {}",
                inst.def_name, inst.inst_name);
            let mut bb = ModuleMulti::new(inst.def_name.clone(), 0);
            for conn in &inst.conns {
                let width: u32 = conn.actuals.iter().map(|a| a.width()).sum();
                bb.inouts.push(PortDef {
                    name: conn.port.clone(),
                    dir: PortDir::Inout,
                    width,
                    is_vector: width > 1,
                });
            }
            synth.push(bb);
        }
    }
    for bb in synth {
        order.push(bb.def_name.clone());
        modules.insert(bb.def_name.clone(), bb);
    }
}

/// Compute canonical hierarchy levels bottom-up: leaf bodies are 0,
/// anything else is one more than its deepest instantiated
/// definition. Recursive instantiation is fatal.
pub(crate) fn compute_levels(
    modules: &HashMap<CompactString, ModuleMulti>,
    order: &[CompactString],
) -> Result<HashMap<CompactString, u32>, NetlistError> {
    fn level_of<'i>(
        modules: &'i HashMap<CompactString, ModuleMulti>,
        name: &'i CompactString,
        visiting: &mut HashSet<&'i CompactString>,
        cache: &mut HashMap<&'i CompactString, u32>,
    ) -> Result<u32, NetlistError> {
        if let Some(l) = cache.get(name) {
            return Ok(*l);
        }
        let m = modules.get(name)
            .ok_or_else(|| NetlistError::MissingModuleDef {
                module: name.clone(),
                def_name: name.clone(),
            })?;
        if m.is_leaf_body() {
            cache.insert(name, 0);
            return Ok(0);
        }

        // detect cyclic instantiation. without this check the walk
        // would not terminate on bad input.
        if !visiting.insert(name) {
            clilog::error!(
                NL_HIER_RECUR,
                "module {} has recursion which is NOT allowed", name);
            return Err(NetlistError::RecursiveHierarchy {
                module: name.clone(),
            });
        }
        let mut visiting = scopeguard::guard(visiting, |visiting| {
            visiting.remove(name);
        });

        let mut deepest = 0;
        for inst in &m.sub_insts {
            deepest = deepest.max(level_of(
                modules, &inst.def_name, &mut visiting, cache)?);
        }
        let level = deepest + 1;
        cache.insert(name, level);
        Ok(level)
    }

    let mut visiting = HashSet::new();
    let mut cache = HashMap::new();
    for name in order {
        level_of(modules, name, &mut visiting, &mut cache)?;
    }
    Ok(cache.into_iter().map(|(k, v)| (k.clone(), v)).collect())
}

/// Find the top module: the unique user module no other module
/// instantiates. Degenerate designs with no user modules fall back to
/// a sole unreferenced black box.
pub(crate) fn find_top(
    sorted: &[ModuleMulti], num_leaves: usize
) -> Result<usize, NetlistError> {
    let mut referenced: HashSet<&CompactString> = HashSet::new();
    for m in sorted {
        for inst in &m.sub_insts {
            referenced.insert(&inst.def_name);
        }
    }
    let unrefs = |range: std::ops::Range<usize>| -> Vec<usize> {
        range.filter(|&i| !referenced.contains(&sorted[i].def_name))
            .collect()
    };

    let candidates = unrefs(num_leaves..sorted.len());
    match candidates.len() {
        1 => {
            clilog::info!(
                NL_GUESSTOP, "The top module is guessed to be {}.",
                sorted[candidates[0]].def_name);
            Ok(candidates[0])
        }
        0 => {
            let leaf_candidates = unrefs(0..num_leaves);
            if leaf_candidates.len() == 1 {
                clilog::info!(
                    NL_GUESSTOP, "The top module is guessed to be the \
                                  black box {}.",
                    sorted[leaf_candidates[0]].def_name);
                Ok(leaf_candidates[0])
            } else {
                clilog::error!(
                    NL_CANTGUESSTOP,
                    "There are cyclic or empty module references, \
                     cannot guess the top module.");
                Err(NetlistError::NoTopModule { candidates: 0 })
            }
        }
        n => {
            clilog::error!(
                NL_CANTGUESSTOP,
                "There are {} potential top modules: {:?}.",
                n,
                candidates.iter().map(|&i| &sorted[i].def_name)
                    .collect::<Vec<_>>());
            Err(NetlistError::NoTopModule { candidates: n })
        }
    }
}
