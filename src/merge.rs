//! State merger (C6): collapses ticks whose downstream DAG produces
//! byte-identical emitted code into a single state, repeating until a full
//! pass over every tick produces no further merges.
//!
//! Two label modes are tried each round, `abs` then `rel`. `abs` renders
//! every reachable tick by its absolute state name; `rel` additionally
//! special-cases "this subgraph's own tick" as a bare "stay in state"
//! comment, so ticks that are only equivalent once you know which state you
//! started from only collapse in `rel` mode.
//!
//! Predecessor rewriting goes through [`crate::node::NodeStore::predecessors`],
//! which returns matches sorted by `NodeId` rather than relying on hash-map
//! iteration order, so repeated runs on the same input always merge the
//! same pairs in the same order.

use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::emit::{dump_subdag, LabelMode};
use crate::errors::Result;
use crate::node::{LinkKind, NodeId, NodeKind, NodeStore};

pub fn merge_states(store: &mut NodeStore, cfg: &Config) -> Result<()> {
    loop {
        let tick_nodes = store.tick_nodes();
        let mut merged_this_round = false;

        for mode in [LabelMode::Abs, LabelMode::Rel] {
            // Grouped in first-seen order (not hashed order) so that, when
            // more than one group of identical-code ticks exists, the same
            // group is picked to merge first on every run.
            let mut order: Vec<String> = Vec::new();
            let mut by_code: HashMap<String, Vec<NodeId>> = HashMap::new();

            for &tick in &tick_nodes {
                let succ = store.succ(tick);
                let visited = HashSet::new();
                // No renaming has happened yet at merge time (renaming is
                // computed once, later, right before the real per-state
                // emission pass), so state references inside merge probes
                // always use the code-based name.
                let code = dump_subdag(store, cfg, succ, "      ", mode, tick, &visited, &HashMap::new())?;
                if !by_code.contains_key(&code) {
                    order.push(code.clone());
                }
                by_code.entry(code).or_default().push(tick);
            }

            let mut group_to_merge: Option<Vec<NodeId>> = None;
            for code in &order {
                let group = &by_code[code];
                if group.len() > 1 {
                    group_to_merge = Some(group.clone());
                    break;
                }
            }

            if let Some(group) = group_to_merge {
                merge_ids(store, &group);
                merged_this_round = true;
                break;
            }
        }

        if !merged_this_round {
            return Ok(());
        }
    }
}

fn merge_ids(store: &mut NodeStore, nodes: &[NodeId]) {
    let first = nodes[0];
    for &other in &nodes[1..] {
        merge_keeping_first(store, first, other);
    }
}

fn merge_keeping_first(store: &mut NodeStore, keep: NodeId, drop: NodeId) {
    for (from, kinds) in store.predecessors(drop) {
        for kind in kinds {
            match kind {
                LinkKind::TrueBranch => store.get_mut(from).child[1] = Some(keep),
                LinkKind::FalseBranch => store.get_mut(from).child[2] = Some(keep),
                LinkKind::Next => store.get_mut(from).nxt = Some(keep),
            }
        }
    }

    let drop_label = store.get(drop).code.clone();
    store.remove(drop);

    let mut labels = [store.get(keep).code.clone(), drop_label];
    labels.sort();
    store.get_mut(keep).code = labels.join("_");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::convert_to_dag;
    use crate::expand::expand_tree_structs;
    use crate::parser::Parser;

    fn pipeline(src: &str) -> (NodeStore, NodeId, Config) {
        let mut p = Parser::new(src, "t", 0);
        let root = p.parse().unwrap();
        expand_tree_structs(&mut p.store, Some(root)).unwrap();
        convert_to_dag(&mut p.store, Some(root), None).unwrap();
        (p.store, root, Config::default())
    }

    #[test]
    fn identical_branches_merge_to_one_tick() {
        let (mut store, root, cfg) = pipeline("if (a) `tick; else `tick; `tick;");
        merge_states(&mut store, &cfg).unwrap();
        let remaining = store
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Tick))
            .count();
        assert_eq!(remaining, 2);
        let _ = root;
    }

    #[test]
    fn merged_label_is_sorted_join_of_both_codes() {
        let (mut store, _root, cfg) = pipeline("if (a) `tick; else `tick; `tick;");
        merge_states(&mut store, &cfg).unwrap();
        let labels: Vec<String> = store
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Tick))
            .map(|n| n.code.clone())
            .collect();
        assert!(labels.iter().any(|l| l.contains('_')));
    }
}
