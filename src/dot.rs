//! Minimal Graphviz DOT debug dumper, written only when
//! `Config::debug_level > 0`.

use std::collections::BTreeMap;

use crate::node::{NodeId, NodeKind, NodeStore};

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Groups live nodes by `clone_id`, for same-rank clustering of a node and
/// the clones spawned from it during merging.
fn node_ranks(store: &NodeStore) -> Vec<Vec<NodeId>> {
    let mut groups: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for n in store.iter() {
        groups.entry(n.clone_id).or_default().push(n.uid);
    }
    groups.into_values().collect()
}

/// Renders the live subset of `store` as a DOT graph, highlighting `root`
/// and, optionally, the node ids in `hilight`.
pub fn dump_dot(store: &NodeStore, name: &str, root: NodeId, hilight: &[NodeId]) -> String {
    let tab = "\t";
    let mut out = String::new();
    out.push_str(&format!("digraph _{name}_ {{\n"));
    out.push_str(&format!("{tab}shape=circle;\n"));
    out.push_str(&format!("{tab}{root} [style=filled fillcolor=green];\n"));

    for rank in node_ranks(store) {
        if rank.len() > 1 {
            let nodes: Vec<String> = rank.iter().map(|id| format!("{id}")).collect();
            out.push_str(&format!("{tab}{{rank=same; {};}}\n", nodes.join(";")));
        }
    }

    for n in store.iter() {
        if n.kind.is_removed() {
            continue;
        }
        let id = n.uid;
        let esc_code = escape(&n.code);

        if matches!(n.kind, NodeKind::Tick) {
            out.push_str(&format!(
                "{tab}{id} [shape=box label=<{id}: <font color=\"red\">tick {esc_code}</font>>];\n"
            ));
        } else {
            let code = if n.code.is_empty() {
                String::new()
            } else {
                format!("<br/><b>{esc_code}</b>")
            };
            out.push_str(&format!(
                "{tab}{id} [label=<{id}: <font color=\"blue\">{:?} </font>{code}>];\n",
                n.kind
            ));
        }

        if hilight.contains(&id) {
            out.push_str(&format!("{tab}{id} [style=filled fillcolor=yellow];\n"));
        }

        if let Some(c0) = n.child[0] {
            out.push_str(&format!("{tab}{id} -> {c0} [style=dotted];\n"));
        }
        if let Some(c1) = n.child[1] {
            out.push_str(&format!("{tab}{id} -> {c1};\n"));
        }
        if let Some(c2) = n.child[2] {
            out.push_str(&format!("{tab}{id} -> {c2} [label=f color=grey];\n"));
        }
        if let Some(nxt) = n.nxt {
            out.push_str(&format!("{tab}{id} -> {nxt} [label=nx];\n"));
        }
    }

    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeStore;

    #[test]
    fn dumps_a_single_tick_node() {
        let mut store = NodeStore::new();
        let id = store.add(NodeKind::Tick, "a", None, [None, None, None]);
        let dot = dump_dot(&store, "t", id, &[]);
        assert!(dot.starts_with("digraph _t_ {"));
        assert!(dot.contains("tick a"));
    }

    #[test]
    fn removed_nodes_are_skipped() {
        let mut store = NodeStore::new();
        let id = store.add(NodeKind::Stmt, "x", None, [None, None, None]);
        store.remove(id);
        let dot = dump_dot(&store, "t", id, &[]);
        assert!(!dot.contains(&format!("{id} [label")));
    }

    #[test]
    fn clones_sharing_an_id_rank_together() {
        let mut store = NodeStore::new();
        let a = store.add(NodeKind::Stmt, "a", None, [None, None, None]);
        let _b = store.clone_node(a);
        let dot = dump_dot(&store, "t", a, &[]);
        assert!(dot.contains("rank=same"));
    }
}
