//! AST-to-DAG converter (C5): rewrites `if`/`while`/`do-while` nodes that
//! contain a tick into `eif` (DAG branch terminator) nodes with explicit
//! back-edges, so that the subsequent emission walk (`emit.rs`) can read the
//! tree as a flat set of states instead of a nested control-flow tree.

use crate::errors::{AlgoFsmError, Result};
use crate::node::{NodeId, NodeKind, NodeStore};

/// Convert the subtree rooted at `node`, threading `top_nxt` in as the
/// implicit successor for any node whose own `nxt` is empty (the tail of a
/// loop body rejoining its enclosing flow).
pub fn convert_to_dag(store: &mut NodeStore, node: Option<NodeId>, top_nxt: Option<NodeId>) -> Result<()> {
    let mut cur = node;
    while let Some(id) = cur {
        let org_nxt = store.get(id).nxt;
        let nxt = org_nxt.or(top_nxt);

        if store.has_tick(Some(id)) {
            match store.get(id).kind.clone() {
                NodeKind::DoWhile => {
                    convert_do_while(store, id, nxt)?;
                }
                NodeKind::If => {
                    let (t, f) = (store.get(id).child[1], store.get(id).child[2]);
                    convert_to_dag(store, t, nxt)?;
                    convert_to_dag(store, f, nxt)?;
                    if f.is_none() {
                        store.get_mut(id).child[2] = nxt;
                    }
                    store.get_mut(id).kind = NodeKind::ExitIf;
                    store.get_mut(id).nxt = None;
                }
                NodeKind::While => {
                    let body = store.get(id).child[1];
                    convert_to_dag(store, body, Some(id))?;
                    store.get_mut(id).child[2] = nxt;
                    store.get_mut(id).kind = NodeKind::ExitIf;
                    store.get_mut(id).nxt = None;
                }
                NodeKind::For | NodeKind::Case => {
                    return Err(AlgoFsmError::Semantic {
                        file: String::new(),
                        line: 0,
                        message: "internal node is expected to be pre-expanded in expand_tree_structs"
                            .to_string(),
                    });
                }
                _ => {
                    store.get_mut(id).child[1] = nxt;
                    store.get_mut(id).nxt = None;
                }
            }
        } else {
            store.get_mut(id).nxt = nxt;
        }

        cur = org_nxt;
    }
    Ok(())
}

/// `do BODY while (cond)` has the condition test *after* the body runs once,
/// so the node is refilled with the body's own fields in place (the body
/// node is then tombstoned) and only gets its DAG-branch children wired up
/// once the body's own conversion has already happened — wiring them first
/// would make the recursive call walk into a cycle.
fn convert_do_while(store: &mut NodeStore, node: NodeId, nxt: Option<NodeId>) -> Result<()> {
    let cond_code = store.get(node).code.clone();
    let eif_node = store.add(NodeKind::ExitIf, cond_code, None, [None, None, None]);

    let body = store.get(node).child[1].expect("do-while must have a body");
    let body_snapshot = store.get(body).clone();
    {
        let n = store.get_mut(node);
        n.kind = body_snapshot.kind;
        n.code = body_snapshot.code;
        n.child = body_snapshot.child;
        n.nxt = body_snapshot.nxt;
    }
    store.remove(body);

    convert_to_dag(store, Some(node), Some(eif_node))?;

    let eif = store.get_mut(eif_node);
    eif.child = [None, Some(node), nxt];
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn if_with_tick_becomes_exit_if() {
        let mut p = Parser::new("if (a) `tick; `tick;", "t", 0);
        let root = p.parse().unwrap();
        convert_to_dag(&mut p.store, Some(root), None).unwrap();
        assert_eq!(p.store.get(root).kind, NodeKind::ExitIf);
        assert!(p.store.get(root).child[2].is_some());
    }

    #[test]
    fn while_loop_back_edge_points_to_self() {
        let mut p = Parser::new("while (a) `tick; `tick;", "t", 0);
        let root = p.parse().unwrap();
        convert_to_dag(&mut p.store, Some(root), None).unwrap();
        assert_eq!(p.store.get(root).kind, NodeKind::ExitIf);
        let true_branch = p.store.get(root).child[1].unwrap();
        assert_eq!(p.store.get(true_branch).nxt, Some(root));
    }

    #[test]
    fn do_while_runs_body_before_testing() {
        let mut p = Parser::new("do `tick; while (a); `tick;", "t", 0);
        let root = p.parse().unwrap();
        convert_to_dag(&mut p.store, Some(root), None).unwrap();
        assert_eq!(p.store.get(root).kind, NodeKind::Tick);
    }
}
