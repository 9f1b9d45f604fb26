//! Structural expander (C4): rewrites `for` loops into an init statement
//! plus a `while`, in place, before the tree is converted to a DAG.
//!
//! Only subtrees that actually contain a `` `tick `` are visited. A
//! tickless `for`/`while`/`if` is left untouched and is never turned into a
//! state machine construct; it's emitted later as plain Verilog control flow
//! inside one state.

use crate::errors::{AlgoFsmError, Result};
use crate::node::{NodeId, NodeKind, NodeStore};

pub fn expand_tree_structs(store: &mut NodeStore, node: Option<NodeId>) -> Result<()> {
    let mut cur = node;
    while let Some(id) = cur {
        let org_nxt = store.get(id).nxt;

        if store.has_tick(Some(id)) {
            match store.get(id).kind.clone() {
                NodeKind::Case => {
                    return Err(AlgoFsmError::Semantic {
                        file: String::new(),
                        line: 0,
                        message: "case with `tick inside are not supported yet".to_string(),
                    });
                }
                NodeKind::DoWhile => {
                    let body = store.get(id).child[1];
                    expand_tree_structs(store, body)?;
                }
                NodeKind::For => {
                    expand_for(store, id)?;
                }
                NodeKind::If => {
                    let (t, f) = (store.get(id).child[1], store.get(id).child[2]);
                    expand_tree_structs(store, t)?;
                    expand_tree_structs(store, f)?;
                }
                NodeKind::While => {
                    let body = store.get(id).child[1];
                    expand_tree_structs(store, body)?;
                }
                NodeKind::ExitIf => {
                    unreachable!("unexpected ExitIf node before DAG conversion");
                }
                _ => {}
            }
        } else {
            store.get_mut(id).nxt = org_nxt;
        }

        cur = org_nxt;
    }
    Ok(())
}

/// `for (init; cond; post) BODY` becomes `init; while (cond) { BODY; post }`
/// — the `for` node is repurposed into the `while` node in place so any
/// existing links to it stay valid, matching `node.typ = "wh"` in the
/// original rather than allocating a replacement node.
fn expand_for(store: &mut NodeStore, node: NodeId) -> Result<()> {
    let code = store.get(node).code.clone();
    let parts: Vec<&str> = code.split(';').collect();
    let [init, cond, post] = <[&str; 3]>::try_from(parts).map_err(|_| AlgoFsmError::Semantic {
        file: String::new(),
        line: 0,
        message: format!("syntax error in for statement for ({code})"),
    })?;

    let body = store.get(node).child[1];

    let init_node = store.add(
        NodeKind::Stmt,
        init.to_string(),
        Some(node),
        [None, None, None],
    );
    store.preinsert(init_node, node);

    store.get_mut(node).kind = NodeKind::While;
    store.get_mut(node).code = cond.to_string();

    let post_node = store.add(NodeKind::Stmt, post.to_string(), None, [None, None, None]);
    if let Some(body_id) = body {
        let ending = store.find_last_in_chain(body_id);
        store.get_mut(ending).nxt = Some(post_node);
    }

    expand_tree_structs(store, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn for_loop_becomes_init_plus_while() {
        let mut p = Parser::new("for (i=0; i<4; i=i+1) `tick;", "t", 0);
        let root = p.parse().unwrap();
        expand_tree_structs(&mut p.store, Some(root)).unwrap();

        assert_eq!(p.store.get(root).kind, NodeKind::Stmt);
        assert_eq!(p.store.get(root).code, "i=0");
        let wh = p.store.get(root).nxt.unwrap();
        assert_eq!(p.store.get(wh).kind, NodeKind::While);
        assert_eq!(p.store.get(wh).code, "i<4");
    }

    #[test]
    fn tickless_for_loop_is_untouched() {
        let mut p = Parser::new("for (i=0; i<4; i=i+1) x=1;", "t", 0);
        let root = p.parse().unwrap();
        expand_tree_structs(&mut p.store, Some(root)).unwrap();
        assert_eq!(p.store.get(root).kind, NodeKind::For);
    }

    #[test]
    fn tickless_case_is_untouched() {
        let mut p = Parser::new("case (x) 1: a=1; 2: b=1; endcase", "t", 0);
        let root = p.parse().unwrap();
        expand_tree_structs(&mut p.store, Some(root)).unwrap();
        assert_eq!(p.store.get(root).kind, NodeKind::Case);
    }

    #[test]
    fn case_containing_tick_is_rejected() {
        let mut p = Parser::new("case (x) 1: `tick; 2: b=1; endcase", "t", 0);
        let root = p.parse().unwrap();
        let err = expand_tree_structs(&mut p.store, Some(root)).unwrap_err();
        assert!(err.to_string().contains("case with"));
    }
}
