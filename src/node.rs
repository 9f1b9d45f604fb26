//! Node store and graph primitives (C1).
//!
//! Every AST/DAG node produced by the parser and the rewriters that follow
//! it lives in one flat, translation-scoped arena (`NodeStore`). Nodes are
//! addressed by `NodeId`, a dense index; they are never physically removed,
//! only tombstoned in place (`NodeKind::Removed`), so that existing incoming
//! links stay valid across every rewrite pass. A node's identity survives
//! retagging: an `If` can become an `ExitIf` in place without disturbing
//! anything that already points at it. This is a hand-rolled arena rather
//! than a generic graph crate because `rewrite_links_to` needs to scan and
//! mutate node fields in place, which a separate edge list doesn't let you
//! do cleanly once a node gets cloned during merging.

use std::collections::BTreeMap;

/// Index into a [`NodeStore`]. Stable for the life of one translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "id{}", self.0)
    }
}

/// The closed set of node tags, encoded as a tagged union instead of a
/// string so the compiler enforces exhaustive handling at every walk site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// `sn`: a blocking-assignment statement (or other raw expression text).
    Stmt,
    /// `cm`: a preserved `///` comment.
    Comment,
    /// `tk`: a tick / state marker.
    Tick,
    /// `if`: pre-DAG conditional.
    If,
    /// `eif`: DAG-form branch terminator.
    ExitIf,
    /// `wh`: pre-DAG while loop.
    While,
    /// `fo`: pre-expansion for loop.
    For,
    /// `do`: pre-DAG do-while loop.
    DoWhile,
    /// `cs`: case statement.
    Case,
    /// `csb`: one case arm.
    CaseArm,
    /// A node that has been logically removed; carries its original kind.
    Removed(Box<NodeKind>),
}

impl NodeKind {
    /// The kind this node had before it was tombstoned, if any.
    pub fn underlying(&self) -> &NodeKind {
        match self {
            NodeKind::Removed(inner) => inner.underlying(),
            other => other,
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, NodeKind::Removed(_))
    }
}

/// How a predecessor reaches a node: true-branch, false-branch, or the plain
/// sequential successor link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LinkKind {
    TrueBranch,
    FalseBranch,
    Next,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub uid: NodeId,
    pub clone_id: NodeId,
    pub kind: NodeKind,
    pub code: String,
    pub child: [Option<NodeId>; 3],
    pub nxt: Option<NodeId>,
    pub visited: bool,
}

impl Node {
    /// `child[1]` if present, else `nxt`: the node's single "successor" for
    /// a linear emission walk.
    pub fn succ(&self) -> Option<NodeId> {
        self.child[1].or(self.nxt)
    }
}

/// Owns every node created during one FSM translation.
#[derive(Debug, Default)]
pub struct NodeStore {
    nodes: Vec<Node>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Append a new node with a fresh id. `child` need not be fully
    /// populated; missing slots default to `None`.
    pub fn add(
        &mut self,
        kind: NodeKind,
        code: impl Into<String>,
        nxt: Option<NodeId>,
        child: [Option<NodeId>; 3],
    ) -> NodeId {
        let uid = NodeId(self.nodes.len());
        self.nodes.push(Node {
            uid,
            clone_id: uid,
            kind,
            code: code.into(),
            child,
            nxt,
            visited: false,
        });
        uid
    }

    /// Shallow-clone `n`: same kind/code/child/nxt, fresh uid, `clone_id`
    /// pointing back at `n` (used by the visualization rank grouping in the
    /// DOT dumper).
    pub fn clone_node(&mut self, n: NodeId) -> NodeId {
        let src = self.get(n).clone();
        let uid = NodeId(self.nodes.len());
        self.nodes.push(Node {
            uid,
            clone_id: n,
            kind: src.kind,
            code: src.code,
            child: src.child,
            nxt: src.nxt,
            visited: false,
        });
        uid
    }

    /// Tombstone `n` in place: its kind becomes `Removed(old kind)`, but its
    /// `uid` and any still-dangling incoming links remain valid.
    pub fn remove(&mut self, n: NodeId) {
        let node = self.get_mut(n);
        let old = std::mem::replace(&mut node.kind, NodeKind::Removed(Box::new(NodeKind::Stmt)));
        node.kind = NodeKind::Removed(Box::new(old));
    }

    /// Scan every live field in the store and replace any `nxt`/`child[i]`
    /// equal to `old` with `new`.
    pub fn rewrite_links_to(&mut self, new: NodeId, old: NodeId) {
        for node in &mut self.nodes {
            if node.nxt == Some(old) {
                node.nxt = Some(new);
            }
            for slot in &mut node.child {
                if *slot == Some(old) {
                    *slot = Some(new);
                }
            }
        }
    }

    /// Insert `new` immediately before `ref_node`: anything that pointed at
    /// `ref_node` now points at `new`, and `new.nxt` becomes `ref_node`.
    pub fn preinsert(&mut self, new: NodeId, ref_node: NodeId) {
        self.rewrite_links_to(new, ref_node);
        self.get_mut(new).nxt = Some(ref_node);
    }

    /// Every node that links to `dst`, with the kinds of link it uses,
    /// sorted by `NodeId` so merges are reproducible regardless of
    /// insertion/iteration order.
    pub fn predecessors(&self, dst: NodeId) -> Vec<(NodeId, Vec<LinkKind>)> {
        let mut out: BTreeMap<NodeId, Vec<LinkKind>> = BTreeMap::new();
        for node in &self.nodes {
            let mut kinds = Vec::new();
            if node.child[1] == Some(dst) {
                kinds.push(LinkKind::TrueBranch);
            }
            if node.child[2] == Some(dst) {
                kinds.push(LinkKind::FalseBranch);
            }
            if node.nxt == Some(dst) {
                kinds.push(LinkKind::Next);
            }
            if !kinds.is_empty() {
                out.insert(node.uid, kinds);
            }
        }
        out.into_iter().collect()
    }

    /// Follow `nxt` from `n` until it is empty; return the terminal node.
    pub fn find_last_in_chain(&self, n: NodeId) -> NodeId {
        let mut cur = n;
        while let Some(next) = self.get(cur).nxt {
            cur = next;
        }
        cur
    }

    pub fn reset_visited(&mut self) {
        for node in &mut self.nodes {
            node.visited = false;
        }
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// All ids of currently-live (non-tombstoned) nodes, in insertion order.
    pub fn live_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| !n.kind.is_removed())
            .map(|n| n.uid)
    }

    /// Live `tk` nodes, in insertion order.
    pub fn tick_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Tick))
            .map(|n| n.uid)
            .collect()
    }

    /// True if the subtree rooted at `n` contains a `tk` node anywhere
    /// beneath it, including down every arm of a `case`.
    pub fn has_tick(&self, n: Option<NodeId>) -> bool {
        let Some(n) = n else { return false };
        match &self.get(n).kind {
            NodeKind::Tick => true,
            NodeKind::While | NodeKind::DoWhile | NodeKind::For => {
                self.has_tick_in_chain(self.get(n).child[1])
            }
            NodeKind::If => {
                self.has_tick_in_chain(self.get(n).child[1])
                    || self.has_tick_in_chain(self.get(n).child[2])
            }
            NodeKind::Case => {
                let mut arm = self.get(n).child[1];
                while let Some(arm_id) = arm {
                    if self.has_tick_in_chain(self.get(arm_id).child[1]) {
                        return true;
                    }
                    arm = self.get(arm_id).nxt;
                }
                false
            }
            NodeKind::CaseArm => self.has_tick_in_chain(self.get(n).child[1]),
            NodeKind::Stmt | NodeKind::Comment => false,
            NodeKind::Removed(_) => false,
            other => unreachable!("has_tick: unexpected kind {other:?} at parse time"),
        }
    }

    fn has_tick_in_chain(&self, mut n: Option<NodeId>) -> bool {
        while let Some(id) = n {
            if self.has_tick(Some(id)) {
                return true;
            }
            n = self.get(id).nxt;
        }
        false
    }

    pub fn succ(&self, n: NodeId) -> Option<NodeId> {
        self.get(n).succ()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_identity_is_unique() {
        let mut s = NodeStore::new();
        let a = s.add(NodeKind::Stmt, "a=1", None, [None, None, None]);
        let b = s.add(NodeKind::Stmt, "b=1", None, [None, None, None]);
        assert_ne!(a, b);
    }

    #[test]
    fn rewrite_links_to_updates_every_slot() {
        let mut s = NodeStore::new();
        let target = s.add(NodeKind::Tick, "0", None, [None, None, None]);
        let other = s.add(NodeKind::Stmt, "x=1", Some(target), [None, Some(target), Some(target)]);
        let replacement = s.add(NodeKind::Tick, "1", None, [None, None, None]);

        s.rewrite_links_to(replacement, target);

        let n = s.get(other);
        assert_eq!(n.nxt, Some(replacement));
        assert_eq!(n.child[1], Some(replacement));
        assert_eq!(n.child[2], Some(replacement));
    }

    #[test]
    fn preinsert_splices_before_reference() {
        let mut s = NodeStore::new();
        let tail = s.add(NodeKind::Tick, "0", None, [None, None, None]);
        let head = s.add(NodeKind::Stmt, "a=1", Some(tail), [None, None, None]);
        let inserted = s.add(NodeKind::Stmt, "b=1", None, [None, None, None]);

        s.preinsert(inserted, tail);

        assert_eq!(s.get(head).nxt, Some(inserted));
        assert_eq!(s.get(inserted).nxt, Some(tail));
    }

    #[test]
    fn predecessors_sorted_by_id() {
        let mut s = NodeStore::new();
        let dst = s.add(NodeKind::Tick, "0", None, [None, None, None]);
        let p2 = s.add(NodeKind::Stmt, "p2", Some(dst), [None, None, None]);
        let p1 = s.add(NodeKind::Stmt, "p1", Some(dst), [None, None, None]);
        let preds = s.predecessors(dst);
        let ids: Vec<NodeId> = preds.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![p2.min(p1), p2.max(p1)]);
    }

    #[test]
    fn has_tick_true_for_case_with_tick_arm() {
        let mut s = NodeStore::new();
        let tick = s.add(NodeKind::Tick, "0", None, [None, None, None]);
        let arm = s.add(NodeKind::CaseArm, "1", None, [None, Some(tick), None]);
        let case = s.add(NodeKind::Case, "x", None, [None, Some(arm), None]);
        assert!(s.has_tick(Some(case)));
    }

    #[test]
    fn has_tick_false_for_case_without_tick() {
        let mut s = NodeStore::new();
        let stmt = s.add(NodeKind::Stmt, "a=1", None, [None, None, None]);
        let arm = s.add(NodeKind::CaseArm, "1", None, [None, Some(stmt), None]);
        let case = s.add(NodeKind::Case, "x", None, [None, Some(arm), None]);
        assert!(!s.has_tick(Some(case)));
    }

    #[test]
    fn find_last_in_chain_follows_nxt() {
        let mut s = NodeStore::new();
        let c = s.add(NodeKind::Stmt, "c", None, [None, None, None]);
        let b = s.add(NodeKind::Stmt, "b", Some(c), [None, None, None]);
        let a = s.add(NodeKind::Stmt, "a", Some(b), [None, None, None]);
        assert_eq!(s.find_last_in_chain(a), c);
    }
}
