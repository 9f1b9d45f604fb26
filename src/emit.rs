//! Emitter (C7 + C8): walks a merged DAG into per-state Verilog bodies, then
//! wraps them in the surrounding FSM skeleton (state register, reset block,
//! `case` statement, register-update tail). Behavioural mode, reachable via
//! `Config::behav`, bypasses the DAG/merge passes entirely and emits the
//! block close to verbatim.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::Config;
use crate::decl::Declarations;
use crate::errors::{AlgoFsmError, Result};
use crate::node::{NodeId, NodeKind, NodeStore};
use crate::util::{self, CodeBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMode {
    Abs,
    Rel,
}

const STAY_TXT: &str = "// stay in state";

/// Recursively render the flat DAG chain starting at `node` into an indented
/// Verilog block. `state_node` is the tick this walk originates from;
/// in [`LabelMode::Rel`] mode, reaching that same tick again is rendered as
/// `// stay in state` rather than an explicit state assignment, so two
/// structurally-identical subgraphs that only differ in "which state am I"
/// can still be recognised as mergeable by `merge.rs`.
pub fn dump_subdag(
    store: &NodeStore,
    cfg: &Config,
    node: Option<NodeId>,
    ind: &str,
    mode: LabelMode,
    state_node: NodeId,
    visited_in: &HashSet<NodeId>,
    rename: &HashMap<NodeId, usize>,
) -> Result<String> {
    let mut visited = visited_in.clone();
    let tab = cfg.tab();
    let mut out = String::new();
    let mut cur = node;

    while let Some(id) = cur {
        if visited.contains(&id) {
            return Err(AlgoFsmError::Semantic {
                file: String::new(),
                line: 0,
                message: format!(
                    "There is a loop path without `tick within the set of nodes; currently @{id}"
                ),
            });
        }

        let n = store.get(id);
        let (nx, ch1, ch2) = (n.nxt, n.child[1], n.child[2]);

        match n.kind.clone() {
            NodeKind::ExitIf => {
                visited.insert(id);
                let cond = n.code.clone();
                if util::is_one(&cond) {
                    out.push_str(&dump_subdag(store, cfg, ch1, ind, mode, state_node, &visited, rename)?);
                } else if util::is_zero(&cond) {
                    let branch = ch2.or(nx);
                    if let Some(b) = branch {
                        out.push_str(&dump_subdag(store, cfg, Some(b), ind, mode, state_node, &visited, rename)?);
                    }
                } else {
                    let inner_ind = format!("{ind}{tab}");
                    let true_blk =
                        dump_subdag(store, cfg, ch1, &inner_ind, mode, state_node, &visited, rename)?;
                    let branch = ch2.or(nx);
                    let false_blk = match branch {
                        Some(b) => Some(dump_subdag(store, cfg, Some(b), &inner_ind, mode, state_node, &visited, rename)?),
                        None => None,
                    };
                    out.push_str(&build_if_else(ind, &cond, &true_blk, false_blk.as_deref()));
                }
                cur = None;
            }
            NodeKind::If => {
                visited.insert(id);
                let cond = n.code.clone();
                if util::is_one(&cond) {
                    out.push_str(&dump_subdag(store, cfg, ch1, ind, mode, state_node, &visited, rename)?);
                } else if util::is_zero(&cond) {
                    out.push_str(&dump_subdag(store, cfg, ch2, ind, mode, state_node, &visited, rename)?);
                } else {
                    let inner_ind = format!("{ind}{tab}");
                    let true_blk =
                        dump_subdag(store, cfg, ch1, &inner_ind, mode, state_node, &visited, rename)?;
                    let false_blk = match ch2 {
                        Some(c2) => Some(dump_subdag(store, cfg, Some(c2), &inner_ind, mode, state_node, &visited, rename)?),
                        None => None,
                    };
                    out.push_str(&build_if_else(ind, &cond, &true_blk, false_blk.as_deref()));
                }
                cur = nx;
            }
            NodeKind::For => {
                visited.insert(id);
                out.push_str(&format!("{ind}for ({}) begin\n", n.code));
                out.push_str(&dump_subdag(
                    store,
                    cfg,
                    ch1,
                    &format!("{ind}{tab}"),
                    mode,
                    state_node,
                    &visited,
                    rename,
                )?);
                out.push_str(&format!("{ind}end\n"));
                cur = nx;
            }
            NodeKind::While => {
                visited.insert(id);
                out.push_str(&format!("{ind}while ({}) begin\n", n.code));
                out.push_str(&dump_subdag(
                    store,
                    cfg,
                    ch1,
                    &format!("{ind}{tab}"),
                    mode,
                    state_node,
                    &visited,
                    rename,
                )?);
                out.push_str(&format!("{ind}end\n"));
                cur = nx;
            }
            NodeKind::Stmt => {
                visited.insert(id);
                out.push_str(&format!("{ind}{};\n", n.code));
                cur = n.succ();
            }
            NodeKind::Comment => {
                out.push_str(&format!("{ind}{}", n.code));
                cur = n.succ();
            }
            NodeKind::Case => {
                visited.insert(id);
                out.push_str(&format!("{ind}case ({})\n", n.code));
                out.push_str(&dump_subdag(
                    store,
                    cfg,
                    ch1,
                    &format!("{ind}{tab}"),
                    mode,
                    state_node,
                    &visited,
                    rename,
                )?);
                out.push_str(&format!("{ind}endcase\n"));
                cur = nx;
            }
            NodeKind::CaseArm => {
                visited.insert(id);
                out.push_str(&format!("{ind}{}: begin\n", n.code));
                out.push_str(&dump_subdag(
                    store,
                    cfg,
                    ch1,
                    &format!("{ind}{tab}"),
                    mode,
                    state_node,
                    &visited,
                    rename,
                )?);
                out.push_str(&format!("{ind}end\n"));
                cur = nx;
            }
            NodeKind::Tick => {
                if mode == LabelMode::Rel && id == state_node {
                    out.push_str(&format!("{ind}{STAY_TXT}\n"));
                } else {
                    out.push_str(&format!("{ind}{} = {};\n", cfg.state, state_name(store, cfg, id, rename)));
                }
                cur = None;
            }
            NodeKind::Removed(_) | NodeKind::DoWhile => {
                out.push_str(&format!(
                    "{ind}// Ignoring node={id} kind={:?} code='{}'\n",
                    n.kind, n.code
                ));
                cur = n.succ();
            }
        }
    }

    Ok(out)
}

fn build_if_else(ind: &str, cond: &str, true_blk: &str, false_blk: Option<&str>) -> String {
    if let Some(f) = false_blk {
        if util::is_only_stay(STAY_TXT, true_blk) {
            let mut out = format!("{ind}if ({}) begin\n", util::negate(cond));
            out.push_str(f);
            out.push_str(&format!("{ind}end\n"));
            return out;
        }
    }
    let mut out = format!("{ind}if ({cond}) begin\n");
    out.push_str(true_blk);
    out.push_str(&format!("{ind}end\n"));
    if let Some(f) = false_blk {
        out.push_str(&format!("{ind}else begin\n"));
        out.push_str(f);
        out.push_str(&format!("{ind}end\n"));
    }
    out
}

/// `<prefix><sm_num>S<tick code>`, or, once `compute_localpars`'s numbering
/// has run and `Config::rename_states` is set, the renamed
/// `<prefix><sm_num><index>` form. Before `compute_localpars` has assigned an
/// index for `tick` (e.g. while `merge.rs` is still probing for structural
/// equivalence), `rename` is empty and this falls back to the code-based
/// name. The rename map is only populated once, right before the real
/// per-state emission pass.
pub fn state_name(store: &NodeStore, cfg: &Config, tick: NodeId, rename: &HashMap<NodeId, usize>) -> String {
    if cfg.rename_states {
        if let Some(&idx) = rename.get(&tick) {
            return format!("{}{idx}", cfg.prefix);
        }
    }
    format!("{}S{}", cfg.prefix, store.get(tick).code)
}

/// Walks every reachable node depth-first (true branch, false branch, case
/// child, then `nxt`) looking for the first `tk` node, to pick the FSM's
/// reset-state value.
pub fn find_first_tk(store: &mut NodeStore, node: Option<NodeId>) -> Result<NodeId> {
    store.reset_visited();
    find_first_tk_sub(store, node).ok_or_else(|| AlgoFsmError::Semantic {
        file: String::new(),
        line: 0,
        message: "Cannot determine initial state (no `tick at all found)".to_string(),
    })
}

fn find_first_tk_sub(store: &mut NodeStore, node: Option<NodeId>) -> Option<NodeId> {
    let id = node?;
    if store.get(id).visited {
        return None;
    }
    store.get_mut(id).visited = true;
    if matches!(store.get(id).kind, NodeKind::Tick) {
        return Some(id);
    }
    let n = store.get(id);
    let candidates = [n.child[1], n.child[2], n.child[0], n.nxt];
    for c in candidates {
        if let Some(found) = find_first_tk_sub(store, c) {
            return Some(found);
        }
    }
    None
}

/// Number of state bits needed for `tks.len()` distinct states (0 for ≤2,
/// growing by one bit every doubling).
pub fn compute_state_bits(tick_count: usize) -> usize {
    let mut state_bits_m1 = 0;
    let mut max_state = 2;
    for i in 0..tick_count {
        if i >= max_state {
            max_state *= 2;
            state_bits_m1 += 1;
        }
    }
    state_bits_m1
}

/// `localparam` lines plus the tick→index numbering used for `--rename-states`.
pub fn compute_localpars(store: &NodeStore, cfg: &Config) -> (String, HashMap<NodeId, usize>) {
    let mut by_code: BTreeMap<String, NodeId> = BTreeMap::new();
    for n in store.iter() {
        if matches!(n.kind, NodeKind::Tick) {
            by_code.insert(n.code.clone(), n.uid);
        }
    }

    let mut out = CodeBuf::new();
    let mut rename: HashMap<NodeId, usize> = HashMap::new();
    for (i, (_, &tick)) in by_code.iter().enumerate() {
        rename.insert(tick, i);
        let st_name = state_name(store, cfg, tick, &rename);
        out.dump(format!("localparam {st_name} = {i};"));
    }
    (out.into_string(), rename)
}

/// Render one finished FSM block in RTL (synthesizable) form: the
/// `always @(...)` state register, its reset branch, and the `case`
/// statement over every merged tick.
pub fn dump_dag_sm(
    store: &mut NodeStore,
    cfg: &Config,
    root: NodeId,
    decl: &Declarations,
    sm_num: usize,
    ind: &str,
) -> Result<String> {
    let sd = cfg.delay();
    let tab = cfg.tab();
    let curr = &cfg.state_suffix;
    let oprefix = format!("{}{sm_num}_", cfg.prefix);
    let ostate = format!("{}{sm_num}", cfg.state);
    let oname = format!("{}{sm_num}", cfg.name);

    let ena_guard = if cfg.ena.is_empty() {
        String::new()
    } else {
        format!("if ({}{sm_num}) ", cfg.ena)
    };

    let cfg_local = Config {
        prefix: oprefix.clone(),
        state: ostate.clone(),
        ..cfg.clone()
    };

    let ticks: Vec<NodeId> = store
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Tick))
        .map(|n| n.uid)
        .collect();
    let state_bits_m1 = compute_state_bits(ticks.len());
    let (par_out, rename) = compute_localpars(store, &cfg_local);

    let init_state_node = find_first_tk(store, Some(root))?;
    let init_state = state_name(store, &cfg_local, init_state_node, &rename);

    let (reset_cond, _not_reset_cond) = cfg.reset_conditions();
    let (tick, _tick_no_rst) = cfg.tick_sensitivity();

    let mut out = CodeBuf::new();
    out.blank();
    out.dump(format!("// AlgoFSM{sm_num} {{\n"));
    out.dump("// state constant definition");
    out.dump(util::indent(ind, &par_out));

    out.blank();
    out.dump(format!("{ind}always {tick} begin : {oname}"));

    if !decl.local_decls.is_empty() {
        out.blank();
        out.dump(format!("{ind}{tab}// local flop declarations"));
        out.dump(util::indent(&format!("{ind}{tab}"), &decl.local_decls));
    }

    out.dump(format!(
        "{ind}{tab}reg [{state_bits_m1}:0] {ostate}{curr}, {ostate};"
    ));

    out.blank();
    out.dump(format!("{ind}{tab}if ({reset_cond}) begin"));
    if !decl.reset_assigns.is_empty() {
        out.dump(util::indent(&format!("{ind}{tab}{tab}"), &decl.reset_assigns));
    }
    out.dump(format!("{ind}{tab}{tab}{ostate}{curr} <= {sd}{init_state};"));
    out.dump(format!("{ind}{tab}end"));
    out.dump(format!("{ind}{tab}else {ena_guard}begin"));
    out.dump(format!("{ind}{tab}{tab}// set defaults for next state"));
    out.dump(util::indent(&format!("{ind}{tab}{tab}"), &decl.update_nxt));
    out.dump(format!("{ind}{tab}{tab}{ostate} = {ostate}{curr};"));
    out.blank();
    out.dump(format!("{ind}{tab}{tab}// SmForever"));
    out.dump(format!("{ind}{tab}{tab}case ({ostate}{curr})"));

    let mut codes: Vec<(String, NodeId)> = ticks
        .iter()
        .map(|&t| (store.get(t).code.clone(), t))
        .collect();
    codes.sort();
    for (_, tick_id) in codes {
        let visited = HashSet::new();
        let st_name = state_name(store, &cfg_local, tick_id, &rename);
        out.dump(format!("{ind}{tab}{tab}{tab}{st_name}: begin"));
        let body = dump_subdag(
            store,
            &cfg_local,
            store.succ(tick_id),
            &format!("{ind}{tab}{tab}{tab}{tab}"),
            LabelMode::Rel,
            tick_id,
            &visited,
            &rename,
        )?;
        out.dump(body);
        out.dump_nonl(format!("{ind}{tab}{tab}{tab}end"));
    }

    out.dump(format!("{ind}{tab}{tab}endcase"));
    out.dump(format!("{ind}{tab}{tab}// SmEnd"));
    out.blank();
    out.dump(format!("{ind}{tab}{tab}// Update state registers"));
    out.dump(util::indent(&format!("{ind}{tab}{tab}"), &decl.update_ffs));
    out.dump(format!("{ind}{tab}{tab}{ostate}{curr} <= {sd}{ostate};"));
    out.dump(format!("{ind}{tab}end"));
    out.dump(format!("{ind}end"));

    out.blank();
    out.dump(format!("{ind}// rename local state registers dropping suffix"));
    out.dump(util::indent(ind, &decl.rename_ffs));

    out.blank();
    out.dump(format!("// }} AlgoFSM{sm_num}\n"));
    Ok(out.into_string())
}

/// Behavioural (non-synthesizable) rendering: almost no transformation,
/// used to sanity-check the pipeline's tick accounting without the DAG/merge
/// passes.
pub fn process_block_behavioural(
    cfg: &Config,
    decl: &Declarations,
    beh_in: &str,
    sm_num: usize,
    ind: &str,
    line_base: usize,
    file_base: &str,
) -> String {
    let tab = cfg.tab();
    let (tick, _) = cfg.tick_sensitivity();
    let (reset_cond, not_reset_cond) = cfg.reset_conditions();
    let oname = format!("{}{sm_num}", cfg.name);
    let ena = if cfg.ena.is_empty() {
        String::new()
    } else {
        format!("{}{sm_num}", cfg.ena)
    };

    let mut out = CodeBuf::new();
    out.blank();
    out.dump(format!("// AlgoFSM{sm_num} {{"));
    out.blank();

    if ena.is_empty() {
        out.dump(format!(
            "{ind}`define tick \\\n    do begin \\\n        {oname}_update_ffs; \\\n        {tick}; \\\n        if ({reset_cond}) \\\n            disable {oname}_loop; \\\n    end while (0)"
        ));
    } else {
        out.dump(format!(
            "{ind}`define tick \\\n    do begin \\\n        {oname}_update_ffs; \\\n        do {tick}; while(~{ena}); \\\n        if ({reset_cond}) \\\n            disable {oname}_loop; \\\n    end while (0)"
        ));
    }

    out.blank();
    out.dump(format!("{ind}task {oname}_update_ffs;"));
    out.dump(format!("{ind}{tab}begin"));
    out.dump(util::indent(&format!("{ind}{tab}{tab}"), &decl.update_ffs_beh));
    out.dump(format!("{ind}{tab}end"));
    out.dump(format!("{ind}endtask"));

    out.blank();
    out.dump(format!("{ind}always {tick} begin : {oname}"));

    if !decl.local_decls.is_empty() {
        out.blank();
        out.dump(format!("{ind}{tab}// local declarations"));
        out.dump(util::indent(&format!("{ind}{tab}"), &decl.local_decls));
    }

    out.blank();
    out.dump(format!("{ind}{tab}if ({not_reset_cond}) begin // not in reset"));
    out.dump(format!("{ind}{tab}{tab}begin : {oname}_loop"));
    out.dump(format!("{ind}{tab}{tab}{tab}while (1) begin"));
    out.dump(format!(
        "{ind}{tab}{tab}{tab}{tab}// SmForever verbatim from {file_base}:{line_base}"
    ));
    out.dump(util::indent(&format!("{ind}{tab}{tab}{tab}"), beh_in));
    out.dump(format!("{ind}{tab}{tab}{tab}{tab}// SmEnd verbatim end"));
    out.dump(format!("{ind}{tab}{tab}{tab}{tab}`tick;"));
    out.dump(format!("{ind}{tab}{tab}{tab}end"));
    out.dump(format!("{ind}{tab}{tab}end"));
    out.dump(format!("{ind}{tab}end"));

    if !decl.reset_assigns.is_empty() {
        out.dump(format!("{ind}{tab}// reset behavior"));
        out.dump(util::indent(&format!("{ind}{tab}"), &decl.reset_assigns));
        out.dump(util::indent(&format!("{ind}{tab}"), &format!("{oname}_update_ffs;")));
    }

    out.dump(format!("{ind}end"));

    out.blank();
    out.dump(format!("{ind}// rename local registered signals dropping suffix"));
    out.dump(util::indent(ind, &decl.rename_ffs));

    out.blank();
    out.dump(format!("{ind}`undef tick"));
    out.blank();
    out.dump(format!("// }} AlgoFSM{sm_num}\n"));
    out.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::convert_to_dag;
    use crate::expand::expand_tree_structs;
    use crate::parser::Parser;

    fn run_pipeline(src: &str) -> (NodeStore, NodeId, Config) {
        let mut p = Parser::new(src, "t", 0);
        let root = p.parse().unwrap();
        expand_tree_structs(&mut p.store, Some(root)).unwrap();
        convert_to_dag(&mut p.store, Some(root), None).unwrap();
        (p.store, root, Config::default())
    }

    #[test]
    fn single_tick_emits_no_branches() {
        let (mut store, root, cfg) = run_pipeline("`tick;");
        let tick = find_first_tk(&mut store, Some(root)).unwrap();
        let body = dump_subdag(&store, &cfg, store.succ(tick), "", LabelMode::Rel, tick, &HashSet::new(), &HashMap::new())
            .unwrap();
        assert!(body.contains(STAY_TXT));
    }

    #[test]
    fn loop_without_tick_is_rejected() {
        let mut store = NodeStore::new();
        let cfg = Config::default();
        let id = store.add(NodeKind::ExitIf, "1", None, [None, None, None]);
        store.get_mut(id).child[1] = Some(id);
        let body = dump_subdag(&store, &cfg, Some(id), "", LabelMode::Abs, id, &HashSet::new(), &HashMap::new());
        assert!(body.is_err());
    }

    #[test]
    fn state_bits_grow_with_state_count() {
        assert_eq!(compute_state_bits(1), 0);
        assert_eq!(compute_state_bits(2), 0);
        assert_eq!(compute_state_bits(3), 1);
        assert_eq!(compute_state_bits(5), 2);
    }

    #[test]
    fn branch_swap_drops_empty_true_block() {
        let rendered = build_if_else("", "cond", &format!("{STAY_TXT}\n"), Some("x = 1;\n"));
        assert!(rendered.starts_with("if (!(cond)) begin"));
    }

    #[test]
    fn state_name_falls_back_to_code_when_unrenamed() {
        let mut store = NodeStore::new();
        let cfg = Config::default();
        let tick = store.add(NodeKind::Tick, "3", None, [None, None, None]);
        assert_eq!(state_name(&store, &cfg, tick, &HashMap::new()), "SMS3");
    }

    #[test]
    fn state_name_uses_rename_map_when_enabled() {
        let mut store = NodeStore::new();
        let mut cfg = Config::default();
        cfg.rename_states = true;
        let tick = store.add(NodeKind::Tick, "3", None, [None, None, None]);
        let mut rename = HashMap::new();
        rename.insert(tick, 0);
        assert_eq!(state_name(&store, &cfg, tick, &rename), "SM0");
    }

    #[test]
    fn state_name_ignores_rename_map_when_disabled() {
        let mut store = NodeStore::new();
        let mut cfg = Config::default();
        cfg.rename_states = false;
        let tick = store.add(NodeKind::Tick, "3", None, [None, None, None]);
        let mut rename = HashMap::new();
        rename.insert(tick, 0);
        assert_eq!(state_name(&store, &cfg, tick, &rename), "SMS3");
    }

    #[test]
    fn rename_states_renumbers_output() {
        let (mut store, root, mut cfg) = run_pipeline("`tick; `tick;");
        cfg.rename_states = true;
        let decl = crate::decl::Declarations::default();
        let out = dump_dag_sm(&mut store, &cfg, root, &decl, 0, "").unwrap();
        assert!(out.contains("localparam SM0_0 = 0;"));
        assert!(out.contains("localparam SM0_1 = 1;"));
        assert!(out.contains("state0 = SM0_1;") || out.contains("state0 = SM0_0;"));
    }
}
