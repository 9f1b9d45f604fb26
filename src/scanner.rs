//! Outer host-file fence scanner: copies a host file line-by-line to an
//! output sink, recognising `SmBegin`/`SmForever`/`SmEnd` fences and
//! replacing each fenced block with its translated RTL (or behavioural)
//! output, driven by an explicit line-by-line state machine.
//!
//! A single file may contain several `SmBegin`/`SmEnd` blocks; each one gets
//! a fresh [`NodeStore`]/tick counter (the node arena is local to a block),
//! while the `SM<N>` numbering threaded through generated signal/state names
//! keeps counting up across blocks in the same scanner run.

use std::io::{BufRead, Write};

use regex::Regex;

use crate::config::Config;
use crate::dag::convert_to_dag;
use crate::decl;
use crate::emit;
use crate::errors::{AlgoFsmError, Result};
use crate::expand::expand_tree_structs;
use crate::merge::merge_states;
use crate::node::NodeStore;
use crate::parser::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScannerState {
    Idle,
    InSmBegin,
    InSmForever,
    InSmEnd,
    Done,
}

/// Scans `input` line by line, writing the translated file to `out`.
/// `file_base` names the source for diagnostics. `sm_num` is the first SM
/// index to assign; returns the next unused index, so a caller translating
/// several files in one run can keep numbering contiguous across all of
/// them.
pub fn scan_file<R: BufRead, W: Write>(
    input: R,
    out: &mut W,
    cfg: &Config,
    file_base: &str,
    mut sm_num: usize,
) -> Result<usize> {
    let decl_regex = Regex::new(r"^(\s*)SmDecl:\s*(.*)$").expect("static regex");

    let mut state = ScannerState::Idle;
    let mut line_no = 0usize;
    let mut line_base = 0usize;
    let mut decl_in = String::new();
    let mut body_in = String::new();
    let mut any_block = false;

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        line_no += 1;

        match state {
            ScannerState::Idle | ScannerState::Done => {
                if trimmed == "SmBegin" {
                    state = ScannerState::InSmBegin;
                    decl_in.clear();
                    body_in.clear();
                } else {
                    writeln!(out, "{line}")?;
                }
            }
            ScannerState::InSmBegin => {
                if trimmed == "SmForever" {
                    line_base = line_no;
                    state = ScannerState::InSmForever;
                } else {
                    decl_in.push_str(&line);
                    decl_in.push('\n');
                }
            }
            ScannerState::InSmForever => {
                if trimmed == "SmEnd" {
                    state = ScannerState::InSmEnd;
                } else if let Some(caps) = decl_regex.captures(&line) {
                    let indent = &caps[1];
                    let rest = &caps[2];
                    decl_in.push_str(indent);
                    decl_in.push_str(rest);
                    decl_in.push('\n');
                } else {
                    body_in.push_str(&line);
                    body_in.push('\n');
                }
            }
            ScannerState::InSmEnd => unreachable!("handled inline below"),
        }

        if state == ScannerState::InSmEnd {
            any_block = true;
            let rendered = translate_block(
                cfg,
                &decl_in,
                &body_in,
                sm_num,
                "",
                line_base,
                file_base,
            )?;
            writeln!(out, "{rendered}")?;
            sm_num += 1;
            state = ScannerState::Done;
        }
    }

    match state {
        ScannerState::Idle => {
            tracing::warn!(target: "algofsm::scanner", file = file_base, "SmBegin section not found");
        }
        ScannerState::InSmBegin => {
            return Err(AlgoFsmError::Scan {
                file: file_base.to_string(),
                line: line_no,
                message: "SmCombo/SmForever section not found".to_string(),
            });
        }
        ScannerState::InSmForever => {
            return Err(AlgoFsmError::Scan {
                file: file_base.to_string(),
                line: line_no,
                message: "SmEnd not found".to_string(),
            });
        }
        ScannerState::Done => {}
    }

    if !any_block {
        tracing::debug!(target: "algofsm::scanner", file = file_base, "no state machine blocks translated");
    }

    Ok(sm_num)
}

/// Runs one fenced block's declaration text and body text through the full
/// pipeline (or the behavioural shortcut), returning the rendered Verilog
/// that replaces the `SmBegin`..`SmEnd` region in the host file.
fn translate_block(
    cfg: &Config,
    decl_in: &str,
    body_in: &str,
    sm_num: usize,
    ind: &str,
    line_base: usize,
    file_base: &str,
) -> Result<String> {
    let oname = format!("{}{sm_num}", cfg.name);
    let decl = decl::extract_initial(decl_in, cfg, &oname, file_base, 0)?;

    if cfg.behav {
        return Ok(emit::process_block_behavioural(
            cfg, &decl, body_in, sm_num, ind, line_base, file_base,
        ));
    }

    // Wrap the body in an implicit infinite loop with a leading tick, the
    // way `FsmConverterRTL._expand_input` does, so the pipeline sees a
    // single always-looping block rather than a bare statement list.
    let wrapped = format!("while(1) begin\n`tick;\n{body_in}\nend\n");

    let mut parser = Parser::new(&wrapped, file_base, line_base);
    let root = parser.parse()?;
    let mut store: NodeStore = parser.store;

    dump_debug_dot(cfg, &store, &format!("{sm_num}_00_before"), root);

    expand_tree_structs(&mut store, Some(root))?;
    dump_debug_dot(cfg, &store, &format!("{sm_num}_02_after_expand_struct"), root);

    convert_to_dag(&mut store, Some(root), None)?;
    dump_debug_dot(cfg, &store, &format!("{sm_num}_04_after_convert_to_dag"), root);

    merge_states(&mut store, cfg)?;
    dump_debug_dot(cfg, &store, &format!("{sm_num}_09_after_merge_states"), root);

    emit::dump_dag_sm(&mut store, cfg, root, &decl, sm_num, ind)
}

/// Writes `<name>.dot` into the current directory when `--debug` is set.
/// A failure to write it is logged but never aborts translation — debug
/// dumps are a diagnostic aid, not part of the translation contract.
fn dump_debug_dot(cfg: &Config, store: &NodeStore, name: &str, root: crate::node::NodeId) {
    if cfg.debug_level == 0 {
        return;
    }
    let dot = crate::dot::dump_dot(store, name, root, &[]);
    if let Err(err) = std::fs::write(format!("{name}.dot"), dot) {
        tracing::warn!(target: "algofsm::scanner", name, %err, "failed to write debug dot file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(src: &str, cfg: &Config) -> (String, usize) {
        let mut out = Vec::new();
        let next = scan_file(Cursor::new(src), &mut out, cfg, "t.v", 0).unwrap();
        (String::from_utf8(out).unwrap(), next)
    }

    #[test]
    fn passes_non_fenced_lines_through_verbatim() {
        let (out, next) = run("module top;\nendmodule\n", &Config::default());
        assert_eq!(out, "module top;\nendmodule\n");
        assert_eq!(next, 0);
    }

    #[test]
    fn translates_a_single_block_and_advances_sm_num() {
        let src = "before\nSmBegin\nreg cnt = 0\nSmForever\n`tick;\nSmEnd\nafter\n";
        let (out, next) = run(src, &Config::default());
        assert!(out.contains("before\n"));
        assert!(out.contains("AlgoFSM0"));
        assert!(out.contains("after\n"));
        assert_eq!(next, 1);
    }

    #[test]
    fn embedded_sm_decl_line_is_folded_into_declarations() {
        let src = "SmBegin\nSmForever\nSmDecl: reg cnt = 0\n`tick;\nSmEnd\n";
        let (out, _) = run(src, &Config::default());
        assert!(out.contains("reg cnt_r, cnt;"));
    }

    #[test]
    fn missing_sm_begin_only_warns() {
        let (out, next) = run("plain verilog\n", &Config::default());
        assert_eq!(out, "plain verilog\n");
        assert_eq!(next, 0);
    }

    #[test]
    fn unterminated_sm_begin_is_an_error() {
        let mut out = Vec::new();
        let err = scan_file(
            Cursor::new("SmBegin\nreg x = 0\n"),
            &mut out,
            &Config::default(),
            "t.v",
            0,
        )
        .unwrap_err();
        assert!(matches!(err, AlgoFsmError::Scan { .. }));
    }

    #[test]
    fn unterminated_sm_forever_is_an_error() {
        let mut out = Vec::new();
        let err = scan_file(
            Cursor::new("SmBegin\nSmForever\n`tick;\n"),
            &mut out,
            &Config::default(),
            "t.v",
            0,
        )
        .unwrap_err();
        assert!(matches!(err, AlgoFsmError::Scan { .. }));
    }

    #[test]
    fn two_blocks_in_one_file_share_a_monotonic_sm_index() {
        let src = "\
SmBegin
SmForever
`tick;
SmEnd
SmBegin
SmForever
`tick;
SmEnd
";
        let (out, next) = run(src, &Config::default());
        assert!(out.contains("AlgoFSM0"));
        assert!(out.contains("AlgoFSM1"));
        assert_eq!(next, 2);
    }
}
