//! Declaration mini-language: parses the `SmDecl` region collected by the
//! scanner into the handful of Verilog code fragments the emitter splices
//! into the generated `always` block.

use std::collections::HashMap;

use crate::config::Config;
use crate::errors::{AlgoFsmError, Result};

/// The fragments accumulated while walking a declaration region, one per
/// declared register, kept as growable strings that each call site appends
/// a line to as it's encountered.
#[derive(Debug, Default, Clone)]
pub struct Declarations {
    pub local_decls: String,
    pub reset_assigns: String,
    pub update_ffs: String,
    pub update_ffs_beh: String,
    pub update_nxt: String,
    pub rename_ffs: String,
    pub initial_values: HashMap<String, String>,
}

/// `var = init` with an optional leading `[msb:lsb]` width, inherited by
/// later comma-items on the same line that omit it.
fn split_width(width: &str, var: &str) -> (String, String) {
    let var = var.trim_start();
    if let Some(bracket_end) = var.find(']') {
        if var.starts_with('[') {
            let (w, rest) = var.split_at(bracket_end + 1);
            return (format!("{w} "), rest.trim_start().to_string());
        }
    }
    (width.to_string(), var.to_string())
}

pub fn extract_initial(
    text: &str,
    cfg: &Config,
    oname: &str,
    file_base: &str,
    line_decl_base: usize,
) -> Result<Declarations> {
    let mut decl = Declarations::default();
    let mut line_no = line_decl_base;

    for raw_line in text.split('\n') {
        line_no += 1;
        let line = raw_line.replace(';', "");
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        let mut width = String::new();
        let mut local = false;
        let mut reg = false;

        for item in line.split(',') {
            let (var_raw, init) = match item.split_once('=') {
                Some((v, i)) => (v.trim(), i.trim()),
                None => {
                    return Err(AlgoFsmError::Semantic {
                        file: file_base.to_string(),
                        line: line_no,
                        message: format!("'{item}' is missing an initial val. line {line_no}: {line}"),
                    });
                }
            };

            // A bare `=` split of `var <= init` leaves a trailing `<` on
            // `var_raw` (the `=` of `<=` is what got split on).
            if var_raw.ends_with('<') {
                return Err(AlgoFsmError::Semantic {
                    file: file_base.to_string(),
                    line: line_no,
                    message: format!(
                        "Non-blocking assignments shouldn't be used in algofsm blocks while processing: {item}"
                    ),
                });
            }

            let mut var = var_raw.to_string();
            if let Some(rest) = strip_keyword(&var, "reg") {
                reg = true;
                var = rest;
            }
            if let Some(rest) = strip_keyword(&var, "local") {
                local = true;
                var = rest;
            }

            let (w, v) = split_width(&width, &var);
            width = w.clone();
            let var = v;

            if !(local || reg) {
                return Err(AlgoFsmError::Semantic {
                    file: file_base.to_string(),
                    line: line_no,
                    message: format!("missing local or reg. line {line_no}: {line}"),
                });
            }

            decl.initial_values.insert(var.clone(), init.to_string());

            let curr = &cfg.state_suffix;
            decl.local_decls
                .push_str(&format!("reg {width}{var}{curr}, {var};\n"));

            if !init.is_empty() {
                if cfg.behav {
                    decl.reset_assigns.push_str(&format!("{var} = {init};\n"));
                } else {
                    decl.reset_assigns
                        .push_str(&format!("{var}{curr} <= {}{init};\n", cfg.delay()));
                }
            }

            decl.update_ffs
                .push_str(&format!("{var}{curr} <= {}{var};\n", cfg.delay()));

            let scope = format!("{oname}.");
            decl.update_ffs_beh.push_str(&format!(
                "{scope}{var}{curr} <= {}{scope}{var};\n",
                cfg.delay()
            ));

            decl.update_nxt.push_str(&format!("{var} = {var}{curr};\n"));

            if !local {
                decl.rename_ffs
                    .push_str(&format!("wire {width}{var} = {scope}{var}{curr};\n"));
            }
        }
    }

    Ok(decl)
}

/// If `var` contains `keyword` as a standalone token, strip it (and any
/// following whitespace) and return the remainder.
fn strip_keyword(var: &str, keyword: &str) -> Option<String> {
    if !var.contains(keyword) {
        return None;
    }
    let stripped = var.replacen(keyword, "", 1);
    Some(stripped.trim_start().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_reg_declaration() {
        let cfg = Config::default();
        let decl = extract_initial("reg cnt = 0", &cfg, "algofsm0", "t", 0).unwrap();
        assert!(decl.local_decls.contains("reg cnt_r, cnt;"));
        assert!(decl.reset_assigns.contains("cnt_r <= 0;"));
        assert!(decl.update_ffs.contains("cnt_r <= cnt;"));
        assert!(decl.rename_ffs.contains("wire cnt = algofsm0.cnt_r;"));
    }

    #[test]
    fn local_declaration_is_not_renamed() {
        let cfg = Config::default();
        let decl = extract_initial("local tmp = 0", &cfg, "algofsm0", "t", 0).unwrap();
        assert!(decl.local_decls.contains("tmp_r, tmp;"));
        assert!(decl.rename_ffs.is_empty());
    }

    #[test]
    fn width_is_inherited_across_comma_items() {
        let cfg = Config::default();
        let decl = extract_initial("reg [3:0] a = 0, b = 1", &cfg, "algofsm0", "t", 0).unwrap();
        assert!(decl.local_decls.contains("reg [3:0] a_r, a;"));
        assert!(decl.local_decls.contains("reg [3:0] b_r, b;"));
    }

    #[test]
    fn missing_local_or_reg_is_rejected() {
        let cfg = Config::default();
        assert!(extract_initial("x = 0", &cfg, "algofsm0", "t", 0).is_err());
    }

    #[test]
    fn nonblocking_initializer_is_rejected() {
        let cfg = Config::default();
        assert!(extract_initial("reg x <= 0", &cfg, "algofsm0", "t", 0).is_err());
    }
}
