//! Small stateless helpers shared across the pipeline: constant-expression
//! detection, negation, and the line-accumulating output buffer used by the
//! emitter.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_ONE_PLAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*1\s*$").unwrap());
static RE_ONE_SIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*1?'[bdh]1\s*$").unwrap());
static RE_ZERO_PLAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*0\s*$").unwrap());
static RE_ZERO_SIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*1?'[bdh]0\s*$").unwrap());
static RE_PURE_NEGATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[!~]\s*\((.*)\)$").unwrap());
static RE_NONBLOCKING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\w+\s*<=\s*.*$").unwrap());

/// True iff `expr` is provably constant 1 (`1`, `1'b1`, `'h1`, …).
pub fn is_one(expr: &str) -> bool {
    RE_ONE_PLAIN.is_match(expr) || RE_ONE_SIZED.is_match(expr)
}

/// True iff `expr` is provably constant 0 (`0`, `1'b0`, `'h0`, …).
pub fn is_zero(expr: &str) -> bool {
    RE_ZERO_PLAIN.is_match(expr) || RE_ZERO_SIZED.is_match(expr)
}

/// True iff `expr` is of the form `!(...)` or `~(...)`.
pub fn is_pure_negation(expr: &str) -> bool {
    RE_PURE_NEGATION.is_match(expr.trim())
}

/// Negate `expr`: strip a leading pure negation, else wrap as `!(expr)`.
pub fn negate(expr: &str) -> String {
    let trimmed = expr.trim();
    match RE_PURE_NEGATION.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => format!("!({expr})"),
    }
}

/// True iff `blk` renders as nothing but the `// stay in state` marker.
pub fn is_only_stay(stay_txt: &str, blk: &str) -> bool {
    let lines: Vec<&str> = blk
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines.len() == 1 && lines[0] == stay_txt
}

/// True iff `stmt` is a non-blocking assignment (`foo <= bar`), which is
/// forbidden inside an AlgoFSM block.
pub fn is_nonblocking_assign(stmt: &str) -> bool {
    RE_NONBLOCKING.is_match(stmt)
}

/// Indent every line of `txt` by `ind`, dropping trailing whitespace first.
pub fn indent(ind: &str, txt: &str) -> String {
    txt.trim_end()
        .split('\n')
        .map(|line| format!("{ind}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Line-oriented output accumulator, mirroring `utils.py::Dumper`.
#[derive(Debug, Default)]
pub struct CodeBuf {
    lines: Vec<String>,
}

impl CodeBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new line.
    pub fn dump(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Append an empty line.
    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Append text onto the end of the last line, without a newline.
    pub fn dump_nonl(&mut self, text: impl AsRef<str>) {
        if let Some(last) = self.lines.last_mut() {
            last.push_str(text.as_ref());
        } else {
            self.lines.push(text.as_ref().to_string());
        }
    }

    pub fn into_string(self) -> String {
        self.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_literals() {
        assert!(is_one(" 1"));
        assert!(is_one("1'b1 "));
        assert!(is_one(" 'b1 "));
        assert!(is_one("  1'd1 "));
        assert!(is_one("'d1"));
        assert!(is_one("1'h1"));
        assert!(is_one("'h1"));
    }

    #[test]
    fn not_one_literals() {
        assert!(!is_one("0"));
        assert!(!is_one("1'b0"));
        assert!(!is_one("'b0"));
        assert!(!is_one("1'd0"));
        assert!(!is_one("'d0"));
        assert!(!is_one("1'h0"));
        assert!(!is_one("'h0"));
        assert!(!is_one("x"));
        assert!(!is_one(" 0"));
    }

    #[test]
    fn zero_literals() {
        assert!(is_zero(" 0"));
        assert!(is_zero("1'b0 "));
        assert!(is_zero(" 'b0 "));
        assert!(is_zero("  1'd0 "));
        assert!(is_zero("'d0"));
        assert!(is_zero("1'h0"));
        assert!(is_zero("'h0"));
    }

    #[test]
    fn not_zero_literals() {
        assert!(!is_zero("1"));
        assert!(!is_zero("1'b1"));
        assert!(!is_zero("'b1"));
        assert!(!is_zero("1'd1"));
        assert!(!is_zero("'d1"));
        assert!(!is_zero("1'h1"));
        assert!(!is_zero("'h1"));
        assert!(!is_zero("x"));
        assert!(!is_zero(" 1"));
    }

    #[test]
    fn pure_negation_detection() {
        assert!(is_pure_negation(" !(as bd cd) "));
        assert!(is_pure_negation(" !  (as bd cd) "));
        assert!(is_pure_negation("~(x)"));
        assert!(is_pure_negation("~((x))"));
        assert!(!is_pure_negation(" (as bd cd) "));
        assert!(!is_pure_negation("(x)"));
        assert!(!is_pure_negation("((x))"));
    }

    #[test]
    fn negation_idempotence() {
        assert_eq!(negate("!(as cd)"), "as cd");
        assert_eq!(negate("(as bd cd)"), "!((as bd cd))");
        assert_eq!(negate(&negate("foo")), "foo");
    }

    #[test]
    fn indent_prefixes_each_line() {
        assert_eq!(indent(".", "asd\n  yzx"), ".asd\n.  yzx");
    }

    #[test]
    fn nonblocking_detection() {
        assert!(is_nonblocking_assign(" asd12_22 <= asdf "));
        assert!(!is_nonblocking_assign(" asd12_22 = asdf "));
        assert!(!is_nonblocking_assign(" if (a <-5) x=1 "));
    }
}
