//! Translation configuration: a `Deserialize`-able struct loaded from an
//! optional TOML file, with every field overridable from the CLI afterward.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub name: String,
    pub prefix: String,
    pub state: String,
    pub state_suffix: String,
    pub clk: String,
    pub rst: String,
    pub ena: String,
    pub sd: u32,
    pub indent: usize,
    pub behav: bool,
    pub rename_states: bool,
    pub debug_level: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "algofsm".to_string(),
            prefix: "SM".to_string(),
            state: "state".to_string(),
            state_suffix: "_r".to_string(),
            clk: "clk".to_string(),
            rst: "~rst_n".to_string(),
            ena: String::new(),
            sd: 0,
            indent: 4,
            behav: false,
            rename_states: true,
            debug_level: 0,
        }
    }
}

impl Config {
    pub fn load(path: &std::path::Path) -> crate::errors::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Indentation unit, e.g. `"    "` for the default `indent = 4`.
    pub fn tab(&self) -> String {
        " ".repeat(self.indent)
    }

    /// Non-blocking-assignment delay prefix: `"#<sd> "` when `sd` is
    /// nonzero, else empty.
    pub fn delay(&self) -> String {
        if self.sd > 0 {
            format!("#{} ", self.sd)
        } else {
            String::new()
        }
    }

    /// `(clk_edge_with_reset, clk_edge_without_reset)`, e.g.
    /// `("posedge clk or negedge rst_n", "posedge clk")`, from `clk`/`rst`
    /// with their optional `~` (negedge/low-active) and `:` (sync) markers
    /// stripped.
    pub fn tick_sensitivity(&self) -> (String, String) {
        let (clk, falling_edge) = unpack_clk(&self.clk);
        let (rst, low_act, sync) = unpack_rst(&self.rst);

        let edge = |neg: bool| if neg { "negedge" } else { "posedge" };
        let no_rst = format!("@({} {})", edge(falling_edge), clk);
        let with_rst = if sync {
            no_rst.clone()
        } else {
            format!(
                "@({} {} or {} {})",
                edge(falling_edge),
                clk,
                edge(low_act),
                rst
            )
        };
        (with_rst, no_rst)
    }

    /// `(in_reset_condition, not_in_reset_condition)` from `rst`. Ported
    /// from `utils.py::get_resets`.
    pub fn reset_conditions(&self) -> (String, String) {
        let (rst, low_act, _) = unpack_rst(&self.rst);
        if low_act {
            (format!("!{rst}"), rst)
        } else {
            (rst.clone(), format!("!{rst}"))
        }
    }
}

fn unpack_clk(clk: &str) -> (String, bool) {
    let clk = clk.trim();
    match clk.strip_prefix('~') {
        Some(rest) => (rest.to_string(), true),
        None => (clk.to_string(), false),
    }
}

fn unpack_rst(rst: &str) -> (String, bool, bool) {
    let mut rst = rst.trim();
    let low_act = rst.starts_with('~');
    if low_act {
        rst = &rst[1..];
    }
    let sync = rst.ends_with(':');
    if sync {
        rst = &rst[..rst.len() - 1];
    }
    (rst.to_string(), low_act, sync)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_table() {
        let cfg = Config::default();
        assert_eq!(cfg.name, "algofsm");
        assert_eq!(cfg.prefix, "SM");
        assert_eq!(cfg.rst, "~rst_n");
        assert!(cfg.rename_states);
        assert_eq!(cfg.sd, 0);
        assert_eq!(cfg.delay(), "");
    }

    #[test]
    fn delay_renders_hash_prefix_when_nonzero() {
        let mut cfg = Config::default();
        cfg.sd = 1;
        assert_eq!(cfg.delay(), "#1 ");
    }

    #[test]
    fn tick_sensitivity_default_async_low_reset() {
        let cfg = Config::default();
        let (with_rst, no_rst) = cfg.tick_sensitivity();
        assert_eq!(with_rst, "@(posedge clk or negedge rst_n)");
        assert_eq!(no_rst, "@(posedge clk)");
    }

    #[test]
    fn reset_conditions_low_active() {
        let cfg = Config::default();
        let (in_rst, not_in_rst) = cfg.reset_conditions();
        assert_eq!(in_rst, "!rst_n");
        assert_eq!(not_in_rst, "rst_n");
    }

    #[test]
    fn sync_reset_drops_reset_edge_from_sensitivity() {
        let mut cfg = Config::default();
        cfg.rst = "rst:".to_string();
        let (with_rst, no_rst) = cfg.tick_sensitivity();
        assert_eq!(with_rst, no_rst);
    }
}
