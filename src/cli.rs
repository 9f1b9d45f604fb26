//! Command-line surface: a single flat `clap` derive struct with one flag
//! per configuration override, plus the input file and output destination.

use clap::Parser;

#[derive(Parser)]
#[command(name = "algofsm")]
#[command(about = "Translates tick-annotated sequential pseudocode into synthesizable FSM RTL")]
#[command(version)]
pub struct Cli {
    /// Host file to translate. `-` reads from stdin.
    #[arg(default_value = "-")]
    pub file: String,

    /// Destination for the translated file. Defaults to stdout.
    #[arg(long)]
    pub out: Option<String>,

    /// Optional TOML file overriding the built-in defaults before CLI flags
    /// are applied.
    #[arg(long)]
    pub config: Option<String>,

    /// Emit behavioural (non-synthesizable) code instead of RTL.
    #[arg(long)]
    pub behav: bool,

    /// Clock signal name, optionally `~`-prefixed for negedge.
    #[arg(long)]
    pub clk: Option<String>,

    /// Reset signal name, optionally `~`-prefixed (low-active) and/or
    /// `:`-suffixed (synchronous).
    #[arg(long)]
    pub rst: Option<String>,

    /// Enable signal base name (per-block index is appended).
    #[arg(long)]
    pub ena: Option<String>,

    /// Non-blocking assignment delay in time units, rendered as `#<sd> `.
    #[arg(long)]
    pub sd: Option<u32>,

    /// Generated state name prefix.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Generated state variable base name.
    #[arg(long)]
    pub state: Option<String>,

    /// Generated always-block instance name.
    #[arg(long)]
    pub name: Option<String>,

    /// Indentation width, in spaces.
    #[arg(long)]
    pub indent: Option<usize>,

    /// Suffix appended to a register's name to form its next-state wire.
    #[arg(long)]
    pub state_suffix: Option<String>,

    /// Debug verbosity: 0 disables DOT/tree dumps entirely.
    #[arg(long, default_value_t = 0)]
    pub debug: u8,

    /// Disable renaming merged states to their sorted index
    /// (`<prefix><index>`); keep the `<prefix>S<code>` form instead.
    #[arg(long)]
    pub no_rename_states: bool,
}

impl Cli {
    /// Folds CLI overrides onto a base `Config` (loaded from `--config`, or
    /// the built-in defaults if absent). Flags take precedence over
    /// whatever the base config already set.
    pub fn apply_overrides(&self, mut cfg: crate::config::Config) -> crate::config::Config {
        if self.behav {
            cfg.behav = true;
        }
        if let Some(v) = &self.clk {
            cfg.clk = v.clone();
        }
        if let Some(v) = &self.rst {
            cfg.rst = v.clone();
        }
        if let Some(v) = &self.ena {
            cfg.ena = v.clone();
        }
        if let Some(v) = self.sd {
            cfg.sd = v;
        }
        if let Some(v) = &self.prefix {
            cfg.prefix = v.clone();
        }
        if let Some(v) = &self.state {
            cfg.state = v.clone();
        }
        if let Some(v) = &self.name {
            cfg.name = v.clone();
        }
        if let Some(v) = self.indent {
            cfg.indent = v;
        }
        if let Some(v) = &self.state_suffix {
            cfg.state_suffix = v.clone();
        }
        if self.no_rename_states {
            cfg.rename_states = false;
        }
        cfg.debug_level = self.debug;
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    #[test]
    fn no_rename_states_flag_disables_default() {
        let cli = Cli::parse_from(["algofsm", "--no-rename-states", "in.v"]);
        let cfg = cli.apply_overrides(crate::config::Config::default());
        assert!(!cfg.rename_states);
    }

    #[test]
    fn unset_flags_leave_config_defaults() {
        let cli = Cli::parse_from(["algofsm", "in.v"]);
        let cfg = cli.apply_overrides(crate::config::Config::default());
        assert!(cfg.rename_states);
        assert_eq!(cfg.prefix, "SM");
    }
}
