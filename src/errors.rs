//! Error type for the whole translation pipeline: a flat `thiserror` enum
//! with one variant per failure mode, each carrying enough context to print
//! a useful diagnostic and map to a process exit code.

use thiserror::Error;

pub type Result<T, E = AlgoFsmError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AlgoFsmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML config error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A parse failure inside one host-file fence block. The caller attaches
    /// a few lines of source context to `message` before returning it.
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    /// A fence-scanner structural error: unmatched `` `SmBegin `` / `` `SmForever `` /
    /// `` `SmEnd ``, or a declaration line the mini-language can't parse.
    #[error("{file}:{line}: {message}")]
    Scan {
        file: String,
        line: usize,
        message: String,
    },

    /// A semantic error raised after parsing: a tick inside a `case`/`cs`
    /// subtree, a non-blocking assignment, a malformed declaration, etc.
    #[error("{file}:{line}: {message}")]
    Semantic {
        file: String,
        line: usize,
        message: String,
    },

    #[error("no AlgoFSM state-machine block found in {0}")]
    NoBlockFound(String),

    #[error("{0}")]
    Msg(String),
}

impl From<&str> for AlgoFsmError {
    fn from(s: &str) -> Self {
        AlgoFsmError::Msg(s.to_owned())
    }
}

impl AlgoFsmError {
    /// Process exit code for this error: 0 on success, 1 for a usage/IO
    /// failure, 2 for a parse/scan/semantic failure rooted in user input.
    pub fn exit_code(&self) -> i32 {
        match self {
            AlgoFsmError::Io(_) | AlgoFsmError::Toml(_) | AlgoFsmError::Msg(_) => 1,
            AlgoFsmError::Parse { .. }
            | AlgoFsmError::Scan { .. }
            | AlgoFsmError::Semantic { .. }
            | AlgoFsmError::NoBlockFound(_) => 2,
        }
    }
}
