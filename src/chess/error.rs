use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Missing or unparseable header on a single game.
///
/// Aborts processing of that game only; the batch keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("missing header '{0}'")]
    Missing(&'static str),
    #[error("invalid header {key}='{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Why one game was abandoned mid-pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("malformed record: {0}")]
    MalformedHeader(#[from] HeaderError),
    #[error("illegal move '{san}' at ply {ply}")]
    IllegalMove { ply: usize, san: String },
}

/// A single analysis call failed. The engine may still be usable.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine i/o: {0}")]
    Io(#[from] io::Error),
    #[error("engine process terminated")]
    Terminated,
    #[error("engine reported no score for '{0}'")]
    NoScore(String),
}

/// Fatal conditions. Any of these aborts the pass before output is produced.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open file '{}': {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to initialize zstd decoder for '{}': {source}", path.display())]
    Decoder { path: PathBuf, source: io::Error },
    #[error("invalid path pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("no input files matched '{0}'")]
    NoInput(String),
    #[error("failed to start engine '{}': {source}", path.display())]
    EngineUnavailable { path: PathBuf, source: io::Error },
    #[error("engine handshake failed: {0}")]
    EngineHandshake(#[source] EngineError),
    #[error("invalid opening book '{}': {reason}", path.display())]
    Book { path: PathBuf, reason: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Collects non-fatal per-record diagnostics into one `; `-separated message.
#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator(Option<String>);

impl ErrorAccumulator {
    pub fn push(&mut self, msg: &str) {
        match &mut self.0 {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(msg);
            }
            None => {
                self.0 = Some(msg.to_string());
            }
        }
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}
