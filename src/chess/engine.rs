use log::{debug, info};
use shakmaty::fen::Fen;
use shakmaty::{Chess, EnPassantMode};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use super::error::{EngineError, Error, Result};

/// Scores a position for the side to move, in centipawns, mates folded
/// into `±(mate_score - distance)`.
pub trait Evaluator {
    fn evaluate(&mut self, pos: &Chess, mate_score: i32) -> Result<i32, EngineError>;
}

/// `score cp ...` / `score mate ...` from a UCI `info` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UciScore {
    Centipawns(i32),
    Mate(i32),
}

impl UciScore {
    pub fn relative(self, mate_score: i32) -> i32 {
        match self {
            UciScore::Centipawns(cp) => cp,
            UciScore::Mate(0) => -mate_score,
            UciScore::Mate(n) if n > 0 => mate_score - n,
            UciScore::Mate(n) => -mate_score - n,
        }
    }
}

pub fn parse_info_score(line: &str) -> Option<UciScore> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("info") {
        return None;
    }
    while let Some(token) = tokens.next() {
        if token == "score" {
            let kind = tokens.next()?;
            let value: i32 = tokens.next()?.parse().ok()?;
            return match kind {
                "cp" => Some(UciScore::Centipawns(value)),
                "mate" => Some(UciScore::Mate(value)),
                _ => None,
            };
        }
    }
    None
}

/// External UCI engine process searched to a fixed depth.
pub struct UciEngine {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    depth: u32,
    /// Cleared when a search fails part way; the next search first drains
    /// the pipe up to a fresh `readyok`.
    in_sync: bool,
}

impl UciEngine {
    /// Start the engine and complete the `uci`/`isready` handshake.
    pub fn spawn(path: &Path, depth: u32) -> Result<Self> {
        let unavailable = |source| Error::EngineUnavailable {
            path: path.to_path_buf(),
            source,
        };
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(unavailable)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            unavailable(std::io::Error::other("engine stdin not captured"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            unavailable(std::io::Error::other("engine stdout not captured"))
        })?;

        let mut engine = Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            depth,
            in_sync: true,
        };

        engine.handshake().map_err(Error::EngineHandshake)?;
        info!("Engine {} ready (depth {depth})", path.display());
        Ok(engine)
    }

    fn handshake(&mut self) -> Result<(), EngineError> {
        self.send("uci")?;
        self.wait_for("uciok")?;
        self.send("ucinewgame")?;
        self.send("isready")?;
        self.wait_for("readyok")
    }

    fn send(&mut self, command: &str) -> Result<(), EngineError> {
        writeln!(self.stdin, "{command}")?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Engines may print non-UTF-8 bytes in `info string` lines; those are
    /// replaced rather than failing the read.
    fn read_line(&mut self, line: &mut String) -> Result<(), EngineError> {
        let mut bytes = Vec::new();
        if self.stdout.read_until(b'\n', &mut bytes)? == 0 {
            return Err(EngineError::Terminated);
        }
        line.clear();
        line.push_str(&String::from_utf8_lossy(&bytes));
        Ok(())
    }

    fn wait_for(&mut self, token: &str) -> Result<(), EngineError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line)?;
            if line.trim() == token {
                return Ok(());
            }
        }
    }

    /// Stop any search still running and discard its output.
    fn resync(&mut self) -> Result<(), EngineError> {
        self.send("stop")?;
        self.send("isready")?;
        self.wait_for("readyok")?;
        self.in_sync = true;
        Ok(())
    }

    fn search(&mut self, fen: String, mate_score: i32) -> Result<i32, EngineError> {
        self.send(&format!("position fen {fen}"))?;
        self.send(&format!("go depth {}", self.depth))?;

        let mut line = String::new();
        let mut score = None;
        loop {
            self.read_line(&mut line)?;
            let trimmed = line.trim();
            if trimmed.starts_with("bestmove") {
                break;
            }
            if let Some(parsed) = parse_info_score(trimmed) {
                score = Some(parsed);
            }
        }

        score
            .map(|s| s.relative(mate_score))
            .ok_or(EngineError::NoScore(fen))
    }
}

impl Evaluator for UciEngine {
    fn evaluate(&mut self, pos: &Chess, mate_score: i32) -> Result<i32, EngineError> {
        if !self.in_sync {
            self.resync()?;
        }
        let fen = Fen::from_position(pos, EnPassantMode::Legal).to_string();
        let result = self.search(fen, mate_score);
        // NoScore is only returned after `bestmove`, so the pipe is clean.
        if matches!(result, Err(EngineError::Io(_) | EngineError::Terminated)) {
            self.in_sync = false;
        }
        result
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        let _ = self.send("quit");
        let _ = self.child.wait();
        debug!("Engine process released");
    }
}
