use pgn_reader::SanPlus;
use serde_json::{Map, Value, json};
use shakmaty::Color;
use std::fmt;
use std::str::FromStr;

use super::error::HeaderError;

/// One game deep-copied out of the parser, so it stays valid after the
/// stream has moved on to the next record.
#[derive(Debug, Clone, Default)]
pub struct GameRecord {
    /// Tags in file order; the first occurrence of a duplicated key wins.
    pub headers: Vec<(String, String)>,

    /// Normalised mainline movetext, comments kept, variations dropped.
    pub movetext: String,

    /// Mainline plies with their clock/eval annotations.
    pub moves: Vec<MoveRecord>,

    /// Result marker from the movetext (or the `Result` tag as fallback).
    pub outcome: Option<String>,

    /// NULL for a clean record, otherwise `; `-separated diagnostics.
    pub parse_error: Option<String>,
}

impl GameRecord {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Re-serialise as PGN text (headers, blank line, movetext and result).
    pub fn to_pgn(&self) -> String {
        let mut out = String::with_capacity(512 + self.movetext.len());
        for (key, value) in &self.headers {
            out.push('[');
            out.push_str(key);
            out.push_str(" \"");
            out.push_str(&value.replace('\\', "\\\\").replace('"', "\\\""));
            out.push_str("\"]\n");
        }
        out.push('\n');
        out.push_str(&self.movetext);
        if let Some(outcome) = &self.outcome {
            if !self.movetext.is_empty() {
                out.push(' ');
            }
            out.push_str(outcome);
        }
        out.push('\n');
        out
    }

    /// One JSON object: headers as a map, movetext, outcome and diagnostics.
    pub fn to_json(&self) -> Value {
        let headers: Map<String, Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        json!({
            "headers": headers,
            "movetext": self.movetext,
            "plies": self.moves.len(),
            "outcome": self.outcome,
            "parse_error": self.parse_error,
        })
    }
}

/// A single mainline ply.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub san: SanPlus,
    /// Mover's remaining clock after the move, in seconds.
    pub clock: Option<f64>,
    /// Embedded evaluation, White-relative as written in the PGN.
    pub eval: Option<Eval>,
}

impl MoveRecord {
    pub fn new(san: SanPlus) -> Self {
        Self {
            san,
            clock: None,
            eval: None,
        }
    }
}

/// White-relative evaluation as annotated by `[%eval ...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eval {
    Centipawns(i32),
    /// Positive: White mates in n. Negative: Black mates in n. Zero: the
    /// side to move is already mated.
    Mate(i32),
}

impl Eval {
    /// Score from `pov`'s perspective with mates folded into
    /// `±(mate_score - distance)`. `pov` is expected to be the side to
    /// move, which is what makes `Mate(0)` unambiguous.
    pub fn score(self, pov: Color, mate_score: i32) -> i32 {
        let flip = |v: i32| if pov.is_white() { v } else { -v };
        match self {
            Eval::Centipawns(cp) => flip(cp),
            Eval::Mate(0) => -mate_score,
            Eval::Mate(n) => {
                let moves = flip(n);
                if moves > 0 {
                    mate_score - moves
                } else {
                    -mate_score - moves
                }
            }
        }
    }
}

/// `(base minutes, increment seconds)`, from a `"<base_seconds>+<inc>"` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeControl {
    pub base_minutes: u32,
    pub increment_seconds: u32,
}

impl TimeControl {
    pub const fn new(base_minutes: u32, increment_seconds: u32) -> Self {
        Self {
            base_minutes,
            increment_seconds,
        }
    }

    pub fn base_seconds(self) -> u32 {
        self.base_minutes * 60
    }
}

impl FromStr for TimeControl {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HeaderError::Invalid {
            key: "TimeControl",
            value: s.to_string(),
        };
        let (base, increment) = s.trim().split_once('+').ok_or_else(invalid)?;
        let base: u32 = base.trim().parse().map_err(|_| invalid())?;
        let increment: u32 = increment.trim().parse().map_err(|_| invalid())?;
        Ok(Self::new(base / 60, increment))
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.base_minutes, self.increment_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Other,
}

impl GameResult {
    pub fn from_header(raw: &str) -> Self {
        match raw.trim() {
            "1-0" => Self::WhiteWin,
            "0-1" => Self::BlackWin,
            _ => Self::Other,
        }
    }

    /// `+1` for a White win, `-1` for a Black win, `0` otherwise.
    pub fn sign(self) -> i8 {
        match self {
            Self::WhiteWin => 1,
            Self::BlackWin => -1,
            Self::Other => 0,
        }
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            Self::WhiteWin => Some(Color::White),
            Self::BlackWin => Some(Color::Black),
            Self::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub rating: u32,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opening {
    pub name: String,
    pub eco: String,
}
