use regex::Regex;
use std::sync::LazyLock;

use super::error::ErrorAccumulator;
use super::types::Eval;

static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[%clk\s+(\d+):(\d{1,2}):(\d{1,2}(?:\.\d+)?)\s*\]").expect("valid clock regex")
});

static EVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[%eval\s+(?:#([+-]?\d+)|([+-]?\d+(?:\.\d+)?))(?:,\d+)?\s*\]")
        .expect("valid eval regex")
});

/// Clock and evaluation pulled out of one `{ ... }` comment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Annotations {
    pub clock: Option<f64>,
    pub eval: Option<Eval>,
}

/// Extract `[%clk H:MM:SS]` and `[%eval x.yz | #n]` commands.
///
/// A command that is present but does not parse is reported to `errors`
/// and left as `None`.
pub fn parse_comment(comment: &str, errors: &mut ErrorAccumulator) -> Annotations {
    let mut out = Annotations::default();

    if comment.contains("[%clk") {
        out.clock = CLOCK_RE.captures(comment).and_then(|caps| {
            let hours: f64 = caps[1].parse().ok()?;
            let minutes: f64 = caps[2].parse().ok()?;
            let seconds: f64 = caps[3].parse().ok()?;
            Some(hours * 3600.0 + minutes * 60.0 + seconds)
        });
        if out.clock.is_none() {
            errors.push(&format!("Annotation error: clock in '{}'", comment.trim()));
        }
    }

    if comment.contains("[%eval") {
        out.eval = EVAL_RE.captures(comment).and_then(|caps| {
            if let Some(mate) = caps.get(1) {
                mate.as_str().parse().ok().map(Eval::Mate)
            } else {
                let pawns: f64 = caps.get(2)?.as_str().parse().ok()?;
                Some(Eval::Centipawns((pawns * 100.0).round() as i32))
            }
        });
        if out.eval.is_none() {
            errors.push(&format!("Annotation error: eval in '{}'", comment.trim()));
        }
    }

    out
}
