//! Move-quality classification from consecutive evaluations.

/// Mate scores are folded into `±(MATE_SCORE - distance)`.
pub const MATE_SCORE: i32 = 10_000;

/// Upper clamp on a single move's centipawn loss.
pub const MAX_CP_LOSS: i32 = 1_000;

/// Assessment of the initial position, side-to-move relative.
pub const STARTING_EVAL: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveQuality {
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    /// Both thresholds exceeded.
    All,
    /// Either threshold exceeded.
    Any,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    quality: MoveQuality,
    norm_diff_above: f64,
    cp_loss_above: i32,
    join: Join,
}

impl Rule {
    fn fires(&self, norm_diff: f64, cp_loss: i32) -> bool {
        let by_prob = norm_diff > self.norm_diff_above;
        let by_cp = cp_loss > self.cp_loss_above;
        match self.join {
            Join::All => by_prob && by_cp,
            Join::Any => by_prob || by_cp,
        }
    }
}

/// Evaluated top-down; the first rule that fires decides.
const RULES: [Rule; 3] = [
    Rule {
        quality: MoveQuality::Blunder,
        norm_diff_above: 0.45,
        cp_loss_above: 100,
        join: Join::All,
    },
    Rule {
        quality: MoveQuality::Mistake,
        norm_diff_above: 0.3,
        cp_loss_above: 400,
        join: Join::Any,
    },
    Rule {
        quality: MoveQuality::Inaccuracy,
        norm_diff_above: 0.2,
        cp_loss_above: 200,
        join: Join::Any,
    },
];

pub fn classify(norm_diff: f64, cp_loss: i32) -> MoveQuality {
    RULES
        .iter()
        .find(|rule| rule.fires(norm_diff, cp_loss))
        .map_or(MoveQuality::Good, |rule| rule.quality)
}

/// Centipawns to win probability.
pub fn logistic(score: i32) -> f64 {
    let scaled = f64::from(score) * 400.0 / (64.0 * 255.0);
    1.0 / (1.0 + (-scaled).exp())
}

/// Result of judging one ply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgement {
    pub cp_loss: i32,
    pub norm_diff: f64,
    pub quality: MoveQuality,
}

/// `last_eval` is relative to the mover (before the move), `current_eval`
/// to the opponent (after it). Their *sum* is the mover's loss: the sign
/// flip between plies is already in the perspectives.
pub fn judge(last_eval: i32, current_eval: i32) -> Judgement {
    let cp_loss = current_eval
        .saturating_add(last_eval)
        .clamp(0, MAX_CP_LOSS);
    let norm_diff = (logistic(current_eval) - logistic(-last_eval)).max(0.0);
    Judgement {
        cp_loss,
        norm_diff,
        quality: classify(norm_diff, cp_loss),
    }
}
