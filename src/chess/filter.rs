use serde::Deserialize;

use super::game::GameView;
use super::types::{Player, TimeControl};

/// Which games count towards sampling and extraction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GameFilter {
    pub tempo: String,
    pub base_minutes: u32,
    pub increment_seconds: u32,
    pub require_eval: bool,
}

impl Default for GameFilter {
    /// Standard rapid 10+0 games that carry engine evaluations.
    fn default() -> Self {
        Self {
            tempo: "rapid".to_string(),
            base_minutes: 10,
            increment_seconds: 0,
            require_eval: true,
        }
    }
}

impl GameFilter {
    pub fn time_control(&self) -> TimeControl {
        TimeControl::new(self.base_minutes, self.increment_seconds)
    }

    /// A game with a malformed header never matches.
    pub fn matches(&self, game: &GameView<'_>) -> bool {
        if !game.is_standard_variant() {
            return false;
        }
        if self.require_eval && !game.has_eval() {
            return false;
        }
        let tempo_ok = game
            .tempo()
            .is_ok_and(|tempo| tempo.eq_ignore_ascii_case(&self.tempo));
        tempo_ok && game.time_control() == Ok(self.time_control())
    }
}

/// Name- and title-based guess at whether an account is an engine.
pub fn is_probable_bot(player: &Player) -> bool {
    if player
        .title
        .as_deref()
        .is_some_and(|title| title.eq_ignore_ascii_case("BOT"))
    {
        return true;
    }
    let name = player.name.to_ascii_lowercase();
    name.starts_with("bot") || name.ends_with("bot")
}
