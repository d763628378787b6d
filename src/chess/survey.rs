//! How often the common lichess time controls appear in a sample.

use log::info;
use std::collections::BTreeMap;
use std::fmt;

use super::types::{GameRecord, TimeControl};

/// Candidates worth collecting a dataset for.
pub const CANDIDATES: [(&str, TimeControl); 6] = [
    ("blitz", TimeControl::new(3, 0)),
    ("blitz", TimeControl::new(3, 2)),
    ("blitz", TimeControl::new(5, 3)),
    ("rapid", TimeControl::new(10, 0)),
    ("rapid", TimeControl::new(10, 5)),
    ("rapid", TimeControl::new(15, 10)),
];

/// Game counts per `"<tempo> <m>+<i>"` label, sorted by label. Candidates
/// that never occurred are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeControlSurvey {
    pub counts: BTreeMap<String, u64>,
    pub games_scanned: u64,
}

impl TimeControlSurvey {
    pub fn collect<I>(games: I) -> Self
    where
        I: IntoIterator<Item = GameRecord>,
    {
        let mut survey = Self::default();
        for record in games {
            survey.games_scanned += 1;
            let game = record.view();
            let (Ok(tempo), Ok(time_control)) = (game.tempo(), game.time_control()) else {
                continue;
            };
            if let Some((label, tc)) = CANDIDATES
                .iter()
                .find(|(t, tc)| *t == tempo && *tc == time_control)
            {
                *survey.counts.entry(format!("{label} {tc}")).or_default() += 1;
            }
        }
        info!(
            "Time-control survey: {} of {} games matched a candidate",
            survey.counts.values().sum::<u64>(),
            survey.games_scanned
        );
        survey
    }
}

impl fmt::Display for TimeControlSurvey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<16}{:>12}", "time control", "games")?;
        for (label, count) in &self.counts {
            writeln!(f, "{label:<16}{count:>12}")?;
        }
        Ok(())
    }
}
