//! Normalised per-player rows and the CSV sink.

use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;

use super::error::Result;
use super::stats::PlayerAggregate;

/// One output row. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRow {
    pub name: String,
    pub elo: u32,
    pub games: u32,
    pub avg_moves: f64,
    pub frac_nonterm: f64,
    pub avg_cp_loss: f64,
    pub avg_inacc: f64,
    pub avg_mist: f64,
    pub avg_blund: f64,
    pub frac_time_win: f64,
    pub frac_time_loss: f64,
    pub avg_time_good: f64,
    pub avg_time_inaccm: f64,
    pub avg_time_blund: f64,
    pub avg_mat_imb_per_mv: f64,
    pub avg_book_moves: f64,
}

fn ratio(numerator: f64, denominator: u32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / f64::from(denominator)
    }
}

/// Clock totals are net of time added back (increments, opponent `+15s`),
/// so they can come out negative; an average time never does.
fn time_ratio(seconds: f64, moves: u32) -> f64 {
    ratio(seconds, moves).max(0.0)
}

#[derive(Debug, Clone, Copy)]
pub struct DatasetExporter {
    /// Nominal clock per game, the denominator of the time fractions.
    pub base_time_seconds: f64,
}

impl Default for DatasetExporter {
    fn default() -> Self {
        Self {
            base_time_seconds: 600.0,
        }
    }
}

impl DatasetExporter {
    pub fn new(base_time_seconds: f64) -> Self {
        Self { base_time_seconds }
    }

    /// Share of the nominal clock used per game, within `[0, 1]`. With no games
    /// of this outcome the other outcome's share stands in.
    fn time_fraction(&self, total: f64, games: u32, alt_total: f64, alt_games: u32) -> f64 {
        let fraction = |t: f64, n: u32| {
            if self.base_time_seconds <= 0.0 {
                return 0.0;
            }
            (t / (self.base_time_seconds * f64::from(n))).clamp(0.0, 1.0)
        };
        if games > 0 {
            fraction(total, games)
        } else if alt_games > 0 {
            fraction(alt_total, alt_games)
        } else {
            0.0
        }
    }

    pub fn row(&self, name: &str, p: &PlayerAggregate) -> PlayerRow {
        let classified_bad = p.inaccuracies + p.mistakes + p.blunders;
        let good_moves = p.moves.saturating_sub(classified_bad);

        PlayerRow {
            name: name.to_string(),
            elo: p.rating,
            games: p.games,
            avg_moves: ratio(f64::from(p.moves), p.games),
            frac_nonterm: ratio(f64::from(p.nonterminal_results), p.games),
            avg_cp_loss: ratio(p.cp_loss as f64, p.moves),
            avg_inacc: ratio(f64::from(p.inaccuracies), p.games),
            avg_mist: ratio(f64::from(p.mistakes), p.games),
            avg_blund: ratio(f64::from(p.blunders), p.games),
            frac_time_win: self.time_fraction(p.time_in_wins, p.wins, p.time_in_losses, p.losses),
            frac_time_loss: self.time_fraction(p.time_in_losses, p.losses, p.time_in_wins, p.wins),
            avg_time_good: time_ratio(p.time_on_good_moves, good_moves),
            avg_time_inaccm: time_ratio(
                p.time_on_inaccuracies_mistakes,
                p.inaccuracies + p.mistakes,
            ),
            avg_time_blund: time_ratio(p.time_on_blunders, p.blunders),
            avg_mat_imb_per_mv: ratio(p.material_imbalance as f64, p.moves),
            avg_book_moves: ratio(f64::from(p.book_moves), p.games),
        }
    }

    /// Rows ordered by player name.
    pub fn rows(&self, players: &BTreeMap<String, PlayerAggregate>) -> Vec<PlayerRow> {
        players.iter().map(|(name, p)| self.row(name, p)).collect()
    }

    /// Write a header line plus one row per player.
    pub fn write_csv<W: io::Write>(
        &self,
        players: &BTreeMap<String, PlayerAggregate>,
        out: W,
    ) -> Result<usize> {
        let mut writer = csv::Writer::from_writer(out);
        let mut written = 0;
        for row in self.rows(players) {
            writer.serialize(&row)?;
            written += 1;
        }
        writer.flush()?;
        info!("Exported {written} player rows");
        Ok(written)
    }
}
