//! Second stage: copy the games of the selected players into a plain PGN file.

use log::info;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use super::error::Result;
use super::game::GameView;
use super::types::GameRecord;

/// Outcome of one extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractSummary {
    pub games_scanned: u64,
    pub games_saved: u64,
    /// Players whose counter reached the games-per-player target.
    pub players_completed: usize,
}

/// One name per line; blank lines are ignored, surrounding whitespace trimmed.
pub fn read_player_list<R: BufRead>(input: R) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for line in input.lines() {
        let line = line?;
        let name = line.trim();
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

pub fn write_player_list<W: Write>(names: &[String], mut out: W) -> Result<()> {
    for name in names {
        writeln!(out, "{name}")?;
    }
    out.flush()?;
    Ok(())
}

/// Stream `games` once and write every qualifying game in which at least one
/// listed player is still at or under `games_per_player`. Each game is
/// written at most once. The scan stops as soon as every listed player has
/// reached the target.
pub fn extract_games<I, P, W>(
    games: I,
    players: &[String],
    games_per_player: u32,
    predicate: P,
    out: &mut W,
) -> Result<ExtractSummary>
where
    I: IntoIterator<Item = GameRecord>,
    P: Fn(&GameView<'_>) -> bool,
    W: Write + ?Sized,
{
    let mut counters: HashMap<&str, u32> = players.iter().map(|n| (n.as_str(), 0)).collect();
    let mut summary = ExtractSummary::default();

    info!("[ Searching for games started ]");
    if counters.is_empty() {
        info!("[ Searching for games finished: empty player list ]");
        return Ok(summary);
    }

    for record in games {
        summary.games_scanned += 1;
        let game = record.view();
        if !predicate(&game) {
            continue;
        }

        let mut save = false;
        for key in ["White", "Black"] {
            let Some(name) = record.header(key) else {
                continue;
            };
            let Some(count) = counters.get_mut(name) else {
                continue;
            };
            *count += 1;
            if *count == games_per_player {
                summary.players_completed += 1;
            }
            save |= *count <= games_per_player;
        }

        if save {
            write_game(&record, out)?;
            summary.games_saved += 1;
        }
        if summary.players_completed == counters.len() {
            break;
        }
    }

    out.flush()?;
    info!(
        "[ Searching for games finished: {} saved, {} of {} players complete ]",
        summary.games_saved,
        summary.players_completed,
        counters.len()
    );
    Ok(summary)
}

fn write_game<W: Write + ?Sized>(record: &GameRecord, out: &mut W) -> io::Result<()> {
    out.write_all(record.to_pgn().trim_end().as_bytes())?;
    out.write_all(b"\n\n")
}
