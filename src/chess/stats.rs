//! Per-player aggregation over replayed games.
//!
//! Each game's mainline is replayed on a [`Chess`] position. Per ply the
//! mover's clock usage is attributed, the move is checked against the
//! opening book, judged from the evaluation delta, and the material
//! imbalance after it is added to both players.

use log::{info, warn};
use shakmaty::{Board, ByColor, Chess, Color, Position, Role};
use std::collections::{BTreeMap, HashMap};

use super::book::OpeningBook;
use super::classify::{MATE_SCORE, MoveQuality, STARTING_EVAL, judge};
use super::engine::Evaluator;
use super::error::GameError;
use super::types::GameRecord;

/// Book lookups stop after this (0-based) ply.
pub const BOOK_MAX_PLY: usize = 30;

const PIECE_VALUES: [(Role, u32); 5] = [
    (Role::Pawn, 1),
    (Role::Knight, 3),
    (Role::Bishop, 3),
    (Role::Rook, 5),
    (Role::Queen, 9),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerAggregate {
    pub name: String,
    /// Rating in the game where the counter hit the games-per-player threshold.
    pub rating: u32,

    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub moves: u32,

    pub cp_loss: i64,
    pub inaccuracies: u32,
    pub mistakes: u32,
    pub blunders: u32,

    /// Seconds.
    pub time_in_wins: f64,
    pub time_in_losses: f64,
    pub time_on_good_moves: f64,
    pub time_on_inaccuracies_mistakes: f64,
    pub time_on_blunders: f64,

    /// Neither checkmate nor stalemate: draws by agreement and resignations.
    pub nonterminal_results: u32,
    pub material_imbalance: u64,
    pub book_moves: u32,
}

#[derive(Debug, Clone)]
pub struct StatsConfig {
    pub games_per_player: u32,
    pub logging_frequency: u64,
}

/// Sum of standard piece weights for `color`.
pub fn material(board: &Board, color: Color) -> u32 {
    PIECE_VALUES
        .iter()
        .map(|&(role, weight)| (board.by_role(role) & board.by_color(color)).count() as u32 * weight)
        .sum()
}

pub fn material_imbalance(board: &Board) -> u32 {
    material(board, Color::White).abs_diff(material(board, Color::Black))
}

pub struct StatsEngine {
    config: StatsConfig,
    engine: Option<Box<dyn Evaluator>>,
    book: Option<Box<dyn OpeningBook>>,
    index: HashMap<String, usize>,
    players: Vec<PlayerAggregate>,
    games_processed: u64,
    games_failed: u64,
}

impl StatsEngine {
    pub fn new(
        config: StatsConfig,
        engine: Option<Box<dyn Evaluator>>,
        book: Option<Box<dyn OpeningBook>>,
    ) -> Self {
        Self {
            config,
            engine,
            book,
            index: HashMap::new(),
            players: Vec::new(),
            games_processed: 0,
            games_failed: 0,
        }
    }

    pub fn games_processed(&self) -> u64 {
        self.games_processed
    }

    pub fn games_failed(&self) -> u64 {
        self.games_failed
    }

    fn slot(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.players.len();
        self.players.push(PlayerAggregate::default());
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Fold one game into the aggregates. Headers are resolved before
    /// anything is counted; an illegal move aborts the rest of the game.
    pub fn process_game(&mut self, record: &GameRecord) -> Result<(), GameError> {
        self.games_processed += 1;

        let game = record.view();
        let (white, black) = game.players()?;
        let result = game.result()?;
        let time_control = game.time_control()?;

        let slots = ByColor {
            white: self.slot(&white.name),
            black: self.slot(&black.name),
        };
        let snapshot_at = self.config.games_per_player.max(1);
        for (idx, player) in [(slots.white, &white), (slots.black, &black)] {
            let agg = &mut self.players[idx];
            agg.games += 1;
            if agg.games == snapshot_at {
                agg.name = player.name.clone();
                agg.rating = player.rating;
            }
        }
        if let Some(winner) = result.winner() {
            self.players[*slots.get(winner)].wins += 1;
            self.players[*slots.get(!winner)].losses += 1;
        }

        let StatsEngine {
            engine,
            book,
            players,
            ..
        } = self;
        let mut engine = engine.as_deref_mut();
        let book = book.as_deref();

        let increment = f64::from(time_control.increment_seconds);
        let base = f64::from(time_control.base_seconds());
        let mut clocks = ByColor {
            white: base,
            black: base,
        };
        let mut last_eval = STARTING_EVAL;
        let mut pos = Chess::default();

        for (ply, mv) in game.moves().iter().enumerate() {
            let mover = pos.turn();
            let m = mv
                .san
                .san
                .to_move(&pos)
                .map_err(|_| GameError::IllegalMove {
                    ply,
                    san: mv.san.to_string(),
                })?;

            let agg = &mut players[*slots.get(mover)];
            agg.moves += 1;

            let mut spent = 0.0;
            if let Some(clock_after) = mv.clock {
                spent = *clocks.get(mover) + increment - clock_after;
                match result.winner() {
                    Some(winner) if winner == mover => agg.time_in_wins += spent,
                    Some(_) => agg.time_in_losses += spent,
                    None => {}
                }
                *clocks.get_mut(mover) = clock_after;
            }

            if ply <= BOOK_MAX_PLY
                && let Some(book) = book
                && book.contains(&pos, &m)
            {
                agg.book_moves += 1;
            }

            pos.play_unchecked(m);

            let current_eval = match (mv.eval, engine.as_mut()) {
                (Some(eval), _) => Ok(eval.score(pos.turn(), MATE_SCORE)),
                (None, Some(engine)) => engine.evaluate(&pos, MATE_SCORE),
                (None, None) => Ok(last_eval),
            };

            match current_eval {
                Ok(current_eval) => {
                    let judgement = judge(last_eval, current_eval);
                    agg.cp_loss += i64::from(judgement.cp_loss);
                    match judgement.quality {
                        MoveQuality::Blunder => {
                            agg.blunders += 1;
                            agg.time_on_blunders += spent;
                        }
                        MoveQuality::Mistake => {
                            agg.mistakes += 1;
                            agg.time_on_inaccuracies_mistakes += spent;
                        }
                        MoveQuality::Inaccuracy => {
                            agg.inaccuracies += 1;
                            agg.time_on_inaccuracies_mistakes += spent;
                        }
                        MoveQuality::Good => agg.time_on_good_moves += spent,
                    }
                    last_eval = current_eval;
                }
                Err(err) => warn!("Engine analysis error at ply {ply}: {err}"),
            }

            let imbalance = u64::from(material_imbalance(pos.board()));
            players[slots.white].material_imbalance += imbalance;
            players[slots.black].material_imbalance += imbalance;
        }

        // Time forfeits are assumed absent from the corpus.
        if !pos.is_checkmate() && !pos.is_stalemate() {
            players[slots.white].nonterminal_results += 1;
            players[slots.black].nonterminal_results += 1;
        }

        Ok(())
    }

    /// Process every game, then [`finish`](Self::finish).
    pub fn run<I>(mut self, games: I) -> BTreeMap<String, PlayerAggregate>
    where
        I: IntoIterator<Item = GameRecord>,
    {
        info!("[ Computing player statistics started ]");
        for record in games {
            if let Err(err) = self.process_game(&record) {
                self.games_failed += 1;
                let id = record.view().id().unwrap_or("?");
                warn!("Skipping rest of game {id}: {err}");
            }

            let processed = self.games_processed;
            if self.config.logging_frequency > 0
                && processed.is_multiple_of(self.config.logging_frequency)
            {
                info!("[ Processed {processed} games... ]");
            }
        }
        info!(
            "[ Computing player statistics finished: {} games, {} abandoned ]",
            self.games_processed, self.games_failed
        );
        self.finish()
    }

    /// Release the collaborators and keep players with enough games.
    pub fn finish(self) -> BTreeMap<String, PlayerAggregate> {
        let StatsEngine {
            config,
            engine,
            book,
            index,
            mut players,
            ..
        } = self;
        drop(engine);
        drop(book);

        index
            .into_iter()
            .filter_map(|(name, idx)| {
                let agg = std::mem::take(&mut players[idx]);
                (agg.games >= config.games_per_player).then_some((name, agg))
            })
            .collect()
    }
}
