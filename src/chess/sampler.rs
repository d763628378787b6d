//! Stratified player sampling over a single pass of the game stream.
//!
//! A player becomes a candidate the moment their qualifying-game counter
//! first reaches `min_games`. At that instant (and only then) their rating
//! picks a bucket; if the bucket still has quota they are admitted for good.
//! Whatever the buckets leave unfilled is backfilled at random from the
//! remaining candidates.

use log::{debug, info};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use super::filter::is_probable_bot;
use super::game::GameView;
use super::types::{GameRecord, Player};

/// Inclusive rating range with a number of players to admit from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RatingBucket {
    pub min: u32,
    pub max: u32,
    pub quota: u32,
}

impl RatingBucket {
    pub const fn new(min: u32, max: u32, quota: u32) -> Self {
        Self { min, max, quota }
    }

    pub fn contains(&self, rating: u32) -> bool {
        self.min <= rating && rating <= self.max
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub target_total: usize,
    pub min_games: u32,
    pub buckets: Vec<RatingBucket>,
    pub logging_frequency: u64,
}

/// Result of [`PlayerSampler::select`].
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub players: HashSet<String>,
    /// Players admitted through each bucket, parallel to the config.
    pub admitted_per_bucket: Vec<u32>,
    /// Players added by the random backfill step.
    pub backfilled: usize,
    pub games_scanned: u64,
}

impl Selection {
    /// Selected names in lexical order.
    pub fn sorted(&self) -> Vec<String> {
        let mut names: Vec<String> = self.players.iter().cloned().collect();
        names.sort();
        names
    }
}

pub struct PlayerSampler {
    config: SamplerConfig,
    counters: HashMap<String, u32>,
    remaining_quota: Vec<i64>,
    admitted_per_bucket: Vec<u32>,
    selected: HashSet<String>,
    candidates: usize,
}

impl PlayerSampler {
    pub fn new(config: SamplerConfig) -> Self {
        let remaining_quota = config.buckets.iter().map(|b| i64::from(b.quota)).collect();
        let admitted_per_bucket = vec![0; config.buckets.len()];
        Self {
            config,
            counters: HashMap::new(),
            remaining_quota,
            admitted_per_bucket,
            selected: HashSet::new(),
            candidates: 0,
        }
    }

    /// Players whose counter has reached `min_games` so far.
    pub fn candidates(&self) -> usize {
        self.candidates
    }

    /// Enough candidates overall and every bucket quota used up.
    pub fn is_satisfied(&self) -> bool {
        self.candidates >= self.config.target_total
            && self.remaining_quota.iter().all(|&left| left <= 0)
    }

    /// Count one game that already passed the predicate.
    pub fn observe(&mut self, game: &GameView<'_>) {
        let (white, black) = match game.players() {
            Ok(players) => players,
            Err(err) => {
                debug!("Skipping game in player search: {err}");
                return;
            }
        };

        for player in [white, black] {
            if is_probable_bot(&player) {
                continue;
            }
            self.count(player);
        }
    }

    fn count(&mut self, player: Player) {
        let min_games = self.config.min_games.max(1);
        let counter = self.counters.entry(player.name.clone()).or_insert(0);
        *counter += 1;
        if *counter != min_games {
            return;
        }

        self.candidates += 1;
        let Some(idx) = self
            .config
            .buckets
            .iter()
            .position(|bucket| bucket.contains(player.rating))
        else {
            return;
        };

        self.remaining_quota[idx] -= 1;
        if self.remaining_quota[idx] >= 0 {
            self.admitted_per_bucket[idx] += 1;
            self.selected.insert(player.name);
        }
    }

    /// Scan `games` once, then backfill. Stops reading as soon as
    /// [`Self::is_satisfied`] holds.
    pub fn select<I, P, R>(mut self, games: I, predicate: P, rng: &mut R) -> Selection
    where
        I: IntoIterator<Item = GameRecord>,
        P: Fn(&GameView<'_>) -> bool,
        R: Rng + ?Sized,
    {
        info!("[ Search for players started ]");

        let mut games_scanned = 0u64;
        for record in games {
            games_scanned += 1;
            let game = record.view();
            if predicate(&game) {
                self.observe(&game);
            }

            if self.is_satisfied() {
                break;
            }

            if self.config.logging_frequency > 0
                && games_scanned.is_multiple_of(self.config.logging_frequency)
            {
                info!(
                    "Processed {games_scanned} games, found {} players...",
                    self.candidates
                );
            }
        }

        info!("[ Search for players ended ]");

        let backfilled = self.backfill(rng);
        Selection {
            players: self.selected,
            admitted_per_bucket: self.admitted_per_bucket,
            backfilled,
            games_scanned,
        }
    }

    fn backfill<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        if self.selected.len() >= self.config.target_total {
            return 0;
        }

        let min_games = self.config.min_games.max(1);
        let mut rest: Vec<&String> = self
            .counters
            .iter()
            .filter(|(name, count)| **count >= min_games && !self.selected.contains(*name))
            .map(|(name, _)| name)
            .collect();
        rest.sort();
        rest.shuffle(rng);

        let needed = self.config.target_total - self.selected.len();
        let picked: Vec<String> = rest.into_iter().take(needed).cloned().collect();
        let added = picked.len();
        self.selected.extend(picked);
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn game(white: (&str, u32), black: (&str, u32)) -> GameRecord {
        GameRecord {
            headers: vec![
                ("White".into(), white.0.into()),
                ("Black".into(), black.0.into()),
                ("WhiteElo".into(), white.1.to_string()),
                ("BlackElo".into(), black.1.to_string()),
            ],
            ..Default::default()
        }
    }

    fn config(target_total: usize, min_games: u32, buckets: Vec<RatingBucket>) -> SamplerConfig {
        SamplerConfig {
            target_total,
            min_games,
            buckets,
            logging_frequency: 0,
        }
    }

    fn run(config: SamplerConfig, games: Vec<GameRecord>) -> Selection {
        let mut rng = StdRng::seed_from_u64(7);
        PlayerSampler::new(config).select(games, |_| true, &mut rng)
    }

    #[test]
    fn test_bucket_admission_happens_at_qualification() {
        let games = vec![
            game(("low", 900), ("high", 2000)),
            game(("low", 1900), ("high", 2000)),
        ];
        let selection = run(
            config(
                2,
                2,
                vec![RatingBucket::new(0, 1000, 1), RatingBucket::new(1800, 2100, 1)],
            ),
            games,
        );

        // "low" qualified at 1900 and took the second bucket's only slot;
        // "high" qualified later and only got in through backfill.
        assert_eq!(selection.admitted_per_bucket, vec![0, 1]);
        assert_eq!(selection.backfilled, 1);
        assert_eq!(selection.sorted(), vec!["high", "low"]);
    }

    #[test]
    fn test_bucket_quota_is_never_exceeded() {
        let games = vec![
            game(("a", 1500), ("b", 1500)),
            game(("c", 1500), ("d", 1500)),
        ];
        let selection = run(config(1, 1, vec![RatingBucket::new(1400, 1700, 1)]), games);

        assert_eq!(selection.admitted_per_bucket, vec![1]);
        assert_eq!(selection.players.len(), 1);
        assert!(selection.players.contains("a"));
    }

    #[test]
    fn test_first_matching_bucket_wins_on_overlap() {
        let games = vec![game(("edge", 1000), ("other", 3500))];
        let selection = run(
            config(
                1,
                1,
                vec![RatingBucket::new(0, 1000, 5), RatingBucket::new(1000, 1300, 5)],
            ),
            games,
        );

        assert_eq!(selection.admitted_per_bucket, vec![1, 0]);
    }

    #[test]
    fn test_every_selected_player_has_min_games() {
        let games = vec![
            game(("a", 1200), ("b", 1200)),
            game(("a", 1200), ("c", 1200)),
            game(("b", 1200), ("d", 1200)),
            game(("a", 1200), ("b", 1200)),
        ];
        let selection = run(config(10, 2, vec![RatingBucket::new(0, 3000, 1)]), games);

        // a: 3, b: 3, c: 1, d: 1
        assert_eq!(selection.sorted(), vec!["a", "b"]);
        assert_eq!(selection.backfilled, 1);
    }

    #[test]
    fn test_early_stop_requires_total_and_bucket_coverage() {
        let games = vec![
            game(("a", 1500), ("b", 1500)),
            game(("c", 900), ("d", 1500)),
            game(("e", 1500), ("f", 1500)),
        ];
        let selection = run(
            config(
                2,
                1,
                vec![RatingBucket::new(1400, 1700, 2), RatingBucket::new(0, 1000, 1)],
            ),
            games,
        );

        // Two candidates after the first game, but the low bucket is still open.
        assert_eq!(selection.games_scanned, 2);
        assert_eq!(selection.admitted_per_bucket, vec![2, 1]);
        assert_eq!(selection.sorted(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_without_buckets_stops_at_target() {
        let games = vec![
            game(("a", 1500), ("b", 1500)),
            game(("c", 1500), ("d", 1500)),
        ];
        let selection = run(config(2, 1, Vec::new()), games);

        assert_eq!(selection.games_scanned, 1);
        assert_eq!(selection.sorted(), vec!["a", "b"]);
    }

    #[test]
    fn test_backfill_is_seeded_and_bounded() {
        let games: Vec<GameRecord> = (0..20)
            .map(|i| game((&format!("w{i}"), 1500), (&format!("b{i}"), 1500)))
            .collect();
        let cfg = config(5, 1, vec![RatingBucket::new(0, 100, 1)]);

        let first = run(cfg.clone(), games.clone());
        let second = run(cfg, games);

        assert_eq!(first.players.len(), 5);
        assert_eq!(first.backfilled, 5);
        assert_eq!(first.players, second.players);
    }

    #[test]
    fn test_bots_and_malformed_games_are_ignored() {
        let mut malformed = game(("x", 1500), ("y", 1500));
        malformed.headers.retain(|(k, _)| k != "BlackElo");
        let games = vec![game(("LeelaBot", 1500), ("human", 1500)), malformed];
        let selection = run(config(5, 1, Vec::new()), games);

        assert_eq!(selection.sorted(), vec!["human"]);
    }

    #[test]
    fn test_predicate_filters_games() {
        let games = vec![
            game(("a", 1500), ("b", 1500)),
            game(("c", 1500), ("d", 1500)),
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let selection = PlayerSampler::new(config(10, 1, Vec::new())).select(
            games,
            |g| g.player(shakmaty::Color::White).is_ok_and(|p| p.name == "c"),
            &mut rng,
        );

        assert_eq!(selection.sorted(), vec!["c", "d"]);
    }
}
