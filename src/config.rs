use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::chess::error::{Error, Result};
use crate::chess::filter::GameFilter;
use crate::chess::sampler::RatingBucket;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Config {
    /// Players to sample.
    #[serde(default = "defaults::target_size")]
    pub target_size: usize,
    /// Games per player, both for qualifying and for extraction.
    #[serde(default = "defaults::target_gpp")]
    pub target_gpp: u32,
    #[serde(default = "defaults::engine_max_depth")]
    pub engine_max_depth: u32,
    #[serde(default = "defaults::logging_frequency")]
    pub logging_frequency: u64,
    /// Backfill shuffle seed; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "defaults::base_time_seconds")]
    pub base_time_seconds: f64,

    pub paths: Paths,

    #[serde(default)]
    pub filter: GameFilter,

    #[serde(default = "defaults::rating_buckets")]
    pub rating_buckets: Vec<RatingBucket>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Paths {
    /// Raw archive, a path or glob.
    pub data_raw: String,
    #[serde(default = "defaults::data_players")]
    pub data_players: PathBuf,
    #[serde(default = "defaults::data_games")]
    pub data_games: PathBuf,
    #[serde(default = "defaults::data_final")]
    pub data_final: PathBuf,
    /// Polyglot `.bin` book.
    #[serde(default)]
    pub opening_book: Option<PathBuf>,
    /// UCI engine executable.
    #[serde(default)]
    pub engine: Option<PathBuf>,
}

impl Config {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if let Some(bucket) = self.rating_buckets.iter().find(|b| b.min > b.max) {
            return Err(Error::Config(format!(
                "rating bucket min {} exceeds max {}",
                bucket.min, bucket.max
            )));
        }
        if !self.base_time_seconds.is_finite() || self.base_time_seconds <= 0.0 {
            return Err(Error::Config(format!(
                "base_time_seconds must be positive, got {}",
                self.base_time_seconds
            )));
        }
        Ok(())
    }
}

mod defaults {
    use super::*;

    pub fn target_size() -> usize { 4500 }
    pub fn target_gpp() -> u32 { 10 }
    pub fn engine_max_depth() -> u32 { 10 }
    pub fn logging_frequency() -> u64 { 1000 }
    pub fn base_time_seconds() -> f64 { 600.0 }
    pub fn data_players() -> PathBuf { PathBuf::from("players.txt") }
    pub fn data_games() -> PathBuf { PathBuf::from("games.pgn") }
    pub fn data_final() -> PathBuf { PathBuf::from("dataset.csv") }

    pub fn rating_buckets() -> Vec<RatingBucket> {
        vec![
            RatingBucket::new(0, 1000, 1000),
            RatingBucket::new(1000, 1300, 1000),
            RatingBucket::new(1400, 1700, 1000),
            RatingBucket::new(1800, 2100, 1000),
            RatingBucket::new(2200, 2500, 500),
            RatingBucket::new(2500, 3000, 10),
        ]
    }
}
