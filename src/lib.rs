//! Player-level statistics from lichess PGN archives.
//!
//! The pipeline runs in three passes over the corpus: sample players by
//! rating bucket, extract their games, then replay those games into
//! per-player aggregates exported as CSV rows.

pub mod chess;
pub mod config;

pub use chess::error::{Error, Result};
pub use chess::export::{DatasetExporter, PlayerRow};
pub use chess::game::GameView;
pub use chess::reader::{CompressionMode, GameStream, MaxRecords};
pub use chess::sampler::{PlayerSampler, RatingBucket, SamplerConfig, Selection};
pub use chess::stats::{PlayerAggregate, StatsConfig, StatsEngine};
pub use chess::types::GameRecord;
pub use config::Config;
