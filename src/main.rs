use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chess_player_stats::chess::book::{OpeningBook, PolyglotBook};
use chess_player_stats::chess::engine::{Evaluator, UciEngine};
use chess_player_stats::chess::extract::{extract_games, read_player_list, write_player_list};
use chess_player_stats::chess::survey::TimeControlSurvey;
use chess_player_stats::{
    CompressionMode, Config, DatasetExporter, GameStream, MaxRecords, PlayerSampler,
    SamplerConfig, StatsConfig, StatsEngine,
};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Build a player-level statistics dataset from lichess PGN archives"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, value_name = "PATH", default_value = "config.toml")]
    config: PathBuf,

    /// Compression of the raw archive (`zstd` or `plain`); inferred from the
    /// file extension when omitted
    #[arg(long, value_name = "MODE", value_parser = CompressionMode::parse)]
    compression: Option<CompressionMode>,

    /// Maximum number of games read from the input, or `all`
    #[arg(value_name = "MAX_GAMES")]
    max_games: MaxRecords,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sample players by rating bucket and write their names
    Players,
    /// Copy the sampled players' games into a plain PGN file
    Games,
    /// Replay the extracted games and export per-player rows as CSV
    Dataset,
    /// Print every raw record as one JSON object per line
    Dump,
    /// Count games per common time control
    TimeControls,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::new().filter_or("CHESS_LOG", "info")).init();

    let config = Config::from_toml(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let raw = RawInput {
        config: &config,
        compression: cli.compression,
        max_games: cli.max_games,
    };
    match cli.command {
        Command::Players => players(&raw),
        Command::Games => games(&raw),
        Command::Dataset => dataset(&config, cli.max_games),
        Command::Dump => dump(&raw),
        Command::TimeControls => time_controls(&raw),
    }
}

struct RawInput<'a> {
    config: &'a Config,
    compression: Option<CompressionMode>,
    max_games: MaxRecords,
}

impl RawInput<'_> {
    fn open(&self) -> Result<GameStream> {
        let pattern = &self.config.paths.data_raw;
        GameStream::open(pattern, self.compression, self.max_games)
            .with_context(|| format!("opening {pattern}"))
    }
}

/// Write through `<path>.part` and rename, so a failed pass leaves no output.
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let file = File::create(&partial).with_context(|| format!("creating {}", partial.display()))?;
    let mut out = BufWriter::new(file);
    if let Err(err) = write(&mut out).and_then(|()| out.flush().map_err(Into::into)) {
        drop(out);
        let _ = fs::remove_file(&partial);
        return Err(err);
    }
    drop(out);
    fs::rename(&partial, path).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn players(raw: &RawInput<'_>) -> Result<()> {
    let config = raw.config;
    let stream = raw.open()?;
    let sampler = PlayerSampler::new(SamplerConfig {
        target_total: config.target_size,
        min_games: config.target_gpp,
        buckets: config.rating_buckets.clone(),
        logging_frequency: config.logging_frequency,
    });
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let filter = &config.filter;
    let selection = sampler.select(stream, |game| filter.matches(game), &mut rng);
    let names = selection.sorted();
    info!(
        "Found {} players ({} per bucket, {} backfilled) in {} games",
        names.len(),
        selection
            .admitted_per_bucket
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("/"),
        selection.backfilled,
        selection.games_scanned
    );

    write_atomically(&config.paths.data_players, |out| {
        write_player_list(&names, out).map_err(Into::into)
    })?;
    info!("Saved player list to {}", config.paths.data_players.display());
    Ok(())
}

fn games(raw: &RawInput<'_>) -> Result<()> {
    let config = raw.config;
    let path = &config.paths.data_players;
    info!("[ Reading {} started ]", path.display());
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let names = read_player_list(BufReader::new(file))?;
    info!("[ Reading {} finished: {} players ]", path.display(), names.len());

    let stream = raw.open()?;
    let filter = &config.filter;
    let mut summary = None;
    write_atomically(&config.paths.data_games, |out| {
        summary = Some(extract_games(
            stream,
            &names,
            config.target_gpp,
            |game| filter.matches(game),
            out,
        )?);
        Ok(())
    })?;

    if let Some(summary) = summary {
        info!(
            "Saved {} games to {}",
            summary.games_saved,
            config.paths.data_games.display()
        );
    }
    Ok(())
}

fn dataset(config: &Config, max_games: MaxRecords) -> Result<()> {
    // Collaborators are set up before any game is read.
    let engine: Option<Box<dyn Evaluator>> = match &config.paths.engine {
        Some(path) => Some(Box::new(UciEngine::spawn(path, config.engine_max_depth)?)),
        None => None,
    };
    let book: Option<Box<dyn OpeningBook>> = match &config.paths.opening_book {
        Some(path) => {
            let book = PolyglotBook::open(path)?;
            info!("[ Loaded opening book from {} ({} entries) ]", path.display(), book.len());
            Some(Box::new(book))
        }
        None => None,
    };

    let input = config.paths.data_games.to_string_lossy();
    let stream = GameStream::open(&input, Some(CompressionMode::Plain), max_games)
        .with_context(|| format!("opening {input}"))?;

    let stats = StatsEngine::new(
        StatsConfig {
            games_per_player: config.target_gpp,
            logging_frequency: config.logging_frequency,
        },
        engine,
        book,
    )
    .run(stream);

    let exporter = DatasetExporter::new(config.base_time_seconds);
    write_atomically(&config.paths.data_final, |out| {
        exporter.write_csv(&stats, out)?;
        Ok(())
    })?;
    info!("Saved dataset to {}", config.paths.data_final.display());
    Ok(())
}

fn dump(raw: &RawInput<'_>) -> Result<()> {
    let stream = raw.open()?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for record in stream {
        serde_json::to_writer(&mut out, &record.to_json())?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn time_controls(raw: &RawInput<'_>) -> Result<()> {
    let survey = TimeControlSurvey::collect(raw.open()?);
    print!("{survey}");
    Ok(())
}
