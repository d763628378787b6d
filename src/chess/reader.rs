use super::error::{Error, Result};
use super::types::GameRecord;
use super::visitor::GameVisitor;

use log::{info, warn};
use pgn_reader::Reader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use zstd::stream::read::Decoder as ZstdDecoder;

/// Size of each read from the underlying file.
pub const READ_CHUNK_SIZE: usize = 1 << 16;

pub type PgnInput = Box<dyn Read + Send>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionMode {
    Plain,
    Zstd,
}

impl CompressionMode {
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim();
        if normalized.eq_ignore_ascii_case("zstd") || normalized.eq_ignore_ascii_case("zst") {
            Ok(Self::Zstd)
        } else if normalized.eq_ignore_ascii_case("plain") || normalized.eq_ignore_ascii_case("none")
        {
            Ok(Self::Plain)
        } else {
            Err(Error::Config(format!(
                "Invalid compression value '{normalized}'. Supported values: 'zstd' or 'plain'."
            )))
        }
    }

    /// `.zst` means zstd, anything else is read as plain PGN.
    pub fn infer(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("zst") => Self::Zstd,
            _ => Self::Plain,
        }
    }
}

/// Upper bound on records yielded by a [`GameStream`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MaxRecords(pub u64);

impl MaxRecords {
    pub const ALL: Self = Self(u64::MAX);
}

impl FromStr for MaxRecords {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::ALL);
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| format!("expected a game count or 'all', got '{s}'"))
    }
}

/// Expand a single path or a glob pattern into the list of input files.
pub fn resolve_paths(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = if pattern.contains('*') || pattern.contains('?') {
        let mut matched: Vec<PathBuf> = glob::glob(pattern)?
            .filter_map(|entry| entry.ok())
            .collect();
        matched.sort();
        matched
    } else {
        vec![PathBuf::from(pattern)]
    };

    if paths.is_empty() {
        return Err(Error::NoInput(pattern.to_string()));
    }
    Ok(paths)
}

pub fn open_input_stream(path: &Path, compression: CompressionMode) -> Result<PgnInput> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let buffered = BufReader::with_capacity(READ_CHUNK_SIZE, file);

    match compression {
        CompressionMode::Plain => Ok(Box::new(buffered)),
        CompressionMode::Zstd => ZstdDecoder::with_buffer(buffered)
            .map(|decoder| Box::new(decoder) as PgnInput)
            .map_err(|source| Error::Decoder {
                path: path.to_path_buf(),
                source,
            }),
    }
}

struct OpenFile {
    pgn_reader: Reader<PgnInput>,
    path_idx: usize,
    next_game_index: usize,
}

/// Lazily decoded sequence of games over one or more archives.
///
/// Each yielded [`GameRecord`] is an owned copy. A decode failure ends the
/// current file just like EOF does, with a warning, and reading carries on
/// with the next file the pattern matched; the stream ends after the last
/// one. The decoder and file handle are dropped as soon as a file is
/// exhausted, or with the stream.
pub struct GameStream {
    paths: Vec<PathBuf>,
    compression: Option<CompressionMode>,
    current: Option<OpenFile>,
    next_path_idx: usize,
    visitor: GameVisitor,
    remaining: u64,
    yielded: u64,
}

impl GameStream {
    /// Open `pattern` (a path or glob). `compression = None` infers it per
    /// file from the extension. Failing to open the first file is fatal.
    pub fn open(
        pattern: &str,
        compression: Option<CompressionMode>,
        max_records: MaxRecords,
    ) -> Result<Self> {
        let paths = resolve_paths(pattern)?;
        let mode = compression.unwrap_or_else(|| CompressionMode::infer(&paths[0]));
        let input = open_input_stream(&paths[0], mode)?;
        info!("Reading {} started...", paths[0].display());

        Ok(Self {
            current: Some(OpenFile {
                pgn_reader: Reader::new(input),
                path_idx: 0,
                next_game_index: 1,
            }),
            paths,
            compression,
            next_path_idx: 1,
            visitor: GameVisitor::new(),
            remaining: max_records.0,
            yielded: 0,
        })
    }

    /// Stream over an in-memory or already-opened source.
    pub fn from_reader(input: PgnInput, max_records: MaxRecords) -> Self {
        Self {
            current: Some(OpenFile {
                pgn_reader: Reader::new(input),
                path_idx: 0,
                next_game_index: 1,
            }),
            paths: vec![PathBuf::from("<memory>")],
            compression: Some(CompressionMode::Plain),
            next_path_idx: 1,
            visitor: GameVisitor::new(),
            remaining: max_records.0,
            yielded: 0,
        }
    }

    /// Number of records handed out so far.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    fn advance_file(&mut self) -> bool {
        while self.next_path_idx < self.paths.len() {
            let path_idx = self.next_path_idx;
            self.next_path_idx += 1;

            let path = &self.paths[path_idx];
            let mode = self
                .compression
                .unwrap_or_else(|| CompressionMode::infer(path));
            match open_input_stream(path, mode) {
                Ok(input) => {
                    info!("Reading {} started...", path.display());
                    self.current = Some(OpenFile {
                        pgn_reader: Reader::new(input),
                        path_idx,
                        next_game_index: 1,
                    });
                    return true;
                }
                Err(err) => warn!("{err}"),
            }
        }
        false
    }

    fn finish_current(&mut self) {
        if let Some(file) = self.current.take() {
            info!("Reading {} finished...", self.paths[file.path_idx].display());
        }
    }
}

impl Iterator for GameStream {
    type Item = GameRecord;

    fn next(&mut self) -> Option<GameRecord> {
        if self.remaining == 0 {
            self.finish_current();
            return None;
        }

        loop {
            if self.current.is_none() && !self.advance_file() {
                return None;
            }
            let file = self.current.as_mut()?;

            let game_index = file.next_game_index;
            match file.pgn_reader.read_game(&mut self.visitor) {
                Ok(Some(())) => {
                    file.next_game_index += 1;
                    if let Some(game) = self.visitor.current_game.take() {
                        self.remaining -= 1;
                        self.yielded += 1;
                        return Some(game);
                    }
                    self.finish_current();
                }
                Ok(None) => self.finish_current(),
                Err(error) => {
                    warn!(
                        "Parser-stage error: stage=read_game; file='{}'; game_index={}; error={}",
                        self.paths[file.path_idx].display(),
                        game_index,
                        error
                    );
                    self.finish_current();
                }
            }
        }
    }
}
