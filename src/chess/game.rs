use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use shakmaty::Color;
use std::sync::LazyLock;

use super::error::HeaderError;
use super::types::{GameRecord, GameResult, MoveRecord, Opening, Player, TimeControl};

static LICHESS_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://lichess\.org/([a-zA-Z0-9]+)").expect("valid lichess site regex")
});

/// Read-only accessors over one [`GameRecord`], normalised for lichess
/// exports. Every accessor that needs a header fails with [`HeaderError`]
/// instead of defaulting.
#[derive(Clone, Copy)]
pub struct GameView<'a> {
    record: &'a GameRecord,
}

impl<'a> GameView<'a> {
    pub fn new(record: &'a GameRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &'a GameRecord {
        self.record
    }

    fn required(&self, key: &'static str) -> Result<&'a str, HeaderError> {
        self.record.header(key).ok_or(HeaderError::Missing(key))
    }

    /// Lichess game id: the `GameId` tag, else the path of the `Site` URL.
    pub fn id(&self) -> Result<&'a str, HeaderError> {
        if let Some(id) = self.record.header("GameId") {
            return Ok(id);
        }
        let site = self.required("Site")?;
        LICHESS_ID_RE
            .captures(site)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| HeaderError::Invalid {
                key: "Site",
                value: site.to_string(),
            })
    }

    /// `"Rated Rapid game"` -> `"rapid"`: the event name without its first
    /// and last word, lower-cased.
    pub fn tempo(&self) -> Result<String, HeaderError> {
        let parts: Vec<&str> = self.required("Event")?.split_whitespace().collect();
        if parts.len() < 2 {
            return Ok(String::new());
        }
        Ok(parts[1..parts.len() - 1].join(" ").to_lowercase())
    }

    pub fn time_control(&self) -> Result<TimeControl, HeaderError> {
        self.required("TimeControl")?.parse()
    }

    pub fn opening(&self) -> Result<Opening, HeaderError> {
        Ok(Opening {
            name: self.required("Opening")?.to_string(),
            eco: self.required("ECO")?.to_string(),
        })
    }

    pub fn result(&self) -> Result<GameResult, HeaderError> {
        Ok(GameResult::from_header(self.required("Result")?))
    }

    pub fn termination(&self) -> Option<&'a str> {
        self.record.header("Termination")
    }

    /// `None` or `"Standard"` means regular chess.
    pub fn is_standard_variant(&self) -> bool {
        self.record
            .header("Variant")
            .is_none_or(|v| v.eq_ignore_ascii_case("standard"))
    }

    pub fn player(&self, color: Color) -> Result<Player, HeaderError> {
        let (name_key, elo_key, title_key) = match color {
            Color::White => ("White", "WhiteElo", "WhiteTitle"),
            Color::Black => ("Black", "BlackElo", "BlackTitle"),
        };
        let raw_elo = self.required(elo_key)?;
        let rating = raw_elo.trim().parse().map_err(|_| HeaderError::Invalid {
            key: elo_key,
            value: raw_elo.to_string(),
        })?;

        Ok(Player {
            name: self.required(name_key)?.to_string(),
            rating,
            title: self.record.header(title_key).map(str::to_string),
        })
    }

    /// `(white, black)`.
    pub fn players(&self) -> Result<(Player, Player), HeaderError> {
        Ok((self.player(Color::White)?, self.player(Color::Black)?))
    }

    /// Start of the game from `UTCDate` + `UTCTime` (dotted or dashed date).
    pub fn timestamp(&self) -> Result<DateTime<Utc>, HeaderError> {
        let raw_date = self.required("UTCDate")?;
        let raw_time = self.required("UTCTime")?;

        let date = NaiveDate::parse_from_str(&raw_date.trim().replace('.', "-"), "%Y-%m-%d")
            .map_err(|_| HeaderError::Invalid {
                key: "UTCDate",
                value: raw_date.to_string(),
            })?;
        let time = NaiveTime::parse_from_str(raw_time.trim(), "%H:%M:%S").map_err(|_| {
            HeaderError::Invalid {
                key: "UTCTime",
                value: raw_time.to_string(),
            }
        })?;

        Ok(NaiveDateTime::new(date, time).and_utc())
    }

    pub fn moves(&self) -> &'a [MoveRecord] {
        &self.record.moves
    }

    /// Whether the game was analysed (its first ply carries an `[%eval]`).
    pub fn has_eval(&self) -> bool {
        self.record.moves.first().is_some_and(|m| m.eval.is_some())
    }
}

impl GameRecord {
    pub fn view(&self) -> GameView<'_> {
        GameView::new(self)
    }
}
