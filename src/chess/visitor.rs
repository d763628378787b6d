use super::annotations;
use super::error::ErrorAccumulator;
use super::types::{GameRecord, MoveRecord};

use pgn_reader::{Outcome, RawComment, RawTag, SanPlus, Skip, Visitor};
use std::fmt::Write;
use std::mem;
use std::ops::ControlFlow;

/// Streaming PGN visitor (pgn-reader).
///
/// Copies every header and the mainline into an owned [`GameRecord`] so the
/// parser's buffers can be reused for the next game. Movetext is rebuilt
/// with move numbers and `{ ... }` comments (whitespace-normalised);
/// variations are skipped. `[%clk]`/`[%eval]` commands in a comment are
/// attached to the ply they follow.
pub struct GameVisitor {
    headers: Vec<(String, String)>,
    moves: Vec<MoveRecord>,
    result_marker: Option<String>,
    parse_error: ErrorAccumulator,
    pub current_game: Option<GameRecord>,
}

impl Default for GameVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl GameVisitor {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
            moves: Vec::new(),
            result_marker: None,
            parse_error: ErrorAccumulator::default(),
            current_game: None,
        }
    }

    fn set_tag(&mut self, key: &[u8], value: RawTag<'_>) {
        let key = String::from_utf8_lossy(key);
        if self.headers.iter().any(|(k, _)| *k == key) {
            return;
        }

        let value = value.decode_utf8_lossy();
        let value = value.trim();
        if value.is_empty() {
            return;
        }

        self.headers.push((key.into_owned(), value.to_string()));
    }

    fn build_game_record(&mut self, movetext: String) {
        let movetext = {
            let trimmed = movetext.trim();
            if trimmed.len() != movetext.len() {
                trimmed.to_string()
            } else {
                movetext
            }
        };

        let outcome = self.result_marker.take().or_else(|| {
            self.headers
                .iter()
                .find(|(k, _)| k == "Result")
                .map(|(_, v)| v.clone())
        });

        self.current_game = Some(GameRecord {
            headers: mem::take(&mut self.headers),
            movetext,
            moves: mem::take(&mut self.moves),
            outcome,
            parse_error: self.parse_error.take(),
        });
    }
}

impl Visitor for GameVisitor {
    type Tags = ();
    type Movetext = String;
    type Output = ();

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        self.headers.clear();
        self.moves.clear();
        self.result_marker = None;
        self.parse_error = ErrorAccumulator::default();
        self.current_game = None;
        ControlFlow::Continue(())
    }

    fn tag(
        &mut self,
        _: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        self.set_tag(key, value);
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, _: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(String::with_capacity(256))
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        if !movetext.is_empty() {
            movetext.push(' ');
        }

        let ply = self.moves.len();
        if ply.is_multiple_of(2) {
            let _ = write!(movetext, "{}. ", (ply / 2) + 1);
        }

        let _ = write!(movetext, "{}", san);
        self.moves.push(MoveRecord::new(san));
        ControlFlow::Continue(())
    }

    fn comment(
        &mut self,
        movetext: &mut Self::Movetext,
        comment: RawComment<'_>,
    ) -> ControlFlow<Self::Output> {
        let comment_str = String::from_utf8_lossy(comment.as_bytes());
        let comment_str = comment_str.trim();

        if let Some(last) = self.moves.last_mut() {
            let parsed = annotations::parse_comment(comment_str, &mut self.parse_error);
            if parsed.clock.is_some() {
                last.clock = parsed.clock;
            }
            if parsed.eval.is_some() {
                last.eval = parsed.eval;
            }
        }

        if !movetext.is_empty() {
            movetext.push(' ');
        }
        movetext.push_str("{ ");
        movetext.push_str(comment_str);
        movetext.push_str(" }");

        ControlFlow::Continue(())
    }

    fn outcome(
        &mut self,
        _movetext: &mut Self::Movetext,
        outcome: Outcome,
    ) -> ControlFlow<Self::Output> {
        self.result_marker = Some(outcome.to_string());
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        self.build_game_record(movetext);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::types::Eval;
    use pgn_reader::Reader;

    fn parse_one(pgn: &str) -> GameRecord {
        let mut reader = Reader::new(pgn.as_bytes());
        let mut visitor = GameVisitor::new();

        reader.read_game(&mut visitor).unwrap();

        visitor.current_game.expect("Should have parsed a game")
    }

    #[test]
    fn test_visitor_basic_parsing() {
        let game = parse_one(
            r#"[Event "Test Game"]
[Site "Internet"]
[Result "1-0"]
1. e4 e5 2. Nf3 1-0"#,
        );

        assert_eq!(game.header("Event"), Some("Test Game"));
        assert_eq!(game.header("Site"), Some("Internet"));
        assert_eq!(game.outcome.as_deref(), Some("1-0"));
        assert_eq!(game.movetext, "1. e4 e5 2. Nf3");
        assert_eq!(game.moves.len(), 3);
        assert_eq!(game.moves[2].san.to_string(), "Nf3");
    }

    #[test]
    fn test_visitor_keeps_every_header_in_order() {
        let game = parse_one(
            r#"[Event "Known"]
[SomeRandomTag "noise"]
[Site "Somewhere"]
1. e4 1-0"#,
        );

        let keys: Vec<&str> = game.headers.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Event", "SomeRandomTag", "Site"]);
    }

    #[test]
    fn test_visitor_duplicate_headers_preserve_first_value() {
        let game = parse_one(
            r#"[Event "First Event"]
[Event "Second Event"]
[WhiteElo "2000"]
[WhiteElo "2500"]
1. e4 1-0"#,
        );

        assert_eq!(game.header("Event"), Some("First Event"));
        assert_eq!(game.header("WhiteElo"), Some("2000"));
    }

    #[test]
    fn test_visitor_attaches_lichess_annotations_to_moves() {
        let game = parse_one(
            r#"[Event "Lichess Annotations"]
1. d4 { [%eval 0.25] [%clk 0:10:00] } Nf6 { [%eval #-3] [%clk 0:09:58] } 2. c4 *"#,
        );

        assert_eq!(game.moves.len(), 3);
        assert_eq!(game.moves[0].eval, Some(Eval::Centipawns(25)));
        assert_eq!(game.moves[0].clock, Some(600.0));
        assert_eq!(game.moves[1].eval, Some(Eval::Mate(-3)));
        assert_eq!(game.moves[1].clock, Some(598.0));
        assert_eq!(game.moves[2].eval, None);
        assert_eq!(
            game.movetext,
            "1. d4 { [%eval 0.25] [%clk 0:10:00] } Nf6 { [%eval #-3] [%clk 0:09:58] } 2. c4"
        );
    }

    #[test]
    fn test_visitor_comment_before_first_move_is_not_an_annotation() {
        let game = parse_one(
            r#"[Event "Comment Test"]
{ [%clk 0:05:00] } 1. e4 e5"#,
        );

        assert_eq!(game.moves[0].clock, None);
        assert_eq!(game.movetext, "{ [%clk 0:05:00] } 1. e4 e5");
    }

    #[test]
    fn test_visitor_skips_variations() {
        let game = parse_one(
            r#"[Event "Variations"]
1. e4 (1. d4 d5) e5 { [%clk 0:01:00] } 2. Nf3 *"#,
        );

        assert_eq!(game.moves.len(), 3);
        assert_eq!(game.moves[1].clock, Some(60.0));
        assert_eq!(game.movetext, "1. e4 e5 { [%clk 0:01:00] } 2. Nf3");
    }

    #[test]
    fn test_visitor_bad_annotation_sets_parse_error() {
        let game = parse_one(
            r#"[Event "Bad"]
1. e4 { [%clk later] } 1-0"#,
        );

        assert_eq!(game.moves[0].clock, None);
        assert_eq!(
            game.parse_error.as_deref(),
            Some("Annotation error: clock in '[%clk later]'")
        );
    }

    #[test]
    fn test_visitor_empty_movetext() {
        let game = parse_one(
            r#"[Event "Empty"]
[Result "*"]
*"#,
        );

        assert_eq!(game.movetext, "");
        assert!(game.moves.is_empty());
        assert_eq!(game.outcome.as_deref(), Some("*"));
    }

    #[test]
    fn test_visitor_state_does_not_leak_between_games() {
        let pgn = r#"[Event "One"]
[White "a"]
1. e4 { [%clk 0:01:00] } 1-0

[Event "Two"]
1. d4 0-1
"#;
        let mut reader = Reader::new(pgn.as_bytes());
        let mut visitor = GameVisitor::new();

        reader.read_game(&mut visitor).unwrap();
        let first = visitor.current_game.take().unwrap();
        reader.read_game(&mut visitor).unwrap();
        let second = visitor.current_game.take().unwrap();

        assert_eq!(first.header("White"), Some("a"));
        assert_eq!(second.header("White"), None);
        assert_eq!(second.moves.len(), 1);
        assert_eq!(second.moves[0].clock, None);
        assert_eq!(second.outcome.as_deref(), Some("0-1"));
    }
}
