use shakmaty::uci::UciMove;
use shakmaty::zobrist::Zobrist64;
use shakmaty::{
    CastlingMode, Chess, EnPassantMode, File, Move, Position, Rank, Role, Square,
};
use smallvec::SmallVec;
use std::fs;
use std::path::Path;

use super::error::{Error, Result};

pub type BookMoves = SmallVec<[UciMove; 8]>;

/// Source of known opening moves for a position.
pub trait OpeningBook {
    fn book_moves(&self, pos: &Chess) -> BookMoves;

    fn contains(&self, pos: &Chess, m: &Move) -> bool {
        let moves = self.book_moves(pos);
        if moves.is_empty() {
            return false;
        }
        // Book encodings differ on castling (king-takes-rook vs. king-two-squares).
        let king_takes_rook = m.to_uci(CastlingMode::Chess960);
        let standard = m.to_uci(CastlingMode::Standard);
        moves.iter().any(|b| *b == king_takes_rook || *b == standard)
    }
}

const ENTRY_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BookEntry {
    key: u64,
    raw_move: u16,
    weight: u16,
}

/// Polyglot `.bin` book, loaded into memory and sorted by position key.
#[derive(Debug, Default)]
pub struct PolyglotBook {
    entries: Vec<BookEntry>,
}

impl PolyglotBook {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes).map_err(|reason| Error::Book {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() % ENTRY_SIZE != 0 {
            return Err(format!(
                "size {} is not a multiple of {ENTRY_SIZE}",
                bytes.len()
            ));
        }

        let mut entries: Vec<BookEntry> = bytes
            .chunks_exact(ENTRY_SIZE)
            .map(|chunk| BookEntry {
                key: u64::from_be_bytes(chunk[0..8].try_into().unwrap_or_default()),
                raw_move: u16::from_be_bytes([chunk[8], chunk[9]]),
                weight: u16::from_be_bytes([chunk[10], chunk[11]]),
            })
            .collect();
        entries.sort_by_key(|e| e.key);

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Polyglot position key.
pub fn polyglot_key(pos: &Chess) -> u64 {
    let hash: Zobrist64 = pos.zobrist_hash(EnPassantMode::PseudoLegal);
    hash.0
}

fn decode_move(raw: u16) -> Option<UciMove> {
    let square = |file: u16, rank: u16| {
        Square::from_coords(File::new(u32::from(file & 7)), Rank::new(u32::from(rank & 7)))
    };
    let to = square(raw, raw >> 3);
    let from = square(raw >> 6, raw >> 9);
    let promotion = match (raw >> 12) & 7 {
        0 => None,
        1 => Some(Role::Knight),
        2 => Some(Role::Bishop),
        3 => Some(Role::Rook),
        4 => Some(Role::Queen),
        _ => return None,
    };
    Some(UciMove::Normal {
        from,
        to,
        promotion,
    })
}

impl OpeningBook for PolyglotBook {
    fn book_moves(&self, pos: &Chess) -> BookMoves {
        let key = polyglot_key(pos);
        let start = self.entries.partition_point(|e| e.key < key);
        self.entries[start..]
            .iter()
            .take_while(|e| e.key == key)
            .filter(|e| e.weight > 0)
            .filter_map(|e| decode_move(e.raw_move))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::san::San;

    const START_KEY: u64 = 0x463b_9618_1691_fc9c;
    const AFTER_E4_KEY: u64 = 0x823c_9b50_fd11_4196;

    fn entry(key: u64, raw_move: u16, weight: u16) -> [u8; ENTRY_SIZE] {
        let mut out = [0u8; ENTRY_SIZE];
        out[0..8].copy_from_slice(&key.to_be_bytes());
        out[8..10].copy_from_slice(&raw_move.to_be_bytes());
        out[10..12].copy_from_slice(&weight.to_be_bytes());
        out
    }

    fn encode(from: Square, to: Square) -> u16 {
        let part = |sq: Square| ((sq.rank() as u16) << 3) | (sq.file() as u16);
        (part(from) << 6) | part(to)
    }

    fn play(pos: &Chess, san: &str) -> (Chess, Move) {
        let m = san.parse::<San>().unwrap().to_move(pos).unwrap();
        let mut next = pos.clone();
        next.play_unchecked(m.clone());
        (next, m)
    }

    #[test]
    fn test_keys_match_polyglot_reference() {
        let start = Chess::default();
        assert_eq!(polyglot_key(&start), START_KEY);

        let (after_e4, _) = play(&start, "e4");
        assert_eq!(polyglot_key(&after_e4), AFTER_E4_KEY);
    }

    #[test]
    fn test_lookup_returns_moves_for_position() {
        let mut bytes = Vec::new();
        bytes.extend(entry(AFTER_E4_KEY, encode(Square::C7, Square::C5), 10));
        bytes.extend(entry(START_KEY, encode(Square::E2, Square::E4), 20));
        bytes.extend(entry(START_KEY, encode(Square::D2, Square::D4), 15));
        let book = PolyglotBook::from_bytes(&bytes).unwrap();

        let start = Chess::default();
        assert_eq!(book.book_moves(&start).len(), 2);

        let (_, e4) = play(&start, "e4");
        let (_, a4) = play(&start, "a4");
        assert!(book.contains(&start, &e4));
        assert!(!book.contains(&start, &a4));
    }

    #[test]
    fn test_zero_weight_entries_are_ignored() {
        let bytes = entry(START_KEY, encode(Square::E2, Square::E4), 0);
        let book = PolyglotBook::from_bytes(&bytes).unwrap();

        assert!(book.book_moves(&Chess::default()).is_empty());
    }

    #[test]
    fn test_truncated_book_is_rejected() {
        let mut bytes = entry(START_KEY, encode(Square::E2, Square::E4), 1).to_vec();
        bytes.pop();

        assert!(PolyglotBook::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_decode_promotion() {
        let raw = encode(Square::A7, Square::A8) | (4 << 12);
        assert_eq!(
            decode_move(raw),
            Some(UciMove::Normal {
                from: Square::A7,
                to: Square::A8,
                promotion: Some(Role::Queen),
            })
        );
    }
}
