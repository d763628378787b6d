use chess_player_stats::chess::extract::extract_games;
use chess_player_stats::chess::filter::GameFilter;
use chess_player_stats::{
    CompressionMode, DatasetExporter, GameStream, MaxRecords, PlayerSampler, RatingBucket,
    SamplerConfig, StatsConfig, StatsEngine,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::Path;

const CORPUS: &str = r#"[Event "Rated Rapid game"]
[Site "https://lichess.org/aaaaaaaa"]
[White "A"]
[Black "B"]
[Result "1-0"]
[WhiteElo "1500"]
[BlackElo "1600"]
[TimeControl "600+0"]
[Termination "Normal"]

1. e4 { [%eval 0.2] [%clk 0:10:00] } 1... e5 { [%eval 0.2] [%clk 0:09:50] } 2. Nf3 { [%eval 0.2] [%clk 0:09:45] } 2... Nc6 { [%eval 0.3] [%clk 0:09:40] } 3. Bc4 { [%eval 0.3] [%clk 0:09:30] } 3... d6 { [%eval 4.0] [%clk 0:09:00] } 4. Bxf7+ { [%eval 4.0] [%clk 0:09:25] } 4... Ke7 { [%eval 4.0] [%clk 0:08:50] } 1-0

[Event "Rated Blitz game"]
[Site "https://lichess.org/cccccccc"]
[White "A"]
[Black "B"]
[Result "1/2-1/2"]
[WhiteElo "1500"]
[BlackElo "1600"]
[TimeControl "180+0"]

1. d4 { [%eval 0.1] [%clk 0:03:00] } 1/2-1/2

[Event "Rated Rapid game"]
[Site "https://lichess.org/bbbbbbbb"]
[White "B"]
[Black "A"]
[Result "0-1"]
[WhiteElo "1610"]
[BlackElo "1490"]
[TimeControl "600+0"]
[Termination "Normal"]

1. f3 { [%eval -0.5] [%clk 0:10:00] } 1... e5 { [%eval 0.0] [%clk 0:09:55] } 2. g4 { [%eval #-1] [%clk 0:09:50] } 2... Qh4# { [%eval #0] [%clk 0:09:45] } 0-1
"#;

fn write_zstd(path: &Path, text: &str) {
    let compressed = zstd::encode_all(text.as_bytes(), 3).unwrap();
    fs::write(path, compressed).unwrap();
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn test_two_game_corpus_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("corpus.pgn.zst");
    write_zstd(&raw, CORPUS);
    let raw = raw.to_string_lossy().into_owned();
    let filter = GameFilter::default();

    // Stage 1: both players reach two rapid 10+0 games; the blitz game is ignored.
    let sampler = PlayerSampler::new(SamplerConfig {
        target_total: 2,
        min_games: 2,
        buckets: vec![
            RatingBucket::new(1400, 1700, 1),
            RatingBucket::new(1800, 2100, 1),
        ],
        logging_frequency: 0,
    });
    let stream = GameStream::open(&raw, None, MaxRecords::ALL).unwrap();
    let selection = sampler.select(stream, |g| filter.matches(g), &mut StdRng::seed_from_u64(1));
    let players = selection.sorted();

    assert_eq!(players, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(selection.admitted_per_bucket, vec![1, 0]);
    assert_eq!(selection.backfilled, 1);

    // Stage 2: extract the qualifying games into plain PGN.
    let games_path = dir.path().join("games.pgn");
    let mut out = Vec::new();
    let stream = GameStream::open(&raw, Some(CompressionMode::Zstd), MaxRecords::ALL).unwrap();
    let summary = extract_games(stream, &players, 2, |g| filter.matches(g), &mut out).unwrap();
    fs::write(&games_path, out).unwrap();

    assert_eq!(summary.games_saved, 2);
    assert_eq!(summary.players_completed, 2);

    // Stage 3: replay and aggregate.
    let stream = GameStream::open(
        &games_path.to_string_lossy(),
        Some(CompressionMode::Plain),
        MaxRecords::ALL,
    )
    .unwrap();
    let stats = StatsEngine::new(
        StatsConfig {
            games_per_player: 2,
            logging_frequency: 0,
        },
        None,
        None,
    )
    .run(stream);

    let a = &stats["A"];
    assert_eq!(a.rating, 1490);
    assert_eq!((a.games, a.wins, a.losses, a.moves), (2, 2, 0, 6));
    // e5 in the second game: 50cp and a 0.27 probability swing.
    assert_eq!(a.cp_loss, 50);
    assert_eq!((a.inaccuracies, a.mistakes, a.blunders), (1, 0, 0));
    assert_close(a.time_in_wins, 50.0);
    assert_close(a.time_in_losses, 0.0);
    assert_close(a.time_on_good_moves, 45.0);
    assert_close(a.time_on_inaccuracies_mistakes, 5.0);
    assert_close(a.time_on_blunders, 0.0);
    assert_eq!(a.nonterminal_results, 1);
    assert_eq!(a.material_imbalance, 2);
    assert_eq!(a.book_moves, 0);

    let b = &stats["B"];
    assert_eq!(b.rating, 1610);
    assert_eq!((b.games, b.wins, b.losses, b.moves), (2, 0, 2, 6));
    // Nc6 10 + d6 370, then f3 70 + g4 1000 (clamped mate swing).
    assert_eq!(b.cp_loss, 1450);
    assert_eq!((b.inaccuracies, b.mistakes, b.blunders), (0, 2, 1));
    assert_close(b.time_in_wins, 0.0);
    assert_close(b.time_in_losses, 80.0);
    assert_close(b.time_on_good_moves, 30.0);
    assert_close(b.time_on_inaccuracies_mistakes, 40.0);
    assert_close(b.time_on_blunders, 10.0);
    assert_eq!(b.nonterminal_results, 1);
    assert_eq!(b.material_imbalance, 2);

    // Export.
    let rows = DatasetExporter::new(600.0).rows(&stats);
    assert_eq!(rows.len(), 2);

    let a = &rows[0];
    assert_eq!((a.name.as_str(), a.elo, a.games), ("A", 1490, 2));
    assert_close(a.avg_moves, 3.0);
    assert_close(a.frac_nonterm, 0.5);
    assert_close(a.avg_cp_loss, 50.0 / 6.0);
    assert_close(a.avg_inacc, 0.5);
    assert_close(a.avg_mist, 0.0);
    assert_close(a.avg_blund, 0.0);
    assert_close(a.frac_time_win, 50.0 / 1200.0);
    assert_close(a.frac_time_loss, 50.0 / 1200.0);
    assert_close(a.avg_time_good, 9.0);
    assert_close(a.avg_time_inaccm, 5.0);
    assert_close(a.avg_time_blund, 0.0);
    assert_close(a.avg_mat_imb_per_mv, 2.0 / 6.0);
    assert_close(a.avg_book_moves, 0.0);

    let b = &rows[1];
    assert_eq!((b.name.as_str(), b.elo, b.games), ("B", 1610, 2));
    assert_close(b.avg_cp_loss, 1450.0 / 6.0);
    assert_close(b.avg_inacc, 0.0);
    assert_close(b.avg_mist, 1.0);
    assert_close(b.avg_blund, 0.5);
    assert_close(b.frac_time_win, 80.0 / 1200.0);
    assert_close(b.frac_time_loss, 80.0 / 1200.0);
    assert_close(b.avg_time_good, 10.0);
    assert_close(b.avg_time_inaccm, 20.0);
    assert_close(b.avg_time_blund, 10.0);
    assert_close(b.avg_mat_imb_per_mv, 2.0 / 6.0);

    // CSV written after the pass.
    let mut csv = Vec::new();
    DatasetExporter::new(600.0).write_csv(&stats, &mut csv).unwrap();
    let csv = String::from_utf8(csv).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.lines().nth(1).unwrap().starts_with("A,1490,2,3.0,0.5,"));
}

#[test]
fn test_max_records_bounds_the_pass() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("corpus.pgn.zst");
    write_zstd(&raw, CORPUS);

    let stream = GameStream::open(&raw.to_string_lossy(), None, MaxRecords(1)).unwrap();
    let stats = StatsEngine::new(
        StatsConfig {
            games_per_player: 1,
            logging_frequency: 0,
        },
        None,
        None,
    )
    .run(stream);

    assert_eq!(stats["A"].games, 1);
    assert_eq!(stats["B"].games, 1);
    assert_eq!(stats["A"].rating, 1500);
}
