use std::fs;
use std::time::{Duration, Instant};

use tapwpm::history::CAPACITY;
use tapwpm::{finalize, CsvHistoryStore, HistoryStore, Mode, ScoreHistory, Session};
use tempfile::tempdir;

#[test]
fn finished_sessions_flow_into_persisted_history() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    let mut history = ScoreHistory::open(CsvHistoryStore::with_path(&path));
    let t0 = Instant::now();

    // eight sessions over the same passage, each finished a bit faster
    for secs in (3..=10).rev() {
        let mut session = Session::new("the cat sat", Mode::Stopwatch).unwrap();
        for c in "the cat sa".chars() {
            session.write(c, t0).unwrap();
        }
        let result = session
            .write('t', t0 + Duration::from_secs(secs))
            .unwrap()
            .unwrap();
        history.record(&result).unwrap();
        assert!(history.records().len() <= CAPACITY);
    }

    let reloaded = ScoreHistory::open(CsvHistoryStore::with_path(&path));
    assert_eq!(reloaded.records(), history.records());
    assert_eq!(reloaded.records().len(), CAPACITY);
    assert!(reloaded
        .records()
        .windows(2)
        .all(|w| w[0].wpm >= w[1].wpm));
    // 11 correct chars in 3s
    assert!((reloaded.high_score() - 44.0).abs() < 1e-9);
}

#[test]
fn roundtrip_preserves_order_for_every_size() {
    for k in 0..=CAPACITY {
        let dir = tempdir().unwrap();
        let store = CsvHistoryStore::with_path(dir.path().join("scores.csv"));
        let mut history = ScoreHistory::open(store);

        for i in 0..k {
            let result = finalize("abcdefghij", "abcdefghiz", 1.0 + i as f64, Mode::Stopwatch).unwrap();
            history.record(&result).unwrap();
        }

        let loaded = history.store().load().unwrap();
        assert_eq!(loaded, history.records(), "k = {k}");
    }
}

#[test]
fn corrupt_history_is_replaced_only_after_a_new_score() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    fs::write(&path, "\u{0}\u{1}garbage\n1,2\n").unwrap();

    let mut history = ScoreHistory::open(CsvHistoryStore::with_path(&path));
    assert!(history.is_empty());
    assert_eq!(fs::read_to_string(&path).unwrap(), "\u{0}\u{1}garbage\n1,2\n");

    let result = finalize("abc", "abc", 1.0, Mode::Stopwatch).unwrap();
    assert!(history.record(&result).unwrap().is_some());

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("Time,WPM,Accuracy,Timestamp\n"));
}

#[test]
fn invalid_timing_persists_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scores.csv");

    let err = finalize("abc", "abc", -2.0, Mode::Stopwatch);
    assert!(err.is_err());
    assert!(!path.exists());
}
