//! Integration tests for analysis sessions
//!
//! Covers the save/reload cycle through both stores, cursor restoration,
//! raw board edits and file export.

use std::fs;
use std::path::PathBuf;
use uuid::Uuid;
use xfchess_analysis::rules::{parse_piece, parse_square, ShakmatyRules};
use xfchess_analysis::session::{
    export_pgn, AnalysisSession, EditMode, JsonFileStore, MemoryStore, SessionRecord,
    SessionStore,
};
use xfchess_analysis::tree::{CandidateMove, PositionPath};

/// Fresh directory under the system temp dir
fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("xfchess-analysis-{}", Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn session_with_branches() -> AnalysisSession {
    let mut session = AnalysisSession::default();
    session
        .apply_line(&CandidateMove::san_line("e4 e5 Nf3 Nc6 Bb5"))
        .unwrap();
    session.go_back();
    session.make_move(&CandidateMove::san("Bc4")).unwrap();
    session.make_move(&CandidateMove::san("Bc5")).unwrap();
    session
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_file_store_round_trip() {
    //! Save to disk, reload into a fresh session, land on the same position

    let dir = temp_dir();
    let mut store = JsonFileStore::new(&dir);
    let session = session_with_branches();
    assert_eq!(session.cursor_path().indices(), &[0, 0, 0, 0, 1, 0]);

    session.save(&mut store, "analysis-tab").unwrap();
    assert!(store.path_for("analysis-tab").exists());

    let restored = AnalysisSession::load(&store, "analysis-tab", ShakmatyRules::new())
        .unwrap()
        .unwrap();
    assert_eq!(restored.cursor_path(), session.cursor_path());
    assert_eq!(restored.current_state(), session.current_state());
    assert_eq!(restored.tree().len(), session.tree().len());

    store.remove("analysis-tab").unwrap();
    assert!(store.load("analysis-tab").unwrap().is_none());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_memory_store_holds_several_sessions() {
    let mut store = MemoryStore::new();
    let first = session_with_branches();
    let second = AnalysisSession::default();

    first.save(&mut store, "one").unwrap();
    second.save(&mut store, "two").unwrap();
    assert_eq!(store.len(), 2);

    let two = AnalysisSession::load(&store, "two", ShakmatyRules::new())
        .unwrap()
        .unwrap();
    assert_eq!(two.tree().len(), 1);
}

#[test]
fn test_restore_clamps_stale_path() {
    //! A path that outlives its branch lands on the deepest reachable node

    let record = SessionRecord {
        notation_text: "1. e4 e5 2. Nf3 *\n".into(),
        position_path: PositionPath::from(vec![0, 0, 2, 0]),
    };
    let session = AnalysisSession::restore(&record, ShakmatyRules::new()).unwrap();
    assert_eq!(session.cursor_path().indices(), &[0, 0]);
}

#[test]
fn test_restore_rejects_broken_text() {
    let record = SessionRecord {
        notation_text: "1. e4 (".into(),
        position_path: PositionPath::root(),
    };
    assert!(AnalysisSession::restore(&record, ShakmatyRules::new()).is_err());
}

#[test]
fn test_corrupt_session_file() {
    let dir = temp_dir();
    let store = JsonFileStore::new(&dir);
    fs::write(store.path_for("bad"), "{ not json").unwrap();

    assert!(store.load("bad").is_err());
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_undecided_result_survives_reload() {
    //! A `Result` tag that is not a game outcome must not break the reload
    for result in ["unknown", "?", ""] {
        let record = SessionRecord {
            notation_text: format!("[Result \"{result}\"]\n\n1. e4 e5 *\n"),
            position_path: PositionPath::from(vec![0, 0]),
        };
        let session = AnalysisSession::restore(&record, ShakmatyRules::new()).unwrap();

        let mut store = MemoryStore::new();
        session.save(&mut store, "tab").unwrap();
        let reloaded = AnalysisSession::load(&store, "tab", ShakmatyRules::new())
            .unwrap()
            .unwrap();

        assert_eq!(reloaded.tree().headers.get("Result"), Some(result));
        assert_eq!(reloaded.cursor_path().indices(), &[0, 0]);
        assert!(reloaded.tree().iter().all(|(_, n)| n.annotation.nags.is_empty()));
    }
}

#[test]
fn test_edited_headers_survive_reload() {
    let mut session = session_with_branches();
    assert!(session.headers_mut().set("Event", "Club\nChampionship"));
    assert!(!session.headers_mut().set("Bad Key", "x"));

    let mut store = MemoryStore::new();
    session.save(&mut store, "tab").unwrap();
    let reloaded = AnalysisSession::load(&store, "tab", ShakmatyRules::new())
        .unwrap()
        .unwrap();

    assert_eq!(reloaded.tree().headers.get("Event"), Some("Club Championship"));
    assert_eq!(reloaded.tree().headers.get("Bad Key"), None);
    assert_eq!(reloaded.cursor_path(), session.cursor_path());
}

// ============================================================================
// Raw Edits
// ============================================================================

#[test]
fn test_raw_edit_isolation() {
    //! Editing the board drops the history instead of forking the tree

    let mut session = session_with_branches();
    session.set_mode(EditMode::RawEdit);
    session
        .place_piece(parse_square("e4").unwrap(), parse_piece('Q').unwrap())
        .unwrap();

    assert_eq!(session.tree().len(), 1);
    assert_eq!(session.cursor_path(), PositionPath::root());
    let fen = session.current_state().unwrap().fen();
    assert!(fen.starts_with("r1bqk1nr/pppp1ppp/2n5/2b1p3/2B1Q3/5N2/"));
}

#[test]
fn test_raw_edited_board_survives_reload() {
    let mut session = AnalysisSession::default();
    session.remove_piece(parse_square("e8").unwrap()).unwrap();
    let record = session.checkpoint();

    let restored = AnalysisSession::restore(&record, ShakmatyRules::new()).unwrap();
    assert_eq!(restored.current_state(), session.current_state());
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_export_forces_pgn_extension() {
    let dir = temp_dir();
    let session = session_with_branches();

    let written = export_pgn(session.tree(), dir.join("game.txt")).unwrap();
    assert_eq!(written, dir.join("game.pgn"));

    let text = fs::read_to_string(&written).unwrap();
    assert!(text.contains("3. Bb5 (3. Bc4 Bc5) *"));

    fs::remove_dir_all(&dir).unwrap();
}
