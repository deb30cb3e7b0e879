//! Analysis session
//!
//! An [`AnalysisSession`] is one open analysis board: a [`VariationTree`],
//! a cursor into it and the current [`EditMode`]. It is what a UI talks to;
//! every user action maps onto one method here.
//!
//! # Edit modes
//!
//! - [`EditMode::Normal`] - moves go through the rule engine and are merged
//!   into the tree
//! - [`EditMode::RawEdit`] - the board is edited freely; every edit replaces
//!   the tree with a single position that has no history
//!
//! A normal move from a position the rule engine cannot read also takes the
//! raw edit path.
//!
//! # Asynchronous rule engines
//!
//! When legality is checked elsewhere, [`AnalysisSession::request_move`]
//! captures the cursor and a generation number, and
//! [`AnalysisSession::resolve_move`] applies the answer only if nothing has
//! moved in between. Every cursor move or tree change bumps the generation.

use super::store::{SessionRecord, SessionStore};
use crate::core::error::{RuleError, SessionResult, TreeError};
use crate::notation::{parse, write_game, Headers, WriteOptions};
use crate::rules::{RuleEngine, ShakmatyRules};
use crate::tree::{
    Annotation, BoardState, CandidateMove, Located, NodeId, PlayedMove, PositionPath,
    VariationTree,
};
use serde::{Deserialize, Serialize};
use shakmaty::{Piece, Square};
use tracing::{debug, info};

/// How board interactions are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EditMode {
    /// Legal moves only, recorded in the tree
    #[default]
    Normal,
    /// Free piece placement; the tree collapses to the edited position
    RawEdit,
}

impl EditMode {
    pub fn toggled(self) -> EditMode {
        match self {
            EditMode::Normal => EditMode::RawEdit,
            EditMode::RawEdit => EditMode::Normal,
        }
    }
}

/// A move handed to an external rule engine, awaiting its answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub candidate: CandidateMove,
    /// Cursor at request time
    pub node: NodeId,
    /// Board the engine is asked to play from
    pub state: BoardState,
    generation: u64,
}

impl PendingMove {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One analysis board
#[derive(Debug, Clone)]
pub struct AnalysisSession<R: RuleEngine = ShakmatyRules> {
    tree: VariationTree,
    cursor: NodeId,
    mode: EditMode,
    rules: R,
    generation: u64,
}

impl Default for AnalysisSession<ShakmatyRules> {
    fn default() -> Self {
        Self::new(ShakmatyRules::new())
    }
}

impl<R: RuleEngine> AnalysisSession<R> {
    /// Session on the standard starting position
    pub fn new(rules: R) -> Self {
        let tree = VariationTree::from_state(rules.starting_state());
        Self::with_tree(tree, rules)
    }

    /// Session over an existing tree, cursor on its root
    pub fn with_tree(tree: VariationTree, rules: R) -> Self {
        let cursor = tree.root();
        Self {
            tree,
            cursor,
            mode: EditMode::Normal,
            rules,
            generation: 0,
        }
    }

    pub fn tree(&self) -> &VariationTree {
        &self.tree
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn cursor(&self) -> NodeId {
        self.cursor
    }

    /// Board state under the cursor
    pub fn current_state(&self) -> Option<&BoardState> {
        self.tree.state(self.cursor)
    }

    fn cursor_state(&self) -> SessionResult<&BoardState> {
        self.current_state()
            .ok_or_else(|| TreeError::UnknownNode(self.cursor).into())
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// Changes on every cursor move and every tree mutation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_mode(&mut self, mode: EditMode) {
        if self.mode != mode {
            debug!("[SESSION] Edit mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }

    pub fn toggle_mode(&mut self) -> EditMode {
        self.set_mode(self.mode.toggled());
        self.mode
    }

    /// Annotation of the node under the cursor
    pub fn annotation_mut(&mut self) -> Option<&mut Annotation> {
        self.tree.annotation_mut(self.cursor)
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.tree.headers
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn move_cursor(&mut self, to: NodeId) -> bool {
        if to == self.cursor || !self.tree.contains(to) {
            return false;
        }
        self.cursor = to;
        self.touch();
        true
    }

    /// Replace the whole tree with a single edited position
    fn replace_with(&mut self, state: BoardState) -> NodeId {
        let headers = std::mem::take(&mut self.tree.headers);
        self.tree = VariationTree::from_state(state);
        self.tree.headers = headers;
        self.cursor = self.tree.root();
        self.touch();
        debug!("[SESSION] Board edited; history cleared");
        self.cursor
    }

    // ------------------------------------------------------------------
    // Moves and edits
    // ------------------------------------------------------------------

    /// Play `candidate` at the cursor and move the cursor onto the result
    ///
    /// In [`EditMode::Normal`] the move is merged into the tree. When the
    /// current position cannot be read by the rule engine, a square-to-square
    /// move is applied as a raw edit instead. In [`EditMode::RawEdit`] only
    /// square-to-square moves are accepted and they are never checked.
    ///
    /// # Errors
    ///
    /// Illegal moves leave the session unchanged.
    pub fn make_move(&mut self, candidate: &CandidateMove) -> SessionResult<NodeId> {
        if self.mode == EditMode::RawEdit {
            return self.raw_move(candidate);
        }

        match self.tree.apply_move(&self.rules, self.cursor, candidate) {
            Ok(outcome) => {
                let node = outcome.node();
                self.cursor = node;
                self.touch();
                Ok(node)
            }
            Err(TreeError::Rule(RuleError::UnparseableBoardState { fen, reason })) => {
                debug!(
                    "[SESSION] Position {} not playable ({}); applying {} as raw edit",
                    fen, reason, candidate
                );
                self.raw_move(candidate)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn raw_move(&mut self, candidate: &CandidateMove) -> SessionResult<NodeId> {
        let CandidateMove::Squares { from, to, .. } = candidate else {
            return Err(RuleError::InvalidMoveText(candidate.to_string()).into());
        };
        let state = self
            .rules
            .move_piece_unchecked(self.cursor_state()?, *from, *to)?;
        Ok(self.replace_with(state))
    }

    /// Put `piece` on `square`; the edited board becomes a fresh tree
    pub fn place_piece(&mut self, square: Square, piece: Piece) -> SessionResult<NodeId> {
        let state = self.rules.place_piece(self.cursor_state()?, square, piece)?;
        Ok(self.replace_with(state))
    }

    /// Clear `square`; the edited board becomes a fresh tree
    pub fn remove_piece(&mut self, square: Square) -> SessionResult<NodeId> {
        let state = self.rules.remove_piece(self.cursor_state()?, square)?;
        Ok(self.replace_with(state))
    }

    /// Graft `line` at the cursor and move to its last position
    pub fn apply_line(&mut self, line: &[CandidateMove]) -> SessionResult<NodeId> {
        let end = self.tree.apply_line(&self.rules, self.cursor, line)?;
        self.cursor = end;
        self.touch();
        Ok(end)
    }

    /// Remove the variation starting at `id`
    ///
    /// A cursor inside the removed subtree moves to the variation's parent.
    pub fn delete_variation(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.tree.parent(id) else {
            return false;
        };
        let cursor_inside = self.is_ancestor_or_self(id, self.cursor);
        if !self.tree.delete_variation(id) {
            return false;
        }
        if cursor_inside {
            self.cursor = parent;
        }
        self.touch();
        true
    }

    pub fn promote_variation(&mut self, id: NodeId) -> bool {
        let promoted = self.tree.promote_variation(id);
        if promoted {
            self.touch();
        }
        promoted
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.tree.parent(id);
        }
        false
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn go_back(&mut self) -> bool {
        match self.tree.parent(self.cursor) {
            Some(parent) => self.move_cursor(parent),
            None => false,
        }
    }

    /// Step along the mainline continuation
    pub fn go_forward(&mut self) -> bool {
        match self.tree.children(self.cursor).first() {
            Some(&next) => self.move_cursor(next),
            None => false,
        }
    }

    pub fn go_to_start(&mut self) -> bool {
        self.move_cursor(self.tree.top(self.cursor))
    }

    /// Follow the mainline from the cursor to its end
    pub fn go_to_end(&mut self) -> bool {
        self.move_cursor(self.tree.bottom(self.cursor))
    }

    /// Jump to a node of this tree; unknown ids are ignored
    pub fn select(&mut self, id: NodeId) -> bool {
        self.move_cursor(id)
    }

    /// Move to `path`, clamping to the deepest reachable node
    pub fn go_to(&mut self, path: &PositionPath) -> Located {
        let located = self.tree.locate(path);
        if located.clamped {
            debug!(
                "[SESSION] Path {} clamped at depth {}",
                path, located.depth
            );
        }
        self.move_cursor(located.node);
        located
    }

    pub fn cursor_path(&self) -> PositionPath {
        self.tree.position_of(self.cursor)
    }

    // ------------------------------------------------------------------
    // Asynchronous rule engine exchange
    // ------------------------------------------------------------------

    /// Snapshot the cursor for an out-of-process legality check
    pub fn request_move(&self, candidate: CandidateMove) -> SessionResult<PendingMove> {
        Ok(PendingMove {
            candidate,
            node: self.cursor,
            state: self.cursor_state()?.clone(),
            generation: self.generation,
        })
    }

    /// Apply the engine's answer to `pending`
    ///
    /// Returns `Ok(None)` without touching anything when the session moved
    /// on since the request. A rejection is returned as an error and also
    /// leaves the session unchanged.
    pub fn resolve_move(
        &mut self,
        pending: &PendingMove,
        response: Result<PlayedMove, RuleError>,
    ) -> SessionResult<Option<NodeId>> {
        let stale = pending.generation != self.generation
            || pending.node != self.cursor
            || self.tree.state(pending.node) != Some(&pending.state);
        if stale {
            debug!(
                "[SESSION] Discarding stale response for {} (generation {} != {})",
                pending.candidate, pending.generation, self.generation
            );
            return Ok(None);
        }

        let played = response?;
        let outcome = self
            .tree
            .insert_played(pending.node, played, Annotation::default())?;
        self.cursor = outcome.node();
        self.touch();
        Ok(Some(self.cursor))
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Full-fidelity snapshot of the tree and cursor
    pub fn checkpoint(&self) -> SessionRecord {
        SessionRecord {
            notation_text: write_game(&self.tree, &WriteOptions::default()),
            position_path: self.cursor_path(),
        }
    }

    pub fn save<S: SessionStore + ?Sized>(&self, store: &mut S, key: &str) -> SessionResult<()> {
        store.save(key, &self.checkpoint())?;
        debug!("[SESSION] Checkpointed '{}' at {}", key, self.cursor_path());
        Ok(())
    }

    /// Rebuild a session from a snapshot
    ///
    /// The tree is parsed afresh and the cursor re-walked from the stored
    /// path, clamped to what the tree actually contains.
    pub fn restore(record: &SessionRecord, rules: R) -> SessionResult<Self> {
        let tree = parse(&record.notation_text, &rules)?;
        let mut session = Self::with_tree(tree, rules);
        session.go_to(&record.position_path);
        Ok(session)
    }

    /// [`restore`](Self::restore) from a store; `Ok(None)` when `key` is absent
    pub fn load<S: SessionStore + ?Sized>(
        store: &S,
        key: &str,
        rules: R,
    ) -> SessionResult<Option<Self>> {
        let Some(record) = store.load(key)? else {
            return Ok(None);
        };
        let session = Self::restore(&record, rules)?;
        info!(
            "[SESSION] Restored '{}' ({} positions) at {}",
            key,
            session.tree.len(),
            session.cursor_path()
        );
        Ok(Some(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryStore;

    fn session_after(line: &str) -> AnalysisSession {
        let mut session = AnalysisSession::default();
        session
            .apply_line(&CandidateMove::san_line(line))
            .unwrap();
        session
    }

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_make_move_advances_cursor() {
        let mut session = AnalysisSession::default();
        let e4 = session.make_move(&CandidateMove::san("e4")).unwrap();
        assert_eq!(session.cursor(), e4);
        assert_eq!(session.cursor_path(), PositionPath::from(vec![0]));
        assert_eq!(session.current_state().unwrap().side_to_move(), shakmaty::Color::Black);
    }

    #[test]
    fn test_illegal_move_changes_nothing() {
        let mut session = session_after("e4");
        let generation = session.generation();
        assert!(session.make_move(&CandidateMove::san("e4")).is_err());
        assert_eq!(session.generation(), generation);
        assert_eq!(session.tree().len(), 2);
    }

    #[test]
    fn test_navigation() {
        let mut session = session_after("e4 e5 Nf3");
        assert!(session.go_to_start());
        assert!(!session.go_back());
        assert!(session.go_forward());
        assert_eq!(session.cursor_path().indices(), &[0]);
        assert!(session.go_to_end());
        assert_eq!(session.cursor_path().indices(), &[0, 0, 0]);
        assert!(!session.go_forward());
    }

    #[test]
    fn test_go_to_clamps() {
        let mut session = session_after("e4 e5");
        let located = session.go_to(&PositionPath::from(vec![0, 3, 1]));
        assert!(located.clamped);
        assert_eq!(session.cursor_path().indices(), &[0]);
    }

    #[test]
    fn test_toggle_mode() {
        let mut session = AnalysisSession::default();
        assert_eq!(session.mode(), EditMode::Normal);
        assert_eq!(session.toggle_mode(), EditMode::RawEdit);
        assert_eq!(session.toggle_mode(), EditMode::Normal);
    }

    #[test]
    fn test_raw_edit_replaces_tree() {
        //! Raw edits never fork or merge: the tree becomes the edited board
        let mut session = session_after("e4 e5");
        session.set_mode(EditMode::RawEdit);

        let node = session
            .make_move(&CandidateMove::squares(sq("d1"), sq("h5")))
            .unwrap();
        assert_eq!(session.tree().len(), 1);
        assert_eq!(session.cursor(), node);
        assert!(session
            .current_state()
            .unwrap()
            .fen()
            .starts_with("rnbqkbnr/pppp1ppp/8/4p2Q/4P3/8/PPPP1PPP/RNB1KBNR"));

        assert!(session.make_move(&CandidateMove::san("Nc6")).is_err());
    }

    #[test]
    fn test_unplayable_position_falls_back_to_raw_edit() {
        let mut session = AnalysisSession::default();
        session.remove_piece(sq("e8")).unwrap();
        session.set_mode(EditMode::Normal);

        session
            .make_move(&CandidateMove::squares(sq("e2"), sq("e5")))
            .unwrap();
        assert_eq!(session.tree().len(), 1);
        assert!(session.current_state().unwrap().fen().contains("4P3/8/8/PPPP1PPP"));
    }

    #[test]
    fn test_delete_moves_cursor_to_parent() {
        let mut session = session_after("e4 e5 Nf3");
        let e5 = session.tree().parent(session.cursor()).unwrap();
        let e4 = session.tree().parent(e5).unwrap();

        assert!(session.delete_variation(e5));
        assert_eq!(session.cursor(), e4);
        assert!(!session.delete_variation(session.tree().root()));
    }

    #[test]
    fn test_delete_elsewhere_keeps_cursor() {
        let mut session = session_after("e4 e5");
        session.go_to_start();
        let d4 = session.make_move(&CandidateMove::san("d4")).unwrap();
        session.go_to(&PositionPath::from(vec![0, 0]));
        let cursor = session.cursor();

        assert!(session.delete_variation(d4));
        assert_eq!(session.cursor(), cursor);
    }

    #[test]
    fn test_resolve_move_applies_fresh_response() {
        let mut session = AnalysisSession::default();
        let pending = session.request_move(CandidateMove::san("e4")).unwrap();
        let response = session.rules().play(&pending.state, &pending.candidate);

        let node = session.resolve_move(&pending, response).unwrap();
        assert_eq!(node, Some(session.cursor()));
        assert_eq!(session.tree().mainline_san(session.tree().root()), "e4");
    }

    #[test]
    fn test_resolve_move_discards_stale_response() {
        let mut session = session_after("e4");
        let pending = session.request_move(CandidateMove::san("e5")).unwrap();
        let response = session.rules().play(&pending.state, &pending.candidate);

        session.go_back();
        assert_eq!(session.resolve_move(&pending, response).unwrap(), None);
        assert_eq!(session.tree().len(), 2);
    }

    #[test]
    fn test_save_and_load() {
        let mut store = MemoryStore::new();
        let mut session = session_after("e4 e5 Nf3");
        session.go_back();
        session.save(&mut store, "tab-1").unwrap();

        let loaded = AnalysisSession::load(&store, "tab-1", ShakmatyRules::new())
            .unwrap()
            .unwrap();
        assert_eq!(loaded.cursor_path(), session.cursor_path());
        assert_eq!(loaded.current_state(), session.current_state());
        assert!(AnalysisSession::load(&store, "missing", ShakmatyRules::new())
            .unwrap()
            .is_none());
    }
}
