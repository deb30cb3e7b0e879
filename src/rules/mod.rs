//! Rule engine boundary
//!
//! The variation tree knows nothing about chess rules. Everything that needs
//! legality (playing a move, normalising a FEN) or board mutation (raw edits)
//! goes through a [`RuleEngine`].
//!
//! # Implementations
//!
//! - [`ShakmatyRules`] - local, synchronous, backed by `shakmaty`
//!
//! A remote engine can implement the same trait; sessions also accept
//! results computed elsewhere through
//! [`AnalysisSession::resolve_move`](crate::session::AnalysisSession::resolve_move).
//!
//! # Unparseable positions
//!
//! A board state that is not a legal position makes [`RuleEngine::play`]
//! fail with [`RuleError::UnparseableBoardState`]. Callers must treat this as
//! a cue to fall back to raw edit semantics, not as a fatal error.

mod shakmaty_rules;

pub use shakmaty_rules::{parse_piece, parse_square, ShakmatyRules};
pub(crate) use shakmaty_rules::parse_san;

use crate::core::error::RuleResult;
use crate::tree::{BoardState, CandidateMove, PlayedMove};
use shakmaty::{Piece, Square};

/// Validates and executes moves and board edits
pub trait RuleEngine {
    /// Parse a FEN into the canonical board state of a legal position
    fn parse_state(&self, fen: &str) -> RuleResult<BoardState>;

    /// Canonical board state of a FEN that may not be a legal position
    ///
    /// Used for raw-edited boards. Fails only when `fen` is not a FEN.
    fn parse_raw_state(&self, fen: &str) -> RuleResult<BoardState>;

    /// Play a move from `state`, returning the move as resolved and the
    /// resulting board state
    fn play(&self, state: &BoardState, candidate: &CandidateMove) -> RuleResult<PlayedMove>;

    /// Put `piece` on `square`, replacing whatever stood there
    fn place_piece(&self, state: &BoardState, square: Square, piece: Piece)
        -> RuleResult<BoardState>;

    /// Clear `square`
    fn remove_piece(&self, state: &BoardState, square: Square) -> RuleResult<BoardState>;

    /// Move the piece on `from` to `to` without any legality check
    fn move_piece_unchecked(
        &self,
        state: &BoardState,
        from: Square,
        to: Square,
    ) -> RuleResult<BoardState>;

    fn starting_state(&self) -> BoardState {
        BoardState::starting()
    }

    fn play_san(&self, state: &BoardState, san: &str) -> RuleResult<PlayedMove> {
        self.play(state, &CandidateMove::san(san))
    }

    /// Whether moves can be played from `state` at all
    fn is_playable(&self, state: &BoardState) -> bool {
        self.parse_state(state.fen()).is_ok()
    }
}

impl<R: RuleEngine + ?Sized> RuleEngine for &R {
    fn parse_state(&self, fen: &str) -> RuleResult<BoardState> {
        (**self).parse_state(fen)
    }

    fn parse_raw_state(&self, fen: &str) -> RuleResult<BoardState> {
        (**self).parse_raw_state(fen)
    }

    fn play(&self, state: &BoardState, candidate: &CandidateMove) -> RuleResult<PlayedMove> {
        (**self).play(state, candidate)
    }

    fn place_piece(
        &self,
        state: &BoardState,
        square: Square,
        piece: Piece,
    ) -> RuleResult<BoardState> {
        (**self).place_piece(state, square, piece)
    }

    fn remove_piece(&self, state: &BoardState, square: Square) -> RuleResult<BoardState> {
        (**self).remove_piece(state, square)
    }

    fn move_piece_unchecked(
        &self,
        state: &BoardState,
        from: Square,
        to: Square,
    ) -> RuleResult<BoardState> {
        (**self).move_piece_unchecked(state, from, to)
    }

    fn starting_state(&self) -> BoardState {
        (**self).starting_state()
    }
}
