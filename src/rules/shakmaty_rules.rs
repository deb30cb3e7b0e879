//! Local rule engine backed by `shakmaty`

use super::RuleEngine;
use crate::core::error::{RuleError, RuleResult};
use crate::tree::{BoardState, CandidateMove, MoveData, PlayedMove};
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::Uci;
use shakmaty::{
    Bitboard, CastlingMode, Chess, Color, EnPassantMode, Piece, Rank, Setup, Square,
};

/// Standard chess rules, synchronous and in-process
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyRules;

impl ShakmatyRules {
    pub fn new() -> Self {
        Self
    }

    fn position(&self, state: &BoardState) -> RuleResult<Chess> {
        let fen: Fen = state.fen().parse().map_err(|e| unparseable(state.fen(), e))?;
        fen.into_position(CastlingMode::Standard)
            .map_err(|e| unparseable(state.fen(), e))
    }

    /// Setup of a possibly illegal position, for raw edits
    fn setup(&self, state: &BoardState) -> RuleResult<Setup> {
        let fen: Fen = state.fen().parse().map_err(|e| unparseable(state.fen(), e))?;
        Ok(fen.into_setup())
    }

    fn write_setup(mut setup: Setup) -> BoardState {
        // An edited board invalidates any pending en-passant capture
        setup.ep_square = None;

        // Castling survives only with king and rook still on their squares
        let mut rights = Bitboard::EMPTY;
        for rook in setup.castling_rights {
            let color = Color::from_white(rook.rank() == Rank::First);
            let king_home = if color.is_white() { Square::E1 } else { Square::E8 };
            if setup.board.piece_at(rook) == Some(color.rook())
                && setup.board.piece_at(king_home) == Some(color.king())
            {
                rights.add(rook);
            }
        }
        setup.castling_rights = rights;

        BoardState::from_fen(Fen::from_setup(setup).to_string())
    }

    fn state_of(pos: &Chess) -> BoardState {
        BoardState::from_fen(Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string())
    }
}

fn unparseable(fen: &str, reason: impl std::fmt::Display) -> RuleError {
    RuleError::UnparseableBoardState {
        fen: fen.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse move text as SAN with an optional check suffix
///
/// Trailing move-quality symbols are ignored and castling may be written
/// with zeros.
pub(crate) fn parse_san(text: &str) -> Option<SanPlus> {
    let text = text.trim().trim_end_matches(['!', '?']);
    let castle = if let Some(rest) = text.strip_prefix("0-0-0") {
        Some(format!("O-O-O{rest}"))
    } else {
        text.strip_prefix("0-0").map(|rest| format!("O-O{rest}"))
    };
    castle.as_deref().unwrap_or(text).parse().ok()
}

pub fn parse_square(text: &str) -> RuleResult<Square> {
    text.trim()
        .parse::<Square>()
        .map_err(|_| RuleError::InvalidSquare(text.to_string()))
}

/// Parse a FEN piece letter: upper case is white, lower case black
pub fn parse_piece(letter: char) -> RuleResult<Piece> {
    Piece::from_char(letter).ok_or_else(|| RuleError::InvalidPiece(letter.to_string()))
}

impl RuleEngine for ShakmatyRules {
    fn parse_state(&self, fen: &str) -> RuleResult<BoardState> {
        let pos = self.position(&BoardState::from_fen(fen))?;
        Ok(Self::state_of(&pos))
    }

    fn parse_raw_state(&self, fen: &str) -> RuleResult<BoardState> {
        let setup = self.setup(&BoardState::from_fen(fen))?;
        Ok(BoardState::from_fen(Fen::from_setup(setup).to_string()))
    }

    fn play(&self, state: &BoardState, candidate: &CandidateMove) -> RuleResult<PlayedMove> {
        let pos = self.position(state)?;
        let illegal = || RuleError::IllegalMove {
            mv: candidate.to_string(),
            fen: state.fen().to_string(),
        };

        let m = match candidate {
            CandidateMove::San(text) => parse_san(text)
                .ok_or_else(|| RuleError::InvalidMoveText(text.clone()))?
                .san
                .to_move(&pos)
                .map_err(|_| illegal())?,
            CandidateMove::Squares {
                from,
                to,
                promotion,
            } => {
                let uci = Uci::Normal {
                    from: *from,
                    to: *to,
                    promotion: *promotion,
                };
                uci.to_move(&pos).map_err(|_| illegal())?
            }
        };

        // `m` came from the position itself, so it is legal there
        let mut after = pos.clone();
        let san = SanPlus::from_move_and_play_unchecked(&mut after, &m);

        // Castling is reported king-to-destination, not king-takes-rook
        let (from, to, promotion) = match m.to_uci(CastlingMode::Standard) {
            Uci::Normal {
                from,
                to,
                promotion,
            } => (from, to, promotion),
            _ => (m.from().unwrap_or_else(|| m.to()), m.to(), m.promotion()),
        };

        Ok(PlayedMove {
            mv: MoveData {
                from,
                to,
                promotion,
                san: san.to_string(),
            },
            state: Self::state_of(&after),
        })
    }

    fn place_piece(
        &self,
        state: &BoardState,
        square: Square,
        piece: Piece,
    ) -> RuleResult<BoardState> {
        let mut setup = self.setup(state)?;
        setup.board.remove_piece_at(square);
        setup.board.set_piece_at(square, piece);
        Ok(Self::write_setup(setup))
    }

    fn remove_piece(&self, state: &BoardState, square: Square) -> RuleResult<BoardState> {
        let mut setup = self.setup(state)?;
        setup.board.remove_piece_at(square);
        Ok(Self::write_setup(setup))
    }

    fn move_piece_unchecked(
        &self,
        state: &BoardState,
        from: Square,
        to: Square,
    ) -> RuleResult<BoardState> {
        let mut setup = self.setup(state)?;
        let piece = setup
            .board
            .remove_piece_at(from)
            .ok_or_else(|| RuleError::EmptySquare(from.to_string()))?;
        setup.board.remove_piece_at(to);
        setup.board.set_piece_at(to, piece);
        Ok(Self::write_setup(setup))
    }
}
