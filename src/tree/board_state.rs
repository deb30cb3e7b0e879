//! Board states and moves as stored in the variation tree
//!
//! The tree never interprets positions itself. A [`BoardState`] is an opaque,
//! canonical FEN string produced by the rule engine; two nodes hold the same
//! position exactly when their strings are equal. This also lets the tree hold
//! positions the rule engine refuses to play from (after a raw board edit).

use serde::{Deserialize, Serialize};
use shakmaty::{Color, Role, Square};
use std::fmt;

/// FEN of the standard starting position
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Complete description of a chess position
///
/// Stored as FEN: piece placement, side to move, castling rights,
/// en-passant target and both move counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardState(String);

impl BoardState {
    /// Wrap a FEN string without validating it
    ///
    /// Use [`RuleEngine::parse_state`](crate::rules::RuleEngine::parse_state)
    /// to get the canonical form of user input.
    pub fn from_fen(fen: impl Into<String>) -> Self {
        Self(fen.into().trim().to_string())
    }

    /// The standard starting position
    pub fn starting() -> Self {
        Self(STARTING_FEN.to_string())
    }

    pub fn fen(&self) -> &str {
        &self.0
    }

    pub fn is_starting(&self) -> bool {
        self.0 == STARTING_FEN
    }

    /// Side to move, read from the second FEN field (white if missing)
    pub fn side_to_move(&self) -> Color {
        match self.0.split_whitespace().nth(1) {
            Some("b") => Color::Black,
            _ => Color::White,
        }
    }

    /// Fullmove number, read from the sixth FEN field (1 if missing)
    pub fn fullmove_number(&self) -> u32 {
        self.0
            .split_whitespace()
            .nth(5)
            .and_then(|n| n.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1)
    }
}

impl Default for BoardState {
    fn default() -> Self {
        Self::starting()
    }
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The move that produced a node from its parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveData {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
    /// SAN including check suffix, e.g. `Nf3` or `exd8=Q+`
    pub san: String,
}

impl MoveData {
    /// The move in UCI notation (`e7e8q`)
    pub fn uci(&self) -> String {
        match self.promotion {
            Some(role) => format!("{}{}{}", self.from, self.to, role.char()),
            None => format!("{}{}", self.from, self.to),
        }
    }
}

impl fmt::Display for MoveData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.san)
    }
}

/// A move as requested by a caller, before the rule engine resolves it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateMove {
    /// Standard algebraic notation, e.g. `Nf3`, `O-O`, `e8=Q`
    San(String),
    /// Source and destination squares, as produced by a drag on the board
    Squares {
        from: Square,
        to: Square,
        promotion: Option<Role>,
    },
}

impl CandidateMove {
    pub fn san(text: impl Into<String>) -> Self {
        CandidateMove::San(text.into())
    }

    pub fn squares(from: Square, to: Square) -> Self {
        CandidateMove::Squares {
            from,
            to,
            promotion: None,
        }
    }

    /// Split a space separated SAN line (`"e4 e5 Nf3"`) into candidates
    pub fn san_line(line: &str) -> Vec<Self> {
        line.split_whitespace().map(CandidateMove::san).collect()
    }
}

impl fmt::Display for CandidateMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateMove::San(san) => f.write_str(san),
            CandidateMove::Squares {
                from,
                to,
                promotion: Some(role),
            } => write!(f, "{from}{to}{}", role.char()),
            CandidateMove::Squares { from, to, .. } => write!(f, "{from}{to}"),
        }
    }
}

/// A move the rule engine accepted, with the position it leads to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub mv: MoveData,
    pub state: BoardState,
}
