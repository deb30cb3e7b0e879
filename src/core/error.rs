//! Error types for the analysis engine
//!
//! Every fallible operation in the crate reports through one of the enums
//! below. They are layered the same way the modules are:
//!
//! - [`RuleError`] - the rule engine rejected a move or a board state
//! - [`TreeError`] - a tree mutation failed (usually wraps a [`RuleError`])
//! - [`ParseError`] - notation text could not be turned into a tree
//! - [`StoreError`] - a session record could not be persisted or read back
//! - [`SessionError`] - anything surfaced by an [`AnalysisSession`]
//!
//! A position path that no longer fits the tree is deliberately *not* an
//! error: navigation clamps to the deepest reachable node instead.
//!
//! [`AnalysisSession`]: crate::session::AnalysisSession

use crate::tree::NodeId;
use std::fmt;
use thiserror::Error;

/// Errors reported by a [`RuleEngine`](crate::rules::RuleEngine)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The move is not legal in the given position
    #[error("illegal move {mv} in position {fen}")]
    IllegalMove { mv: String, fen: String },

    /// The board state cannot be interpreted as a legal chess position
    ///
    /// Not fatal for a session: it switches to raw edit semantics.
    #[error("board state cannot be parsed as a legal position ({fen}): {reason}")]
    UnparseableBoardState { fen: String, reason: String },

    /// A square name such as `e4` could not be parsed
    #[error("invalid square: {0}")]
    InvalidSquare(String),

    /// A piece letter such as `N` or `q` could not be parsed
    #[error("invalid piece: {0}")]
    InvalidPiece(String),

    /// The move text is not valid SAN/UCI syntax
    #[error("invalid move text: {0}")]
    InvalidMoveText(String),

    /// An unchecked piece move started from an empty square
    #[error("no piece on {0}")]
    EmptySquare(String),
}

/// Errors reported by tree mutations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The rule engine refused the move; the tree is unchanged
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// The node id does not refer to a live node of this tree
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
}

/// What went wrong while parsing notation text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A header line is not of the form `[Key "Value"]`
    MalformedHeader,
    /// The `FEN` header does not describe a playable position
    InvalidFen(String),
    /// The rule engine rejected a move for the current board state
    IllegalMove(String),
    /// A `(` was never closed, or a `)` has no matching `(`
    UnbalancedParenthesis,
    /// A `(` opened before any move of the enclosing line
    VariationWithoutMove,
    /// A `{` comment runs to the end of the text
    UnterminatedComment,
    /// A token that cannot appear in movetext
    UnexpectedToken,
    /// Text following the game termination marker
    TrailingText,
    /// The PGN reader gave up on the text
    Unreadable(String),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::MalformedHeader => write!(f, "malformed header"),
            ParseErrorKind::InvalidFen(reason) => write!(f, "invalid FEN ({reason})"),
            ParseErrorKind::IllegalMove(reason) => write!(f, "illegal move ({reason})"),
            ParseErrorKind::UnbalancedParenthesis => write!(f, "unbalanced parenthesis"),
            ParseErrorKind::VariationWithoutMove => {
                write!(f, "variation opened before any move")
            }
            ParseErrorKind::UnterminatedComment => write!(f, "unterminated comment"),
            ParseErrorKind::UnexpectedToken => write!(f, "unexpected token"),
            ParseErrorKind::TrailingText => write!(f, "text after game termination"),
            ParseErrorKind::Unreadable(reason) => write!(f, "unreadable game text ({reason})"),
        }
    }
}

/// Notation text could not be parsed
///
/// Carries enough context to point at the offending token. A partially
/// parsed tree is never returned alongside this error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at line {line}, column {column} near `{token}`")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Byte offset of the token in the input
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
    pub token: String,
}

impl ParseError {
    /// Build an error for the token starting at `offset` in `input`
    pub fn at(kind: ParseErrorKind, input: &str, offset: usize, token: &str) -> Self {
        let offset = offset.min(input.len());
        let before = input.get(..offset).unwrap_or(input);
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map(|s| s.chars().count())
            .unwrap_or(0)
            + 1;

        Self {
            kind,
            offset,
            line,
            column,
            token: token.to_string(),
        }
    }
}

/// Errors raised by a [`SessionStore`](crate::session::SessionStore)
#[derive(Error, Debug)]
pub enum StoreError {
    /// Session file I/O error
    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session record serialization/deserialization error
    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by an analysis session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("failed to parse session notation: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from loading or saving [`AnalysisSettings`](crate::core::AnalysisSettings)
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for rule engine calls
pub type RuleResult<T> = Result<T, RuleError>;

/// Result type alias for tree mutations
pub type TreeResult<T> = Result<T, TreeError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
