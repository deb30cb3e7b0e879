//! Notation codec
//!
//! Reads and writes the linear game notation: tag pairs, then movetext with
//! move numbers, comments, move-quality symbols and parenthesized side
//! variations.
//!
//! # Round trip
//!
//! With every [`WriteOptions`] flag on, `parse(write_game(tree))` gives a
//! tree with the same board state at every [`PositionPath`] of the original.
//! Session persistence depends on this.
//!
//! [`PositionPath`]: crate::tree::PositionPath

pub mod headers;
mod lexer;
pub mod parser;
pub mod writer;

pub use headers::{Headers, Outcome, Speed};
pub use parser::parse;
pub use writer::{write, write_game, WriteOptions};
