//! XFChess analysis board engine
//!
//! A game is explored as a tree of positions: the mainline plus any number
//! of nested side variations. This crate holds that tree, the notation codec
//! that turns it into text and back, and the session layer that keeps a
//! cursor in it across reloads.
//!
//! # Module Structure
//!
//! - [`tree`] - positions, moves and the [`VariationTree`](tree::VariationTree)
//! - [`rules`] - the [`RuleEngine`](rules::RuleEngine) boundary and a local
//!   implementation
//! - [`notation`] - parse and write game notation text
//! - [`session`] - cursor, edit modes, persistence and export
//! - [`core`] - errors, settings, logging
//!
//! # Example
//!
//! ```rust
//! use xfchess_analysis::notation::{parse, write_game, WriteOptions};
//! use xfchess_analysis::rules::ShakmatyRules;
//!
//! let rules = ShakmatyRules::new();
//! let tree = parse("1. e4 e5 (1... c5) 2. Nf3 *", &rules).unwrap();
//! assert_eq!(tree.len(), 5);
//! assert_eq!(
//!     write_game(&tree, &WriteOptions::default()),
//!     "1. e4 e5 (1... c5) 2. Nf3 *\n"
//! );
//! ```

pub mod core;
pub mod notation;
pub mod rules;
pub mod session;
pub mod tree;
