//! Variation tree engine
//!
//! Pure data structure code with no I/O: positions, moves, the arena-backed
//! tree and the path scheme used to find a node again after a reload.
//!
//! # Module Structure
//!
//! - `board_state` - [`BoardState`] (FEN), [`MoveData`], [`CandidateMove`]
//! - `node` - [`PositionNode`], [`NodeId`], [`Annotation`], [`Nag`]
//! - `path` - [`PositionPath`]
//! - `variation_tree` - [`VariationTree`] navigation and mutation

pub mod board_state;
pub mod node;
pub mod path;
pub mod variation_tree;


pub use board_state::{BoardState, CandidateMove, MoveData, PlayedMove, STARTING_FEN};
pub use node::{Annotation, Nag, NodeId, PositionNode};
pub use path::PositionPath;
pub use variation_tree::{ApplyOutcome, Located, Mainline, VariationTree};
