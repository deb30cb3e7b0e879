//! Position nodes
//!
//! A node is created once by a tree mutation and never changes its board
//! state or originating move afterwards. Only its child list (owned by the
//! tree) and its annotation slots are mutable.

use super::board_state::{BoardState, MoveData};
use std::fmt;

/// Stable handle of a node inside one [`VariationTree`](super::VariationTree)
///
/// Ids are arena indices. They are never reused within a tree, so a handle
/// to a deleted node simply stops resolving. Ids do not survive a reload;
/// use a [`PositionPath`](super::PositionPath) for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Numeric annotation glyph (`$1` .. `$255`)
///
/// The six move-quality glyphs have symbol forms (`!`, `?`, `!!`, `??`,
/// `!?`, `?!`) and are written that way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nag(pub u8);

impl Nag {
    pub const GOOD_MOVE: Nag = Nag(1);
    pub const MISTAKE: Nag = Nag(2);
    pub const BRILLIANT_MOVE: Nag = Nag(3);
    pub const BLUNDER: Nag = Nag(4);
    pub const SPECULATIVE_MOVE: Nag = Nag(5);
    pub const DUBIOUS_MOVE: Nag = Nag(6);

    pub fn from_symbol(symbol: &str) -> Option<Nag> {
        match symbol {
            "!" => Some(Nag::GOOD_MOVE),
            "?" => Some(Nag::MISTAKE),
            "!!" => Some(Nag::BRILLIANT_MOVE),
            "??" => Some(Nag::BLUNDER),
            "!?" => Some(Nag::SPECULATIVE_MOVE),
            "?!" => Some(Nag::DUBIOUS_MOVE),
            _ => None,
        }
    }

    pub fn symbol(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("!"),
            2 => Some("?"),
            3 => Some("!!"),
            4 => Some("??"),
            5 => Some("!?"),
            6 => Some("?!"),
            _ => None,
        }
    }
}

impl fmt::Display for Nag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.symbol() {
            Some(symbol) => f.write_str(symbol),
            None => write!(f, "${}", self.0),
        }
    }
}

/// Free-form annotation slots of a node
///
/// For a move node these annotate the originating move. On the root,
/// `comment` holds the comment that precedes the first move of the game.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Glyphs attached to the move, in the order they were given
    pub nags: Vec<Nag>,
    /// Comment following the move
    pub comment: Option<String>,
    /// Comment written before the move, typically opening a variation
    pub pre_comment: Option<String>,
}

impl Annotation {
    pub fn is_empty(&self) -> bool {
        self.nags.is_empty() && self.comment.is_none() && self.pre_comment.is_none()
    }

    /// Append to the trailing comment, joining repeated comments with a space
    pub fn push_comment(&mut self, text: &str) {
        push_text(&mut self.comment, text);
    }

    pub fn push_pre_comment(&mut self, text: &str) {
        push_text(&mut self.pre_comment, text);
    }
}

fn push_text(slot: &mut Option<String>, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    match slot {
        Some(existing) => {
            existing.push(' ');
            existing.push_str(text);
        }
        None => *slot = Some(text.to_string()),
    }
}

/// One position in the variation tree
#[derive(Debug, Clone)]
pub struct PositionNode {
    pub(crate) state: BoardState,
    pub(crate) mv: Option<MoveData>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub annotation: Annotation,
}

impl PositionNode {
    pub(crate) fn root(state: BoardState) -> Self {
        Self {
            state,
            mv: None,
            parent: None,
            children: Vec::new(),
            annotation: Annotation::default(),
        }
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    /// The move that led here; `None` only for a root
    pub fn mv(&self) -> Option<&MoveData> {
        self.mv.as_ref()
    }

    /// Non-owning back reference to the parent
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children, mainline continuation first
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
