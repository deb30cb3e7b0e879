//! Variation tree
//!
//! An arena of [`PositionNode`]s addressed by [`NodeId`]. Parent links are
//! plain ids, ownership lives in the arena, so there is no reference cycle to
//! manage. The tree is mutated synchronously; callers serialize access.
//!
//! # Invariants
//!
//! - single root, acyclic, every child list agrees with its children's
//!   `parent` ids
//! - no two siblings hold the same [`BoardState`]; move application merges
//!   into the existing sibling instead of forking a duplicate
//! - `children[0]` is the mainline continuation, later indices are side
//!   variations in creation order unless promoted
//!
//! # Example
//!
//! ```rust
//! use xfchess_analysis::rules::ShakmatyRules;
//! use xfchess_analysis::tree::{CandidateMove, VariationTree};
//!
//! let rules = ShakmatyRules::new();
//! let mut tree = VariationTree::new();
//! let root = tree.root();
//! let end = tree
//!     .apply_line(&rules, root, &CandidateMove::san_line("e4 e5 Nf3"))
//!     .unwrap();
//! assert_eq!(tree.position_of(end).indices(), &[0, 0, 0]);
//! ```

use super::board_state::{BoardState, CandidateMove, MoveData, PlayedMove};
use super::node::{Annotation, NodeId, PositionNode};
use super::path::PositionPath;
use crate::core::error::{TreeError, TreeResult};
use crate::notation::Headers;
use crate::rules::RuleEngine;
use tracing::debug;

/// Result of merge-or-append move application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The move reached a position an existing child already holds
    Merged(NodeId),
    /// A new child was appended after the existing ones
    Appended(NodeId),
}

impl ApplyOutcome {
    pub fn node(self) -> NodeId {
        match self {
            ApplyOutcome::Merged(id) | ApplyOutcome::Appended(id) => id,
        }
    }

    pub fn is_merged(self) -> bool {
        matches!(self, ApplyOutcome::Merged(_))
    }
}

/// Where a position path led
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub node: NodeId,
    /// Number of path steps that could be followed
    pub depth: usize,
    /// Whether the path asked for a branch the tree does not have
    pub clamped: bool,
}

/// Branch-preserving tree of positions
#[derive(Debug, Clone)]
pub struct VariationTree {
    nodes: Vec<Option<PositionNode>>,
    root: NodeId,
    /// Occupied slots of `nodes`
    live: usize,
    /// Game metadata written ahead of the movetext
    pub headers: Headers,
}

impl Default for VariationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl VariationTree {
    /// Tree holding only the standard starting position
    pub fn new() -> Self {
        Self::from_state(BoardState::starting())
    }

    /// Single-node tree rooted at an arbitrary position
    ///
    /// Used after a board edit: the edited position has no history.
    pub fn from_state(state: BoardState) -> Self {
        Self {
            nodes: vec![Some(PositionNode::root(state))],
            root: NodeId(0),
            live: 1,
            headers: Headers::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&PositionNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut PositionNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn require(&self, id: NodeId) -> TreeResult<&PositionNode> {
        self.node(id).ok_or(TreeError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    /// A tree always holds its root
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Live nodes in creation order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &PositionNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i), n)))
    }

    pub fn state(&self, id: NodeId) -> Option<&BoardState> {
        self.node(id).map(PositionNode::state)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(PositionNode::parent)
    }

    /// Children of `id`, empty for unknown ids
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(PositionNode::children).unwrap_or(&[])
    }

    pub fn annotation_mut(&mut self, id: NodeId) -> Option<&mut Annotation> {
        self.node_mut(id).map(|n| &mut n.annotation)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Walk parent links up to the root
    pub fn top(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Follow the mainline (`children[0]`) down to a leaf
    pub fn bottom(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(&next) = self.children(current).first() {
            current = next;
        }
        current
    }

    /// Number of moves between the root and `id`
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Child indices from the root down to `id`
    pub fn position_of(&self, id: NodeId) -> PositionPath {
        let mut indices = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            let index = self
                .children(parent)
                .iter()
                .position(|&c| c == current)
                .unwrap_or(0);
            indices.push(index);
            current = parent;
        }
        indices.reverse();
        PositionPath::from(indices)
    }

    /// Follow `path` from the root as far as the tree allows
    pub fn locate(&self, path: &PositionPath) -> Located {
        let mut node = self.root;
        for (depth, &index) in path.indices().iter().enumerate() {
            match self.children(node).get(index) {
                Some(&child) => node = child,
                None => {
                    return Located {
                        node,
                        depth,
                        clamped: true,
                    }
                }
            }
        }
        Located {
            node,
            depth: path.len(),
            clamped: false,
        }
    }

    /// Node addressed by `path`, clamped to the deepest reachable prefix
    pub fn go_to_position(&self, path: &PositionPath) -> NodeId {
        let located = self.locate(path);
        if located.clamped {
            debug!(
                "[TREE] Path {} only reachable to depth {}; clamping",
                path, located.depth
            );
        }
        located.node
    }

    /// Mainline continuation after `id`, not including `id` itself
    pub fn mainline(&self, id: NodeId) -> Mainline<'_> {
        Mainline {
            tree: self,
            current: id,
        }
    }

    /// Originating moves from the root to `id`, in play order
    pub fn moves_to(&self, id: NodeId) -> Vec<&MoveData> {
        let mut moves = Vec::new();
        let mut current = id;
        while let Some(node) = self.node(current) {
            match (node.mv(), node.parent()) {
                (Some(mv), Some(parent)) => {
                    moves.push(mv);
                    current = parent;
                }
                _ => break,
            }
        }
        moves.reverse();
        moves
    }

    /// Mainline after `id` as space separated SAN, the format a game
    /// database stores lines in
    pub fn mainline_san(&self, id: NodeId) -> String {
        self.mainline(id)
            .filter_map(|n| self.node(n).and_then(PositionNode::mv))
            .map(|mv| mv.san.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Child of `parent` holding `state`, if any
    pub fn find_child(&self, parent: NodeId, state: &BoardState) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.state(c) == Some(state))
    }

    /// Merge-or-append a move the rule engine has already resolved
    ///
    /// When a child already holds the resulting state it is reused and
    /// `annotation` is dropped: board-state equality decides, not the move
    /// text or its comments.
    pub fn insert_played(
        &mut self,
        parent: NodeId,
        played: PlayedMove,
        annotation: Annotation,
    ) -> TreeResult<ApplyOutcome> {
        self.require(parent)?;

        if let Some(existing) = self.find_child(parent, &played.state) {
            debug!("[TREE] {} transposes into existing branch", played.mv.san);
            return Ok(ApplyOutcome::Merged(existing));
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(PositionNode {
            state: played.state,
            mv: Some(played.mv),
            parent: Some(parent),
            children: Vec::new(),
            annotation,
        }));
        self.live += 1;
        if let Some(node) = self.node_mut(parent) {
            node.children.push(id);
        }
        Ok(ApplyOutcome::Appended(id))
    }

    /// Play `candidate` from `parent`, reusing an existing branch when the
    /// resulting position is already a child
    ///
    /// # Errors
    ///
    /// - [`RuleError::IllegalMove`](crate::core::error::RuleError::IllegalMove):
    ///   nothing changes
    /// - [`RuleError::UnparseableBoardState`](crate::core::error::RuleError::UnparseableBoardState):
    ///   the position at `parent` cannot be played from; callers fall back to
    ///   raw edit semantics
    pub fn apply_move<R: RuleEngine + ?Sized>(
        &mut self,
        rules: &R,
        parent: NodeId,
        candidate: &CandidateMove,
    ) -> TreeResult<ApplyOutcome> {
        let state = self.require(parent)?.state().clone();
        let played = rules.play(&state, candidate)?;
        self.insert_played(parent, played, Annotation::default())
    }

    /// Graft a whole line onto the tree, starting at `start`
    ///
    /// Every step follows [`apply_move`](Self::apply_move). The line is
    /// validated completely before anything is inserted, so an illegal move
    /// anywhere leaves the tree untouched. Returns the last node reached.
    pub fn apply_line<R: RuleEngine + ?Sized>(
        &mut self,
        rules: &R,
        start: NodeId,
        line: &[CandidateMove],
    ) -> TreeResult<NodeId> {
        let mut state = self.require(start)?.state().clone();
        let mut resolved = Vec::with_capacity(line.len());
        for candidate in line {
            let played = rules.play(&state, candidate)?;
            state = played.state.clone();
            resolved.push(played);
        }

        let mut current = start;
        for played in resolved {
            current = self
                .insert_played(current, played, Annotation::default())?
                .node();
        }
        Ok(current)
    }

    /// [`apply_line`](Self::apply_line) for a space separated SAN string
    pub fn apply_san_line<R: RuleEngine + ?Sized>(
        &mut self,
        rules: &R,
        start: NodeId,
        line: &str,
    ) -> TreeResult<NodeId> {
        self.apply_line(rules, start, &CandidateMove::san_line(line))
    }

    /// Detach `id` and its whole subtree
    ///
    /// Returns `false` (and does nothing) for the root or an unknown id.
    /// The caller relocates any cursor that pointed into the subtree.
    pub fn delete_variation(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|&c| c != id);
        }

        let mut stack = vec![id];
        let mut removed = 0usize;
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(next.0).and_then(|slot| slot.take()) {
                stack.extend(node.children);
                removed += 1;
            }
        }
        self.live -= removed;
        debug!("[TREE] Deleted variation {:?} ({} nodes)", id, removed);
        true
    }

    /// Make `id` its parent's mainline continuation
    ///
    /// The other siblings keep their relative order. Returns `false` for the
    /// root or an unknown id.
    pub fn promote_variation(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        let Some(node) = self.node_mut(parent) else {
            return false;
        };
        let Some(index) = node.children.iter().position(|&c| c == id) else {
            return false;
        };
        let promoted = node.children.remove(index);
        node.children.insert(0, promoted);
        true
    }
}

/// Iterator over a mainline continuation, see [`VariationTree::mainline`]
pub struct Mainline<'a> {
    tree: &'a VariationTree,
    current: NodeId,
}

impl Iterator for Mainline<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let next = *self.tree.children(self.current).first()?;
        self.current = next;
        Some(next)
    }
}
