//! Position paths
//!
//! A path is the list of child indices walked from the root to reach a node.
//! Node ids die with the tree; paths are what gets persisted, and they are
//! re-walked against a freshly parsed tree to put the cursor back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered child indices from the root, `[]` addressing the root itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionPath(Vec<usize>);

impl PositionPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index into the mainline at every step
    pub fn is_mainline(&self) -> bool {
        self.0.iter().all(|&i| i == 0)
    }

    pub fn push(&mut self, index: usize) {
        self.0.push(index);
    }

    /// The path with its last step removed, or `None` for the root
    pub fn parent(&self) -> Option<PositionPath> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }
}

impl From<Vec<usize>> for PositionPath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl From<&[usize]> for PositionPath {
    fn from(indices: &[usize]) -> Self {
        Self(indices.to_vec())
    }
}

impl fmt::Display for PositionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "[{}]", parts.join(","))
    }
}

impl FromStr for PositionPath {
    type Err = std::num::ParseIntError;

    /// Accepts `0,1,0`, `0.1.0`, `[0, 1, 0]` and the empty string
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(|c: char| c == ',' || c == '.' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<usize>, _>>()
            .map(PositionPath)
    }
}
