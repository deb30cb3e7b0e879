//! Export a whole game to a `.pgn` file

use crate::core::error::StoreError;
use crate::notation::{write_game, WriteOptions};
use crate::tree::VariationTree;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const EXPORT_EXTENSION: &str = "pgn";

/// Write the full tree, comments and symbols included, to `path`
///
/// The extension is forced to `.pgn`. Returns the path actually written.
pub fn export_pgn(tree: &VariationTree, path: impl AsRef<Path>) -> Result<PathBuf, StoreError> {
    export_with(tree, path, &WriteOptions::default())
}

/// [`export_pgn`] with explicit write options
pub fn export_with(
    tree: &VariationTree,
    path: impl AsRef<Path>,
    options: &WriteOptions,
) -> Result<PathBuf, StoreError> {
    let path = path.as_ref().with_extension(EXPORT_EXTENSION);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, write_game(tree, options))?;
    info!("[STORE] Exported game to {:?}", path);
    Ok(path)
}
