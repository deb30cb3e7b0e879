//! Analysis sessions and their persistence
//!
//! - `editor` - [`AnalysisSession`]: cursor, edit mode, move requests
//! - `store` - [`SessionRecord`] and the [`SessionStore`] implementations
//! - `export` - writing a game to a `.pgn` file

pub mod editor;
pub mod export;
pub mod store;

pub use editor::{AnalysisSession, EditMode, PendingMove};
pub use export::{export_pgn, export_with};
pub use store::{JsonFileStore, MemoryStore, SessionRecord, SessionStore};
