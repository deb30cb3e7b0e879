//! Core module - errors, settings and logging shared by the whole crate
//!
//! # Module Structure
//!
//! - `error` - error enums and `Result` aliases for every layer
//! - `settings` - [`AnalysisSettings`] loaded from the user config dir
//! - `logging` - `tracing` subscriber setup for binaries

pub mod error;
pub mod logging;
pub mod settings;

pub use error::{
    ParseError, ParseErrorKind, RuleError, SessionError, SettingsError, StoreError, TreeError,
};
pub use logging::init_logging;
pub use settings::AnalysisSettings;
