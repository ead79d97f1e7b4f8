//! NeuroNote Core: error taxonomy, configuration, data directory layout.

pub mod config;
pub mod error;

pub use config::{DataPaths, NeuroNoteConfig};
pub use error::{Error, ErrorClass, Result};
