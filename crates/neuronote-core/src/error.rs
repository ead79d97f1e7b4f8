//! Error types for NeuroNote.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} is required")]
    MissingField(String),

    #[error("{0}")]
    Validation(String),

    #[error("Password must be at least {min_len} characters long")]
    WeakPassword { min_len: usize },

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Document key already exists: {0}")]
    DuplicateKey(String),

    #[error(
        "You can only change your username once a week. Try again in {remaining_days} day(s)"
    )]
    CooldownActive { remaining_days: i64 },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Conflict,
    Unauthorized,
    Forbidden,
    NotFound,
    Upstream,
    Internal,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingField(_)
            | Self::Validation(_)
            | Self::WeakPassword { .. }
            | Self::CooldownActive { .. } => ErrorClass::Validation,
            Self::DuplicateUsername | Self::DuplicateEmail | Self::DuplicateKey(_) => {
                ErrorClass::Conflict
            }
            Self::InvalidCredentials | Self::Unauthorized(_) => ErrorClass::Unauthorized,
            Self::Forbidden(_) => ErrorClass::Forbidden,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::ExtractionFailed(_) | Self::GenerationFailed(_) => ErrorClass::Upstream,
            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Internal(_) => ErrorClass::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
