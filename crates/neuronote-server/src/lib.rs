//! NeuroNote HTTP API: accounts, uploads, generated notes, flashcards,
//! chat, and the notebook canvas.

pub mod auth;
pub mod error;
pub mod mailer;
pub mod pipeline;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
