//! NeuroNote Ingest: upload blob storage and text extraction.

pub mod file;
pub mod upload;

pub use file::{FileExtractor, FileType, TextExtractor};
pub use upload::{remove_blob, sanitize_filename, save_upload};
