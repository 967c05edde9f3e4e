//! Domain error types.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning an upload into image bytes on disk.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("'{filename}' is not a base64 data URL")]
    InvalidDataUrl { filename: String },

    #[error("'{filename}' has an invalid base64 payload")]
    InvalidBase64 {
        filename: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("image file {} was not found", .path.display())]
    ImageNotFound { path: PathBuf },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while reading the vocabulary list out of the model's reply.
#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("Vocabulary extraction failed: invalid JSON")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Vocabulary extraction failed: response is not a JSON object")]
    NotAnObject,

    #[error("Vocabulary extraction failed: key `vocabulary_lst` missing")]
    MissingKey,

    #[error("Vocabulary extraction failed: `vocabulary_lst` is not a list")]
    NotAList,

    #[error("Vocabulary extraction failed: entry {index} {reason}")]
    MalformedEntry { index: usize, reason: String },
}
