//! Error types for the image pipeline.
//!
//! [`FetchError`] and [`TransformError`] are contained at image granularity
//! (they turn into a sentinel slot in the output table). [`EngineError`] is
//! the only one that can fail a whole job.

use std::path::PathBuf;

use imgbatch_core::error::CoreError;
use imgbatch_core::table::TableError;

/// An environment variable held a value the pipeline cannot use.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be {expected}, got '{value}'")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Acquiring the raw bytes of an image failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The local path does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The local file exists but could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote returned a non-2xx status code.
    #[error("Remote returned {status} for {url}")]
    Status { status: u16, url: String },

    /// The remote returned an empty body.
    #[error("Remote returned an empty body for {0}")]
    EmptyBody(String),
}

/// Resizing or re-encoding an image failed.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The resized image would exceed the output pixel cap.
    #[error("Resized image would be {width}x{height} pixels, over the limit")]
    TooLarge { width: u32, height: u32 },

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking transform task panicked or was cancelled.
    #[error("Transform task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Any failure in the fetch-then-transform stage of one image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Job-level failure of the batch engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The input table could not be read.
    #[error(transparent)]
    Table(#[from] TableError),

    /// The output table could not be written.
    #[error("Failed to write output table {}: {source}", .path.display())]
    WriteTable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A row or reader task panicked.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
