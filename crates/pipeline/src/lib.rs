//! Image batch pipeline.
//!
//! Turns an uploaded product table into resized, recompressed images and an
//! output table:
//!
//! - [`fetcher`] pulls raw image bytes from URLs or local paths.
//! - [`transformer`] resizes to a fixed width and re-encodes as JPEG.
//! - [`row`] fans out the images of one row and keeps their order.
//! - [`engine`] runs whole jobs in the background and records their outcome
//!   in the shared [`JobRegistry`](imgbatch_core::registry::JobRegistry).

pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod row;
pub mod transformer;

#[cfg(test)]
mod testing;

pub use config::PipelineConfig;
pub use engine::BatchEngine;
pub use error::{ConfigError, EngineError, FetchError, ImageError, TransformError};
pub use fetcher::{HttpFetcher, ImageFetcher};
