//! Domain types for the image batch service.
//!
//! Pure building blocks shared by the pipeline and the HTTP layer: job
//! lifecycle types, the in-memory job registry, image reference handling and
//! the input/output table codec.

pub mod error;
pub mod image_ref;
pub mod job;
pub mod registry;
pub mod table;
pub mod types;
