//! Source extractors
//!
//! Turn uploaded files into structured metadata for the analysis pipeline.

pub mod mesh;

pub use mesh::{extract_metadata, MeshError, MeshFormat, MeshMetadata};
