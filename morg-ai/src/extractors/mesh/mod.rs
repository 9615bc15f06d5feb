//! Mesh metadata extraction
//!
//! Parses STL (binary and ASCII), OBJ and 3MF files into a geometric
//! summary: triangle count, axis-aligned bounding box and enclosed volume.
//!
//! Parsers never keep the whole triangle list; each triangle is folded into
//! a [`MeshAccumulator`] as it is read.

pub mod obj;
pub mod stl;
pub mod threemf;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

/// Upper bound on triangles accepted from a single file
pub const MAX_TRIANGLES: u64 = 10_000_000;

/// Mesh extraction errors
#[derive(Debug, Error)]
pub enum MeshError {
    /// File could not be read
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Neither extension nor content identify a supported format
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    /// File content does not match the format
    #[error("Failed to parse {format}: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    /// File declares more triangles than we accept
    #[error("Failed to parse {format}: {count} triangles exceeds limit of {limit}")]
    TooManyTriangles {
        format: &'static str,
        count: u64,
        limit: u64,
    },

    /// File parsed but contains no triangles
    #[error("Failed to parse {0}: mesh contains no triangles")]
    Empty(&'static str),
}

impl MeshError {
    pub(crate) fn parse(format: MeshFormat, message: impl Into<String>) -> Self {
        MeshError::Parse {
            format: format.label(),
            message: message.into(),
        }
    }

    pub(crate) fn too_many(format: MeshFormat, count: u64) -> Self {
        MeshError::TooManyTriangles {
            format: format.label(),
            count,
            limit: MAX_TRIANGLES,
        }
    }
}

/// Supported 3D model formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshFormat {
    Stl,
    Obj,
    #[serde(rename = "3mf")]
    ThreeMf,
}

impl MeshFormat {
    /// Detect format from file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "stl" => Some(MeshFormat::Stl),
            "obj" => Some(MeshFormat::Obj),
            "3mf" => Some(MeshFormat::ThreeMf),
            _ => None,
        }
    }

    /// Detect format from content
    ///
    /// OBJ has no signature and is only recognized by extension.
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"PK\x03\x04") {
            return Some(MeshFormat::ThreeMf);
        }
        if stl::looks_binary(bytes) || stl::looks_ascii(bytes) {
            return Some(MeshFormat::Stl);
        }
        None
    }

    /// Lowercase extension form ("stl", "obj", "3mf")
    pub fn as_str(&self) -> &'static str {
        match self {
            MeshFormat::Stl => "stl",
            MeshFormat::Obj => "obj",
            MeshFormat::ThreeMf => "3mf",
        }
    }

    /// Uppercase form used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            MeshFormat::Stl => "STL",
            MeshFormat::Obj => "OBJ",
            MeshFormat::ThreeMf => "3MF",
        }
    }
}

/// Running triangle statistics
#[derive(Debug, Clone)]
pub struct MeshAccumulator {
    triangles: u64,
    min: Vector3<f64>,
    max: Vector3<f64>,
    signed_volume: f64,
}

impl Default for MeshAccumulator {
    fn default() -> Self {
        Self {
            triangles: 0,
            min: Vector3::repeat(f64::INFINITY),
            max: Vector3::repeat(f64::NEG_INFINITY),
            signed_volume: 0.0,
        }
    }
}

impl MeshAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triangle_count(&self) -> u64 {
        self.triangles
    }

    /// Fold one triangle into the totals
    pub fn add_triangle(&mut self, a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) {
        for v in [&a, &b, &c] {
            self.min = self.min.inf(v);
            self.max = self.max.sup(v);
        }
        // signed volume of the tetrahedron formed with the origin
        self.signed_volume += a.dot(&b.cross(&c)) / 6.0;
        self.triangles += 1;
    }

    /// Summarize; fails on an empty mesh
    pub fn finish(self, format: MeshFormat) -> Result<MeshSummary, MeshError> {
        if self.triangles == 0 {
            return Err(MeshError::Empty(format.label()));
        }
        Ok(MeshSummary {
            num_triangles: self.triangles,
            bounding_box_min: [self.min.x, self.min.y, self.min.z],
            bounding_box_max: [self.max.x, self.max.y, self.max.z],
            volume: self.signed_volume.abs(),
        })
    }
}

/// Geometry derived from a parsed mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSummary {
    pub num_triangles: u64,
    pub bounding_box_min: [f64; 3],
    pub bounding_box_max: [f64; 3],
    pub volume: f64,
}

/// Metadata reported for an uploaded model file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshMetadata {
    pub num_triangles: u64,
    pub bounding_box_min: [f64; 3],
    pub bounding_box_max: [f64; 3],
    pub volume: f64,
    pub filename: String,
    pub format: MeshFormat,
    pub file_size_bytes: u64,
    pub sha256: String,
}

/// Parse mesh content of a known format
pub fn parse_bytes(format: MeshFormat, bytes: &[u8]) -> Result<MeshSummary, MeshError> {
    match format {
        MeshFormat::Stl => stl::parse(bytes),
        MeshFormat::Obj => obj::parse(bytes),
        MeshFormat::ThreeMf => threemf::parse(bytes),
    }
}

/// Extract metadata from in-memory file content
///
/// The extension of `filename` selects the format; content sniffing is the
/// fallback for unknown extensions.
pub fn extract_from_bytes(filename: &str, bytes: &[u8]) -> Result<MeshMetadata, MeshError> {
    let format = MeshFormat::from_path(Path::new(filename))
        .or_else(|| MeshFormat::from_magic_bytes(bytes))
        .ok_or_else(|| MeshError::UnsupportedFormat(filename.to_string()))?;

    let summary = parse_bytes(format, bytes)?;
    let sha256 = format!("{:x}", Sha256::digest(bytes));

    tracing::debug!(
        file = %filename,
        format = format.as_str(),
        triangles = summary.num_triangles,
        volume = summary.volume,
        "Extracted mesh metadata"
    );

    Ok(MeshMetadata {
        num_triangles: summary.num_triangles,
        bounding_box_min: summary.bounding_box_min,
        bounding_box_max: summary.bounding_box_max,
        volume: summary.volume,
        filename: filename.to_string(),
        format,
        file_size_bytes: bytes.len() as u64,
        sha256,
    })
}

/// Extract metadata from a model file on disk
pub fn extract_metadata(path: &Path) -> Result<MeshMetadata, MeshError> {
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    extract_from_bytes(&filename, &bytes)
}
