//! Mesh file I/O and artifact checks.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | OFF | `.off` | ✓ | ✓ | Pipeline interchange format; grids with normals save as `NOFF` |
//! | PLY | `.ply` | ✓ | ✓ | Saved quad grids keep their normals |
//!
//! Geometry images themselves are PNG files handled by [`crate::codec`].
//!
//! # Usage
//!
//! ```no_run
//! use flatgi::io::{load, save};
//!
//! let mesh = load("model.ply").unwrap();
//! save(&mesh, "model.off").unwrap();
//! ```

pub mod artifact;
pub mod off;
pub mod ply;

use std::path::Path;

use crate::error::{CodecError, Result};
use crate::mesh::{QuadMesh, TriMesh};

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Object File Format.
    Off,
    /// PLY (Stanford polygon) format.
    Ply,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "off" => Some(Format::Off),
            "ply" => Some(Format::Ply),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

fn detect(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| CodecError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a triangle mesh with automatic format detection.
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriMesh> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Off => off::load(path),
        Format::Ply => ply::load(path),
    }
}

/// Save a triangle mesh with automatic format detection.
pub fn save<P: AsRef<Path>>(mesh: &TriMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Off => off::save(mesh, path),
        Format::Ply => ply::save(mesh, path),
    }
}

/// Save a quad mesh with automatic format detection.
pub fn save_quads<P: AsRef<Path>>(mesh: &QuadMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Off => off::save_quads(mesh, path),
        Format::Ply => ply::save_quads(mesh, path),
    }
}
