//! # flatgi
//!
//! Geometry images for planar-parameterized triangle meshes.
//!
//! A triangle mesh that has been mapped onto the unit square is rasterized
//! into a fixed-size RGB image whose pixels store surface positions (and,
//! optionally, a second image of normals). The image can be decoded back into
//! a regular quad grid.
//!
//! ## Features
//!
//! - **Encoding**: barycentric rasterization, diffusion inpainting of empty
//!   pixels and shared-divisor 8-bit packing to PNG
//! - **Decoding**: one vertex per pixel, with optional downscaling
//! - **Preprocessing**: mid-plane slicing of symmetric shapes
//! - **Batch pipeline**: resumable per-file processing driven by list files,
//!   with mesh repair and parameterization delegated to external services
//!
//! ## Quick Start
//!
//! ```
//! use flatgi::prelude::*;
//! use nalgebra::Point3;
//!
//! // Flat mesh: vertices are (u, v, 0).
//! let flat = TriMesh::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     vec![[0, 1, 2], [0, 2, 3]],
//! )
//! .unwrap();
//!
//! // Surface mesh with the same vertex indexing.
//! let surface = TriMesh::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(2.0, 0.0, 0.0),
//!         Point3::new(2.0, 1.0, 1.0),
//!         Point3::new(0.0, 1.0, 1.0),
//!     ],
//!     vec![[0, 1, 2], [0, 2, 3]],
//! )
//! .unwrap();
//!
//! let mesh = ParameterizedMesh::new(&flat, surface).unwrap();
//! let images = Encoder::new(EncodeOptions::default().with_im_size(32))
//!     .encode(&mesh, None)
//!     .unwrap();
//!
//! let grid = flatgi::codec::decode::decode_images(&images.position, None).unwrap();
//! assert_eq!(grid.num_vertices(), 32 * 32);
//! assert_eq!(grid.num_faces(), 31 * 31);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod codec;
pub mod error;
pub mod io;
pub mod mesh;
pub mod pipeline;

/// Prelude module for convenient imports.
///
/// ```
/// use flatgi::prelude::*;
/// ```
pub mod prelude {
    pub use crate::codec::{
        DecodeOptions, EncodeOptions, Encoder, GeometryImagePaths, InpaintOptions, PackOptions,
    };
    pub use crate::error::{CodecError, Result};
    pub use crate::io::artifact::StageOutcome;
    pub use crate::mesh::{ParameterizedMesh, QuadMesh, TriMesh, UVMap};
}

// Re-export nalgebra types for convenience
pub use nalgebra;
