//! Mesh algorithms supporting the geometry-image codec.
//!
//! - **Normals**: area-weighted vertex normals for the normal channels
//! - **Slicing**: mid-plane clipping of symmetric shapes
//! - **Refinement**: centroid splitting of coarse triangles after slicing
//! - **Progress**: callback plumbing shared by long-running stages

pub mod normals;
mod progress;
pub mod refine;
pub mod slice;

pub use normals::vertex_normals;
pub use progress::Progress;
pub use refine::{refine, RefineOptions};
