//! Core mesh data structures.
//!
//! # Overview
//!
//! - [`TriMesh`]: indexed triangle mesh, used for both the surface mesh and
//!   the flat (parameterized) mesh whose vertices are `(u, v, 0)`.
//! - [`UVMap`] and [`ParameterizedMesh`]: the per-vertex planar coordinates
//!   and their 1:1 pairing with a surface mesh.
//! - [`QuadMesh`]: the regular grid mesh rebuilt from a geometry image.
//! - [`topology`]: boundary loops and connected components.
//!
//! # Construction
//!
//! ```
//! use flatgi::mesh::TriMesh;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let mesh = TriMesh::new(vertices, faces).unwrap();
//! assert_eq!(mesh.num_vertices(), 3);
//! ```

mod quad;
pub mod topology;
mod trimesh;
mod uv;

pub use quad::QuadMesh;
pub use topology::BoundaryLoop;
pub use trimesh::TriMesh;
pub use uv::{ParameterizedMesh, UVMap};
