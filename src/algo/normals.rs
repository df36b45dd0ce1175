//! Per-vertex normals.

use log::debug;
use nalgebra::Vector3;

use crate::mesh::TriMesh;

/// Compute vertex normals as the area-weighted average of incident face normals.
///
/// Returns one vector per vertex, in vertex order. Vertices with no incident
/// area get the zero vector.
pub fn vertex_normals(mesh: &TriMesh) -> Vec<Vector3<f64>> {
    let mut accum: Vec<Vector3<f64>> = vec![Vector3::zeros(); mesh.num_vertices()];

    for (fi, face) in mesh.faces().iter().enumerate() {
        // Length is twice the face area, which gives the weighting for free.
        let weighted = mesh.face_normal_unnormalized(fi);
        for &v in face {
            accum[v] += weighted;
        }
    }

    for n in &mut accum {
        let len_sq = n.norm_squared();
        if len_sq > f64::EPSILON * f64::EPSILON {
            *n /= len_sq.sqrt();
        } else {
            *n = Vector3::zeros();
        }
    }

    debug!("Computed vertex normals for {} vertices", mesh.num_vertices());
    accum
}
