//! Quad-grid mesh produced by the geometry-image decoder.

use nalgebra::{Point3, Vector3};

use crate::error::{CodecError, Result};

/// A mesh of quadrilateral faces, optionally carrying per-vertex normals.
///
/// Face indices are zero-based; the 1-based convention of the decoder's
/// record stream is converted when the mesh is built.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadMesh {
    positions: Vec<Point3<f64>>,
    normals: Option<Vec<Vector3<f64>>>,
    faces: Vec<[usize; 4]>,
}

impl QuadMesh {
    /// Build a quad mesh, validating that every face index is in range and
    /// that the normal field (if any) has one entry per vertex.
    pub fn new(
        positions: Vec<Point3<f64>>,
        normals: Option<Vec<Vector3<f64>>>,
        faces: Vec<[usize; 4]>,
    ) -> Result<Self> {
        if positions.is_empty() {
            return Err(CodecError::EmptyMesh);
        }
        if let Some(n) = &normals {
            if n.len() != positions.len() {
                return Err(CodecError::invalid_param(
                    "normals",
                    n.len(),
                    "normal count must equal vertex count",
                ));
            }
        }
        for (fi, face) in faces.iter().enumerate() {
            if let Some(&vertex) = face.iter().find(|&&v| v >= positions.len()) {
                return Err(CodecError::InvalidVertexIndex { face: fi, vertex });
            }
        }
        Ok(Self {
            positions,
            normals,
            faces,
        })
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Vertex positions.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Per-vertex normals, when decoded.
    #[inline]
    pub fn normals(&self) -> Option<&[Vector3<f64>]> {
        self.normals.as_deref()
    }

    /// Quad faces.
    #[inline]
    pub fn faces(&self) -> &[[usize; 4]] {
        &self.faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_mesh_validation() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh = QuadMesh::new(positions.clone(), None, vec![[0, 1, 2, 3]]).unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 1);
        assert!(mesh.normals().is_none());

        assert!(matches!(
            QuadMesh::new(positions.clone(), None, vec![[0, 1, 2, 4]]),
            Err(CodecError::InvalidVertexIndex { face: 0, vertex: 4 })
        ));
        assert!(QuadMesh::new(positions, Some(vec![Vector3::z()]), Vec::new()).is_err());
    }
}
