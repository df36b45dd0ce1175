//! Indexed triangle mesh.

use nalgebra::{Point3, Vector3};

use crate::error::{CodecError, Result};

/// A triangle mesh stored as a vertex list and a face-vertex index list.
///
/// Vertex order is significant: a flat (parameterized) mesh and its surface
/// mesh pair up vertex `i` with vertex `i`, so no operation here reorders
/// vertices unless it says so.
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    positions: Vec<Point3<f64>>,
    faces: Vec<[usize; 3]>,
}

impl TriMesh {
    /// Build a mesh from vertex positions and triangle faces.
    ///
    /// # Errors
    ///
    /// - [`CodecError::EmptyMesh`] if there are no vertices or no faces
    /// - [`CodecError::InvalidVertexIndex`] if a face references a missing vertex
    /// - [`CodecError::DegenerateFace`] if a face repeats a vertex
    ///
    /// # Example
    ///
    /// ```
    /// use flatgi::mesh::TriMesh;
    /// use nalgebra::Point3;
    ///
    /// let mesh = TriMesh::new(
    ///     vec![
    ///         Point3::new(0.0, 0.0, 0.0),
    ///         Point3::new(1.0, 0.0, 0.0),
    ///         Point3::new(0.0, 1.0, 0.0),
    ///     ],
    ///     vec![[0, 1, 2]],
    /// )
    /// .unwrap();
    /// assert_eq!(mesh.num_faces(), 1);
    /// ```
    pub fn new(positions: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Result<Self> {
        if positions.is_empty() || faces.is_empty() {
            return Err(CodecError::EmptyMesh);
        }

        for (fi, face) in faces.iter().enumerate() {
            for &vi in face {
                if vi >= positions.len() {
                    return Err(CodecError::InvalidVertexIndex { face: fi, vertex: vi });
                }
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return Err(CodecError::DegenerateFace { face: fi });
            }
        }

        Ok(Self { positions, faces })
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

    /// Vertex positions, indexed by vertex.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Triangle faces.
    #[inline]
    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// Position of vertex `v`.
    #[inline]
    pub fn position(&self, v: usize) -> &Point3<f64> {
        &self.positions[v]
    }

    /// The three corner positions of face `f`.
    #[inline]
    pub fn triangle(&self, f: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.faces[f];
        [self.positions[a], self.positions[b], self.positions[c]]
    }

    /// Face normal scaled by twice the face area.
    pub fn face_normal_unnormalized(&self, f: usize) -> Vector3<f64> {
        let [p0, p1, p2] = self.triangle(f);
        (p1 - p0).cross(&(p2 - p0))
    }

    /// Area of face `f`.
    pub fn face_area(&self, f: usize) -> f64 {
        0.5 * self.face_normal_unnormalized(f).norm()
    }

    /// Axis-aligned bounding box `(min, max)` of all vertices.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.positions.first()?;
        let (mut min, mut max) = (first, first);
        for p in &self.positions {
            min = min.inf(p);
            max = max.sup(p);
        }
        Some((min, max))
    }

    /// Move every vertex by `offset`.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for p in &mut self.positions {
            *p += offset;
        }
    }

    /// Consume the mesh, returning its positions and faces.
    pub fn into_parts(self) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        (self.positions, self.faces)
    }
}
