//! UV coordinate storage and the flat/surface mesh pairing.
//!
//! A planar parameterization is stored as a [`UVMap`] (one 2D point per
//! vertex). [`ParameterizedMesh`] couples that map with the surface mesh it
//! was computed for, enforcing the 1:1 vertex correspondence the encoder
//! relies on.

use nalgebra::{Point2, Point3};

use crate::error::{CodecError, Result};

use super::TriMesh;

/// UV coordinates for mesh vertices.
///
/// Coordinates normally lie in the unit square; the first axis may extend to
/// twice that for slice-symmetric shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct UVMap {
    coords: Vec<Point2<f64>>,
}

impl UVMap {
    /// Create a UV map, index `i` holding the coordinates of vertex `i`.
    pub fn new(coords: Vec<Point2<f64>>) -> Self {
        Self { coords }
    }

    /// Read the UVs of a flat mesh stored as `(u, v, 0)` positions.
    pub fn from_flat_mesh(flat: &TriMesh) -> Self {
        Self::new(flat.positions().iter().map(|p| Point2::new(p.x, p.y)).collect())
    }

    /// UV coordinates of vertex `v`.
    #[inline]
    pub fn get(&self, v: usize) -> Point2<f64> {
        self.coords[v]
    }

    /// Number of UV coordinates.
    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Check if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Iterate over all UV coordinates with their vertex indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Point2<f64>)> + '_ {
        self.coords.iter().copied().enumerate()
    }

    /// Get the raw coordinates slice.
    pub fn as_slice(&self) -> &[Point2<f64>] {
        &self.coords
    }

    /// Compute the bounding box of the UV coordinates.
    ///
    /// Returns `None` if the UV map is empty.
    pub fn bounding_box(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        let first = *self.coords.first()?;
        let (mut min, mut max) = (first, first);
        for uv in &self.coords {
            min = min.inf(uv);
            max = max.sup(uv);
        }
        Some((min, max))
    }

    /// First vertex whose |u| or |v| exceeds `limit`, if any.
    pub fn find_outlier(&self, limit: f64) -> Option<(usize, Point2<f64>)> {
        self.iter()
            .find(|(_, uv)| !(uv.x.abs() <= limit && uv.y.abs() <= limit))
    }

    /// Turn the map into a flat mesh with vertices `(u, v, 0)` and the given faces.
    pub fn to_flat_mesh(&self, faces: Vec<[usize; 3]>) -> Result<TriMesh> {
        let positions = self
            .coords
            .iter()
            .map(|uv| Point3::new(uv.x, uv.y, 0.0))
            .collect();
        TriMesh::new(positions, faces)
    }
}

/// A flat mesh paired with the surface mesh it parameterizes.
///
/// Faces are taken from the flat mesh; their vertex indices address both the
/// UV map and the surface positions.
#[derive(Debug, Clone)]
pub struct ParameterizedMesh {
    uv: UVMap,
    faces: Vec<[usize; 3]>,
    surface: TriMesh,
}

impl ParameterizedMesh {
    /// Pair a flat mesh (`(u, v, 0)` vertices) with its surface mesh.
    ///
    /// # Errors
    ///
    /// [`CodecError::VertexCountMismatch`] when the two meshes do not have the
    /// same number of vertices.
    pub fn new(flat: &TriMesh, surface: TriMesh) -> Result<Self> {
        if flat.num_vertices() != surface.num_vertices() {
            return Err(CodecError::VertexCountMismatch {
                flat: flat.num_vertices(),
                surface: surface.num_vertices(),
            });
        }
        Ok(Self {
            uv: UVMap::from_flat_mesh(flat),
            faces: flat.faces().to_vec(),
            surface,
        })
    }

    /// Pair a UV map with a surface mesh, reusing the surface faces.
    pub fn from_uv(uv: UVMap, surface: TriMesh) -> Result<Self> {
        if uv.len() != surface.num_vertices() {
            return Err(CodecError::VertexCountMismatch {
                flat: uv.len(),
                surface: surface.num_vertices(),
            });
        }
        let faces = surface.faces().to_vec();
        Ok(Self { uv, faces, surface })
    }

    /// The UV map.
    #[inline]
    pub fn uv(&self) -> &UVMap {
        &self.uv
    }

    /// Faces of the flat mesh.
    #[inline]
    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// The surface mesh.
    #[inline]
    pub fn surface(&self) -> &TriMesh {
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle(z: f64) -> TriMesh {
        TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, z),
                Point3::new(1.0, 0.0, z),
                Point3::new(0.0, 1.0, z),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap()
    }

    #[test]
    fn test_uv_map_basic() {
        let uv_map = UVMap::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.5, 1.0),
        ]);

        assert_eq!(uv_map.len(), 3);
        assert!(!uv_map.is_empty());
        assert_eq!(uv_map.get(2), Point2::new(0.5, 1.0));
    }

    #[test]
    fn test_uv_map_bounding_box() {
        let uv_map = UVMap::new(vec![
            Point2::new(-1.0, 0.5),
            Point2::new(2.0, -0.5),
            Point2::new(0.5, 3.0),
        ]);

        let (min, max) = uv_map.bounding_box().unwrap();
        assert_eq!(min, Point2::new(-1.0, -0.5));
        assert_eq!(max, Point2::new(2.0, 3.0));
    }

    #[test]
    fn test_find_outlier() {
        let uv_map = UVMap::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.4, 1.0),
            Point2::new(0.2, -1.6),
        ]);
        assert_eq!(uv_map.find_outlier(1.5).map(|(v, _)| v), Some(2));
        assert!(uv_map.find_outlier(2.0).is_none());

        let nan = UVMap::new(vec![Point2::new(f64::NAN, 0.0)]);
        assert!(nan.find_outlier(1.5).is_some());
    }

    #[test]
    fn test_flat_mesh_roundtrip_keeps_faces() {
        let flat = unit_triangle(0.0);
        let uv = UVMap::from_flat_mesh(&flat);
        let rebuilt = uv.to_flat_mesh(flat.faces().to_vec()).unwrap();
        assert_eq!(rebuilt, flat);
    }

    #[test]
    fn test_parameterized_mesh_vertex_mismatch() {
        let flat = unit_triangle(0.0);
        let surface = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [1, 3, 2]],
        )
        .unwrap();

        assert!(matches!(
            ParameterizedMesh::new(&flat, surface),
            Err(CodecError::VertexCountMismatch { flat: 3, surface: 4 })
        ));
        assert!(ParameterizedMesh::new(&flat, unit_triangle(2.0)).is_ok());
    }
}
