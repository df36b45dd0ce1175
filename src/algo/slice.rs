//! Slicing a mesh at its mid-plane.
//!
//! Symmetric shapes are encoded from one half only. The mesh is clipped by
//! the plane `x = (xmin + xmax) / 2`, the half on the positive side is kept,
//! and the result is translated so the cut lies on `x = 0`. Only the largest
//! connected component of the half survives.

use std::collections::HashMap;

use log::debug;
use nalgebra::{Point3, Vector3};

use crate::error::{CodecError, Result};
use crate::mesh::{topology, TriMesh};

/// Output of [`slice_at_midplane`].
#[derive(Debug, Clone)]
pub struct Slice {
    /// The kept half, translated so the cut lies on `x = 0`.
    pub mesh: TriMesh,
    /// Position of the cutting plane before translation.
    pub plane_x: f64,
}

struct Clipper<'a> {
    mesh: &'a TriMesh,
    plane_x: f64,
    positions: Vec<Point3<f64>>,
    kept: Vec<Option<usize>>,
    cuts: HashMap<(usize, usize), usize>,
}

impl<'a> Clipper<'a> {
    fn new(mesh: &'a TriMesh, plane_x: f64) -> Self {
        Self {
            mesh,
            plane_x,
            positions: Vec::new(),
            kept: vec![None; mesh.num_vertices()],
            cuts: HashMap::new(),
        }
    }

    #[inline]
    fn distance(&self, v: usize) -> f64 {
        self.mesh.position(v).x - self.plane_x
    }

    fn keep(&mut self, v: usize) -> usize {
        if let Some(i) = self.kept[v] {
            return i;
        }
        let i = self.positions.len();
        self.positions.push(*self.mesh.position(v));
        self.kept[v] = Some(i);
        i
    }

    /// Index of the point where edge `inside -> outside` crosses the plane.
    fn cut(&mut self, inside: usize, outside: usize) -> usize {
        let (da, db) = (self.distance(inside), self.distance(outside));
        if da == 0.0 {
            return self.keep(inside);
        }
        let key = (inside.min(outside), inside.max(outside));
        if let Some(&i) = self.cuts.get(&key) {
            return i;
        }
        let t = da / (da - db);
        let a = self.mesh.position(inside);
        let b = self.mesh.position(outside);
        let mut p = a + (b - a) * t;
        p.x = self.plane_x;
        let i = self.positions.len();
        self.positions.push(p);
        self.cuts.insert(key, i);
        i
    }

    fn clip_face(&mut self, face: [usize; 3], out: &mut Vec<[usize; 3]>) {
        let inside = face.map(|v| self.distance(v) >= 0.0);
        if inside.iter().all(|&i| !i) {
            return;
        }

        let mut polygon: Vec<usize> = Vec::with_capacity(4);
        for k in 0..3 {
            let (cur, next) = (face[k], face[(k + 1) % 3]);
            let (cur_in, next_in) = (inside[k], inside[(k + 1) % 3]);
            if cur_in {
                polygon.push(self.keep(cur));
            }
            if cur_in && !next_in {
                polygon.push(self.cut(cur, next));
            } else if !cur_in && next_in {
                polygon.push(self.cut(next, cur));
            }
        }

        polygon.dedup();
        if polygon.len() > 1 && polygon.first() == polygon.last() {
            polygon.pop();
        }
        for i in 1..polygon.len().saturating_sub(1) {
            let tri = [polygon[0], polygon[i], polygon[i + 1]];
            if tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2] {
                out.push(tri);
            }
        }
    }
}

/// Clip `mesh` against the plane `x = plane_x`, keeping the side `x >= plane_x`.
///
/// Triangles straddling the plane are cut; the new vertices on a shared edge
/// are shared by both neighbouring triangles so the half stays connected.
///
/// # Errors
///
/// [`CodecError::EmptyMesh`] if nothing remains on the kept side.
pub fn clip_positive_x(mesh: &TriMesh, plane_x: f64) -> Result<TriMesh> {
    let mut clipper = Clipper::new(mesh, plane_x);
    let mut faces = Vec::with_capacity(mesh.num_faces());
    for &face in mesh.faces() {
        clipper.clip_face(face, &mut faces);
    }
    TriMesh::new(clipper.positions, faces)
}

/// Cut `mesh` at the mid-plane of its bounding box in x.
///
/// # Example
///
/// ```
/// use flatgi::algo::slice::slice_at_midplane;
/// use flatgi::mesh::TriMesh;
/// use nalgebra::Point3;
///
/// let mesh = TriMesh::new(
///     vec![
///         Point3::new(-1.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(1.0, 1.0, 0.0),
///     ],
///     vec![[0, 1, 2]],
/// )
/// .unwrap();
///
/// let slice = slice_at_midplane(&mesh).unwrap();
/// assert_eq!(slice.plane_x, 0.0);
/// ```
pub fn slice_at_midplane(mesh: &TriMesh) -> Result<Slice> {
    let (min, max) = mesh.bounding_box().ok_or(CodecError::EmptyMesh)?;
    let plane_x = 0.5 * (min.x + max.x);

    let clipped = clip_positive_x(mesh, plane_x)?;
    let mut half = topology::keep_largest_component(&clipped)?;
    half.translate(Vector3::new(-plane_x, 0.0, 0.0));

    debug!(
        "Sliced at x = {plane_x}: {} -> {} faces",
        mesh.num_faces(),
        half.num_faces()
    );

    Ok(Slice { mesh: half, plane_x })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_strip() -> TriMesh {
        // Two unit squares side by side spanning x in [0, 2].
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        ];
        let faces = vec![[0, 1, 4], [0, 4, 3], [1, 2, 5], [1, 5, 4]];
        TriMesh::new(vertices, faces).unwrap()
    }

    #[test]
    fn test_slice_on_vertex_column() {
        let slice = slice_at_midplane(&create_strip()).unwrap();
        assert_eq!(slice.plane_x, 1.0);
        assert_eq!(slice.mesh.num_faces(), 2);
        assert_eq!(slice.mesh.num_vertices(), 4);

        let (min, max) = slice.mesh.bounding_box().unwrap();
        assert!(min.x.abs() < 1e-12);
        assert!((max.x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_clip_through_faces_shares_cut_vertices() {
        let clipped = clip_positive_x(&create_strip(), 1.5).unwrap();
        // Right square becomes a half-width quad made of clipped pieces.
        let (min, max) = clipped.bounding_box().unwrap();
        assert!((min.x - 1.5).abs() < 1e-12);
        assert!((max.x - 2.0).abs() < 1e-12);

        let total_area: f64 = (0..clipped.num_faces()).map(|f| clipped.face_area(f)).sum();
        assert!((total_area - 0.5).abs() < 1e-12);

        // Cut points on the diagonal edge 1-5 are shared, so there is one boundary loop.
        assert_eq!(topology::boundary_loops(&clipped).len(), 1);
    }

    #[test]
    fn test_clip_everything_away() {
        assert!(matches!(
            clip_positive_x(&create_strip(), 3.0),
            Err(CodecError::EmptyMesh)
        ));
    }
}
