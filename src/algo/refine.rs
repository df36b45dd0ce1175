//! Density refinement of sliced meshes.
//!
//! Triangles that are large compared to the edges around their corners are
//! split at their centroid, and the edges of the split faces are then flipped
//! towards a Delaunay configuration. Each vertex carries a scale, the mean
//! length of its incident edges; a centroid inherits the mean scale of its
//! triangle. A triangle is split when `density * |c - v|` exceeds both the
//! centroid's scale and the scale of every corner `v`.
//!
//! Splitting keeps every new vertex in the plane of its triangle, so the
//! surface area is unchanged.

use std::collections::HashMap;
use std::f64::consts::PI;

use log::debug;
use nalgebra::{Point3, Vector3};

use crate::error::{CodecError, Result};
use crate::mesh::TriMesh;

/// Options for [`refine`].
#[derive(Debug, Clone)]
pub struct RefineOptions {
    /// Density control factor. Larger values split more.
    pub density: f64,
    /// Maximum number of split passes.
    pub max_passes: usize,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            density: std::f64::consts::SQRT_2,
            max_passes: 16,
        }
    }
}

impl RefineOptions {
    /// Set the density control factor.
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }
}

/// Two faces sharing an edge are only flipped when their normals agree this closely.
const FLIP_COPLANARITY: f64 = 0.999;
const MAX_RELAX_SWEEPS: usize = 8;

#[inline]
fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

fn vertex_scales(positions: &[Point3<f64>], faces: &[[usize; 3]]) -> Vec<f64> {
    let mut seen = HashMap::new();
    for face in faces {
        for k in 0..3 {
            let (a, b) = (face[k], face[(k + 1) % 3]);
            seen.entry(edge_key(a, b))
                .or_insert_with(|| (positions[a] - positions[b]).norm());
        }
    }

    let mut sum = vec![0.0; positions.len()];
    let mut count = vec![0usize; positions.len()];
    for (&(a, b), &len) in &seen {
        sum[a] += len;
        sum[b] += len;
        count[a] += 1;
        count[b] += 1;
    }
    sum.iter()
        .zip(&count)
        .map(|(&s, &n)| if n == 0 { 0.0 } else { s / n as f64 })
        .collect()
}

/// Third vertex of `face` if it contains the directed edge `a -> b`.
fn apex(face: [usize; 3], a: usize, b: usize) -> Option<usize> {
    (0..3)
        .find(|&k| face[k] == a && face[(k + 1) % 3] == b)
        .map(|k| face[(k + 2) % 3])
}

fn angle_at(positions: &[Point3<f64>], at: usize, a: usize, b: usize) -> f64 {
    (positions[a] - positions[at]).angle(&(positions[b] - positions[at]))
}

fn normal(positions: &[Point3<f64>], face: [usize; 3]) -> Vector3<f64> {
    let [a, b, c] = face.map(|v| positions[v]);
    (b - a).cross(&(c - a))
}

/// Whether the edge shared by `(u, v, p)` and `(v, u, q)` should become `p-q`.
fn should_flip(positions: &[Point3<f64>], u: usize, v: usize, p: usize, q: usize) -> bool {
    let (n1, n2) = (normal(positions, [u, v, p]), normal(positions, [v, u, q]));
    let (l1, l2) = (n1.norm(), n2.norm());
    if l1 == 0.0 || l2 == 0.0 || n1.dot(&n2) < FLIP_COPLANARITY * l1 * l2 {
        return false;
    }
    if angle_at(positions, p, u, v) + angle_at(positions, q, v, u) <= PI + 1e-9 {
        return false;
    }
    // The flipped pair must keep the orientation of the original.
    let reference = n1 + n2;
    normal(positions, [p, u, q]).dot(&reference) > 0.0
        && normal(positions, [q, v, p]).dot(&reference) > 0.0
}

/// Flip interior edges touching a split face. Returns the number of flips.
fn relax(positions: &[Point3<f64>], faces: &mut [[usize; 3]], split: &[bool]) -> usize {
    let mut total = 0;
    for _ in 0..MAX_RELAX_SWEEPS {
        let mut edges: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (f, face) in faces.iter().enumerate() {
            for k in 0..3 {
                edges
                    .entry(edge_key(face[k], face[(k + 1) % 3]))
                    .or_default()
                    .push(f);
            }
        }
        let mut interior: Vec<((usize, usize), usize, usize)> = edges
            .iter()
            .filter(|(_, fs)| fs.len() == 2)
            .map(|(&key, fs)| (key, fs[0], fs[1]))
            .collect();
        interior.sort_unstable();

        let mut touched = vec![false; faces.len()];
        let mut flips = 0;
        for ((a, b), f, g) in interior {
            if touched[f] || touched[g] || !(split[f] || split[g]) {
                continue;
            }
            // Orient the edge as it runs in face f.
            let (u, v) = if apex(faces[f], a, b).is_some() { (a, b) } else { (b, a) };
            let (Some(p), Some(q)) = (apex(faces[f], u, v), apex(faces[g], v, u)) else {
                continue;
            };
            if p == q || edges.contains_key(&edge_key(p, q)) {
                continue;
            }
            if !should_flip(positions, u, v, p, q) {
                continue;
            }
            faces[f] = [p, u, q];
            faces[g] = [q, v, p];
            touched[f] = true;
            touched[g] = true;
            flips += 1;
        }

        total += flips;
        if flips == 0 {
            break;
        }
    }
    total
}

/// Densify `mesh` by centroid splits followed by edge flips.
///
/// Meshes whose triangles are already uniform come back unchanged.
///
/// # Errors
///
/// [`CodecError::InvalidParameter`] for a density that is not positive.
pub fn refine(mesh: &TriMesh, options: &RefineOptions) -> Result<TriMesh> {
    if options.density.is_nan() || options.density <= 0.0 {
        return Err(CodecError::invalid_param(
            "density",
            options.density,
            "must be positive",
        ));
    }

    let (mut positions, mut faces) = mesh.clone().into_parts();
    let mut scale = vertex_scales(&positions, &faces);
    let mut split = vec![false; faces.len()];
    let mut splits = 0;
    let mut flips = 0;

    for _ in 0..options.max_passes {
        let mut pass_splits = 0;
        for f in 0..faces.len() {
            let [a, b, c] = faces[f];
            let centroid = Point3::from(
                (positions[a].coords + positions[b].coords + positions[c].coords) / 3.0,
            );
            let sigma = (scale[a] + scale[b] + scale[c]) / 3.0;
            let dense = [a, b, c].iter().all(|&v| {
                let d = options.density * (centroid - positions[v]).norm();
                d > sigma && d > scale[v]
            });
            if !dense {
                continue;
            }

            let m = positions.len();
            positions.push(centroid);
            scale.push(sigma);
            faces[f] = [a, b, m];
            faces.push([b, c, m]);
            faces.push([c, a, m]);
            split[f] = true;
            split.extend([true, true]);
            pass_splits += 1;
        }

        if pass_splits == 0 {
            break;
        }
        splits += pass_splits;
        flips += relax(&positions, &mut faces, &split);
    }

    debug!(
        "Refined {} -> {} faces ({splits} splits, {flips} flips)",
        mesh.num_faces(),
        faces.len()
    );
    TriMesh::new(positions, faces)
}
