//! Boundary loops and connected components of triangle meshes.

use std::collections::{HashMap, HashSet};

use nalgebra::Point3;

use crate::error::Result;

use super::TriMesh;

/// A closed chain of boundary edges, stored as the ordered vertex cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    vertices: Vec<usize>,
}

impl BoundaryLoop {
    /// Vertices of the loop in traversal order (the last connects to the first).
    #[inline]
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    /// Number of boundary edges in the loop.
    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Check if the loop is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Sum of edge lengths around the loop.
    pub fn perimeter(&self, mesh: &TriMesh) -> f64 {
        let n = self.vertices.len();
        (0..n)
            .map(|i| {
                let a = mesh.position(self.vertices[i]);
                let b = mesh.position(self.vertices[(i + 1) % n]);
                (b - a).norm()
            })
            .sum()
    }
}

/// Find every boundary loop of `mesh`.
///
/// A boundary edge is a directed face edge `(a, b)` whose reverse `(b, a)`
/// belongs to no face. Loops follow face orientation. At vertices touched by
/// several loops the walk takes the lowest-numbered unvisited successor, so
/// results are deterministic.
pub fn boundary_loops(mesh: &TriMesh) -> Vec<BoundaryLoop> {
    let mut directed: HashSet<(usize, usize)> = HashSet::with_capacity(mesh.num_faces() * 3);
    for &[a, b, c] in mesh.faces() {
        directed.insert((a, b));
        directed.insert((b, c));
        directed.insert((c, a));
    }

    let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut boundary: Vec<(usize, usize)> = directed
        .iter()
        .copied()
        .filter(|&(a, b)| !directed.contains(&(b, a)))
        .collect();
    boundary.sort_unstable();
    for &(a, b) in &boundary {
        successors.entry(a).or_default().push(b);
    }

    let mut visited: HashSet<(usize, usize)> = HashSet::with_capacity(boundary.len());
    let mut loops = Vec::new();

    for &start in &boundary {
        if visited.contains(&start) {
            continue;
        }
        let mut vertices = Vec::new();
        let mut edge = start;
        loop {
            visited.insert(edge);
            vertices.push(edge.0);
            let next = successors
                .get(&edge.1)
                .and_then(|next| next.iter().find(|&&n| !visited.contains(&(edge.1, n))));
            match next {
                Some(&n) => edge = (edge.1, n),
                None => break,
            }
        }
        loops.push(BoundaryLoop { vertices });
    }

    loops
}

/// The boundary loop with the greatest perimeter, if the mesh has boundary.
pub fn longest_boundary(mesh: &TriMesh) -> Option<BoundaryLoop> {
    boundary_loops(mesh)
        .into_iter()
        .map(|l| (l.perimeter(mesh), l))
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, l)| l)
}

/// Total number of boundary edges over all loops.
pub fn boundary_edge_count(loops: &[BoundaryLoop]) -> usize {
    loops.iter().map(BoundaryLoop::len).sum()
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Group faces into connected components (faces sharing a vertex are connected).
///
/// Components are returned largest first; faces keep their original order
/// within a component.
pub fn connected_components(mesh: &TriMesh) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..mesh.num_vertices()).collect();
    for &[a, b, c] in mesh.faces() {
        for (x, y) in [(a, b), (b, c)] {
            let (rx, ry) = (find(&mut parent, x), find(&mut parent, y));
            if rx != ry {
                parent[rx.max(ry)] = rx.min(ry);
            }
        }
    }

    let mut by_root: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut order = Vec::new();
    for (fi, face) in mesh.faces().iter().enumerate() {
        let root = find(&mut parent, face[0]);
        by_root
            .entry(root)
            .or_insert_with(|| {
                order.push(root);
                Vec::new()
            })
            .push(fi);
    }

    let mut components: Vec<Vec<usize>> = order
        .into_iter()
        .filter_map(|root| by_root.remove(&root))
        .collect();
    components.sort_by(|a, b| b.len().cmp(&a.len()));
    components
}

/// Keep only the connected component with the most faces.
///
/// Unreferenced vertices are dropped, even when the mesh is a single
/// component; surviving vertices keep their relative order.
pub fn keep_largest_component(mesh: &TriMesh) -> Result<TriMesh> {
    let components = connected_components(mesh);
    let Some(largest) = components.first() else {
        return Ok(mesh.clone());
    };

    let mut keep = vec![false; mesh.num_vertices()];
    for &fi in largest {
        for &v in &mesh.faces()[fi] {
            keep[v] = true;
        }
    }

    let mut remap = vec![usize::MAX; mesh.num_vertices()];
    let mut positions: Vec<Point3<f64>> = Vec::new();
    for (v, &k) in keep.iter().enumerate() {
        if k {
            remap[v] = positions.len();
            positions.push(*mesh.position(v));
        }
    }

    let mut face_ids = largest.clone();
    face_ids.sort_unstable();
    let faces = face_ids
        .into_iter()
        .map(|fi| mesh.faces()[fi].map(|v| remap[v]))
        .collect();

    TriMesh::new(positions, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_grid_mesh(n: usize) -> TriMesh {
        let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
        let mut faces = Vec::with_capacity(n * n * 2);
        for j in 0..=n {
            for i in 0..=n {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                let v10 = v00 + 1;
                let v01 = v00 + (n + 1);
                let v11 = v01 + 1;
                faces.push([v00, v10, v11]);
                faces.push([v00, v11, v01]);
            }
        }
        TriMesh::new(vertices, faces).unwrap()
    }

    #[test]
    fn test_grid_has_single_boundary_loop() {
        let mesh = create_grid_mesh(3);
        let loops = boundary_loops(&mesh);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 12);
        assert!((loops[0].perimeter(&mesh) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_closed_mesh_has_no_boundary() {
        let mesh = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, 0.5, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
        )
        .unwrap();
        assert!(boundary_loops(&mesh).is_empty());
        assert!(longest_boundary(&mesh).is_none());
    }

    #[test]
    fn test_longest_boundary_prefers_outer_loop() {
        // 3x3 grid with the centre quad removed: outer loop of 12, hole of 4.
        let full = create_grid_mesh(3);
        let (positions, faces) = full.into_parts();
        let faces: Vec<[usize; 3]> = faces
            .into_iter()
            .enumerate()
            .filter(|(fi, _)| *fi != 8 && *fi != 9)
            .map(|(_, f)| f)
            .collect();
        let mesh = TriMesh::new(positions, faces).unwrap();

        let loops = boundary_loops(&mesh);
        assert_eq!(loops.len(), 2);
        assert_eq!(boundary_edge_count(&loops), 16);

        let longest = longest_boundary(&mesh).unwrap();
        assert_eq!(longest.len(), 12);
    }

    #[test]
    fn test_keep_largest_component() {
        let mut positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let grid = create_grid_mesh(2);
        let offset = positions.len();
        positions.extend(grid.positions().iter().map(|p| p + nalgebra::Vector3::new(5.0, 0.0, 0.0)));
        let mut faces = vec![[0, 1, 2]];
        faces.extend(grid.faces().iter().map(|f| f.map(|v| v + offset)));
        let mesh = TriMesh::new(positions, faces).unwrap();

        let components = connected_components(&mesh);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].len(), 8);

        let kept = keep_largest_component(&mesh).unwrap();
        assert_eq!(kept.num_faces(), 8);
        assert_eq!(kept.num_vertices(), 9);
        assert!(kept.positions().iter().all(|p| p.x >= 5.0));
    }
}
