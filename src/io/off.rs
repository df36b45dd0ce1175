//! OFF (Object File Format) support.
//!
//! OFF is the plain-text vertex/face list exchanged at every pipeline
//! boundary: input meshes, sliced meshes, flat meshes and decoded grids.
//!
//! ```text
//! OFF
//! # comment
//! 4 1 0
//! 0 0 0
//! 1 0 0
//! 1 1 0
//! 0 1 0
//! 4 0 1 2 3
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};

use crate::error::{CodecError, Result};
use crate::mesh::{QuadMesh, TriMesh};

/// Upper bound on elements reserved up front from header counts.
const MAX_RESERVE: usize = 1 << 16;

/// Raw contents of an OFF file: positions and polygon faces.
#[derive(Debug, Clone, Default)]
pub struct OffData {
    /// Vertex positions.
    pub positions: Vec<Point3<f64>>,
    /// Polygon faces (any arity).
    pub polygons: Vec<Vec<usize>>,
}

impl OffData {
    /// Fan-triangulate all polygons into a [`TriMesh`].
    pub fn into_trimesh(self) -> Result<TriMesh> {
        let mut faces = Vec::with_capacity(self.polygons.len());
        for poly in &self.polygons {
            for i in 1..poly.len().saturating_sub(1) {
                faces.push([poly[0], poly[i], poly[i + 1]]);
            }
        }
        TriMesh::new(self.positions, faces)
    }
}

/// Read OFF data from any buffered reader.
///
/// Accepts the `OFF` (or `NOFF`) keyword on its own line or followed by the
/// counts, `#` comments and blank lines. Extra per-vertex values (normals,
/// colors) are ignored.
pub fn read<R: BufRead>(reader: R, path: &Path) -> Result<OffData> {
    let fail = |message: String| CodecError::load(path, message);

    let mut tokens: Vec<String> = Vec::new();
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let content = line.split('#').next().unwrap_or("").trim().to_string();
        if !content.is_empty() {
            lines.push(content);
        }
    }

    let mut lines = lines.into_iter();
    let header = lines.next().ok_or_else(|| fail("file is empty".to_string()))?;
    let mut header_tokens = header.split_whitespace();
    match header_tokens.next() {
        Some("OFF" | "NOFF") => {}
        Some(other) => return Err(fail(format!("expected OFF header, found {other:?}"))),
        None => return Err(fail("missing OFF header".to_string())),
    }
    tokens.extend(header_tokens.map(str::to_string));

    let counts_line = if tokens.is_empty() {
        lines.next().ok_or_else(|| fail("missing element counts".to_string()))?
    } else {
        tokens.join(" ")
    };
    let counts: Vec<usize> = counts_line
        .split_whitespace()
        .map(|t| t.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| fail(format!("bad element counts {counts_line:?}: {e}")))?;
    if counts.len() < 2 {
        return Err(fail(format!("bad element counts {counts_line:?}")));
    }
    let (nv, nf) = (counts[0], counts[1]);

    let mut data = OffData {
        positions: Vec::with_capacity(nv.min(MAX_RESERVE)),
        polygons: Vec::with_capacity(nf.min(MAX_RESERVE)),
    };

    for i in 0..nv {
        let line = lines
            .next()
            .ok_or_else(|| fail(format!("expected {nv} vertices, found {i}")))?;
        let coords: Vec<f64> = line
            .split_whitespace()
            .take(3)
            .map(str::parse::<f64>)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| fail(format!("vertex {i}: {e}")))?;
        if coords.len() != 3 {
            return Err(fail(format!("vertex {i} has {} coordinates", coords.len())));
        }
        data.positions.push(Point3::new(coords[0], coords[1], coords[2]));
    }

    for i in 0..nf {
        let line = lines
            .next()
            .ok_or_else(|| fail(format!("expected {nf} faces, found {i}")))?;
        let mut fields = line.split_whitespace().map(str::parse::<usize>);
        let arity = fields
            .next()
            .transpose()
            .map_err(|e| fail(format!("face {i}: {e}")))?
            .ok_or_else(|| fail(format!("face {i} is empty")))?;
        let poly: Vec<usize> = fields
            .take(arity)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| fail(format!("face {i}: {e}")))?;
        if poly.len() != arity {
            return Err(fail(format!("face {i} lists {} of {arity} vertices", poly.len())));
        }
        data.polygons.push(poly);
    }

    Ok(data)
}

/// Load a triangle mesh from an OFF file.
///
/// # Example
///
/// ```no_run
/// use flatgi::io::off;
///
/// let mesh = off::load("model.off").unwrap();
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriMesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let data = read(BufReader::new(file), path)?;
    if data.positions.is_empty() {
        return Err(CodecError::load(path, "mesh has no vertices"));
    }
    data.into_trimesh()
}

fn write_polygons<W: Write, const N: usize>(
    writer: &mut W,
    positions: &[Point3<f64>],
    normals: Option<&[Vector3<f64>]>,
    faces: &[[usize; N]],
) -> std::io::Result<()> {
    writeln!(writer, "{}", if normals.is_some() { "NOFF" } else { "OFF" })?;
    writeln!(writer, "{} {} 0", positions.len(), faces.len())?;
    for (i, p) in positions.iter().enumerate() {
        match normals.and_then(|n| n.get(i)) {
            Some(n) => writeln!(writer, "{} {} {} {} {} {}", p.x, p.y, p.z, n.x, n.y, n.z)?,
            None => writeln!(writer, "{} {} {}", p.x, p.y, p.z)?,
        }
    }
    for f in faces {
        write!(writer, "{}", N)?;
        for v in f {
            write!(writer, " {v}")?;
        }
        writeln!(writer)?;
    }
    writer.flush()
}

/// Save a triangle mesh to an OFF file.
pub fn save<P: AsRef<Path>>(mesh: &TriMesh, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_polygons(&mut writer, mesh.positions(), None, mesh.faces())?;
    Ok(())
}

/// Save a quad mesh to an OFF file.
///
/// A grid that carries normals is written as `NOFF`, with the normal after
/// each position.
pub fn save_quads<P: AsRef<Path>>(mesh: &QuadMesh, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_polygons(&mut writer, mesh.positions(), mesh.normals(), mesh.faces())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<OffData> {
        read(text.as_bytes(), Path::new("test.off"))
    }

    #[test]
    fn test_read_quad_fan_triangulates() {
        let data = parse("OFF\n# a square\n4 1 0\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n4 0 1 2 3\n").unwrap();
        assert_eq!(data.positions.len(), 4);
        let mesh = data.into_trimesh().unwrap();
        assert_eq!(mesh.faces(), &[[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_read_counts_on_header_line() {
        let data = parse("OFF 3 1 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n").unwrap();
        assert_eq!(data.polygons, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_read_rejects_truncated_file() {
        assert!(parse("OFF\n3 1 0\n0 0 0\n1 0 0\n").is_err());
        assert!(parse("PLY\n").is_err());
        assert!(parse("OFF\n3 1 0\n0 0 0\n1 0 x\n0 1 0\n3 0 1 2\n").is_err());
    }

    #[test]
    fn test_write_then_read() {
        let mesh = TriMesh::new(
            vec![
                Point3::new(0.25, 0.0, 0.0),
                Point3::new(1.0, 0.125, 0.0),
                Point3::new(0.0, 1.0, 3.5),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();

        let mut buffer = Vec::new();
        write_polygons(&mut buffer, mesh.positions(), None, mesh.faces()).unwrap();
        let reloaded = parse(std::str::from_utf8(&buffer).unwrap())
            .unwrap()
            .into_trimesh()
            .unwrap();
        assert_eq!(reloaded, mesh);
    }

    #[test]
    fn test_read_rejects_huge_counts() {
        assert!(matches!(
            parse("OFF\n2000000000000000000 1 0\n0 0 0\n"),
            Err(CodecError::LoadError { .. })
        ));
        assert!(matches!(
            parse("OFF\n3 18446744073709551615 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n"),
            Err(CodecError::LoadError { .. })
        ));
    }

    #[test]
    fn test_quads_with_normals_write_noff() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let normals = vec![Vector3::new(0.0, 0.0, 255.0); 4];
        let faces = [[0, 1, 2, 3]];

        let mut buffer = Vec::new();
        write_polygons(&mut buffer, &positions, Some(normals.as_slice()), &faces).unwrap();
        let text = std::str::from_utf8(&buffer).unwrap();
        assert!(text.starts_with("NOFF\n4 1 0\n"));
        assert!(text.contains("\n1 1 0 0 0 255\n"));

        let data = parse(text).unwrap();
        assert_eq!(data.positions, positions);
        assert_eq!(data.polygons, vec![vec![0, 1, 2, 3]]);
    }
}
