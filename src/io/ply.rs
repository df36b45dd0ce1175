//! PLY (Stanford polygon) format support.
//!
//! Loading goes through `ply-rs`; saving writes ASCII PLY by hand so decoded
//! grids can carry their per-vertex normals.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};

use crate::error::{CodecError, Result};
use crate::mesh::{QuadMesh, TriMesh};

/// Load a triangle mesh from a PLY file.
///
/// Polygons with more than three corners are fan-triangulated.
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriMesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| CodecError::load(path, e.to_string()))?;

    let vertex_element = ply
        .payload
        .get("vertex")
        .ok_or_else(|| CodecError::load(path, "PLY file has no vertex element"))?;

    let mut vertices: Vec<Point3<f64>> = Vec::with_capacity(vertex_element.len());
    for (i, vertex) in vertex_element.iter().enumerate() {
        let coord = |name: &str| {
            get_float_property(vertex, name)
                .ok_or_else(|| CodecError::load(path, format!("vertex {i} missing {name} coordinate")))
        };
        vertices.push(Point3::new(coord("x")?, coord("y")?, coord("z")?));
    }
    if vertices.is_empty() {
        return Err(CodecError::load(path, "mesh has no vertices"));
    }

    let face_element = ply
        .payload
        .get("face")
        .ok_or_else(|| CodecError::load(path, "PLY file has no face element"))?;

    let mut faces: Vec<[usize; 3]> = Vec::with_capacity(face_element.len());
    for face in face_element {
        let indices = get_list_property(face, "vertex_indices")
            .or_else(|| get_list_property(face, "vertex_index"))
            .ok_or_else(|| CodecError::load(path, "face missing vertex_indices property"))?;

        for i in 1..indices.len().saturating_sub(1) {
            faces.push([indices[0], indices[i], indices[i + 1]]);
        }
    }

    TriMesh::new(vertices, faces)
}

fn get_float_property(element: &DefaultElement, name: &str) -> Option<f64> {
    match element.get(name)? {
        Property::Float(v) => Some(f64::from(*v)),
        Property::Double(v) => Some(*v),
        Property::Int(v) => Some(f64::from(*v)),
        Property::UInt(v) => Some(f64::from(*v)),
        Property::Short(v) => Some(f64::from(*v)),
        Property::UShort(v) => Some(f64::from(*v)),
        Property::Char(v) => Some(f64::from(*v)),
        Property::UChar(v) => Some(f64::from(*v)),
        _ => None,
    }
}

fn get_list_property(element: &DefaultElement, name: &str) -> Option<Vec<usize>> {
    match element.get(name)? {
        Property::ListInt(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUInt(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListShort(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUShort(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListChar(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUChar(v) => Some(v.iter().map(|&x| x as usize).collect()),
        _ => None,
    }
}

fn write_ascii<W: Write, const N: usize>(
    writer: &mut W,
    positions: &[Point3<f64>],
    normals: Option<&[Vector3<f64>]>,
    faces: &[[usize; N]],
) -> std::io::Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "comment Generated by flatgi")?;
    writeln!(writer, "element vertex {}", positions.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    if normals.is_some() {
        writeln!(writer, "property float nx")?;
        writeln!(writer, "property float ny")?;
        writeln!(writer, "property float nz")?;
    }
    writeln!(writer, "element face {}", faces.len())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    for (i, p) in positions.iter().enumerate() {
        match normals {
            Some(n) => writeln!(writer, "{} {} {} {} {} {}", p.x, p.y, p.z, n[i].x, n[i].y, n[i].z)?,
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

/// Save a triangle mesh to a PLY file (ASCII format).
pub fn save<P: AsRef<Path>>(mesh: &TriMesh, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_ascii(&mut writer, mesh.positions(), None, mesh.faces())?;
    Ok(())
}

/// Save a quad mesh, with normals when it has them, to a PLY file.
pub fn save_quads<P: AsRef<Path>>(mesh: &QuadMesh, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_ascii(&mut writer, mesh.positions(), mesh.normals(), mesh.faces())?;
    Ok(())
}
