//! Rebuilding a quad-grid mesh from geometry images.
//!
//! Every pixel becomes one vertex. Channels are read back relative to the
//! smallest byte in the image and divided by 255, the full 8-bit range the
//! packer writes into. Neighbouring pixels are joined into quads.
//!
//! The decoded data is first written as a text record stream
//! (`v`, `vn` and 1-based `f` lines) and then parsed into the final mesh, so
//! the result is exactly what a reader of that stream would see.

use std::fmt::Write as _;
use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use log::{debug, info};
use nalgebra::{Point3, Vector3};

use crate::error::{CodecError, Result};
use crate::io::{self, artifact};
use crate::io::artifact::StageOutcome;
use crate::mesh::QuadMesh;

use super::naming::GeometryImagePaths;

/// Options for decoding geometry images.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Shrink both image dimensions by this factor before decoding.
    pub downscale: u32,
    /// Also decode the paired normal image.
    pub use_normals: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            downscale: 1,
            use_normals: false,
        }
    }
}

impl DecodeOptions {
    /// Set the downscale factor.
    pub fn with_downscale(mut self, downscale: u32) -> Self {
        self.downscale = downscale;
        self
    }

    /// Enable or disable normal decoding.
    pub fn with_normals(mut self, use_normals: bool) -> Self {
        self.use_normals = use_normals;
        self
    }

    /// Check the options.
    ///
    /// # Errors
    ///
    /// [`CodecError::InvalidParameter`] for a zero downscale factor.
    pub fn validate(&self) -> Result<()> {
        if self.downscale == 0 {
            return Err(CodecError::invalid_param(
                "downscale",
                self.downscale,
                "factor must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Load a geometry image as 8-bit RGB, shrinking it by `downscale`.
pub fn read_image<P: AsRef<Path>>(path: P, downscale: u32) -> Result<RgbImage> {
    let path = path.as_ref();
    if downscale == 0 {
        return Err(CodecError::invalid_param("downscale", 0, "factor must be at least 1"));
    }

    let image = image::open(path)
        .map_err(|e| CodecError::MalformedImage {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .to_rgb8();

    let image = if downscale == 1 {
        image
    } else {
        let (w, h) = (image.width() / downscale, image.height() / downscale);
        if w == 0 || h == 0 {
            return Err(CodecError::MalformedImage {
                path: path.to_path_buf(),
                message: format!(
                    "{}x{} image is too small for downscale factor {downscale}",
                    image.width(),
                    image.height()
                ),
            });
        }
        image::imageops::resize(&image, w, h, FilterType::Triangle)
    };

    if image.width() == 0 || image.height() == 0 {
        return Err(CodecError::MalformedImage {
            path: path.to_path_buf(),
            message: "image has no pixels".to_string(),
        });
    }
    Ok(image)
}

/// Text record stream produced by [`write_records`].
#[derive(Debug, Clone, Default)]
pub struct Records {
    text: String,
}

impl Records {
    /// Wrap an existing record stream.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The raw text.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Write vertex, normal and face records for geometry images.
///
/// Vertices are emitted in row-major pixel order. `normal` must match the
/// dimensions of `position`.
pub fn write_records(position: &RgbImage, normal: Option<&RgbImage>) -> Result<Records> {
    let (width, height) = position.dimensions();
    if let Some(n) = normal {
        if n.dimensions() != (width, height) {
            return Err(CodecError::MalformedImage {
                path: Default::default(),
                message: format!(
                    "normal image is {}x{} but position image is {width}x{height}",
                    n.width(),
                    n.height()
                ),
            });
        }
    }

    let global_min = f64::from(position.as_raw().iter().copied().min().unwrap_or(0));
    let (rows, cols) = (height as usize, width as usize);

    let mut text = String::with_capacity(rows * cols * 48);
    for i in 0..height {
        for j in 0..width {
            let px = position.get_pixel(j, i);
            let x = (f64::from(px[2]) - global_min) / 255.0;
            let y = (f64::from(px[1]) - global_min) / 255.0;
            let z = (f64::from(px[0]) - global_min) / 255.0;
            // Writing into a String cannot fail.
            let _ = writeln!(text, "v {x} {y} {z}");
        }
    }

    if let Some(normal) = normal {
        for i in 0..height {
            for j in 0..width {
                let px = normal.get_pixel(j, i);
                let _ = writeln!(text, "vn {} {} {}", px[2], px[1], px[0]);
            }
        }
    }

    for col in 0..cols.saturating_sub(1) {
        for row in 0..rows.saturating_sub(1) {
            let _ = writeln!(
                text,
                "f {} {} {} {}",
                rows * col + row + 1,
                rows * col + row + 2,
                rows * (col + 1) + row + 2,
                rows * (col + 1) + row + 1
            );
        }
    }

    Ok(Records { text })
}

fn parse_fields<T: std::str::FromStr, const N: usize>(
    line: usize,
    fields: std::str::SplitWhitespace<'_>,
) -> Result<[T; N]> {
    let values: Vec<T> = fields
        .map(|token| {
            token.parse::<T>().map_err(|_| CodecError::Cast {
                line,
                token: token.to_string(),
            })
        })
        .collect::<Result<_>>()?;
    let count = values.len();
    values.try_into().map_err(|_| CodecError::Cast {
        line,
        token: format!("expected {N} fields, found {count}"),
    })
}

/// Parse a record stream into a quad mesh.
///
/// # Errors
///
/// [`CodecError::Cast`] for any record whose fields do not parse.
pub fn parse_records(records: &Records) -> Result<QuadMesh> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut faces = Vec::new();

    for (line, text) in records.text.lines().enumerate() {
        let mut fields = text.split_whitespace();
        match fields.next() {
            Some("v") => {
                let [x, y, z] = parse_fields::<f64, 3>(line, fields)?;
                positions.push(Point3::new(x, y, z));
            }
            Some("vn") => {
                let [x, y, z] = parse_fields::<f64, 3>(line, fields)?;
                normals.push(Vector3::new(x, y, z));
            }
            Some("f") => {
                let face = parse_fields::<usize, 4>(line, fields)?;
                if face.contains(&0) {
                    return Err(CodecError::Cast {
                        line,
                        token: "face indices are 1-based".to_string(),
                    });
                }
                faces.push(face.map(|v| v - 1));
            }
            None => {}
            Some(other) => {
                return Err(CodecError::Cast {
                    line,
                    token: other.to_string(),
                })
            }
        }
    }

    let normals = if normals.is_empty() { None } else { Some(normals) };
    QuadMesh::new(positions, normals, faces)
}

/// Decode in-memory geometry images into a quad mesh.
pub fn decode_images(position: &RgbImage, normal: Option<&RgbImage>) -> Result<QuadMesh> {
    let records = write_records(position, normal)?;
    parse_records(&records)
}

/// Decode the images at `paths` and save the mesh under `out_dir`.
///
/// Skips the work when the decoded mesh file already holds more than
/// `min_size` bytes.
pub fn decode_to_file<P: AsRef<Path>>(
    paths: &GeometryImagePaths,
    out_dir: P,
    options: &DecodeOptions,
    min_size: u64,
) -> Result<StageOutcome> {
    options.validate()?;

    let output = paths.decoded_mesh_path(out_dir);
    if artifact::output_exists(&output, min_size) {
        debug!("{} exists, skipping decode", output.display());
        return Ok(StageOutcome::Skipped);
    }

    artifact::require_input(&paths.position, min_size)?;
    let position = read_image(&paths.position, options.downscale)?;

    let normal = match (&paths.normal, options.use_normals) {
        (Some(path), true) => {
            artifact::require_input(path, min_size)?;
            Some(read_image(path, options.downscale)?)
        }
        (None, true) => return Err(CodecError::MissingNormals),
        (_, false) => None,
    };

    let mesh = decode_images(&position, normal.as_ref())?;
    io::save_quads(&mesh, &output)?;

    info!(
        "Decoded {} into {} vertices, {} faces",
        paths.position.display(),
        mesh.num_vertices(),
        mesh.num_faces()
    );
    Ok(StageOutcome::Written)
}
