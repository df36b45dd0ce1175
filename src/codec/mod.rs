//! The geometry-image codec.
//!
//! Encoding turns a [`ParameterizedMesh`] into one RGB image of surface
//! positions (and optionally a second one of normals):
//!
//! 1. [`raster`] scatters every flat triangle onto a square pixel grid with
//!    barycentric interpolation and averages overlapping samples.
//! 2. [`inpaint`] fills pixels no triangle reached by constrained diffusion.
//! 3. [`pack`] normalizes the channels by a shared divisor and writes PNG.
//!
//! [`decode`] is the inverse: each pixel becomes a vertex of a regular quad
//! grid.
//!
//! # Example
//!
//! ```
//! use flatgi::codec::{decode, EncodeOptions, Encoder};
//! use flatgi::mesh::{ParameterizedMesh, TriMesh};
//! use nalgebra::Point3;
//!
//! let flat = TriMesh::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     vec![[0, 1, 2]],
//! )
//! .unwrap();
//! let mesh = ParameterizedMesh::new(&flat, flat.clone()).unwrap();
//!
//! let encoder = Encoder::new(EncodeOptions::default().with_im_size(16));
//! let images = encoder.encode(&mesh, None).unwrap();
//! let grid = decode::decode_images(&images.position, None).unwrap();
//! assert_eq!(grid.num_vertices(), 256);
//! ```

pub mod decode;
pub mod inpaint;
pub mod naming;
pub mod pack;
pub mod raster;

use image::RgbImage;
use log::{debug, info};
use nalgebra::Vector3;

use crate::algo::Progress;
use crate::error::{CodecError, Result};
use crate::io::artifact::{output_exists, StageOutcome, MIN_ARTIFACT_SIZE};
use crate::mesh::ParameterizedMesh;

pub use decode::DecodeOptions;
pub use inpaint::InpaintOptions;
pub use naming::GeometryImagePaths;
pub use pack::PackOptions;
pub use raster::{EncodeOptions, Raster};

use raster::{Channel, ValidityMask};

/// Encoded images held in memory.
#[derive(Debug, Clone)]
pub struct GeometryImages {
    /// Position image.
    pub position: RgbImage,
    /// Normal image, when normals were encoded.
    pub normal: Option<RgbImage>,
}

/// What [`Encoder::encode_to_files`] did for each image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOutcome {
    /// Position image.
    pub position: StageOutcome,
    /// Normal image, when normals are enabled.
    pub normal: Option<StageOutcome>,
}

impl EncodeOutcome {
    /// True if no image was written.
    pub fn is_skipped(&self) -> bool {
        self.position.is_skipped() && self.normal.map_or(true, StageOutcome::is_skipped)
    }
}

/// Encodes parameterized meshes into geometry images.
///
/// Holds every option of the encode path; one encoder can be reused for any
/// number of meshes.
#[derive(Debug, Clone)]
pub struct Encoder {
    options: EncodeOptions,
    inpaint: InpaintOptions,
    pack: PackOptions,
    min_artifact_size: u64,
}

impl Encoder {
    /// Create an encoder with default inpainting and packing.
    pub fn new(options: EncodeOptions) -> Self {
        Self {
            options,
            inpaint: InpaintOptions::default(),
            pack: PackOptions::default(),
            min_artifact_size: MIN_ARTIFACT_SIZE,
        }
    }

    /// Set the inpainting options.
    pub fn with_inpaint(mut self, inpaint: InpaintOptions) -> Self {
        self.inpaint = inpaint;
        self
    }

    /// Set the packing options.
    pub fn with_pack(mut self, pack: PackOptions) -> Self {
        self.pack = pack;
        self
    }

    /// Set the size above which an existing image counts as done.
    pub fn with_min_artifact_size(mut self, bytes: u64) -> Self {
        self.min_artifact_size = bytes;
        self
    }

    /// The rasterization options.
    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    fn fill(
        &self,
        channels: &[Channel; 3],
        mask: &ValidityMask,
        group: usize,
        groups: usize,
        progress: &Progress,
    ) -> Result<[Channel; 3]> {
        let steps = self.inpaint.iterations;
        let mut filled = Vec::with_capacity(3);
        for (d, channel) in channels.iter().enumerate() {
            filled.push(inpaint::inpaint(channel, mask, &self.inpaint)?);
            progress.report_part(group * 3 + d, groups * 3, steps, steps, "Inpainting");
        }
        filled.try_into().map_err(|_| CodecError::EmptyChannel)
    }

    /// True if every image this encoder would write to `paths` already exists.
    pub fn is_done(&self, paths: &GeometryImagePaths) -> bool {
        let min = self.min_artifact_size;
        let normal_done = match (&paths.normal, self.options.use_normals) {
            (Some(path), true) => output_exists(path, min),
            (None, true) => false,
            (_, false) => true,
        };
        normal_done && output_exists(&paths.position, min)
    }

    /// Rasterize and inpaint, returning filled channel triples.
    pub fn rasterize_filled(
        &self,
        mesh: &ParameterizedMesh,
        normals: Option<&[Vector3<f64>]>,
        progress: &Progress,
    ) -> Result<([Channel; 3], Option<[Channel; 3]>)> {
        let raster = raster::rasterize(mesh, normals, &self.options)?;
        let mask = raster.validity();
        let Raster { position, normal, .. } = raster;
        let groups = if normal.is_some() { 2 } else { 1 };

        let position = self.fill(&position, &mask, 0, groups, progress)?;
        let normal = match normal {
            Some(channels) => Some(self.fill(&channels, &mask, 1, groups, progress)?),
            None => None,
        };
        Ok((position, normal))
    }

    /// Encode into in-memory images.
    pub fn encode(
        &self,
        mesh: &ParameterizedMesh,
        normals: Option<&[Vector3<f64>]>,
    ) -> Result<GeometryImages> {
        let (position, normal) = self.rasterize_filled(mesh, normals, &Progress::none())?;
        let position = pack::to_image(&pack::normalize(position, &self.pack)?)?;
        let normal = match normal {
            Some(channels) => Some(pack::to_image(&pack::normalize(channels, &self.pack)?)?),
            None => None,
        };
        Ok(GeometryImages { position, normal })
    }

    /// Encode and write the images named by `paths`.
    ///
    /// Nothing is computed when every required image already exists.
    ///
    /// # Errors
    ///
    /// [`CodecError::MissingNormals`] if normals are enabled and `paths` has
    /// no normal image, plus every error of [`raster::rasterize`].
    pub fn encode_to_files(
        &self,
        mesh: &ParameterizedMesh,
        normals: Option<&[Vector3<f64>]>,
        paths: &GeometryImagePaths,
        progress: &Progress,
    ) -> Result<EncodeOutcome> {
        let normal_path = match (self.options.use_normals, &paths.normal) {
            (true, Some(path)) => Some(path),
            (true, None) => return Err(CodecError::MissingNormals),
            (false, _) => None,
        };

        let min = self.min_artifact_size;
        if self.is_done(paths) {
            debug!("{} exists, skipping encode", paths.position.display());
            return Ok(EncodeOutcome {
                position: StageOutcome::Skipped,
                normal: normal_path.map(|_| StageOutcome::Skipped),
            });
        }

        let (position, normal) = self.rasterize_filled(mesh, normals, progress)?;
        let position = pack::save_geometry_image(position, &paths.position, &self.pack, min)?;
        let normal = match (normal, normal_path) {
            (Some(channels), Some(path)) => Some(pack::save_geometry_image(channels, path, &self.pack, min)?),
            _ => None,
        };

        info!(
            "Encoded {} faces into {}",
            mesh.faces().len(),
            paths.position.display()
        );
        Ok(EncodeOutcome { position, normal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::vertex_normals;
    use crate::mesh::TriMesh;
    use nalgebra::Point3;

    fn unit_triangle() -> ParameterizedMesh {
        let flat = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        ParameterizedMesh::new(&flat, flat.clone()).unwrap()
    }

    /// Flat grid over the unit square lifted onto a paraboloid.
    fn paraboloid(n: usize) -> ParameterizedMesh {
        let mut flat = Vec::new();
        let mut surface = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                let (u, v) = (i as f64 / n as f64, j as f64 / n as f64);
                flat.push(Point3::new(u, v, 0.0));
                surface.push(Point3::new(u, v, 0.5 * (u * u + v * v)));
            }
        }
        let mut faces = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                faces.push([v00, v00 + 1, v00 + n + 2]);
                faces.push([v00, v00 + n + 2, v00 + n + 1]);
            }
        }
        let flat = TriMesh::new(flat, faces.clone()).unwrap();
        ParameterizedMesh::new(&flat, TriMesh::new(surface, faces).unwrap()).unwrap()
    }

    #[test]
    fn test_example_pixel_round_trip() {
        let mesh = unit_triangle();
        let encoder = Encoder::new(EncodeOptions::default());
        let images = encoder.encode(&mesh, None).unwrap();

        let grid = decode::decode_images(&images.position, None).unwrap();
        assert_eq!(grid.num_vertices(), 64 * 64);
        assert_eq!(grid.num_faces(), 63 * 63);

        // x spans [0, 1] and is doubled, y spans [0, 1], z is flat: divisor 2.
        let decoded = grid.positions()[10 * 64 + 10];
        let expected = 10.0 / 63.0 / 2.0;
        assert!((decoded.x - expected).abs() <= 1.0 / 255.0);
        assert!((decoded.y - expected).abs() <= 1.0 / 255.0);
        assert!(decoded.z.abs() <= 1.0 / 255.0);
    }

    #[test]
    fn test_every_pixel_defined_and_extremum_reached() {
        let mesh = paraboloid(6);
        let encoder = Encoder::new(EncodeOptions::default().with_im_size(32))
            .with_pack(PackOptions { double_slice_axis: false });
        let (position, _) = encoder.rasterize_filled(&mesh, None, &Progress::none()).unwrap();
        for channel in &position {
            assert!(channel.iter().all(|v| v.is_finite()));
        }

        let images = encoder.encode(&mesh, None).unwrap();
        let raw = images.position.as_raw();
        assert!(raw.iter().any(|&b| b == 255));
        assert!(raw.iter().any(|&b| b == 0));
    }

    #[test]
    fn test_encode_with_normals() {
        let mesh = paraboloid(4);
        let normals = vertex_normals(mesh.surface());
        let encoder = Encoder::new(EncodeOptions::default().with_im_size(16).with_normals(true));
        let images = encoder.encode(&mesh, Some(&normals)).unwrap();
        let normal = images.normal.unwrap();
        assert_eq!(normal.dimensions(), (16, 16));

        let grid = decode::decode_images(&images.position, Some(&normal)).unwrap();
        assert_eq!(grid.normals().unwrap().len(), 256);
    }

    #[test]
    fn test_encode_to_files_is_idempotent() {
        let dir = std::env::temp_dir().join(format!("flatgi-codec-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let paths = GeometryImagePaths::for_flat_mesh(dir.join("p_arcSMI.off"), 16);

        let mesh = paraboloid(3);
        let normals = vertex_normals(mesh.surface());
        let encoder = Encoder::new(EncodeOptions::default().with_im_size(16).with_normals(true));

        let first = encoder.encode_to_files(&mesh, Some(&normals), &paths, &Progress::none()).unwrap();
        assert_eq!(first.position, StageOutcome::Written);
        assert_eq!(first.normal, Some(StageOutcome::Written));

        let second = encoder.encode_to_files(&mesh, Some(&normals), &paths, &Progress::none()).unwrap();
        assert!(second.is_skipped());

        let no_normal = paths.clone().without_normal();
        assert!(matches!(
            encoder.encode_to_files(&mesh, Some(&normals), &no_normal, &Progress::none()),
            Err(CodecError::MissingNormals)
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_progress_covers_all_channels() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |c, t, _| sink.lock().unwrap().push((c, t)));

        let mesh = paraboloid(2);
        let encoder = Encoder::new(EncodeOptions::default().with_im_size(8))
            .with_inpaint(InpaintOptions::default().with_iterations(4));
        encoder.rasterize_filled(&mesh, None, &progress).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(4, 12), (8, 12), (12, 12)]);
    }
}
