//! Scattered-to-grid rasterization of a parameterized mesh.
//!
//! Every flat triangle is scaled into pixel space, each integer grid point
//! of its bounding box is assigned barycentric weights, and points inside
//! the triangle accumulate the weighted surface position (and normal) into
//! per-channel buffers. A hit-count mask records how many samples landed in
//! each cell; averaging by that count finishes the pass.
//!
//! Buffers are indexed `(row, col) = (pixel x, pixel y)`, i.e. the row comes
//! from the first UV axis.

use log::debug;
use nalgebra::{DMatrix, Matrix3, Point2, Vector3};

use crate::error::{CodecError, Result};
use crate::mesh::ParameterizedMesh;

/// Default lower bound on barycentric weights for a point to count as inside.
///
/// Slightly negative so grid points on shared edges survive round-off.
pub const BARYCENTRIC_TOLERANCE: f64 = 2.2204e-5;

/// One channel of per-pixel values.
pub type Channel = DMatrix<f64>;

/// Options for rasterizing a parameterized mesh.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Width and height of the geometry image in pixels.
    pub im_size: usize,

    /// Also rasterize per-vertex normals into three extra channels.
    pub use_normals: bool,

    /// Weights must be `>= -barycentric_tolerance` for a point to be kept.
    pub barycentric_tolerance: f64,

    /// Flat vertices with |u| or |v| above this abort the encode.
    pub uv_outlier_limit: f64,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            im_size: 64,
            use_normals: false,
            barycentric_tolerance: BARYCENTRIC_TOLERANCE,
            uv_outlier_limit: 1.5,
        }
    }
}

impl EncodeOptions {
    /// Create options for a given image size.
    pub fn with_im_size(mut self, im_size: usize) -> Self {
        self.im_size = im_size;
        self
    }

    /// Enable or disable the normal channels.
    pub fn with_normals(mut self, use_normals: bool) -> Self {
        self.use_normals = use_normals;
        self
    }

    /// Set the barycentric inclusion tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.barycentric_tolerance = tolerance.abs();
        self
    }

    /// Set the UV outlier limit.
    pub fn with_outlier_limit(mut self, limit: f64) -> Self {
        self.uv_outlier_limit = limit;
        self
    }
}

/// Binary per-pixel mask derived from a [`HitCountMask`] (`count > 0`).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidityMask {
    valid: DMatrix<bool>,
}

impl ValidityMask {
    /// Build a mask from explicit values.
    pub fn from_matrix(valid: DMatrix<bool>) -> Self {
        Self { valid }
    }

    /// True if pixel `(row, col)` received at least one sample.
    #[inline]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.valid[(row, col)]
    }

    /// `(rows, cols)` of the mask.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.valid.shape()
    }

    /// Number of valid pixels.
    pub fn count_valid(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }
}

/// Per-pixel count of contributing triangle samples.
#[derive(Debug, Clone, PartialEq)]
pub struct HitCountMask {
    counts: DMatrix<u32>,
}

impl HitCountMask {
    fn zeros(size: usize) -> Self {
        Self {
            counts: DMatrix::zeros(size, size),
        }
    }

    /// Samples that landed in pixel `(row, col)`.
    #[inline]
    pub fn count(&self, row: usize, col: usize) -> u32 {
        self.counts[(row, col)]
    }

    /// `(rows, cols)` of the mask.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.counts.shape()
    }

    /// Pixels with `count > 0`.
    pub fn validity(&self) -> ValidityMask {
        ValidityMask {
            valid: self.counts.map(|c| c > 0),
        }
    }
}

/// Barycentric solver for one triangle in pixel space.
///
/// Solves `[1 1 1; x0 x1 x2; y0 y1 y2] * w = [1; px; py]`. The matrix is
/// inverted once per triangle.
#[derive(Debug, Clone, Copy)]
pub struct Barycentric {
    inverse: Matrix3<f64>,
}

impl Barycentric {
    /// Prepare the solver. Returns `None` for triangles with zero area.
    pub fn new(corners: [Point2<f64>; 3]) -> Option<Self> {
        let [a, b, c] = corners;
        #[rustfmt::skip]
        let system = Matrix3::new(
            1.0, 1.0, 1.0,
            a.x, b.x, c.x,
            a.y, b.y, c.y,
        );
        system.try_inverse().map(|inverse| Self { inverse })
    }

    /// Weights of point `(px, py)`; they sum to one.
    #[inline]
    pub fn weights(&self, px: f64, py: f64) -> Vector3<f64> {
        self.inverse * Vector3::new(1.0, px, py)
    }
}

/// Raw output of [`rasterize`]: averaged channels plus the hit counts.
///
/// Cells with a zero count hold `NaN` until they are inpainted.
#[derive(Debug, Clone)]
pub struct Raster {
    /// Surface position channels (x, y, z).
    pub position: [Channel; 3],
    /// Surface normal channels, when enabled.
    pub normal: Option<[Channel; 3]>,
    /// Per-pixel sample counts.
    pub hits: HitCountMask,
}

impl Raster {
    /// Validity mask derived from the hit counts.
    pub fn validity(&self) -> ValidityMask {
        self.hits.validity()
    }
}

struct Sample {
    row: usize,
    col: usize,
    weights: Vector3<f64>,
}

fn zero_channels(size: usize) -> [Channel; 3] {
    [
        DMatrix::zeros(size, size),
        DMatrix::zeros(size, size),
        DMatrix::zeros(size, size),
    ]
}

fn accumulate(channels: &mut [Channel; 3], sample: &Sample, corners: &[Vector3<f64>; 3]) {
    let w = &sample.weights;
    let value = corners[0] * w[0] + corners[1] * w[1] + corners[2] * w[2];
    for (dim, channel) in channels.iter_mut().enumerate() {
        channel[(sample.row, sample.col)] += value[dim];
    }
}

fn average(channels: &mut [Channel; 3], hits: &HitCountMask) {
    for channel in channels.iter_mut() {
        for (value, &n) in channel.iter_mut().zip(hits.counts.iter()) {
            *value = if n == 0 { f64::NAN } else { *value / f64::from(n) };
        }
    }
}

/// Rasterize a parameterized mesh into averaged channel buffers.
///
/// `normals` must hold one vector per surface vertex when
/// `options.use_normals` is set; otherwise it is ignored.
///
/// # Errors
///
/// - [`CodecError::EmptyChannel`] for a zero image size
/// - [`CodecError::MissingNormals`] when normals are enabled but absent
/// - [`CodecError::VertexCountMismatch`] when the normal field is the wrong length
/// - [`CodecError::UvOutlier`] for flat vertices far outside the unit square
/// - [`CodecError::ScratchAllocation`] if per-triangle sample storage cannot be reserved
pub fn rasterize(
    mesh: &ParameterizedMesh,
    normals: Option<&[Vector3<f64>]>,
    options: &EncodeOptions,
) -> Result<Raster> {
    let size = options.im_size;
    if size == 0 {
        return Err(CodecError::EmptyChannel);
    }

    let normals = if options.use_normals {
        let normals = normals.ok_or(CodecError::MissingNormals)?;
        if normals.len() != mesh.surface().num_vertices() {
            return Err(CodecError::VertexCountMismatch {
                flat: normals.len(),
                surface: mesh.surface().num_vertices(),
            });
        }
        Some(normals)
    } else {
        None
    };

    if let Some((vertex, uv)) = mesh.uv().find_outlier(options.uv_outlier_limit) {
        return Err(CodecError::UvOutlier {
            vertex,
            u: uv.x,
            v: uv.y,
        });
    }

    let scale = (size - 1) as f64;
    let limit = size as i64;
    let tolerance = -options.barycentric_tolerance;

    let mut position = zero_channels(size);
    let mut normal = normals.map(|_| zero_channels(size));
    let mut hits = HitCountMask::zeros(size);

    let mut samples: Vec<Sample> = Vec::new();
    let mut skipped = 0usize;

    for (fi, face) in mesh.faces().iter().enumerate() {
        let corners = face.map(|v| {
            let uv = mesh.uv().get(v);
            Point2::new(uv.x * scale, uv.y * scale)
        });

        let x_min = corners.iter().map(|p| p.x.floor()).fold(f64::INFINITY, f64::min) as i64;
        let x_max = corners.iter().map(|p| p.x.ceil()).fold(f64::NEG_INFINITY, f64::max) as i64;
        let y_min = corners.iter().map(|p| p.y.floor()).fold(f64::INFINITY, f64::min) as i64;
        let y_max = corners.iter().map(|p| p.y.ceil()).fold(f64::NEG_INFINITY, f64::max) as i64;

        let n_rows = x_max - x_min + 1;
        let n_cols = y_max - y_min + 1;
        if n_rows <= 0 || n_cols <= 0 {
            skipped += 1;
            continue;
        }

        let Some(solver) = Barycentric::new(corners) else {
            skipped += 1;
            continue;
        };

        let wanted = usize::try_from(n_rows)
            .ok()
            .zip(usize::try_from(n_cols).ok())
            .and_then(|(r, c)| r.checked_mul(c))
            .unwrap_or(usize::MAX);
        samples.clear();
        samples
            .try_reserve(wanted)
            .map_err(|_| CodecError::ScratchAllocation { face: fi, samples: wanted })?;

        for px in x_min..=x_max {
            for py in y_min..=y_max {
                if px < 0 || px >= limit || py < 0 || py >= limit {
                    continue;
                }
                let w = solver.weights(px as f64, py as f64);
                if w.iter().all(|&wi| wi >= tolerance) && !w.iter().all(|&wi| wi == 0.0) {
                    samples.push(Sample {
                        row: px as usize,
                        col: py as usize,
                        weights: w,
                    });
                }
            }
        }

        let surface_corners = face.map(|v| mesh.surface().position(v).coords);
        let normal_corners = normals.map(|n| face.map(|v| n[v]));
        for sample in &samples {
            accumulate(&mut position, sample, &surface_corners);
            if let (Some(channels), Some(corners)) = (normal.as_mut(), normal_corners.as_ref()) {
                accumulate(channels, sample, corners);
            }
            hits.counts[(sample.row, sample.col)] += 1;
        }
    }

    average(&mut position, &hits);
    if let Some(channels) = normal.as_mut() {
        average(channels, &hits);
    }

    debug!(
        "Rasterized {} faces into {size}x{size} ({} valid pixels, {skipped} faces skipped)",
        mesh.faces().len(),
        hits.validity().count_valid()
    );

    Ok(Raster {
        position,
        normal,
        hits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TriMesh;
    use nalgebra::Point3;
    use proptest::prelude::*;

    fn unit_triangle_pair() -> ParameterizedMesh {
        let flat = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let surface = flat.clone();
        ParameterizedMesh::new(&flat, surface).unwrap()
    }

    fn unit_square_pair(z: [f64; 4]) -> ParameterizedMesh {
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let flat = TriMesh::new(
            corners.iter().map(|&(u, v)| Point3::new(u, v, 0.0)).collect(),
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap();
        let surface = TriMesh::new(
            corners
                .iter()
                .zip(z)
                .map(|(&(u, v), z)| Point3::new(u, v, z))
                .collect(),
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap();
        ParameterizedMesh::new(&flat, surface).unwrap()
    }

    #[test]
    fn test_example_pixel_weights_and_value() {
        let mesh = unit_triangle_pair();
        let raster = rasterize(&mesh, None, &EncodeOptions::default()).unwrap();

        let solver = Barycentric::new([
            Point2::new(0.0, 0.0),
            Point2::new(63.0, 0.0),
            Point2::new(0.0, 63.0),
        ])
        .unwrap();
        let w = solver.weights(10.0, 10.0);
        assert!((w.sum() - 1.0).abs() < 1e-12);
        assert!((w[1] - 10.0 / 63.0).abs() < 1e-12);

        assert_eq!(raster.hits.count(10, 10), 1);
        assert!((raster.position[0][(10, 10)] - 10.0 / 63.0).abs() < 1e-12);
        assert!((raster.position[1][(10, 10)] - 10.0 / 63.0).abs() < 1e-12);
        assert_eq!(raster.position[2][(10, 10)], 0.0);
    }

    #[test]
    fn test_outside_pixels_stay_undefined() {
        let mesh = unit_triangle_pair();
        let raster = rasterize(&mesh, None, &EncodeOptions::default().with_im_size(8)).unwrap();

        // Hypotenuse is row + col == 7.
        assert_eq!(raster.hits.count(3, 4), 1);
        assert_eq!(raster.hits.count(4, 4), 0);
        assert!(raster.position[0][(4, 4)].is_nan());
        assert_eq!(raster.validity().count_valid(), 36);
    }

    #[test]
    fn test_shared_edge_pixels_are_averaged() {
        let mesh = unit_square_pair([0.0, 0.0, 4.0, 0.0]);
        let raster = rasterize(&mesh, None, &EncodeOptions::default().with_im_size(5)).unwrap();

        // The diagonal is hit by both triangles.
        assert_eq!(raster.hits.count(2, 2), 2);
        assert_eq!(raster.hits.count(3, 1), 1);
        assert_eq!(raster.validity().count_valid(), 25);
        assert!((raster.position[2][(2, 2)] - 2.0).abs() < 1e-9);
        assert!((raster.position[2][(4, 4)] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_normals_are_interpolated() {
        let mesh = unit_square_pair([0.0; 4]);
        let normals = vec![Vector3::z(); 4];
        let options = EncodeOptions::default().with_im_size(4).with_normals(true);

        let raster = rasterize(&mesh, Some(&normals), &options).unwrap();
        let channels = raster.normal.unwrap();
        assert!((channels[2][(1, 2)] - 1.0).abs() < 1e-12);
        assert!(channels[0][(1, 2)].abs() < 1e-12);

        assert!(matches!(
            rasterize(&mesh, None, &options),
            Err(CodecError::MissingNormals)
        ));
        assert!(matches!(
            rasterize(&mesh, Some(&normals[..2]), &options),
            Err(CodecError::VertexCountMismatch { flat: 2, surface: 4 })
        ));
    }

    #[test]
    fn test_rejects_empty_size_and_outliers() {
        let mesh = unit_triangle_pair();
        assert!(matches!(
            rasterize(&mesh, None, &EncodeOptions::default().with_im_size(0)),
            Err(CodecError::EmptyChannel)
        ));

        let flat = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.8, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let mesh = ParameterizedMesh::new(&flat, flat.clone()).unwrap();
        assert!(matches!(
            rasterize(&mesh, None, &EncodeOptions::default()),
            Err(CodecError::UvOutlier { vertex: 1, .. })
        ));
        assert!(rasterize(&mesh, None, &EncodeOptions::default().with_outlier_limit(2.0)).is_ok());
    }

    #[test]
    fn test_degenerate_flat_triangle_is_skipped() {
        let flat = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.5, 0.5, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let mesh = ParameterizedMesh::new(&flat, flat.clone()).unwrap();
        let raster = rasterize(&mesh, None, &EncodeOptions::default().with_im_size(8)).unwrap();
        assert_eq!(raster.validity().count_valid(), 0);
    }

    proptest! {
        #[test]
        fn prop_retained_weights_sum_to_one(
            ax in 0.0f64..63.0, ay in 0.0f64..63.0,
            bx in 0.0f64..63.0, by in 0.0f64..63.0,
            cx in 0.0f64..63.0, cy in 0.0f64..63.0,
        ) {
            let corners = [Point2::new(ax, ay), Point2::new(bx, by), Point2::new(cx, cy)];
            let area2 = ((bx - ax) * (cy - ay) - (cx - ax) * (by - ay)).abs();
            prop_assume!(area2 > 1.0);

            let solver = Barycentric::new(corners).unwrap();
            let x0 = ax.min(bx).min(cx).floor() as i64;
            let x1 = ax.max(bx).max(cx).ceil() as i64;
            let y0 = ay.min(by).min(cy).floor() as i64;
            let y1 = ay.max(by).max(cy).ceil() as i64;
            for px in x0..=x1 {
                for py in y0..=y1 {
                    let w = solver.weights(px as f64, py as f64);
                    if w.iter().all(|&wi| wi >= -BARYCENTRIC_TOLERANCE) {
                        prop_assert!((w.sum() - 1.0).abs() < 1e-9);
                        // Reconstructs the sample point.
                        let x = w[0] * ax + w[1] * bx + w[2] * cx;
                        let y = w[0] * ay + w[1] * by + w[2] * cy;
                        prop_assert!((x - px as f64).abs() < 1e-6);
                        prop_assert!((y - py as f64).abs() < 1e-6);
                    }
                }
            }
        }
    }
}
