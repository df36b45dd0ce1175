//! Filling undefined pixels by iterative diffusion.
//!
//! Invalid pixels are seeded with the mean of the valid ones, then a
//! normalized box filter is applied repeatedly. Valid pixels are restored
//! after every pass, so only the holes evolve.

use log::{debug, warn};
use nalgebra::DMatrix;

use crate::algo::Progress;
use crate::error::{CodecError, Result};

use super::raster::{Channel, ValidityMask};

/// Parameters of the diffusion.
#[derive(Debug, Clone)]
pub struct InpaintOptions {
    /// Kernel extent along rows.
    pub kernel_rows: usize,
    /// Kernel extent along columns.
    pub kernel_cols: usize,
    /// Number of filter passes.
    pub iterations: usize,
}

impl Default for InpaintOptions {
    fn default() -> Self {
        Self {
            kernel_rows: 3,
            kernel_cols: 3,
            iterations: 20,
        }
    }
}

impl InpaintOptions {
    /// Set the number of filter passes.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the kernel shape.
    pub fn with_kernel(mut self, rows: usize, cols: usize) -> Self {
        self.kernel_rows = rows;
        self.kernel_cols = cols;
        self
    }
}

/// Mirror an out-of-range index back into `0..n`, excluding the edge sample
/// (`dcb|abcd|cba`).
#[inline]
fn reflect_101(mut i: isize, n: usize) -> usize {
    let n = n as isize;
    if n == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

/// One pass of a normalized `kernel_rows x kernel_cols` box filter.
///
/// The anchor is the kernel centre. The filter is separable, so rows and
/// columns are averaged in turn.
fn box_filter(src: &Channel, kernel_rows: usize, kernel_cols: usize, scratch: &mut Channel) -> Channel {
    let (rows, cols) = src.shape();
    let anchor_r = (kernel_rows / 2) as isize;
    let anchor_c = (kernel_cols / 2) as isize;

    for r in 0..rows {
        for c in 0..cols {
            let sum: f64 = (0..kernel_cols as isize)
                .map(|k| src[(r, reflect_101(c as isize + k - anchor_c, cols))])
                .sum();
            scratch[(r, c)] = sum / kernel_cols as f64;
        }
    }

    DMatrix::from_fn(rows, cols, |r, c| {
        let sum: f64 = (0..kernel_rows as isize)
            .map(|k| scratch[(reflect_101(r as isize + k - anchor_r, rows), c)])
            .sum();
        sum / kernel_rows as f64
    })
}

/// Fill the invalid pixels of `channel`.
///
/// See [`inpaint_with_progress`].
pub fn inpaint(channel: &Channel, mask: &ValidityMask, options: &InpaintOptions) -> Result<Channel> {
    inpaint_with_progress(channel, mask, options, &Progress::none())
}

/// Fill the invalid pixels of `channel`, reporting once per pass.
///
/// Valid pixels come back unchanged. When no pixel is valid the seed is zero
/// and the output is all zeros.
///
/// # Errors
///
/// - [`CodecError::ChannelShape`] if `mask` and `channel` differ in shape
/// - [`CodecError::InvalidParameter`] for an empty kernel
pub fn inpaint_with_progress(
    channel: &Channel,
    mask: &ValidityMask,
    options: &InpaintOptions,
    progress: &Progress,
) -> Result<Channel> {
    let (rows, cols) = channel.shape();
    let (mask_rows, mask_cols) = mask.shape();
    if (rows, cols) != (mask_rows, mask_cols) {
        return Err(CodecError::ChannelShape {
            rows,
            cols,
            mask_rows,
            mask_cols,
        });
    }
    if options.kernel_rows == 0 || options.kernel_cols == 0 {
        return Err(CodecError::invalid_param(
            "kernel",
            format!("{}x{}", options.kernel_rows, options.kernel_cols),
            "kernel must be at least 1x1",
        ));
    }

    let valid = mask.count_valid();
    let mean = if valid == 0 {
        warn!("No valid pixels to inpaint from, filling with zeros");
        0.0
    } else {
        let sum: f64 = (0..cols)
            .flat_map(|c| (0..rows).map(move |r| (r, c)))
            .filter(|&(r, c)| mask.is_valid(r, c))
            .map(|(r, c)| channel[(r, c)])
            .sum();
        sum / valid as f64
    };

    let mut current = DMatrix::from_fn(rows, cols, |r, c| {
        if mask.is_valid(r, c) {
            channel[(r, c)]
        } else {
            mean
        }
    });

    if valid < rows * cols {
        let mut scratch = DMatrix::zeros(rows, cols);
        for iter in 0..options.iterations {
            let mut next = box_filter(&current, options.kernel_rows, options.kernel_cols, &mut scratch);
            for c in 0..cols {
                for r in 0..rows {
                    if mask.is_valid(r, c) {
                        next[(r, c)] = channel[(r, c)];
                    }
                }
            }
            current = next;
            progress.report(iter + 1, options.iterations, "Inpainting");
        }
    }

    debug!(
        "Inpainted {} of {} pixels (seed {mean:.6})",
        rows * cols - valid,
        rows * cols
    );

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: usize, cols: usize, f: impl Fn(usize, usize) -> bool) -> ValidityMask {
        ValidityMask::from_matrix(DMatrix::from_fn(rows, cols, f))
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(2, 5), 2);
        assert_eq!(reflect_101(-1, 1), 0);
    }

    #[test]
    fn test_box_filter_preserves_constant() {
        let src = DMatrix::from_element(4, 5, 2.5);
        let mut scratch = DMatrix::zeros(4, 5);
        let out = box_filter(&src, 3, 3, &mut scratch);
        assert!(out.iter().all(|&v| (v - 2.5).abs() < 1e-12));
    }

    #[test]
    fn test_box_filter_border() {
        // Row [0, 3, 6] reflects to [3 | 0 3 6 | 3].
        let src = DMatrix::from_row_slice(1, 3, &[0.0, 3.0, 6.0]);
        let mut scratch = DMatrix::zeros(1, 3);
        let out = box_filter(&src, 1, 3, &mut scratch);
        assert!((out[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((out[(0, 1)] - 3.0).abs() < 1e-12);
        assert!((out[(0, 2)] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_inpaint_fills_every_pixel_and_keeps_valid() {
        let channel = DMatrix::from_fn(8, 8, |r, c| if r + c <= 7 { r as f64 } else { f64::NAN });
        let mask = mask_from(8, 8, |r, c| r + c <= 7);

        let out = inpaint(&channel, &mask, &InpaintOptions::default()).unwrap();
        for c in 0..8 {
            for r in 0..8 {
                assert!(out[(r, c)].is_finite());
                if mask.is_valid(r, c) {
                    assert_eq!(out[(r, c)], channel[(r, c)]);
                } else {
                    // Diffusion never leaves the range of the valid data.
                    assert!((0.0..=7.0).contains(&out[(r, c)]));
                }
            }
        }
    }

    #[test]
    fn test_inpaint_single_hole_converges_to_neighbours() {
        let channel = DMatrix::from_fn(5, 5, |r, c| if (r, c) == (2, 2) { f64::NAN } else { 1.0 });
        let mask = mask_from(5, 5, |r, c| (r, c) != (2, 2));
        let out = inpaint(&channel, &mask, &InpaintOptions::default()).unwrap();
        assert!((out[(2, 2)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inpaint_without_valid_pixels_is_zero() {
        let channel = DMatrix::from_element(4, 4, f64::NAN);
        let mask = mask_from(4, 4, |_, _| false);
        let out = inpaint(&channel, &mask, &InpaintOptions::default()).unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_inpaint_rejects_mismatched_mask() {
        let channel = DMatrix::zeros(4, 4);
        let mask = mask_from(3, 4, |_, _| true);
        assert!(matches!(
            inpaint(&channel, &mask, &InpaintOptions::default()),
            Err(CodecError::ChannelShape { rows: 4, mask_rows: 3, .. })
        ));
    }

    #[test]
    fn test_inpaint_reports_each_pass() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let channel = DMatrix::from_fn(4, 4, |r, _| if r == 0 { 1.0 } else { f64::NAN });
        let mask = mask_from(4, 4, |r, _| r == 0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let progress = Progress::new(move |_, _, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        inpaint_with_progress(&channel, &mask, &InpaintOptions::default().with_iterations(5), &progress)
            .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 5);
    }
}
