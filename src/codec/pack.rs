//! Normalizing channel triples into 8-bit RGB geometry images.
//!
//! Each channel is shifted to start at zero, then all three are divided by
//! one shared divisor so relative proportions survive. Channel 0 is the axis
//! the mesh was sliced along; by default its range counts double when
//! choosing the divisor, which leaves room for mirroring the half back.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, Rgb, RgbImage};
use log::{debug, warn};

use crate::error::{CodecError, Result};
use crate::io::artifact::{output_exists, StageOutcome};

use super::raster::Channel;

/// Options for [`normalize`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Count the range of channel 0 twice when picking the divisor.
    pub double_slice_axis: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            double_slice_axis: true,
        }
    }
}

/// Three channels scaled into `[0, 1]` by a common divisor.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// The scaled channels.
    pub channels: [Channel; 3],
    /// Per-channel minimum subtracted before scaling.
    pub minima: [f64; 3],
    /// The shared divisor.
    pub divisor: f64,
}

fn min_max(channel: &Channel) -> (f64, f64) {
    channel
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Shift every channel to a zero minimum and divide by the shared divisor.
///
/// The divisor is the largest channel range, with channel 0 doubled when
/// `options.double_slice_axis` is set. If every range is zero the channels
/// stay at zero.
///
/// # Errors
///
/// [`CodecError::EmptyChannel`] if the channels hold no pixels.
pub fn normalize(channels: [Channel; 3], options: &PackOptions) -> Result<Normalized> {
    if channels.iter().any(|c| c.is_empty()) {
        return Err(CodecError::EmptyChannel);
    }

    let mut minima = [0.0; 3];
    let mut ranges = [0.0; 3];
    for (d, channel) in channels.iter().enumerate() {
        let (lo, hi) = min_max(channel);
        minima[d] = lo;
        ranges[d] = hi - lo;
    }
    if options.double_slice_axis {
        ranges[0] *= 2.0;
    }

    let divisor = ranges.iter().copied().fold(0.0, f64::max);
    if divisor <= 0.0 {
        warn!("All channels are constant, geometry image will be black");
    }

    let scale = |channel: Channel, lo: f64| {
        channel.map(|v| if divisor > 0.0 { (v - lo) / divisor } else { 0.0 })
    };
    let [c0, c1, c2] = channels;
    let channels = [scale(c0, minima[0]), scale(c1, minima[1]), scale(c2, minima[2])];

    debug!("Normalized channels: minima {minima:?}, divisor {divisor}");

    Ok(Normalized {
        channels,
        minima,
        divisor,
    })
}

#[inline]
fn quantize(value: f64) -> u8 {
    // Truncates; NaN maps to zero.
    (value * 255.0).clamp(0.0, 255.0) as u8
}

/// Pack normalized channels into an RGB image.
///
/// Image pixel `(x, y)` comes from buffer cell `(y, x)`. Channels are stored
/// reversed: red holds channel 2 and blue holds channel 0.
pub fn to_image(normalized: &Normalized) -> Result<RgbImage> {
    let [c0, c1, c2] = &normalized.channels;
    let (rows, cols) = c0.shape();
    let width = u32::try_from(cols).map_err(|_| CodecError::invalid_param("im_size", cols, "too large"))?;
    let height = u32::try_from(rows).map_err(|_| CodecError::invalid_param("im_size", rows, "too large"))?;

    Ok(RgbImage::from_fn(width, height, |x, y| {
        let cell = (y as usize, x as usize);
        Rgb([quantize(c2[cell]), quantize(c1[cell]), quantize(c0[cell])])
    }))
}

/// Write `image` as PNG using fast compression and no filtering.
pub fn write_png<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| CodecError::SaveError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let encoder = PngEncoder::new_with_quality(
        BufWriter::new(file),
        CompressionType::Fast,
        FilterType::NoFilter,
    );
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(())
}

/// Normalize `channels` and write them to `path`.
///
/// Skips all work when `path` already holds more than `min_size` bytes.
pub fn save_geometry_image<P: AsRef<Path>>(
    channels: [Channel; 3],
    path: P,
    options: &PackOptions,
    min_size: u64,
) -> Result<StageOutcome> {
    let path = path.as_ref();
    if output_exists(path, min_size) {
        debug!("{} exists, skipping", path.display());
        return Ok(StageOutcome::Skipped);
    }

    let normalized = normalize(channels, options)?;
    let image = to_image(&normalized)?;
    write_png(&image, path)?;
    Ok(StageOutcome::Written)
}
