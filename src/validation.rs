//! Checks on captured YUYV frames.
//!
//! Used to confirm that preview buffers delivered to the host hold the test
//! pattern a virtual camera (or the mock device) produces.

use crate::convert::yuyv_pixel_at;
use crate::traits::{Format, HalError, Result};

/// RGB values of the eight SMPTE color bars after YUV conversion.
///
/// Colors in order: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
const SMPTE_COLOR_BARS: [(u8, u8, u8); 8] = [
    (235, 235, 235),
    (235, 235, 11),
    (12, 236, 237),
    (13, 237, 13),
    (237, 13, 237),
    (238, 14, 13),
    (15, 15, 239),
    (16, 16, 16),
];

/// Tolerance for RGB color matching (accounts for YUV->RGB conversion errors).
const COLOR_TOLERANCE: u32 = 15;

/// Minimum luminance rise, left to right, for a gradient.
const MIN_GRADIENT_RISE: f32 = 50.0;

fn mismatch(msg: String) -> HalError {
    HalError::Device(msg)
}

/// Check that `data` holds a full frame of `format`.
pub fn validate_frame_size(data: &[u8], format: &Format) -> Result<()> {
    if data.len() < format.frame_len() {
        return Err(mismatch(format!(
            "frame holds {} bytes, expected {}",
            data.len(),
            format.frame_len()
        )));
    }
    Ok(())
}

/// Check that a YUYV frame contains the SMPTE color bar pattern.
///
/// The center row of each of the 8 vertical bars is sampled.
pub fn validate_color_bars(data: &[u8], format: &Format) -> Result<()> {
    validate_frame_size(data, format)?;

    let bar_width = format.width / 8;
    let center_y = format.height / 2;

    for (bar_idx, expected_rgb) in (0u32..).zip(SMPTE_COLOR_BARS.iter()) {
        let sample_x = (bar_idx * bar_width) + (bar_width / 2);

        let actual_rgb = yuyv_pixel_at(data, sample_x, center_y, format.width)
            .ok_or_else(|| mismatch(format!("no pixel at ({sample_x}, {center_y})")))?;

        if !colors_match(actual_rgb, *expected_rgb, COLOR_TOLERANCE) {
            return Err(mismatch(format!(
                "color bar {bar_idx} mismatch at ({sample_x}, {center_y}): \
                 expected RGB{expected_rgb:?}, got RGB{actual_rgb:?}"
            )));
        }
    }

    Ok(())
}

/// Check that a YUYV frame contains a left-to-right luminance ramp.
pub fn validate_gradient(data: &[u8], format: &Format) -> Result<()> {
    validate_frame_size(data, format)?;

    let center_y = format.height / 2;
    let mut first: Option<f32> = None;
    let mut prev: Option<f32> = None;

    for x in (0..format.width).step_by(10) {
        let (r, g, b) = yuyv_pixel_at(data, x, center_y, format.width)
            .ok_or_else(|| mismatch(format!("no pixel at ({x}, {center_y})")))?;

        // Rec. 601 luma
        let luminance = 0.114f32.mul_add(
            f32::from(b),
            0.587f32.mul_add(f32::from(g), 0.299 * f32::from(r)),
        );

        if let Some(p) = prev {
            if luminance < p - 1.0 {
                return Err(mismatch(format!(
                    "gradient falls at x={x}: {luminance} < {p}"
                )));
            }
        }
        first.get_or_insert(luminance);
        prev = Some(luminance);
    }

    let rise = prev.zip(first).map_or(0.0, |(last, first)| last - first);
    if rise < MIN_GRADIENT_RISE {
        return Err(mismatch(format!(
            "gradient rises by {rise}, expected at least {MIN_GRADIENT_RISE}"
        )));
    }

    Ok(())
}

fn colors_match(actual: (u8, u8, u8), expected: (u8, u8, u8), tolerance: u32) -> bool {
    let (ar, ag, ab) = actual;
    let (er, eg, eb) = expected;

    u32::from(ar.abs_diff(er)) <= tolerance
        && u32::from(ag.abs_diff(eg)) <= tolerance
        && u32::from(ab.abs_diff(eb)) <= tolerance
}
