//! YUYV pixel conversion and JPEG encoding for still capture.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::traits::{yuyv_frame_len, HalError, Result};

/// Get RGB values for a pixel of a YUYV buffer.
///
/// Returns `None` if the coordinates fall outside `data`. For odd x
/// coordinates the Y value of the second pixel in the pair is used with the
/// shared U/V values.
#[must_use]
pub fn yuyv_pixel_at(data: &[u8], x: u32, y: u32, width: u32) -> Option<(u8, u8, u8)> {
    // YUYV format: [Y0 U Y1 V] repeats
    let pair_x = x & !1;
    let offset = (y as usize)
        .checked_mul(width as usize)?
        .checked_add(pair_x as usize)?
        .checked_mul(2)?;

    if offset.checked_add(3)? >= data.len() {
        return None;
    }

    let y_val = if x % 2 == 0 {
        *data.get(offset)?
    } else {
        *data.get(offset + 2)?
    };
    let u = *data.get(offset + 1)?;
    let v = *data.get(offset + 3)?;

    Some(yuv_to_rgb(y_val, u, v))
}

/// Convert a whole YUYV frame to packed RGB8.
///
/// Trailing bytes that do not form a full pixel pair are ignored.
#[must_use]
pub fn yuyv_to_rgb(data: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len() / 2 * 3);
    for chunk in data.chunks_exact(4) {
        if let [y0, u, y1, v] = *chunk {
            let (r, g, b) = yuv_to_rgb(y0, u, v);
            rgb.extend_from_slice(&[r, g, b]);
            let (r, g, b) = yuv_to_rgb(y1, u, v);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    rgb
}

/// Encode a YUYV frame as JPEG.
///
/// `quality` is clamped to `1..=100`.
pub fn encode_jpeg(yuyv: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let Some(expected) = yuyv_frame_len(width, height) else {
        return Err(HalError::InvalidArgument(format!(
            "frame size {width}x{height} overflows"
        )));
    };
    let expected = expected as usize;
    if yuyv.len() < expected {
        return Err(HalError::Device(format!(
            "short frame: {} bytes, expected {expected}",
            yuyv.len()
        )));
    }

    let rgb = yuyv_to_rgb(yuyv.get(..expected).unwrap_or(yuyv));
    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        encoder
            .encode(&rgb, width, height, ExtendedColorType::Rgb8)
            .map_err(|err| HalError::Device(format!("JPEG encoding failed: {err}")))?;
    }

    Ok(buffer)
}

/// Convert YUV values to RGB using the ITU-R BT.601 formula.
///
/// RGB values are clamped to the 0-255 range.
#[must_use]
#[allow(clippy::many_single_char_names)]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y_f = f32::from(y);
    let u_f = f32::from(u) - 128.0;
    let v_f = f32::from(v) - 128.0;

    let r = 1.402f32.mul_add(v_f, y_f);
    let g = 0.714_14f32.mul_add(-v_f, 0.344_14f32.mul_add(-u_f, y_f));
    let b = 1.772f32.mul_add(u_f, y_f);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamp = |val: f32| -> u8 { val.clamp(0.0, 255.0) as u8 };

    (clamp(r), clamp(g), clamp(b))
}
