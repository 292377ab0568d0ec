//! Camera parameter store.
//!
//! Parameters are string key/value pairs, exchanged with the host in the
//! flattened `key=value;key=value` form. Typed accessors cover the keys this
//! HAL understands; unknown keys are carried through untouched.

use std::collections::BTreeMap;
use std::fmt;

use crate::traits::{HalError, Result};

/// Fixed preview width in pixels.
pub const PREVIEW_WIDTH: u32 = 352;
/// Fixed preview height in pixels.
pub const PREVIEW_HEIGHT: u32 = 288;
/// Fixed still picture width in pixels (2MP).
pub const PICTURE_WIDTH: u32 = 1600;
/// Fixed still picture height in pixels (2MP).
pub const PICTURE_HEIGHT: u32 = 1200;
/// Default preview frame rate.
pub const DEFAULT_FRAME_RATE: u32 = 15;
/// The only accepted preview format.
pub const PREVIEW_FORMAT: &str = "yuv422sp";
/// The only accepted picture format.
pub const PICTURE_FORMAT: &str = "jpeg";
/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 100;
/// Picture sizes advertised to the host.
pub const SUPPORTED_PICTURE_SIZES: &str = "1600x1200,1024x768,640x480,352x288";

/// Preview size key.
pub const KEY_PREVIEW_SIZE: &str = "preview-size";
/// Preview frame rate key.
pub const KEY_PREVIEW_FRAME_RATE: &str = "preview-frame-rate";
/// Preview format key.
pub const KEY_PREVIEW_FORMAT: &str = "preview-format";
/// Picture size key.
pub const KEY_PICTURE_SIZE: &str = "picture-size";
/// Picture format key.
pub const KEY_PICTURE_FORMAT: &str = "picture-format";
/// JPEG quality key.
pub const KEY_JPEG_QUALITY: &str = "jpeg-quality";
/// Supported picture sizes key.
pub const KEY_SUPPORTED_PICTURE_SIZES: &str = "picture-size-values";

/// Camera parameters as a key/value store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraParameters {
    map: BTreeMap<String, String>,
}

impl CameraParameters {
    /// Create an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters with the HAL's default values.
    #[must_use]
    pub fn defaults() -> Self {
        let mut p = Self::new();
        p.set_preview_size(PREVIEW_WIDTH, PREVIEW_HEIGHT);
        p.set_preview_frame_rate(DEFAULT_FRAME_RATE);
        p.set_preview_format(PREVIEW_FORMAT);
        p.set_picture_format(PICTURE_FORMAT);
        p.set_picture_size(PICTURE_WIDTH, PICTURE_HEIGHT);
        p.set(KEY_JPEG_QUALITY, &DEFAULT_JPEG_QUALITY.to_string());
        p.set(KEY_SUPPORTED_PICTURE_SIZES, SUPPORTED_PICTURE_SIZES);
        p
    }

    /// Parse a flattened `key=value;key=value` string.
    ///
    /// Empty segments are skipped; a segment without `=` is rejected.
    pub fn unflatten(flattened: &str) -> Result<Self> {
        let mut p = Self::new();
        for pair in flattened.split(';').filter(|s| !s.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                HalError::InvalidArgument(format!("malformed parameter `{pair}`"))
            })?;
            p.set(key, value);
        }
        Ok(p)
    }

    /// Serialize to the flattened `key=value;key=value` form.
    #[must_use]
    pub fn flatten(&self) -> String {
        self.to_string()
    }

    /// Set a raw value. Keys and values may not contain `=` or `;`; those
    /// characters are stripped.
    pub fn set(&mut self, key: &str, value: &str) {
        let clean = |s: &str| s.replace(['=', ';'], "");
        self.map.insert(clean(key), clean(value));
    }

    /// Get a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Remove a key.
    pub fn remove(&mut self, key: &str) {
        self.map.remove(key);
    }

    fn get_int(&self, key: &str) -> Option<u32> {
        self.get(key)?.trim().parse().ok()
    }

    fn get_size(&self, key: &str) -> Option<(u32, u32)> {
        parse_size(self.get(key)?)
    }

    /// Set the preview size.
    pub fn set_preview_size(&mut self, width: u32, height: u32) {
        self.set(KEY_PREVIEW_SIZE, &format!("{width}x{height}"));
    }

    /// Preview size, if set and well formed.
    #[must_use]
    pub fn preview_size(&self) -> Option<(u32, u32)> {
        self.get_size(KEY_PREVIEW_SIZE)
    }

    /// Set the preview frame rate.
    pub fn set_preview_frame_rate(&mut self, fps: u32) {
        self.set(KEY_PREVIEW_FRAME_RATE, &fps.to_string());
    }

    /// Preview frame rate, if set.
    #[must_use]
    pub fn preview_frame_rate(&self) -> Option<u32> {
        self.get_int(KEY_PREVIEW_FRAME_RATE)
    }

    /// Set the preview pixel format.
    pub fn set_preview_format(&mut self, format: &str) {
        self.set(KEY_PREVIEW_FORMAT, format);
    }

    /// Preview pixel format, if set.
    #[must_use]
    pub fn preview_format(&self) -> Option<&str> {
        self.get(KEY_PREVIEW_FORMAT)
    }

    /// Set the picture size.
    pub fn set_picture_size(&mut self, width: u32, height: u32) {
        self.set(KEY_PICTURE_SIZE, &format!("{width}x{height}"));
    }

    /// Picture size, if set and well formed.
    #[must_use]
    pub fn picture_size(&self) -> Option<(u32, u32)> {
        self.get_size(KEY_PICTURE_SIZE)
    }

    /// Set the picture format.
    pub fn set_picture_format(&mut self, format: &str) {
        self.set(KEY_PICTURE_FORMAT, format);
    }

    /// Picture format, if set.
    #[must_use]
    pub fn picture_format(&self) -> Option<&str> {
        self.get(KEY_PICTURE_FORMAT)
    }

    /// JPEG quality in `1..=100`, falling back to the default when unset or
    /// unparsable.
    #[must_use]
    pub fn jpeg_quality(&self) -> u8 {
        self.get_int(KEY_JPEG_QUALITY)
            .and_then(|q| u8::try_from(q.clamp(1, 100)).ok())
            .unwrap_or(DEFAULT_JPEG_QUALITY)
    }

    /// Picture sizes advertised to the host.
    #[must_use]
    pub fn supported_picture_sizes(&self) -> Vec<(u32, u32)> {
        self.get(KEY_SUPPORTED_PICTURE_SIZES)
            .map(|v| v.split(',').filter_map(parse_size).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for CameraParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.map.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.trim().split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = CameraParameters::defaults();
        assert_eq!(p.preview_size(), Some((352, 288)));
        assert_eq!(p.preview_frame_rate(), Some(15));
        assert_eq!(p.preview_format(), Some("yuv422sp"));
        assert_eq!(p.picture_size(), Some((1600, 1200)));
        assert_eq!(p.picture_format(), Some("jpeg"));
        assert_eq!(p.jpeg_quality(), 100);
        assert_eq!(p.supported_picture_sizes().len(), 4);
    }

    #[test]
    fn test_flatten_unflatten() {
        let p = CameraParameters::defaults();
        let flat = p.flatten();
        assert!(flat.contains("preview-size=352x288"));
        assert_eq!(CameraParameters::unflatten(&flat).expect("unflatten"), p);
    }

    #[test]
    fn test_unflatten_rejects_malformed() {
        assert!(CameraParameters::unflatten("preview-size=1x1;garbage").is_err());
        assert!(CameraParameters::unflatten("").expect("empty").get("x").is_none());
    }

    #[test]
    fn test_set_strips_separators() {
        let mut p = CameraParameters::new();
        p.set("k;ey", "va=lue");
        assert_eq!(p.get("key"), Some("value"));
    }

    #[test]
    fn test_jpeg_quality_clamped() {
        let mut p = CameraParameters::new();
        p.set(KEY_JPEG_QUALITY, "250");
        assert_eq!(p.jpeg_quality(), 100);
        p.set(KEY_JPEG_QUALITY, "0");
        assert_eq!(p.jpeg_quality(), 1);
        p.set(KEY_JPEG_QUALITY, "high");
        assert_eq!(p.jpeg_quality(), DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn test_malformed_size() {
        let mut p = CameraParameters::new();
        p.set(KEY_PREVIEW_SIZE, "352by288");
        assert_eq!(p.preview_size(), None);
    }
}
