//! HAL configuration.

use std::path::PathBuf;

use tracing::warn;

use crate::params::{PICTURE_HEIGHT, PICTURE_WIDTH, PREVIEW_HEIGHT, PREVIEW_WIDTH};
use crate::traits::{FourCC, Format};

/// Environment variable overriding the device node.
pub const ENV_DEVICE: &str = "CAMERA_HAL_DEVICE";
/// Environment variable enabling frame-rate logging (`1`/`true`).
pub const ENV_SHOW_FPS: &str = "CAMERA_HAL_SHOW_FPS";

/// Static configuration of a camera HAL instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalConfig {
    /// Video device node.
    pub device_path: PathBuf,
    /// Preview frame width.
    pub preview_width: u32,
    /// Preview frame height.
    pub preview_height: u32,
    /// Still picture width.
    pub picture_width: u32,
    /// Still picture height.
    pub picture_height: u32,
    /// Pixel format requested from the driver.
    pub pixel_format: FourCC,
    /// Number of mmap capture buffers.
    pub buffer_count: u32,
    /// Log the preview frame rate.
    pub show_fps: bool,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/video0"),
            preview_width: PREVIEW_WIDTH,
            preview_height: PREVIEW_HEIGHT,
            picture_width: PICTURE_WIDTH,
            picture_height: PICTURE_HEIGHT,
            pixel_format: FourCC::YUYV,
            buffer_count: 4,
            show_fps: false,
        }
    }
}

impl HalConfig {
    /// Defaults overridden by `CAMERA_HAL_DEVICE` and `CAMERA_HAL_SHOW_FPS`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(ENV_DEVICE) {
            if !path.is_empty() {
                config.device_path = PathBuf::from(path);
            }
        }
        if let Ok(value) = std::env::var(ENV_SHOW_FPS) {
            match parse_flag(&value) {
                Some(flag) => config.show_fps = flag,
                None => warn!(variable = ENV_SHOW_FPS, value, "Ignoring unrecognized flag"),
            }
        }
        config
    }

    /// Preview capture format.
    #[must_use]
    pub const fn preview_format(&self) -> Format {
        Format::new(self.preview_width, self.preview_height, self.pixel_format)
    }

    /// Still capture format.
    #[must_use]
    pub const fn picture_format(&self) -> Format {
        Format::new(self.picture_width, self.picture_height, self.pixel_format)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
