//! Core traits and types for the capture device abstraction.

use std::path::Path;

/// Pixel format representation (e.g., YUYV, MJPG).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// MJPEG pixel format (Motion JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Bytes in one packed YUYV frame, or `None` if the size overflows.
#[must_use]
pub const fn yuyv_frame_len(width: u32, height: u32) -> Option<u32> {
    match width.checked_mul(2) {
        Some(stride) => stride.checked_mul(height),
        None => None,
    }
}

/// Video capture format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Bytes per line (stride).
    pub stride: u32,
    /// Total frame size in bytes.
    pub size: u32,
}

impl Format {
    /// Create a YUYV-sized format. Sizes that overflow saturate at
    /// `u32::MAX`; [`Format::is_addressable`] reports them.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        let stride = width.saturating_mul(2); // YUYV is 2 bytes per pixel
        let size = match yuyv_frame_len(width, height) {
            Some(size) => size,
            None => u32::MAX,
        };
        Self {
            width,
            height,
            fourcc,
            stride,
            size,
        }
    }

    /// Frame size in bytes as a buffer length.
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        self.size as usize
    }

    /// Whether the frame size fits in `u32` without saturating.
    #[must_use]
    pub const fn is_addressable(&self) -> bool {
        yuyv_frame_len(self.width, self.height).is_some()
    }
}

/// Error type for HAL operations.
///
/// Every public entry point reports one of these kinds; [`HalError::status`]
/// yields the fixed integer code a host expects.
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    /// A parameter value was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation is not valid in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// The operation is not implemented by this HAL.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// A command or value was not recognized.
    #[error("bad value: {0}")]
    BadValue(String),
    /// The capture device failed.
    #[error("device error: {0}")]
    Device(String),
    /// The device produced no frame within the stream timeout.
    #[error("timed out: {0}")]
    Timeout(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HalError {
    /// Success status code.
    pub const OK: i32 = 0;
    /// `-EINVAL`.
    pub const BAD_VALUE: i32 = -22;
    /// `-ENOSYS`.
    pub const INVALID_OPERATION: i32 = -38;
    /// Generic failure.
    pub const UNKNOWN_ERROR: i32 = i32::MIN;

    /// Integer status code for this error.
    #[must_use]
    pub const fn status(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) | Self::BadValue(_) => Self::BAD_VALUE,
            Self::InvalidOperation(_) => Self::INVALID_OPERATION,
            Self::Unsupported(_) | Self::Device(_) | Self::Timeout(_) | Self::Io(_) => {
                Self::UNKNOWN_ERROR
            }
        }
    }

    pub(crate) fn device<E: std::fmt::Display>(err: E) -> Self {
        Self::Device(err.to_string())
    }

    /// Map a stream I/O error, keeping timeouts distinguishable.
    pub(crate) fn stream(err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            Self::Timeout(err.to_string())
        } else {
            Self::Device(err.to_string())
        }
    }
}

/// Result type for HAL operations.
pub type Result<T> = std::result::Result<T, HalError>;

/// Status code for a HAL result: `0` on success, the error's code otherwise.
#[must_use]
pub fn status_of<T>(result: &Result<T>) -> i32 {
    result.as_ref().map_or_else(HalError::status, |_| HalError::OK)
}

/// Abstraction over a video capture device.
///
/// The lifecycle is `open` → `init` → `start_streaming` → grabs →
/// `stop_streaming` → `uninit` → `close`. Implementations must tolerate
/// teardown calls in any state.
pub trait CaptureDevice: Send {
    /// Open the device node and negotiate the capture format.
    fn open(&mut self, path: &Path, width: u32, height: u32, fourcc: FourCC) -> Result<Format>;

    /// Allocate capture buffers.
    fn init(&mut self) -> Result<()>;

    /// Begin streaming into the capture buffers.
    fn start_streaming(&mut self) -> Result<()>;

    /// Stop streaming.
    fn stop_streaming(&mut self) -> Result<()>;

    /// Release capture buffers.
    fn uninit(&mut self) -> Result<()>;

    /// Close the device node.
    fn close(&mut self);

    /// Whether the device node is currently open.
    fn is_open(&self) -> bool;

    /// Capture one frame into `dest`. Returns the number of bytes written.
    fn grab_preview_frame(&mut self, dest: &mut [u8]) -> Result<usize>;

    /// Capture one frame and return it JPEG-encoded.
    fn grab_jpeg_frame(&mut self, quality: u8) -> Result<Vec<u8>>;
}
