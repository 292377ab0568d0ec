//! Mock capture device for testing without hardware.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::convert;
use crate::traits::{CaptureDevice, FourCC, Format, HalError, Result};

/// A call made on a [`MockDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    /// `open` with the requested size.
    Open(u32, u32),
    /// `init`.
    Init,
    /// `start_streaming`.
    StartStreaming,
    /// `stop_streaming`.
    StopStreaming,
    /// `uninit`.
    Uninit,
    /// `close`.
    Close,
    /// `grab_preview_frame`.
    GrabPreview,
    /// `grab_jpeg_frame`.
    GrabJpeg,
}

/// Shared record of the calls made on a mock device.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<DeviceCall>>>);

impl CallLog {
    fn push(&self, call: DeviceCall) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Copy of the calls so far.
    pub fn snapshot(&self) -> Vec<DeviceCall> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of recorded calls equal to `call`.
    pub fn count(&self, call: &DeviceCall) -> usize {
        self.snapshot().iter().filter(|c| *c == call).count()
    }
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Horizontal gradient from dark to light.
    Gradient,
    /// Solid color with the given Y, U, V values.
    Solid(u8, u8, u8),
}

/// How grabs fail, if they do.
#[derive(Debug, Clone, Copy)]
enum GrabFault {
    /// Every grab fails at once.
    Error,
    /// Every grab waits, then times out.
    Stall(Duration),
}

/// Mock device producing synthetic YUYV frames.
pub struct MockDevice {
    log: CallLog,
    format: Option<Format>,
    initialized: bool,
    streaming: bool,
    pattern: TestPattern,
    frame_interval: Duration,
    open_delay: Duration,
    fail_open: bool,
    grab_fault: Option<GrabFault>,
    frame_count: u32,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a mock device producing color bars every 2 ms.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            format: None,
            initialized: false,
            streaming: false,
            pattern: TestPattern::ColorBars,
            frame_interval: Duration::from_millis(2),
            open_delay: Duration::ZERO,
            fail_open: false,
            grab_fault: None,
            frame_count: 0,
        }
    }

    /// Set the test pattern for frame generation.
    #[must_use]
    pub const fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Make every `open` fail.
    #[must_use]
    pub const fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Make every grab fail with a device error.
    #[must_use]
    pub const fn failing_grab(mut self) -> Self {
        self.grab_fault = Some(GrabFault::Error);
        self
    }

    /// Make every grab block for `timeout` and then time out, like a driver
    /// that stopped delivering frames.
    #[must_use]
    pub const fn stalled(mut self, timeout: Duration) -> Self {
        self.grab_fault = Some(GrabFault::Stall(timeout));
        self
    }

    /// Sleep for `delay` inside every `open`.
    #[must_use]
    pub const fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Handle to the call log, usable after the device is moved.
    #[must_use]
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }

    /// Frames produced so far.
    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn next_frame(&mut self) -> Result<(Format, Vec<u8>)> {
        let format = match (&self.format, self.streaming) {
            (Some(format), true) => format.clone(),
            _ => return Err(HalError::Device("mock device is not streaming".to_owned())),
        };

        match self.grab_fault {
            Some(GrabFault::Error) => {
                return Err(HalError::Device("mock grab failure".to_owned()));
            }
            Some(GrabFault::Stall(timeout)) => {
                std::thread::sleep(timeout);
                return Err(HalError::Timeout("mock device stalled".to_owned()));
            }
            None => {}
        }

        std::thread::sleep(self.frame_interval);
        self.frame_count += 1;
        let data = generate_test_frame(&format, self.pattern);
        Ok((format, data))
    }
}

impl CaptureDevice for MockDevice {
    fn open(&mut self, _path: &Path, width: u32, height: u32, fourcc: FourCC) -> Result<Format> {
        self.log.push(DeviceCall::Open(width, height));
        std::thread::sleep(self.open_delay);
        if self.fail_open {
            return Err(HalError::Device("mock open failure".to_owned()));
        }
        let format = Format::new(width, height, fourcc);
        self.format = Some(format.clone());
        Ok(format)
    }

    fn init(&mut self) -> Result<()> {
        self.log.push(DeviceCall::Init);
        if self.format.is_none() {
            return Err(HalError::Device("mock device is not open".to_owned()));
        }
        self.initialized = true;
        Ok(())
    }

    fn start_streaming(&mut self) -> Result<()> {
        self.log.push(DeviceCall::StartStreaming);
        if !self.initialized {
            return Err(HalError::Device("mock device is not initialized".to_owned()));
        }
        self.streaming = true;
        Ok(())
    }

    fn stop_streaming(&mut self) -> Result<()> {
        self.log.push(DeviceCall::StopStreaming);
        self.streaming = false;
        Ok(())
    }

    fn uninit(&mut self) -> Result<()> {
        self.log.push(DeviceCall::Uninit);
        self.streaming = false;
        self.initialized = false;
        Ok(())
    }

    fn close(&mut self) {
        self.log.push(DeviceCall::Close);
        self.streaming = false;
        self.initialized = false;
        self.format = None;
    }

    fn is_open(&self) -> bool {
        self.format.is_some()
    }

    fn grab_preview_frame(&mut self, dest: &mut [u8]) -> Result<usize> {
        self.log.push(DeviceCall::GrabPreview);
        let (_, data) = self.next_frame()?;
        let len = data.len().min(dest.len());
        if let (Some(dst), Some(src)) = (dest.get_mut(..len), data.get(..len)) {
            dst.copy_from_slice(src);
        }
        Ok(len)
    }

    fn grab_jpeg_frame(&mut self, quality: u8) -> Result<Vec<u8>> {
        self.log.push(DeviceCall::GrabJpeg);
        let (format, data) = self.next_frame()?;
        convert::encode_jpeg(&data, format.width, format.height, quality)
    }
}

/// Generate test frame data based on pattern.
pub fn generate_test_frame(format: &Format, pattern: TestPattern) -> Vec<u8> {
    let mut data = vec![0u8; format.frame_len()];

    match pattern {
        TestPattern::ColorBars => generate_color_bars(&mut data, format.width, format.height),
        TestPattern::Gradient => generate_gradient(&mut data, format.width, format.height),
        TestPattern::Solid(y, u, v) => generate_solid(&mut data, y, u, v),
    }

    data
}

fn pixel_offset(x: u32, y: u32, width: u32) -> usize {
    (y as usize * width as usize + x as usize) * 2
}

fn write_pair(data: &mut [u8], offset: usize, y: u8, u: u8, v: u8) {
    if let Some(px) = data.get_mut(offset..offset.saturating_add(4)) {
        px.copy_from_slice(&[y, u, y, v]);
    }
}

/// Generate YUYV color bars pattern.
fn generate_color_bars(data: &mut [u8], width: u32, height: u32) {
    // White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    let bars: [(u8, u8, u8); 8] = [
        (235, 128, 128),
        (210, 16, 146),
        (170, 166, 16),
        (145, 54, 34),
        (106, 202, 222),
        (81, 90, 240),
        (41, 240, 110),
        (16, 128, 128),
    ];

    let bar_width = (width / 8).max(1);

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let bar_idx = (x / bar_width).min(7) as usize;
            let (y_val, u_val, v_val) = bars.get(bar_idx).copied().unwrap_or((16, 128, 128));
            write_pair(data, pixel_offset(x, y, width), y_val, u_val, v_val);
        }
    }
}

/// Generate YUYV horizontal gradient pattern.
fn generate_gradient(data: &mut [u8], width: u32, height: u32) {
    for y in 0..height {
        for x in (0..width).step_by(2) {
            #[allow(clippy::cast_possible_truncation)]
            let y_val = ((u64::from(x) * 255) / u64::from(width)) as u8;
            write_pair(data, pixel_offset(x, y, width), y_val, 128, 128);
        }
    }
}

/// Generate solid color YUYV frame.
fn generate_solid(data: &mut [u8], y: u8, u: u8, v: u8) {
    for offset in (0..data.len()).step_by(4) {
        write_pair(data, offset, y, u, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming_device(width: u32, height: u32) -> MockDevice {
        let mut device = MockDevice::new();
        device
            .open(Path::new("/dev/null"), width, height, FourCC::YUYV)
            .expect("open should succeed");
        device.init().expect("init should succeed");
        device.start_streaming().expect("start should succeed");
        device
    }

    #[test]
    fn test_mock_lifecycle_log() {
        let mut device = streaming_device(64, 48);
        let log = device.call_log();
        device.stop_streaming().expect("stop should succeed");
        device.uninit().expect("uninit should succeed");
        device.close();

        assert_eq!(
            log.snapshot(),
            vec![
                DeviceCall::Open(64, 48),
                DeviceCall::Init,
                DeviceCall::StartStreaming,
                DeviceCall::StopStreaming,
                DeviceCall::Uninit,
                DeviceCall::Close,
            ]
        );
        assert!(!device.is_open());
    }

    #[test]
    fn test_grab_requires_streaming() {
        let mut device = MockDevice::new();
        let mut buf = vec![0u8; 16];
        assert!(device.grab_preview_frame(&mut buf).is_err());
        assert!(device.init().is_err());
    }

    #[test]
    fn test_grab_preview_fills_buffer() {
        let mut device = streaming_device(64, 48);
        let mut buf = vec![0u8; 64 * 48 * 2];
        let len = device.grab_preview_frame(&mut buf).expect("grab should succeed");
        assert_eq!(len, buf.len());
        assert_eq!(buf.first(), Some(&235));
        assert_eq!(device.frame_count(), 1);
    }

    #[test]
    fn test_grab_jpeg() {
        let mut device = streaming_device(32, 24);
        let jpeg = device.grab_jpeg_frame(80).expect("grab should succeed");
        assert_eq!(jpeg.get(..2), Some(&[0xFF, 0xD8][..]));
    }

    #[test]
    fn test_failing_open() {
        let mut device = MockDevice::new().failing_open();
        assert!(device
            .open(Path::new("/dev/null"), 32, 24, FourCC::YUYV)
            .is_err());
        assert!(!device.is_open());
    }

    #[test]
    fn test_failing_grab() {
        let mut device = MockDevice::new().failing_grab();
        device
            .open(Path::new("/dev/null"), 32, 24, FourCC::YUYV)
            .expect("open should succeed");
        device.init().expect("init should succeed");
        device.start_streaming().expect("start should succeed");

        let mut buf = vec![0u8; 32 * 24 * 2];
        assert!(matches!(
            device.grab_preview_frame(&mut buf),
            Err(HalError::Device(_))
        ));
        assert_eq!(device.frame_count(), 0);
    }

    #[test]
    fn test_stalled_grab_times_out() {
        let mut device = MockDevice::new().stalled(Duration::from_millis(20));
        device
            .open(Path::new("/dev/null"), 32, 24, FourCC::YUYV)
            .expect("open should succeed");
        device.init().expect("init should succeed");
        device.start_streaming().expect("start should succeed");

        let mut buf = vec![0u8; 32 * 24 * 2];
        assert!(matches!(
            device.grab_preview_frame(&mut buf),
            Err(HalError::Timeout(_))
        ));
    }

    #[test]
    fn test_solid_pattern() {
        let format = Format::new(64, 64, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::Solid(128, 64, 192));
        assert_eq!(data.get(..4), Some(&[128, 64, 128, 192][..]));
    }
}
