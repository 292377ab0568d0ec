//! V4L2 device implementation using the v4l crate.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::{CaptureStream as V4lCaptureStream, Stream as V4lStream};
use v4l::video::Capture;
use v4l::Device;

use crate::convert;
use crate::traits::{CaptureDevice, FourCC, Format, HalError, Result};

/// Longest a grab waits for the driver to fill a buffer.
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(1);

/// Device capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming.
    pub can_stream: bool,
}

/// V4L2 capture device wrapping the v4l crate with mmap streaming.
pub struct V4L2Device {
    buffer_count: u32,
    device: Option<Device>,
    capabilities: DeviceCapabilities,
    format: Option<Format>,
    // The mmap arena holds its own handle to the device fd, so the stream
    // does not borrow `device`.
    stream: Option<Stream<'static>>,
    streaming: bool,
}

impl Default for V4L2Device {
    fn default() -> Self {
        Self::new(4)
    }
}

impl V4L2Device {
    /// Create a closed device that will stream with `buffer_count` buffers.
    #[must_use]
    pub fn new(buffer_count: u32) -> Self {
        Self {
            buffer_count: buffer_count.max(1),
            device: None,
            capabilities: DeviceCapabilities::default(),
            format: None,
            stream: None,
            streaming: false,
        }
    }

    /// Capabilities reported by the driver at the last `open`.
    #[must_use]
    pub const fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Format negotiated at the last `open`.
    #[must_use]
    pub const fn format(&self) -> Option<&Format> {
        self.format.as_ref()
    }

    fn stream(&mut self) -> Result<&mut Stream<'static>> {
        self.stream
            .as_mut()
            .ok_or_else(|| HalError::Device("device is not initialized".to_owned()))
    }

    /// Dequeue the next filled buffer.
    ///
    /// The first call after `start_streaming` queues every mapped buffer and
    /// issues STREAMON; later calls requeue the previous buffer first.
    fn next_buffer(&mut self) -> Result<(&[u8], usize)> {
        if !self.streaming {
            return Err(HalError::Device("device is not streaming".to_owned()));
        }
        let (buf, meta) = self.stream()?.next().map_err(|err| HalError::stream(&err))?;
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            used => used.min(buf.len()),
        };
        Ok((buf, used))
    }
}

impl CaptureDevice for V4L2Device {
    fn open(&mut self, path: &Path, width: u32, height: u32, fourcc: FourCC) -> Result<Format> {
        if self.device.is_some() {
            self.close();
        }

        let device = Device::with_path(path).map_err(|err| {
            HalError::Device(format!("failed to open {}: {err}", path.display()))
        })?;

        let caps = device.query_caps().map_err(HalError::device)?;
        let capabilities = DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(v4l::capability::Flags::STREAMING),
        };

        if !capabilities.can_capture || !capabilities.can_stream {
            return Err(HalError::Device(format!(
                "{} cannot stream video capture",
                path.display()
            )));
        }

        let mut fmt = device.format().map_err(HalError::device)?;
        fmt.width = width;
        fmt.height = height;
        fmt.fourcc = fourcc.into();
        let fmt = device.set_format(&fmt).map_err(HalError::device)?;

        let format = Format {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.fourcc),
            stride: fmt.stride,
            size: fmt.size,
        };

        info!(
            path = %path.display(),
            card = %capabilities.card,
            driver = %capabilities.driver,
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "Opened capture device"
        );

        self.device = Some(device);
        self.capabilities = capabilities;
        self.format = Some(format.clone());
        Ok(format)
    }

    fn init(&mut self) -> Result<()> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| HalError::Device("device is not open".to_owned()))?;

        let mut stream = Stream::with_buffers(device, Type::VideoCapture, self.buffer_count)
            .map_err(HalError::device)?;
        stream.set_timeout(STREAM_TIMEOUT);
        debug!(buffers = self.buffer_count, "Mapped capture buffers");

        self.stream = Some(stream);
        self.streaming = false;
        Ok(())
    }

    fn start_streaming(&mut self) -> Result<()> {
        // STREAMON is deferred to the first grab so every buffer is queued
        // before the driver starts.
        self.stream()?;
        self.streaming = true;
        Ok(())
    }

    fn stop_streaming(&mut self) -> Result<()> {
        self.streaming = false;
        match self.stream.as_mut() {
            Some(stream) => stream.stop().map_err(HalError::device),
            None => Ok(()),
        }
    }

    fn uninit(&mut self) -> Result<()> {
        // Dropping the stream unmaps the buffers.
        self.streaming = false;
        self.stream = None;
        Ok(())
    }

    fn close(&mut self) {
        self.streaming = false;
        self.stream = None;
        if self.device.take().is_some() {
            debug!(card = %self.capabilities.card, "Closed capture device");
        }
        self.format = None;
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn grab_preview_frame(&mut self, dest: &mut [u8]) -> Result<usize> {
        let (buf, used) = self.next_buffer()?;
        let len = used.min(dest.len());

        if let (Some(dst), Some(src)) = (dest.get_mut(..len), buf.get(..len)) {
            dst.copy_from_slice(src);
        }
        Ok(len)
    }

    fn grab_jpeg_frame(&mut self, quality: u8) -> Result<Vec<u8>> {
        let format = self
            .format
            .clone()
            .ok_or_else(|| HalError::Device("device is not open".to_owned()))?;
        let (buf, used) = self.next_buffer()?;
        let data = buf.get(..used).unwrap_or(buf);

        if format.fourcc == FourCC::MJPG {
            return Ok(data.to_vec());
        }
        convert::encode_jpeg(data, format.width, format.height, quality)
    }
}
