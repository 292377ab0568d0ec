//! V4L2 camera HAL: a camera hardware abstraction layer over a video capture
//! device.
//!
//! [`CameraHardware`] implements the host-facing lifecycle (parameters,
//! preview, still capture, autofocus) on top of any [`CaptureDevice`]; the
//! production device is [`V4L2Device`]. Frames reach the host through
//! [`CameraCallbacks`] as [`Memory`] views of shared heaps.

pub mod callbacks;
pub mod config;
pub mod convert;
pub mod device;
pub mod fps;
pub mod hardware;
pub mod memory;
pub mod params;
pub mod registry;
pub mod traits;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use callbacks::{CameraCallbacks, MsgType};
pub use config::HalConfig;
pub use device::V4L2Device;
pub use hardware::{CameraHardware, PreviewState};
pub use memory::{Memory, MemoryHeap};
pub use params::CameraParameters;
pub use registry::{open_camera_hardware, HalRegistry};
pub use traits::{CaptureDevice, FourCC, Format, HalError, Result};
