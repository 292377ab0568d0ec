//! Message types and the host callback interface.

use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::time::Duration;

use crate::memory::Memory;

/// Bitmask of asynchronous message kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MsgType(pub u32);

impl MsgType {
    /// No messages.
    pub const NONE: Self = Self(0);
    /// Error notification.
    pub const ERROR: Self = Self(0x001);
    /// Shutter fired, notify only.
    pub const SHUTTER: Self = Self(0x002);
    /// Autofocus finished, notify only.
    pub const FOCUS: Self = Self(0x004);
    /// Zoom progress, notify only.
    pub const ZOOM: Self = Self(0x008);
    /// Preview frame data.
    pub const PREVIEW_FRAME: Self = Self(0x010);
    /// Video frame data with timestamp.
    pub const VIDEO_FRAME: Self = Self(0x020);
    /// Postview frame data.
    pub const POSTVIEW_FRAME: Self = Self(0x040);
    /// Uncompressed still image data.
    pub const RAW_IMAGE: Self = Self(0x080);
    /// JPEG still image data.
    pub const COMPRESSED_IMAGE: Self = Self(0x100);
    /// Every message kind.
    pub const ALL_MSGS: Self = Self(0x1FF);

    /// Whether every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MsgType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MsgType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for MsgType {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for MsgType {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

/// Receiver for HAL events, supplied by the host.
///
/// Callbacks run on HAL threads: the preview thread for frames, a short-lived
/// thread for focus, and the caller's thread during `take_picture`. They are
/// invoked without the HAL's state lock held, so they may call back into the
/// HAL, except `stop_preview` from inside a preview frame callback, which
/// skips the join and leaves the thread to exit on its own.
pub trait CameraCallbacks: Send + Sync {
    /// Notification without payload.
    fn notify(&self, msg: MsgType, ext1: i32, ext2: i32) {
        let _ = (msg, ext1, ext2);
    }

    /// Data delivery. `data` stays valid until the next frame is grabbed
    /// into the same heap.
    fn data(&self, msg: MsgType, data: &Memory) {
        let _ = (msg, data);
    }

    /// Data delivery with a capture timestamp.
    fn data_timestamp(&self, msg: MsgType, timestamp: Duration, data: &Memory) {
        let _ = (msg, timestamp, data);
    }
}
