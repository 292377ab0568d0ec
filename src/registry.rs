//! Single-instance access to the camera HAL.
//!
//! A [`HalRegistry`] hands out at most one live [`CameraHardware`] at a time.
//! It keeps only a weak handle, so once every caller drops its reference the
//! next [`HalRegistry::create_instance`] builds a fresh instance.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use tracing::debug;

use crate::config::HalConfig;
use crate::device::V4L2Device;
use crate::hardware::CameraHardware;
use crate::traits::CaptureDevice;

/// Builds the capture device for a new instance.
pub type DeviceFactory = Box<dyn Fn(&HalConfig) -> Box<dyn CaptureDevice> + Send + Sync>;

/// Owner of the single camera HAL session.
pub struct HalRegistry {
    config: HalConfig,
    factory: DeviceFactory,
    instance: Mutex<Weak<CameraHardware>>,
}

impl HalRegistry {
    /// Create a registry building devices with `factory`.
    pub fn new<F>(config: HalConfig, factory: F) -> Self
    where
        F: Fn(&HalConfig) -> Box<dyn CaptureDevice> + Send + Sync + 'static,
    {
        Self {
            config,
            factory: Box::new(factory),
            instance: Mutex::new(Weak::new()),
        }
    }

    /// Registry for V4L2 devices.
    #[must_use]
    pub fn v4l2(config: HalConfig) -> Self {
        Self::new(config, |config| {
            Box::new(V4L2Device::new(config.buffer_count))
        })
    }

    fn slot(&self) -> MutexGuard<'_, Weak<CameraHardware>> {
        self.instance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the live instance, creating one if none exists.
    pub fn create_instance(&self) -> Arc<CameraHardware> {
        let mut slot = self.slot();
        if let Some(hardware) = slot.upgrade() {
            return hardware;
        }

        debug!(device = %self.config.device_path.display(), "Creating camera HAL instance");
        let device = (self.factory)(&self.config);
        let hardware = Arc::new(CameraHardware::new(device, self.config.clone()));
        *slot = Arc::downgrade(&hardware);
        hardware
    }

    /// Forget the current instance. Holders keep their references, but the
    /// next `create_instance` builds a new one. Returns whether an instance
    /// was live.
    pub fn release_instance(&self) -> bool {
        let previous = std::mem::take(&mut *self.slot());
        previous.strong_count() > 0
    }

    /// Whether a live instance is registered.
    #[must_use]
    pub fn has_instance(&self) -> bool {
        self.slot().strong_count() > 0
    }
}

/// Entry point for the host: the process-wide V4L2 camera HAL.
///
/// The registry is configured from the environment on first use.
pub fn open_camera_hardware() -> Arc<CameraHardware> {
    static REGISTRY: OnceLock<HalRegistry> = OnceLock::new();
    REGISTRY
        .get_or_init(|| HalRegistry::v4l2(HalConfig::from_env()))
        .create_instance()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry(created: Arc<AtomicUsize>) -> HalRegistry {
        HalRegistry::new(HalConfig::default(), move |_| {
            created.fetch_add(1, Ordering::SeqCst);
            Box::new(MockDevice::new())
        })
    }

    #[test]
    fn test_same_instance_while_held() {
        let created = Arc::new(AtomicUsize::new(0));
        let registry = registry(Arc::clone(&created));

        let first = registry.create_instance();
        let second = registry.create_instance();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(registry.has_instance());
    }

    #[test]
    fn test_recreated_after_drop() {
        let created = Arc::new(AtomicUsize::new(0));
        let registry = registry(Arc::clone(&created));

        drop(registry.create_instance());
        assert!(!registry.has_instance());

        let _again = registry.create_instance();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_release_instance() {
        let created = Arc::new(AtomicUsize::new(0));
        let registry = registry(Arc::clone(&created));

        let first = registry.create_instance();
        assert!(registry.release_instance());
        assert!(!registry.release_instance());

        let second = registry.create_instance();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }
}
