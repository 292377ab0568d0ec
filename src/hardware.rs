//! Camera HAL lifecycle controller.
//!
//! [`CameraHardware`] owns one capture device, the parameter store, the
//! message mask and the host callbacks. Preview runs on a dedicated thread
//! that grabs frames into a single shared heap and hands the host a
//! [`Memory`] view of it. Still capture runs synchronously on the caller's
//! thread.
//!
//! Lock order is state, then device, then heap. The preview thread never
//! holds the state lock while it holds the device.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::callbacks::{CameraCallbacks, MsgType};
use crate::config::HalConfig;
use crate::fps::FpsMeter;
use crate::memory::{Memory, MemoryHeap};
use crate::params::{CameraParameters, PICTURE_FORMAT, PREVIEW_FORMAT};
use crate::traits::{CaptureDevice, Format, HalError, Result};

/// Back-off after a failed preview grab.
const GRAB_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Preview lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    /// No preview session.
    Idle,
    /// Device is being opened.
    Starting,
    /// Preview thread is pumping frames.
    Running,
    /// Device teardown and thread join in progress.
    Stopping,
    /// Still capture owns the device.
    Capturing,
}

struct PreviewWorker {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct State {
    parameters: CameraParameters,
    msg_enabled: MsgType,
    callbacks: Option<Arc<dyn CameraCallbacks>>,
    preview_state: PreviewState,
    preview_heap: Option<Arc<MemoryHeap>>,
    worker: Option<PreviewWorker>,
}

struct Shared {
    config: HalConfig,
    state: Mutex<State>,
    device: Mutex<Box<dyn CaptureDevice>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn device(&self) -> MutexGuard<'_, Box<dyn CaptureDevice>> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Callbacks to invoke for `msg`, if the host enabled it.
    fn callbacks_for(&self, msg: MsgType) -> Option<Arc<dyn CameraCallbacks>> {
        let state = self.state();
        if state.msg_enabled.contains(msg) {
            state.callbacks.clone()
        } else {
            None
        }
    }
}

/// Camera HAL instance wrapping one capture device.
pub struct CameraHardware {
    shared: Arc<Shared>,
}

impl CameraHardware {
    /// Create an instance over `device` and load the default parameters.
    pub fn new(device: Box<dyn CaptureDevice>, config: HalConfig) -> Self {
        let hardware = Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    parameters: CameraParameters::new(),
                    msg_enabled: MsgType::NONE,
                    callbacks: None,
                    preview_state: PreviewState::Idle,
                    preview_heap: None,
                    worker: None,
                }),
                device: Mutex::new(device),
            }),
        };
        hardware.init_default_parameters();
        hardware
    }

    /// Create an instance over a concrete device.
    pub fn with_device<D: CaptureDevice + 'static>(device: D, config: HalConfig) -> Self {
        Self::new(Box::new(device), config)
    }

    /// Configuration this instance was built with.
    #[must_use]
    pub fn config(&self) -> &HalConfig {
        &self.shared.config
    }

    fn init_default_parameters(&self) {
        if let Err(err) = self.set_parameters(&CameraParameters::defaults()) {
            error!(%err, "Failed to set default parameters");
        }
    }

    /// Store `params` if both formats are supported.
    ///
    /// The stored preview size is always reset to the configured preview size.
    pub fn set_parameters(&self, params: &CameraParameters) -> Result<()> {
        if params.preview_format() != Some(PREVIEW_FORMAT) {
            error!(
                requested = params.preview_format().unwrap_or_default(),
                "Only {PREVIEW_FORMAT} preview is supported"
            );
            return Err(HalError::InvalidArgument(format!(
                "preview format must be {PREVIEW_FORMAT}"
            )));
        }
        if params.picture_format() != Some(PICTURE_FORMAT) {
            error!(
                requested = params.picture_format().unwrap_or_default(),
                "Only {PICTURE_FORMAT} still pictures are supported"
            );
            return Err(HalError::InvalidArgument(format!(
                "picture format must be {PICTURE_FORMAT}"
            )));
        }

        debug!(
            preview_size = ?params.preview_size(),
            frame_rate = ?params.preview_frame_rate(),
            picture_size = ?params.picture_size(),
            "Accepted parameters"
        );

        let mut stored = params.clone();
        let config = &self.shared.config;
        stored.set_preview_size(config.preview_width, config.preview_height);
        self.shared.state().parameters = stored;
        Ok(())
    }

    /// Snapshot of the current parameters.
    #[must_use]
    pub fn get_parameters(&self) -> CameraParameters {
        self.shared.state().parameters.clone()
    }

    /// Install the host's callbacks.
    pub fn set_callbacks(&self, callbacks: Arc<dyn CameraCallbacks>) {
        self.shared.state().callbacks = Some(callbacks);
    }

    /// Start delivering the message kinds in `msg`.
    pub fn enable_msg_type(&self, msg: MsgType) {
        self.shared.state().msg_enabled |= msg;
    }

    /// Stop delivering the message kinds in `msg`.
    pub fn disable_msg_type(&self, msg: MsgType) {
        let mut state = self.shared.state();
        state.msg_enabled = state.msg_enabled & !msg;
    }

    /// Whether every kind in `msg` is enabled.
    #[must_use]
    pub fn msg_type_enabled(&self, msg: MsgType) -> bool {
        self.shared.state().msg_enabled.contains(msg)
    }

    /// Current preview lifecycle state.
    #[must_use]
    pub fn preview_state(&self) -> PreviewState {
        self.shared.state().preview_state
    }

    /// Open the device and start the preview thread.
    pub fn start_preview(&self) -> Result<()> {
        let format = self.shared.config.preview_format();
        let frame_size = format.frame_len();

        {
            let mut state = self.shared.state();
            if state.worker.is_some() || state.preview_state != PreviewState::Idle {
                debug!(state = ?state.preview_state, "start_preview: camera busy");
                return Err(HalError::InvalidOperation(match state.preview_state {
                    PreviewState::Capturing => "still capture in progress".to_owned(),
                    _ => "preview is already running".to_owned(),
                }));
            }
            state.preview_state = PreviewState::Starting;
        }

        if let Err(err) = self.open_streaming(&format) {
            error!(%err, "start_preview failed: cannot open device");
            self.shared.state().preview_state = PreviewState::Idle;
            return Err(err);
        }

        let heap = MemoryHeap::new(frame_size, "preview");
        let frame = Memory::from_heap(&heap);
        let cancel = Arc::new(AtomicBool::new(false));

        let spawned = {
            let shared = Arc::clone(&self.shared);
            let cancel = Arc::clone(&cancel);
            thread::Builder::new()
                .name("camera-preview".to_owned())
                .spawn(move || preview_loop(&shared, &cancel, &frame))
        };

        match spawned {
            Ok(handle) => {
                let mut state = self.shared.state();
                state.preview_heap = Some(heap);
                state.worker = Some(PreviewWorker { cancel, handle });
                state.preview_state = PreviewState::Running;
                info!(
                    width = format.width,
                    height = format.height,
                    frame_size,
                    "Preview started"
                );
                Ok(())
            }
            Err(err) => {
                error!(%err, "Failed to spawn preview thread");
                teardown(&mut **self.shared.device());
                self.shared.state().preview_state = PreviewState::Idle;
                Err(HalError::Io(err))
            }
        }
    }

    /// Stop the preview thread and close the device.
    ///
    /// Blocks until the preview thread has exited. A no-op when preview is
    /// not running.
    pub fn stop_preview(&self) {
        {
            let mut state = self.shared.state();
            if state.preview_state == PreviewState::Stopping {
                return;
            }
            let Some(worker) = state.worker.as_ref() else {
                return;
            };
            worker.cancel.store(true, Ordering::Release);
            state.preview_state = PreviewState::Stopping;
        }

        // Taking the device lock waits out a grab in flight; the preview
        // thread sees the cancel flag before its next grab.
        teardown(&mut **self.shared.device());

        let worker = self.shared.state().worker.take();
        if let Some(worker) = worker {
            if worker.handle.thread().id() == thread::current().id() {
                warn!("stop_preview called from the preview thread, not joining");
            } else if worker.handle.join().is_err() {
                error!("Preview thread panicked");
            }
        }

        let mut state = self.shared.state();
        state.worker = None;
        state.preview_state = PreviewState::Idle;
        info!("Preview stopped");
    }

    /// Whether a preview thread is running.
    #[must_use]
    pub fn preview_enabled(&self) -> bool {
        self.shared.state().worker.is_some()
    }

    /// Recording is not supported.
    pub fn start_recording(&self) -> Result<()> {
        Err(HalError::Unsupported("recording is not supported".to_owned()))
    }

    /// No-op: recording is not supported.
    pub fn stop_recording(&self) {}

    /// Always `false`.
    #[must_use]
    pub fn recording_enabled(&self) -> bool {
        false
    }

    /// No-op: recording is not supported.
    pub fn release_recording_frame(&self, _frame: &Memory) {}

    /// Report a successful focus from a background thread.
    ///
    /// There is no focus hardware; the `FOCUS` notification is sent as soon
    /// as the thread runs.
    pub fn auto_focus(&self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("camera-autofocus".to_owned())
            .spawn(move || {
                if let Some(callbacks) = shared.callbacks_for(MsgType::FOCUS) {
                    callbacks.notify(MsgType::FOCUS, 1, 0);
                }
            })
            .map(drop)
            .map_err(|err| {
                error!(%err, "Failed to spawn autofocus thread");
                HalError::Unsupported(format!("autofocus thread: {err}"))
            })
    }

    /// Always succeeds.
    pub fn cancel_auto_focus(&self) -> Result<()> {
        Ok(())
    }

    /// Stop preview and capture one JPEG still on the calling thread.
    ///
    /// Fails with `InvalidOperation` if a concurrent preview start or still
    /// capture holds the camera. The `SHUTTER` notification precedes any
    /// device I/O. The JPEG is delivered as `COMPRESSED_IMAGE` data after the
    /// device is closed.
    pub fn take_picture(&self) -> Result<()> {
        self.stop_preview();

        {
            let mut state = self.shared.state();
            if state.worker.is_some() || state.preview_state != PreviewState::Idle {
                debug!(state = ?state.preview_state, "take_picture: camera busy");
                return Err(HalError::InvalidOperation("camera is busy".to_owned()));
            }
            state.preview_state = PreviewState::Capturing;
        }

        let captured = self.capture_still();
        self.shared.state().preview_state = PreviewState::Idle;

        if let Some((callbacks, jpeg)) = captured? {
            callbacks.data(MsgType::COMPRESSED_IMAGE, &Memory::from_bytes(&jpeg, "jpeg"));
        }
        Ok(())
    }

    /// Send the shutter notification and grab one JPEG, if the host wants it.
    fn capture_still(&self) -> Result<Option<(Arc<dyn CameraCallbacks>, Vec<u8>)>> {
        if let Some(callbacks) = self.shared.callbacks_for(MsgType::SHUTTER) {
            callbacks.notify(MsgType::SHUTTER, 0, 0);
        }

        let format = self.shared.config.picture_format();
        let quality = self.shared.state().parameters.jpeg_quality();
        let jpeg_callbacks = self.shared.callbacks_for(MsgType::COMPRESSED_IMAGE);
        let want_jpeg = jpeg_callbacks.is_some();

        let jpeg = {
            let mut device = self.shared.device();
            let grabbed = open_device(&mut **device, &self.shared.config.device_path, &format)
                .and_then(|()| {
                    if want_jpeg {
                        device.grab_jpeg_frame(quality).map(Some)
                    } else {
                        Ok(None)
                    }
                });
            teardown(&mut **device);
            grabbed
        }
        .map_err(|err| {
            error!(%err, "Still capture failed");
            err
        })?;

        if let Some(jpeg) = &jpeg {
            debug!(bytes = jpeg.len(), quality, "Captured JPEG");
        }
        Ok(jpeg_callbacks.zip(jpeg))
    }

    /// Always succeeds.
    pub fn cancel_picture(&self) -> Result<()> {
        Ok(())
    }

    /// Vendor commands are not supported.
    pub fn send_command(&self, cmd: i32, arg1: i32, arg2: i32) -> Result<()> {
        debug!(cmd, arg1, arg2, "Rejecting vendor command");
        Err(HalError::BadValue(format!("unknown command {cmd}")))
    }

    /// Writes nothing.
    pub fn dump<W: Write>(&self, _out: &mut W) -> Result<()> {
        Ok(())
    }

    /// Stop preview and close the device.
    pub fn release(&self) {
        self.stop_preview();
        self.shared.device().close();
    }

    /// Heap backing the most recent preview session.
    #[must_use]
    pub fn get_preview_heap(&self) -> Option<Arc<MemoryHeap>> {
        self.shared.state().preview_heap.clone()
    }

    /// Raw picture heap. Raw capture is not implemented, so there is none.
    #[must_use]
    pub fn get_raw_heap(&self) -> Option<Arc<MemoryHeap>> {
        None
    }

    fn open_streaming(&self, format: &Format) -> Result<()> {
        let mut device = self.shared.device();
        let opened = open_device(&mut **device, &self.shared.config.device_path, format);
        if opened.is_err() {
            teardown(&mut **device);
        }
        opened
    }
}

impl Drop for CameraHardware {
    fn drop(&mut self) {
        self.stop_preview();
    }
}

fn open_device(device: &mut dyn CaptureDevice, path: &Path, format: &Format) -> Result<()> {
    if !format.is_addressable() {
        return Err(HalError::InvalidArgument(format!(
            "frame size {}x{} is too large",
            format.width, format.height
        )));
    }
    device.open(path, format.width, format.height, format.fourcc)?;
    device.init()?;
    device.start_streaming()
}

fn teardown(device: &mut dyn CaptureDevice) {
    if let Err(err) = device.stop_streaming() {
        warn!(%err, "Failed to stop streaming");
    }
    if let Err(err) = device.uninit() {
        warn!(%err, "Failed to release capture buffers");
    }
    device.close();
}

fn preview_loop(shared: &Shared, cancel: &AtomicBool, frame: &Memory) {
    let mut fps = shared.config.show_fps.then(|| FpsMeter::new("Preview"));
    debug!("Preview thread running");

    loop {
        let grabbed = {
            let mut device = shared.device();
            if cancel.load(Ordering::Acquire) {
                break;
            }
            frame.with_bytes_mut(|buf| device.grab_preview_frame(buf))
        };

        match grabbed {
            Ok(_) => {
                if let Some(callbacks) = shared.callbacks_for(MsgType::PREVIEW_FRAME) {
                    callbacks.data(MsgType::PREVIEW_FRAME, frame);
                }
                if let Some(meter) = fps.as_mut() {
                    meter.tick();
                }
            }
            // The device lock is already released, so a pending stop can
            // proceed before the next grab.
            Err(HalError::Timeout(err)) => debug!(%err, "Preview grab timed out"),
            Err(err) => {
                warn!(%err, "Failed to grab preview frame");
                thread::sleep(GRAB_RETRY_DELAY);
            }
        }
    }

    debug!("Preview thread exiting");
}
