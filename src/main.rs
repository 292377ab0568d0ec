//! camera-hal binary for exercising the HAL against a real device.

use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use v4l_camera_hal::{CameraCallbacks, HalConfig, HalError, HalRegistry, Memory, MsgType};

#[derive(Parser)]
#[command(name = "camera-hal", about = "Drive the V4L2 camera HAL")]
struct Cli {
    /// Video device node (defaults to $CAMERA_HAL_DEVICE or /dev/video0)
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Log the preview frame rate
    #[arg(long)]
    show_fps: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run preview and report delivered frames
    Preview {
        /// Number of frames to receive before stopping
        #[arg(short, long, default_value_t = 100)]
        frames: usize,
    },
    /// Take one JPEG picture
    Picture {
        /// Output file
        #[arg(short, long, default_value = "picture.jpg")]
        output: PathBuf,
    },
}

enum Event {
    Frame(usize),
    Shutter,
    Jpeg(Vec<u8>),
}

struct ChannelCallbacks {
    tx: Mutex<Sender<Event>>,
}

impl ChannelCallbacks {
    fn send(&self, event: Event) {
        let _ = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(event);
    }
}

impl CameraCallbacks for ChannelCallbacks {
    fn notify(&self, msg: MsgType, _ext1: i32, _ext2: i32) {
        if msg == MsgType::SHUTTER {
            self.send(Event::Shutter);
        }
    }

    fn data(&self, msg: MsgType, data: &Memory) {
        if msg == MsgType::PREVIEW_FRAME {
            self.send(Event::Frame(data.len()));
        } else if msg == MsgType::COMPRESSED_IMAGE {
            self.send(Event::Jpeg(data.to_vec()));
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> v4l_camera_hal::Result<()> {
    let mut config = HalConfig::from_env();
    if let Some(device) = cli.device {
        config.device_path = device;
    }
    config.show_fps |= cli.show_fps;

    let registry = HalRegistry::v4l2(config);
    let camera = registry.create_instance();

    let (tx, rx) = mpsc::channel();
    camera.set_callbacks(Arc::new(ChannelCallbacks { tx: Mutex::new(tx) }));

    match cli.command {
        Command::Preview { frames } => {
            camera.enable_msg_type(MsgType::PREVIEW_FRAME);
            camera.start_preview()?;

            let mut received = 0;
            while received < frames {
                match rx.recv_timeout(Duration::from_secs(5)) {
                    Ok(Event::Frame(len)) => {
                        received += 1;
                        info!(frame = received, bytes = len, "Preview frame");
                    }
                    Ok(_) => {}
                    Err(_) => {
                        camera.stop_preview();
                        return Err(HalError::Device("no preview frames".to_owned()));
                    }
                }
            }
            camera.stop_preview();
        }
        Command::Picture { output } => {
            camera.enable_msg_type(MsgType::SHUTTER | MsgType::COMPRESSED_IMAGE);
            camera.take_picture()?;

            for event in rx.try_iter() {
                match event {
                    Event::Shutter => info!("Shutter"),
                    Event::Jpeg(jpeg) => {
                        std::fs::write(&output, &jpeg)?;
                        info!(path = %output.display(), bytes = jpeg.len(), "Picture saved");
                    }
                    Event::Frame(_) => {}
                }
            }
        }
    }

    camera.release();
    Ok(())
}
