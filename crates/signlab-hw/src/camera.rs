//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame, FrameError};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::capability::Capabilities;
use v4l::FourCC;

const YUYV: &[u8; 4] = b"YUYV";
const MJPG: &[u8; 4] = b"MJPG";
const EBUSY: i32 = 16;

/// Devices tried after the configured one.
const FALLBACK_DEVICES: [&str; 3] = ["/dev/video0", "/dev/video1", "/dev/video2"];

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("no usable camera (tried {0})")]
    NoDevice(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("frame: {0}")]
    Frame(#[from] FrameError),
}

/// Capture settings requested from the driver.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Number of mmap buffers; small values keep latency low.
    pub buffers: u32,
    pub mirror: bool,
    /// Frames discarded after each stream start while exposure settles.
    pub warmup_frames: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: FALLBACK_DEVICES[0].to_string(),
            width: 1280,
            height: 720,
            fps: 30,
            buffers: 1,
            mirror: true,
            warmup_frames: 3,
        }
    }
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed, 2 bytes per pixel.
    Yuyv,
    /// Motion-JPEG, one compressed image per buffer.
    Mjpg,
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
    config: CameraConfig,
}

/// Candidate device paths in the order they are tried, without duplicates.
pub fn candidate_devices(preferred: &str) -> Vec<String> {
    let mut out = vec![preferred.to_string()];
    for d in FALLBACK_DEVICES {
        if !out.iter().any(|p| p == d) {
            out.push(d.to_string());
        }
    }
    out
}

impl Camera {
    /// Open the configured device, falling back to `/dev/video0..2`.
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let candidates = candidate_devices(&config.device);
        for path in &candidates {
            match Self::open_device(path, config) {
                Ok(cam) => return Ok(cam),
                Err(e) => tracing::warn!(device = %path, error = %e, "camera unavailable, trying next"),
            }
        }
        Err(CameraError::NoDevice(candidates.join(", ")))
    }

    /// Open one V4L2 device by path (e.g. "/dev/video0").
    pub fn open_device(device_path: &str, config: &CameraConfig) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| open_error(device_path, e))?;
        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("{device_path}: capability query: {e}")))?;
        if !is_capture(&caps) {
            return Err(CameraError::StreamingNotSupported);
        }
        tracing::info!(device = device_path, card = %caps.card, driver = %caps.driver, "camera opened");

        // Prefer YUYV; many webcams only reach 720p at 30 fps as MJPG, so
        // accept whatever of the two the driver settles on.
        let negotiate = |fourcc: &[u8; 4]| {
            let mut fmt = device.format()?;
            fmt.fourcc = FourCC::new(fourcc);
            fmt.width = config.width;
            fmt.height = config.height;
            device.set_format(&fmt)
        };
        let mut negotiated = negotiate(YUYV).map_err(|e| CameraError::FormatNegotiationFailed(e.to_string()))?;
        if negotiated.fourcc != FourCC::new(YUYV) {
            negotiated = negotiate(MJPG).map_err(|e| CameraError::FormatNegotiationFailed(e.to_string()))?;
        }

        let fourcc = negotiated.fourcc;
        let pixel_format = PixelFormat::from_fourcc(fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!("driver chose {fourcc:?}, need YUYV or MJPG"))
        })?;

        if negotiated.width < frame::MIN_FRAME_DIM || negotiated.height < frame::MIN_FRAME_DIM {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "driver offered {}x{}, below the {}px minimum",
                negotiated.width,
                negotiated.height,
                frame::MIN_FRAME_DIM
            )));
        }

        if let Err(e) = device.set_params(&Parameters::with_fps(config.fps)) {
            tracing::warn!(fps = config.fps, error = %e, "could not set frame rate, using driver default");
        }

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            format = ?pixel_format,
            fps = config.fps,
            "capture format set"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
            config: config.clone(),
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    fn stream(&self) -> Result<MmapStream<'_>, CameraError> {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, self.config.buffers.max(1))
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;

        for _ in 0..self.config.warmup_frames {
            stream
                .next()
                .map_err(|e| CameraError::CaptureFailed(format!("warmup dequeue failed: {e}")))?;
        }
        Ok(stream)
    }

    /// Capture a single RGB frame.
    pub fn capture_frame(&self) -> Result<Frame, CameraError> {
        let mut stream = self.stream()?;
        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
        self.to_frame(buf, meta.sequence)
    }

    /// Stream frames into `on_frame` until it returns `false`.
    ///
    /// Individual bad frames are skipped; a failing dequeue ends the stream
    /// with an error.
    pub fn capture_while<F>(&self, mut on_frame: F) -> Result<usize, CameraError>
    where
        F: FnMut(Frame) -> bool,
    {
        let mut stream = self.stream()?;
        let mut delivered = 0usize;
        loop {
            let (buf, meta) = stream
                .next()
                .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
            match self.to_frame(buf, meta.sequence) {
                Ok(frame) => {
                    delivered += 1;
                    if !on_frame(frame) {
                        return Ok(delivered);
                    }
                }
                Err(e) => tracing::debug!(seq = meta.sequence, error = %e, "dropping frame"),
            }
        }
    }

    /// Convert a raw buffer to an RGB frame based on the negotiated format.
    fn to_frame(&self, buf: &[u8], sequence: u32) -> Result<Frame, CameraError> {
        let (rgb, width, height) = match self.pixel_format {
            PixelFormat::Yuyv => (frame::yuyv_to_rgb(buf, self.width, self.height)?, self.width, self.height),
            PixelFormat::Mjpg => frame::mjpeg_to_rgb(buf)?,
        };
        let mut frame = Frame::from_rgb(rgb, width, height, sequence)?;
        if self.config.mirror {
            frame.mirror();
        }
        Ok(frame)
    }

    /// Capture-capable `/dev/video*` nodes, sorted by index.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let Ok(entries) = std::fs::read_dir("/dev") else {
            return Vec::new();
        };
        let mut nodes: Vec<(u32, String)> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().into_string().ok()?;
                let index = name.strip_prefix("video")?.parse().ok()?;
                Some((index, format!("/dev/{name}")))
            })
            .collect();
        nodes.sort_unstable();

        nodes
            .into_iter()
            .filter_map(|(_, path)| {
                let caps = Device::with_path(&path).and_then(|d| d.query_caps()).ok()?;
                is_capture(&caps).then(|| DeviceInfo {
                    name: caps.card,
                    driver: caps.driver,
                    bus: caps.bus,
                    path,
                })
            })
            .collect()
    }
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        if fourcc == FourCC::new(YUYV) {
            Some(Self::Yuyv)
        } else if fourcc == FourCC::new(MJPG) {
            Some(Self::Mjpg)
        } else {
            None
        }
    }
}

fn is_capture(caps: &Capabilities) -> bool {
    caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE)
}

/// EBUSY means another process holds the device; anything else is treated as absent.
fn open_error(path: &str, e: std::io::Error) -> CameraError {
    if e.raw_os_error() == Some(EBUSY) {
        CameraError::DeviceBusy
    } else {
        CameraError::DeviceNotFound(format!("{path}: {e}"))
    }
}
