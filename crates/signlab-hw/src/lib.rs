//! signlab-hw: camera capture for sign recognition.
//!
//! V4L2 capture with YUYV/MJPG negotiation, converted to RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraConfig, CameraError, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
