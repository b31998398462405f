//! Frame type and pixel conversion: YUYV and MJPG to RGB, mirroring,
//! dark detection and JPEG encoding.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};

/// Smallest frame edge accepted for recognition.
pub const MIN_FRAME_DIM: u32 = 100;

/// Pixels darker than this luma count toward the dark-frame ratio.
const DARK_LUMA: u8 = 32;

/// A captured RGB8 camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
    pub is_dark: bool,
}

impl Frame {
    /// Build a frame from RGB data, rejecting undersized or short buffers.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Result<Self, FrameError> {
        check_size(width, height)?;
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        let is_dark = is_dark_frame(&luma(&data), 0.95);
        Ok(Self {
            data,
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence,
            is_dark,
        })
    }

    /// Average luma brightness (0.0 to 255.0).
    pub fn avg_brightness(&self) -> f32 {
        let y = luma(&self.data);
        if y.is_empty() {
            return 0.0;
        }
        y.iter().map(|&b| b as f32).sum::<f32>() / y.len() as f32
    }

    pub fn mirror(&mut self) {
        mirror_horizontal(&mut self.data, self.width, self.height);
    }

    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
        encode_jpeg(&self.data, self.width, self.height, quality)
    }
}

fn check_size(width: u32, height: u32) -> Result<(), FrameError> {
    if width < MIN_FRAME_DIM || height < MIN_FRAME_DIM {
        return Err(FrameError::TooSmall { width, height });
    }
    Ok(())
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Convert packed YUYV (4:2:2) to RGB using full-range BT.601.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share
/// the chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = width as usize * height as usize * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0], chunk[2]] {
            let y = y as f32;
            rgb.push(clamp_u8(y + 1.402 * v));
            rgb.push(clamp_u8(y - 0.344_136 * u - 0.714_136 * v));
            rgb.push(clamp_u8(y + 1.772 * u));
        }
    }
    Ok(rgb)
}

/// Decode a Motion-JPEG buffer into RGB. Returns `(data, width, height)`.
pub fn mjpeg_to_rgb(jpeg: &[u8]) -> Result<(Vec<u8>, u32, u32), FrameError> {
    let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
        .map_err(|e| FrameError::Decode(e.to_string()))?
        .to_rgb8();
    let (w, h) = img.dimensions();
    Ok((img.into_raw(), w, h))
}

/// Flip an RGB image left to right in place.
pub fn mirror_horizontal(rgb: &mut [u8], width: u32, height: u32) {
    let w = width as usize;
    let row_len = w * 3;
    for row in rgb.chunks_exact_mut(row_len).take(height as usize) {
        for x in 0..w / 2 {
            let (a, b) = (x * 3, (w - 1 - x) * 3);
            for c in 0..3 {
                row.swap(a + c, b + c);
            }
        }
    }
}

/// Integer BT.601 luma of packed RGB.
pub fn luma(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .map(|p| ((299 * p[0] as u32 + 587 * p[1] as u32 + 114 * p[2] as u32) / 1000) as u8)
        .collect()
}

/// Returns true if more than `threshold_pct` of pixels are near black.
pub fn is_dark_frame(gray: &[u8], threshold_pct: f32) -> bool {
    if gray.is_empty() {
        return true;
    }
    let dark_count = gray.iter().filter(|&&p| p < DARK_LUMA).count();
    (dark_count as f32 / gray.len() as f32) > threshold_pct
}

pub fn encode_jpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode(rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| FrameError::Encode(e.to_string()))?;
    Ok(out)
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("frame too small: {width}x{height} (minimum {MIN_FRAME_DIM}x{MIN_FRAME_DIM})")]
    TooSmall { width: u32, height: u32 },
    #[error("jpeg decode failed: {0}")]
    Decode(String),
    #[error("jpeg encode failed: {0}")]
    Encode(String),
}
