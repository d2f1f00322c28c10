use std::sync::Arc;

use crate::foundation::core::PixelFormat;
use crate::foundation::error::{PlayoutError, PlayoutResult};

/// Interleaved signed 16-bit PCM samples carried alongside a frame's image.
pub type AudioSamples = Vec<i16>;

#[derive(Clone, Debug, PartialEq, Eq)]
struct FrameData {
    width: u32,
    height: u32,
    format: PixelFormat,
    image: Vec<u8>,
    audio: AudioSamples,
}

/// One immutable unit of image and audio output.
///
/// Cloning is cheap: clones share the same payload. A frame is never mutated once produced; the
/// `with_*` methods return a new frame and copy the payload only if it is shared.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Arc<FrameData>,
}

impl Frame {
    /// Allocate a zeroed (transparent) frame.
    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            data: Arc::new(FrameData {
                width,
                height,
                format,
                image: vec![0; len],
                audio: Vec::new(),
            }),
        }
    }

    /// Build a frame from raw image bytes and audio samples.
    pub fn from_parts(
        width: u32,
        height: u32,
        format: PixelFormat,
        image: Vec<u8>,
        audio: AudioSamples,
    ) -> PlayoutResult<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if image.len() != expected {
            return Err(PlayoutError::invalid_argument(format!(
                "frame image is {} bytes, expected {expected} for {width}x{height}",
                image.len()
            )));
        }
        Ok(Self {
            data: Arc::new(FrameData {
                width,
                height,
                format,
                image,
                audio,
            }),
        })
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.data.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.data.height
    }

    /// Pixel layout of [`Frame::image`].
    pub fn format(&self) -> PixelFormat {
        self.data.format
    }

    /// Tightly packed, row-major image bytes.
    pub fn image(&self) -> &[u8] {
        &self.data.image
    }

    /// Audio samples attached to this frame.
    pub fn audio(&self) -> &[i16] {
        &self.data.audio
    }

    /// Read the pixel at `(x, y)` as a little-endian 32-bit word.
    pub fn pixel_u32(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let bpp = self.format().bytes_per_pixel();
        let off = (y as usize * self.width() as usize + x as usize) * bpp;
        let px = self.data.image.get(off..off + 4)?;
        Some(u32::from_le_bytes([px[0], px[1], px[2], px[3]]))
    }

    /// Return this frame with its audio payload removed.
    pub fn without_audio(mut self) -> Self {
        if !self.data.audio.is_empty() {
            Arc::make_mut(&mut self.data).audio.clear();
        }
        self
    }

    /// Return this frame with `audio` attached in place of its current samples.
    pub fn with_audio(mut self, audio: AudioSamples) -> Self {
        Arc::make_mut(&mut self.data).audio = audio;
        self
    }

    /// Return this frame with `edit` applied to its image bytes.
    pub fn with_image_mut(mut self, edit: impl FnOnce(&mut [u8])) -> Self {
        edit(&mut Arc::make_mut(&mut self.data).image);
        self
    }

    /// Return `true` if both handles share one payload.
    pub fn ptr_eq(a: &Frame, b: &Frame) -> bool {
        Arc::ptr_eq(&a.data, &b.data)
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        Frame::ptr_eq(self, other) || self.data == other.data
    }
}

impl Eq for Frame {}

#[cfg(test)]
#[path = "../../tests/unit/frame/frame.rs"]
mod tests;
