use crate::foundation::core::PixelFormat;
use crate::foundation::error::{PlayoutError, PlayoutResult};
use crate::frame::frame::Frame;
use crate::processor::backend::FrameProcessor;
use crate::producer::frame_producer::FrameProducer;

/// Parse `#AARRGGBB` into the packed 32-bit value written to a BGRA pixel.
pub fn parse_color(color: &str) -> PlayoutResult<u32> {
    let invalid = || PlayoutError::invalid_argument(format!("invalid color code '{color}'"));
    let hex = color.strip_prefix('#').ok_or_else(invalid)?;
    if color.chars().count() != 9 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    u32::from_str_radix(hex, 16).map_err(|_| invalid())
}

/// Solid color, delivered as one 1x1 frame repeated forever.
#[derive(Debug)]
pub struct ColorProducer {
    color: String,
    value: u32,
    frame: Option<Frame>,
}

impl ColorProducer {
    /// Validate `color` (`#` followed by 8 hex digits).
    pub fn new(color: &str) -> PlayoutResult<Self> {
        let value = parse_color(color)?;
        Ok(Self {
            color: color.to_string(),
            value,
            frame: None,
        })
    }

    /// Packed color value.
    pub fn value(&self) -> u32 {
        self.value
    }
}

impl FrameProducer for ColorProducer {
    fn initialize(&mut self, processor: &dyn FrameProcessor) -> PlayoutResult<()> {
        let value = self.value;
        let frame = processor.create_frame(1, 1, PixelFormat::Bgra)?;
        if frame.image().len() < 4 {
            return Err(PlayoutError::producer_fault(
                "backend allocated a frame without pixel storage",
            ));
        }
        self.frame =
            Some(frame.with_image_mut(|px| px[..4].copy_from_slice(&value.to_le_bytes())));
        Ok(())
    }

    fn get_frame(&mut self) -> PlayoutResult<Option<Frame>> {
        match &self.frame {
            Some(frame) => Ok(Some(frame.clone())),
            None => Err(PlayoutError::producer_fault(format!(
                "{} used before initialize",
                self.describe()
            ))),
        }
    }

    fn describe(&self) -> String {
        format!("color[{}]", self.color)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/producer/color.rs"]
mod tests;
