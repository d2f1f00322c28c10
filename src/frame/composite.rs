use crate::foundation::core::{LayerId, PixelFormat};
use crate::foundation::error::{PlayoutError, PlayoutResult};
use crate::frame::frame::{AudioSamples, Frame};

/// Premultiplied 4-channel pixel in the canvas' own channel order.
pub type PremulPx = [u8; 4];

/// One render tick's output: the frame of every non-empty layer, in ascending layer order.
#[derive(Clone, Debug, Default)]
pub struct CompositeFrame {
    tick: u64,
    layers: Vec<(LayerId, Frame)>,
}

impl CompositeFrame {
    /// Start an empty composite for render tick `tick`.
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            layers: Vec::new(),
        }
    }

    /// Render tick this composite was produced on.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Append the frame of `layer`. Layers must be added in strictly ascending id order, and
    /// every frame must have a non-empty image.
    pub fn push(&mut self, layer: LayerId, frame: Frame) -> PlayoutResult<()> {
        if let Some((last, _)) = self.layers.last()
            && *last >= layer
        {
            return Err(PlayoutError::tick_fault(format!(
                "layer {layer} composited after layer {last}"
            )));
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(PlayoutError::tick_fault(format!(
                "layer {layer} produced an empty image"
            )));
        }
        self.layers.push((layer, frame));
        Ok(())
    }

    /// Layer frames in compositing order (bottom first).
    pub fn layers(&self) -> &[(LayerId, Frame)] {
        &self.layers
    }

    /// Frame contributed by `layer`, if any.
    pub fn frame(&self, layer: LayerId) -> Option<&Frame> {
        self.layers
            .binary_search_by_key(&layer, |(id, _)| *id)
            .ok()
            .map(|i| &self.layers[i].1)
    }

    /// Number of layers that contributed a frame.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Return `true` when no layer contributed a frame.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Flatten all layers onto a `width`x`height` canvas.
    ///
    /// Each layer frame is nearest-neighbour scaled to the full canvas and blended with
    /// premultiplied source-over, bottom layer first. The mixed audio of all layers is attached.
    pub fn flatten(&self, width: u32, height: u32, format: PixelFormat) -> PlayoutResult<Frame> {
        if width == 0 || height == 0 {
            return Err(PlayoutError::tick_fault("flatten canvas must be non-empty"));
        }
        let mut canvas = vec![0u8; width as usize * height as usize * format.bytes_per_pixel()];
        for (_, frame) in &self.layers {
            blit_scaled_over(&mut canvas, width, height, format, frame);
        }
        Frame::from_parts(width, height, format, canvas, self.mixed_audio())
    }

    /// Sum the audio of all layers, sample by sample, with saturation.
    pub fn mixed_audio(&self) -> AudioSamples {
        let len = self
            .layers
            .iter()
            .map(|(_, f)| f.audio().len())
            .max()
            .unwrap_or(0);
        let mut out = vec![0i16; len];
        for (_, frame) in &self.layers {
            for (o, s) in out.iter_mut().zip(frame.audio()) {
                *o = o.saturating_add(*s);
            }
        }
        out
    }
}

fn blit_scaled_over(canvas: &mut [u8], width: u32, height: u32, format: PixelFormat, src: &Frame) {
    let (sw, sh) = (u64::from(src.width()), u64::from(src.height()));
    let swap = src.format() != format;
    let image = src.image();
    for y in 0..height {
        let sy = (u64::from(y) * sh / u64::from(height)) as usize;
        for x in 0..width {
            let sx = (u64::from(x) * sw / u64::from(width)) as usize;
            let so = (sy * sw as usize + sx) * 4;
            let mut s = [image[so], image[so + 1], image[so + 2], image[so + 3]];
            if swap {
                s.swap(0, 2);
            }
            let d = (y as usize * width as usize + x as usize) * 4;
            let out = over([canvas[d], canvas[d + 1], canvas[d + 2], canvas[d + 3]], s);
            canvas[d..d + 4].copy_from_slice(&out);
        }
    }
}

/// Premultiplied source-over. Alpha is the last channel.
pub fn over(dst: PremulPx, src: PremulPx) -> PremulPx {
    let sa = src[3];
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(sa);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/frame/composite.rs"]
mod tests;
