use crate::foundation::core::{PixelFormat, VideoFormat};
use crate::foundation::error::PlayoutResult;
use crate::frame::composite::CompositeFrame;
use crate::frame::frame::Frame;

/// Frame-processor backend consumed by the render core.
///
/// The backend owns frame allocation and output. It is shared between control threads (producer
/// initialization) and the render thread (`send`), so every method takes `&self`.
pub trait FrameProcessor: Send + Sync {
    /// Output format the backend expects.
    fn format(&self) -> &VideoFormat;

    /// Allocate a frame for a producer. Called from `FrameProducer::initialize`.
    fn create_frame(&self, width: u32, height: u32, format: PixelFormat) -> PlayoutResult<Frame>;

    /// Accept one tick's composite for output. Called once per render tick.
    fn send(&self, frame: CompositeFrame) -> PlayoutResult<()>;

    /// Stop output. Composites sent afterwards are discarded.
    fn stop(&self);
}
