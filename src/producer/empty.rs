use crate::foundation::error::PlayoutResult;
use crate::frame::frame::Frame;
use crate::processor::backend::FrameProcessor;
use crate::producer::frame_producer::{BoxedProducer, FrameProducer};

/// Producer that is always at end of stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyProducer;

impl EmptyProducer {
    /// Boxed instance, ready to load.
    pub fn boxed() -> BoxedProducer {
        Box::new(Self)
    }
}

impl FrameProducer for EmptyProducer {
    fn initialize(&mut self, _processor: &dyn FrameProcessor) -> PlayoutResult<()> {
        Ok(())
    }

    fn get_frame(&mut self) -> PlayoutResult<Option<Frame>> {
        Ok(None)
    }

    fn describe(&self) -> String {
        "empty".to_string()
    }
}
