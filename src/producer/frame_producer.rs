use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::error::PlayoutResult;
use crate::frame::frame::Frame;
use crate::processor::backend::FrameProcessor;

/// Owned, type-erased producer as stored in a layer.
pub type BoxedProducer = Box<dyn FrameProducer>;

/// Process-unique identity assigned to a producer when a layer takes ownership of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProducerId(pub u64);

impl ProducerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Non-owning record of the producer a newly activated producer took over from.
///
/// Built by the layer on `play()` from the outgoing producer and the layer's cached frame, so
/// transition variants can blend from `last_frame` without keeping the outgoing producer alive.
#[derive(Clone, Debug)]
pub struct LeadingProducer {
    /// Identity of the outgoing producer.
    pub id: ProducerId,
    /// `describe()` of the outgoing producer.
    pub description: String,
    /// Last frame the outgoing producer delivered to its layer, if any.
    pub last_frame: Option<Frame>,
}

/// Snapshot of a producer installed in a layer, as returned by layer queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProducerInfo {
    /// Identity assigned on install.
    pub id: ProducerId,
    /// `describe()` of the producer.
    pub description: String,
    /// Producer this one took over from on `play()`, if any.
    pub leading: Option<ProducerId>,
}

/// A source of frames driven once per render tick.
///
/// Lifecycle: [`FrameProducer::initialize`] is called exactly once, outside the layer lock,
/// before the producer is installed in a layer; [`FrameProducer::get_frame`] is then called at
/// most once per tick from the render thread.
pub trait FrameProducer: Send {
    /// One-time setup against the frame-processor backend (e.g. allocate frame buffers).
    ///
    /// Producers owning a following producer must forward this call to it.
    fn initialize(&mut self, processor: &dyn FrameProcessor) -> PlayoutResult<()>;

    /// Advance by one tick and return the next frame, or `None` at end of stream.
    ///
    /// Exhaustion is not an error. `Err` is reserved for genuine internal failures.
    fn get_frame(&mut self) -> PlayoutResult<Option<Frame>>;

    /// Receive the link to the producer this one replaces.
    fn set_leading_producer(&mut self, _leading: Option<LeadingProducer>) {}

    /// Link set by the last [`FrameProducer::set_leading_producer`] call, if stored.
    fn leading_producer(&self) -> Option<&LeadingProducer> {
        None
    }

    /// Hand over the producer to continue with once this one reaches end of stream.
    fn take_following_producer(&mut self) -> Option<BoxedProducer> {
        None
    }

    /// Diagnostic identity. No side effects.
    fn describe(&self) -> String;
}

impl fmt::Debug for dyn FrameProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
