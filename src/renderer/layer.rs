use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::foundation::core::LayerId;
use crate::foundation::error::{PlayoutError, PlayoutResult};
use crate::frame::frame::Frame;
use crate::producer::frame_producer::{BoxedProducer, LeadingProducer, ProducerId, ProducerInfo};

/// What `load` does after placing a producer in the background slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Only set the background producer.
    #[default]
    None,
    /// Also cache one silent frame from the new producer.
    Preview,
    /// Also `play()` immediately.
    AutoPlay,
}

impl FromStr for LoadMode {
    type Err = PlayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "preview" => Ok(Self::Preview),
            "auto_play" | "autoplay" | "auto" => Ok(Self::AutoPlay),
            other => Err(PlayoutError::invalid_argument(format!(
                "unknown load mode '{other}'"
            ))),
        }
    }
}

/// Observable state of a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerState {
    /// No active and no background producer.
    Empty,
    /// Background set, nothing active.
    Previewing,
    /// Active producer running.
    Playing,
    /// Active producer frozen on the cached frame.
    Paused,
}

impl fmt::Display for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::Previewing => "previewing",
            Self::Playing => "playing",
            Self::Paused => "paused",
        };
        f.write_str(s)
    }
}

struct Slot {
    id: ProducerId,
    leading: Option<ProducerId>,
    producer: BoxedProducer,
}

impl Slot {
    fn new(producer: BoxedProducer) -> Self {
        Self {
            id: ProducerId::next(),
            leading: None,
            producer,
        }
    }

    fn info(&self) -> ProducerInfo {
        ProducerInfo {
            id: self.id,
            description: self.producer.describe(),
            leading: self.leading,
        }
    }
}

/// Run a producer call, turning a panic into a `ProducerFault`.
fn contain<T>(call: impl FnOnce() -> PlayoutResult<T>) -> PlayoutResult<T> {
    catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|payload| Err(PlayoutError::from_panic(payload, PlayoutError::ProducerFault)))
}

/// One addressable slot of the render device.
///
/// Holds at most one active and one background producer plus the last frame delivered. Producer
/// faults are contained here: the faulting producer is dropped and the layer goes blank.
pub struct Layer {
    id: LayerId,
    active: Option<Slot>,
    background: Option<Slot>,
    last_frame: Option<Frame>,
    // Last frame delivered by the active producer; unlike `last_frame`, never a preview.
    active_frame: Option<Frame>,
    paused: bool,
    faults: u64,
}

impl Layer {
    /// New, empty layer.
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            active: None,
            background: None,
            last_frame: None,
            active_frame: None,
            paused: false,
            faults: 0,
        }
    }

    /// Layer id.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Put `producer` in the background slot, replacing any previous background producer.
    ///
    /// The cached frame is always dropped. `Preview` caches one frame of `producer` with its audio
    /// removed, `AutoPlay` activates `producer` at once.
    pub fn load(&mut self, producer: BoxedProducer, mode: LoadMode) -> ProducerId {
        self.last_frame = None;
        let mut slot = Slot::new(producer);
        let id = slot.id;

        if mode == LoadMode::Preview {
            match contain(|| slot.producer.get_frame()) {
                Ok(frame) => self.last_frame = frame.map(Frame::without_audio),
                Err(e) => {
                    self.faults += 1;
                    warn!(layer = %self.id, producer = %slot.producer.describe(), error = %e, "preview frame failed");
                }
            }
        }

        debug!(layer = %self.id, producer = %slot.producer.describe(), ?mode, "loaded");
        self.background = Some(slot);

        if mode == LoadMode::AutoPlay {
            self.play();
        }
        id
    }

    /// Promote the background producer to active, or resume from pause if there is none.
    pub fn play(&mut self) {
        if let Some(mut next) = self.background.take() {
            let leading = self.active.take().map(|prev| LeadingProducer {
                id: prev.id,
                description: prev.producer.describe(),
                last_frame: self.active_frame.take(),
            });
            next.leading = leading.as_ref().map(|l| l.id);
            if let Err(e) = contain(|| {
                next.producer.set_leading_producer(leading);
                Ok(())
            }) {
                self.faults += 1;
                warn!(layer = %self.id, producer = %next.producer.describe(), error = %e, "leading link rejected");
            }
            debug!(layer = %self.id, producer = %next.producer.describe(), "playing");
            self.active = Some(next);
        }
        self.paused = false;
    }

    /// Freeze output on the cached frame.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Drop the active producer and the cached frame. The background producer is kept.
    pub fn stop(&mut self) {
        self.active = None;
        self.active_frame = None;
        self.last_frame = None;
    }

    /// Drop everything and return to [`LayerState::Empty`].
    pub fn clear(&mut self) {
        self.active = None;
        self.background = None;
        self.last_frame = None;
        self.active_frame = None;
        self.paused = false;
    }

    /// Produce this tick's frame. `None` means the layer contributes nothing.
    ///
    /// While paused, or without an active producer, the cached frame is returned and no producer
    /// is called. End of stream hands over to the producer's following producer, if any, within
    /// the same call.
    pub fn get_frame(&mut self) -> Option<Frame> {
        if self.paused || self.active.is_none() {
            return self.last_frame.clone();
        }

        while let Some(active) = self.active.as_mut() {
            match contain(|| active.producer.get_frame()) {
                Ok(Some(frame)) => {
                    self.last_frame = Some(frame.clone());
                    self.active_frame = Some(frame.clone());
                    return Some(frame);
                }
                Ok(None) => match contain(|| Ok(active.producer.take_following_producer())) {
                    Ok(Some(following)) => {
                        debug!(
                            layer = %self.id,
                            from = %active.producer.describe(),
                            to = %following.describe(),
                            "chaining to following producer"
                        );
                        self.active = Some(Slot::new(following));
                    }
                    Ok(None) => {
                        debug!(layer = %self.id, producer = %active.producer.describe(), "end of stream");
                        break;
                    }
                    Err(e) => {
                        self.faults += 1;
                        warn!(layer = %self.id, producer = %active.producer.describe(), error = %e, "removed producer from layer");
                        break;
                    }
                },
                Err(e) => {
                    self.faults += 1;
                    warn!(layer = %self.id, producer = %active.producer.describe(), error = %e, "removed producer from layer");
                    break;
                }
            }
        }

        self.active = None;
        self.active_frame = None;
        self.last_frame = None;
        None
    }

    /// Active producer, if any.
    pub fn active(&self) -> Option<ProducerInfo> {
        self.active.as_ref().map(Slot::info)
    }

    /// Background producer, if any.
    pub fn background(&self) -> Option<ProducerInfo> {
        self.background.as_ref().map(Slot::info)
    }

    /// Frame returned by the last `get_frame`, or the preview frame.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    /// Return `true` while paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current state.
    pub fn state(&self) -> LayerState {
        match (&self.active, &self.background) {
            (Some(_), _) if self.paused => LayerState::Paused,
            (Some(_), _) => LayerState::Playing,
            (None, Some(_)) => LayerState::Previewing,
            (None, None) => LayerState::Empty,
        }
    }

    /// Number of producer faults contained since the last call, resetting the count.
    pub fn take_faults(&mut self) -> u64 {
        std::mem::take(&mut self.faults)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("active", &self.active())
            .field("background", &self.background())
            .field("has_frame", &self.last_frame.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/renderer/layer.rs"]
mod tests;
