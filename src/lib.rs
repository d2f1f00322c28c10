//! Layered real-time render core for broadcast playout.
//!
//! A [`RenderDevice`] owns an ordered set of [`Layer`]s and a dedicated render thread. Once per
//! tick the thread pulls at most one [`Frame`] from every layer, assembles them into a
//! [`CompositeFrame`] in ascending [`LayerId`] order and hands it to a [`FrameProcessor`]
//! backend. Control operations (`load`, `play`, `pause`, `stop`, `clear`) may be issued from any
//! thread while rendering runs.
//!
//! - Build producers from parameters with a [`ProducerRegistry`], or implement [`FrameProducer`]
//! - Drive them with [`RenderDevice`] on a [`HeadlessProcessor`] or your own backend
//! - Describe a whole session in JSON with [`DeviceConfig`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// JSON session configuration.
pub mod config;
pub(crate) mod frame;
pub(crate) mod processor;
pub(crate) mod producer;
pub(crate) mod renderer;

pub use crate::foundation::core::{Fps, LayerId, PixelFormat, VideoFormat};
pub use crate::foundation::error::{PlayoutError, PlayoutResult};

pub use crate::config::{DeviceConfig, LayerLoad};
pub use crate::frame::composite::{CompositeFrame, PremulPx, over};
pub use crate::frame::frame::{AudioSamples, Frame};
pub use crate::processor::backend::FrameProcessor;
pub use crate::processor::headless::{HeadlessOpts, HeadlessProcessor};
pub use crate::producer::color::{ColorProducer, parse_color};
pub use crate::producer::empty::EmptyProducer;
pub use crate::producer::frame_producer::{
    BoxedProducer, FrameProducer, LeadingProducer, ProducerId, ProducerInfo,
};
pub use crate::producer::registry::{
    FactoryContext, ProducerFactory, ProducerRegistry, create_color_producer,
};
pub use crate::renderer::device::{LayerSnapshot, RenderDevice, RenderDeviceOpts, RenderStats};
pub use crate::renderer::layer::{Layer, LayerState, LoadMode};
