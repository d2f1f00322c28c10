use std::path::PathBuf;

use tracing::debug;

use crate::foundation::error::{PlayoutError, PlayoutResult};
use crate::producer::color::ColorProducer;
use crate::producer::empty::EmptyProducer;
use crate::producer::frame_producer::BoxedProducer;

/// Explicit configuration handed to every producer factory.
#[derive(Clone, Debug, Default)]
pub struct FactoryContext {
    /// Folder holding overlay templates, for template-driven producers.
    pub template_folder: PathBuf,
}

/// Producer constructor.
///
/// Returns `Ok(None)` when `params` do not match this factory's signature, and `Err` when they
/// match but are malformed.
pub type ProducerFactory = Box<
    dyn Fn(&[String], &FactoryContext) -> PlayoutResult<Option<BoxedProducer>> + Send + Sync,
>;

/// Ordered list of producer factories. The first factory that accepts the parameters wins.
pub struct ProducerRegistry {
    ctx: FactoryContext,
    factories: Vec<(String, ProducerFactory)>,
}

impl ProducerRegistry {
    /// Registry without any factory.
    pub fn new(ctx: FactoryContext) -> Self {
        Self {
            ctx,
            factories: Vec::new(),
        }
    }

    /// Registry with the built-in factories (`color`).
    pub fn with_defaults(ctx: FactoryContext) -> Self {
        let mut registry = Self::new(ctx);
        registry.register("color", Box::new(create_color_producer));
        registry
    }

    /// Append a factory. Decoded-media and overlay producers plug in here.
    pub fn register(&mut self, name: impl Into<String>, factory: ProducerFactory) {
        self.factories.push((name.into(), factory));
    }

    /// Names of registered factories, in matching order.
    pub fn factory_names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|(n, _)| n.as_str())
    }

    /// Context passed to factories.
    pub fn context(&self) -> &FactoryContext {
        &self.ctx
    }

    /// Build a producer for `params`, falling back to [`EmptyProducer`] when nothing matches.
    pub fn create(&self, params: &[String]) -> PlayoutResult<BoxedProducer> {
        Ok(self
            .try_create(params)?
            .unwrap_or_else(EmptyProducer::boxed))
    }

    /// Build a producer for `params`, failing with `NullArgument` when nothing matches.
    pub fn create_required(&self, params: &[String]) -> PlayoutResult<BoxedProducer> {
        self.try_create(params)?.ok_or_else(|| {
            PlayoutError::null_argument(format!("no producer matches parameters {params:?}"))
        })
    }

    fn try_create(&self, params: &[String]) -> PlayoutResult<Option<BoxedProducer>> {
        for (name, factory) in &self.factories {
            if let Some(producer) = factory(params, &self.ctx)? {
                debug!(factory = %name, producer = %producer.describe(), "created producer");
                return Ok(Some(producer));
            }
        }
        Ok(None)
    }
}

/// Factory for [`ColorProducer`]: matches when the first parameter starts with `#`.
pub fn create_color_producer(
    params: &[String],
    _ctx: &FactoryContext,
) -> PlayoutResult<Option<BoxedProducer>> {
    match params.first() {
        Some(color) if color.starts_with('#') => Ok(Some(Box::new(ColorProducer::new(color)?))),
        _ => Ok(None),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/producer/registry.rs"]
mod tests;
