pub(crate) mod color;
pub(crate) mod empty;
pub(crate) mod frame_producer;
pub(crate) mod registry;
