pub(crate) mod composite;
#[allow(clippy::module_inception)]
pub(crate) mod frame;
