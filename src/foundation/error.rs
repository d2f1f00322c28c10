/// Convenience result type used across the playout core.
pub type PlayoutResult<T> = Result<T, PlayoutError>;

/// Top-level error taxonomy used by the render core.
///
/// Construction-time conditions (`InvalidArgument`, `NullArgument`, `Config`) are returned to the
/// immediate caller. Runtime conditions (`ProducerFault`, `TickFault`) are produced inside the
/// render loop and are contained there: they are logged and recovered from, never surfaced to the
/// caller of a control operation.
#[derive(thiserror::Error, Debug)]
pub enum PlayoutError {
    /// Malformed producer-construction parameters.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A required producer was absent.
    #[error("null argument: {0}")]
    NullArgument(String),

    /// A producer failed internally while initializing or producing a frame.
    #[error("producer fault: {0}")]
    ProducerFault(String),

    /// Any other failure during a render tick (compositing, backend send).
    #[error("tick fault: {0}")]
    TickFault(String),

    /// Invalid device or session configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlayoutError {
    /// Build a [`PlayoutError::InvalidArgument`] value.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Build a [`PlayoutError::NullArgument`] value.
    pub fn null_argument(msg: impl Into<String>) -> Self {
        Self::NullArgument(msg.into())
    }

    /// Build a [`PlayoutError::ProducerFault`] value.
    pub fn producer_fault(msg: impl Into<String>) -> Self {
        Self::ProducerFault(msg.into())
    }

    /// Build a [`PlayoutError::TickFault`] value.
    pub fn tick_fault(msg: impl Into<String>) -> Self {
        Self::TickFault(msg.into())
    }

    /// Build a [`PlayoutError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build an error from a panic payload caught with `catch_unwind`.
    pub(crate) fn from_panic(
        payload: Box<dyn std::any::Any + Send>,
        wrap: fn(String) -> Self,
    ) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        wrap(format!("panicked: {msg}"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
