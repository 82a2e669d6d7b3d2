//! Unified error type.

use std::any::Any;

use thiserror::Error;
use tokio::task::JoinError;

/// What every handler returns.
///
/// Handlers are application code, so any error type converts with `?`.
/// The dispatcher turns whatever comes back into an [`Error`] at the step
/// boundary.
pub type HandlerResult = anyhow::Result<()>;

/// The error type carried through a run's error channel.
///
/// Every failure a run can see ends up here: errors returned by handlers,
/// panics inside handlers, and continuation protocol violations. None of
/// them ever escapes a run; the terminal boundary reports them to the
/// [`Diagnostics`](crate::Diagnostics) sink and answers with the fallback
/// response.
#[derive(Debug, Error)]
pub enum Error {
    /// A promise-engine continuation was invoked again after its step had
    /// already been dispatched.
    #[error("continuation invoked more than once for its step (step {step})")]
    ContinuationReused { step: usize },

    /// A handler panicked. Holds the panic message when it was a string.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The task running a step was cancelled, usually because the runtime
    /// shut down underneath the run.
    #[error("step cancelled before it completed")]
    Cancelled,

    /// An error returned by a handler.
    #[error(transparent)]
    Handler(anyhow::Error),
}

impl Error {
    /// `true` for the distinguished "continuation invoked twice" failure.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ContinuationReused { .. })
    }

    /// Converts a handler's error, unwrapping a `weft::Error` that a handler
    /// forwarded with `?` so it is not buried under another layer.
    pub(crate) fn from_handler(e: anyhow::Error) -> Self {
        e.downcast::<Error>().unwrap_or_else(Self::Handler)
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(s) => *s,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(s) => (*s).to_owned(),
                Err(_) => "non-string panic payload".to_owned(),
            },
        };
        Self::Panicked(message)
    }

    pub(crate) fn from_join(e: JoinError) -> Self {
        match e.try_into_panic() {
            Ok(payload) => Self::from_panic(payload),
            Err(_) => Self::Cancelled,
        }
    }
}
