//! Where unhandled run failures get reported.

use tracing::error;

use crate::error::Error;

/// A sink for failures that no handler recovered from.
///
/// Called exactly once per failed run, right before the fallback response is
/// written. Any `Fn(&Error)` closure works:
///
/// ```rust
/// use weft::callback::App;
///
/// let app = App::new().diagnostics(|e: &weft::Error| eprintln!("unhandled: {e}"));
/// ```
pub trait Diagnostics: Send + Sync + 'static {
    fn report(&self, error: &Error);
}

impl<F> Diagnostics for F
where
    F: Fn(&Error) + Send + Sync + 'static,
{
    fn report(&self, error: &Error) {
        self(error)
    }
}

/// The default sink: one `error`-level tracing event per failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl Diagnostics for TracingSink {
    fn report(&self, e: &Error) {
        error!(error = %e, protocol_violation = e.is_protocol_violation(), "unhandled middleware error");
    }
}
