//! How a run ends.
//!
//! Both engines share the same two terminal behaviors: the fixed
//! `500 Internal Server Error` fallback when an error reaches the boundary,
//! and the [`Exhaustion`] policy when the chain runs out of handlers.

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostics, TracingSink};
use crate::error::Error;
use crate::response::Response;

/// How a single run finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every handler continued and the chain ran off its end.
    Exhausted,
    /// A handler returned without continuing the chain.
    Halted,
    /// An error reached the boundary; the fallback response was produced.
    Failed,
}

/// What to do when the chain is exhausted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Exhaustion {
    /// Do nothing. A response nobody finished stays unfinished and the
    /// transport decides what that means.
    #[default]
    Silent,
    /// Finish an unfinished response with `404 Not Found`.
    NotFound,
}

/// The terminal behaviors of one app, shared by every run it starts.
#[derive(Clone)]
pub(crate) struct Terminal {
    diagnostics: Arc<dyn Diagnostics>,
    exhaustion: Exhaustion,
}

impl Terminal {
    pub(crate) fn set_diagnostics(&mut self, sink: impl Diagnostics) {
        self.diagnostics = Arc::new(sink);
    }

    pub(crate) fn set_exhaustion(&mut self, policy: Exhaustion) {
        self.exhaustion = policy;
    }

    /// The error boundary: report once, then answer with the fallback.
    pub(crate) fn fail(&self, response: &mut Response, error: &Error) -> Outcome {
        self.diagnostics.report(error);
        if !response.internal_server_error() {
            warn!("response already finished, fallback not written");
        }
        Outcome::Failed
    }

    pub(crate) fn exhaust(&self, response: &mut Response) -> Outcome {
        if !response.is_finished() {
            match self.exhaustion {
                Exhaustion::Silent => debug!("chain exhausted without finishing the response"),
                Exhaustion::NotFound => {
                    response.set_status(StatusCode::NOT_FOUND);
                    response.text("Not Found");
                }
            }
        }
        Outcome::Exhausted
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self { diagnostics: Arc::new(TracingSink), exhaustion: Exhaustion::default() }
    }
}

impl fmt::Debug for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terminal").field("exhaustion", &self.exhaustion).finish_non_exhaustive()
    }
}
