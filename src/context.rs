//! The per-run context and its shared handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use http::Extensions;

use crate::request::Request;
use crate::response::Response;

/// Everything one run shares between its handlers.
///
/// One `Context` per inbound call, owned by the run for its whole life.
/// `state` is a typed map for whatever handlers want to pass down the chain
/// (a user id, a start timestamp, a request id).
#[derive(Debug, Default)]
pub struct Context {
    pub request: Request,
    pub response: Response,
    pub state: Extensions,
}

impl Context {
    pub fn new(request: Request, response: Response) -> Self {
        Self { request, response, state: Extensions::new() }
    }
}

/// A cloneable handle to a [`Context`], used by the promise engine.
///
/// Promise-style handlers suspend while the rest of the chain runs, so they
/// cannot hold a plain `&mut Context` across the `await`. Each handler gets
/// its own clone of the handle and locks it for the short stretches in which
/// it reads or writes.
///
/// The guard is not `Send`, so the compiler rejects a handler that tries to
/// keep it locked across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct Ctx(Arc<Mutex<Context>>);

impl Ctx {
    pub fn new(context: Context) -> Self {
        Self(Arc::new(Mutex::new(context)))
    }

    /// Locks the context. A handler that panicked while holding the lock
    /// does not make the context unreachable for the rest of the run.
    pub fn lock(&self) -> MutexGuard<'_, Context> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the context out, leaving a default one behind.
    pub fn take(&self) -> Context {
        std::mem::take(&mut *self.lock())
    }
}

impl From<Context> for Ctx {
    fn from(context: Context) -> Self { Self::new(context) }
}
