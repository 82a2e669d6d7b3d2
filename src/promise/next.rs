//! The promise-style continuation and the step dispatcher behind it.

use std::fmt;
use std::future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::trace;

use crate::context::Ctx;
use crate::error::Error;
use crate::registry::Registry;

use super::handler::{BoxFuture, BoxedMiddleware};

/// Shared state of one run over one chain.
pub(crate) struct RunState {
    chain: Arc<Registry<BoxedMiddleware>>,
    ctx: Ctx,
    /// One past the highest index dispatched so far; `0` before the first.
    dispatched: AtomicUsize,
    /// Set when a dispatch past the last handler actually runs, as opposed
    /// to being claimed and then dropped.
    ran_off_end: AtomicBool,
    /// Where control goes after the last handler, when this chain is
    /// mounted inside another one.
    terminal: Option<Next>,
}

impl RunState {
    pub(crate) fn new(
        chain: Arc<Registry<BoxedMiddleware>>,
        ctx: Ctx,
        terminal: Option<Next>,
    ) -> Arc<Self> {
        Arc::new(Self {
            chain,
            ctx,
            dispatched: AtomicUsize::new(0),
            ran_off_end: AtomicBool::new(false),
            terminal,
        })
    }

    /// Records `index` as dispatched. `false` if it, or a later index,
    /// already was.
    fn claim(&self, index: usize) -> bool {
        self.dispatched.fetch_max(index + 1, Ordering::AcqRel) <= index
    }

    /// `true` once the continuation of the last handler has been awaited.
    pub(crate) fn exhausted(&self) -> bool {
        self.ran_off_end.load(Ordering::Acquire)
    }
}

/// The continuation handed to each promise-style handler.
///
/// [`run`](Next::run) returns a future for the rest of the chain. Awaiting
/// it is what gives the chain its nesting: everything a handler does after
/// the `await` happens once every later handler has finished.
///
/// ```rust
/// use weft::promise::App;
///
/// let app = App::new().middleware(|ctx, next| async move {
///     ctx.lock().response.write("before ");
///     next.run().await?;
///     ctx.lock().response.end(" after");
///     Ok(())
/// });
/// ```
///
/// Each `Next` may be run once. Running it again fails with
/// [`Error::ContinuationReused`] and dispatches nothing.
#[derive(Clone)]
pub struct Next {
    run: Arc<RunState>,
    index: usize,
}

impl Next {
    /// Dispatches the next step.
    ///
    /// The claim on the step is taken right here, not when the future is
    /// first polled, so a second call fails even if the first future was
    /// never awaited.
    pub fn run(&self) -> BoxFuture<'static, Result<(), Error>> {
        dispatch(Arc::clone(&self.run), self.index)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish_non_exhaustive()
    }
}

/// Runs the handler at `index` as its own task and waits for it.
///
/// Awaiting a join handle does not poll the task it refers to, so a chain
/// of any depth never nests `poll` calls on the stack; each suspended step
/// is a parked task on the heap instead.
pub(crate) fn dispatch(run: Arc<RunState>, index: usize) -> BoxFuture<'static, Result<(), Error>> {
    if !run.claim(index) {
        return Box::pin(future::ready(Err(Error::ContinuationReused {
            step: index.saturating_sub(1),
        })));
    }

    Box::pin(async move {
        let Some(middleware) = run.chain.get(index).cloned() else {
            run.ran_off_end.store(true, Ordering::Release);
            return match &run.terminal {
                Some(next) => next.run().await,
                None => Ok(()),
            };
        };

        trace!(index, "step");
        let ctx = run.ctx.clone();
        let next = Next { run, index: index + 1 };
        tokio::spawn(async move { middleware.call(ctx, next).await })
            .await
            .map_err(Error::from_join)?
            .map_err(Error::from_handler)
    })
}
