//! Callback-style dispatch.
//!
//! Handlers are synchronous functions that receive the run's context and a
//! [`Next`] continuation. A handler continues the chain with
//! [`Next::advance`], diverts it to the error path with [`Next::fail`], or
//! stops it by simply dropping `next`.
//!
//! # How a run proceeds
//!
//! The run is a loop, not a recursion. Each turn of the loop:
//!
//! 1. yields to the tokio scheduler, so the step starts on a fresh turn,
//! 2. hands the handler a `Next` backed by a fresh one-shot slot,
//! 3. waits for that slot to be filled (or dropped).
//!
//! ```text
//! READY ──► RUNNING ──► advance() ──► next normal handler ──► …
//!               │                       (none left: Exhausted)
//!               ├─────► fail(e) / Err / panic ──► first error handler not yet
//!               │                                   tried for this error ──► …
//!               │                                   (none left: Failed, 500)
//!               └─────► next dropped ──► Halted
//! ```
//!
//! Because `advance` and `fail` consume `next`, a handler cannot continue
//! its step twice. The cursor only moves forward, so no normal handler runs
//! more than once per run, and the stack stays flat however long the chain.
//! An error handler sees each error at most once; after one of them calls
//! `advance`, a later error is looked up from the first error handler again.

mod handler;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::context::Context;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, HandlerResult};
use crate::registry::Registry;
use crate::request::Request;
use crate::response::Response;
use crate::terminal::{Exhaustion, Outcome, Terminal};

use handler::{ErrorFn, Layer, NormalFn};

// ── App ───────────────────────────────────────────────────────────────────────

/// A callback-style middleware chain.
///
/// ```rust
/// use weft::callback::App;
///
/// let app = App::new()
///     .middleware(|ctx, next| {
///         ctx.response.write("hello ");
///         next.advance();
///         Ok(())
///     })
///     .middleware(|ctx, _next| {
///         ctx.response.end("world");
///         Ok(())
///     })
///     .error_middleware(|err, ctx, _next| {
///         ctx.response.end(format!("failed: {err}"));
///         Ok(())
///     });
/// ```
///
/// Build it once at startup; cloning is cheap and every clone shares the
/// same handlers. Registering on a clone while runs are in flight leaves
/// those runs on the handlers they started with.
#[derive(Clone, Default)]
pub struct App {
    chain: Arc<Chain>,
    terminal: Terminal,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a normal handler. Returns `self` for chaining.
    pub fn middleware<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Context, Next) -> HandlerResult + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.chain).push(Layer::Normal(Arc::new(handler)));
        self
    }

    /// Appends an error handler. Normal advancing skips it; it only runs
    /// when an error is routed to it.
    pub fn error_middleware<F>(mut self, handler: F) -> Self
    where
        F: Fn(Error, &mut Context, Next) -> HandlerResult + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.chain).push(Layer::Error(Arc::new(handler)));
        self
    }

    /// Replaces the sink that receives unrecovered errors.
    pub fn diagnostics(mut self, sink: impl Diagnostics) -> Self {
        self.terminal.set_diagnostics(sink);
        self
    }

    pub fn exhaustion(mut self, policy: Exhaustion) -> Self {
        self.terminal.set_exhaustion(policy);
        self
    }

    /// Number of registered handlers, error handlers included.
    pub fn len(&self) -> usize {
        self.chain.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.registry.is_empty()
    }

    /// Entry point for transport code: starts one run in the background.
    ///
    /// Fire-and-forget. The returned handle yields the finished context and
    /// may be dropped without affecting the run.
    pub fn call(&self, request: Request, response: Response) -> JoinHandle<Context> {
        let app = self.clone();
        tokio::spawn(async move {
            let mut ctx = Context::new(request, response);
            app.run(&mut ctx).await;
            ctx
        })
    }

    /// Drives one run over `ctx` to its end.
    pub async fn run(&self, ctx: &mut Context) -> Outcome {
        let mut cursor = Cursor::new(&self.chain);
        let mut signal = Signal::Advance;

        loop {
            tokio::task::yield_now().await;

            let (next, slot) = Next::pair();
            let mut handling_error = false;
            let result = match signal {
                Signal::Advance => match cursor.next_normal() {
                    Some((index, handler)) => {
                        trace!(index, "step");
                        invoke(|| handler(ctx, next))
                    }
                    None => {
                        debug!(handlers = self.len(), "chain exhausted");
                        return self.terminal.exhaust(&mut ctx.response);
                    }
                },
                Signal::Fail(error) => match cursor.next_error() {
                    Some((index, handler)) => {
                        debug!(index, error = %error, "routing error to error handler");
                        handling_error = true;
                        invoke(|| handler(error, ctx, next))
                    }
                    None => return self.terminal.fail(&mut ctx.response, &error),
                },
            };

            // A handler that errors out loses whatever it signalled before.
            signal = match result {
                Err(error) => Signal::Fail(error),
                Ok(()) => match slot.await {
                    Ok(Signal::Advance) if handling_error => {
                        cursor.recovered();
                        Signal::Advance
                    }
                    Ok(signal) => signal,
                    Err(_) => {
                        debug!(steps = cursor.position, "chain halted by handler");
                        return Outcome::Halted;
                    }
                },
            };
        }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("handlers", &self.chain.registry.len())
            .field("error_handlers", &self.chain.error_slots.len())
            .field("terminal", &self.terminal)
            .finish()
    }
}

/// Runs one handler body, turning a returned error or a panic into the
/// error that continues the run.
fn invoke(step: impl FnOnce() -> HandlerResult) -> Result<(), Error> {
    match panic::catch_unwind(AssertUnwindSafe(step)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::from_handler(e)),
        Err(payload) => Err(Error::from_panic(payload)),
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Chain {
    registry: Registry<Layer>,
    /// Indices of the error handlers, in registration order.
    error_slots: Vec<usize>,
}

impl Chain {
    fn push(&mut self, layer: Layer) {
        if layer.is_error() {
            self.error_slots.push(self.registry.len());
        }
        self.registry.register(layer);
    }
}

/// Per-run position in the chain. `position` only moves forward.
/// `spent_error_handlers` only moves forward while one error is being
/// passed between error handlers, and resets once one of them recovers.
struct Cursor<'a> {
    chain: &'a Chain,
    position: usize,
    spent_error_handlers: usize,
}

impl<'a> Cursor<'a> {
    fn new(chain: &'a Chain) -> Self {
        Self { chain, position: 0, spent_error_handlers: 0 }
    }

    fn next_normal(&mut self) -> Option<(usize, &'a Arc<NormalFn>)> {
        while let Some(layer) = self.chain.registry.get(self.position) {
            let index = self.position;
            self.position += 1;
            if let Layer::Normal(handler) = layer {
                return Some((index, handler));
            }
        }
        None
    }

    /// The first error handler that has not yet seen the error in flight.
    fn next_error(&mut self) -> Option<(usize, &'a Arc<ErrorFn>)> {
        let index = *self.chain.error_slots.get(self.spent_error_handlers)?;
        self.spent_error_handlers += 1;
        match self.chain.registry.get(index)? {
            Layer::Error(handler) => Some((index, handler)),
            Layer::Normal(_) => None,
        }
    }

    /// An error handler resumed the normal chain. The next error starts
    /// the lookup over from the first error handler.
    fn recovered(&mut self) {
        self.spent_error_handlers = 0;
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Signal {
    Advance,
    Fail(Error),
}

/// The continuation handed to each callback-style handler.
///
/// Consumed by whichever of [`advance`](Next::advance) or
/// [`fail`](Next::fail) the handler calls. It is `Send`, so a handler may
/// move it into a spawned task and continue the chain later; the run waits
/// for it.
pub struct Next {
    slot: oneshot::Sender<Signal>,
}

impl Next {
    fn pair() -> (Self, oneshot::Receiver<Signal>) {
        let (slot, rx) = oneshot::channel();
        (Self { slot }, rx)
    }

    /// Continues with the next normal handler.
    pub fn advance(self) {
        self.signal(Signal::Advance);
    }

    /// Routes `error` to the error path.
    pub fn fail(self, error: impl Into<anyhow::Error>) {
        self.signal(Signal::Fail(Error::from_handler(error.into())));
    }

    fn signal(self, signal: Signal) {
        if self.slot.send(signal).is_err() {
            warn!("continuation used after its step was abandoned, ignored");
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}
