//! Promise-style dispatch.
//!
//! Handlers are async functions that receive a [`Ctx`] handle and a [`Next`]
//! continuation. Awaiting `next.run()` suspends the handler until the rest
//! of the chain has settled, which gives the classic onion ordering:
//!
//! ```text
//! A before ─► B before ─► C ─► B after ─► A after
//! ```
//!
//! Errors returned from a handler, panics inside one, and failed
//! continuations all travel back up the chain as `Err` values. A handler can
//! recover by matching on `next.run().await`; anything that reaches the top
//! is reported and turned into the `500` fallback.

mod handler;
mod next;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::context::{Context, Ctx};
use crate::diagnostics::Diagnostics;
use crate::error::HandlerResult;
use crate::registry::Registry;
use crate::request::Request;
use crate::response::Response;
use crate::terminal::{Exhaustion, Outcome, Terminal};

use handler::{BoxedMiddleware, ErasedMiddleware, FnMiddleware};
use next::RunState;

pub use handler::BoxFuture;
pub use next::Next;

// ── App ───────────────────────────────────────────────────────────────────────

/// A promise-style middleware chain.
///
/// ```rust
/// use weft::promise::App;
///
/// # async fn demo() {
/// let app = App::new()
///     .middleware(|ctx, next| async move {
///         next.run().await?;
///         let status = ctx.lock().response.status();
///         tracing::info!(%status, "request finished");
///         Ok(())
///     })
///     .middleware(|ctx, _next| async move {
///         ctx.lock().response.text("hello");
///         Ok(())
///     });
///
/// let ctx = app.call(Default::default(), Default::default()).await;
/// assert_eq!(ctx.response.body(), b"hello");
/// # }
/// ```
#[derive(Clone, Default)]
pub struct App {
    chain: Arc<Registry<BoxedMiddleware>>,
    terminal: Terminal,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler. Returns `self` for chaining.
    pub fn middleware<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Ctx, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Arc::make_mut(&mut self.chain).register(Arc::new(FnMiddleware(handler)));
        self
    }

    /// Appends a whole composed chain as a single handler. When its last
    /// handler continues, control passes to the handler after the mount.
    pub fn mount(mut self, chain: Composed) -> Self {
        Arc::make_mut(&mut self.chain).register(Arc::new(chain));
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

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Snapshots the current handlers as a chain that can be mounted in
    /// another app. Later registrations on `self` do not affect it.
    pub fn compose(&self) -> Composed {
        Composed { chain: Arc::clone(&self.chain) }
    }

    /// Entry point for transport code. Resolves once the run has fully
    /// settled, fallback included, with the final context.
    pub async fn call(&self, request: Request, response: Response) -> Context {
        let ctx = Ctx::new(Context::new(request, response));
        self.run(ctx.clone()).await;
        ctx.take()
    }

    /// Drives one run over `ctx`. The top-level error boundary lives here.
    pub async fn run(&self, ctx: Ctx) -> Outcome {
        let run = RunState::new(Arc::clone(&self.chain), ctx.clone(), None);
        let result = next::dispatch(Arc::clone(&run), 0).await;

        let mut context = ctx.lock();
        match result {
            Ok(()) if run.exhausted() => {
                debug!(handlers = self.chain.len(), "chain exhausted");
                self.terminal.exhaust(&mut context.response)
            }
            Ok(()) => {
                debug!("chain halted by handler");
                Outcome::Halted
            }
            Err(error) => self.terminal.fail(&mut context.response, &error),
        }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("handlers", &self.chain.len())
            .field("terminal", &self.terminal)
            .finish()
    }
}

// ── Composed ──────────────────────────────────────────────────────────────────

/// A frozen chain of handlers, mountable inside another [`App`].
///
/// Every invocation starts a nested run with its own cursor. Errors it does
/// not handle propagate to the enclosing handler like any other failure.
#[derive(Clone)]
pub struct Composed {
    chain: Arc<Registry<BoxedMiddleware>>,
}

impl ErasedMiddleware for Composed {
    fn call(&self, ctx: Ctx, next: Next) -> BoxFuture<'static, HandlerResult> {
        let steps = next::dispatch(RunState::new(Arc::clone(&self.chain), ctx, Some(next)), 0);
        Box::pin(async move { steps.await.map_err(anyhow::Error::from) })
    }
}

impl fmt::Debug for Composed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composed").field("handlers", &self.chain.len()).finish()
    }
}
