//! Promise-style handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The chain holds handlers of *different* types in a single registry. Rust
//! collections hold one concrete type, so every handler hides behind the
//! same trait object (`dyn ErasedMiddleware`):
//!
//! ```text
//! |ctx, next| async move { … }                  ← user writes this
//!        ↓ app.middleware(f)
//! Arc::new(FnMiddleware(f))                     ← heap-allocated wrapper
//!        ↓  stored as BoxedMiddleware = Arc<dyn ErasedMiddleware>
//! middleware.call(ctx, next)  once per step     ← one vtable dispatch
//!        ↓
//! Box::pin(f(ctx, next))                        ← BoxFuture
//! ```
//!
//! A mounted [`Composed`](super::Composed) chain is stored the same way.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Ctx;
use crate::error::HandlerResult;

use super::Next;

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` so every step can run as its own tokio task.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface shared by closures and composed chains.
pub(crate) trait ErasedMiddleware {
    fn call(&self, ctx: Ctx, next: Next) -> BoxFuture<'static, HandlerResult>;
}

/// A type-erased handler shared by every run of an app.
pub(crate) type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

/// Newtype wrapper bridging a concrete handler `F` to the trait object.
pub(crate) struct FnMiddleware<F>(pub(crate) F);

impl<F, Fut> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Ctx, Next) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Ctx, next: Next) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.0)(ctx, next))
    }
}
