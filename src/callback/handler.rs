//! Callback-style handler storage.
//!
//! The registry holds normal handlers and error handlers side by side, in
//! the order they were registered. Rather than inspecting a function's
//! parameter count at dispatch time, each entry is tagged when it is
//! registered:
//!
//! ```text
//! app.middleware(|ctx, next| …)              → Layer::Normal(Arc<NormalFn>)
//! app.error_middleware(|err, ctx, next| …)   → Layer::Error(Arc<ErrorFn>)
//! ```
//!
//! Both are plain synchronous functions. `Arc` lets an [`App`](super::App)
//! be cloned into spawned runs without copying the handlers.

use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, HandlerResult};

use super::Next;

pub(crate) type NormalFn = dyn Fn(&mut Context, Next) -> HandlerResult + Send + Sync + 'static;
pub(crate) type ErrorFn = dyn Fn(Error, &mut Context, Next) -> HandlerResult + Send + Sync + 'static;

/// One registry slot.
#[derive(Clone)]
pub(crate) enum Layer {
    Normal(Arc<NormalFn>),
    Error(Arc<ErrorFn>),
}

impl Layer {
    pub(crate) fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}
