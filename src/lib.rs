//! # weft
//!
//! Ordered middleware dispatch. You register handlers; weft runs them one
//! after another against a shared request/response context and keeps the
//! control flow honest.
//!
//! ## Two engines, one contract
//!
//! - [`callback`]: synchronous handlers that continue with
//!   `next.advance()` or divert with `next.fail(e)`. Each step starts on a
//!   fresh scheduler turn, and errors are routed to the first error
//!   handler.
//! - [`promise`]: async handlers that `await` the rest of the chain with
//!   `next.run().await`, giving onion ordering. Running a continuation twice
//!   is a reported protocol violation, never a silent double dispatch.
//!
//! Both guarantee:
//!
//! - handlers run in registration order, each normal handler at most once
//!   per run;
//! - chain length does not grow the stack (a million handlers is fine);
//! - an error nobody recovers from is reported once to the [`Diagnostics`]
//!   sink and answered with `500 Internal Server Error`. No run ever
//!   crashes the process.
//!
//! What weft does not do: listen on sockets, route by path, parse bodies,
//! terminate TLS. Transport code builds a [`Request`], calls the app, and
//! sends back the finished [`Response`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use weft::promise::App;
//! use weft::{Request, Response};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::new()
//!         .middleware(|_ctx, next| async move {
//!             let started = std::time::Instant::now();
//!             next.run().await?;
//!             tracing::info!(elapsed = ?started.elapsed(), "done");
//!             Ok(())
//!         })
//!         .middleware(|ctx, _next| async move {
//!             ctx.lock().response.text("hello");
//!             Ok(())
//!         });
//!
//!     let ctx = app.call(Request::default(), Response::new()).await;
//!     assert_eq!(ctx.response.body(), b"hello");
//! }
//! ```

mod context;
mod diagnostics;
mod error;
mod registry;
mod request;
mod response;
mod terminal;

pub mod callback;
pub mod promise;

pub use context::{Context, Ctx};
pub use diagnostics::{Diagnostics, TracingSink};
pub use error::{Error, HandlerResult};
pub use registry::Registry;
pub use request::Request;
pub use response::{ContentType, INTERNAL_SERVER_ERROR_BODY, Response};
pub use terminal::{Exhaustion, Outcome};
