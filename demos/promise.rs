//! Promise-style chain: timing, recovery, and a mounted sub-chain.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example promise
//!
//! Try the three requests below and watch the log:
//!   GET /hello   → 200, timed by the outer handler
//!   GET /flaky   → 503, recovered by the outer handler
//!   GET /twice   → 500, continuation invoked twice

use std::time::{Duration, Instant};

use anyhow::anyhow;
use http::{Method, StatusCode};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use weft::promise::App;
use weft::{Request, Response};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Handlers that only care about a couple of paths, packaged as one unit.
    let endpoints = App::new()
        .middleware(|ctx, next| async move {
            let path = ctx.lock().request.path().to_owned();
            match path.as_str() {
                "/hello" => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    ctx.lock().response.text("hello");
                    Ok(())
                }
                "/flaky" => Err(anyhow!("upstream timed out")),
                _ => Ok(next.run().await?),
            }
        })
        .middleware(|_ctx, next| async move {
            next.run().await?;
            // A second call is always a bug.
            next.run().await?;
            Ok(())
        })
        .compose();

    let app = App::new()
        .middleware(|ctx, next| async move {
            let started = Instant::now();
            let result = next.run().await;
            let status = ctx.lock().response.status();
            info!(%status, elapsed = ?started.elapsed(), "request finished");
            result?;
            Ok(())
        })
        .middleware(|ctx, next| async move {
            match next.run().await {
                Err(e) if !e.is_protocol_violation() => {
                    warn!(error = %e, "recovering");
                    let mut context = ctx.lock();
                    context.response.set_status(StatusCode::SERVICE_UNAVAILABLE);
                    context.response.text("try again later");
                    Ok(())
                }
                other => Ok(other?),
            }
        })
        .mount(endpoints);

    for path in ["/hello", "/flaky", "/twice"] {
        let ctx = app.call(Request::new(Method::GET, path), Response::new()).await;
        let res = ctx.response.into_http();
        info!(%path, status = %res.status(), body = ?res.body(), "response");
    }
}
