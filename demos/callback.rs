//! Callback-style chain with an error handler.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example callback
//!
//! Four requests go through the same chain:
//!   GET /me with a token        → 200 hello, alice
//!   GET /me without a token     → 401 from the error handler
//!   GET /explode with a token   → panic, error handler passes it on → 500
//!   GET /nowhere with a token   → chain exhausted → 404

use anyhow::anyhow;
use http::header::AUTHORIZATION;
use http::{HeaderValue, Method, StatusCode};
use tracing::info;
use tracing_subscriber::EnvFilter;
use weft::callback::App;
use weft::{Error, Exhaustion, Request, Response};

#[derive(Clone)]
struct User(String);

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let app = App::new()
        .exhaustion(Exhaustion::NotFound)
        .middleware(|ctx, next| {
            info!(method = %ctx.request.method(), path = ctx.request.path(), "request");
            next.advance();
            Ok(())
        })
        .middleware(|ctx, next| {
            let user = ctx
                .request
                .header("authorization")
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|name| User(name.to_owned()));
            match user {
                Some(user) => {
                    ctx.state.insert(user);
                    next.advance();
                }
                None => next.fail(anyhow!("missing bearer token")),
            }
            Ok(())
        })
        .middleware(|ctx, next| {
            match ctx.request.path() {
                "/explode" => panic!("handler bug"),
                "/me" => {
                    let name = ctx.state.get::<User>().map_or("stranger", |u| u.0.as_str()).to_owned();
                    ctx.response.text(format!("hello, {name}"));
                }
                _ => next.advance(),
            }
            Ok(())
        })
        .error_middleware(|err, ctx, next| {
            // Bugs are not ours to answer; let the fallback handle them.
            if let Error::Panicked(_) = err {
                next.fail(err);
                return Ok(());
            }
            ctx.response.set_status(StatusCode::UNAUTHORIZED);
            ctx.response.text(err.to_string());
            Ok(())
        });

    let with_token = |path: &str| {
        Request::new(Method::GET, path)
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer alice"))
    };

    let requests = [
        with_token("/me"),
        Request::new(Method::GET, "/me"),
        with_token("/explode"),
        with_token("/nowhere"),
    ];

    for request in requests {
        let path = request.path().to_owned();
        let ctx = app.call(request, Response::new()).await.expect("run task failed");
        let res = ctx.response.into_http();
        info!(%path, status = %res.status(), body = ?res.body(), "response");
    }
}
