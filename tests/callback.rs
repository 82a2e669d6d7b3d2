//! Integration tests for the callback-style engine.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use http::{Method, StatusCode};
use weft::callback::App;
use weft::{Context, Error, Exhaustion, Outcome, Request, Response};

use common::{Log, Recorder, names};

/// A handler that records `name` and continues.
fn pass(app: App, log: &Log, name: String) -> App {
    let log = log.clone();
    app.middleware(move |_, next| {
        log.push(name.as_str());
        next.advance();
        Ok(())
    })
}

#[tokio::test]
async fn runs_every_handler_once_in_order() {
    let log = Log::default();
    let recorder = Recorder::default();
    let mut app = App::new().diagnostics(recorder.clone());
    for name in names(10) {
        app = pass(app, &log, name);
    }

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Exhausted);

    assert_eq!(log.entries(), names(10));
    assert_eq!(recorder.count(), 0);
    assert_eq!(ctx.response.status(), StatusCode::OK);
    assert!(!ctx.response.is_finished());
}

#[tokio::test]
async fn million_handlers_do_not_overflow_the_stack() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut app = App::new();
    for _ in 0..1_000_000 {
        let calls = Arc::clone(&calls);
        app = app.middleware(move |_, next| {
            calls.fetch_add(1, Ordering::Relaxed);
            next.advance();
            Ok(())
        });
    }

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Exhausted);
    assert_eq!(calls.load(Ordering::Relaxed), 1_000_000);
}

#[tokio::test]
async fn returned_error_skips_the_rest_and_falls_back() {
    let log = Log::default();
    let recorder = Recorder::default();
    let mut app = App::new().diagnostics(recorder.clone());
    for i in 0..6 {
        let log = log.clone();
        app = app.middleware(move |_, next| {
            log.push(format!("h{i}"));
            if i == 3 {
                return Err(anyhow!("boom at {i}"));
            }
            next.advance();
            Ok(())
        });
    }

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Failed);

    assert_eq!(log.entries(), names(4));
    let reports = recorder.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].message, "boom at 3");
    assert_eq!(ctx.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(ctx.response.body(), b"Internal Server Error");
}

#[tokio::test]
async fn panicking_handler_is_treated_as_an_error() {
    let log = Log::default();
    let recorder = Recorder::default();
    let app = pass(App::new().diagnostics(recorder.clone()), &log, "h0".into())
        .middleware(|_, _| panic!("handler exploded"));
    let app = pass(app, &log, "h2".into());

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Failed);

    assert_eq!(log.entries(), ["h0"]);
    let reports = recorder.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].panicked);
    assert_eq!(reports[0].message, "handler panicked: handler exploded");
    assert_eq!(ctx.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn error_handler_can_resume_the_chain() {
    let log = Log::default();
    let recorder = Recorder::default();

    let app = pass(App::new().diagnostics(recorder.clone()), &log, "h0".into());
    let failing = log.clone();
    let recovering = log.clone();
    let finishing = log.clone();
    let app = app
        .middleware(move |_, next| {
            failing.push("h1");
            next.fail(anyhow!("bad input"));
            Ok(())
        })
        .error_middleware(move |err, _, next| {
            recovering.push(format!("recover: {err}"));
            next.advance();
            Ok(())
        })
        .middleware(move |ctx, _| {
            finishing.push("h3");
            ctx.response.text("ok");
            Ok(())
        });

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Halted);

    assert_eq!(log.entries(), ["h0", "h1", "recover: bad input", "h3"]);
    assert_eq!(recorder.count(), 0);
    assert_eq!(ctx.response.status(), StatusCode::OK);
    assert_eq!(ctx.response.body(), b"ok");
}

#[tokio::test]
async fn error_handler_registered_first_still_catches() {
    let log = Log::default();
    let recovering = log.clone();
    let app = App::new()
        .error_middleware(move |err, ctx, _| {
            recovering.push(format!("caught: {err}"));
            ctx.response.set_status(StatusCode::BAD_REQUEST);
            ctx.response.text("handled");
            Ok(())
        })
        .middleware(|_, _| Err(anyhow!("late failure")));

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Halted);

    assert_eq!(log.entries(), ["caught: late failure"]);
    assert_eq!(ctx.response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.response.body(), b"handled");
}

#[tokio::test]
async fn errors_propagate_through_each_error_handler_once() {
    let log = Log::default();
    let recorder = Recorder::default();
    let first = log.clone();
    let second = log.clone();
    let app = App::new()
        .diagnostics(recorder.clone())
        .middleware(|_, next| {
            next.fail(anyhow!("boom"));
            Ok(())
        })
        .error_middleware(move |err, _, next| {
            first.push(format!("first: {err}"));
            next.fail(anyhow!("first saw {err}"));
            Ok(())
        })
        .error_middleware(move |err, _, _| {
            second.push(format!("second: {err}"));
            Err(anyhow!("second gave up on {err}"))
        });

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Failed);

    assert_eq!(log.entries(), ["first: boom", "second: first saw boom"]);
    let reports = recorder.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].message, "second gave up on first saw boom");
    assert_eq!(ctx.response.body(), b"Internal Server Error");
}

#[tokio::test]
async fn error_handler_catches_again_after_recovering() {
    let log = Log::default();
    let recorder = Recorder::default();
    let catcher = log.clone();
    let app = App::new()
        .diagnostics(recorder.clone())
        .error_middleware(move |err, _, next| {
            catcher.push(format!("caught: {err}"));
            next.advance();
            Ok(())
        })
        .middleware(|_, next| {
            next.fail(anyhow!("first"));
            Ok(())
        })
        .middleware(|_, next| {
            next.fail(anyhow!("second"));
            Ok(())
        })
        .middleware(|ctx, _| {
            ctx.response.text("done");
            Ok(())
        });

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Halted);

    assert_eq!(log.entries(), ["caught: first", "caught: second"]);
    assert_eq!(recorder.count(), 0);
    assert_eq!(ctx.response.status(), StatusCode::OK);
    assert_eq!(ctx.response.body(), b"done");
}

#[tokio::test]
async fn error_handler_that_keeps_failing_does_not_loop() {
    let log = Log::default();
    let recorder = Recorder::default();
    let catcher = log.clone();
    let app = App::new()
        .diagnostics(recorder.clone())
        .error_middleware(move |err, _, next| {
            catcher.push(format!("caught: {err}"));
            next.fail(err);
            Ok(())
        })
        .middleware(|_, _| Err(anyhow!("stuck")));

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Failed);

    assert_eq!(log.entries(), ["caught: stuck"]);
    assert_eq!(recorder.count(), 1);
    assert_eq!(ctx.response.body(), b"Internal Server Error");
}

#[tokio::test]
async fn error_handlers_are_skipped_by_normal_advancing() {
    let log = Log::default();
    let stray = log.clone();
    let app = pass(App::new(), &log, "h0".into())
        .error_middleware(move |_, _, next| {
            stray.push("error handler");
            next.advance();
            Ok(())
        });
    let app = pass(app, &log, "h2".into());

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Exhausted);
    assert_eq!(log.entries(), ["h0", "h2"]);
}

#[tokio::test]
async fn empty_chain_completes_silently() {
    let recorder = Recorder::default();
    let app = App::new().diagnostics(recorder.clone());

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Exhausted);

    assert_eq!(recorder.count(), 0);
    assert!(!ctx.response.is_finished());
    assert!(ctx.response.body().is_empty());
}

#[tokio::test]
async fn dropping_next_halts_the_chain() {
    let log = Log::default();
    let stopper = log.clone();
    let app = App::new().middleware(move |ctx, _next| {
        stopper.push("h0");
        ctx.response.text("stopped here");
        Ok(())
    });
    let app = pass(app, &log, "h1".into());

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Halted);
    assert_eq!(log.entries(), ["h0"]);
    assert_eq!(ctx.response.body(), b"stopped here");
}

#[tokio::test]
async fn code_after_advance_runs_before_the_next_handler() {
    let log = Log::default();
    let first = log.clone();
    let app = App::new().middleware(move |_, next| {
        next.advance();
        first.push("h0 after advance");
        Ok(())
    });
    let app = pass(app, &log, "h1".into());

    let mut ctx = Context::default();
    app.run(&mut ctx).await;
    assert_eq!(log.entries(), ["h0 after advance", "h1"]);
}

#[tokio::test]
async fn code_after_fail_runs_before_the_error_handler() {
    let log = Log::default();
    let failing = log.clone();
    let catching = log.clone();
    let app = App::new()
        .middleware(move |_, next| {
            next.fail(anyhow!("bad input"));
            failing.push("h0 after fail");
            Ok(())
        })
        .error_middleware(move |err, _, _| {
            catching.push(format!("caught: {err}"));
            Ok(())
        });

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Halted);
    assert_eq!(log.entries(), ["h0 after fail", "caught: bad input"]);
}

#[tokio::test]
async fn handler_can_advance_from_a_spawned_task() {
    let app = App::new()
        .middleware(|ctx, next| {
            ctx.response.write("a");
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                next.advance();
            });
            Ok(())
        })
        .middleware(|ctx, _| {
            ctx.response.end("b");
            Ok(())
        });

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Halted);
    assert_eq!(ctx.response.body(), b"ab");
}

#[tokio::test]
async fn returned_error_overrides_an_earlier_advance() {
    let log = Log::default();
    let recorder = Recorder::default();
    let app = App::new().diagnostics(recorder.clone()).middleware(|_, next| {
        next.advance();
        Err(anyhow!("failed after advancing"))
    });
    let app = pass(app, &log, "h1".into());

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Failed);
    assert!(log.entries().is_empty());
    assert_eq!(recorder.count(), 1);
}

#[tokio::test]
async fn error_handler_receives_the_typed_error() {
    let seen = Log::default();
    let recorder = seen.clone();
    let app = App::new()
        .middleware(|_, _| panic!("kaboom"))
        .error_middleware(move |err, _, _| {
            if let Error::Panicked(message) = &err {
                recorder.push(message.as_str());
            }
            Ok(())
        });

    let mut ctx = Context::default();
    app.run(&mut ctx).await;
    assert_eq!(seen.entries(), ["kaboom"]);
}

#[tokio::test]
async fn not_found_exhaustion_answers_404() {
    let app = App::new().exhaustion(Exhaustion::NotFound).middleware(|_, next| {
        next.advance();
        Ok(())
    });

    let mut ctx = Context::default();
    assert_eq!(app.run(&mut ctx).await, Outcome::Exhausted);
    assert_eq!(ctx.response.status(), StatusCode::NOT_FOUND);
    assert_eq!(ctx.response.body(), b"Not Found");
}

#[tokio::test]
async fn call_runs_in_the_background() {
    let app = App::new().middleware(|ctx, _| {
        let greeting = format!("{} {}", ctx.request.method(), ctx.request.path());
        ctx.response.text(greeting);
        Ok(())
    });

    let handle = app.call(Request::new(Method::PUT, "/items/7"), Response::new());
    let ctx = handle.await.unwrap();
    assert_eq!(ctx.response.body(), b"PUT /items/7");
}
