//! Outbound response representation.
//!
//! Unlike a value returned from a handler, this response is a mutable
//! record that every handler in a run can see and write to. It is finished
//! at most once; whoever calls [`Response::end`] first wins.

use bytes::{Bytes, BytesMut};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tracing::warn;

/// Body text of the terminal fallback response.
pub const INTERNAL_SERVER_ERROR_BODY: &str = "Internal Server Error";

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for [`Response::set_content_type`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// The response being assembled by a run.
///
/// ```rust
/// use weft::{ContentType, Response};
/// use http::StatusCode;
///
/// let mut res = Response::new();
/// res.set_status(StatusCode::CREATED);
/// res.set_content_type(ContentType::Json);
/// res.end(br#"{"id":42}"#);
/// assert!(res.is_finished());
/// ```
#[derive(Debug, Default)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    finished: bool,
}

impl Response {
    /// An unfinished `200 OK` with no headers and an empty body.
    pub fn new() -> Self { Self::default() }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn is_finished(&self) -> bool { self.finished }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Replaces any existing value for `name`.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.set_header(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
    }

    /// Appends a chunk to the body. Returns `false`, leaving the body
    /// untouched, once the response has been finished.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> bool {
        if self.finished {
            warn!("write after response was finished, ignored");
            return false;
        }
        self.body.extend_from_slice(chunk.as_ref());
        true
    }

    /// Appends a final chunk and finishes the response. A second `end` is
    /// ignored and returns `false`.
    pub fn end(&mut self, chunk: impl AsRef<[u8]>) -> bool {
        if !self.write(chunk) {
            return false;
        }
        self.finished = true;
        true
    }

    /// Shortcut for a finished `text/plain` response with the current status.
    pub fn text(&mut self, body: impl AsRef<str>) -> bool {
        if self.finished {
            warn!("text after response was finished, ignored");
            return false;
        }
        self.set_content_type(ContentType::Text);
        self.end(body.as_ref())
    }

    /// Hands the assembled response to transport code.
    pub fn into_http(self) -> http::Response<Bytes> {
        let mut res = http::Response::new(self.body.freeze());
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }

    /// Terminal fallback: `500` with the canonical body. Anything written
    /// so far is discarded.
    pub(crate) fn internal_server_error(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.body.clear();
        self.status = StatusCode::INTERNAL_SERVER_ERROR;
        self.text(INTERNAL_SERVER_ERROR_BODY)
    }
}
