//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use weft::{Diagnostics, Error};

/// One report received by the sink.
#[derive(Debug, Clone)]
pub struct Report {
    pub message: String,
    pub protocol_violation: bool,
    pub panicked: bool,
}

/// A diagnostic sink that remembers everything it was told.
#[derive(Clone, Default)]
pub struct Recorder {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl Recorder {
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl Diagnostics for Recorder {
    fn report(&self, error: &Error) {
        self.reports.lock().unwrap().push(Report {
            message: error.to_string(),
            protocol_violation: error.is_protocol_violation(),
            panicked: matches!(error, Error::Panicked(_)),
        });
    }
}

/// An ordered list of markers written by handlers.
#[derive(Clone, Default)]
pub struct Log {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

/// `["h0", "h1", …]` up to `n`.
pub fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("h{i}")).collect()
}
