// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Test doubles shared by the unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;
use crate::fetch::Fetch;
use crate::http::{Request, Response};

type Responder = Arc<dyn Fn(&Request) -> Result<Response> + Send + Sync>;

/// Fetch primitive that records requests and answers from a closure
pub struct MockFetch {
    responder: Responder,
    calls: AtomicUsize,
    requests: Mutex<Vec<Request>>,
}

impl MockFetch {
    /// Answer every request with `f`
    pub fn with<F>(f: F) -> Self
    where
        F: Fn(&Request) -> Result<Response> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(f),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with a text body
    pub fn text(body: &'static str) -> Self {
        Self::with(move |_| Ok(Response::text_body(body)))
    }

    /// Answer every request with a JSON body
    pub fn json(value: Value) -> Self {
        Self::with(move |_| Response::json_body(&value))
    }

    /// Number of requests issued
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests issued so far
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Most recent request
    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Fetch for MockFetch {
    async fn fetch(&self, request: Request) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = (self.responder)(&request);
        self.requests.lock().push(request);
        response
    }
}

/// Route test logs through the test writer; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
