// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Interception outcomes and how they combine
//!
//! Each middleware may return an [`Intercept`]. The pipeline folds them into
//! one [`Interception`] with two separate reducers:
//!
//! - overwrite (last write wins): `request`, `response`, `as`
//! - accumulate (append, in order): `transform_response`, `listen`
//!
//! A transformer is only kept when the same intercept also names a parse
//! strategy, since there is nothing to transform without a decoded body.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::finalize::Finalization;
use crate::http::{Request, Response};

/// Response transformer, applied as a left-to-right fold over the decoded body
pub type Transformer = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// Post-delivery listener
///
/// An `Err` is logged and never reaches the caller. Panics are caught only
/// in builds that unwind; the release profile aborts on panic.
pub type Listener = Arc<dyn Fn(Observed) -> anyhow::Result<()> + Send + Sync>;

/// What a listener receives
#[derive(Debug)]
pub enum Observed {
    /// An independent read handle over the delivered response (no `as`)
    Raw(Response),
    /// The delivered body decoded through the selected parse strategy
    Parsed(Value),
}

impl Observed {
    /// The decoded value, if a parse strategy was applied
    pub fn value(&self) -> Option<&Value> {
        match self {
            Observed::Parsed(value) => Some(value),
            Observed::Raw(_) => None,
        }
    }

    /// The raw read handle, if no parse strategy was applied
    pub fn response(&self) -> Option<&Response> {
        match self {
            Observed::Raw(response) => Some(response),
            Observed::Parsed(_) => None,
        }
    }
}

/// What one middleware contributes to a request
#[derive(Default)]
pub struct Intercept {
    /// Replacement request
    pub request: Option<Request>,
    /// Short-circuit response; the real request is not issued
    pub response: Option<Response>,
    /// Parse strategy name (`"json"`, `"text"`)
    pub parse_as: Option<String>,
    /// Transformer for the decoded body
    pub transform_response: Option<Transformer>,
    /// Listener notified after delivery
    pub listen: Option<Listener>,
}

impl Intercept {
    /// Create an empty intercept
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the request
    pub fn request(mut self, request: Request) -> Self {
        self.request = Some(request);
        self
    }

    /// Answer with `response` instead of issuing the request
    pub fn respond_with(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    /// Select the parse strategy
    pub fn parse_as(mut self, strategy: impl Into<String>) -> Self {
        self.parse_as = Some(strategy.into());
        self
    }

    /// Add a transformer
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.transform_response = Some(Arc::new(transform));
        self
    }

    /// Add a listener
    pub fn listen<F>(mut self, listener: F) -> Self
    where
        F: Fn(Observed) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.listen = Some(Arc::new(listener));
        self
    }
}

impl fmt::Debug for Intercept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intercept")
            .field("request", &self.request.as_ref().map(|r| r.url.as_str()))
            .field("response", &self.response.as_ref().map(|r| r.status))
            .field("parse_as", &self.parse_as)
            .field("transform_response", &self.transform_response.is_some())
            .field("listen", &self.listen.is_some())
            .finish()
    }
}

/// Accumulated outcome of one pipeline run
pub struct Interception {
    request: Request,
    response: Option<Response>,
    parse_as: Option<String>,
    transformers: Vec<Transformer>,
    listeners: Vec<Listener>,
}

impl Interception {
    /// Start from the caller's request
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
            parse_as: None,
            transformers: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Current request
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Recorded short-circuit response
    pub fn short_circuit(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Selected parse strategy name
    pub fn parse_as(&self) -> Option<&str> {
        self.parse_as.as_deref()
    }

    /// Number of accumulated transformers
    pub fn transformer_count(&self) -> usize {
        self.transformers.len()
    }

    /// Number of accumulated listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Fold one intercept in; returns whether the request was replaced
    pub fn absorb(&mut self, intercept: Intercept) -> bool {
        let Intercept {
            request,
            response,
            parse_as,
            transform_response,
            listen,
        } = intercept;

        self.accumulate(parse_as.is_some(), transform_response, listen);
        self.overwrite(request, response, parse_as)
    }

    fn overwrite(
        &mut self,
        request: Option<Request>,
        response: Option<Response>,
        parse_as: Option<String>,
    ) -> bool {
        if let Some(response) = response {
            if self.response.is_some() {
                tracing::debug!("Short-circuit response replaced by a later middleware");
            }
            self.response = Some(response);
        }
        if let Some(parse_as) = parse_as {
            self.parse_as = Some(parse_as);
        }
        match request {
            Some(request) => {
                self.request = request;
                true
            }
            None => false,
        }
    }

    fn accumulate(
        &mut self,
        carries_parse_as: bool,
        transform: Option<Transformer>,
        listen: Option<Listener>,
    ) {
        if let Some(listener) = listen {
            self.listeners.push(listener);
        }
        match transform {
            Some(transform) if carries_parse_as => self.transformers.push(transform),
            Some(_) => tracing::debug!("transform_response ignored: intercept has no parse strategy"),
            None => {}
        }
    }

    /// Split into the request to issue, the short-circuit response and the
    /// finalization plan
    pub fn into_parts(self) -> (Request, Option<Response>, Finalization) {
        let finalization = Finalization::new(self.parse_as, self.transformers, self.listeners);
        (self.request, self.response, finalization)
    }
}
