// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Ready-made fetch middleware

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::StatusCode;

use super::intercept::{Intercept, Observed};
use super::pipeline::{FetchContext, FetchMiddleware};
use crate::error::Result;
use crate::http::{headers, Request, Response};

/// Header set on every matching request
#[derive(Debug, Clone)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Adds credentials or custom headers to outgoing requests
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use xfetch::middleware::AuthHeaderInjector;
///
/// let injector = Arc::new(
///     AuthHeaderInjector::new()
///         .bearer_token("secret")
///         .for_domains(vec!["api.example.com".to_string()]),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct AuthHeaderInjector {
    headers: Vec<HeaderEntry>,
    /// Domains to inject into (empty = all)
    domains: Vec<String>,
}

impl AuthHeaderInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bearer token
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.headers.push(HeaderEntry::new(
            headers::AUTHORIZATION,
            format!("Bearer {}", token.into()),
        ));
        self
    }

    /// Add basic auth
    pub fn basic_auth(mut self, username: &str, password: &str) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username, password));
        self.headers.push(HeaderEntry::new(
            headers::AUTHORIZATION,
            format!("Basic {}", encoded),
        ));
        self
    }

    /// Add custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderEntry::new(name, value));
        self
    }

    /// Restrict to specific domains
    pub fn for_domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }

    fn applies_to(&self, ctx: &FetchContext<'_>) -> bool {
        if self.domains.is_empty() {
            return true;
        }
        ctx.url()
            .host_str()
            .map(|host| self.domains.iter().any(|d| host.contains(d.as_str())))
            .unwrap_or(false)
    }

    fn inject(&self, request: &Request) -> Request {
        let mut request = request.clone();
        for header in &self.headers {
            match (
                header.name.parse::<HeaderName>(),
                header.value.parse::<HeaderValue>(),
            ) {
                (Ok(name), Ok(value)) => {
                    request.headers.insert(name, value);
                }
                _ => tracing::warn!(header = %header.name, "Skipping malformed header"),
            }
        }
        request
    }
}

#[async_trait]
impl FetchMiddleware for AuthHeaderInjector {
    async fn handle(&self, ctx: &FetchContext<'_>) -> Result<Option<Intercept>> {
        if self.headers.is_empty() || !self.applies_to(ctx) {
            return Ok(None);
        }
        Ok(Some(Intercept::new().request(self.inject(ctx.request()))))
    }
}

/// Logs every request and the status of its response
#[derive(Debug, Clone, Default)]
pub struct RequestLogger {
    /// Log request bodies
    pub log_bodies: bool,
    /// Filter by URL substring
    pub url_filter: Option<String>,
}

impl RequestLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_bodies(mut self, enabled: bool) -> Self {
        self.log_bodies = enabled;
        self
    }

    pub fn url_filter(mut self, filter: impl Into<String>) -> Self {
        self.url_filter = Some(filter.into());
        self
    }
}

#[async_trait]
impl FetchMiddleware for RequestLogger {
    async fn handle(&self, ctx: &FetchContext<'_>) -> Result<Option<Intercept>> {
        let url = ctx.url().clone();
        if let Some(ref filter) = self.url_filter {
            if !url.as_str().contains(filter.as_str()) {
                return Ok(None);
            }
        }

        let request = ctx.request();
        tracing::info!(method = %request.method, url = %url, "Request");
        if self.log_bodies {
            if let Some(ref body) = request.body {
                tracing::debug!(body = ?String::from_utf8_lossy(body), "Request body");
            }
        }

        Ok(Some(Intercept::new().listen(move |observed| {
            match observed {
                Observed::Raw(response) => {
                    tracing::info!(url = %url, status = %response.status, "Response");
                }
                Observed::Parsed(_) => {
                    tracing::info!(url = %url, "Response parsed");
                }
            }
            Ok(())
        })))
    }
}

/// Answers requests under a URL prefix without touching the network
#[derive(Debug, Clone)]
pub struct MockResponder {
    prefix: String,
    status: StatusCode,
    content_type: Option<String>,
    body: bytes::Bytes,
}

impl MockResponder {
    /// Respond `200` with `body` for every URL starting with `prefix`
    pub fn new(prefix: impl Into<String>, body: impl Into<bytes::Bytes>) -> Self {
        Self {
            prefix: prefix.into(),
            status: StatusCode::OK,
            content_type: None,
            body: body.into(),
        }
    }

    /// Respond with a JSON document
    pub fn json(prefix: impl Into<String>, value: &serde_json::Value) -> Result<Self> {
        Ok(Self::new(prefix, serde_json::to_vec(value)?).content_type("application/json"))
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn respond(&self, ctx: &FetchContext<'_>) -> Response {
        let mut response = Response::new(self.status, Default::default(), self.body.clone())
            .with_url(ctx.url().clone());
        if let Some(ref content_type) = self.content_type {
            response = response.with_header(headers::CONTENT_TYPE, content_type);
        }
        response
    }
}

#[async_trait]
impl FetchMiddleware for MockResponder {
    async fn handle(&self, ctx: &FetchContext<'_>) -> Result<Option<Intercept>> {
        if !ctx.url().as_str().starts_with(&self.prefix) {
            return Ok(None);
        }
        tracing::debug!(url = %ctx.url(), "Serving mocked response");
        Ok(Some(Intercept::new().respond_with(self.respond(ctx))))
    }
}
