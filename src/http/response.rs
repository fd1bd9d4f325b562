// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP response types
//!
//! A `Response` owns one read handle over its body. Reading through the
//! handle (`text`, `json`, `bytes`) consumes it; every further consumer must
//! call [`Response::duplicate`] before the body is read and use its own
//! handle. Duplicates share the underlying buffer.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};

/// Single-read handle over a response body
#[derive(Debug)]
struct Body {
    data: Bytes,
    used: AtomicBool,
}

impl Body {
    fn new(data: Bytes) -> Self {
        Self {
            data,
            used: AtomicBool::new(false),
        }
    }

    fn take(&self) -> Result<Bytes> {
        if self.used.swap(true, Ordering::AcqRel) {
            return Err(Error::BodyConsumed);
        }
        Ok(self.data.clone())
    }

    fn is_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }
}

/// HTTP response representation
#[derive(Debug)]
pub struct Response {
    /// Response status code
    pub status: StatusCode,
    /// Response status text
    pub status_text: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Final URL (after redirects); synthetic responses have none
    pub url: Option<Url>,
    /// Whether this was a redirect
    pub redirected: bool,
    body: Body,
}

impl Response {
    /// Create a new response
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            url: None,
            redirected: false,
            body: Body::new(body.into()),
        }
    }

    /// Create a 200 response with a text body
    pub fn text_body(body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self::new(StatusCode::OK, headers, body.into())
    }

    /// Create a 200 response with a JSON body
    pub fn json_body(value: &serde_json::Value) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        Ok(Self::new(StatusCode::OK, headers, serde_json::to_vec(value)?))
    }

    /// Set the final URL
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Set the status text
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// Set a header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Mark the response as redirected
    pub fn with_redirected(mut self, redirected: bool) -> Self {
        self.redirected = redirected;
        self
    }

    /// Produce an independent read handle over the same body
    ///
    /// Fails once this handle has been read, mirroring the fetch rule that a
    /// used body can no longer be cloned.
    pub fn duplicate(&self) -> Result<Response> {
        if self.body.is_used() {
            return Err(Error::BodyConsumed);
        }
        Ok(Self {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            url: self.url.clone(),
            redirected: self.redirected,
            body: Body::new(self.body.data.clone()),
        })
    }

    /// Build a response with a new body and this response's metadata
    ///
    /// `content-length` is dropped since it described the old body.
    pub fn with_replaced_body(&self, body: impl Into<Bytes>) -> Response {
        let mut headers = self.headers.clone();
        headers.remove("content-length");
        Self {
            status: self.status,
            status_text: self.status_text.clone(),
            headers,
            url: self.url.clone(),
            redirected: self.redirected,
            body: Body::new(body.into()),
        }
    }

    /// Whether this handle's body has been read
    pub fn body_used(&self) -> bool {
        self.body.is_used()
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get status code as u16
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Read the body as raw bytes
    pub fn bytes(&self) -> Result<Bytes> {
        self.body.take()
    }

    /// Read the body as text; invalid UTF-8 is replaced with U+FFFD
    pub fn text(&self) -> Result<String> {
        let bytes = self.body.take()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = self.body.take()?;
        serde_json::from_slice(&bytes).map_err(Error::from)
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get content type
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Check if content type is JSON
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false)
    }

    /// Get content length
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }
}
