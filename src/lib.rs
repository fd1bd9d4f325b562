// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # xfetch - Request interception middleware
//!
//! Interposes a middleware pipeline in front of the two request primitives
//! an embedding host exposes: the promise-style `fetch` and the event-driven
//! `XMLHttpRequest`. Middleware can inspect and rewrite outgoing requests,
//! short-circuit them with a synthetic response, transform the parsed body
//! and observe completed responses.
//!
//! ## Features
//!
//! - Namespaces: swappable primitive slots standing in for the host's globals
//! - Fetch adapter: rewrite, short-circuit, transform, listen
//! - XMLHttpRequest adapter: buffered headers, rebound events, memoized transform
//! - Idempotent install and a stop handle that restores the original
//! - Stock middleware: auth header injection, request logging, mock responses
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xfetch::middleware::{from_fn, Intercept};
//! use xfetch::{FetchOptions, HttpClient, Namespace, Request};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ns = Arc::new(Namespace::new().with_fetch(Arc::new(HttpClient::new()?)));
//!     let stop = xfetch::start_intercepting_fetch(FetchOptions::new().namespace(ns.clone()))?;
//!
//!     xfetch::fetch::on_request(
//!         &ns,
//!         from_fn(|ctx| {
//!             println!("{} {}", ctx.request().method, ctx.url());
//!             Ok(None)
//!         }),
//!     )?;
//!
//!     let response = ns.fetch(Request::get("https://example.com")?).await?;
//!     println!("{}", response.status);
//!
//!     stop.stop();
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fetch;
pub mod http;
pub mod middleware;
pub mod namespace;
pub mod normalize;
pub mod xhr;

#[cfg(test)]
mod testing;

// Re-exports for convenience

// Errors
pub use error::{Error, Result};

// Namespace
pub use namespace::{Namespace, StopHandle};

// Fetch
pub use fetch::{start_intercepting_fetch, Fetch, FetchOptions, InterceptedFetch};

// XMLHttpRequest
pub use xhr::{start_intercepting_xhr, InterceptedXhr, XhrFactory, XhrOptions, XmlHttpRequest};

// HTTP
pub use http::{HttpClient, Request, Response};

// Normalization
pub use normalize::{DefaultNormalizer, Normalizer};

/// xfetch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
