// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Promise-style fetch primitive and its interception adapter
//!
//! [`start_intercepting_fetch`] swaps the namespace's `fetch` for an
//! [`InterceptedFetch`] wrapping it. Callers keep issuing requests through
//! the namespace and transparently go through the middleware pipeline.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xfetch::fetch::{self, FetchOptions};
//! use xfetch::http::{HttpClient, Request};
//! use xfetch::middleware::{from_fn, Intercept};
//! use xfetch::Namespace;
//!
//! # async fn example() -> xfetch::Result<()> {
//! let ns = Arc::new(Namespace::new().with_fetch(Arc::new(HttpClient::new()?)));
//! let stop = fetch::start_intercepting_fetch(FetchOptions::new().namespace(ns.clone()))?;
//!
//! let subscription = fetch::on_request(
//!     &ns,
//!     from_fn(|_| Ok(Some(Intercept::new().parse_as("json")))),
//! )?;
//!
//! let response = ns.fetch(Request::get("https://example.com/api")?).await?;
//! println!("{}", response.status);
//!
//! subscription.unsubscribe();
//! stop.stop();
//! # Ok(())
//! # }
//! ```

mod intercepted;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::middleware::{FetchMiddleware, Subscription};
use crate::namespace::{Namespace, StopHandle};
use crate::normalize::Normalizer;

pub use intercepted::InterceptedFetch;

/// Name every fetch primitive reports unless it says otherwise
pub const FETCH_NAME: &str = "fetch";

/// A request-issuing primitive
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Issue `request` and resolve to its response
    async fn fetch(&self, request: Request) -> Result<Response>;

    /// Externally visible name; wrappers report their original's name
    fn name(&self) -> &str {
        FETCH_NAME
    }

    /// Marker capability: the interception adapter this primitive belongs to
    fn interception(&self) -> Option<&InterceptedFetch> {
        None
    }
}

/// Options for [`start_intercepting_fetch`]
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// Namespace to install into (default: [`Namespace::global`])
    pub namespace: Option<Arc<Namespace>>,
    /// Primitive to wrap (default: the namespace's current `fetch`)
    pub fetch: Option<Arc<dyn Fetch>>,
    /// URL/header normalizer (default: the namespace itself)
    pub normalizer: Option<Arc<dyn Normalizer>>,
}

impl FetchOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the namespace
    pub fn namespace(mut self, namespace: Arc<Namespace>) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Wrap `fetch` instead of the namespace's current primitive
    pub fn fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Set the normalizer
    pub fn normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }
}

/// Install the fetch interception adapter
///
/// Installing over an already intercepted primitive does not wrap it again;
/// the existing adapter's stop handle is returned instead.
pub fn start_intercepting_fetch(options: FetchOptions) -> Result<StopHandle> {
    let FetchOptions {
        namespace,
        fetch,
        normalizer,
    } = options;
    let namespace = namespace.unwrap_or_else(Namespace::global);

    let original = fetch
        .or_else(|| namespace.fetch_primitive())
        .ok_or_else(|| Error::invalid_argument("`fetch` should be a function"))?;

    if let Some(existing) = original.interception() {
        tracing::debug!("fetch is already intercepted");
        return Ok(existing.stop_handle().clone());
    }

    let normalizer = normalizer.unwrap_or_else(|| namespace.clone() as Arc<dyn Normalizer>);
    let intercepted = InterceptedFetch::new(namespace.clone(), original, normalizer);
    let stop = intercepted.stop_handle().clone();

    tracing::debug!(name = intercepted.name(), "Intercepting fetch");
    namespace.set_fetch(Arc::new(intercepted));
    Ok(stop)
}

/// Register `middleware` with the adapter installed in `namespace`
pub fn on_request(
    namespace: &Namespace,
    middleware: Arc<dyn FetchMiddleware>,
) -> Result<Subscription<dyn FetchMiddleware>> {
    let fetch = namespace
        .fetch_primitive()
        .ok_or_else(|| Error::invalid_argument("`fetch` should be a function"))?;
    let intercepted = fetch
        .interception()
        .ok_or_else(|| Error::invalid_argument("fetch is not being intercepted"))?;
    Ok(intercepted.on_request(middleware))
}
