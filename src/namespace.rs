// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Namespaces hold the currently installed request primitives
//!
//! A namespace plays the role of the host's global object: it owns one
//! `fetch` slot, one `XMLHttpRequest` slot and the host location used to
//! resolve relative URLs. Adapters swap the primitive in a slot for their
//! wrapped version and put the original back on stop. Callers always issue
//! requests through the namespace, so they never notice the swap.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use reqwest::header::HeaderMap;
use url::Url;

use crate::error::{Error, Result};
use crate::fetch::Fetch;
use crate::http::{Request, Response};
use crate::normalize::{DefaultNormalizer, Normalizer};
use crate::xhr::{XhrFactory, XmlHttpRequest};

lazy_static! {
    static ref GLOBAL: Arc<Namespace> = Arc::new(Namespace::new());
}

/// Slots for the interceptable primitives
#[derive(Default)]
pub struct Namespace {
    fetch: RwLock<Option<Arc<dyn Fetch>>>,
    xhr: RwLock<Option<Arc<dyn XhrFactory>>>,
    location: RwLock<Option<Url>>,
}

impl Namespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide namespace used when none is supplied
    pub fn global() -> Arc<Namespace> {
        GLOBAL.clone()
    }

    /// Seed the fetch slot
    pub fn with_fetch(self, fetch: Arc<dyn Fetch>) -> Self {
        *self.fetch.write() = Some(fetch);
        self
    }

    /// Seed the XMLHttpRequest slot
    pub fn with_xhr(self, factory: Arc<dyn XhrFactory>) -> Self {
        *self.xhr.write() = Some(factory);
        self
    }

    /// Set the host location
    pub fn with_location(self, location: Url) -> Self {
        *self.location.write() = Some(location);
        self
    }

    /// Get the currently installed fetch primitive
    pub fn fetch_primitive(&self) -> Option<Arc<dyn Fetch>> {
        self.fetch.read().clone()
    }

    /// Replace the fetch primitive
    pub fn set_fetch(&self, fetch: Arc<dyn Fetch>) {
        *self.fetch.write() = Some(fetch);
    }

    /// Get the currently installed XMLHttpRequest constructor
    pub fn xhr_factory(&self) -> Option<Arc<dyn XhrFactory>> {
        self.xhr.read().clone()
    }

    /// Replace the XMLHttpRequest constructor
    pub fn set_xhr(&self, factory: Arc<dyn XhrFactory>) {
        *self.xhr.write() = Some(factory);
    }

    /// Get the host location
    pub fn location(&self) -> Option<Url> {
        self.location.read().clone()
    }

    /// Set the host location
    pub fn set_location(&self, location: Url) {
        *self.location.write() = Some(location);
    }

    /// Normalizer resolving against this namespace's location
    pub fn normalizer(&self) -> DefaultNormalizer {
        match self.location() {
            Some(base) => DefaultNormalizer::with_base(base),
            None => DefaultNormalizer::new(),
        }
    }

    /// Issue a request through whatever fetch is installed right now
    pub async fn fetch(&self, request: Request) -> Result<Response> {
        let fetch = self
            .fetch_primitive()
            .ok_or_else(|| Error::invalid_argument("namespace has no `fetch` installed"))?;
        fetch.fetch(request).await
    }

    /// Construct a request object through whatever XMLHttpRequest is installed
    pub fn new_xhr(&self) -> Result<Box<dyn XmlHttpRequest>> {
        let factory = self.xhr_factory().ok_or_else(|| {
            Error::invalid_argument("namespace has no `XMLHttpRequest` installed")
        })?;
        Ok(factory.create())
    }
}

/// Resolves against the location current at call time
impl Normalizer for Namespace {
    fn resolve_absolute_url(&self, url: &str) -> Result<Url> {
        self.normalizer().resolve_absolute_url(url)
    }

    fn parse_header_pairs(&self, headers: &HeaderMap) -> HashMap<String, String> {
        self.normalizer().parse_header_pairs(headers)
    }
}

/// Primitive an adapter replaced, kept so it can be put back
#[derive(Clone)]
pub(crate) enum Original {
    Fetch(Arc<dyn Fetch>),
    Xhr(Arc<dyn XhrFactory>),
}

/// Restores the original primitive into its namespace
///
/// Stopping does not touch the wrapper's registry: the wrapper simply stops
/// being reachable through the namespace. Installing again creates a new
/// wrapper with an empty registry.
#[derive(Clone)]
pub struct StopHandle {
    namespace: Arc<Namespace>,
    original: Original,
}

impl StopHandle {
    pub(crate) fn new(namespace: Arc<Namespace>, original: Original) -> Self {
        Self {
            namespace,
            original,
        }
    }

    /// Put the original primitive back
    pub fn stop(&self) {
        match &self.original {
            Original::Fetch(fetch) => {
                tracing::debug!(name = fetch.name(), "Restoring original fetch");
                self.namespace.set_fetch(fetch.clone());
            }
            Original::Xhr(factory) => {
                tracing::debug!(name = factory.name(), "Restoring original XMLHttpRequest");
                self.namespace.set_xhr(factory.clone());
            }
        }
    }

    /// Namespace this handle restores into
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (slot, name) = match &self.original {
            Original::Fetch(fetch) => ("fetch", fetch.name()),
            Original::Xhr(factory) => ("XMLHttpRequest", factory.name()),
        };
        f.debug_struct("StopHandle")
            .field("slot", &slot)
            .field("original", &name)
            .finish()
    }
}
