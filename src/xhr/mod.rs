// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Event-driven XMLHttpRequest primitive and its interception adapter
//!
//! The primitive is modelled as a fixed capability set: a read-only
//! [`XhrState`] view plus the mutating [`XmlHttpRequest`] operations.
//! [`start_intercepting_xhr`] wraps the namespace's [`XhrFactory`] so that
//! every instance it creates is a [`ProxiedXhr`] around a real one.

mod backend;
mod proxy;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::namespace::{Namespace, StopHandle};
use crate::normalize::Normalizer;
use crate::middleware::Subscription;

pub use backend::{FetchXhr, FetchXhrFactory};
pub use proxy::{
    from_fn, InterceptedXhr, ProxiedXhr, ProxyPhase, XhrContext, XhrIntercept, XhrListener,
    XhrMiddleware,
};

/// Name every XMLHttpRequest constructor reports unless it says otherwise
pub const XHR_NAME: &str = "XMLHttpRequest";

/// Request lifecycle as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

/// How the response body is exposed through [`XhrState::response`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Text, same as `Text`
    #[default]
    Default,
    Text,
    Json,
}

impl ResponseType {
    /// Look up a response type by its attribute value
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "" => Some(ResponseType::Default),
            "text" => Some(ResponseType::Text),
            "json" => Some(ResponseType::Json),
            _ => None,
        }
    }

    /// Whether `response_text` is readable for this type
    pub fn is_textual(&self) -> bool {
        matches!(self, ResponseType::Default | ResponseType::Text)
    }
}

/// Events a request object dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XhrEvent {
    ReadyStateChange,
    LoadStart,
    Progress,
    Load,
    Error,
    Timeout,
    Abort,
    LoadEnd,
}

impl XhrEvent {
    /// Every event, in no particular order
    pub const ALL: [XhrEvent; 8] = [
        XhrEvent::ReadyStateChange,
        XhrEvent::LoadStart,
        XhrEvent::Progress,
        XhrEvent::Load,
        XhrEvent::Error,
        XhrEvent::Timeout,
        XhrEvent::Abort,
        XhrEvent::LoadEnd,
    ];
}

/// Event callback; receives the object the handler was registered on
pub type XhrCallback = Arc<dyn Fn(&dyn XhrState) + Send + Sync>;

/// Arguments to [`XmlHttpRequest::open`] beyond method and URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Asynchronous request (default `true`)
    pub is_async: bool,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            is_async: true,
            user: None,
            password: None,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous request
    pub fn sync() -> Self {
        Self {
            is_async: false,
            ..Self::default()
        }
    }

    /// Credentials for basic auth
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }
}

/// Read-only state of a request object
pub trait XhrState: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    /// HTTP status, `0` until headers arrive or after a network error
    fn status(&self) -> u16;

    fn status_text(&self) -> String;

    /// Response body as exposed for the current response type
    fn response(&self) -> Value;

    /// Response text; `None` for non-textual response types
    fn response_text(&self) -> Option<String>;

    fn response_type(&self) -> ResponseType;

    fn response_url(&self) -> Option<Url>;

    fn get_response_header(&self, name: &str) -> Option<String>;

    /// All response headers, one `name: value` per CRLF-terminated line
    fn get_all_response_headers(&self) -> String;

    fn timeout(&self) -> Option<Duration>;

    fn with_credentials(&self) -> bool;
}

/// Stateful, event-driven request object
#[async_trait]
pub trait XmlHttpRequest: XhrState {
    /// Initialize a request; resets any request in progress
    fn open(&self, method: &str, url: &str, options: OpenOptions) -> Result<()>;

    /// Add a request header; repeated names are combined
    fn set_request_header(&self, name: &str, value: &str) -> Result<()>;

    /// Issue the request and resolve once it has completed, failed or been aborted
    async fn send(&self, body: Option<Bytes>) -> Result<()>;

    /// Cancel the request
    fn abort(&self);

    fn set_timeout(&self, timeout: Option<Duration>);

    fn set_with_credentials(&self, with_credentials: bool) -> Result<()>;

    fn set_response_type(&self, response_type: ResponseType) -> Result<()>;

    fn override_mime_type(&self, mime: &str) -> Result<()>;

    /// Set or clear the `on<event>` handler
    fn set_handler(&self, event: XhrEvent, handler: Option<XhrCallback>);

    fn handler(&self, event: XhrEvent) -> Option<XhrCallback>;

    /// Add a listener; runs after the `on<event>` handler
    fn add_event_listener(&self, event: XhrEvent, listener: XhrCallback);
}

/// Constructor for request objects
pub trait XhrFactory: Send + Sync {
    /// Create a fresh request object
    fn create(&self) -> Box<dyn XmlHttpRequest>;

    /// Externally visible name; wrappers report their original's name
    fn name(&self) -> &str {
        XHR_NAME
    }

    /// Marker capability: the interception adapter this constructor belongs to
    fn interception(&self) -> Option<&InterceptedXhr> {
        None
    }
}

/// Options for [`start_intercepting_xhr`]
#[derive(Clone, Default)]
pub struct XhrOptions {
    /// Namespace to install into (default: [`Namespace::global`])
    pub namespace: Option<Arc<Namespace>>,
    /// Constructor to wrap (default: the namespace's current one)
    pub xhr: Option<Arc<dyn XhrFactory>>,
    /// URL/header normalizer (default: the namespace itself)
    pub normalizer: Option<Arc<dyn Normalizer>>,
}

impl XhrOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: Arc<Namespace>) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Wrap `xhr` instead of the namespace's current constructor
    pub fn xhr(mut self, xhr: Arc<dyn XhrFactory>) -> Self {
        self.xhr = Some(xhr);
        self
    }

    pub fn normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }
}

/// Install the XMLHttpRequest interception adapter
///
/// Installing over an already intercepted constructor returns the existing
/// adapter's stop handle.
pub fn start_intercepting_xhr(options: XhrOptions) -> Result<StopHandle> {
    let XhrOptions {
        namespace,
        xhr,
        normalizer,
    } = options;
    let namespace = namespace.unwrap_or_else(Namespace::global);

    let original = xhr
        .or_else(|| namespace.xhr_factory())
        .ok_or_else(|| Error::invalid_argument("`XMLHttpRequest` should be a function"))?;

    if let Some(existing) = original.interception() {
        tracing::debug!("XMLHttpRequest is already intercepted");
        return Ok(existing.stop_handle().clone());
    }

    let normalizer = normalizer.unwrap_or_else(|| namespace.clone() as Arc<dyn Normalizer>);
    let intercepted = InterceptedXhr::new(namespace.clone(), original, normalizer);
    let stop = intercepted.stop_handle().clone();

    tracing::debug!(name = intercepted.name(), "Intercepting XMLHttpRequest");
    namespace.set_xhr(Arc::new(intercepted));
    Ok(stop)
}

/// Register `middleware` with the adapter installed in `namespace`
pub fn on_request(
    namespace: &Namespace,
    middleware: Arc<dyn XhrMiddleware>,
) -> Result<Subscription<dyn XhrMiddleware>> {
    let factory = namespace
        .xhr_factory()
        .ok_or_else(|| Error::invalid_argument("`XMLHttpRequest` should be a function"))?;
    let intercepted = factory
        .interception()
        .ok_or_else(|| Error::invalid_argument("XMLHttpRequest is not being intercepted"))?;
    Ok(intercepted.on_request(middleware))
}

/// Format headers the way `getAllResponseHeaders` does
pub(crate) fn format_header_block(headers: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = headers.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| format!("{}: {}\r\n", name, headers[name]))
        .collect()
}
