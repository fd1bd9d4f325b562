// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Intercepting XMLHttpRequest proxy
//!
//! A [`ProxiedXhr`] owns a real request object and forwards everything to
//! it except three things: request headers are buffered until `send`, the
//! middleware chain runs between `send` and the real request being opened,
//! and event handlers are rebound so they observe the proxy (and therefore
//! the transformed response) instead of the inner object.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

use super::{
    OpenOptions, ReadyState, ResponseType, XhrCallback, XhrEvent, XhrFactory, XhrState,
    XmlHttpRequest,
};
use crate::error::{Error, Result};
use crate::middleware::{fold, Registry, Subscription, Transformer};
use crate::namespace::{Namespace, Original, StopHandle};
use crate::normalize::Normalizer;

/// Completion listener; receives the proxy
///
/// Errors are logged, not returned. Panics are caught only in builds that
/// unwind; the release profile aborts on panic.
pub type XhrListener = Arc<dyn Fn(&dyn XhrState) -> anyhow::Result<()> + Send + Sync>;

/// XMLHttpRequest middleware - sees every asynchronous send
#[async_trait]
pub trait XhrMiddleware: Send + Sync {
    /// Inspect the request and optionally rewrite it
    async fn handle(&self, ctx: &XhrContext<'_>) -> Result<Option<XhrIntercept>>;
}

/// Wrap a synchronous closure as XMLHttpRequest middleware
pub fn from_fn<F>(f: F) -> Arc<dyn XhrMiddleware>
where
    F: Fn(&XhrContext<'_>) -> Result<Option<XhrIntercept>> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware(f))
}

struct FnMiddleware<F>(F);

#[async_trait]
impl<F> XhrMiddleware for FnMiddleware<F>
where
    F: Fn(&XhrContext<'_>) -> Result<Option<XhrIntercept>> + Send + Sync + 'static,
{
    async fn handle(&self, ctx: &XhrContext<'_>) -> Result<Option<XhrIntercept>> {
        (self.0)(ctx)
    }
}

/// What one middleware contributes to a send
#[derive(Default)]
pub struct XhrIntercept {
    pub method: Option<String>,
    pub url: Option<Url>,
    /// Replacement body; `Some(None)` clears it
    pub body: Option<Option<Bytes>>,
    /// Replacement header set
    pub headers: Option<HeaderMap>,
    pub transform_response: Option<Transformer>,
    pub listen: Option<XhrListener>,
}

impl XhrIntercept {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(Some(body.into()));
        self
    }

    /// Send without a body
    pub fn no_body(mut self) -> Self {
        self.body = Some(None);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Add a transformer for the completed response value
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.transform_response = Some(Arc::new(transform));
        self
    }

    /// Add a completion listener
    pub fn listen<F>(mut self, listener: F) -> Self
    where
        F: Fn(&dyn XhrState) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.listen = Some(Arc::new(listener));
        self
    }
}

/// Request tuple the middleware chain works on
#[derive(Debug, Clone)]
struct Outgoing {
    method: String,
    url: Url,
    body: Option<Bytes>,
    headers: HeaderMap,
}

/// Read-only view a middleware gets of a send
pub struct XhrContext<'a> {
    outgoing: &'a Outgoing,
    parsed: &'a OnceLock<HashMap<String, String>>,
    normalizer: &'a dyn Normalizer,
}

impl<'a> XhrContext<'a> {
    pub fn method(&self) -> &'a str {
        &self.outgoing.method
    }

    pub fn url(&self) -> &'a Url {
        &self.outgoing.url
    }

    pub fn body(&self) -> Option<&'a Bytes> {
        self.outgoing.body.as_ref()
    }

    /// Buffered headers as set with `set_request_header`
    pub fn raw_headers(&self) -> &'a HeaderMap {
        &self.outgoing.headers
    }

    /// Buffered headers as a plain mapping, parsed once per header set
    pub fn headers(&self) -> &'a HashMap<String, String> {
        self.parsed
            .get_or_init(|| self.normalizer.parse_header_pairs(&self.outgoing.headers))
    }
}

/// Accumulated outcome of one chain run
struct Rewrite {
    outgoing: Outgoing,
    transformers: Vec<Transformer>,
    listeners: Vec<XhrListener>,
}

impl Rewrite {
    /// Fold one intercept in; returns whether the headers were replaced
    fn absorb(&mut self, intercept: XhrIntercept) -> bool {
        let XhrIntercept {
            method,
            url,
            body,
            headers,
            transform_response,
            listen,
        } = intercept;

        if let Some(transform) = transform_response {
            self.transformers.push(transform);
        }
        if let Some(listener) = listen {
            self.listeners.push(listener);
        }

        if let Some(method) = method {
            self.outgoing.method = method;
        }
        if let Some(url) = url {
            self.outgoing.url = url;
        }
        if let Some(body) = body {
            self.outgoing.body = body;
        }
        match headers {
            Some(headers) => {
                self.outgoing.headers = headers;
                true
            }
            None => false,
        }
    }
}

async fn run_chain(
    middlewares: &[Arc<dyn XhrMiddleware>],
    outgoing: Outgoing,
    normalizer: &dyn Normalizer,
) -> Result<Rewrite> {
    let mut rewrite = Rewrite {
        outgoing,
        transformers: Vec::new(),
        listeners: Vec::new(),
    };
    let mut parsed = OnceLock::new();

    for middleware in middlewares {
        let intercept = {
            let ctx = XhrContext {
                outgoing: &rewrite.outgoing,
                parsed: &parsed,
                normalizer,
            };
            middleware.handle(&ctx).await?
        };
        if let Some(intercept) = intercept {
            if rewrite.absorb(intercept) {
                parsed = OnceLock::new();
            }
        }
    }
    Ok(rewrite)
}

/// Lifecycle of a proxied request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyPhase {
    Unopened,
    Opened,
    Sending,
    MiddlewareRunning,
    Sent,
    Completed,
    Aborted,
}

/// What `open` recorded
struct Pending {
    phase: ProxyPhase,
    method: String,
    url: Option<Url>,
    options: OpenOptions,
    headers: HeaderMap,
}

/// Memoized transformer result for one completion
enum Memo {
    Pending,
    Ready(Value),
    Failed,
}

struct Completion {
    transformers: Vec<Transformer>,
    listeners: Vec<XhrListener>,
    memo: Memo,
    error: Option<Error>,
}

impl Completion {
    fn new() -> Self {
        Self {
            transformers: Vec::new(),
            listeners: Vec::new(),
            memo: Memo::Pending,
            error: None,
        }
    }
}

struct Shared {
    inner: Box<dyn XmlHttpRequest>,
    registry: Arc<Registry<dyn XhrMiddleware>>,
    normalizer: Arc<dyn Normalizer>,
    pending: Mutex<Pending>,
    completion: Mutex<Completion>,
    handlers: Mutex<HashMap<XhrEvent, XhrCallback>>,
    listeners: Mutex<HashMap<XhrEvent, Vec<XhrCallback>>>,
    /// Set while the inner object is re-opened at send time
    reopening: AtomicBool,
}

impl Shared {
    fn phase(&self) -> ProxyPhase {
        self.pending.lock().phase
    }

    /// Move from `from` to `to`; returns whether the phase was `from`
    fn advance(&self, from: ProxyPhase, to: ProxyPhase) -> bool {
        let mut pending = self.pending.lock();
        if pending.phase != from {
            return false;
        }
        pending.phase = to;
        true
    }

    fn is_async(&self) -> bool {
        self.pending.lock().options.is_async
    }

    fn on_inner_event(&self, event: XhrEvent) {
        if self.reopening.load(Ordering::Acquire) {
            return;
        }
        if event == XhrEvent::ReadyStateChange
            && self.inner.ready_state() == ReadyState::Done
            && self.is_async()
            && self.advance(ProxyPhase::Sent, ProxyPhase::Completed)
        {
            self.complete();
        }
        self.dispatch(event);
    }

    fn dispatch(&self, event: XhrEvent) {
        let handler = self.handlers.lock().get(&event).cloned();
        let listeners = self.listeners.lock().get(&event).cloned().unwrap_or_default();

        let view: &dyn XhrState = self;
        if let Some(handler) = handler {
            handler(view);
        }
        for listener in listeners {
            listener(view);
        }
    }

    /// Run the transformer fold once and notify completion listeners
    fn complete(&self) {
        self.transformed();

        let listeners = self.completion.lock().listeners.clone();
        let view: &dyn XhrState = self;
        for (index, listener) in listeners.iter().enumerate() {
            let reason = match catch_unwind(AssertUnwindSafe(|| listener(view))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(_) => "listener panicked".to_string(),
            };
            let err = Error::Listener { index, reason };
            tracing::warn!(error = %err, "XMLHttpRequest listener failed");
        }
    }

    /// Transformed response value, computed at most once per completion
    fn transformed(&self) -> Option<Value> {
        let mut completion = self.completion.lock();
        match completion.memo {
            Memo::Ready(ref value) => return Some(value.clone()),
            Memo::Failed => return None,
            Memo::Pending => {}
        }
        // Nothing to transform after a network error, timeout or abort.
        if completion.transformers.is_empty() || self.inner.status() == 0 {
            return None;
        }

        match fold(&completion.transformers, self.inner.response()) {
            Ok(value) => {
                completion.memo = Memo::Ready(value.clone());
                Some(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, "XMLHttpRequest response transform failed");
                completion.memo = Memo::Failed;
                completion.error = Some(e);
                None
            }
        }
    }

    fn apply_headers(&self, headers: &HeaderMap) -> Result<()> {
        for (name, value) in headers.iter() {
            let value = value.to_str().map_err(|_| {
                Error::invalid_argument(format!("header `{}` is not valid text", name))
            })?;
            self.inner.set_request_header(name.as_str(), value)?;
        }
        Ok(())
    }

    fn reopen(&self, method: &str, url: &Url, options: OpenOptions) -> Result<()> {
        self.reopening.store(true, Ordering::Release);
        let result = self.inner.open(method, url.as_str(), options);
        self.reopening.store(false, Ordering::Release);
        result
    }

    async fn send(&self, body: Option<Bytes>) -> Result<()> {
        let (outgoing, options) = {
            let mut pending = self.pending.lock();
            if pending.phase != ProxyPhase::Opened {
                return Err(Error::invalid_state("send", pending.phase));
            }
            let url = pending
                .url
                .clone()
                .ok_or_else(|| Error::invalid_state("send", pending.phase))?;
            pending.phase = ProxyPhase::Sending;
            let outgoing = Outgoing {
                method: pending.method.clone(),
                url,
                body,
                headers: pending.headers.clone(),
            };
            (outgoing, pending.options.clone())
        };

        if !options.is_async {
            tracing::debug!(url = %outgoing.url, "Synchronous XMLHttpRequest bypasses middleware");
            self.apply_headers(&outgoing.headers)?;
            self.advance(ProxyPhase::Sending, ProxyPhase::Sent);
            let result = self.inner.send(outgoing.body).await;
            self.advance(ProxyPhase::Sent, ProxyPhase::Completed);
            return result;
        }

        self.advance(ProxyPhase::Sending, ProxyPhase::MiddlewareRunning);
        let middlewares = self.registry.snapshot();
        let rewrite = match run_chain(&middlewares, outgoing, self.normalizer.as_ref()).await {
            Ok(rewrite) => rewrite,
            Err(e) => {
                self.advance(ProxyPhase::MiddlewareRunning, ProxyPhase::Opened);
                return Err(e);
            }
        };

        if self.phase() == ProxyPhase::Aborted {
            tracing::debug!("XMLHttpRequest aborted while middleware ran");
            return Ok(());
        }

        let Rewrite {
            outgoing,
            transformers,
            listeners,
        } = rewrite;
        self.reopen(&outgoing.method, &outgoing.url, options)?;
        self.apply_headers(&outgoing.headers)?;
        {
            let mut completion = self.completion.lock();
            completion.transformers = transformers;
            completion.listeners = listeners;
        }

        if !self.advance(ProxyPhase::MiddlewareRunning, ProxyPhase::Sent) {
            return Ok(());
        }
        self.inner.send(outgoing.body).await?;
        self.advance(ProxyPhase::Sent, ProxyPhase::Completed);

        match self.completion.lock().error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn abort(&self) {
        let previous = {
            let mut pending = self.pending.lock();
            let previous = pending.phase;
            // An opened request with nothing in flight stays opened.
            if matches!(
                previous,
                ProxyPhase::Sending | ProxyPhase::MiddlewareRunning | ProxyPhase::Sent
            ) {
                pending.phase = ProxyPhase::Aborted;
            }
            previous
        };

        self.inner.abort();
        if matches!(previous, ProxyPhase::Sending | ProxyPhase::MiddlewareRunning) {
            // The inner object has not been sent yet, so it reports nothing.
            self.dispatch(XhrEvent::Abort);
            self.dispatch(XhrEvent::LoadEnd);
        }
    }
}

impl XhrState for Shared {
    fn ready_state(&self) -> ReadyState {
        self.inner.ready_state()
    }

    fn status(&self) -> u16 {
        self.inner.status()
    }

    fn status_text(&self) -> String {
        self.inner.status_text()
    }

    fn response(&self) -> Value {
        if self.phase() == ProxyPhase::Completed && self.is_async() {
            if let Some(value) = self.transformed() {
                return value;
            }
        }
        self.inner.response()
    }

    fn response_text(&self) -> Option<String> {
        self.inner.response_text()
    }

    fn response_type(&self) -> ResponseType {
        self.inner.response_type()
    }

    fn response_url(&self) -> Option<Url> {
        self.inner.response_url()
    }

    fn get_response_header(&self, name: &str) -> Option<String> {
        self.inner.get_response_header(name)
    }

    fn get_all_response_headers(&self) -> String {
        self.inner.get_all_response_headers()
    }

    fn timeout(&self) -> Option<Duration> {
        self.inner.timeout()
    }

    fn with_credentials(&self) -> bool {
        self.inner.with_credentials()
    }
}

/// Request object handed out by [`InterceptedXhr`]
pub struct ProxiedXhr {
    shared: Arc<Shared>,
}

impl ProxiedXhr {
    fn new(
        inner: Box<dyn XmlHttpRequest>,
        registry: Arc<Registry<dyn XhrMiddleware>>,
        normalizer: Arc<dyn Normalizer>,
    ) -> Self {
        let shared = Arc::new(Shared {
            inner,
            registry,
            normalizer,
            pending: Mutex::new(Pending {
                phase: ProxyPhase::Unopened,
                method: String::new(),
                url: None,
                options: OpenOptions::default(),
                headers: HeaderMap::new(),
            }),
            completion: Mutex::new(Completion::new()),
            handlers: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            reopening: AtomicBool::new(false),
        });

        for event in XhrEvent::ALL {
            let weak: Weak<Shared> = Arc::downgrade(&shared);
            shared.inner.set_handler(
                event,
                Some(Arc::new(move |_: &dyn XhrState| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_inner_event(event);
                    }
                })),
            );
        }

        Self { shared }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> ProxyPhase {
        self.shared.phase()
    }
}

impl XhrState for ProxiedXhr {
    fn ready_state(&self) -> ReadyState {
        self.shared.ready_state()
    }

    fn status(&self) -> u16 {
        self.shared.status()
    }

    fn status_text(&self) -> String {
        self.shared.status_text()
    }

    fn response(&self) -> Value {
        self.shared.response()
    }

    fn response_text(&self) -> Option<String> {
        self.shared.response_text()
    }

    fn response_type(&self) -> ResponseType {
        self.shared.response_type()
    }

    fn response_url(&self) -> Option<Url> {
        self.shared.response_url()
    }

    fn get_response_header(&self, name: &str) -> Option<String> {
        self.shared.get_response_header(name)
    }

    fn get_all_response_headers(&self) -> String {
        self.shared.get_all_response_headers()
    }

    fn timeout(&self) -> Option<Duration> {
        self.shared.timeout()
    }

    fn with_credentials(&self) -> bool {
        self.shared.with_credentials()
    }
}

#[async_trait]
impl XmlHttpRequest for ProxiedXhr {
    fn open(&self, method: &str, url: &str, options: OpenOptions) -> Result<()> {
        let phase = self.shared.phase();
        if matches!(
            phase,
            ProxyPhase::Sending | ProxyPhase::MiddlewareRunning | ProxyPhase::Sent
        ) {
            return Err(Error::invalid_state("open", phase));
        }

        let url = self.shared.normalizer.resolve_absolute_url(url)?;
        self.shared.inner.open(method, url.as_str(), options.clone())?;

        *self.shared.pending.lock() = Pending {
            phase: ProxyPhase::Opened,
            method: method.to_string(),
            url: Some(url),
            options,
            headers: HeaderMap::new(),
        };
        *self.shared.completion.lock() = Completion::new();
        Ok(())
    }

    fn set_request_header(&self, name: &str, value: &str) -> Result<()> {
        let mut pending = self.shared.pending.lock();
        if pending.phase != ProxyPhase::Opened {
            return Err(Error::invalid_state("setRequestHeader", pending.phase));
        }
        let name = HeaderName::try_from(name)
            .map_err(|_| Error::invalid_argument(format!("invalid header name `{}`", name)))?;
        let value = HeaderValue::try_from(value)
            .map_err(|_| Error::invalid_argument(format!("invalid value for header `{}`", name)))?;
        pending.headers.append(name, value);
        Ok(())
    }

    async fn send(&self, body: Option<Bytes>) -> Result<()> {
        self.shared.send(body).await
    }

    fn abort(&self) {
        self.shared.abort();
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        self.shared.inner.set_timeout(timeout);
    }

    fn set_with_credentials(&self, with_credentials: bool) -> Result<()> {
        self.shared.inner.set_with_credentials(with_credentials)
    }

    fn set_response_type(&self, response_type: ResponseType) -> Result<()> {
        self.shared.inner.set_response_type(response_type)
    }

    fn override_mime_type(&self, mime: &str) -> Result<()> {
        self.shared.inner.override_mime_type(mime)
    }

    fn set_handler(&self, event: XhrEvent, handler: Option<XhrCallback>) {
        let mut handlers = self.shared.handlers.lock();
        match handler {
            Some(handler) => {
                handlers.insert(event, handler);
            }
            None => {
                handlers.remove(&event);
            }
        }
    }

    fn handler(&self, event: XhrEvent) -> Option<XhrCallback> {
        self.shared.handlers.lock().get(&event).cloned()
    }

    fn add_event_listener(&self, event: XhrEvent, listener: XhrCallback) {
        self.shared
            .listeners
            .lock()
            .entry(event)
            .or_default()
            .push(listener);
    }
}

/// XMLHttpRequest constructor that hands out proxies
pub struct InterceptedXhr {
    original: Arc<dyn XhrFactory>,
    registry: Arc<Registry<dyn XhrMiddleware>>,
    normalizer: Arc<dyn Normalizer>,
    stop: StopHandle,
}

impl InterceptedXhr {
    pub(crate) fn new(
        namespace: Arc<Namespace>,
        original: Arc<dyn XhrFactory>,
        normalizer: Arc<dyn Normalizer>,
    ) -> Self {
        let stop = StopHandle::new(namespace, Original::Xhr(original.clone()));
        Self {
            original,
            registry: Arc::new(Registry::new()),
            normalizer,
            stop,
        }
    }

    /// Register `middleware`; registering the same `Arc` again is a no-op
    pub fn on_request(
        &self,
        middleware: Arc<dyn XhrMiddleware>,
    ) -> Subscription<dyn XhrMiddleware> {
        self.registry.on_request(middleware)
    }

    pub fn unsubscribe(&self, middleware: &Arc<dyn XhrMiddleware>) {
        self.registry.unsubscribe(middleware);
    }

    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }

    pub fn original(&self) -> &Arc<dyn XhrFactory> {
        &self.original
    }

    pub fn registry(&self) -> &Arc<Registry<dyn XhrMiddleware>> {
        &self.registry
    }
}

impl XhrFactory for InterceptedXhr {
    fn create(&self) -> Box<dyn XmlHttpRequest> {
        Box::new(ProxiedXhr::new(
            self.original.create(),
            self.registry.clone(),
            self.normalizer.clone(),
        ))
    }

    fn name(&self) -> &str {
        self.original.name()
    }

    fn interception(&self) -> Option<&InterceptedXhr> {
        Some(self)
    }
}
