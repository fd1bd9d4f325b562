// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! XMLHttpRequest state machine issuing requests through a fetch primitive

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::sync::Notify;
use url::Url;

use super::{
    format_header_block, OpenOptions, ReadyState, ResponseType, XhrCallback, XhrEvent,
    XhrFactory, XhrState, XmlHttpRequest,
};
use crate::error::{Error, Result};
use crate::fetch::Fetch;
use crate::http::{headers, CredentialsMode, Request};
use crate::normalize::{DefaultNormalizer, Normalizer};

/// Creates [`FetchXhr`] instances sharing one fetch primitive
pub struct FetchXhrFactory {
    fetch: Arc<dyn Fetch>,
    normalizer: Arc<dyn Normalizer>,
}

impl FetchXhrFactory {
    /// Issue requests through `fetch`; only absolute URLs are accepted
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self {
            fetch,
            normalizer: Arc::new(DefaultNormalizer::new()),
        }
    }

    /// Resolve relative URLs with `normalizer`
    pub fn with_normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }
}

impl XhrFactory for FetchXhrFactory {
    fn create(&self) -> Box<dyn XmlHttpRequest> {
        Box::new(FetchXhr::new(self.fetch.clone(), self.normalizer.clone()))
    }
}

/// Received response, body fully buffered
#[derive(Debug, Clone)]
struct Received {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    url: Option<Url>,
    body: Bytes,
}

#[derive(Debug)]
struct State {
    ready_state: ReadyState,
    method: Method,
    url: Option<Url>,
    options: OpenOptions,
    request_headers: HeaderMap,
    send_flag: bool,
    /// Bumped by `open` and `abort`; a send whose generation is stale is dropped
    generation: u64,
    received: Option<Received>,
    response_type: ResponseType,
    mime_override: Option<String>,
    timeout: Option<Duration>,
    with_credentials: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            ready_state: ReadyState::Unsent,
            method: Method::GET,
            url: None,
            options: OpenOptions::default(),
            request_headers: HeaderMap::new(),
            send_flag: false,
            generation: 0,
            received: None,
            response_type: ResponseType::Default,
            mime_override: None,
            timeout: None,
            with_credentials: false,
        }
    }
}

impl State {
    fn body_text(&self) -> String {
        self.received
            .as_ref()
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .unwrap_or_default()
    }
}

/// How a send ended
enum Outcome {
    Loaded(Received),
    Failed(Error),
    TimedOut(Duration),
    Cancelled,
}

/// XMLHttpRequest implementation on top of any [`Fetch`]
///
/// Events are dispatched inline from `send`, `open` and `abort`. State is
/// never locked while a callback runs, so callbacks may read it freely.
pub struct FetchXhr {
    fetch: Arc<dyn Fetch>,
    normalizer: Arc<dyn Normalizer>,
    state: Mutex<State>,
    handlers: Mutex<HashMap<XhrEvent, XhrCallback>>,
    listeners: Mutex<HashMap<XhrEvent, Vec<XhrCallback>>>,
    cancel: Notify,
}

impl FetchXhr {
    pub fn new(fetch: Arc<dyn Fetch>, normalizer: Arc<dyn Normalizer>) -> Self {
        Self {
            fetch,
            normalizer,
            state: Mutex::new(State::default()),
            handlers: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            cancel: Notify::new(),
        }
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

    fn set_ready_state(&self, ready_state: ReadyState) {
        self.state.lock().ready_state = ready_state;
        self.dispatch(XhrEvent::ReadyStateChange);
    }

    /// Snapshot the opened request and set the send flag
    fn build_request(
        &self,
        body: Option<Bytes>,
    ) -> Result<(Request, u64, bool, Option<Duration>)> {
        let mut state = self.state.lock();
        if state.ready_state != ReadyState::Opened || state.send_flag {
            return Err(Error::invalid_state("send", state.ready_state));
        }
        let url = state
            .url
            .clone()
            .ok_or_else(|| Error::invalid_state("send", state.ready_state))?;

        let mut request = Request::from_url(state.method.clone(), url).no_timeout();
        request.headers = state.request_headers.clone();
        request.credentials = if state.with_credentials {
            CredentialsMode::Include
        } else {
            CredentialsMode::SameOrigin
        };
        if let (Some(user), false) = (
            state.options.user.as_deref(),
            request.headers.contains_key(headers::AUTHORIZATION),
        ) {
            let password = state.options.password.as_deref().unwrap_or("");
            let encoded = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", user, password));
            request = request.header(headers::AUTHORIZATION, format!("Basic {}", encoded));
        }
        if state.method != Method::GET && state.method != Method::HEAD {
            request.body = body;
        }

        state.send_flag = true;
        state.received = None;
        Ok((
            request,
            state.generation,
            state.options.is_async,
            state.timeout,
        ))
    }

    async fn issue(&self, request: Request, timeout: Option<Duration>) -> Outcome {
        let cancelled = self.cancel.notified();
        let pending = self.fetch.fetch(request);
        let limited = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, pending)
                    .await
                    .map_err(|_| limit),
                None => Ok(pending.await),
            }
        };

        let result = tokio::select! {
            _ = cancelled => return Outcome::Cancelled,
            result = limited => match result {
                Ok(result) => result,
                Err(limit) => return Outcome::TimedOut(limit),
            },
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => return Outcome::Failed(e),
        };
        match response.bytes() {
            Ok(body) => Outcome::Loaded(Received {
                status: response.status,
                status_text: response.status_text.clone(),
                headers: response.headers.clone(),
                url: response.url.clone(),
                body,
            }),
            Err(e) => Outcome::Failed(e),
        }
    }

    /// Whether the send started in `generation` is still the live one
    fn still_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    fn finish_with_error(&self, event: XhrEvent) {
        {
            let mut state = self.state.lock();
            state.send_flag = false;
            state.received = None;
        }
        self.set_ready_state(ReadyState::Done);
        self.dispatch(event);
        self.dispatch(XhrEvent::LoadEnd);
    }
}

impl XhrState for FetchXhr {
    fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    fn status(&self) -> u16 {
        self.state
            .lock()
            .received
            .as_ref()
            .map(|r| r.status.as_u16())
            .unwrap_or(0)
    }

    fn status_text(&self) -> String {
        self.state
            .lock()
            .received
            .as_ref()
            .map(|r| r.status_text.clone())
            .unwrap_or_default()
    }

    fn response(&self) -> Value {
        let state = self.state.lock();
        match state.response_type {
            ResponseType::Default | ResponseType::Text => {
                if state.ready_state < ReadyState::Loading {
                    return Value::String(String::new());
                }
                Value::String(state.body_text())
            }
            ResponseType::Json => {
                if state.ready_state != ReadyState::Done {
                    return Value::Null;
                }
                state
                    .received
                    .as_ref()
                    .and_then(|r| serde_json::from_slice(&r.body).ok())
                    .unwrap_or(Value::Null)
            }
        }
    }

    fn response_text(&self) -> Option<String> {
        let state = self.state.lock();
        if !state.response_type.is_textual() {
            return None;
        }
        if state.ready_state < ReadyState::Loading {
            return Some(String::new());
        }
        Some(state.body_text())
    }

    fn response_type(&self) -> ResponseType {
        self.state.lock().response_type
    }

    fn response_url(&self) -> Option<Url> {
        let state = self.state.lock();
        state
            .received
            .as_ref()
            .and_then(|r| r.url.clone())
            .or_else(|| state.url.clone())
    }

    fn get_response_header(&self, name: &str) -> Option<String> {
        let state = self.state.lock();
        let received = state.received.as_ref()?;
        let values: Vec<&str> = received
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(values.join(", "))
    }

    fn get_all_response_headers(&self) -> String {
        let state = self.state.lock();
        let Some(received) = state.received.as_ref() else {
            return String::new();
        };
        let mut merged: HashMap<String, String> = HashMap::new();
        for (name, value) in received.headers.iter() {
            let Ok(value) = value.to_str() else { continue };
            merged
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        if let Some(ref mime) = state.mime_override {
            merged.insert(headers::CONTENT_TYPE.to_string(), mime.clone());
        }
        format_header_block(&merged)
    }

    fn timeout(&self) -> Option<Duration> {
        self.state.lock().timeout
    }

    fn with_credentials(&self) -> bool {
        self.state.lock().with_credentials
    }
}

#[async_trait]
impl XmlHttpRequest for FetchXhr {
    fn open(&self, method: &str, url: &str, options: OpenOptions) -> Result<()> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::invalid_argument(format!("invalid method `{}`", method)))?;
        let url = self.normalizer.resolve_absolute_url(url)?;

        {
            let mut state = self.state.lock();
            state.generation += 1;
            self.cancel.notify_waiters();
            state.method = method;
            state.url = Some(url);
            state.options = options;
            state.request_headers.clear();
            state.send_flag = false;
            state.received = None;
        }
        self.set_ready_state(ReadyState::Opened);
        Ok(())
    }

    fn set_request_header(&self, name: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.ready_state != ReadyState::Opened || state.send_flag {
            return Err(Error::invalid_state("setRequestHeader", state.ready_state));
        }
        let name = HeaderName::try_from(name)
            .map_err(|_| Error::invalid_argument(format!("invalid header name `{}`", name)))?;

        let combined = match state.request_headers.get(&name).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, value),
            None => value.to_string(),
        };
        let value = HeaderValue::try_from(combined)
            .map_err(|_| Error::invalid_argument(format!("invalid value for header `{}`", name)))?;
        state.request_headers.insert(name, value);
        Ok(())
    }

    async fn send(&self, body: Option<Bytes>) -> Result<()> {
        let (request, generation, is_async, timeout) = self.build_request(body)?;
        tracing::debug!(method = %request.method, url = %request.url, is_async, "XHR send");

        if is_async {
            self.dispatch(XhrEvent::LoadStart);
        }

        let outcome = self.issue(request, timeout).await;
        if !self.still_current(generation) {
            tracing::debug!("XHR superseded while in flight");
            return Ok(());
        }

        match outcome {
            Outcome::Cancelled => Ok(()),
            Outcome::Loaded(received) => {
                {
                    let mut state = self.state.lock();
                    state.send_flag = false;
                    state.received = Some(received);
                }
                if is_async {
                    self.set_ready_state(ReadyState::HeadersReceived);
                    self.set_ready_state(ReadyState::Loading);
                    self.dispatch(XhrEvent::Progress);
                }
                self.set_ready_state(ReadyState::Done);
                self.dispatch(XhrEvent::Load);
                self.dispatch(XhrEvent::LoadEnd);
                Ok(())
            }
            Outcome::TimedOut(limit) => {
                self.finish_with_error(XhrEvent::Timeout);
                let url = self.response_url().map(|u| u.to_string()).unwrap_or_default();
                let err = Error::timeout_with_url("XMLHttpRequest", limit.as_millis() as u64, url);
                if is_async {
                    tracing::debug!(error = %err, "XHR timed out");
                    Ok(())
                } else {
                    Err(err)
                }
            }
            Outcome::Failed(err) => {
                self.finish_with_error(XhrEvent::Error);
                if is_async {
                    tracing::debug!(error = %err, "XHR failed");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    fn abort(&self) {
        let previous = {
            let mut state = self.state.lock();
            state.generation += 1;
            let previous = (state.ready_state, state.send_flag);
            self.cancel.notify_waiters();
            state.send_flag = false;
            state.received = None;
            previous
        };

        match previous {
            (ReadyState::Opened, true)
            | (ReadyState::HeadersReceived, _)
            | (ReadyState::Loading, _) => {
                self.set_ready_state(ReadyState::Done);
                self.dispatch(XhrEvent::Abort);
                self.dispatch(XhrEvent::LoadEnd);
                self.state.lock().ready_state = ReadyState::Unsent;
            }
            (ReadyState::Done, _) => {
                self.state.lock().ready_state = ReadyState::Unsent;
            }
            _ => {}
        }
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        self.state.lock().timeout = timeout;
    }

    fn set_with_credentials(&self, with_credentials: bool) -> Result<()> {
        let mut state = self.state.lock();
        if state.send_flag || state.ready_state > ReadyState::Opened {
            return Err(Error::invalid_state("withCredentials", state.ready_state));
        }
        state.with_credentials = with_credentials;
        Ok(())
    }

    fn set_response_type(&self, response_type: ResponseType) -> Result<()> {
        let mut state = self.state.lock();
        if state.ready_state >= ReadyState::Loading {
            return Err(Error::invalid_state("responseType", state.ready_state));
        }
        state.response_type = response_type;
        Ok(())
    }

    fn override_mime_type(&self, mime: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.ready_state >= ReadyState::Loading {
            return Err(Error::invalid_state("overrideMimeType", state.ready_state));
        }
        state.mime_override = Some(mime.to_string());
        Ok(())
    }

    fn set_handler(&self, event: XhrEvent, handler: Option<XhrCallback>) {
        let mut handlers = self.handlers.lock();
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
        self.handlers.lock().get(&event).cloned()
    }

    fn add_event_listener(&self, event: XhrEvent, listener: XhrCallback) {
        self.listeners.lock().entry(event).or_default().push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::http::Response;
    use crate::testing::MockFetch;

    fn xhr(mock: Arc<MockFetch>) -> Box<dyn XmlHttpRequest> {
        FetchXhrFactory::new(mock).create()
    }

    fn record(events: &Arc<Mutex<Vec<(XhrEvent, ReadyState)>>>, xhr: &dyn XmlHttpRequest) {
        for event in XhrEvent::ALL {
            let events = events.clone();
            xhr.add_event_listener(
                event,
                Arc::new(move |state: &dyn XhrState| {
                    events.lock().push((event, state.ready_state()));
                }),
            );
        }
    }

    #[tokio::test]
    async fn test_async_send_fires_events_in_order() {
        let mock = Arc::new(MockFetch::text("hello"));
        let xhr = xhr(mock.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        record(&events, xhr.as_ref());

        xhr.open("GET", "https://example.com/a", OpenOptions::new())
            .unwrap();
        xhr.send(None).await.unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                (XhrEvent::ReadyStateChange, ReadyState::Opened),
                (XhrEvent::LoadStart, ReadyState::Opened),
                (XhrEvent::ReadyStateChange, ReadyState::HeadersReceived),
                (XhrEvent::ReadyStateChange, ReadyState::Loading),
                (XhrEvent::Progress, ReadyState::Loading),
                (XhrEvent::ReadyStateChange, ReadyState::Done),
                (XhrEvent::Load, ReadyState::Done),
                (XhrEvent::LoadEnd, ReadyState::Done),
            ]
        );
        assert_eq!(xhr.status(), 200);
        assert_eq!(xhr.response_text().as_deref(), Some("hello"));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_sync_send_only_reports_done() {
        let mock = Arc::new(MockFetch::text("hello"));
        let xhr = xhr(mock);
        let events = Arc::new(Mutex::new(Vec::new()));
        xhr.open("GET", "https://example.com/a", OpenOptions::sync())
            .unwrap();
        record(&events, xhr.as_ref());

        xhr.send(None).await.unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                (XhrEvent::ReadyStateChange, ReadyState::Done),
                (XhrEvent::Load, ReadyState::Done),
                (XhrEvent::LoadEnd, ReadyState::Done),
            ]
        );
    }

    #[tokio::test]
    async fn test_request_carries_headers_body_and_basic_auth() {
        let mock = Arc::new(MockFetch::text("ok"));
        let xhr = xhr(mock.clone());

        xhr.open(
            "post",
            "https://example.com/submit",
            OpenOptions::new().credentials("user", "pass"),
        )
        .unwrap();
        xhr.set_request_header("x-a", "1").unwrap();
        xhr.set_request_header("x-a", "2").unwrap();
        xhr.send(Some(Bytes::from_static(b"payload"))).await.unwrap();

        let sent = mock.last_request().unwrap();
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.header_value("x-a"), Some("1, 2"));
        assert_eq!(sent.header_value("authorization"), Some("Basic dXNlcjpwYXNz"));
        assert_eq!(sent.body.as_deref(), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn test_get_drops_body() {
        let mock = Arc::new(MockFetch::text("ok"));
        let xhr = xhr(mock.clone());
        xhr.open("GET", "https://example.com", OpenOptions::new())
            .unwrap();
        xhr.send(Some(Bytes::from_static(b"ignored"))).await.unwrap();
        assert!(mock.last_request().unwrap().body.is_none());
    }

    #[tokio::test]
    async fn test_json_response_type() {
        let mock = Arc::new(MockFetch::json(json!({"n": 1})));
        let xhr = xhr(mock);
        xhr.open("GET", "https://example.com", OpenOptions::new())
            .unwrap();
        xhr.set_response_type(ResponseType::Json).unwrap();

        assert_eq!(xhr.response(), Value::Null);
        xhr.send(None).await.unwrap();

        assert_eq!(xhr.response(), json!({"n": 1}));
        assert_eq!(xhr.response_text(), None);
        assert!(xhr.set_response_type(ResponseType::Text).is_err());
    }

    #[tokio::test]
    async fn test_state_rules() {
        let xhr = xhr(Arc::new(MockFetch::text("ok")));

        assert!(matches!(
            xhr.set_request_header("x", "1"),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(xhr.send(None).await, Err(Error::InvalidState { .. })));
        assert!(matches!(
            xhr.open("GET", "/relative", OpenOptions::new()),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            xhr.open("GE T", "https://example.com", OpenOptions::new()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_network_error_fires_error_event() {
        let mock = Arc::new(MockFetch::with(|_| Err(Error::network("connection refused"))));
        let xhr = xhr(mock);
        let events = Arc::new(Mutex::new(Vec::new()));
        xhr.open("GET", "https://example.com", OpenOptions::new())
            .unwrap();
        record(&events, xhr.as_ref());

        xhr.send(None).await.unwrap();

        let seen: Vec<XhrEvent> = events.lock().iter().map(|(e, _)| *e).collect();
        assert!(seen.contains(&XhrEvent::Error));
        assert!(!seen.contains(&XhrEvent::Load));
        assert_eq!(xhr.status(), 0);
        assert_eq!(xhr.ready_state(), ReadyState::Done);
    }

    #[tokio::test]
    async fn test_sync_network_error_is_returned() {
        let mock = Arc::new(MockFetch::with(|_| Err(Error::network("down"))));
        let xhr = xhr(mock);
        xhr.open("GET", "https://example.com", OpenOptions::sync())
            .unwrap();
        assert!(xhr.send(None).await.unwrap_err().is_network());
    }

    struct Slow;

    #[async_trait]
    impl Fetch for Slow {
        async fn fetch(&self, _request: Request) -> Result<Response> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Response::text_body("late"))
        }
    }

    #[tokio::test]
    async fn test_timeout_fires_timeout_event() {
        let xhr = FetchXhrFactory::new(Arc::new(Slow)).create();
        let events = Arc::new(Mutex::new(Vec::new()));
        xhr.open("GET", "https://example.com", OpenOptions::new())
            .unwrap();
        xhr.set_timeout(Some(Duration::from_millis(100)));
        record(&events, xhr.as_ref());

        xhr.send(None).await.unwrap();

        let seen: Vec<XhrEvent> = events.lock().iter().map(|(e, _)| *e).collect();
        assert!(seen.contains(&XhrEvent::Timeout));
        assert_eq!(xhr.status(), 0);
    }

    #[tokio::test]
    async fn test_abort_in_flight() {
        let xhr: Arc<dyn XmlHttpRequest> =
            Arc::from(FetchXhrFactory::new(Arc::new(Slow)).create());
        let events = Arc::new(Mutex::new(Vec::new()));
        xhr.open("GET", "https://example.com", OpenOptions::new())
            .unwrap();
        record(&events, xhr.as_ref());

        let sending = {
            let xhr = xhr.clone();
            tokio::spawn(async move { xhr.send(None).await })
        };
        while events.lock().is_empty() {
            tokio::task::yield_now().await;
        }
        xhr.abort();
        sending.await.unwrap().unwrap();

        let seen: Vec<XhrEvent> = events.lock().iter().map(|(e, _)| *e).collect();
        assert!(seen.contains(&XhrEvent::Abort));
        assert!(!seen.contains(&XhrEvent::Load));
        assert_eq!(xhr.ready_state(), ReadyState::Unsent);
    }

    #[tokio::test]
    async fn test_response_headers() {
        let mock = Arc::new(MockFetch::with(|_| {
            Ok(Response::text_body("x").with_header("x-trace", "abc"))
        }));
        let xhr = xhr(mock);
        xhr.open("GET", "https://example.com", OpenOptions::new())
            .unwrap();
        xhr.override_mime_type("text/csv").unwrap();
        xhr.send(None).await.unwrap();

        assert_eq!(xhr.get_response_header("x-trace").as_deref(), Some("abc"));
        let all = xhr.get_all_response_headers();
        assert!(all.contains("x-trace: abc\r\n"));
        assert!(all.contains("content-type: text/csv\r\n"));
    }

    #[tokio::test]
    async fn test_handler_runs_before_listeners() {
        let xhr = xhr(Arc::new(MockFetch::text("ok")));
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = order.clone();
        let second = order.clone();
        xhr.add_event_listener(
            XhrEvent::Load,
            Arc::new(move |_: &dyn XhrState| second.lock().push("listener")),
        );
        xhr.set_handler(
            XhrEvent::Load,
            Some(Arc::new(move |_: &dyn XhrState| first.lock().push("handler"))),
        );

        xhr.open("GET", "https://example.com", OpenOptions::new())
            .unwrap();
        xhr.send(None).await.unwrap();

        assert_eq!(*order.lock(), vec!["handler", "listener"]);
    }
}
