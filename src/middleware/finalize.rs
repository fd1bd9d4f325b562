// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Response finalization: transformer fold, delivered response, listeners
//!
//! The finalizer never reads the caller's handle. Decoding for the fold and
//! every listener notification draw from their own duplicate handles, which
//! are all taken before the response is handed back.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;

use super::intercept::{Listener, Observed, Transformer};
use crate::error::{Error, Result};
use crate::http::Response;

/// Named body decoding method selected with `as`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// Structured data: the body is decoded as JSON
    Json,
    /// Raw text: the body becomes a JSON string value
    Text,
}

impl ParseStrategy {
    /// Look up a strategy by the name a middleware used
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "json" => Some(ParseStrategy::Json),
            "text" => Some(ParseStrategy::Text),
            _ => None,
        }
    }

    /// Strategy name
    pub fn name(&self) -> &'static str {
        match self {
            ParseStrategy::Json => "json",
            ParseStrategy::Text => "text",
        }
    }

    /// Read `response` through this strategy, consuming that handle
    pub fn read(&self, response: &Response) -> Result<Value> {
        match self {
            ParseStrategy::Json => response.json(),
            ParseStrategy::Text => response.text().map(Value::String),
        }
    }
}

/// Run `value` through every transformer, left to right
pub fn fold(transformers: &[Transformer], value: Value) -> Result<Value> {
    transformers
        .iter()
        .try_fold(value, |acc, transform| transform(acc).map_err(Error::Transform))
}

/// Serialize a transformed value into a response body
fn into_body(value: Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text),
        other => Ok(serde_json::to_string(&other)?),
    }
}

/// What to do with a response once it exists
pub struct Finalization {
    parse_as: Option<String>,
    transformers: Vec<Transformer>,
    listeners: Vec<Listener>,
}

impl Finalization {
    pub(crate) fn new(
        parse_as: Option<String>,
        transformers: Vec<Transformer>,
        listeners: Vec<Listener>,
    ) -> Self {
        Self {
            parse_as,
            transformers,
            listeners,
        }
    }

    /// The resolved parse strategy; unknown names resolve to none
    pub fn strategy(&self) -> Option<ParseStrategy> {
        let name = self.parse_as.as_deref()?;
        let strategy = ParseStrategy::from_name(name);
        if strategy.is_none() {
            tracing::debug!(parse_as = name, "Unknown parse strategy, using raw response");
        }
        strategy
    }

    /// Transform `response`, schedule the listeners and return what the caller gets
    pub fn apply(self, response: Response) -> Result<Response> {
        let strategy = self.strategy();

        let delivered = match strategy {
            Some(strategy) if !self.transformers.is_empty() => {
                let decoded = strategy.read(&response.duplicate()?)?;
                let transformed = fold(&self.transformers, decoded)?;
                response.with_replaced_body(into_body(transformed)?)
            }
            _ => response,
        };

        notify(self.listeners, &delivered, strategy);
        Ok(delivered)
    }
}

/// Hand every listener its own duplicate, in registration order
///
/// Duplicates are taken here, before the caller can touch the body. A
/// listener whose duplicate cannot be taken is reported and skipped; the
/// caller's response is never affected. Delivery happens on a spawned task
/// when a tokio runtime is present and inline otherwise.
fn notify(listeners: Vec<Listener>, response: &Response, strategy: Option<ParseStrategy>) {
    if listeners.is_empty() {
        return;
    }

    let deliveries: Vec<(usize, Listener, Response)> = listeners
        .into_iter()
        .enumerate()
        .filter_map(|(index, listener)| match response.duplicate() {
            Ok(handle) => Some((index, listener, handle)),
            Err(e) => {
                report(index, e.to_string());
                None
            }
        })
        .collect();

    let run = move || {
        for (index, listener, handle) in deliveries {
            deliver(index, &listener, handle, strategy);
        }
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { run() });
        }
        Err(_) => run(),
    }
}

fn deliver(index: usize, listener: &Listener, handle: Response, strategy: Option<ParseStrategy>) {
    let observed = match strategy {
        Some(strategy) => match strategy.read(&handle) {
            Ok(value) => Observed::Parsed(value),
            Err(e) => {
                report(index, e.to_string());
                return;
            }
        },
        None => Observed::Raw(handle),
    };

    // Panics are only caught when unwinding; release builds abort instead.
    match catch_unwind(AssertUnwindSafe(|| listener(observed))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => report(index, format!("{:#}", e)),
        Err(_) => report(index, "listener panicked".to_string()),
    }
}

fn report(index: usize, reason: String) {
    let err = Error::Listener { index, reason };
    tracing::warn!(error = %err, "Response listener failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn transformer<F>(f: F) -> Transformer
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    fn listener<F>(f: F) -> Listener
    where
        F: Fn(Observed) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(ParseStrategy::from_name("json"), Some(ParseStrategy::Json));
        assert_eq!(ParseStrategy::from_name("text"), Some(ParseStrategy::Text));
        assert_eq!(ParseStrategy::from_name("blob"), None);
        assert_eq!(ParseStrategy::Text.name(), "text");
    }

    #[test]
    fn test_fold_runs_left_to_right() {
        let transformers = vec![
            transformer(|v| Ok(json!(v.as_i64().unwrap_or(0) + 1))),
            transformer(|v| Ok(json!(v.as_i64().unwrap_or(0) * 10))),
        ];
        assert_eq!(fold(&transformers, json!(1)).unwrap(), json!(20));
    }

    #[test]
    fn test_fold_stops_at_first_failure() {
        let transformers = vec![
            transformer(|_| Err(anyhow::anyhow!("boom"))),
            transformer(|_| panic!("must not run")),
        ];
        let err = fold(&transformers, json!(1)).unwrap_err();
        assert!(err.is_transform());
    }

    #[test]
    fn test_untransformed_response_is_forwarded() {
        let response = Response::new(StatusCode::ACCEPTED, HeaderMap::new(), "raw");
        let finalization = Finalization::new(Some("text".into()), Vec::new(), Vec::new());

        let delivered = finalization.apply(response).unwrap();
        assert_eq!(delivered.status, StatusCode::ACCEPTED);
        assert_eq!(delivered.text().unwrap(), "raw");
    }

    #[test]
    fn test_text_transform_result_is_not_quoted() {
        let response = Response::text_body("abc");
        let finalization = Finalization::new(
            Some("text".into()),
            vec![transformer(|v| {
                Ok(Value::String(v.as_str().unwrap_or("").to_uppercase()))
            })],
            Vec::new(),
        );

        let delivered = finalization.apply(response).unwrap();
        assert_eq!(delivered.text().unwrap(), "ABC");
    }

    #[test]
    fn test_unknown_strategy_skips_transformers() {
        let response = Response::text_body("abc");
        let finalization = Finalization::new(
            Some("formData".into()),
            vec![transformer(|_| panic!("must not run"))],
            Vec::new(),
        );

        assert_eq!(finalization.apply(response).unwrap().text().unwrap(), "abc");
    }

    #[test]
    fn test_decode_failure_propagates_when_transforming() {
        let response = Response::text_body("not json");
        let finalization = Finalization::new(
            Some("json".into()),
            vec![transformer(Ok)],
            Vec::new(),
        );

        assert!(matches!(
            finalization.apply(response),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_listeners_run_inline_without_runtime() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notify = listener(move |observed| {
            tx.send(observed.value().cloned()).ok();
            Ok(())
        });
        let finalization = Finalization::new(Some("json".into()), Vec::new(), vec![notify]);

        let delivered = finalization
            .apply(Response::json_body(&json!({"ok": true})).unwrap())
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), Some(json!({"ok": true})));
        assert!(!delivered.body_used());
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_stop_the_rest() {
        crate::testing::init_tracing();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tx_last = tx.clone();
        let listeners = vec![
            listener(|_| Err(anyhow::anyhow!("listener exploded"))),
            listener(|_| panic!("listener panicked")),
            listener(move |observed| {
                tx_last.send(observed.value().cloned()).ok();
                Ok(())
            }),
        ];
        drop(tx);
        let finalization = Finalization::new(Some("text".into()), Vec::new(), listeners);

        let delivered = finalization.apply(Response::text_body("abc")).unwrap();

        assert_eq!(delivered.text().unwrap(), "abc");
        assert_eq!(rx.recv().await.unwrap(), Some(json!("abc")));
    }

    #[test]
    fn test_listener_without_duplicate_keeps_response() {
        let called = Arc::new(AtomicUsize::new(0));
        let counter = called.clone();
        let notify = listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let response = Response::text_body("cached");
        response.text().unwrap();
        let finalization = Finalization::new(None, Vec::new(), vec![notify]);

        let delivered = finalization.apply(response).unwrap();

        assert!(delivered.body_used());
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_decode_failure_keeps_response() {
        let called = Arc::new(AtomicUsize::new(0));
        let counter = called.clone();
        let notify = listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let finalization = Finalization::new(Some("json".into()), Vec::new(), vec![notify]);

        let delivered = finalization.apply(Response::text_body("not json")).unwrap();

        assert_eq!(delivered.text().unwrap(), "not json");
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_text_strategy_accepts_invalid_utf8() {
        let response = Response::new(StatusCode::OK, HeaderMap::new(), &b"caf\xe9"[..]);
        let finalization = Finalization::new(
            Some("text".into()),
            vec![transformer(|v| {
                Ok(Value::String(v.as_str().unwrap_or("").to_uppercase()))
            })],
            Vec::new(),
        );

        let delivered = finalization.apply(response).unwrap();
        assert_eq!(delivered.text().unwrap(), "CAF\u{fffd}");
    }
}
