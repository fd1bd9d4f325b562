// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Fetch middleware trait and the sequential request pipeline

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use url::Url;

use super::intercept::{Intercept, Interception};
use crate::error::Result;
use crate::fetch::Fetch;
use crate::http::Request;
use crate::normalize::Normalizer;

/// Fetch middleware - sees every outgoing request before it is issued
///
/// Returning `Ok(None)` leaves the request alone. Returning an error aborts
/// the intercepted call with that error; later middleware do not run.
///
/// # Example
///
/// ```rust,no_run
/// use xfetch::middleware::{FetchContext, FetchMiddleware, Intercept};
/// use xfetch::Result;
/// use async_trait::async_trait;
///
/// struct JsonOnly;
///
/// #[async_trait]
/// impl FetchMiddleware for JsonOnly {
///     async fn handle(&self, ctx: &FetchContext<'_>) -> Result<Option<Intercept>> {
///         if ctx.url().path().starts_with("/api/") {
///             return Ok(Some(Intercept::new().parse_as("json")));
///         }
///         Ok(None)
///     }
/// }
/// ```
#[async_trait]
pub trait FetchMiddleware: Send + Sync {
    /// Inspect the request and optionally intercept it
    async fn handle(&self, ctx: &FetchContext<'_>) -> Result<Option<Intercept>>;
}

/// Wrap a synchronous closure as fetch middleware
pub fn from_fn<F>(f: F) -> Arc<dyn FetchMiddleware>
where
    F: Fn(&FetchContext<'_>) -> Result<Option<Intercept>> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware(f))
}

struct FnMiddleware<F>(F);

#[async_trait]
impl<F> FetchMiddleware for FnMiddleware<F>
where
    F: Fn(&FetchContext<'_>) -> Result<Option<Intercept>> + Send + Sync + 'static,
{
    async fn handle(&self, ctx: &FetchContext<'_>) -> Result<Option<Intercept>> {
        (self.0)(ctx)
    }
}

/// Derived request views, computed on first use
#[derive(Default)]
struct Parsed {
    url: OnceLock<Url>,
    headers: OnceLock<HashMap<String, String>>,
}

/// Read-only view a middleware gets of the request in flight
pub struct FetchContext<'a> {
    request: &'a Request,
    fetch: &'a Arc<dyn Fetch>,
    parsed: &'a Parsed,
    normalizer: &'a dyn Normalizer,
}

impl<'a> FetchContext<'a> {
    /// The current request, as left by earlier middleware
    pub fn request(&self) -> &'a Request {
        self.request
    }

    /// The unwrapped fetch; requests issued here are not intercepted
    pub fn fetch(&self) -> &'a Arc<dyn Fetch> {
        self.fetch
    }

    /// Absolute request URL, resolved once per request
    pub fn url(&self) -> &'a Url {
        self.parsed.url.get_or_init(|| {
            self.normalizer
                .resolve_absolute_url(self.request.url.as_str())
                .unwrap_or_else(|_| self.request.url.clone())
        })
    }

    /// Request headers as a plain mapping, parsed once per request
    pub fn headers(&self) -> &'a HashMap<String, String> {
        self.parsed
            .headers
            .get_or_init(|| self.normalizer.parse_header_pairs(&self.request.headers))
    }
}

/// Run `middlewares` over `request`, in order, one at a time
///
/// The derived URL/header views are shared by all middleware and only
/// recomputed after a middleware replaces the request.
pub async fn run(
    middlewares: &[Arc<dyn FetchMiddleware>],
    request: Request,
    fetch: &Arc<dyn Fetch>,
    normalizer: &dyn Normalizer,
) -> Result<Interception> {
    let mut interception = Interception::new(request);
    let mut parsed = Parsed::default();

    for middleware in middlewares {
        let intercept = {
            let ctx = FetchContext {
                request: interception.request(),
                fetch,
                parsed: &parsed,
                normalizer,
            };
            middleware.handle(&ctx).await?
        };

        let Some(intercept) = intercept else {
            continue;
        };

        if interception.absorb(intercept) {
            parsed = Parsed::default();
        }
    }

    Ok(interception)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use reqwest::header::HeaderMap;

    use crate::error::Error;
    use crate::normalize::DefaultNormalizer;
    use crate::testing::MockFetch;

    /// Normalizer that counts how often each function runs
    #[derive(Default)]
    struct CountingNormalizer {
        urls: AtomicUsize,
        headers: AtomicUsize,
    }

    impl Normalizer for CountingNormalizer {
        fn resolve_absolute_url(&self, url: &str) -> Result<Url> {
            self.urls.fetch_add(1, Ordering::SeqCst);
            DefaultNormalizer::new().resolve_absolute_url(url)
        }

        fn parse_header_pairs(&self, headers: &HeaderMap) -> HashMap<String, String> {
            self.headers.fetch_add(1, Ordering::SeqCst);
            DefaultNormalizer::new().parse_header_pairs(headers)
        }
    }

    fn fetch() -> Arc<dyn Fetch> {
        Arc::new(MockFetch::text("ok"))
    }

    #[tokio::test]
    async fn test_middleware_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let middlewares: Vec<Arc<dyn FetchMiddleware>> = (0..4)
            .map(|i| {
                let seen = seen.clone();
                from_fn(move |_| {
                    seen.lock().push(i);
                    Ok(None)
                })
            })
            .collect();

        let request = Request::get("https://example.com").unwrap();
        run(&middlewares, request, &fetch(), &DefaultNormalizer::new())
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_lazy_views_are_memoized() {
        let normalizer = CountingNormalizer::default();
        let reader = || {
            from_fn(|ctx| {
                let first = ctx.url();
                let second = ctx.url();
                assert!(std::ptr::eq(first, second));
                assert_eq!(ctx.headers().get("x-a").map(String::as_str), Some("1"));
                assert_eq!(ctx.headers().len(), 1);
                Ok(None)
            })
        };
        let middlewares = vec![reader(), reader(), reader()];

        let request = Request::get("https://example.com/p")
            .unwrap()
            .header("x-a", "1");
        run(&middlewares, request, &fetch(), &normalizer)
            .await
            .unwrap();

        assert_eq!(normalizer.urls.load(Ordering::SeqCst), 1);
        assert_eq!(normalizer.headers.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_later_middleware_observe_rewritten_request() {
        let normalizer = CountingNormalizer::default();
        let rewrite = from_fn(|ctx| {
            assert_eq!(ctx.url().path(), "/old");
            let moved = ctx
                .request()
                .clone()
                .url(Url::parse("https://example.com/new").unwrap());
            Ok(Some(Intercept::new().request(moved)))
        });
        let observe = from_fn(|ctx| {
            assert_eq!(ctx.request().url.path(), "/new");
            assert_eq!(ctx.url().path(), "/new");
            Ok(None)
        });

        let request = Request::get("https://example.com/old").unwrap();
        let interception = run(&[rewrite, observe], request, &fetch(), &normalizer)
            .await
            .unwrap();

        assert_eq!(interception.request().url.path(), "/new");
        assert_eq!(normalizer.urls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_middleware_aborts_the_run() {
        let after = Arc::new(AtomicUsize::new(0));
        let counter = after.clone();
        let middlewares = vec![
            from_fn(|_| Err(Error::middleware("denied"))),
            from_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }),
        ];

        let request = Request::get("https://example.com").unwrap();
        let result = run(&middlewares, request, &fetch(), &DefaultNormalizer::new()).await;

        assert!(matches!(result, Err(Error::Middleware(_))));
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_context_exposes_original_fetch() {
        let original = fetch();
        let expected = original.clone();
        let check = from_fn(move |ctx| {
            assert!(Arc::ptr_eq(ctx.fetch(), &expected));
            Ok(None)
        });

        let request = Request::get("https://example.com").unwrap();
        run(&[check], request, &original, &DefaultNormalizer::new())
            .await
            .unwrap();
    }
}
