// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! The wrapped fetch primitive

use std::sync::Arc;

use async_trait::async_trait;

use super::Fetch;
use crate::error::Result;
use crate::http::{Request, Response};
use crate::middleware::{self, FetchMiddleware, Registry, Subscription};
use crate::namespace::{Namespace, Original, StopHandle};
use crate::normalize::Normalizer;

/// Fetch primitive that runs every request through registered middleware
pub struct InterceptedFetch {
    original: Arc<dyn Fetch>,
    registry: Arc<Registry<dyn FetchMiddleware>>,
    normalizer: Arc<dyn Normalizer>,
    stop: StopHandle,
}

impl InterceptedFetch {
    pub(crate) fn new(
        namespace: Arc<Namespace>,
        original: Arc<dyn Fetch>,
        normalizer: Arc<dyn Normalizer>,
    ) -> Self {
        let stop = StopHandle::new(namespace, Original::Fetch(original.clone()));
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
        middleware: Arc<dyn FetchMiddleware>,
    ) -> Subscription<dyn FetchMiddleware> {
        self.registry.on_request(middleware)
    }

    /// Remove `middleware`
    pub fn unsubscribe(&self, middleware: &Arc<dyn FetchMiddleware>) {
        self.registry.unsubscribe(middleware);
    }

    /// Handle restoring the wrapped primitive
    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }

    /// The wrapped primitive
    pub fn original(&self) -> &Arc<dyn Fetch> {
        &self.original
    }

    /// Middleware registered with this adapter
    pub fn registry(&self) -> &Arc<Registry<dyn FetchMiddleware>> {
        &self.registry
    }
}

#[async_trait]
impl Fetch for InterceptedFetch {
    async fn fetch(&self, request: Request) -> Result<Response> {
        let middlewares = self.registry.snapshot();
        let interception =
            middleware::run(&middlewares, request, &self.original, self.normalizer.as_ref())
                .await?;
        let (request, short_circuit, finalization) = interception.into_parts();

        let response = match short_circuit {
            Some(response) => {
                tracing::debug!(url = %request.url, "Short-circuited by middleware");
                response
            }
            None => self.original.fetch(request).await?,
        };

        finalization.apply(response)
    }

    fn name(&self) -> &str {
        self.original.name()
    }

    fn interception(&self) -> Option<&InterceptedFetch> {
        Some(self)
    }
}
