// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! URL and header normalization
//!
//! The pipeline only needs two pure functions from its environment: turning
//! a possibly relative URL into an absolute one, and flattening a header
//! container into a plain name/value mapping. Both sit behind the
//! [`Normalizer`] trait so the host (or a test) can supply its own.

use std::collections::HashMap;

use reqwest::header::HeaderMap;
use url::Url;

use crate::error::{Error, Result};

/// Pure URL/header helpers used by the adapters and the lazy context accessors
pub trait Normalizer: Send + Sync {
    /// Resolve `url` to an absolute URL
    fn resolve_absolute_url(&self, url: &str) -> Result<Url>;

    /// Flatten headers into a lower-cased name/value mapping
    fn parse_header_pairs(&self, headers: &HeaderMap) -> HashMap<String, String>;
}

/// Default normalizer, resolving relative URLs against the host location
#[derive(Debug, Clone, Default)]
pub struct DefaultNormalizer {
    base: Option<Url>,
}

impl DefaultNormalizer {
    /// Create a normalizer without a base location
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a normalizer resolving against `base`
    pub fn with_base(base: Url) -> Self {
        Self { base: Some(base) }
    }

    /// Get the base location
    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }
}

impl Normalizer for DefaultNormalizer {
    fn resolve_absolute_url(&self, url: &str) -> Result<Url> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(Url::parse(url)?);
        }

        let base = self.base.as_ref().ok_or_else(|| {
            Error::invalid_argument(format!(
                "cannot resolve relative URL `{}` without a base location",
                url
            ))
        })?;
        let origin = base.origin().ascii_serialization();

        if url.starts_with('/') {
            return Ok(Url::parse(&format!("{}{}", origin, url))?);
        }

        // Relative paths hang off the full base path, not its parent directory.
        let path = base.path().trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}/{}", origin, path, url))?)
    }

    fn parse_header_pairs(&self, headers: &HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }
}
