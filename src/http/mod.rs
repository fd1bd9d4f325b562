// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP layer for xfetch
//!
//! Request/response values shared by both adapters and the reqwest-backed
//! client that serves as the default fetch primitive.

mod client;
mod request;
mod response;

pub use client::{HttpClient, HttpClientConfig};
pub use request::{CredentialsMode, Request};
pub use response::Response;

/// Default user agent string
pub const DEFAULT_USER_AGENT: &str = concat!("xfetch/", env!("CARGO_PKG_VERSION"));

/// Common HTTP headers
pub mod headers {
    pub const ACCEPT: &str = "accept";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const COOKIE: &str = "cookie";
    pub const AUTHORIZATION: &str = "authorization";
}
