// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Middleware registry, pipeline and response finalization
//!
//! Shared by the fetch and XMLHttpRequest adapters:
//! - Registry: ordered, identity-unique middleware entries
//! - Pipeline: sequential middleware run with lazily derived request views
//! - Intercept/Interception: per-middleware outcomes and their reducers
//! - Finalize: transformer fold, delivered response and listener fan-out

mod finalize;
mod intercept;
mod pipeline;
mod registry;
mod stock;

pub use finalize::{fold, Finalization, ParseStrategy};
pub use intercept::{Intercept, Interception, Listener, Observed, Transformer};
pub use pipeline::{from_fn, FetchContext, FetchMiddleware};
pub use registry::{Registry, Subscription};
pub use stock::{AuthHeaderInjector, HeaderEntry, MockResponder, RequestLogger};

pub(crate) use pipeline::run;
