use std::time::Duration;

use ahash::RandomState;
use moka::future::Cache;

use crate::{geo::RouteQuoteKey, quote::RouteQuote};

/// Quotes computed during one session, keyed by pickup/drop pair.
///
/// Lookups through `try_get_with` are single-flight: concurrent callers for the
/// same key wait on one computation, and a failed computation stores nothing.
pub type QuoteCache = Cache<RouteQuoteKey, RouteQuote, RandomState>;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheSettings {
    /// unbounded when `None`
    pub max_capacity: Option<u64>,
    /// entries never expire when `None`
    pub time_to_live: Option<Duration>,
}

pub fn quote_cache(settings: &CacheSettings) -> QuoteCache {
    let mut builder = Cache::<RouteQuoteKey, RouteQuote>::builder();

    if let Some(max_capacity) = settings.max_capacity {
        builder = builder.max_capacity(max_capacity);
    }
    if let Some(ttl) = settings.time_to_live {
        builder = builder.time_to_live(ttl);
    }

    // we use ahash because it's faster for string keys
    builder.build_with_hasher(RandomState::default())
}
