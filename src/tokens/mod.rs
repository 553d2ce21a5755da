//! Token lifecycle management: acquire, cache, refresh, persist.

mod manager;

pub use manager::{TokenManager, FRESHNESS_MARGIN_SECS};
