//! Evidence provider adapters
//!
//! Thin I/O wrappers around external sources:
//! - Web search (Exa-style neural search API), feeds the hard group
//! - Hot lists (DailyHot-style aggregator), feeds the soft group
//! - Static fixtures for offline runs

pub mod hot_list;
pub mod static_feed;
pub mod web_search;

pub use hot_list::HotListProvider;
pub use static_feed::StaticProvider;
pub use web_search::{WebSearchProvider, DEFAULT_SEARCH_ENDPOINT};

use super::provider::ProviderError;

/// Map a non-success HTTP response into a provider error
pub(crate) async fn http_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::Http {
        status,
        message: body.chars().take(300).collect(),
    }
}
