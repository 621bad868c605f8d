//! Fragment cache for rendered HTML snippets.
//!
//! The index page caches its post list under the `index_page` fragment,
//! varied by the requested page number.

mod config;
mod fragment;
mod lock;

pub use config::FragmentCacheConfig;
pub use fragment::{EVICT_TOTAL, FragmentCache, HIT_TOTAL, MISS_TOTAL};

/// Fragment name of the index page's post list.
pub const INDEX_PAGE_FRAGMENT: &str = "index_page";
