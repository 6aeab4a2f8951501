//! Fetch engines
//!
//! - [`PaginatedFetcher`]: follows `next_cursor` and streams items lazily
//! - [`NonPaginatedFetcher`]: one call, one optional object
//!
//! Both hold nothing but a shared transport handle, so one instance can serve
//! any number of concurrent callers.

mod non_paginated;
mod paginated;

pub use non_paginated::NonPaginatedFetcher;
pub use paginated::PaginatedFetcher;
