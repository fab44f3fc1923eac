//! Client for the Z.ai / Zhipu usage-monitor API.

mod client;
mod endpoints;
mod error;
mod timezone;
mod window;

pub use client::UsageFetcher;
pub use endpoints::{Platform, UsageEndpoints};
pub use error::{FetchError, FetchResult};
pub use timezone::ApiTimezone;
pub use window::QueryWindow;
