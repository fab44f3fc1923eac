//! Long-running background tasks.
//!
//! - **Usage report worker**: fetches, records and reports usage on a fixed
//!   interval.
//! - **Command listener**: answers `/usage` chat commands.
//!
//! Both take a `CancellationToken` and return once it is cancelled.
//!
//! # Example
//!
//! ```toml
//! [scheduler]
//! enabled = true
//! interval_secs = 60
//!
//! [telegram]
//! commands_enabled = true
//! command_source = "stored"
//! ```

mod command_listener;
mod usage_report;

pub use command_listener::start_command_listener;
pub use usage_report::start_usage_report_worker;
