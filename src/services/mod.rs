mod usage_reports;

#[cfg(test)]
pub(crate) use usage_reports::test_support;
pub use usage_reports::{CycleOutcome, NO_DATA_MESSAGE, UsageReportService};
