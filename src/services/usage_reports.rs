use std::sync::Arc;

use chrono::Utc;
use tokio::sync::OnceCell;

use crate::{
    config::CommandSource,
    db::{DbError, DbPool},
    models::{LatestUsage, NewUsageSnapshot, RecordedSnapshot},
    notify::{Notifier, NotifyError},
    report,
    upstream::{ApiTimezone, FetchError, UsageFetcher},
};

/// Reply to `/usage` when nothing has been stored yet.
pub const NO_DATA_MESSAGE: &str = "No usage data available in database yet.";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

pub type ReportResult<T> = Result<T, ReportError>;

/// What a periodic cycle ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Sent { snapshot: RecordedSnapshot },
    /// Recorded, but the read-back found nothing to report.
    NoData,
}

/// Fetch, persist and render usage reports.
#[derive(Clone)]
pub struct UsageReportService {
    fetcher: UsageFetcher,
    /// Set from configuration, or from the first successful fetch.
    timezone: Arc<OnceCell<ApiTimezone>>,
    db: Option<Arc<DbPool>>,
}

impl UsageReportService {
    /// `timezone` pins the API offset; `None` infers it from the first
    /// successful fetch and keeps it for the life of the service.
    pub fn new(
        fetcher: UsageFetcher,
        timezone: Option<ApiTimezone>,
        db: Option<Arc<DbPool>>,
    ) -> Self {
        Self {
            fetcher,
            timezone: Arc::new(OnceCell::new_with(timezone)),
            db,
        }
    }

    fn db(&self) -> ReportResult<&DbPool> {
        self.db.as_deref().ok_or(ReportError::Db(DbError::NotConfigured))
    }

    /// Fetch all three dimensions and convert them to storage shape.
    pub async fn fetch_snapshot(&self) -> ReportResult<NewUsageSnapshot> {
        let usage = self.fetcher.fetch_all().await?;
        let timezone = self.timezone_for(&usage.model.x_time).await?;
        Ok(NewUsageSnapshot::from_fetched(&usage, &timezone)?)
    }

    /// The cached offset, or one inferred from `x_time` and cached.
    async fn timezone_for(&self, x_time: &[String]) -> Result<ApiTimezone, FetchError> {
        if let Some(timezone) = self.timezone.get() {
            return Ok(*timezone);
        }

        // An empty axis has nothing to localize, so stay unresolved
        let Some(detected) = ApiTimezone::from_samples(x_time, Utc::now())? else {
            return Ok(ApiTimezone::utc());
        };
        let timezone = *self.timezone.get_or_init(|| async { detected }).await;
        tracing::info!(timezone = %timezone, "Detected API timezone");
        Ok(timezone)
    }

    /// Fetch and persist one snapshot.
    pub async fn collect(&self) -> ReportResult<RecordedSnapshot> {
        let db = self.db()?;
        let snapshot = self.fetch_snapshot().await?;
        let recorded = db.usage_snapshots().record(&snapshot).await?;

        tracing::info!(
            model_usage_id = recorded.model_usage_id,
            tool_usage_id = recorded.tool_usage_id,
            quota_limits = recorded.quota_limit_ids.len(),
            samples = snapshot.model.time_series.len(),
            "Recorded usage snapshot"
        );
        Ok(recorded)
    }

    pub async fn latest(&self) -> ReportResult<LatestUsage> {
        Ok(self.db()?.usage_snapshots().latest().await?)
    }

    /// Render the latest stored snapshot, or `None` when the store is empty.
    pub async fn stored_report(&self) -> ReportResult<Option<String>> {
        let latest = self.latest().await?;
        if latest.is_empty() {
            return Ok(None);
        }
        Ok(Some(report::format_latest(&latest)))
    }

    /// Fetch and render without persisting.
    pub async fn live_report(&self) -> ReportResult<String> {
        let snapshot = self.fetch_snapshot().await?;
        Ok(report::format_live(&snapshot))
    }

    /// One periodic cycle: fetch, persist, read back, format, send.
    pub async fn collect_and_report(
        &self,
        notifier: &dyn Notifier,
        chat_id: &str,
    ) -> ReportResult<CycleOutcome> {
        let snapshot = self.collect().await?;

        let Some(text) = self.stored_report().await? else {
            return Ok(CycleOutcome::NoData);
        };
        notifier.send_message(chat_id, &text).await?;

        Ok(CycleOutcome::Sent { snapshot })
    }

    /// Text to reply with for a `/usage` command.
    pub async fn answer_usage_command(&self, source: CommandSource) -> ReportResult<String> {
        match source {
            CommandSource::Stored => Ok(self
                .stored_report()
                .await?
                .unwrap_or_else(|| NO_DATA_MESSAGE.to_string())),
            CommandSource::Live => self.live_report().await,
        }
    }
}
