use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::{
    db::{
        error::DbResult,
        repos::{UsageSnapshotRepo, decode_usage_details, encode_usage_details},
    },
    models::{
        LatestUsage, ModelUsageRecord, NewUsageSnapshot, QuotaLimitRecord, RecordedSnapshot,
        TimeSeriesRecord, ToolUsageRecord,
    },
};

pub struct SqliteUsageSnapshotRepo {
    pool: SqlitePool,
}

impl SqliteUsageSnapshotRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_tool_usage(row: &sqlx::sqlite::SqliteRow) -> DbResult<ToolUsageRecord> {
        let tool_details_json: String = row.try_get("tool_details_json")?;
        let x_time_json: String = row.try_get("x_time_json")?;

        Ok(ToolUsageRecord {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            total_network_search_count: row.try_get("total_network_search_count")?,
            total_web_read_mcp_count: row.try_get("total_web_read_mcp_count")?,
            total_zread_mcp_count: row.try_get("total_zread_mcp_count")?,
            total_search_mcp_count: row.try_get("total_search_mcp_count")?,
            tool_details: serde_json::from_str(&tool_details_json)?,
            x_time: serde_json::from_str(&x_time_json)?,
        })
    }

    fn row_to_quota_limit(row: &sqlx::sqlite::SqliteRow) -> DbResult<QuotaLimitRecord> {
        Ok(QuotaLimitRecord {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            kind: row.try_get("type")?,
            percentage: row.try_get("percentage")?,
            current_usage: row.try_get("current_usage")?,
            total: row.try_get("total")?,
            usage_details: decode_usage_details(row.try_get("usage_details_json")?)?,
        })
    }

    async fn latest_model_usage(&self) -> DbResult<Option<ModelUsageRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, created_at, total_model_call_count, total_tokens_usage
            FROM model_usage
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: i64 = row.try_get("id")?;

        let series_rows = sqlx::query(
            r#"
            SELECT id, model_usage_id, created_at, "time", call_count, tokens_usage
            FROM model_usage_time_series
            WHERE model_usage_id = ?
            ORDER BY "time" ASC, id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let time_series = series_rows
            .iter()
            .map(|r| {
                Ok(TimeSeriesRecord {
                    id: r.try_get("id")?,
                    model_usage_id: r.try_get("model_usage_id")?,
                    created_at: r.try_get("created_at")?,
                    time: r.try_get("time")?,
                    call_count: r.try_get("call_count")?,
                    tokens_usage: r.try_get("tokens_usage")?,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Some(ModelUsageRecord {
            id,
            created_at: row.try_get("created_at")?,
            total_model_call_count: row.try_get("total_model_call_count")?,
            total_tokens_usage: row.try_get("total_tokens_usage")?,
            time_series,
        }))
    }

    async fn latest_tool_usage(&self) -> DbResult<Option<ToolUsageRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, created_at, total_network_search_count, total_web_read_mcp_count,
                   total_zread_mcp_count, total_search_mcp_count, tool_details_json, x_time_json
            FROM tool_usage
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_tool_usage).transpose()
    }

    async fn latest_quota_limits(&self) -> DbResult<Vec<QuotaLimitRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT q.id, q.created_at, q."type", q.percentage, q.current_usage, q.total,
                   q.usage_details_json
            FROM quota_limit q
            JOIN (
                SELECT "type", MAX(id) AS max_id
                FROM quota_limit
                GROUP BY "type"
            ) latest ON q.id = latest.max_id
            ORDER BY q."type" ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_quota_limit).collect()
    }
}

#[async_trait]
impl UsageSnapshotRepo for SqliteUsageSnapshotRepo {
    async fn record(&self, snapshot: &NewUsageSnapshot) -> DbResult<RecordedSnapshot> {
        let created_at = Utc::now();
        let tool_details_json = serde_json::to_string(&snapshot.tool.tool_details)?;
        let x_time_json = serde_json::to_string(&snapshot.tool.x_time)?;

        let mut tx = self.pool.begin().await?;

        let model_usage_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO model_usage (created_at, total_model_call_count, total_tokens_usage)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(created_at)
        .bind(snapshot.model.total_model_call_count)
        .bind(snapshot.model.total_tokens_usage)
        .fetch_one(&mut *tx)
        .await?;

        for point in &snapshot.model.time_series {
            sqlx::query(
                r#"
                INSERT INTO model_usage_time_series (
                    created_at, model_usage_id, "time", call_count, tokens_usage
                )
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(created_at)
            .bind(model_usage_id)
            .bind(point.time)
            .bind(point.call_count)
            .bind(point.tokens_usage)
            .execute(&mut *tx)
            .await?;
        }

        let tool_usage_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tool_usage (
                created_at, total_network_search_count, total_web_read_mcp_count,
                total_zread_mcp_count, total_search_mcp_count, tool_details_json, x_time_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(created_at)
        .bind(snapshot.tool.total_network_search_count)
        .bind(snapshot.tool.total_web_read_mcp_count)
        .bind(snapshot.tool.total_zread_mcp_count)
        .bind(snapshot.tool.total_search_mcp_count)
        .bind(&tool_details_json)
        .bind(&x_time_json)
        .fetch_one(&mut *tx)
        .await?;

        let mut quota_limit_ids = Vec::with_capacity(snapshot.quotas.len());
        for limit in &snapshot.quotas {
            let usage_details_json = encode_usage_details(limit.usage_details.as_ref())?;
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO quota_limit (
                    created_at, "type", percentage, current_usage, total, usage_details_json
                )
                VALUES (?, ?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(created_at)
            .bind(&limit.kind)
            .bind(limit.percentage)
            .bind(limit.current_usage)
            .bind(limit.total)
            .bind(usage_details_json)
            .fetch_one(&mut *tx)
            .await?;
            quota_limit_ids.push(id);
        }

        tx.commit().await?;

        Ok(RecordedSnapshot {
            model_usage_id,
            tool_usage_id,
            quota_limit_ids,
            created_at,
        })
    }

    async fn latest(&self) -> DbResult<LatestUsage> {
        Ok(LatestUsage {
            model: self.latest_model_usage().await?,
            tool: self.latest_tool_usage().await?,
            quotas: self.latest_quota_limits().await?,
        })
    }
}
