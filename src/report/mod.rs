//! Chat report rendering.
//!
//! Reports use the small HTML subset the Telegram Bot API accepts with
//! `parse_mode=HTML`, so every string that came from the upstream is escaped.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::models::{LatestUsage, NewUsageSnapshot, ToolDetail};

/// Maximum number of series points listed under "Recent Activity".
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

/// Where the report data came from. Only changes the title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSource {
    Live,
    Stored,
}

impl ReportSource {
    fn title(self) -> &'static str {
        match self {
            Self::Live => "📊 Usage Report",
            Self::Stored => "📊 Usage Report (from database)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityPoint {
    pub time: DateTime<Utc>,
    pub call_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSection {
    pub total_calls: i64,
    pub total_tokens: i64,
    /// Any order; the formatter sorts newest first.
    pub activity: Vec<ActivityPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSection<'a> {
    pub total_search: i64,
    pub details: &'a [ToolDetail],
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuotaLine<'a> {
    pub kind: &'a str,
    pub percentage: f64,
    pub current: Option<i64>,
    pub total: Option<i64>,
}

/// Render a usage report.
///
/// A `None` model or tool section, or an empty quota list, is left out
/// entirely, heading included.
pub fn format_usage_report(
    source: ReportSource,
    model: Option<&ModelSection>,
    tool: Option<&ToolSection<'_>>,
    quotas: &[QuotaLine<'_>],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<b>{}</b>\n", source.title());

    if let Some(model) = model {
        out.push_str("<b>Model Usage:</b>\n");
        let _ = writeln!(out, "• Total Calls: {}", model.total_calls);
        let _ = writeln!(out, "• Total Tokens: {}", group_thousands(model.total_tokens));

        if !model.activity.is_empty() {
            let mut recent = model.activity.clone();
            recent.sort_by(|a, b| b.time.cmp(&a.time));

            out.push_str("\n<b>Recent Activity:</b>\n");
            for point in recent.iter().take(RECENT_ACTIVITY_LIMIT) {
                let _ = writeln!(
                    out,
                    "  • {}: {} calls",
                    point.time.format("%m-%d %H:%M"),
                    display_or_na(point.call_count)
                );
            }
        }
        out.push('\n');
    }

    if let Some(tool) = tool {
        out.push_str("<b>Tool Usage:</b>\n");
        let _ = writeln!(out, "• Total Search: {}", tool.total_search);
        for detail in tool.details {
            let _ = writeln!(
                out,
                "  - {}: {}",
                escape_html(&detail.model_name),
                detail.total_usage_count
            );
        }
        out.push('\n');
    }

    if !quotas.is_empty() {
        out.push_str("<b>Quota Limits:</b>\n");
        for quota in quotas {
            let _ = writeln!(out, "• {}: {}%", escape_html(quota.kind), quota.percentage);
            if let Some(current) = quota.current {
                let _ = writeln!(out, "  - Current: {current}/{}", display_or_na(quota.total));
            }
        }
    }

    out.truncate(out.trim_end().len());
    out
}

/// Render the latest stored snapshot.
pub fn format_latest(latest: &LatestUsage) -> String {
    let model = latest.model.as_ref().map(|m| ModelSection {
        total_calls: m.total_model_call_count,
        total_tokens: m.total_tokens_usage,
        activity: m
            .time_series
            .iter()
            .map(|p| ActivityPoint {
                time: p.time,
                call_count: p.call_count,
            })
            .collect(),
    });
    let tool = latest.tool.as_ref().map(|t| ToolSection {
        total_search: t.total_search_mcp_count,
        details: &t.tool_details,
    });
    let quotas: Vec<_> = latest
        .quotas
        .iter()
        .map(|q| QuotaLine {
            kind: &q.kind,
            percentage: q.percentage,
            current: q.current_usage,
            total: q.total,
        })
        .collect();

    format_usage_report(ReportSource::Stored, model.as_ref(), tool.as_ref(), &quotas)
}

/// Render a freshly fetched snapshot that has not been stored.
pub fn format_live(snapshot: &NewUsageSnapshot) -> String {
    let model = ModelSection {
        total_calls: snapshot.model.total_model_call_count,
        total_tokens: snapshot.model.total_tokens_usage,
        activity: snapshot
            .model
            .time_series
            .iter()
            .map(|p| ActivityPoint {
                time: p.time,
                call_count: p.call_count,
            })
            .collect(),
    };
    let tool = ToolSection {
        total_search: snapshot.tool.total_search_mcp_count,
        details: &snapshot.tool.tool_details,
    };
    let quotas: Vec<_> = snapshot
        .quotas
        .iter()
        .map(|q| QuotaLine {
            kind: &q.kind,
            percentage: q.percentage,
            current: q.current_usage,
            total: q.total,
        })
        .collect();

    format_usage_report(ReportSource::Live, Some(&model), Some(&tool), &quotas)
}

fn display_or_na(value: Option<i64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// Format an integer with `,` between groups of three digits.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Escape the three characters Telegram's HTML parse mode reserves.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}
