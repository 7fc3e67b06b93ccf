//! Turns diagnostic sub-query results into a ranked report.
//!
//! Every candidate cause gets an `impact`: the signed share of the overall
//! change it explains. Contribution members use their own delta over the
//! total delta; coverage and exception metrics use their relative change
//! over the target's relative change, capped at 1 in magnitude. Causes are
//! ranked by `|impact|`. Diagnostic targets are additive, so the overall
//! current and baseline values are the sums over contribution members.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::config::DiagnosticSettings;
use crate::planner::PERIOD_COLUMN;

use super::diagnostic::{DiagnosticError, SubQuery, SubQueryKind};
use super::executor::ResultSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn classify(impact: f64, settings: &DiagnosticSettings) -> Self {
        let magnitude = impact.abs();
        if magnitude >= settings.high_threshold {
            Severity::High
        } else if magnitude >= settings.medium_threshold {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cause {
    pub kind: SubQueryKind,
    pub label: String,
    pub current: f64,
    pub baseline: f64,
    pub change: f64,
    pub impact: f64,
    pub severity: Severity,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub bucket: Value,
    pub period: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub metric: String,
    pub current: f64,
    pub baseline: f64,
    pub change: f64,
    /// Relative change; absent when the baseline is zero.
    pub change_pct: Option<f64>,
    pub trend: Vec<TrendPoint>,
    /// Ranked by impact, strongest first.
    pub causes: Vec<Cause>,
    pub summary: String,
}

/// Build the report. `results[i]` belongs to `sub_queries[i]`.
pub(crate) fn synthesize(
    metric: &str,
    sub_queries: &[SubQuery],
    results: &[ResultSet],
    settings: &DiagnosticSettings,
) -> Result<DiagnosticReport, DiagnosticError> {
    let mut trend = Vec::new();
    let mut members: Option<(String, BTreeMap<String, (f64, f64)>)> = None;
    let mut side_metrics = Vec::new();

    for (sub, rs) in sub_queries.iter().zip(results) {
        let resolved = &sub.query.resolved;
        match sub.kind {
            SubQueryKind::Trend => {
                let bucket = first_dimension(sub)?;
                trend = trend_points(rs, sub.kind, bucket, metric)?;
            }
            SubQueryKind::Contribution => {
                let drill = first_dimension(sub)?;
                members = Some((drill.to_string(), member_totals(rs, sub.kind, drill, metric)?));
            }
            SubQueryKind::Coverage | SubQueryKind::Exception => {
                let name = resolved.metrics.first().ok_or_else(|| malformed(sub.kind, "no metric"))?;
                let (current, baseline) = period_totals(rs, sub.kind, name)?;
                side_metrics.push((sub.kind, name.clone(), current, baseline));
            }
        }
    }

    let (drill, members) =
        members.ok_or_else(|| malformed(SubQueryKind::Contribution, "sub-query missing"))?;
    let current: f64 = members.values().map(|(c, _)| c).sum();
    let baseline: f64 = members.values().map(|(_, b)| b).sum();
    let change = current - baseline;
    let change_pct = relative(current, baseline);

    let mut causes = Vec::new();
    for (label, (cur, base)) in &members {
        let delta = cur - base;
        if delta == 0.0 {
            continue;
        }
        let impact = if change != 0.0 { delta / change } else { 0.0 };
        let recommendation = if change != 0.0 && delta.signum() == change.signum() {
            format!(
                "{drill} '{label}' accounts for {:.0}% of the {} in {metric}; review it first",
                impact * 100.0,
                direction(change, "increase", "decrease"),
            )
        } else {
            format!(
                "{drill} '{label}' moved against the overall change ({delta:+.2}) and offsets part of it"
            )
        };
        causes.push(Cause {
            kind: SubQueryKind::Contribution,
            label: format!("{drill} = {label}"),
            current: *cur,
            baseline: *base,
            change: delta,
            impact,
            severity: Severity::classify(impact, settings),
            recommendation,
        });
    }

    for (kind, name, cur, base) in side_metrics {
        let own = relative(cur, base);
        let impact = match (own, change_pct) {
            (Some(own), Some(target)) if target != 0.0 => (own / target).clamp(-1.0, 1.0),
            _ => 0.0,
        };
        let shift = own
            .map(|p| format!("changed by {:+.1}%", p * 100.0))
            .unwrap_or_else(|| format!("went from {base:.2} to {cur:.2}"));
        let recommendation = match kind {
            SubQueryKind::Coverage => {
                format!("{name} {shift}; check whether reach or distribution shifted")
            }
            _ => format!("{name} {shift}; review the underlying exception cases"),
        };
        causes.push(Cause {
            kind,
            label: name,
            current: cur,
            baseline: base,
            change: cur - base,
            impact,
            severity: Severity::classify(impact, settings),
            recommendation,
        });
    }

    causes.sort_by(|a, b| b.impact.abs().total_cmp(&a.impact.abs()));

    let mut summary = format!(
        "{metric} {} from {baseline:.2} to {current:.2}",
        if change == 0.0 {
            "was unchanged"
        } else {
            direction(change, "rose", "fell")
        }
    );
    if let Some(pct) = change_pct {
        summary.push_str(&format!(" ({:+.1}%)", pct * 100.0));
    }
    if let Some(top) = causes.first() {
        summary.push_str(&format!("; top cause: {} ({})", top.label, top.severity));
    }

    Ok(DiagnosticReport {
        metric: metric.to_string(),
        current,
        baseline,
        change,
        change_pct,
        trend,
        causes,
        summary,
    })
}

fn direction(change: f64, up: &'static str, down: &'static str) -> &'static str {
    if change >= 0.0 {
        up
    } else {
        down
    }
}

fn relative(current: f64, baseline: f64) -> Option<f64> {
    (baseline != 0.0).then(|| (current - baseline) / baseline)
}

fn malformed(kind: SubQueryKind, reason: impl Into<String>) -> DiagnosticError {
    DiagnosticError::MalformedResult {
        kind,
        reason: reason.into(),
    }
}

fn first_dimension(sub: &SubQuery) -> Result<&str, DiagnosticError> {
    sub.query
        .resolved
        .dimensions
        .first()
        .map(String::as_str)
        .ok_or_else(|| malformed(sub.kind, "no dimension"))
}

fn column(rs: &ResultSet, kind: SubQueryKind, name: &str) -> Result<usize, DiagnosticError> {
    rs.column_index(name)
        .ok_or_else(|| malformed(kind, format!("missing column '{name}'")))
}

fn number(value: &Value, kind: SubQueryKind) -> Result<f64, DiagnosticError> {
    match value {
        Value::Null => Ok(0.0),
        Value::Number(n) => n.as_f64().ok_or_else(|| malformed(kind, "number out of range")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| malformed(kind, format!("non-numeric value '{s}'"))),
        other => Err(malformed(kind, format!("non-numeric value {other}"))),
    }
}

fn cell(row: &[Value], index: usize) -> &Value {
    row.get(index).unwrap_or(&Value::Null)
}

fn label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "(null)".to_string(),
        other => other.to_string(),
    }
}

fn is_current(row: &[Value], period: usize) -> bool {
    cell(row, period).as_str() == Some("current")
}

fn period_totals(
    rs: &ResultSet,
    kind: SubQueryKind,
    metric: &str,
) -> Result<(f64, f64), DiagnosticError> {
    let value = column(rs, kind, metric)?;
    let period = column(rs, kind, PERIOD_COLUMN)?;
    let (mut current, mut baseline) = (0.0, 0.0);
    for row in &rs.rows {
        let v = number(cell(row, value), kind)?;
        if is_current(row, period) {
            current += v;
        } else {
            baseline += v;
        }
    }
    Ok((current, baseline))
}

fn member_totals(
    rs: &ResultSet,
    kind: SubQueryKind,
    dimension: &str,
    metric: &str,
) -> Result<BTreeMap<String, (f64, f64)>, DiagnosticError> {
    let member = column(rs, kind, dimension)?;
    let value = column(rs, kind, metric)?;
    let period = column(rs, kind, PERIOD_COLUMN)?;

    let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for row in &rs.rows {
        let v = number(cell(row, value), kind)?;
        let entry = totals.entry(label(cell(row, member))).or_default();
        if is_current(row, period) {
            entry.0 += v;
        } else {
            entry.1 += v;
        }
    }
    Ok(totals)
}

fn trend_points(
    rs: &ResultSet,
    kind: SubQueryKind,
    bucket: &str,
    metric: &str,
) -> Result<Vec<TrendPoint>, DiagnosticError> {
    let bucket_idx = column(rs, kind, bucket)?;
    let value = column(rs, kind, metric)?;
    let period = rs.column_index(PERIOD_COLUMN);

    rs.rows
        .iter()
        .map(|row| {
            Ok(TrendPoint {
                bucket: cell(row, bucket_idx).clone(),
                period: period.and_then(|p| cell(row, p).as_str().map(String::from)),
                value: number(cell(row, value), kind)?,
            })
        })
        .collect()
}
