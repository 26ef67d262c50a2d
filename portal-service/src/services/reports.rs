//! Transaction aggregation reporting engine.
//!
//! Exact-match, scope, and date-bound filtering is pushed into the MongoDB
//! query (`build_filter`); bucket truncation and the rollups run in-process
//! over the filtered set (`aggregate`). Truncation always uses UTC calendar
//! boundaries, never the process-local timezone, and all monetary figures stay
//! integer minor units end to end.

use bson::{doc, Document};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::models::{ServiceSnapshot, Transaction, TransactionStatus};
use crate::services::ServiceError;

/// Time bucket granularity for report series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    /// Rejected synchronously, before any query runs.
    pub fn parse(s: &str) -> Result<Self, ServiceError> {
        match s {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            other => Err(ServiceError::InvalidPeriod(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }
}

/// Optional secondary dimension for the crossed (dimension x bucket) series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesDimension {
    Service,
    Channel,
    Status,
}

impl SeriesDimension {
    pub fn parse(s: &str) -> Result<Self, ServiceError> {
        match s {
            "service" => Ok(SeriesDimension::Service),
            "channel" => Ok(SeriesDimension::Channel),
            "status" => Ok(SeriesDimension::Status),
            other => Err(ServiceError::InvalidParameter(format!(
                "unknown series dimension: {}",
                other
            ))),
        }
    }
}

/// A permission scope normalized for dual matching.
///
/// Admin scope lists may name services by canonical id or by display name, and
/// historical transactions may have stored either on their service snapshot, so
/// every scope entry is expanded against the catalog into both forms and a
/// transaction matches on either field.
#[derive(Debug, Clone)]
pub struct ServiceScope {
    ids: HashSet<String>,
    names: HashSet<String>,
}

impl ServiceScope {
    pub fn normalize(allowed: &[String], catalog: &[(String, String)]) -> Self {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();

        for entry in allowed {
            let mut matched = false;
            for (id, name) in catalog {
                if entry == id || entry.eq_ignore_ascii_case(name) {
                    ids.insert(id.clone());
                    names.insert(name.clone());
                    matched = true;
                }
            }
            // Unknown entries are kept verbatim so a scope referencing a
            // since-deleted service still matches its historical records.
            if !matched {
                ids.insert(entry.clone());
                names.insert(entry.clone());
            }
        }

        Self { ids, names }
    }

    pub fn matches(&self, snapshot: &ServiceSnapshot) -> bool {
        self.ids.contains(&snapshot.service_id) || self.names.contains(&snapshot.name)
    }

    pub fn id_list(&self) -> Vec<String> {
        let mut v: Vec<String> = self.ids.iter().cloned().collect();
        v.sort();
        v
    }

    pub fn name_list(&self) -> Vec<String> {
        let mut v: Vec<String> = self.names.iter().cloned().collect();
        v.sort();
        v
    }
}

/// Fully-parsed report request.
#[derive(Debug, Clone)]
pub struct ReportParams {
    pub period: Period,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub service_id: Option<String>,
    pub channel: Option<String>,
    pub status: Option<TransactionStatus>,
    pub series_by: Option<SeriesDimension>,
    pub scope: Option<ServiceScope>,
}

/// Parse an ISO date bound: RFC 3339, or a bare date which covers the whole UTC
/// day (start-of-day for `from`, end-of-day for `to`).
pub fn parse_date_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, ServiceError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ServiceError::InvalidParameter(format!("invalid date bound: {}", value))
    })?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
    } else {
        NaiveTime::MIN
    };
    Ok(DateTime::from_naive_utc_and_offset(date.and_time(time), Utc))
}

/// Truncate a date to the UTC calendar boundary of the period.
///
/// day -> "YYYY-MM-DD", week -> the ISO week's Monday as "YYYY-MM-DD",
/// month -> "YYYY-MM", year -> "YYYY". Keys sort chronologically within one
/// period.
pub fn bucket_key(date: DateTime<Utc>, period: Period) -> String {
    match period {
        Period::Day => date.format("%Y-%m-%d").to_string(),
        Period::Week => {
            let day = date.date_naive();
            let monday = day - Duration::days(day.weekday().num_days_from_monday() as i64);
            monday.format("%Y-%m-%d").to_string()
        }
        Period::Month => date.format("%Y-%m").to_string(),
        Period::Year => date.format("%Y").to_string(),
    }
}

/// MongoDB filter for the report's exact-match, scope, and date constraints.
pub fn build_filter(params: &ReportParams) -> Document {
    let mut clauses: Vec<Document> = Vec::new();

    if let Some(service_id) = &params.service_id {
        clauses.push(doc! { "service.service_id": service_id });
    }
    if let Some(channel) = &params.channel {
        clauses.push(doc! { "channel": channel });
    }
    if let Some(status) = &params.status {
        clauses.push(doc! { "status": status.as_str() });
    }
    if let Some(scope) = &params.scope {
        clauses.push(doc! {
            "$or": [
                { "service.service_id": { "$in": scope.id_list() } },
                { "service.name": { "$in": scope.name_list() } },
            ]
        });
    }

    if params.from.is_some() || params.to.is_some() {
        let mut range = Document::new();
        if let Some(from) = params.from {
            range.insert("$gte", bson::DateTime::from_chrono(from));
        }
        if let Some(to) = params.to {
            range.insert("$lte", bson::DateTime::from_chrono(to));
        }
        // The business date governs bucketing but may be absent; fall back to
        // the creation timestamp, mirroring `Transaction::effective_date`.
        clauses.push(doc! {
            "$or": [
                { "transaction_date": range.clone() },
                { "transaction_date": null, "created_at": range },
            ]
        });
    }

    if clauses.is_empty() {
        doc! {}
    } else {
        doc! { "$and": clauses }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BucketPoint {
    pub bucket: String,
    pub count: u64,
    pub revenue_minor: i64,
    pub success_count: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakdownRow {
    pub key: String,
    pub count: u64,
    pub revenue_minor: i64,
    pub success_count: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Totals {
    pub count: u64,
    pub revenue_minor: i64,
    pub success_count: u64,
    pub success_rate: f64,
}

/// One time-bucketed series per distinct dimension value.
#[derive(Debug, Clone, Serialize)]
pub struct DimensionSeries {
    pub key: String,
    pub revenue_minor: i64,
    pub points: Vec<BucketPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub period: String,
    pub series: Vec<BucketPoint>,
    pub by_service: Vec<BreakdownRow>,
    pub by_channel: Vec<BreakdownRow>,
    pub totals: Totals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_by: Option<Vec<DimensionSeries>>,
}

#[derive(Default, Clone, Copy)]
struct Acc {
    count: u64,
    revenue_minor: i64,
    success_count: u64,
}

impl Acc {
    fn add(&mut self, tx: &Transaction) {
        self.count += 1;
        self.revenue_minor += tx.total_amount_minor;
        if tx.status.is_successful() {
            self.success_count += 1;
        }
    }
}

/// Success rate in percent; defined as 0 for empty buckets.
fn rate(success: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        100.0 * success as f64 / count as f64
    }
}

fn dimension_value(tx: &Transaction, dimension: SeriesDimension) -> String {
    match dimension {
        SeriesDimension::Service => tx.service.name.clone(),
        SeriesDimension::Channel => tx
            .channel
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        SeriesDimension::Status => tx.status.as_str().to_string(),
    }
}

fn within_bounds(
    date: DateTime<Utc>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> bool {
    if let Some(from) = from {
        if date < from {
            return false;
        }
    }
    if let Some(to) = to {
        if date > to {
            return false;
        }
    }
    true
}

/// Roll a filtered transaction set up into the report.
///
/// The fold is pure: given the same transactions and parameters it always
/// produces the same report, regardless of the process timezone or locale.
pub fn aggregate(transactions: &[Transaction], params: &ReportParams) -> AggregateReport {
    let mut buckets: BTreeMap<String, Acc> = BTreeMap::new();
    let mut by_service: BTreeMap<String, Acc> = BTreeMap::new();
    let mut by_channel: BTreeMap<String, Acc> = BTreeMap::new();
    let mut crossed: BTreeMap<String, BTreeMap<String, Acc>> = BTreeMap::new();
    let mut totals = Acc::default();

    for tx in transactions {
        let date = tx.effective_date();
        // The query already constrained dates; re-checking here keeps the
        // fallback semantics exact when both date fields were in range of the
        // loose `$or` filter.
        if !within_bounds(date, params.from, params.to) {
            continue;
        }
        if let Some(scope) = &params.scope {
            if !scope.matches(&tx.service) {
                continue;
            }
        }

        let bucket = bucket_key(date, params.period);
        buckets.entry(bucket.clone()).or_default().add(tx);
        by_service
            .entry(tx.service.name.clone())
            .or_default()
            .add(tx);
        by_channel
            .entry(
                tx.channel
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            )
            .or_default()
            .add(tx);
        totals.add(tx);

        if let Some(dimension) = params.series_by {
            crossed
                .entry(dimension_value(tx, dimension))
                .or_default()
                .entry(bucket)
                .or_default()
                .add(tx);
        }
    }

    let series = buckets
        .into_iter()
        .map(|(bucket, acc)| BucketPoint {
            bucket,
            count: acc.count,
            revenue_minor: acc.revenue_minor,
            success_count: acc.success_count,
            success_rate: rate(acc.success_count, acc.count),
        })
        .collect();

    let series_by = params.series_by.map(|_| {
        let mut dimension_series: Vec<DimensionSeries> = crossed
            .into_iter()
            .map(|(key, buckets)| {
                let revenue_minor = buckets.values().map(|acc| acc.revenue_minor).sum();
                let points = buckets
                    .into_iter()
                    .map(|(bucket, acc)| BucketPoint {
                        bucket,
                        count: acc.count,
                        revenue_minor: acc.revenue_minor,
                        success_count: acc.success_count,
                        success_rate: rate(acc.success_count, acc.count),
                    })
                    .collect();
                DimensionSeries {
                    key,
                    revenue_minor,
                    points,
                }
            })
            .collect();
        // Descending by total revenue; key breaks ties deterministically.
        dimension_series.sort_by(|a, b| {
            b.revenue_minor
                .cmp(&a.revenue_minor)
                .then_with(|| a.key.cmp(&b.key))
        });
        dimension_series
    });

    AggregateReport {
        period: params.period.as_str().to_string(),
        series,
        by_service: breakdown_rows(by_service),
        by_channel: breakdown_rows(by_channel),
        totals: Totals {
            count: totals.count,
            revenue_minor: totals.revenue_minor,
            success_count: totals.success_count,
            success_rate: rate(totals.success_count, totals.count),
        },
        series_by,
    }
}

fn breakdown_rows(groups: BTreeMap<String, Acc>) -> Vec<BreakdownRow> {
    let mut rows: Vec<BreakdownRow> = groups
        .into_iter()
        .map(|(key, acc)| BreakdownRow {
            key,
            count: acc.count,
            revenue_minor: acc.revenue_minor,
            success_count: acc.success_count,
            success_rate: rate(acc.success_count, acc.count),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.revenue_minor
            .cmp(&a.revenue_minor)
            .then_with(|| a.key.cmp(&b.key))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn period_parse_rejects_unknown_values() {
        assert!(Period::parse("month").is_ok());
        assert!(matches!(
            Period::parse("quarter"),
            Err(ServiceError::InvalidPeriod(_))
        ));
    }

    #[test]
    fn bucket_keys_truncate_to_utc_boundaries() {
        let date = utc(2024, 2, 10, 23);
        assert_eq!(bucket_key(date, Period::Day), "2024-02-10");
        assert_eq!(bucket_key(date, Period::Month), "2024-02");
        assert_eq!(bucket_key(date, Period::Year), "2024");
    }

    #[test]
    fn week_buckets_start_on_iso_monday() {
        // 2024-02-10 is a Saturday; its ISO week starts Monday 2024-02-05.
        assert_eq!(bucket_key(utc(2024, 2, 10, 12), Period::Week), "2024-02-05");
        // A Monday is its own week start.
        assert_eq!(bucket_key(utc(2024, 2, 5, 0), Period::Week), "2024-02-05");
        // 2021-01-01 is a Friday in ISO week 2020-W53, starting 2020-12-28.
        assert_eq!(bucket_key(utc(2021, 1, 1, 8), Period::Week), "2020-12-28");
    }

    #[test]
    fn scope_normalization_expands_ids_and_names() {
        let catalog = vec![
            ("business_permit".to_string(), "Business Permit".to_string()),
            ("civil_registry".to_string(), "Civil Registry".to_string()),
        ];
        // Scope names the service by legacy display name only.
        let scope = ServiceScope::normalize(&["Business Permit".to_string()], &catalog);

        assert!(scope.matches(&ServiceSnapshot {
            service_id: "business_permit".to_string(),
            name: "Permit (old label)".to_string(),
        }));
        assert!(scope.matches(&ServiceSnapshot {
            service_id: "legacy-0042".to_string(),
            name: "Business Permit".to_string(),
        }));
        assert!(!scope.matches(&ServiceSnapshot {
            service_id: "civil_registry".to_string(),
            name: "Civil Registry".to_string(),
        }));
    }

    #[test]
    fn scope_keeps_unknown_entries_verbatim() {
        let scope = ServiceScope::normalize(&["retired_service".to_string()], &[]);
        assert!(scope.matches(&ServiceSnapshot {
            service_id: "retired_service".to_string(),
            name: "whatever".to_string(),
        }));
    }

    #[test]
    fn filter_includes_scope_and_date_fallback() {
        let scope = ServiceScope::normalize(
            &["business_permit".to_string()],
            &[("business_permit".to_string(), "Business Permit".to_string())],
        );
        let params = ReportParams {
            period: Period::Month,
            from: Some(utc(2024, 1, 1, 0)),
            to: None,
            service_id: None,
            channel: Some("online".to_string()),
            status: None,
            series_by: None,
            scope: Some(scope),
        };

        let filter = build_filter(&params);
        let clauses = filter.get_array("$and").unwrap();
        assert_eq!(clauses.len(), 3);

        let rendered = format!("{}", filter);
        assert!(rendered.contains("service.service_id"));
        assert!(rendered.contains("service.name"));
        assert!(rendered.contains("transaction_date"));
        assert!(rendered.contains("created_at"));
    }

    #[test]
    fn empty_filter_when_no_constraints() {
        let params = ReportParams {
            period: Period::Day,
            from: None,
            to: None,
            service_id: None,
            channel: None,
            status: None,
            series_by: None,
            scope: None,
        };
        assert!(build_filter(&params).is_empty());
    }

    #[test]
    fn date_bounds_parse_both_forms() {
        let from = parse_date_bound("2024-01-05", false).unwrap();
        assert_eq!(from, utc(2024, 1, 5, 0));

        let to = parse_date_bound("2024-01-05", true).unwrap();
        assert!(to > from && bucket_key(to, Period::Day) == "2024-01-05");

        let exact = parse_date_bound("2024-01-05T10:30:00Z", false).unwrap();
        assert_eq!(exact, Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 0).unwrap());

        assert!(parse_date_bound("05/01/2024", false).is_err());
    }
}
