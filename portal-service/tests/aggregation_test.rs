//! End-to-end report aggregation over constructed transaction sets.

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use portal_service::models::{
    BreakdownItem, ServiceSnapshot, Transaction, TransactionStatus,
};
use portal_service::services::reports::{
    aggregate, Period, ReportParams, SeriesDimension, ServiceScope,
};

fn tx(
    service_id: &str,
    service_name: &str,
    channel: Option<&str>,
    status: TransactionStatus,
    amount_minor: i64,
    date: (i32, u32, u32),
) -> Transaction {
    let when = Utc
        .with_ymd_and_hms(date.0, date.1, date.2, 12, 0, 0)
        .unwrap();
    let when = bson::DateTime::from_chrono(when);
    Transaction {
        id: Uuid::new_v4(),
        reference: format!("LGU-{}", Uuid::new_v4().simple()),
        user_id: Uuid::new_v4(),
        service: ServiceSnapshot {
            service_id: service_id.to_string(),
            name: service_name.to_string(),
        },
        channel: channel.map(str::to_string),
        status,
        breakdown: vec![BreakdownItem {
            label: "Fee".to_string(),
            amount_minor,
        }],
        total_amount_minor: amount_minor,
        currency: "PHP".to_string(),
        data: bson::Document::new(),
        provider: None,
        transaction_date: Some(when),
        created_at: when,
        updated_at: when,
    }
}

fn params(period: Period) -> ReportParams {
    ReportParams {
        period,
        from: None,
        to: None,
        service_id: None,
        channel: None,
        status: None,
        series_by: None,
        scope: None,
    }
}

#[test]
fn monthly_rollup_counts_revenue_and_success_rate() {
    let transactions = vec![
        tx("business_permit", "Business Permit", Some("gcash"), TransactionStatus::Paid, 100, (2024, 1, 5)),
        tx("business_permit", "Business Permit", Some("gcash"), TransactionStatus::Failed, 50, (2024, 2, 10)),
        tx("business_permit", "Business Permit", Some("otc"), TransactionStatus::Completed, 200, (2024, 2, 20)),
    ];

    let report = aggregate(&transactions, &params(Period::Month));

    assert_eq!(report.period, "month");
    assert_eq!(report.series.len(), 2);

    let jan = &report.series[0];
    assert_eq!(jan.bucket, "2024-01");
    assert_eq!(jan.count, 1);
    assert_eq!(jan.revenue_minor, 100);
    assert_eq!(jan.success_count, 1);
    assert!((jan.success_rate - 100.0).abs() < f64::EPSILON);

    let feb = &report.series[1];
    assert_eq!(feb.bucket, "2024-02");
    assert_eq!(feb.count, 2);
    assert_eq!(feb.revenue_minor, 250);
    assert_eq!(feb.success_count, 1);
    assert!((feb.success_rate - 50.0).abs() < f64::EPSILON);

    assert_eq!(report.totals.count, 3);
    assert_eq!(report.totals.revenue_minor, 350);
    assert_eq!(report.totals.success_count, 2);
}

#[test]
fn bucketing_uses_utc_not_local_time() {
    // 2024-01-31T23:30Z belongs to January regardless of the host timezone.
    let when = Utc.with_ymd_and_hms(2024, 1, 31, 23, 30, 0).unwrap();
    let mut t = tx(
        "community_tax",
        "Community Tax Certificate",
        None,
        TransactionStatus::Paid,
        75,
        (2024, 1, 31),
    );
    t.transaction_date = Some(bson::DateTime::from_chrono(when));

    let report = aggregate(&[t], &params(Period::Month));
    assert_eq!(report.series.len(), 1);
    assert_eq!(report.series[0].bucket, "2024-01");
}

#[test]
fn effective_date_falls_back_to_created_at() {
    let mut t = tx(
        "civil_registry",
        "Civil Registry",
        None,
        TransactionStatus::Paid,
        120,
        (2024, 3, 15),
    );
    t.transaction_date = None;

    let report = aggregate(&[t], &params(Period::Day));
    assert_eq!(report.series[0].bucket, "2024-03-15");
}

#[test]
fn only_paid_and_completed_count_as_successful() {
    let transactions = vec![
        tx("s", "S", None, TransactionStatus::Pending, 10, (2024, 1, 1)),
        tx("s", "S", None, TransactionStatus::AwaitingPayment, 10, (2024, 1, 1)),
        tx("s", "S", None, TransactionStatus::Paid, 10, (2024, 1, 1)),
        tx("s", "S", None, TransactionStatus::Completed, 10, (2024, 1, 1)),
        tx("s", "S", None, TransactionStatus::Failed, 10, (2024, 1, 1)),
        tx("s", "S", None, TransactionStatus::Refunded, 10, (2024, 1, 1)),
    ];

    let report = aggregate(&transactions, &params(Period::Year));
    assert_eq!(report.totals.count, 6);
    assert_eq!(report.totals.success_count, 2);
}

#[test]
fn empty_input_produces_zeroed_totals_and_no_buckets() {
    let report = aggregate(&[], &params(Period::Week));
    assert!(report.series.is_empty());
    assert_eq!(report.totals.count, 0);
    assert_eq!(report.totals.revenue_minor, 0);
    assert_eq!(report.totals.success_rate, 0.0);
}

#[test]
fn scope_filters_by_id_or_historical_name() {
    let catalog = vec![(
        "business_permit".to_string(),
        "Business Permit".to_string(),
    )];
    let scope = ServiceScope::normalize(&["business_permit".to_string()], &catalog);

    let transactions = vec![
        // Matches by id even though the snapshot name is a legacy label.
        tx("business_permit", "Permit (2019 label)", None, TransactionStatus::Paid, 100, (2024, 1, 1)),
        // Matches by name even though the id predates the slug scheme.
        tx("svc-17", "Business Permit", None, TransactionStatus::Paid, 200, (2024, 1, 2)),
        // Outside the scope entirely.
        tx("market_stall_rental", "Market Stall Rental", None, TransactionStatus::Paid, 400, (2024, 1, 3)),
    ];

    let mut p = params(Period::Month);
    p.scope = Some(scope);
    let report = aggregate(&transactions, &p);

    assert_eq!(report.totals.count, 2);
    assert_eq!(report.totals.revenue_minor, 300);
}

#[test]
fn date_bounds_are_inclusive() {
    let transactions = vec![
        tx("s", "S", None, TransactionStatus::Paid, 1, (2024, 1, 1)),
        tx("s", "S", None, TransactionStatus::Paid, 2, (2024, 1, 15)),
        tx("s", "S", None, TransactionStatus::Paid, 4, (2024, 2, 1)),
    ];

    let mut p = params(Period::Day);
    p.from = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    p.to = Some(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap());
    let report = aggregate(&transactions, &p);

    assert_eq!(report.totals.count, 2);
    assert_eq!(report.totals.revenue_minor, 3);
}

#[test]
fn dimension_series_split_by_channel_sorted_by_revenue() {
    let transactions = vec![
        tx("s", "S", Some("gcash"), TransactionStatus::Paid, 100, (2024, 1, 5)),
        tx("s", "S", Some("gcash"), TransactionStatus::Paid, 100, (2024, 2, 5)),
        tx("s", "S", Some("otc"), TransactionStatus::Paid, 500, (2024, 1, 8)),
        tx("s", "S", None, TransactionStatus::Paid, 50, (2024, 1, 9)),
    ];

    let mut p = params(Period::Month);
    p.series_by = Some(SeriesDimension::Channel);
    let report = aggregate(&transactions, &p);

    let series = report.series_by.expect("dimension series requested");
    let keys: Vec<&str> = series.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, vec!["otc", "gcash", "unknown"]);

    let gcash = &series[1];
    assert_eq!(gcash.revenue_minor, 200);
    assert_eq!(gcash.points.len(), 2);
    assert_eq!(gcash.points[0].bucket, "2024-01");
    assert_eq!(gcash.points[1].bucket, "2024-02");
}

#[test]
fn service_breakdown_keys_on_display_name() {
    let transactions = vec![
        tx("business_permit", "Business Permit", None, TransactionStatus::Paid, 300, (2024, 1, 1)),
        tx("civil_registry", "Civil Registry", None, TransactionStatus::Failed, 900, (2024, 1, 2)),
    ];

    let report = aggregate(&transactions, &params(Period::Month));
    assert_eq!(report.by_service.len(), 2);
    // Sorted by revenue descending.
    assert_eq!(report.by_service[0].key, "Civil Registry");
    assert_eq!(report.by_service[0].revenue_minor, 900);
    assert_eq!(report.by_service[0].success_count, 0);
    assert_eq!(report.by_service[1].key, "Business Permit");
    assert!((report.by_service[1].success_rate - 100.0).abs() < f64::EPSILON);
}
