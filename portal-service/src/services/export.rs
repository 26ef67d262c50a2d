//! CSV export of transaction listings.

use crate::models::Transaction;

const HEADER: &str =
    "reference,service_id,service_name,channel,status,total_amount_minor,currency,date\n";

/// Render transactions as CSV, one row per transaction, RFC 4180 quoting.
pub fn transactions_to_csv(transactions: &[Transaction]) -> String {
    let mut out = String::with_capacity(HEADER.len() + transactions.len() * 96);
    out.push_str(HEADER);
    for tx in transactions {
        let row = [
            tx.reference.clone(),
            tx.service.service_id.clone(),
            tx.service.name.clone(),
            tx.channel.clone().unwrap_or_default(),
            tx.status.as_str().to_string(),
            tx.total_amount_minor.to_string(),
            tx.currency.clone(),
            tx.effective_date().to_rfc3339(),
        ];
        let mut first = true;
        for field in row {
            if !first {
                out.push(',');
            }
            first = false;
            out.push_str(&escape_csv(&field));
        }
        out.push('\n');
    }
    out
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BreakdownItem, ServiceSnapshot, TransactionStatus};
    use uuid::Uuid;

    fn sample(reference: &str, name: &str) -> Transaction {
        let now = bson::DateTime::now();
        Transaction {
            id: Uuid::new_v4(),
            reference: reference.to_string(),
            user_id: Uuid::new_v4(),
            service: ServiceSnapshot {
                service_id: "business_permit".to_string(),
                name: name.to_string(),
            },
            channel: Some("gcash".to_string()),
            status: TransactionStatus::Paid,
            breakdown: vec![BreakdownItem {
                label: "Base fee".to_string(),
                amount_minor: 50_000,
            }],
            total_amount_minor: 50_000,
            currency: "PHP".to_string(),
            data: bson::Document::new(),
            provider: None,
            transaction_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn exports_header_and_one_row_per_transaction() {
        let csv = transactions_to_csv(&[sample("LGU-AAAA2222", "Business Permit")]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("reference,service_id"));
        assert!(lines[1].starts_with("LGU-AAAA2222,business_permit,Business Permit,gcash,paid,50000,PHP,"));
    }

    #[test]
    fn fields_with_commas_and_quotes_are_quoted() {
        let csv = transactions_to_csv(&[sample("LGU-BBBB3333", "Permits, \"Misc\"")]);
        assert!(csv.contains("\"Permits, \"\"Misc\"\"\""));
    }

    #[test]
    fn empty_export_is_just_the_header() {
        assert_eq!(transactions_to_csv(&[]), HEADER);
    }
}
