//! Free-text filtering over a record sequence.
//!
//! `filter` is pure: it is recomputed on every query change and keeps the
//! input order. There is no ranking.

use crate::record::FieldAccess;

/// Records where at least one of `fields` contains `query`, case-folded.
/// A blank query returns every record.
pub fn filter<'a, R: FieldAccess>(records: &'a [R], query: &str, fields: &[&str]) -> Vec<&'a R> {
    if query.trim().is_empty() {
        return records.iter().collect();
    }
    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|record| record_matches(*record, &needle, fields))
        .collect()
}

/// `needle` must already be case-folded.
fn record_matches<R: FieldAccess>(record: &R, needle: &str, fields: &[&str]) -> bool {
    fields.iter().any(|key| {
        record
            .field(key)
            .map(|value| value.to_string().to_lowercase().contains(needle))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AuditRecord, IdGenerator, SequentialIds};
    use crate::schema::{decode_fields, Schema};
    use crate::schemas::Rcm;
    use proptest::prelude::*;
    use serde_json::json;

    fn rcm(ids: &mut SequentialIds, process: &str, owner: &str) -> AuditRecord<Rcm> {
        let raw = json!({
            "refId": "P-1", "processName": process, "controlObjective": "Accuracy",
            "riskDescription": "Misstatement", "inherentRiskRating": "High",
            "controlActivity": "Review", "controlType": "Detective", "controlNature": "Manual",
            "frequency": "Monthly", "controlOwner": owner,
            "evidenceOfPerformance": "Sign-off", "residualRiskRating": "Low"
        });
        AuditRecord::from_parts(ids.next_id(), decode_fields::<Rcm>(&raw).unwrap())
    }

    fn sample() -> Vec<AuditRecord<Rcm>> {
        let mut ids = SequentialIds::new("rcm");
        vec![
            rcm(&mut ids, "Procure to Pay", "AP Lead"),
            rcm(&mut ids, "Order to Cash", "Controller"),
            rcm(&mut ids, "Payroll", "HR Manager"),
        ]
    }

    #[test]
    fn test_blank_query_is_identity() {
        let records = sample();
        let all: Vec<_> = records.iter().collect();
        assert_eq!(filter(&records, "", Rcm::SEARCHABLE), all);
        assert_eq!(filter(&records, "   ", Rcm::SEARCHABLE), all);
    }

    #[test]
    fn test_case_insensitive_substring() {
        let records = sample();
        let hits = filter(&records, "PAY", Rcm::SEARCHABLE);
        let names: Vec<_> = hits.iter().map(|r| r.text("processName")).collect();
        assert_eq!(names, vec!["Procure to Pay", "Payroll"]);
    }

    #[test]
    fn test_only_configured_fields_are_searched() {
        let records = sample();
        // "Monthly" lives in `frequency`, which is not searchable.
        assert!(filter(&records, "monthly", Rcm::SEARCHABLE).is_empty());
        assert_eq!(filter(&records, "monthly", &["frequency"]).len(), 3);
    }

    fn arb_records() -> impl Strategy<Value = Vec<AuditRecord<Rcm>>> {
        prop::collection::vec(("[a-zA-Z ]{0,12}", "[a-zA-Z ]{0,12}"), 0..16).prop_map(|pairs| {
            let mut ids = SequentialIds::new("rcm");
            pairs.iter().map(|(p, o)| rcm(&mut ids, p, o)).collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: std::env::var("PROPTEST_CASES").ok().and_then(|s| s.parse().ok()).unwrap_or(64),
            failure_persistence: None,
            ..ProptestConfig::default()
        })]

        #[test]
        fn prop_filter_is_ordered_subsequence(records in arb_records(), query in "[a-zA-Z]{1,3}") {
            let hits = filter(&records, &query, Rcm::SEARCHABLE);
            let needle = query.to_lowercase();

            let mut cursor = records.iter();
            for hit in &hits {
                prop_assert!(cursor.any(|r| r.id() == hit.id()), "out of order or foreign record");
                prop_assert!(Rcm::SEARCHABLE.iter().any(|k| hit.text(k).to_lowercase().contains(&needle)));
            }
        }

        #[test]
        fn prop_blank_query_identity(records in arb_records(), blank in "[ \t]{0,4}") {
            let hits = filter(&records, &blank, Rcm::SEARCHABLE);
            prop_assert_eq!(hits.len(), records.len());
            for (hit, record) in hits.iter().zip(&records) {
                prop_assert_eq!(*hit, record);
            }
        }
    }
}
