// ── Collection patches ──
//
// Pure functions from (previous collection, server row) to the next
// collection. Keyed by id, so applying the same patch twice is a no-op.

use crate::model::{Record, RowId};

/// Replace the row with the same id, or append it.
pub fn upsert_record(rows: &[Record], record: &Record) -> Vec<Record> {
    let mut next = rows.to_vec();
    match next.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => existing.clone_from(record),
        None => next.push(record.clone()),
    }
    next
}

/// Drop the row with `id`, if present.
pub fn remove_record(rows: &[Record], id: &RowId) -> Vec<Record> {
    rows.iter().filter(|r| r.id != *id).cloned().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(id: &str, name: &str) -> Record {
        Record::new(id, json!({ "name": name }).as_object().cloned().unwrap())
    }

    #[test]
    fn upsert_replaces_matching_id() {
        let rows = vec![record("c-1", "Acme"), record("c-2", "Globex")];
        let next = upsert_record(&rows, &record("c-2", "Globex Retail"));
        assert_eq!(next.len(), 2);
        assert_eq!(next[1].str_field("name"), Some("Globex Retail"));
    }

    #[test]
    fn upsert_appends_new_rows() {
        let rows = vec![record("c-1", "Acme")];
        let next = upsert_record(&rows, &record("c-9", "Hooli"));
        assert_eq!(next.len(), 2);
        assert_eq!(next[1].id, RowId::from("c-9"));
    }

    #[test]
    fn upsert_is_idempotent() {
        let rows = vec![record("t-1", "VPN"), record("t-2", "Printer")];
        let server = record("t-3", "Laptop");
        let once = upsert_record(&rows, &server);
        let twice = upsert_record(&once, &server);
        assert_eq!(once, twice);

        let updated = record("t-1", "VPN fixed");
        let once = upsert_record(&rows, &updated);
        assert_eq!(upsert_record(&once, &updated), once);
    }

    #[test]
    fn remove_is_idempotent() {
        let rows = vec![record("a-1", "x"), record("a-2", "y")];
        let once = remove_record(&rows, &RowId::from("a-1"));
        assert_eq!(once.len(), 1);
        assert_eq!(remove_record(&once, &RowId::from("a-1")), once);
    }
}
