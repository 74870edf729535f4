// ── Row identity and untyped records ──
//
// The cache stores rows as `Record`s: an id plus the remaining columns.
// Typed views (Client, Ticket, ...) are decoded on demand, so a schema
// addition on the backend never breaks caching or patching.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use deskflow_api::Row;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;

/// A cached collection. Cheap to clone and hand to observers.
pub type Rows = Arc<Vec<Record>>;

// ── RowId ────────────────────────────────────────────────────────────

/// Primary key of a row.
///
/// The backend uses UUID keys; seeded mock data and older tables use plain
/// strings or integers. Callers compare and display ids without caring.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Uuid(Uuid),
    Int(i64),
    Text(String),
}

impl RowId {
    pub fn as_uuid(&self) -> Option<&Uuid> {
        match self {
            Self::Uuid(u) => Some(u),
            Self::Int(_) | Self::Text(_) => None,
        }
    }

    /// Value form, for matching against raw row columns.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Uuid(u) => Value::String(u.to_string()),
            Self::Int(n) => Value::from(*n),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for RowId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_owned()))
    }
}

impl From<Uuid> for RowId {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<i64> for RowId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        match Uuid::parse_str(&s) {
            Ok(u) => Self::Uuid(u),
            Err(_) => Self::Text(s),
        }
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

// ── Record ───────────────────────────────────────────────────────────

/// One row: its id plus every other column, verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RowId,
    #[serde(flatten)]
    pub fields: Row,
}

impl Record {
    pub fn new(id: impl Into<RowId>, fields: Row) -> Self {
        let mut fields = fields;
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Split a raw row into id and columns. Rows without an `id` are rejected.
    pub fn from_row(mut row: Row) -> Result<Self, CoreError> {
        let id = row.remove("id").ok_or_else(|| CoreError::InvalidRecord {
            message: "row has no `id` column".into(),
        })?;
        let id: RowId = serde_json::from_value(id)?;
        Ok(Self { id, fields: row })
    }

    /// Reassemble the raw row, `id` included.
    pub fn to_row(&self) -> Row {
        let mut row = self.fields.clone();
        row.insert("id".into(), self.id.to_value());
        row
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        if column == "id" {
            return None;
        }
        self.fields.get(column)
    }

    /// String column, if present and a string.
    pub fn str_field(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(Value::as_str)
    }

    /// Decode into a typed view.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CoreError> {
        Ok(serde_json::from_value(Value::Object(self.to_row()))?)
    }
}

/// Decode every row of a collection, failing on the first bad row.
pub fn decode_all<T: DeserializeOwned>(rows: &[Record]) -> Result<Vec<T>, CoreError> {
    rows.iter().map(Record::decode).collect()
}

/// Serialize any value into a row (used for write payloads).
pub fn to_row<T: Serialize + ?Sized>(value: &T) -> Result<Row, CoreError> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(CoreError::InvalidRecord {
            message: format!("expected an object payload, got {other}"),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn row_id_parses_uuid_strings() {
        let id = RowId::from("550e8400-e29b-41d4-a716-446655440000");
        assert!(id.as_uuid().is_some());
        assert_eq!(RowId::from("t-1"), RowId::Text("t-1".into()));
    }

    #[test]
    fn row_id_deserializes_numbers_and_strings() {
        let n: RowId = serde_json::from_value(json!(42)).unwrap();
        let s: RowId = serde_json::from_value(json!("c1")).unwrap();
        assert_eq!(n, RowId::Int(42));
        assert_eq!(s.to_string(), "c1");
    }

    #[test]
    fn record_round_trips_id_column() {
        let record = Record::from_row(row(json!({ "id": "c1", "name": "Acme" }))).unwrap();
        assert_eq!(record.id, RowId::from("c1"));
        assert!(record.get("id").is_none());
        assert_eq!(record.str_field("name"), Some("Acme"));
        assert_eq!(record.to_row()["id"], "c1");
    }

    #[test]
    fn record_without_id_is_rejected() {
        let err = Record::from_row(row(json!({ "name": "nobody" }))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord { .. }));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(to_row(&vec![1, 2, 3]).is_err());
    }
}
