// ── Domain model ──
//
// Rows are cached untyped (`Record`); the typed structs below are views
// decoded from them on demand.

pub mod client;
pub mod knowledge;
pub mod notification;
pub mod record;
pub mod resource;
pub mod technician;
pub mod ticket;

use serde::de::DeserializeOwned;

pub use client::{Client, ClientDraft};
pub use knowledge::{Article, Category};
pub use notification::Notification;
pub use record::{Record, RowId, Rows, decode_all, to_row};
pub use resource::Resource;
pub use technician::Technician;
pub use ticket::{Ticket, TicketDraft, TicketPriority, TicketStatus};

/// A typed view over one resource's rows.
pub trait Entity: DeserializeOwned {
    const RESOURCE: Resource;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ticket_decodes_with_defaults() {
        let record = Record::from_row(
            json!({ "id": "t1", "title": "Printer jam", "status": "in_progress" })
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap();
        let ticket: Ticket = record.decode().unwrap();
        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert_eq!(ticket.priority, TicketPriority::Medium);
        assert!(ticket.is_open());
        assert!(ticket.assigned_to.is_none());
    }

    #[test]
    fn drafts_serialize_only_set_fields() {
        let draft = TicketDraft {
            status: Some(TicketStatus::Resolved),
            ..TicketDraft::default()
        };
        let row = to_row(&draft).unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row["status"], "resolved");
    }

    #[test]
    fn technician_defaults_to_active() {
        let tech: Technician = serde_json::from_value(json!({ "id": 3, "name": "Sam" })).unwrap();
        assert!(tech.active);
        assert_eq!(tech.id, RowId::Int(3));
    }
}
