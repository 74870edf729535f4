// ── Change handling ──
//
// What a realtime session does with each change: synthesize a notification
// for the user, and fold the row into the cached collection.

use std::sync::Arc;

use deskflow_api::{ChangeBinding, ChangeKind, ChangePayload};
use tracing::trace;

use crate::model::{Notification, Record, Resource, Rows};
use crate::mutation::{remove_record, upsert_record};
use crate::store::QueryCache;

/// Bindings for a user's notification channel: every new ticket, updates
/// to tickets assigned to the user, and every new client.
pub fn notification_bindings(user_id: &str) -> Vec<ChangeBinding> {
    vec![
        ChangeBinding::new(ChangeKind::Insert, Resource::Tickets.table()),
        ChangeBinding::new(ChangeKind::Update, Resource::Tickets.table())
            .with_filter(format!("assigned_to=eq.{user_id}")),
        ChangeBinding::new(ChangeKind::Insert, Resource::Clients.table()),
    ]
}

fn text(change: &ChangePayload, column: &str) -> Option<String> {
    match change.record.get(column)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn is_assigned_to(change: &ChangePayload, user_id: &str) -> bool {
    text(change, "assigned_to").is_some_and(|a| a == user_id)
}

/// The notification `user_id` should see for `change`, if any.
pub fn notification_for(change: &ChangePayload, user_id: &str) -> Option<Notification> {
    let id = text(change, "id").unwrap_or_default();
    match (Resource::from_table(&change.table)?, change.kind) {
        (Resource::Tickets, ChangeKind::Insert) => {
            let title = text(change, "title").unwrap_or_else(|| "Untitled".into());
            Some(Notification::new(
                user_id,
                "New ticket",
                format!("Ticket \"{title}\" was created"),
                format!("/tickets/{id}"),
            ))
        }
        (Resource::Tickets, ChangeKind::Update) if is_assigned_to(change, user_id) => {
            let title = text(change, "title").unwrap_or_else(|| "Untitled".into());
            let message = match text(change, "status") {
                Some(status) => format!("Ticket \"{title}\" is now {}", status.replace('_', " ")),
                None => format!("Ticket \"{title}\" was updated"),
            };
            Some(Notification::new(
                user_id,
                "Ticket updated",
                message,
                format!("/tickets/{id}"),
            ))
        }
        (Resource::Clients, ChangeKind::Insert) => {
            let name = text(change, "name").unwrap_or_else(|| "A client".into());
            Some(Notification::new(
                user_id,
                "New client",
                format!("{name} was added as a client"),
                format!("/clients/{id}"),
            ))
        }
        _ => None,
    }
}

/// Fold a change into the cached collection for its table.
///
/// Only collections already in the cache are touched. Returns whether the
/// cache changed.
pub fn apply_to_cache(cache: &QueryCache<Rows>, change: &ChangePayload) -> bool {
    let Some(resource) = Resource::from_table(&change.table) else {
        return false;
    };
    let next = match change.kind {
        ChangeKind::Insert | ChangeKind::Update => {
            let Ok(record) = Record::from_row(change.record.clone()) else {
                return false;
            };
            cache.set_data(&resource.key(), |old| {
                old.map(|rows| Arc::new(upsert_record(rows, &record)))
            })
        }
        ChangeKind::Delete => {
            let Some(old) = change.old_record.clone() else {
                return false;
            };
            let Ok(record) = Record::from_row(old) else {
                return false;
            };
            cache.set_data(&resource.key(), |old| {
                old.map(|rows| Arc::new(remove_record(rows, &record.id)))
            })
        }
    };
    if next.is_some() {
        trace!(resource = %resource, kind = %change.kind, "change folded into cache");
    }
    next.is_some()
}
