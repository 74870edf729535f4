// ── Sample dashboard data for the mock source ──

use std::collections::HashMap;

use deskflow_api::Row;
use serde_json::{Value, json};

fn rows(value: Value) -> Vec<Row> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Seeded tables keyed by table name.
pub fn sample_tables() -> HashMap<String, Vec<Row>> {
    let mut tables = HashMap::new();

    tables.insert(
        "clients".to_owned(),
        rows(json!([
            { "id": "c-1", "name": "Acme Logistics", "email": "it@acme.example", "phone": "+1 555 0100", "company": "Acme", "created_at": "2026-01-12T09:15:00Z" },
            { "id": "c-2", "name": "Globex Retail", "email": "help@globex.example", "phone": "+1 555 0101", "company": "Globex", "created_at": "2026-02-03T14:02:00Z" },
            { "id": "c-3", "name": "Initech", "email": "ops@initech.example", "company": "Initech", "created_at": "2026-02-20T11:40:00Z" },
            { "id": "c-4", "name": "Umbrella Clinics", "email": "desk@umbrella.example", "phone": "+1 555 0199", "created_at": "2026-03-08T08:05:00Z" }
        ])),
    );

    tables.insert(
        "technicians".to_owned(),
        rows(json!([
            { "id": "tech-1", "name": "Dana Whitfield", "email": "dana@deskflow.example", "specialty": "networking", "active": true },
            { "id": "tech-2", "name": "Ravi Menon", "email": "ravi@deskflow.example", "specialty": "hardware", "active": true },
            { "id": "tech-3", "name": "Kim Osei", "email": "kim@deskflow.example", "specialty": "accounts", "active": false }
        ])),
    );

    tables.insert(
        "tickets".to_owned(),
        rows(json!([
            { "id": "t-1", "title": "VPN drops every hour", "status": "open", "priority": "high", "client_id": "c-1", "client_name": "Acme Logistics", "assigned_to": "tech-1", "created_at": "2026-03-10T10:00:00Z" },
            { "id": "t-2", "title": "Printer queue stuck", "status": "in_progress", "priority": "medium", "client_id": "c-2", "client_name": "Globex Retail", "assigned_to": "tech-2", "created_at": "2026-03-11T12:30:00Z" },
            { "id": "t-3", "title": "New starter laptop", "status": "open", "priority": "low", "client_id": "c-3", "client_name": "Initech", "created_at": "2026-03-12T09:45:00Z" },
            { "id": "t-4", "title": "Email bouncing for finance", "status": "resolved", "priority": "urgent", "client_id": "c-1", "client_name": "Acme Logistics", "assigned_to": "tech-1", "created_at": "2026-03-02T16:20:00Z" },
            { "id": "t-5", "title": "Reset MFA for reception", "status": "closed", "priority": "medium", "client_id": "c-4", "client_name": "Umbrella Clinics", "assigned_to": "tech-3", "created_at": "2026-02-27T07:55:00Z" }
        ])),
    );

    tables.insert(
        "categories".to_owned(),
        rows(json!([
            { "id": "cat-1", "name": "Networking", "description": "VPN, Wi-Fi and firewall guides" },
            { "id": "cat-2", "name": "Accounts", "description": "Passwords, MFA and access" },
            { "id": "cat-3", "name": "Hardware" }
        ])),
    );

    tables.insert(
        "articles".to_owned(),
        rows(json!([
            { "id": "a-1", "title": "Reconnecting the office VPN", "category_id": "cat-1", "category_name": "Networking", "published": true, "content": "Open the client, choose the office profile, sign in.", "created_at": "2026-01-20T10:00:00Z" },
            { "id": "a-2", "title": "Resetting MFA", "category_id": "cat-2", "category_name": "Accounts", "published": true, "created_at": "2026-01-28T15:00:00Z" },
            { "id": "a-3", "title": "Clearing a stuck print queue", "category_id": "cat-3", "category_name": "Hardware", "published": false, "created_at": "2026-02-14T09:30:00Z" }
        ])),
    );

    tables
}
