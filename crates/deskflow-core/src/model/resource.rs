// ── Resource catalogue ──
//
// The five collections the dashboard reads. Each maps to one backend table
// and one cache key.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::store::QueryKey;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
    Clients,
    Tickets,
    Technicians,
    Articles,
    Categories,
}

impl Resource {
    pub const ALL: [Self; 5] = [
        Self::Clients,
        Self::Tickets,
        Self::Technicians,
        Self::Articles,
        Self::Categories,
    ];

    /// Backend table name.
    pub fn table(self) -> &'static str {
        self.into()
    }

    pub fn from_table(table: &str) -> Option<Self> {
        table.parse().ok()
    }

    /// Cache key of the full collection.
    pub fn key(self) -> QueryKey {
        QueryKey::new([self.table()])
    }

    /// Collections whose cached rows embed data from this one.
    ///
    /// Tickets carry client names and articles carry category names, so a
    /// write to the parent must refresh the child view.
    pub fn dependents(self) -> &'static [Self] {
        match self {
            Self::Clients => &[Self::Tickets],
            Self::Categories => &[Self::Articles],
            Self::Tickets | Self::Technicians | Self::Articles => &[],
        }
    }

    /// Sort applied when selecting the table. Only tables with a
    /// `created_at` column are ordered.
    pub fn order(self) -> Option<&'static str> {
        match self {
            Self::Clients | Self::Tickets | Self::Articles => Some("created_at.desc"),
            Self::Technicians | Self::Categories => None,
        }
    }

    /// Singular noun for messages.
    pub fn singular(self) -> &'static str {
        match self {
            Self::Clients => "client",
            Self::Tickets => "ticket",
            Self::Technicians => "technician",
            Self::Articles => "article",
            Self::Categories => "category",
        }
    }
}
