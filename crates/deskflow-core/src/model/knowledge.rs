// ── Knowledge-base domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::RowId;
use super::{Entity, Resource};

/// Knowledge-base article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: RowId,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category_id: Option<RowId>,
    /// Denormalized category name, refreshed when the category changes.
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entity for Article {
    const RESOURCE: Resource = Resource::Articles;
}

/// Grouping for articles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: RowId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Entity for Category {
    const RESOURCE: Resource = Resource::Categories;
}
