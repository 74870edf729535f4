// ── Technician domain types ──

use serde::{Deserialize, Serialize};

use super::record::RowId;
use super::{Entity, Resource};

/// Support staff member tickets can be assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technician {
    pub id: RowId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Entity for Technician {
    const RESOURCE: Resource = Resource::Technicians;
}
