//! Sponsor read models.

use serde::{Deserialize, Serialize};

use crate::ids::{derive_numeric_id, HasDisplayId};
use crate::store::Row;

use super::row_str;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sponsor {
    pub external_id: String,
    pub display_id: u32,
    pub org_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    /// External ids of assigned orphans. Populated from the linking table by
    /// the detail fetch; empty on list fetches.
    pub assigned_orphan_ids: Vec<String>,
}

impl Sponsor {
    pub fn from_row(row: &Row) -> Option<Self> {
        let external_id = row_str(row, "id")?;
        Some(Self {
            display_id: derive_numeric_id(&external_id),
            external_id,
            org_id: row_str(row, "org_id").unwrap_or_default(),
            name: row_str(row, "name")?,
            email: row_str(row, "email"),
            phone: row_str(row, "phone"),
            avatar_url: row_str(row, "avatar_url"),
            assigned_orphan_ids: Vec::new(),
        })
    }
}

impl HasDisplayId for Sponsor {
    fn display_id(&self) -> u32 {
        self.display_id
    }
}

/// Lightweight sponsor row for pickers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorLite {
    pub external_id: String,
    pub display_id: u32,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl SponsorLite {
    pub fn from_row(row: &Row) -> Option<Self> {
        let external_id = row_str(row, "id")?;
        Some(Self {
            display_id: derive_numeric_id(&external_id),
            external_id,
            name: row_str(row, "name")?,
            avatar_url: row_str(row, "avatar_url"),
        })
    }
}

impl HasDisplayId for SponsorLite {
    fn display_id(&self) -> u32 {
        self.display_id
    }
}
