//! Team-member read models.

use serde::{Deserialize, Serialize};
use chrono::NaiveDate;

use crate::ids::{derive_numeric_id, HasDisplayId};
use crate::store::Row;

use super::{row_bool, row_date, row_str};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub external_id: String,
    pub display_id: u32,
    pub org_id: String,
    pub name: String,
    pub email: Option<String>,
    pub title: Option<String>,
    pub avatar_url: Option<String>,
    pub tasks: Vec<Task>,
}

impl TeamMember {
    pub fn from_row(row: &Row) -> Option<Self> {
        let external_id = row_str(row, "id")?;
        Some(Self {
            display_id: derive_numeric_id(&external_id),
            external_id,
            org_id: row_str(row, "org_id").unwrap_or_default(),
            name: row_str(row, "name")?,
            email: row_str(row, "email"),
            title: row_str(row, "title"),
            avatar_url: row_str(row, "avatar_url"),
            tasks: Vec::new(),
        })
    }
}

impl HasDisplayId for TeamMember {
    fn display_id(&self) -> u32 {
        self.display_id
    }
}

/// Lightweight team-member row, without the tasks collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberLite {
    pub external_id: String,
    pub display_id: u32,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl TeamMemberLite {
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

impl HasDisplayId for TeamMemberLite {
    fn display_id(&self) -> u32 {
        self.display_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub done: bool,
    pub due_on: Option<NaiveDate>,
}

impl Task {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: row_str(row, "id")?,
            title: row_str(row, "title").unwrap_or_default(),
            done: row_bool(row, "done"),
            due_on: row_date(row, "due_on"),
        })
    }
}
