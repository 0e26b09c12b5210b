//! Orphan read models and their related collections.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};

use crate::ids::{derive_numeric_id, HasDisplayId};
use crate::store::Row;

use super::{age_today, row_date, row_f64, row_str, row_timestamp};

/// Denormalized orphan read model: one primary row plus every related
/// collection, grouped by this orphan's external identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orphan {
    /// Store-assigned globally unique identifier. The only valid write key.
    pub external_id: String,
    /// Derived numeric identifier, display/routing only.
    pub display_id: u32,
    pub org_id: String,
    pub name: String,
    pub gender: Option<String>,
    pub avatar_url: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Whole years at assembly time; never persisted.
    pub age: Option<u32>,
    /// External id of the linked sponsor, if any.
    pub sponsor_id: Option<String>,
    /// Derived id of the linked sponsor, mapped from the external foreign key.
    pub sponsor_display_id: Option<u32>,
    pub payments: Vec<Payment>,
    pub achievements: Vec<Achievement>,
    pub occasions: Vec<Occasion>,
    pub gifts: Vec<Gift>,
    pub logs: Vec<LogEntry>,
    pub family_members: Vec<FamilyMember>,
    pub program_participations: Vec<ProgramParticipation>,
}

impl Orphan {
    /// Build the primary fields from a store row. Related collections start
    /// empty and are attached by the fetcher. Rows without an id or name are
    /// not representable and yield `None`.
    pub fn from_row(row: &Row) -> Option<Self> {
        let external_id = row_str(row, "id")?;
        let name = row_str(row, "name")?;
        let birth_date = row_date(row, "birth_date");

        Some(Self {
            display_id: derive_numeric_id(&external_id),
            external_id,
            org_id: row_str(row, "org_id").unwrap_or_default(),
            name,
            gender: row_str(row, "gender"),
            avatar_url: row_str(row, "avatar_url"),
            birth_date,
            age: birth_date.map(age_today),
            sponsor_id: None,
            sponsor_display_id: None,
            payments: Vec::new(),
            achievements: Vec::new(),
            occasions: Vec::new(),
            gifts: Vec::new(),
            logs: Vec::new(),
            family_members: Vec::new(),
            program_participations: Vec::new(),
        })
    }

    /// Attach the sponsor foreign key, mapping the external id through the
    /// shared derivation (never comparing derived values across entities).
    pub fn set_sponsor(&mut self, sponsor_external_id: String) {
        self.sponsor_display_id = Some(derive_numeric_id(&sponsor_external_id));
        self.sponsor_id = Some(sponsor_external_id);
    }
}

impl HasDisplayId for Orphan {
    fn display_id(&self) -> u32 {
        self.display_id
    }
}

/// Lightweight orphan row for pickers and overview lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanLite {
    pub external_id: String,
    pub display_id: u32,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl OrphanLite {
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

impl HasDisplayId for OrphanLite {
    fn display_id(&self) -> u32 {
        self.display_id
    }
}

// ===== Related collections =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub amount: f64,
    pub currency: Option<String>,
    pub paid_at: Option<NaiveDate>,
    pub note: Option<String>,
}

impl Payment {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: row_str(row, "id")?,
            amount: row_f64(row, "amount").unwrap_or(0.0),
            currency: row_str(row, "currency"),
            paid_at: row_date(row, "paid_at"),
            note: row_str(row, "note"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub achieved_at: Option<NaiveDate>,
}

impl Achievement {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: row_str(row, "id")?,
            title: row_str(row, "title").unwrap_or_default(),
            description: row_str(row, "description"),
            achieved_at: row_date(row, "achieved_at"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occasion {
    pub id: String,
    pub title: String,
    pub occurs_on: Option<NaiveDate>,
}

impl Occasion {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: row_str(row, "id")?,
            title: row_str(row, "title").unwrap_or_default(),
            occurs_on: row_date(row, "occurs_on"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gift {
    pub id: String,
    pub description: String,
    pub sponsor_id: Option<String>,
    pub sent_at: Option<NaiveDate>,
}

impl Gift {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: row_str(row, "id")?,
            description: row_str(row, "description").unwrap_or_default(),
            sponsor_id: row_str(row, "sponsor_id"),
            sent_at: row_date(row, "sent_at"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub entry: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl LogEntry {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: row_str(row, "id")?,
            entry: row_str(row, "entry").unwrap_or_default(),
            created_at: row_timestamp(row, "created_at"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: String,
    pub name: String,
    pub relationship: Option<String>,
}

impl FamilyMember {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: row_str(row, "id")?,
            name: row_str(row, "name").unwrap_or_default(),
            relationship: row_str(row, "relationship"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramParticipation {
    pub id: String,
    pub program: String,
    pub status: Option<String>,
    pub joined_at: Option<NaiveDate>,
}

impl ProgramParticipation {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: row_str(row, "id")?,
            program: row_str(row, "program").unwrap_or_default(),
            status: row_str(row, "status"),
            joined_at: row_date(row, "joined_at"),
        })
    }
}
