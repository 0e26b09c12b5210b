//! Conversation and message read models.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::store::Row;

use super::{row_str, row_timestamp};

/// A conversation between two users.
///
/// The participant pair is normalized at creation time: the lexicographically
/// smaller identifier is always stored first, so at most one conversation row
/// exists per unordered pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub external_id: String,
    pub participant_one: String,
    pub participant_two: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            external_id: row_str(row, "id")?,
            participant_one: row_str(row, "participant_one")?,
            participant_two: row_str(row, "participant_two")?,
            created_at: row_timestamp(row, "created_at"),
        })
    }

    /// The other participant from `user_id`'s perspective.
    pub fn counterpart(&self, user_id: &str) -> &str {
        if self.participant_one == user_id {
            &self.participant_two
        } else {
            &self.participant_one
        }
    }
}

/// Normalize an unordered participant pair into storage order.
pub fn normalize_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub external_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Read receipt: null until the recipient has seen the message.
    pub read_at: Option<DateTime<Utc>>,
    /// Sender display profile, joined from a batched profile lookup.
    pub sender_name: Option<String>,
    pub sender_avatar_url: Option<String>,
}

impl Message {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            external_id: row_str(row, "id")?,
            conversation_id: row_str(row, "conversation_id")?,
            sender_id: row_str(row, "sender_id")?,
            content: row_str(row, "content").unwrap_or_default(),
            created_at: row_timestamp(row, "created_at"),
            read_at: row_timestamp(row, "read_at"),
            sender_name: None,
            sender_avatar_url: None,
        })
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Sender display profile attached to messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl SenderProfile {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: row_str(row, "id")?,
            display_name: row_str(row, "display_name"),
            avatar_url: row_str(row, "avatar_url"),
        })
    }
}
