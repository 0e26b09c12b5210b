//! Mutation path: writes go straight to the remote store, then the affected
//! cache entries are invalidated so subsequent reads are consistent.
//!
//! Mutations never patch read models in place - a failed write leaves local
//! state untouched, and a successful one forces the next fetch to rebuild.
//! The one deliberate exception is assignment toggles, where the caller's
//! in-memory id list is updated optimistically because linking tables carry
//! no derived fields worth re-reading.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::cache::{keys, Cache};
use crate::context::RequestContext;
use crate::store::{tables, DataStore, Filter};

/// Partial orphan update: only set fields are written.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrphanUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl OrphanUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.gender.is_none()
            && self.birth_date.is_none()
            && self.avatar_url.is_none()
    }
}

#[derive(Clone)]
pub struct Mutator {
    store: Arc<dyn DataStore>,
    cache: Arc<Cache>,
}

impl Mutator {
    pub(crate) fn new(store: Arc<dyn DataStore>, cache: Arc<Cache>) -> Self {
        Self { store, cache }
    }

    // ===== Messaging =====

    /// Send a message into a conversation.
    ///
    /// Whitespace-only content is rejected locally, before any network call.
    /// On success the conversation's message-list cache entry is invalidated
    /// rather than patched: the canonical timestamp and identifier are
    /// server-assigned, so the next read refetches.
    pub async fn send_message(
        &self,
        ctx: &RequestContext,
        conversation_id: &str,
        content: &str,
    ) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            bail!("Message content is empty");
        }

        self.store
            .insert(
                tables::MESSAGES,
                json!({
                    "conversation_id": conversation_id,
                    "sender_id": ctx.actor_id,
                    "content": content,
                }),
            )
            .await
            .context("Failed to send message")?;

        self.cache.remove(&keys::messages(conversation_id));
        Ok(())
    }

    /// Mark every unread message from the counterpart as read.
    pub async fn mark_conversation_read(
        &self,
        ctx: &RequestContext,
        conversation_id: &str,
    ) -> Result<()> {
        self.store
            .update(
                tables::MESSAGES,
                &[
                    Filter::eq("conversation_id", conversation_id),
                    Filter::neq("sender_id", &ctx.actor_id),
                    Filter::is_null("read_at"),
                ],
                json!({ "read_at": Utc::now().to_rfc3339() }),
            )
            .await
            .context("Failed to mark conversation read")?;

        self.cache.remove(&keys::messages(conversation_id));
        Ok(())
    }

    // ===== Orphans =====

    /// Write the provided fields to one orphan, scoped by both external id
    /// and organization id so a write can never cross tenants.
    ///
    /// On success every cache entry that could hold a stale copy is dropped:
    /// the mutation cannot enumerate actor-scoped list keys from its
    /// arguments, so the whole orphan domain for the organization is swept.
    /// On failure the error propagates unmodified and nothing local changes.
    pub async fn update_orphan(
        &self,
        ctx: &RequestContext,
        external_id: &str,
        update: OrphanUpdate,
    ) -> Result<()> {
        if update.is_empty() {
            debug!(orphan = external_id, "Skipping empty orphan update");
            return Ok(());
        }

        let patch = serde_json::to_value(&update).context("Failed to serialize orphan update")?;
        self.store
            .update(
                tables::ORPHANS,
                &[
                    Filter::eq("id", external_id),
                    Filter::eq("org_id", &ctx.org_id),
                ],
                patch,
            )
            .await
            .context("Failed to update orphan")?;

        self.cache.remove_prefix(&keys::orphan_domain(&ctx.org_id));
        Ok(())
    }

    // ===== Assignment toggles =====

    /// Link or unlink a sponsor and an orphan.
    pub async fn set_sponsor_orphan(
        &self,
        sponsor_id: &str,
        orphan_id: &str,
        assigned: bool,
    ) -> Result<()> {
        self.toggle_link(
            tables::SPONSOR_ORPHANS,
            ("sponsor_id", sponsor_id),
            ("orphan_id", orphan_id),
            assigned,
        )
        .await
    }

    /// Link or unlink a team member and an orphan.
    pub async fn set_team_member_orphan(
        &self,
        team_member_id: &str,
        orphan_id: &str,
        assigned: bool,
    ) -> Result<()> {
        self.toggle_link(
            tables::TEAM_MEMBER_ORPHANS,
            ("team_member_id", team_member_id),
            ("orphan_id", orphan_id),
            assigned,
        )
        .await
    }

    /// Link or unlink a sponsor and a team member.
    pub async fn set_sponsor_team_member(
        &self,
        sponsor_id: &str,
        team_member_id: &str,
        assigned: bool,
    ) -> Result<()> {
        self.toggle_link(
            tables::SPONSOR_TEAM_MEMBERS,
            ("sponsor_id", sponsor_id),
            ("team_member_id", team_member_id),
            assigned,
        )
        .await
    }

    /// Insert or delete one linking-table row keyed by two external ids.
    async fn toggle_link(
        &self,
        table: &'static str,
        left: (&str, &str),
        right: (&str, &str),
        assigned: bool,
    ) -> Result<()> {
        if assigned {
            self.store
                .insert(table, json!({ left.0: left.1, right.0: right.1 }))
                .await
                .with_context(|| format!("Failed to insert {} link", table))?;
        } else {
            self.store
                .delete(
                    table,
                    &[Filter::eq(left.0, left.1), Filter::eq(right.0, right.1)],
                )
                .await
                .with_context(|| format!("Failed to delete {} link", table))?;
        }
        Ok(())
    }
}

/// Optimistically apply an assignment toggle to an in-memory id list.
///
/// Used by callers after a successful toggle instead of refetching: append on
/// assign (no duplicates), remove on unassign.
pub fn apply_assignment(list: &mut Vec<String>, id: &str, assigned: bool) {
    if assigned {
        if !list.iter().any(|existing| existing == id) {
            list.push(id.to_string());
        }
    } else {
        list.retain(|existing| existing != id);
    }
}
