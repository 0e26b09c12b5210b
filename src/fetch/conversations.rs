//! Conversation and message fetchers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::warn;

use crate::cache::{keys, Cache, EMPTY_TTL, MESSAGING_TTL};
use crate::context::RequestContext;
use crate::models::message::{normalize_pair, Conversation, Message, SenderProfile};
use crate::store::{tables, DataStore, Filter, Query};

use super::related_rows;

#[derive(Clone)]
pub struct ConversationFetcher {
    store: Arc<dyn DataStore>,
    cache: Arc<Cache>,
}

impl ConversationFetcher {
    pub(crate) fn new(store: Arc<dyn DataStore>, cache: Arc<Cache>) -> Self {
        Self { store, cache }
    }

    /// Fetch every conversation the requesting actor participates in.
    pub async fn list(&self, ctx: &RequestContext, use_cache: bool) -> Result<Vec<Conversation>> {
        let key = keys::conversations(&ctx.actor_id);
        if use_cache {
            if let Some(cached) = self.cache.get::<Vec<Conversation>>(&key) {
                let this = self.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.list_fresh(&ctx).await {
                        warn!(error = %e, "Background conversation list refresh failed");
                    }
                });
                return Ok(cached);
            }
        }
        self.list_fresh(ctx).await
    }

    async fn list_fresh(&self, ctx: &RequestContext) -> Result<Vec<Conversation>> {
        let key = keys::conversations(&ctx.actor_id);
        let rows = self
            .store
            .select(
                Query::table(tables::CONVERSATIONS)
                    .either(
                        Filter::eq("participant_one", &ctx.actor_id),
                        Filter::eq("participant_two", &ctx.actor_id),
                    )
                    .order_by("created_at", true),
            )
            .await
            .context("Failed to fetch conversations")?;

        let conversations: Vec<Conversation> =
            rows.iter().filter_map(Conversation::from_row).collect();
        let ttl = if conversations.is_empty() { EMPTY_TTL } else { MESSAGING_TTL };
        self.cache.set(&key, &conversations, ttl);
        Ok(conversations)
    }

    /// Return the conversation between the actor and `other_user`, creating
    /// it if none exists. Idempotent regardless of argument order: the
    /// participant pair is normalized before lookup and insert, so at most
    /// one row exists per unordered pair.
    pub async fn find_or_create(
        &self,
        ctx: &RequestContext,
        other_user: &str,
    ) -> Result<Conversation> {
        let (one, two) = normalize_pair(&ctx.actor_id, other_user);

        let rows = self
            .store
            .select(
                Query::table(tables::CONVERSATIONS)
                    .eq("participant_one", &one)
                    .eq("participant_two", &two)
                    .limit(1),
            )
            .await
            .context("Failed to look up conversation")?;

        if let Some(existing) = rows.iter().filter_map(Conversation::from_row).next() {
            return Ok(existing);
        }

        let row = self
            .store
            .insert(
                tables::CONVERSATIONS,
                json!({ "participant_one": one, "participant_two": two }),
            )
            .await
            .context("Failed to create conversation")?;

        let conversation = Conversation::from_row(&row)
            .context("Store returned an incomplete conversation row")?;

        // A new conversation belongs in both participants' lists
        self.cache.remove(&keys::conversations(&conversation.participant_one));
        self.cache.remove(&keys::conversations(&conversation.participant_two));

        Ok(conversation)
    }
}

#[derive(Clone)]
pub struct MessageFetcher {
    pub(crate) store: Arc<dyn DataStore>,
    pub(crate) cache: Arc<Cache>,
}

impl MessageFetcher {
    pub(crate) fn new(store: Arc<dyn DataStore>, cache: Arc<Cache>) -> Self {
        Self { store, cache }
    }

    /// Fetch the message list for one conversation in arrival order, sender
    /// display profiles attached from one batched lookup.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        conversation_id: &str,
        use_cache: bool,
    ) -> Result<Vec<Message>> {
        let key = keys::messages(conversation_id);
        if use_cache {
            if let Some(cached) = self.cache.get::<Vec<Message>>(&key) {
                let this = self.clone();
                let ctx = ctx.clone();
                let id = conversation_id.to_string();
                tokio::spawn(async move {
                    if let Err(e) = this.list_fresh(&ctx, &id).await {
                        warn!(error = %e, "Background message list refresh failed");
                    }
                });
                return Ok(cached);
            }
        }
        self.list_fresh(ctx, conversation_id).await
    }

    async fn list_fresh(&self, _ctx: &RequestContext, conversation_id: &str) -> Result<Vec<Message>> {
        let key = keys::messages(conversation_id);
        let rows = self
            .store
            .select(
                Query::table(tables::MESSAGES)
                    .eq("conversation_id", conversation_id)
                    .order_by("created_at", false),
            )
            .await
            .context("Failed to fetch messages")?;

        let mut messages: Vec<Message> = rows.iter().filter_map(Message::from_row).collect();

        if !messages.is_empty() {
            // One batched profile lookup across all distinct senders
            let mut sender_ids: Vec<String> =
                messages.iter().map(|m| m.sender_id.clone()).collect();
            sender_ids.sort();
            sender_ids.dedup();

            let profile_rows =
                related_rows(&self.store, tables::PROFILES, "id", &sender_ids).await;
            let profiles: HashMap<String, SenderProfile> = profile_rows
                .iter()
                .filter_map(SenderProfile::from_row)
                .map(|p| (p.id.clone(), p))
                .collect();

            for message in &mut messages {
                if let Some(profile) = profiles.get(&message.sender_id) {
                    message.sender_name = profile.display_name.clone();
                    message.sender_avatar_url = profile.avatar_url.clone();
                }
            }
        }

        let ttl = if messages.is_empty() { EMPTY_TTL } else { MESSAGING_TTL };
        self.cache.set(&key, &messages, ttl);
        Ok(messages)
    }
}
