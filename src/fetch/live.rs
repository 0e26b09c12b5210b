//! Live messaging updates.
//!
//! One conversation's message list can be kept current through a row-event
//! subscription, with a polling fallback when the subscription cannot be
//! established or dies:
//!
//! ```text
//! SUBSCRIBING -> LIVE -> (on error) -> POLLING
//! ```
//!
//! The consumer receives `LiveUpdate` values over a channel and owns a
//! `LiveMessages` handle. Dropping the handle tears down the driver task, the
//! subscription, and the polling timer on every exit path.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{keys, MESSAGING_TTL};
use crate::context::RequestContext;
use crate::models::message::{Message, SenderProfile};
use crate::mutate::Mutator;
use crate::store::{tables, Filter, Query, Row, RowEvent, Subscription};

use super::conversations::MessageFetcher;

/// Polling cadence when the subscription is unavailable.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long to wait for the store to confirm a subscription before falling
/// back to polling.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffer for updates flowing to the consumer.
const UPDATE_BUFFER_SIZE: usize = 32;

/// Delivery states of the live update loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveState {
    /// Subscription request issued, not yet confirmed.
    Subscribing,
    /// Row events arriving over the confirmed subscription.
    Live,
    /// Fixed-interval refetch; the subscription failed or died.
    Polling,
}

/// Updates delivered to the consumer of a watched conversation.
#[derive(Debug, Clone)]
pub enum LiveUpdate {
    /// The loop changed state.
    State(LiveState),
    /// A new message arrived over the live subscription.
    Appended(Message),
    /// An existing message's read marker changed; patch it in place by id.
    ReadMarker(Message),
    /// A polling tick replaced the full list.
    Replaced(Vec<Message>),
}

/// Handle to a watched conversation.
///
/// Dropping the handle aborts the driver task, which in turn drops the
/// subscription and timer. Teardown is unconditional.
pub struct LiveMessages {
    updates: mpsc::Receiver<LiveUpdate>,
    task: JoinHandle<()>,
}

impl LiveMessages {
    /// Await the next update. `None` means the watch has ended.
    pub async fn next(&mut self) -> Option<LiveUpdate> {
        self.updates.recv().await
    }

    /// Stop watching. Equivalent to dropping the handle.
    pub fn stop(self) {}
}

impl Drop for LiveMessages {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl MessageFetcher {
    /// Watch one conversation for live updates.
    ///
    /// The returned handle delivers state transitions and message updates
    /// until it is dropped or the consumer goes away.
    pub fn watch(&self, ctx: &RequestContext, conversation_id: &str) -> LiveMessages {
        let (tx, rx) = mpsc::channel(UPDATE_BUFFER_SIZE);
        let driver = Driver {
            fetcher: self.clone(),
            ctx: ctx.clone(),
            conversation_id: conversation_id.to_string(),
            tx,
        };
        let task = tokio::spawn(async move { driver.run().await });
        LiveMessages { updates: rx, task }
    }
}

struct Driver {
    fetcher: MessageFetcher,
    ctx: RequestContext,
    conversation_id: String,
    tx: mpsc::Sender<LiveUpdate>,
}

impl Driver {
    async fn run(self) {
        if self.send(LiveUpdate::State(LiveState::Subscribing)).await.is_err() {
            return;
        }

        let filter = Filter::eq("conversation_id", self.conversation_id.clone());
        let subscribe = self.fetcher.store.subscribe(tables::MESSAGES, filter);
        match tokio::time::timeout(SUBSCRIBE_TIMEOUT, subscribe).await {
            Ok(Ok(subscription)) => {
                if self.send(LiveUpdate::State(LiveState::Live)).await.is_err() {
                    return;
                }
                if self.run_live(subscription).await.is_err() {
                    return;
                }
                // Subscription died mid-stream; fall back to polling
            }
            Ok(Err(e)) => {
                debug!(conversation = %self.conversation_id, error = %e, "Subscription failed, polling instead");
            }
            Err(_) => {
                debug!(conversation = %self.conversation_id, "Subscription confirmation timed out, polling instead");
            }
        }

        self.run_polling().await;
    }

    /// Forward row events until the subscription ends. `Err` means the
    /// consumer is gone and the driver should exit entirely.
    async fn run_live(&self, mut subscription: Subscription) -> Result<(), ()> {
        while let Some(event) = subscription.next_event().await {
            match event {
                RowEvent::Inserted(row) => self.handle_insert(row).await?,
                RowEvent::Updated(row) => self.handle_update(row).await?,
            }
        }
        warn!(conversation = %self.conversation_id, "Live subscription ended, falling back to polling");
        Ok(())
    }

    async fn handle_insert(&self, row: Row) -> Result<(), ()> {
        let Some(mut message) = Message::from_row(&row) else {
            warn!(conversation = %self.conversation_id, "Ignoring malformed live insert");
            return Ok(());
        };

        // One-off sender profile lookup; display fields degrade to None
        match self
            .fetcher
            .store
            .select(Query::table(tables::PROFILES).eq("id", &message.sender_id).limit(1))
            .await
        {
            Ok(rows) => {
                if let Some(profile) = rows.iter().filter_map(SenderProfile::from_row).next() {
                    message.sender_name = profile.display_name;
                    message.sender_avatar_url = profile.avatar_url;
                }
            }
            Err(e) => {
                warn!(error = %e, "Sender profile lookup failed for live message");
            }
        }

        // Append to the cached list rather than refetching
        let key = keys::messages(&self.conversation_id);
        if let Some(mut cached) = self.fetcher.cache.get::<Vec<Message>>(&key) {
            cached.push(message.clone());
            self.fetcher.cache.set(&key, &cached, MESSAGING_TTL);
        }

        let from_counterpart = message.sender_id != self.ctx.actor_id;
        self.send(LiveUpdate::Appended(message)).await?;

        if from_counterpart {
            let mutator = Mutator::new(self.fetcher.store.clone(), self.fetcher.cache.clone());
            if let Err(e) = mutator.mark_conversation_read(&self.ctx, &self.conversation_id).await {
                warn!(error = %e, "Failed to mark conversation read after live message");
            }
        }
        Ok(())
    }

    async fn handle_update(&self, row: Row) -> Result<(), ()> {
        // Read-receipt propagation: patch by id, no cache rewrite needed
        let Some(message) = Message::from_row(&row) else {
            return Ok(());
        };
        self.send(LiveUpdate::ReadMarker(message)).await
    }

    async fn run_polling(&self) {
        if self.send(LiveUpdate::State(LiveState::Polling)).await.is_err() {
            return;
        }

        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.fetcher.list(&self.ctx, &self.conversation_id, false).await {
                Ok(messages) => {
                    if self.send(LiveUpdate::Replaced(messages)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    // Polling is a recovery mechanism; a failed tick is not fatal
                    warn!(conversation = %self.conversation_id, error = %e, "Polling refetch failed");
                }
            }
        }
    }

    async fn send(&self, update: LiveUpdate) -> Result<(), ()> {
        self.tx.send(update).await.map_err(|_| ())
    }
}
