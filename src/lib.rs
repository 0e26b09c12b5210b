//! caresync - client-side data caching and synchronization layer for
//! sponsorship program data.
//!
//! The crate mediates between UI consumers and a remote relational store:
//!
//! - a process-local time-bounded [`cache::Cache`] with per-domain keys
//! - [`ids`]: stable numeric identifiers derived from store-assigned ids
//! - entity fetchers ([`fetch`]) implementing stale-while-revalidate reads,
//!   batched related-row queries, and role-based scoping
//! - a live-messaging subscription with polling fallback ([`fetch::live`])
//! - a mutation path ([`mutate`]) that writes through and invalidates
//!
//! Reads serve cached data immediately and refresh in the background;
//! mutations write to the store and drop the affected cache entries so the
//! next read rebuilds. Everything takes the request identity
//! ([`context::RequestContext`]) as an argument - there is no global session
//! state.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod ids;
pub mod models;
pub mod mutate;
pub mod store;

use std::sync::Arc;

use anyhow::Result;

use cache::Cache;
use fetch::{
    ConversationFetcher, MessageFetcher, OrphanFetcher, SponsorFetcher, TeamMemberFetcher,
};
use mutate::Mutator;
use store::{DataStore, HttpStore};

/// Entry point wiring one store and one shared cache into the fetchers and
/// the mutation path.
///
/// Clone is cheap - both fields are shared handles.
#[derive(Clone)]
pub struct Client {
    store: Arc<dyn DataStore>,
    cache: Arc<Cache>,
}

impl Client {
    /// Build a client over any store implementation.
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            cache: Arc::new(Cache::new()),
        }
    }

    /// Build a client over the HTTP store, configured from the environment.
    pub fn from_env() -> Result<Self> {
        let config = config::StoreConfig::from_env()?;
        let store = HttpStore::new(config)?;
        Ok(Self::new(Arc::new(store)))
    }

    pub fn orphans(&self) -> OrphanFetcher {
        OrphanFetcher::new(self.store.clone(), self.cache.clone())
    }

    pub fn sponsors(&self) -> SponsorFetcher {
        SponsorFetcher::new(self.store.clone(), self.cache.clone())
    }

    pub fn team_members(&self) -> TeamMemberFetcher {
        TeamMemberFetcher::new(self.store.clone(), self.cache.clone())
    }

    pub fn conversations(&self) -> ConversationFetcher {
        ConversationFetcher::new(self.store.clone(), self.cache.clone())
    }

    pub fn messages(&self) -> MessageFetcher {
        MessageFetcher::new(self.store.clone(), self.cache.clone())
    }

    pub fn mutator(&self) -> Mutator {
        Mutator::new(self.store.clone(), self.cache.clone())
    }

    /// The shared cache, exposed for embedding applications that need
    /// explicit invalidation beyond what mutations already do.
    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }
}
