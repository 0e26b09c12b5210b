//! Entity fetchers.
//!
//! Each fetcher composes the cache and the remote store into UI-ready read
//! models, implementing the shared refresh protocol:
//!
//! - cache hit: return immediately, refresh in the background
//!   (stale-while-revalidate); background failures are logged, never surfaced
//! - cache miss: primary query (role-scoped), then one batched IN query per
//!   related collection, issued concurrently and degraded independently
//! - primary-query failure fails the fetch; nothing is cached
//!
//! All fetchers take the request identity as an argument and are `Clone`
//! (their fields are shared handles), so a background refresh is just a
//! spawned clone re-running the same fetch without the cache.

pub mod conversations;
pub mod live;
pub mod orphans;
pub mod sponsors;
pub mod team_members;

use std::sync::Arc;

use tracing::warn;

use crate::store::{DataStore, Query, Row};

pub use conversations::{ConversationFetcher, MessageFetcher};
pub use live::{LiveMessages, LiveState, LiveUpdate};
pub use orphans::OrphanFetcher;
pub use sponsors::SponsorFetcher;
pub use team_members::TeamMemberFetcher;

/// Run one batched related-row query, degrading to an empty set on failure.
///
/// Related collections are best-effort: a failure here must not abort
/// assembly of the read model, so the error is logged with the relation name
/// and the affected relation comes back empty for every entity.
pub(crate) async fn related_rows(
    store: &Arc<dyn DataStore>,
    table: &'static str,
    owner_column: &str,
    owner_ids: &[String],
) -> Vec<Row> {
    let query = Query::table(table).within(owner_column, owner_ids.iter().cloned());
    match store.select(query).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(relation = table, error = %e, "Related-row query failed; continuing with empty collection");
            Vec::new()
        }
    }
}
