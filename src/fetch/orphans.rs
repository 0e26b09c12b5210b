//! Orphan fetcher: role-scoped list, paginated list, lightweight list, and
//! single-orphan detail.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::cache::{keys, Cache, EMPTY_TTL, LIST_TTL};
use crate::context::{RequestContext, Role};
use crate::models::orphan::{
    Achievement, FamilyMember, Gift, LogEntry, Occasion, Orphan, OrphanLite, Payment,
    ProgramParticipation,
};
use crate::models::{group_by_owner, row_str};
use crate::store::{tables, DataStore, Query, Row};

use super::related_rows;

#[derive(Clone)]
pub struct OrphanFetcher {
    store: Arc<dyn DataStore>,
    cache: Arc<Cache>,
}

impl OrphanFetcher {
    pub(crate) fn new(store: Arc<dyn DataStore>, cache: Arc<Cache>) -> Self {
        Self { store, cache }
    }

    // ===== List =====

    /// Fetch the role-scoped orphan list for the requesting actor.
    ///
    /// A live cache entry is returned immediately while a background refresh
    /// updates the cache for the next read; background failures are logged
    /// and swallowed.
    pub async fn list(&self, ctx: &RequestContext, use_cache: bool) -> Result<Vec<Orphan>> {
        let key = keys::orphan_list(&ctx.org_id, &ctx.actor_id, ctx.role);
        if use_cache {
            if let Some(cached) = self.cache.get::<Vec<Orphan>>(&key) {
                debug!(key = %key, "Orphan list served from cache, revalidating");
                let this = self.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.list_fresh(&ctx).await {
                        warn!(error = %e, "Background orphan list refresh failed");
                    }
                });
                return Ok(cached);
            }
        }
        self.list_fresh(ctx).await
    }

    async fn list_fresh(&self, ctx: &RequestContext) -> Result<Vec<Orphan>> {
        let key = keys::orphan_list(&ctx.org_id, &ctx.actor_id, ctx.role);
        let Some(primary) = self.scoped_primary_rows(ctx, &key, None).await? else {
            return Ok(Vec::new());
        };
        let orphans = self.assemble(primary).await;
        let ttl = if orphans.is_empty() { EMPTY_TTL } else { LIST_TTL };
        self.cache.set(&key, &orphans, ttl);
        Ok(orphans)
    }

    /// Fetch one page of the role-scoped orphan list, newest first.
    pub async fn paged(
        &self,
        ctx: &RequestContext,
        page: usize,
        per_page: usize,
        use_cache: bool,
    ) -> Result<Vec<Orphan>> {
        let key = keys::orphan_page(&ctx.org_id, &ctx.actor_id, ctx.role, page, per_page);
        if use_cache {
            if let Some(cached) = self.cache.get::<Vec<Orphan>>(&key) {
                let this = self.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.paged_fresh(&ctx, page, per_page).await {
                        warn!(error = %e, "Background orphan page refresh failed");
                    }
                });
                return Ok(cached);
            }
        }
        self.paged_fresh(ctx, page, per_page).await
    }

    async fn paged_fresh(
        &self,
        ctx: &RequestContext,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<Orphan>> {
        let key = keys::orphan_page(&ctx.org_id, &ctx.actor_id, ctx.role, page, per_page);
        let Some(primary) = self
            .scoped_primary_rows(ctx, &key, Some((page, per_page)))
            .await?
        else {
            return Ok(Vec::new());
        };
        let orphans = self.assemble(primary).await;
        let ttl = if orphans.is_empty() { EMPTY_TTL } else { LIST_TTL };
        self.cache.set(&key, &orphans, ttl);
        Ok(orphans)
    }

    /// Lightweight organization-wide list for pickers: primary rows only, no
    /// related collections.
    pub async fn lite(&self, ctx: &RequestContext, use_cache: bool) -> Result<Vec<OrphanLite>> {
        let key = keys::orphan_lite(&ctx.org_id);
        if use_cache {
            if let Some(cached) = self.cache.get::<Vec<OrphanLite>>(&key) {
                let this = self.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.lite_fresh(&ctx).await {
                        warn!(error = %e, "Background orphan lite refresh failed");
                    }
                });
                return Ok(cached);
            }
        }
        self.lite_fresh(ctx).await
    }

    async fn lite_fresh(&self, ctx: &RequestContext) -> Result<Vec<OrphanLite>> {
        let key = keys::orphan_lite(&ctx.org_id);
        let rows = self
            .store
            .select(Query::table(tables::ORPHANS).eq("org_id", &ctx.org_id))
            .await
            .context("Failed to fetch orphan list")?;
        let orphans: Vec<OrphanLite> = rows.iter().filter_map(OrphanLite::from_row).collect();
        let ttl = if orphans.is_empty() { EMPTY_TTL } else { LIST_TTL };
        self.cache.set(&key, &orphans, ttl);
        Ok(orphans)
    }

    /// Fetch a single orphan with every related collection. `Ok(None)` means
    /// the orphan does not exist in this organization.
    pub async fn detail(
        &self,
        ctx: &RequestContext,
        external_id: &str,
        use_cache: bool,
    ) -> Result<Option<Orphan>> {
        let key = keys::orphan_detail(&ctx.org_id, external_id);
        if use_cache {
            if let Some(cached) = self.cache.get::<Option<Orphan>>(&key) {
                let this = self.clone();
                let ctx = ctx.clone();
                let id = external_id.to_string();
                tokio::spawn(async move {
                    if let Err(e) = this.detail_fresh(&ctx, &id).await {
                        warn!(error = %e, "Background orphan detail refresh failed");
                    }
                });
                return Ok(cached);
            }
        }
        self.detail_fresh(ctx, external_id).await
    }

    async fn detail_fresh(&self, ctx: &RequestContext, external_id: &str) -> Result<Option<Orphan>> {
        let key = keys::orphan_detail(&ctx.org_id, external_id);
        let rows = self
            .store
            .select(
                Query::table(tables::ORPHANS)
                    .eq("org_id", &ctx.org_id)
                    .eq("id", external_id)
                    .limit(1),
            )
            .await
            .context("Failed to fetch orphan")?;

        let orphan = self.assemble(rows).await.into_iter().next();
        let ttl = if orphan.is_some() { LIST_TTL } else { EMPTY_TTL };
        self.cache.set(&key, &orphan, ttl);
        Ok(orphan)
    }

    // ===== Assembly =====

    /// Run the role-scoped primary query. Returns `None` after caching an
    /// empty result when a sponsor-scoped actor has no linked orphans - no
    /// further queries are issued in that case.
    async fn scoped_primary_rows(
        &self,
        ctx: &RequestContext,
        cache_key: &str,
        page: Option<(usize, usize)>,
    ) -> Result<Option<Vec<Row>>> {
        let linked_ids = match ctx.role {
            Role::Sponsor => {
                let links = self
                    .store
                    .select(Query::table(tables::SPONSOR_ORPHANS).eq("sponsor_id", &ctx.actor_id))
                    .await
                    .context("Failed to fetch sponsor assignments")?;
                let ids: Vec<String> =
                    links.iter().filter_map(|r| row_str(r, "orphan_id")).collect();
                if ids.is_empty() {
                    debug!(actor = %ctx.actor_id, "Sponsor has no linked orphans");
                    let empty: Vec<Orphan> = Vec::new();
                    self.cache.set(cache_key, &empty, EMPTY_TTL);
                    return Ok(None);
                }
                Some(ids)
            }
            Role::TeamMember => None,
        };

        let mut query = Query::table(tables::ORPHANS).eq("org_id", &ctx.org_id);
        if let Some(ids) = linked_ids {
            query = query.within("id", ids);
        }
        if let Some((page, per_page)) = page {
            query = query.order_by("created_at", true).page(page, per_page);
        }

        let rows = self
            .store
            .select(query)
            .await
            .context("Failed to fetch orphan list")?;
        Ok(Some(rows))
    }

    /// Assemble read models from primary rows: one batched query per related
    /// collection across all primary ids, issued concurrently, each degraded
    /// independently on failure.
    async fn assemble(&self, primary: Vec<Row>) -> Vec<Orphan> {
        let mut orphans: Vec<Orphan> = primary.iter().filter_map(Orphan::from_row).collect();
        if orphans.is_empty() {
            return orphans;
        }

        let ids: Vec<String> = orphans.iter().map(|o| o.external_id.clone()).collect();

        let (payments, achievements, occasions, gifts, logs, families, programs, links) = tokio::join!(
            related_rows(&self.store, tables::PAYMENTS, "orphan_id", &ids),
            related_rows(&self.store, tables::ACHIEVEMENTS, "orphan_id", &ids),
            related_rows(&self.store, tables::OCCASIONS, "orphan_id", &ids),
            related_rows(&self.store, tables::GIFTS, "orphan_id", &ids),
            related_rows(&self.store, tables::ORPHAN_LOGS, "orphan_id", &ids),
            related_rows(&self.store, tables::FAMILY_MEMBERS, "orphan_id", &ids),
            related_rows(&self.store, tables::PROGRAM_PARTICIPATIONS, "orphan_id", &ids),
            related_rows(&self.store, tables::SPONSOR_ORPHANS, "orphan_id", &ids),
        );

        let mut payments = group_by_owner(payments, "orphan_id", Payment::from_row);
        let mut achievements = group_by_owner(achievements, "orphan_id", Achievement::from_row);
        let mut occasions = group_by_owner(occasions, "orphan_id", Occasion::from_row);
        let mut gifts = group_by_owner(gifts, "orphan_id", Gift::from_row);
        let mut logs = group_by_owner(logs, "orphan_id", LogEntry::from_row);
        let mut families = group_by_owner(families, "orphan_id", FamilyMember::from_row);
        let mut programs = group_by_owner(programs, "orphan_id", ProgramParticipation::from_row);
        // Linking rows carry only the two foreign keys; keep the sponsor side
        let mut sponsors: HashMap<String, Vec<String>> =
            group_by_owner(links, "orphan_id", |r| row_str(r, "sponsor_id"));

        for orphan in &mut orphans {
            let id = orphan.external_id.clone();
            orphan.payments = payments.remove(&id).unwrap_or_default();
            orphan.achievements = achievements.remove(&id).unwrap_or_default();
            orphan.occasions = occasions.remove(&id).unwrap_or_default();
            orphan.gifts = gifts.remove(&id).unwrap_or_default();
            orphan.logs = logs.remove(&id).unwrap_or_default();
            orphan.family_members = families.remove(&id).unwrap_or_default();
            orphan.program_participations = programs.remove(&id).unwrap_or_default();
            if let Some(sponsor_id) = sponsors.remove(&id).and_then(|s| s.into_iter().next()) {
                orphan.set_sponsor(sponsor_id);
            }
        }

        orphans
    }
}
