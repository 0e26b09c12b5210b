//! Sponsor fetcher: organization list, lightweight list, and single-sponsor
//! detail with its separately-fetched assignment sub-resource.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::cache::{keys, Cache, EMPTY_TTL, LIST_TTL};
use crate::context::RequestContext;
use crate::models::row_str;
use crate::models::sponsor::{Sponsor, SponsorLite};
use crate::store::{tables, DataStore, Query};

use super::related_rows;

#[derive(Clone)]
pub struct SponsorFetcher {
    store: Arc<dyn DataStore>,
    cache: Arc<Cache>,
}

impl SponsorFetcher {
    pub(crate) fn new(store: Arc<dyn DataStore>, cache: Arc<Cache>) -> Self {
        Self { store, cache }
    }

    /// Fetch every sponsor in the organization. Assignments are not attached
    /// here; they are a detail-only sub-resource.
    pub async fn list(&self, ctx: &RequestContext, use_cache: bool) -> Result<Vec<Sponsor>> {
        let key = keys::sponsor_list(&ctx.org_id);
        if use_cache {
            if let Some(cached) = self.cache.get::<Vec<Sponsor>>(&key) {
                let this = self.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.list_fresh(&ctx).await {
                        warn!(error = %e, "Background sponsor list refresh failed");
                    }
                });
                return Ok(cached);
            }
        }
        self.list_fresh(ctx).await
    }

    async fn list_fresh(&self, ctx: &RequestContext) -> Result<Vec<Sponsor>> {
        let key = keys::sponsor_list(&ctx.org_id);
        let rows = self
            .store
            .select(Query::table(tables::SPONSORS).eq("org_id", &ctx.org_id))
            .await
            .context("Failed to fetch sponsor list")?;
        let sponsors: Vec<Sponsor> = rows.iter().filter_map(Sponsor::from_row).collect();
        let ttl = if sponsors.is_empty() { EMPTY_TTL } else { LIST_TTL };
        self.cache.set(&key, &sponsors, ttl);
        Ok(sponsors)
    }

    /// Lightweight sponsor list for pickers.
    pub async fn lite(&self, ctx: &RequestContext, use_cache: bool) -> Result<Vec<SponsorLite>> {
        let key = keys::sponsor_lite(&ctx.org_id);
        if use_cache {
            if let Some(cached) = self.cache.get::<Vec<SponsorLite>>(&key) {
                let this = self.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.lite_fresh(&ctx).await {
                        warn!(error = %e, "Background sponsor lite refresh failed");
                    }
                });
                return Ok(cached);
            }
        }
        self.lite_fresh(ctx).await
    }

    async fn lite_fresh(&self, ctx: &RequestContext) -> Result<Vec<SponsorLite>> {
        let key = keys::sponsor_lite(&ctx.org_id);
        let rows = self
            .store
            .select(Query::table(tables::SPONSORS).eq("org_id", &ctx.org_id))
            .await
            .context("Failed to fetch sponsor list")?;
        let sponsors: Vec<SponsorLite> = rows.iter().filter_map(SponsorLite::from_row).collect();
        let ttl = if sponsors.is_empty() { EMPTY_TTL } else { LIST_TTL };
        self.cache.set(&key, &sponsors, ttl);
        Ok(sponsors)
    }

    /// Fetch one sponsor with the external ids of their assigned orphans.
    pub async fn detail(
        &self,
        ctx: &RequestContext,
        external_id: &str,
        use_cache: bool,
    ) -> Result<Option<Sponsor>> {
        let key = keys::sponsor_detail(&ctx.org_id, external_id);
        if use_cache {
            if let Some(cached) = self.cache.get::<Option<Sponsor>>(&key) {
                let this = self.clone();
                let ctx = ctx.clone();
                let id = external_id.to_string();
                tokio::spawn(async move {
                    if let Err(e) = this.detail_fresh(&ctx, &id).await {
                        warn!(error = %e, "Background sponsor detail refresh failed");
                    }
                });
                return Ok(cached);
            }
        }
        self.detail_fresh(ctx, external_id).await
    }

    async fn detail_fresh(
        &self,
        ctx: &RequestContext,
        external_id: &str,
    ) -> Result<Option<Sponsor>> {
        let key = keys::sponsor_detail(&ctx.org_id, external_id);
        let rows = self
            .store
            .select(
                Query::table(tables::SPONSORS)
                    .eq("org_id", &ctx.org_id)
                    .eq("id", external_id)
                    .limit(1),
            )
            .await
            .context("Failed to fetch sponsor")?;

        let mut sponsor = rows.iter().filter_map(Sponsor::from_row).next();

        if let Some(sponsor) = sponsor.as_mut() {
            // Assignment sub-resource: best-effort, degrades to empty
            let ids = vec![sponsor.external_id.clone()];
            let links = related_rows(&self.store, tables::SPONSOR_ORPHANS, "sponsor_id", &ids).await;
            sponsor.assigned_orphan_ids =
                links.iter().filter_map(|r| row_str(r, "orphan_id")).collect();
        }

        let ttl = if sponsor.is_some() { LIST_TTL } else { EMPTY_TTL };
        self.cache.set(&key, &sponsor, ttl);
        Ok(sponsor)
    }
}
