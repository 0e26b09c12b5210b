//! Team-member fetcher: organization list with tasks, and a lightweight
//! variant without them.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::cache::{keys, Cache, EMPTY_TTL, LIST_TTL};
use crate::context::RequestContext;
use crate::models::group_by_owner;
use crate::models::team_member::{Task, TeamMember, TeamMemberLite};
use crate::store::{tables, DataStore, Query};

use super::related_rows;

#[derive(Clone)]
pub struct TeamMemberFetcher {
    store: Arc<dyn DataStore>,
    cache: Arc<Cache>,
}

impl TeamMemberFetcher {
    pub(crate) fn new(store: Arc<dyn DataStore>, cache: Arc<Cache>) -> Self {
        Self { store, cache }
    }

    /// Fetch every team member in the organization, with their tasks attached
    /// from one batched query.
    pub async fn list(&self, ctx: &RequestContext, use_cache: bool) -> Result<Vec<TeamMember>> {
        let key = keys::team_member_list(&ctx.org_id);
        if use_cache {
            if let Some(cached) = self.cache.get::<Vec<TeamMember>>(&key) {
                let this = self.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.list_fresh(&ctx).await {
                        warn!(error = %e, "Background team-member list refresh failed");
                    }
                });
                return Ok(cached);
            }
        }
        self.list_fresh(ctx).await
    }

    async fn list_fresh(&self, ctx: &RequestContext) -> Result<Vec<TeamMember>> {
        let key = keys::team_member_list(&ctx.org_id);
        let rows = self
            .store
            .select(Query::table(tables::TEAM_MEMBERS).eq("org_id", &ctx.org_id))
            .await
            .context("Failed to fetch team-member list")?;
        let mut members: Vec<TeamMember> = rows.iter().filter_map(TeamMember::from_row).collect();

        if !members.is_empty() {
            let ids: Vec<String> = members.iter().map(|m| m.external_id.clone()).collect();
            let task_rows = related_rows(&self.store, tables::TASKS, "team_member_id", &ids).await;
            let mut tasks = group_by_owner(task_rows, "team_member_id", Task::from_row);
            for member in &mut members {
                member.tasks = tasks.remove(&member.external_id).unwrap_or_default();
            }
        }

        let ttl = if members.is_empty() { EMPTY_TTL } else { LIST_TTL };
        self.cache.set(&key, &members, ttl);
        Ok(members)
    }

    /// Lightweight team-member list, no tasks.
    pub async fn lite(&self, ctx: &RequestContext, use_cache: bool) -> Result<Vec<TeamMemberLite>> {
        let key = keys::team_member_lite(&ctx.org_id);
        if use_cache {
            if let Some(cached) = self.cache.get::<Vec<TeamMemberLite>>(&key) {
                let this = self.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.lite_fresh(&ctx).await {
                        warn!(error = %e, "Background team-member lite refresh failed");
                    }
                });
                return Ok(cached);
            }
        }
        self.lite_fresh(ctx).await
    }

    async fn lite_fresh(&self, ctx: &RequestContext) -> Result<Vec<TeamMemberLite>> {
        let key = keys::team_member_lite(&ctx.org_id);
        let rows = self
            .store
            .select(Query::table(tables::TEAM_MEMBERS).eq("org_id", &ctx.org_id))
            .await
            .context("Failed to fetch team-member list")?;
        let members: Vec<TeamMemberLite> =
            rows.iter().filter_map(TeamMemberLite::from_row).collect();
        let ttl = if members.is_empty() { EMPTY_TTL } else { LIST_TTL };
        self.cache.set(&key, &members, ttl);
        Ok(members)
    }
}
