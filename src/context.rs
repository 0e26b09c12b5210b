//! Request identity passed explicitly to every fetcher and mutation.
//!
//! The actor identifier and role come from session state owned by the
//! embedding application. Fetchers take a `RequestContext` argument instead of
//! reading process-global state so they can be exercised in tests with any
//! identity.

use serde::{Deserialize, Serialize};

/// Role of the requesting actor, used for row-level scoping of list fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Restricted to entities linked to the actor through the
    /// sponsor-to-orphan linking table.
    Sponsor,
    /// Sees the full organization-scoped set.
    TeamMember,
}

impl Role {
    /// Stable string form, used in cache keys and store queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sponsor => "sponsor",
            Role::TeamMember => "team_member",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the current request: who is asking, for which organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// External identifier of the requesting actor.
    pub actor_id: String,
    /// External identifier of the organization being queried.
    pub org_id: String,
    /// Role of the requesting actor.
    pub role: Role,
}

impl RequestContext {
    pub fn new(actor_id: impl Into<String>, org_id: impl Into<String>, role: Role) -> Self {
        Self {
            actor_id: actor_id.into(),
            org_id: org_id.into(),
            role,
        }
    }
}
