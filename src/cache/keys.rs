//! Cache key construction.
//!
//! One pure helper per cached shape. Keys are an exact-match contract: two
//! calls with identical logical inputs produce identical strings, and no
//! normalization happens here beyond concatenation - callers pass
//! already-normalized identifiers (consistent casing of store ids).
//!
//! Every key starts with its domain prefix (`orphan_domain` etc.) so that
//! mutations can invalidate a whole domain for one organization with a
//! single prefix sweep.

use crate::context::Role;

/// Prefix covering every orphan-domain key for one organization.
pub fn orphan_domain(org_id: &str) -> String {
    format!("orphans:{}:", org_id)
}

/// Role- and actor-scoped orphan list.
pub fn orphan_list(org_id: &str, actor_id: &str, role: Role) -> String {
    format!("{}list:{}:{}", orphan_domain(org_id), actor_id, role.as_str())
}

/// Lightweight orphan list (no related collections), organization-wide.
pub fn orphan_lite(org_id: &str) -> String {
    format!("{}lite", orphan_domain(org_id))
}

/// One page of the role-scoped orphan list.
pub fn orphan_page(org_id: &str, actor_id: &str, role: Role, page: usize, per_page: usize) -> String {
    format!(
        "{}page:{}:{}:{}:{}",
        orphan_domain(org_id),
        actor_id,
        role.as_str(),
        page,
        per_page
    )
}

/// Single orphan detail.
pub fn orphan_detail(org_id: &str, external_id: &str) -> String {
    format!("{}detail:{}", orphan_domain(org_id), external_id)
}

/// Prefix covering every sponsor-domain key for one organization.
pub fn sponsor_domain(org_id: &str) -> String {
    format!("sponsors:{}:", org_id)
}

pub fn sponsor_list(org_id: &str) -> String {
    format!("{}list", sponsor_domain(org_id))
}

pub fn sponsor_lite(org_id: &str) -> String {
    format!("{}lite", sponsor_domain(org_id))
}

pub fn sponsor_detail(org_id: &str, external_id: &str) -> String {
    format!("{}detail:{}", sponsor_domain(org_id), external_id)
}

/// Prefix covering every team-member-domain key for one organization.
pub fn team_member_domain(org_id: &str) -> String {
    format!("team_members:{}:", org_id)
}

pub fn team_member_list(org_id: &str) -> String {
    format!("{}list", team_member_domain(org_id))
}

pub fn team_member_lite(org_id: &str) -> String {
    format!("{}lite", team_member_domain(org_id))
}

/// Conversation list for one user.
pub fn conversations(user_id: &str) -> String {
    format!("conversations:{}", user_id)
}

/// Message list for one conversation.
pub fn messages(conversation_id: &str) -> String {
    format!("messages:{}", conversation_id)
}
