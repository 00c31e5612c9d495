//! Scope Resolver: batched access computation for a project set.
//!
//! For a batch of projects and one requesting user this determines team
//! membership, effective access, and the union of permission scopes, with
//! one membership lookup and one org-role lookup for the whole batch.

use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};
use tracing::debug_span;

use crate::errors::StoreError;
use crate::roles::{OrgRole, Scope};
use crate::stores::MembershipStore;
use crate::types::{Project, ProjectId, RequestContext, TeamId, TeamMembership, User, UserId};

/// Access decision for one project.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Access {
    /// The user holds at least one membership in one of the project's teams.
    pub is_member: bool,
    pub has_access: bool,
    /// Union of all granted scopes; empty when `has_access` is false.
    pub scopes: BTreeSet<Scope>,
}

/// Request-scoped memo table for team-role scope derivation.
///
/// A user can appear in many teams across a large batch with the same
/// effective role; this avoids rebuilding identical scope sets. The cache
/// lives for one resolver invocation and is discarded with the request.
#[derive(Default)]
pub struct ScopeCache {
    entries: HashMap<(UserId, TeamId), BTreeSet<Scope>>,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn scopes_for(&mut self, user_id: UserId, membership: &TeamMembership) -> &BTreeSet<Scope> {
        self.entries
            .entry((user_id, membership.team_id))
            .or_insert_with(|| membership.effective_team_role().scopes())
    }
}

/// Resolves access for every project in the batch.
///
/// The result contains exactly one entry per input project, in input order,
/// so downstream consumers can index into it unconditionally.
pub async fn resolve_access(
    projects: &[Project],
    user: &User,
    request: &RequestContext,
    store: &dyn MembershipStore,
    cache: &mut ScopeCache,
) -> Result<IndexMap<ProjectId, Access>, StoreError> {
    let project_ids: Vec<ProjectId> = projects.iter().map(|p| p.id).collect();

    // One pass over the join relation gives both the per-project team lists
    // and the full set of involved teams.
    let mut project_to_teams: HashMap<ProjectId, Vec<TeamId>> = HashMap::new();
    let mut teams_list: Vec<TeamId> = Vec::new();
    for (project_id, team_id) in store.project_teams(&project_ids).await? {
        project_to_teams.entry(project_id).or_default().push(team_id);
        teams_list.push(team_id);
    }

    let team_memberships = if user.is_authenticated {
        store.team_memberships(&teams_list, user).await?
    } else {
        Vec::new()
    };

    let org_ids: Vec<_> = {
        let mut ids: Vec<_> = projects.iter().map(|p| p.organization.id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    };
    let org_roles = if user.is_authenticated {
        store.org_roles(&org_ids, user).await?
    } else {
        HashMap::new()
    };

    let is_superuser = request.is_superuser(user);

    let span = debug_span!("project.check_access", projects = projects.len());
    let _guard = span.enter();

    let mut result = IndexMap::with_capacity(projects.len());
    for project in projects {
        let parent_teams = project_to_teams
            .get(&project.id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let member_teams: Vec<&TeamMembership> = team_memberships
            .iter()
            .filter(|m| parent_teams.contains(&m.team_id))
            .collect();
        let is_member = !member_teams.is_empty();
        let mut org_role = org_roles.get(&project.organization.id).copied();

        let has_access = is_member
            || is_superuser
            || project.organization.allow_joinleave
            || org_role.is_some_and(|role| role.is_global());

        let mut scopes = BTreeSet::new();
        if has_access {
            // A project can be the child of several teams, and the user can
            // hold a different role in each of them.
            for membership in &member_teams {
                scopes.extend(cache.scopes_for(user.id, membership).iter().cloned());
            }

            if is_superuser {
                org_role = Some(OrgRole::top_role());
            }

            if let Some(role) = org_role {
                scopes.extend(role.minimum_team_role().scopes());
            }
        }

        result.insert(
            project.id,
            Access {
                is_member,
                has_access,
                scopes,
            },
        );
    }

    Ok(result)
}
