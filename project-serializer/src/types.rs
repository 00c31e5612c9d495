//! Domain records consumed by the serializer.
//!
//! Projects, teams, organizations and users are owned elsewhere (CRUD lives
//! with the persistence layer); these are the read-side shapes the
//! aggregation engine needs. Everything derived from them is request-scoped.

use chrono::{DateTime, Utc};

use crate::roles::{OrgRole, TeamRole};

pub type ProjectId = u64;
pub type OrgId = u64;
pub type TeamId = u64;
pub type UserId = u64;

/// Raw lifecycle status of a project row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectStatus {
    Active,
    Disabled,
    PendingDeletion,
    DeletionInProgress,
}

impl ObjectStatus {
    /// Coarse response-facing label. Anything on the deletion path reads as
    /// "deleted" to clients.
    pub fn label(&self) -> &'static str {
        match self {
            ObjectStatus::Active => "active",
            ObjectStatus::Disabled
            | ObjectStatus::PendingDeletion
            | ObjectStatus::DeletionInProgress => "deleted",
        }
    }
}

/// Per-project data flags, set as the project receives its first event of
/// each kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProjectFlags {
    pub has_sessions: bool,
    pub has_replays: bool,
    pub has_profiles: bool,
    pub has_transactions: bool,
    pub has_custom_metrics: bool,
    pub has_minified_stack_trace: bool,
    pub has_cron_monitors: bool,
    pub has_feedbacks: bool,
    pub has_new_feedbacks: bool,
    pub has_releases: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Organization {
    pub id: OrgId,
    pub slug: String,
    pub name: String,
    /// When set, any member of the organization may join or leave any team,
    /// which grants access to every project in the org.
    pub allow_joinleave: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Team {
    pub id: TeamId,
    pub slug: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub slug: String,
    pub name: String,
    /// Exclusive parent; never absent. Scope computation depends on it.
    pub organization: Organization,
    pub status: ObjectStatus,
    pub flags: ProjectFlags,
    pub platform: Option<String>,
    pub date_added: DateTime<Utc>,
    pub first_event: Option<DateTime<Utc>>,
    pub public: bool,
    pub color: String,
    pub is_internal: bool,
}

/// The requesting actor. Anonymous users have no memberships and resolve to
/// an empty scope set.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: UserId,
    pub is_authenticated: bool,
}

impl User {
    pub fn authenticated(id: UserId) -> Self {
        User {
            id,
            is_authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        User {
            id: 0,
            is_authenticated: false,
        }
    }
}

/// Session state of the active HTTP request, threaded in explicitly rather
/// than read from ambient global state.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestContext {
    /// A privileged (superuser) session is active on this request.
    pub superuser_active: bool,
    /// The user the active session belongs to. Superuser elevation applies
    /// only to this user, never to other users evaluated in the same batch.
    pub subject_user_id: Option<UserId>,
}

impl RequestContext {
    /// True only when the privileged session flag is set and the session's
    /// subject is the user being evaluated.
    pub fn is_superuser(&self, user: &User) -> bool {
        self.superuser_active && self.subject_user_id == Some(user.id)
    }
}

/// A user's membership in one team, carrying the roles that scope
/// derivation needs.
#[derive(Clone, Debug, PartialEq)]
pub struct TeamMembership {
    pub team_id: TeamId,
    /// Organization-level role of the owning membership.
    pub org_role: OrgRole,
    /// Explicit team-level role, when one was assigned. Absent means the
    /// minimum team role for `org_role` applies.
    pub team_role: Option<TeamRole>,
}

impl TeamMembership {
    /// The team role that governs this membership's scopes.
    pub fn effective_team_role(&self) -> TeamRole {
        self.team_role
            .unwrap_or_else(|| self.org_role.minimum_team_role())
    }
}
