//! Static role registry.
//!
//! Roles are named bundles of scopes. Organization-level roles additionally
//! map to a minimum team-level role, which is what scope derivation unions
//! in for members that hold an org role but no explicit team role.

use std::collections::BTreeSet;

/// A single named permission unit, e.g. `project:read`. Scopes combine by
/// set union only.
pub type Scope = String;

/// Team-level roles, ordered weakest to strongest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TeamRole {
    Contributor,
    Admin,
}

impl TeamRole {
    pub fn id(&self) -> &'static str {
        match self {
            TeamRole::Contributor => "contributor",
            TeamRole::Admin => "admin",
        }
    }

    /// Scope set granted by holding this role on a team.
    pub fn scopes(&self) -> BTreeSet<Scope> {
        let base: &[&str] = &[
            "event:read",
            "event:write",
            "member:read",
            "org:read",
            "project:read",
            "project:releases",
            "team:read",
            "alerts:read",
        ];
        let admin_extra: &[&str] = &[
            "event:admin",
            "project:write",
            "project:admin",
            "team:write",
            "team:admin",
            "alerts:write",
        ];

        let mut scopes: BTreeSet<Scope> = base.iter().map(|s| s.to_string()).collect();
        if matches!(self, TeamRole::Admin) {
            scopes.extend(admin_extra.iter().map(|s| s.to_string()));
        }
        scopes
    }
}

/// Organization-level roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrgRole {
    Member,
    Admin,
    Manager,
    Owner,
}

impl OrgRole {
    pub fn id(&self) -> &'static str {
        match self {
            OrgRole::Member => "member",
            OrgRole::Admin => "admin",
            OrgRole::Manager => "manager",
            OrgRole::Owner => "owner",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "member" => Some(OrgRole::Member),
            "admin" => Some(OrgRole::Admin),
            "manager" => Some(OrgRole::Manager),
            "owner" => Some(OrgRole::Owner),
            _ => None,
        }
    }

    /// Global roles grant access to every project in the organization,
    /// regardless of team membership.
    pub fn is_global(&self) -> bool {
        matches!(self, OrgRole::Manager | OrgRole::Owner)
    }

    /// The weakest team role implied by holding this org role.
    pub fn minimum_team_role(&self) -> TeamRole {
        match self {
            OrgRole::Member => TeamRole::Contributor,
            OrgRole::Admin | OrgRole::Manager | OrgRole::Owner => TeamRole::Admin,
        }
    }

    /// The strongest org role. Superuser sessions are treated as holding it.
    pub fn top_role() -> Self {
        OrgRole::Owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_roles() {
        assert!(!OrgRole::Member.is_global());
        assert!(!OrgRole::Admin.is_global());
        assert!(OrgRole::Manager.is_global());
        assert!(OrgRole::Owner.is_global());
    }

    #[test]
    fn test_admin_scopes_superset_of_contributor() {
        let contributor = TeamRole::Contributor.scopes();
        let admin = TeamRole::Admin.scopes();
        assert!(contributor.is_subset(&admin));
        assert!(admin.contains("project:admin"));
        assert!(!contributor.contains("project:admin"));
    }

    #[test]
    fn test_role_id_round_trip() {
        for role in [OrgRole::Member, OrgRole::Admin, OrgRole::Manager, OrgRole::Owner] {
            assert_eq!(OrgRole::from_id(role.id()), Some(role));
        }
        assert_eq!(OrgRole::from_id("billing"), None);
    }
}
