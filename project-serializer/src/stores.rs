//! Collaborator interfaces consumed by the aggregation engine.
//!
//! Every backing store and query engine is an opaque service behind an
//! async trait. All lookups are batch-shaped: one call covers the whole
//! project set to keep the round-trip count independent of batch size.
//! Timeout and retry policy belong to the store implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::errors::StoreError;
use crate::roles::OrgRole;
use crate::types::{OrgId, Organization, Project, ProjectId, Team, TeamId, TeamMembership, User};

/// Membership store: team membership rows and organization-level roles.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// All (project, team) join rows for the given projects.
    async fn project_teams(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<(ProjectId, TeamId)>, StoreError>;

    /// The user's memberships restricted to the given teams. Implementations
    /// must return an empty list for unauthenticated users.
    async fn team_memberships(
        &self,
        team_ids: &[TeamId],
        user: &User,
    ) -> Result<Vec<TeamMembership>, StoreError>;

    /// The user's highest organization-level role per organization.
    async fn org_roles(
        &self,
        org_ids: &[OrgId],
        user: &User,
    ) -> Result<HashMap<OrgId, OrgRole>, StoreError>;
}

/// Feature registry and evaluator.
///
/// Evaluation context is organization-scoped; both evaluation calls cover a
/// whole org-group of projects at once.
#[async_trait]
pub trait FeatureEvaluator: Send + Sync {
    /// All registered project-scoped flags, with their `projects:` namespace
    /// prefix.
    fn list_project_flags(&self) -> Vec<String>;

    /// One call answering the whole flag-and-project matrix. Keys in the
    /// outer map are `project:{id}`. May return an empty or partial result
    /// when the registry cannot batch some flags; unanswered flags go
    /// through [`FeatureEvaluator::evaluate_one`].
    async fn batch_evaluate(
        &self,
        flags: &[String],
        user: &User,
        projects: &[&Project],
        organization: &Organization,
    ) -> Result<HashMap<String, HashMap<String, bool>>, StoreError>;

    /// Evaluates a single flag for a group of projects in one organization.
    /// This is the degraded path for flags the batch call did not answer.
    async fn evaluate_one(
        &self,
        flag: &str,
        organization: &Organization,
        projects: &[&Project],
        user: &User,
    ) -> Result<HashMap<ProjectId, bool>, StoreError>;
}

/// Time-series query engine for event counts.
#[async_trait]
pub trait TimeseriesEngine: Send + Sync {
    /// Bucketed event counts per project as `(unix_timestamp, count)` pairs.
    async fn timeseries(
        &self,
        project_ids: &[ProjectId],
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        rollup_secs: i64,
    ) -> Result<HashMap<ProjectId, Vec<(i64, u64)>>, StoreError>;
}

/// Crash-free session rates for one project over two adjacent windows.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CrashFreeRates {
    pub current: Option<f64>,
    pub previous: Option<f64>,
}

/// Session health / crash-free-rate engine.
#[async_trait]
pub trait ReleaseHealthEngine: Send + Sync {
    async fn current_and_previous_crash_free_rates(
        &self,
        project_ids: &[ProjectId],
        current_start: DateTime<Utc>,
        current_end: DateTime<Utc>,
        previous_start: DateTime<Utc>,
        previous_end: DateTime<Utc>,
        rollup_secs: i64,
    ) -> Result<HashMap<ProjectId, CrashFreeRates>, StoreError>;

    /// Which of the given projects have any session data at all. Only called
    /// for projects whose rate lookup was empty in both windows.
    async fn check_has_health_data(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashSet<ProjectId>, StoreError>;
}

/// Stored per-project options.
#[async_trait]
pub trait OptionStore: Send + Sync {
    /// Stored values for the given keys, per project. Projects with no rows
    /// are simply absent.
    async fn options_for(
        &self,
        project_ids: &[ProjectId],
        keys: &[String],
    ) -> Result<HashMap<ProjectId, HashMap<String, JsonValue>>, StoreError>;
}

/// Small per-project relations: bookmarks, platforms, teams, environments,
/// user reports, processing state.
#[async_trait]
pub trait ProjectRelationStore: Send + Sync {
    async fn bookmarked_project_ids(
        &self,
        user: &User,
        project_ids: &[ProjectId],
    ) -> Result<HashSet<ProjectId>, StoreError>;

    /// All (project, platform) rows for the given projects.
    async fn platforms(&self, project_ids: &[ProjectId])
    -> Result<Vec<(ProjectId, String)>, StoreError>;

    /// All (project, team) rows with full team records.
    async fn teams_for_projects(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<(ProjectId, Team)>, StoreError>;

    /// Visible environment names per project, hidden and unnamed
    /// environments excluded.
    async fn environment_names(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashMap<ProjectId, Vec<String>>, StoreError>;

    async fn project_ids_with_user_reports(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashSet<ProjectId>, StoreError>;

    /// Projects currently demoted to the low-priority symbolication queue.
    async fn low_priority_project_ids(&self) -> Result<HashSet<ProjectId>, StoreError>;

    async fn processing_issue_counts(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashMap<ProjectId, u64>, StoreError>;
}

/// A finished deploy of one release into one environment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Deploy {
    pub version: String,
    #[serde(rename = "dateFinished")]
    pub date_finished: DateTime<Utc>,
}

/// Release and deploy lookups.
///
/// Implementations are expected to bound their scans (e.g. consider only the
/// top-N newest candidate releases per project) so a project with a huge
/// release history cannot blow up the query.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Latest release version string per project. Projects without releases
    /// are absent.
    async fn latest_release_versions(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashMap<ProjectId, String>, StoreError>;

    /// Most recent finished deploy per (project, environment).
    async fn latest_deploys(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashMap<ProjectId, HashMap<String, Deploy>>, StoreError>;
}

/// Plugin registry: the serialized descriptors of plugins that are
/// configurable for a project. Descriptor shape is owned by the plugin
/// system and passed through opaquely.
#[async_trait]
pub trait PluginRegistry: Send + Sync {
    async fn configurable_for_project(
        &self,
        project: &Project,
        user: &User,
    ) -> Result<Vec<JsonValue>, StoreError>;
}

/// Bundle of all collaborator handles the orchestrator needs.
#[derive(Clone)]
pub struct Stores {
    pub memberships: Arc<dyn MembershipStore>,
    pub features: Arc<dyn FeatureEvaluator>,
    pub timeseries: Arc<dyn TimeseriesEngine>,
    pub release_health: Arc<dyn ReleaseHealthEngine>,
    pub options: Arc<dyn OptionStore>,
    pub relations: Arc<dyn ProjectRelationStore>,
    pub releases: Arc<dyn ReleaseStore>,
    pub plugins: Arc<dyn PluginRegistry>,
}
