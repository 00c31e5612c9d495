//! Shared in-memory mock stores for tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::StoreError;
use crate::roles::OrgRole;
use crate::stores::{
    CrashFreeRates, Deploy, FeatureEvaluator, MembershipStore, OptionStore, PluginRegistry,
    ProjectRelationStore, ReleaseHealthEngine, ReleaseStore, TimeseriesEngine,
};
use crate::types::{
    ObjectStatus, OrgId, Organization, Project, ProjectFlags, ProjectId, Team, TeamId,
    TeamMembership, User, UserId,
};

pub fn make_project(id: ProjectId, org_id: OrgId, public: bool) -> Project {
    Project {
        id,
        slug: format!("project-{id}"),
        name: format!("Project {id}"),
        organization: Organization {
            id: org_id,
            slug: format!("org-{org_id}"),
            name: format!("Org {org_id}"),
            allow_joinleave: false,
        },
        status: ObjectStatus::Active,
        flags: ProjectFlags::default(),
        platform: Some("rust".to_string()),
        date_added: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
        first_event: None,
        public,
        color: "#3fbf3f".to_string(),
        is_internal: false,
    }
}

#[derive(Default)]
pub struct MockMembershipStore {
    project_teams: Vec<(ProjectId, TeamId)>,
    memberships: HashMap<UserId, Vec<TeamMembership>>,
    org_roles: HashMap<(UserId, OrgId), OrgRole>,
}

impl MockMembershipStore {
    pub fn with_project_teams(mut self, rows: Vec<(ProjectId, TeamId)>) -> Self {
        self.project_teams = rows;
        self
    }

    pub fn with_memberships(mut self, user_id: UserId, memberships: Vec<TeamMembership>) -> Self {
        self.memberships.insert(user_id, memberships);
        self
    }

    pub fn with_org_role(mut self, user_id: UserId, org_id: OrgId, role: OrgRole) -> Self {
        self.org_roles.insert((user_id, org_id), role);
        self
    }
}

#[async_trait]
impl MembershipStore for MockMembershipStore {
    async fn project_teams(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<(ProjectId, TeamId)>, StoreError> {
        Ok(self
            .project_teams
            .iter()
            .filter(|(project_id, _)| project_ids.contains(project_id))
            .copied()
            .collect())
    }

    async fn team_memberships(
        &self,
        team_ids: &[TeamId],
        user: &User,
    ) -> Result<Vec<TeamMembership>, StoreError> {
        if !user.is_authenticated {
            return Ok(Vec::new());
        }
        Ok(self
            .memberships
            .get(&user.id)
            .map(|memberships| {
                memberships
                    .iter()
                    .filter(|m| team_ids.contains(&m.team_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn org_roles(
        &self,
        org_ids: &[OrgId],
        user: &User,
    ) -> Result<HashMap<OrgId, OrgRole>, StoreError> {
        Ok(org_ids
            .iter()
            .filter_map(|org_id| {
                self.org_roles
                    .get(&(user.id, *org_id))
                    .map(|role| (*org_id, *role))
            })
            .collect())
    }
}

pub struct MockFeatureEvaluator {
    flags: Vec<String>,
    batch: HashMap<String, HashMap<String, bool>>,
    fallback: HashMap<String, HashMap<ProjectId, bool>>,
    fallback_calls: AtomicUsize,
}

impl MockFeatureEvaluator {
    pub fn new(flags: Vec<&str>) -> Self {
        MockFeatureEvaluator {
            flags: flags.into_iter().map(String::from).collect(),
            batch: HashMap::new(),
            fallback: HashMap::new(),
            fallback_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_batch_answer(mut self, project_id: ProjectId, flag: &str, active: bool) -> Self {
        self.batch
            .entry(format!("project:{project_id}"))
            .or_default()
            .insert(flag.to_string(), active);
        self
    }

    pub fn with_fallback_answer(mut self, flag: &str, project_id: ProjectId, active: bool) -> Self {
        self.fallback
            .entry(flag.to_string())
            .or_default()
            .insert(project_id, active);
        self
    }

    pub fn fallback_calls(&self) -> usize {
        self.fallback_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeatureEvaluator for MockFeatureEvaluator {
    fn list_project_flags(&self) -> Vec<String> {
        self.flags.clone()
    }

    async fn batch_evaluate(
        &self,
        flags: &[String],
        _user: &User,
        projects: &[&Project],
        _organization: &Organization,
    ) -> Result<HashMap<String, HashMap<String, bool>>, StoreError> {
        let mut result = HashMap::new();
        for project in projects {
            let key = format!("project:{}", project.id);
            if let Some(answers) = self.batch.get(&key) {
                let answers: HashMap<String, bool> = answers
                    .iter()
                    .filter(|(flag, _)| flags.contains(flag))
                    .map(|(flag, active)| (flag.clone(), *active))
                    .collect();
                if !answers.is_empty() {
                    result.insert(key, answers);
                }
            }
        }
        Ok(result)
    }

    async fn evaluate_one(
        &self,
        flag: &str,
        _organization: &Organization,
        projects: &[&Project],
        _user: &User,
    ) -> Result<HashMap<ProjectId, bool>, StoreError> {
        self.fallback_calls.fetch_add(1, Ordering::SeqCst);
        let answers = self.fallback.get(flag).cloned().unwrap_or_default();
        Ok(projects
            .iter()
            .filter_map(|project| answers.get(&project.id).map(|active| (project.id, *active)))
            .collect())
    }
}

#[derive(Default)]
pub struct MockTimeseriesEngine {
    series: HashMap<ProjectId, Vec<(i64, u64)>>,
    last_query: Mutex<Option<String>>,
}

impl MockTimeseriesEngine {
    pub fn with_series(mut self, project_id: ProjectId, series: Vec<(i64, u64)>) -> Self {
        self.series.insert(project_id, series);
        self
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimeseriesEngine for MockTimeseriesEngine {
    async fn timeseries(
        &self,
        project_ids: &[ProjectId],
        query: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _rollup_secs: i64,
    ) -> Result<HashMap<ProjectId, Vec<(i64, u64)>>, StoreError> {
        *self.last_query.lock().unwrap() = Some(query.to_string());
        Ok(self
            .series
            .iter()
            .filter(|(project_id, _)| project_ids.contains(project_id))
            .map(|(project_id, series)| (*project_id, series.clone()))
            .collect())
    }
}

#[derive(Default)]
pub struct MockReleaseHealthEngine {
    rates: HashMap<ProjectId, CrashFreeRates>,
    has_data: HashSet<ProjectId>,
    existence_checks: AtomicUsize,
}

impl MockReleaseHealthEngine {
    pub fn with_rates(mut self, project_id: ProjectId, rates: CrashFreeRates) -> Self {
        self.rates.insert(project_id, rates);
        self
    }

    pub fn with_health_data(mut self, project_id: ProjectId) -> Self {
        self.has_data.insert(project_id);
        self
    }

    pub fn existence_checks(&self) -> usize {
        self.existence_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseHealthEngine for MockReleaseHealthEngine {
    async fn current_and_previous_crash_free_rates(
        &self,
        project_ids: &[ProjectId],
        _current_start: DateTime<Utc>,
        _current_end: DateTime<Utc>,
        _previous_start: DateTime<Utc>,
        _previous_end: DateTime<Utc>,
        _rollup_secs: i64,
    ) -> Result<HashMap<ProjectId, CrashFreeRates>, StoreError> {
        Ok(project_ids
            .iter()
            .map(|project_id| {
                (
                    *project_id,
                    self.rates.get(project_id).copied().unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn check_has_health_data(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashSet<ProjectId>, StoreError> {
        self.existence_checks.fetch_add(1, Ordering::SeqCst);
        Ok(project_ids
            .iter()
            .filter(|project_id| self.has_data.contains(project_id))
            .copied()
            .collect())
    }
}

#[derive(Default)]
pub struct MockOptionStore {
    options: HashMap<ProjectId, HashMap<String, JsonValue>>,
}

impl MockOptionStore {
    pub fn with_option(mut self, project_id: ProjectId, key: &str, value: JsonValue) -> Self {
        self.options
            .entry(project_id)
            .or_default()
            .insert(key.to_string(), value);
        self
    }
}

#[async_trait]
impl OptionStore for MockOptionStore {
    async fn options_for(
        &self,
        project_ids: &[ProjectId],
        keys: &[String],
    ) -> Result<HashMap<ProjectId, HashMap<String, JsonValue>>, StoreError> {
        Ok(self
            .options
            .iter()
            .filter(|(project_id, _)| project_ids.contains(project_id))
            .map(|(project_id, options)| {
                let filtered = options
                    .iter()
                    .filter(|(key, _)| keys.contains(key))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                (*project_id, filtered)
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MockRelationStore {
    bookmarks: HashMap<UserId, HashSet<ProjectId>>,
    platforms: Vec<(ProjectId, String)>,
    teams: Vec<(ProjectId, Team)>,
    environments: HashMap<ProjectId, Vec<String>>,
    user_reports: HashSet<ProjectId>,
    low_priority: HashSet<ProjectId>,
    processing_issues: HashMap<ProjectId, u64>,
}

impl MockRelationStore {
    pub fn with_bookmark(mut self, user_id: UserId, project_id: ProjectId) -> Self {
        self.bookmarks.entry(user_id).or_default().insert(project_id);
        self
    }

    pub fn with_platform(mut self, project_id: ProjectId, platform: &str) -> Self {
        self.platforms.push((project_id, platform.to_string()));
        self
    }

    pub fn with_team(mut self, project_id: ProjectId, team: Team) -> Self {
        self.teams.push((project_id, team));
        self
    }

    pub fn with_environments(mut self, project_id: ProjectId, names: Vec<&str>) -> Self {
        self.environments
            .insert(project_id, names.into_iter().map(String::from).collect());
        self
    }

    pub fn with_user_reports(mut self, project_id: ProjectId) -> Self {
        self.user_reports.insert(project_id);
        self
    }

    pub fn with_low_priority(mut self, project_id: ProjectId) -> Self {
        self.low_priority.insert(project_id);
        self
    }

    pub fn with_processing_issues(mut self, project_id: ProjectId, count: u64) -> Self {
        self.processing_issues.insert(project_id, count);
        self
    }
}

#[async_trait]
impl ProjectRelationStore for MockRelationStore {
    async fn bookmarked_project_ids(
        &self,
        user: &User,
        project_ids: &[ProjectId],
    ) -> Result<HashSet<ProjectId>, StoreError> {
        Ok(self
            .bookmarks
            .get(&user.id)
            .map(|bookmarked| {
                project_ids
                    .iter()
                    .filter(|project_id| bookmarked.contains(project_id))
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn platforms(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<(ProjectId, String)>, StoreError> {
        Ok(self
            .platforms
            .iter()
            .filter(|(project_id, _)| project_ids.contains(project_id))
            .cloned()
            .collect())
    }

    async fn teams_for_projects(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<(ProjectId, Team)>, StoreError> {
        Ok(self
            .teams
            .iter()
            .filter(|(project_id, _)| project_ids.contains(project_id))
            .cloned()
            .collect())
    }

    async fn environment_names(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashMap<ProjectId, Vec<String>>, StoreError> {
        Ok(self
            .environments
            .iter()
            .filter(|(project_id, _)| project_ids.contains(project_id))
            .map(|(project_id, names)| (*project_id, names.clone()))
            .collect())
    }

    async fn project_ids_with_user_reports(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashSet<ProjectId>, StoreError> {
        Ok(project_ids
            .iter()
            .filter(|project_id| self.user_reports.contains(project_id))
            .copied()
            .collect())
    }

    async fn low_priority_project_ids(&self) -> Result<HashSet<ProjectId>, StoreError> {
        Ok(self.low_priority.clone())
    }

    async fn processing_issue_counts(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashMap<ProjectId, u64>, StoreError> {
        Ok(self
            .processing_issues
            .iter()
            .filter(|(project_id, _)| project_ids.contains(project_id))
            .map(|(project_id, count)| (*project_id, *count))
            .collect())
    }
}

#[derive(Default)]
pub struct MockReleaseStore {
    versions: HashMap<ProjectId, String>,
    deploys: HashMap<ProjectId, HashMap<String, Deploy>>,
}

impl MockReleaseStore {
    pub fn with_latest_release(mut self, project_id: ProjectId, version: &str) -> Self {
        self.versions.insert(project_id, version.to_string());
        self
    }

    pub fn with_deploy(mut self, project_id: ProjectId, environment: &str, deploy: Deploy) -> Self {
        self.deploys
            .entry(project_id)
            .or_default()
            .insert(environment.to_string(), deploy);
        self
    }
}

#[async_trait]
impl ReleaseStore for MockReleaseStore {
    async fn latest_release_versions(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashMap<ProjectId, String>, StoreError> {
        Ok(self
            .versions
            .iter()
            .filter(|(project_id, _)| project_ids.contains(project_id))
            .map(|(project_id, version)| (*project_id, version.clone()))
            .collect())
    }

    async fn latest_deploys(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<HashMap<ProjectId, HashMap<String, Deploy>>, StoreError> {
        Ok(self
            .deploys
            .iter()
            .filter(|(project_id, _)| project_ids.contains(project_id))
            .map(|(project_id, deploys)| (*project_id, deploys.clone()))
            .collect())
    }
}

#[derive(Default)]
pub struct MockPluginRegistry {
    plugins: Vec<JsonValue>,
}

impl MockPluginRegistry {
    pub fn with_plugin(mut self, descriptor: JsonValue) -> Self {
        self.plugins.push(descriptor);
        self
    }
}

#[async_trait]
impl PluginRegistry for MockPluginRegistry {
    async fn configurable_for_project(
        &self,
        _project: &Project,
        _user: &User,
    ) -> Result<Vec<JsonValue>, StoreError> {
        Ok(self.plugins.clone())
    }
}
