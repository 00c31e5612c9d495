//! Aggregation Orchestrator.
//!
//! `get_attrs` composes the scope, feature and option resolvers into one
//! attribute bag per project, with each enrichment gated by request-level
//! expand/collapse flags. `serialize` and its wrappers then turn a
//! `(project, attrs, user)` triple into the response payload as a pure
//! function, with no further external calls.
//!
//! The original design layered serializer variants through subclassing;
//! here each variant is a composition of the base attrs plus decorator
//! stages that add one coherent slice of data (teams, organization,
//! release/deploy summary, detailed settings).

pub mod response;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{Instrument, debug_span};

use crate::access::{Access, ScopeCache, resolve_access};
use crate::errors::Result;
use crate::features::resolve_features;
use crate::metrics_defs;
use crate::options::{
    OPTION_KEYS, RawOptions, bool_value, format_options, get_value_with_default,
    redacted_symbol_sources, string_list,
};
use crate::roles::Scope;
use crate::stats::{SessionStats, StatsPeriod, StatsSeries, get_session_stats, get_stats};
use crate::stores::{Deploy, Stores};
use crate::types::{Project, ProjectId, RequestContext, Team, User};

use response::{
    AvatarResponse, DetailedProjectResponse, EventProcessingResponse, LatestReleaseResponse,
    OrganizationResponse, ProjectBaseResponse, ProjectResponse, ProjectSummaryResponse,
    ProjectWithOrganizationResponse, ProjectWithTeamResponse, TeamResponse,
};

/// Collapse key that drops the latest-deploy lookup from summary payloads.
pub const LATEST_DEPLOYS_KEY: &str = "latestDeploys";

/// Collapse key that drops backend-only feature flags from the response.
pub const UNUSED_ON_FRONTEND_FEATURES_KEY: &str = "unusedFeatures";

/// Expand keys for the optional stats series and raw options.
pub const EXPAND_TRANSACTION_STATS: &str = "transaction_stats";
pub const EXPAND_SESSION_STATS: &str = "session_stats";
pub const EXPAND_OPTIONS: &str = "options";

const DIGESTS_MINIMUM_DELAY_DEFAULT: u64 = 300;
const DIGESTS_MAXIMUM_DELAY_DEFAULT: u64 = 1800;
const SUBJECT_PREFIX_DEFAULT: &str = "[Sentry]";
const SUBJECT_TEMPLATE_DEFAULT: &str = "$shortID - $title";

/// Per-project attribute bag produced by `get_attrs`.
///
/// Optional fields correspond to the request-gated expansions; which stage
/// populates which field is fixed at compile time rather than negotiated
/// through an open map.
#[derive(Clone, Debug, Default)]
pub struct ProjectAttrs {
    pub is_bookmarked: bool,
    pub is_member: bool,
    pub has_access: bool,
    pub access: std::collections::BTreeSet<Scope>,
    pub features: Vec<String>,
    pub platforms: Vec<String>,
    pub stats: Option<StatsSeries>,
    pub transaction_stats: Option<StatsSeries>,
    pub session_stats: Option<SessionStats>,
    /// Raw option expansion, restricted to the allowed key list.
    pub options: Option<HashMap<String, JsonValue>>,
}

/// Extra attributes added by the summary decorator stage.
#[derive(Clone, Debug, Default)]
pub struct SummaryAttrs {
    pub environments: Vec<String>,
    pub has_user_reports: bool,
    pub latest_release: Option<LatestReleaseResponse>,
    /// None when the lookup was collapsed away.
    pub deploys: Option<HashMap<String, Deploy>>,
    pub symbolication_degraded: bool,
}

/// Extra attributes added by the detailed decorator stage.
#[derive(Clone, Debug, Default)]
pub struct DetailedAttrs {
    pub options: RawOptions,
    pub latest_release: Option<LatestReleaseResponse>,
    pub processing_issues: u64,
    pub plugins: Vec<JsonValue>,
}

/// Request-configured serializer over a bundle of backing stores.
///
/// Primarily used to summarize projects in bulk loads ("all projects of
/// this organization"); per-request gates keep the expensive enrichments
/// opt-in.
pub struct ProjectSerializer {
    stores: Stores,
    environment_id: Option<String>,
    stats_period: Option<StatsPeriod>,
    expand: HashSet<String>,
    expand_option_keys: Vec<String>,
    collapse: HashSet<String>,
}

impl ProjectSerializer {
    pub fn new(stores: Stores) -> Self {
        ProjectSerializer {
            stores,
            environment_id: None,
            stats_period: None,
            expand: HashSet::new(),
            expand_option_keys: Vec::new(),
            collapse: HashSet::new(),
        }
    }

    pub fn with_environment_id(mut self, environment_id: impl Into<String>) -> Self {
        self.environment_id = Some(environment_id.into());
        self
    }

    /// Sets the stats window from its request-facing name, e.g. `"24h"`.
    pub fn with_stats_period(mut self, period: &str) -> Result<Self> {
        self.stats_period = Some(StatsPeriod::parse(period)?);
        Ok(self)
    }

    pub fn with_expand(mut self, key: &str) -> Self {
        self.expand.insert(key.to_string());
        self
    }

    /// Option keys requested through the raw-option expansion. Filtered
    /// against the allowlist at lookup time.
    pub fn with_expand_option_keys(mut self, keys: Vec<String>) -> Self {
        self.expand_option_keys = keys;
        self
    }

    pub fn with_collapse(mut self, key: &str) -> Self {
        self.collapse.insert(key.to_string());
        self
    }

    fn expands(&self, key: &str) -> bool {
        self.expand.contains(key)
    }

    fn collapses(&self, key: &str) -> bool {
        self.collapse.contains(key)
    }

    /// Resolves the base attribute bag for every project in the batch.
    ///
    /// The result has exactly one entry per input project, in input order.
    pub async fn get_attrs(
        &self,
        projects: &[Project],
        user: &User,
        request: &RequestContext,
    ) -> Result<IndexMap<ProjectId, ProjectAttrs>> {
        let started = Instant::now();
        metrics::histogram!(metrics_defs::GET_ATTRS_BATCH_SIZE.name)
            .record(projects.len() as f64);

        let project_ids: Vec<ProjectId> = projects.iter().map(|p| p.id).collect();

        let bookmarks = if user.is_authenticated && !projects.is_empty() {
            self.stores
                .relations
                .bookmarked_project_ids(user, &project_ids)
                .instrument(debug_span!("serialize.get_attrs.project.bookmarks"))
                .await?
        } else {
            HashSet::new()
        };

        let mut stats = None;
        let mut transaction_stats = None;
        let mut session_stats = None;
        if let Some(period) = self.stats_period {
            let span = debug_span!("serialize.get_attrs.project.stats");
            let now = Utc::now();
            let environment = self.environment_id.as_deref();
            stats = Some(
                get_stats(
                    &project_ids,
                    "!event.type:transaction",
                    environment,
                    period,
                    now,
                    &*self.stores.timeseries,
                )
                .instrument(span.clone())
                .await?,
            );
            if self.expands(EXPAND_TRANSACTION_STATS) {
                transaction_stats = Some(
                    get_stats(
                        &project_ids,
                        "event.type:transaction",
                        environment,
                        period,
                        now,
                        &*self.stores.timeseries,
                    )
                    .instrument(span.clone())
                    .await?,
                );
            }
            if self.expands(EXPAND_SESSION_STATS) {
                session_stats = Some(
                    get_session_stats(&project_ids, period, now, &*self.stores.release_health)
                        .instrument(span)
                        .await?,
                );
            }
        }

        let mut expanded_options = None;
        if self.expands(EXPAND_OPTIONS) {
            // Only allowlisted keys may be disclosed through the expansion.
            let keys: Vec<String> = self
                .expand_option_keys
                .iter()
                .filter(|key| OPTION_KEYS.contains(&key.as_str()))
                .cloned()
                .collect();
            expanded_options = Some(
                self.stores
                    .options
                    .options_for(&project_ids, &keys)
                    .instrument(debug_span!("serialize.get_attrs.project.options"))
                    .await?,
            );
        }

        let mut platforms_by_project: HashMap<ProjectId, Vec<String>> = HashMap::new();
        for (project_id, platform) in self.stores.relations.platforms(&project_ids).await? {
            platforms_by_project
                .entry(project_id)
                .or_default()
                .push(platform);
        }

        let mut cache = ScopeCache::new();
        let mut access =
            resolve_access(projects, user, request, &*self.stores.memberships, &mut cache)
                .instrument(debug_span!("serialize.get_attrs.project.access"))
                .await?;

        let mut features = resolve_features(
            projects,
            user,
            &*self.stores.features,
            self.collapses(UNUSED_ON_FRONTEND_FEATURES_KEY),
        )
        .instrument(debug_span!("serialize.get_attrs.project.features"))
        .await?;

        let mut result = IndexMap::with_capacity(projects.len());
        for project in projects {
            let Access {
                is_member,
                has_access,
                scopes,
            } = access.swap_remove(&project.id).unwrap_or_default();
            result.insert(
                project.id,
                ProjectAttrs {
                    is_bookmarked: bookmarks.contains(&project.id),
                    is_member,
                    has_access,
                    access: scopes,
                    features: features.swap_remove(&project.id).unwrap_or_default(),
                    platforms: platforms_by_project.remove(&project.id).unwrap_or_default(),
                    stats: stats
                        .as_mut()
                        .map(|s| s.remove(&project.id).unwrap_or_default()),
                    transaction_stats: transaction_stats
                        .as_mut()
                        .map(|s| s.remove(&project.id).unwrap_or_default()),
                    session_stats: session_stats
                        .as_mut()
                        .map(|s| s.remove(&project.id).unwrap_or_default()),
                    options: expanded_options
                        .as_mut()
                        .map(|o| o.remove(&project.id).unwrap_or_default()),
                },
            );
        }

        metrics::histogram!(metrics_defs::GET_ATTRS_DURATION.name)
            .record(started.elapsed().as_secs_f64());
        Ok(result)
    }

    /// Team decorator stage: team records per project, in join-row order.
    pub async fn get_team_attrs(
        &self,
        projects: &[Project],
    ) -> Result<HashMap<ProjectId, Vec<TeamResponse>>> {
        let project_ids: Vec<ProjectId> = projects.iter().map(|p| p.id).collect();
        let mut teams_by_project: HashMap<ProjectId, Vec<TeamResponse>> =
            project_ids.iter().map(|id| (*id, Vec::new())).collect();
        for (project_id, team) in self.stores.relations.teams_for_projects(&project_ids).await? {
            if let Some(teams) = teams_by_project.get_mut(&project_id) {
                teams.push(team_response(&team));
            }
        }
        Ok(teams_by_project)
    }

    /// Summary decorator stage: environments, user reports, latest release
    /// and (unless collapsed) latest deploys.
    pub async fn get_summary_attrs(
        &self,
        projects: &[Project],
    ) -> Result<HashMap<ProjectId, SummaryAttrs>> {
        let project_ids: Vec<ProjectId> = projects.iter().map(|p| p.id).collect();

        let with_user_reports = self
            .stores
            .relations
            .project_ids_with_user_reports(&project_ids)
            .await?;
        let mut environments = self
            .stores
            .relations
            .environment_names(&project_ids)
            .await?;
        let latest_releases = self
            .stores
            .releases
            .latest_release_versions(&project_ids)
            .await?;
        let mut deploys = if self.collapses(LATEST_DEPLOYS_KEY) {
            None
        } else {
            Some(self.stores.releases.latest_deploys(&project_ids).await?)
        };
        let low_priority = self
            .stores
            .relations
            .low_priority_project_ids()
            .instrument(debug_span!("serialize.get_attrs.project.lpq"))
            .await?;

        let mut result = HashMap::with_capacity(projects.len());
        for project in projects {
            result.insert(
                project.id,
                SummaryAttrs {
                    environments: environments.remove(&project.id).unwrap_or_default(),
                    has_user_reports: with_user_reports.contains(&project.id),
                    latest_release: latest_releases
                        .get(&project.id)
                        .map(|version| LatestReleaseResponse {
                            version: version.clone(),
                        }),
                    deploys: deploys
                        .as_mut()
                        .map(|d| d.remove(&project.id).unwrap_or_default()),
                    symbolication_degraded: low_priority.contains(&project.id),
                },
            );
        }
        Ok(result)
    }

    /// Detailed decorator stage: full allowlisted option rows, latest
    /// release, processing issue counts, and configurable plugins.
    pub async fn get_detailed_attrs(
        &self,
        projects: &[Project],
        user: &User,
    ) -> Result<HashMap<ProjectId, DetailedAttrs>> {
        let project_ids: Vec<ProjectId> = projects.iter().map(|p| p.id).collect();
        let keys: Vec<String> = OPTION_KEYS.iter().map(|key| key.to_string()).collect();

        let mut options = self.stores.options.options_for(&project_ids, &keys).await?;
        let latest_releases = self
            .stores
            .releases
            .latest_release_versions(&project_ids)
            .await?;
        let processing_issues = self
            .stores
            .relations
            .processing_issue_counts(&project_ids)
            .await?;

        let mut result = HashMap::with_capacity(projects.len());
        for project in projects {
            let plugins = self
                .stores
                .plugins
                .configurable_for_project(project, user)
                .await?;
            result.insert(
                project.id,
                DetailedAttrs {
                    options: options.remove(&project.id).unwrap_or_default(),
                    latest_release: latest_releases
                        .get(&project.id)
                        .map(|version| LatestReleaseResponse {
                            version: version.clone(),
                        }),
                    processing_issues: processing_issues
                        .get(&project.id)
                        .copied()
                        .unwrap_or_default(),
                    plugins,
                },
            );
        }
        Ok(result)
    }
}

fn team_response(team: &Team) -> TeamResponse {
    TeamResponse {
        id: team.id.to_string(),
        slug: team.slug.clone(),
        name: team.name.clone(),
    }
}

fn organization_response(project: &Project) -> OrganizationResponse {
    OrganizationResponse {
        id: project.organization.id.to_string(),
        slug: project.organization.slug.clone(),
        name: project.organization.name.clone(),
    }
}

fn base_response(project: &Project, attrs: &ProjectAttrs) -> ProjectBaseResponse {
    ProjectBaseResponse {
        id: project.id.to_string(),
        slug: project.slug.clone(),
        name: project.name.clone(),
        platform: project.platform.clone(),
        date_created: project.date_added,
        is_bookmarked: attrs.is_bookmarked,
        is_member: attrs.is_member,
        features: attrs.features.clone(),
        first_event: project.first_event,
        first_transaction_event: project.flags.has_transactions,
        access: attrs.access.iter().cloned().collect(),
        has_access: attrs.has_access,
        has_custom_metrics: project.flags.has_custom_metrics,
        has_minified_stack_trace: project.flags.has_minified_stack_trace,
        has_monitors: project.flags.has_cron_monitors,
        has_profiles: project.flags.has_profiles,
        has_replays: project.flags.has_replays,
        has_sessions: project.flags.has_sessions,
        stats: attrs.stats.clone(),
        transaction_stats: attrs.transaction_stats.clone(),
        session_stats: attrs.session_stats.clone(),
    }
}

/// Pure base serialization of `(project, attrs, user)` into the response
/// payload. Makes no external calls.
pub fn serialize(project: &Project, attrs: &ProjectAttrs, _user: &User) -> ProjectResponse {
    ProjectResponse {
        base: base_response(project, attrs),
        has_feedbacks: project.flags.has_feedbacks,
        has_new_feedbacks: project.flags.has_new_feedbacks,
        is_internal: project.is_internal,
        is_public: project.public,
        avatar: AvatarResponse::default(),
        color: project.color.clone(),
        status: project.status.label().to_string(),
    }
}

/// Base payload plus the team slice.
pub fn serialize_with_team(
    project: &Project,
    attrs: &ProjectAttrs,
    teams: &[TeamResponse],
    user: &User,
) -> ProjectWithTeamResponse {
    ProjectWithTeamResponse {
        project: serialize(project, attrs, user),
        team: teams.first().cloned(),
        teams: teams.to_vec(),
    }
}

/// Base payload plus the organization slice.
pub fn serialize_with_organization(
    project: &Project,
    attrs: &ProjectAttrs,
    user: &User,
) -> ProjectWithOrganizationResponse {
    ProjectWithOrganizationResponse {
        project: serialize(project, attrs, user),
        organization: organization_response(project),
    }
}

/// Shared fields plus the team slice and the release/deploy/environment
/// summary slice. The organization index shape: presentation fields of the
/// full payload (avatar, color, status) are not part of it, and this is the
/// only shape that carries the raw-option expansion rows.
pub fn serialize_summary(
    project: &Project,
    attrs: &ProjectAttrs,
    teams: &[TeamResponse],
    summary: &SummaryAttrs,
    _user: &User,
) -> ProjectSummaryResponse {
    ProjectSummaryResponse {
        base: base_response(project, attrs),
        team: teams.first().cloned(),
        teams: teams.to_vec(),
        platforms: attrs.platforms.clone(),
        environments: summary.environments.clone(),
        has_user_reports: summary.has_user_reports,
        latest_release: summary.latest_release.clone(),
        latest_deploys: summary.deploys.clone(),
        event_processing: EventProcessingResponse {
            symbolication_degraded: summary.symbolication_degraded,
        },
        options: attrs.options.clone(),
    }
}

/// Team payload plus the full settings slice with effective option values.
pub fn serialize_detailed(
    project: &Project,
    attrs: &ProjectAttrs,
    teams: &[TeamResponse],
    detailed: &DetailedAttrs,
    user: &User,
) -> DetailedProjectResponse {
    let options = &detailed.options;
    DetailedProjectResponse {
        with_team: serialize_with_team(project, attrs, teams, user),
        latest_release: detailed.latest_release.clone(),
        options: format_options(options),
        digests_min_delay: options
            .get("digests:mail:minimum_delay")
            .and_then(JsonValue::as_u64)
            .unwrap_or(DIGESTS_MINIMUM_DELAY_DEFAULT),
        digests_max_delay: options
            .get("digests:mail:maximum_delay")
            .and_then(JsonValue::as_u64)
            .unwrap_or(DIGESTS_MAXIMUM_DELAY_DEFAULT),
        subject_prefix: options
            .get("mail:subject_prefix")
            .and_then(JsonValue::as_str)
            .unwrap_or(SUBJECT_PREFIX_DEFAULT)
            .to_string(),
        allowed_domains: string_list(options, "sentry:origins")
            .unwrap_or_else(|| vec!["*".to_string()]),
        resolve_age: options
            .get("sentry:resolve_age")
            .and_then(JsonValue::as_u64)
            .unwrap_or(0),
        data_scrubber: bool_value(options, "sentry:scrub_data", true),
        data_scrubber_defaults: bool_value(options, "sentry:scrub_defaults", true),
        safe_fields: string_list(options, "sentry:safe_fields").unwrap_or_default(),
        store_crash_reports: options
            .get("sentry:store_crash_reports")
            .and_then(JsonValue::as_i64),
        sensitive_fields: string_list(options, "sentry:sensitive_fields").unwrap_or_default(),
        subject_template: options
            .get("mail:subject_template")
            .and_then(JsonValue::as_str)
            .unwrap_or(SUBJECT_TEMPLATE_DEFAULT)
            .to_string(),
        security_token: options
            .get("sentry:token")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string(),
        security_token_header: options
            .get("sentry:token_header")
            .and_then(JsonValue::as_str)
            .map(String::from),
        verify_ssl: bool_value(options, "sentry:verify_ssl", false),
        scrub_ip_addresses: bool_value(options, "sentry:scrub_ip_address", false),
        scrape_java_script: bool_value(options, "sentry:scrape_javascript", true),
        grouping_config: get_value_with_default(options, "sentry:grouping_config"),
        grouping_enhancements: get_value_with_default(options, "sentry:grouping_enhancements"),
        grouping_enhancements_base: get_value_with_default(
            options,
            "sentry:grouping_enhancements_base",
        ),
        secondary_grouping_expiry: get_value_with_default(
            options,
            "sentry:secondary_grouping_expiry",
        ),
        secondary_grouping_config: get_value_with_default(
            options,
            "sentry:secondary_grouping_config",
        ),
        grouping_auto_update: get_value_with_default(options, "sentry:grouping_auto_update"),
        fingerprinting_rules: get_value_with_default(options, "sentry:fingerprinting_rules"),
        organization: organization_response(project),
        plugins: detailed.plugins.clone(),
        platforms: attrs.platforms.clone(),
        processing_issues: detailed.processing_issues,
        default_environment: options
            .get("sentry:default_environment")
            .and_then(JsonValue::as_str)
            .map(String::from),
        relay_pii_config: options
            .get("sentry:relay_pii_config")
            .and_then(JsonValue::as_str)
            .map(String::from),
        builtin_symbol_sources: get_value_with_default(options, "sentry:builtin_symbol_sources"),
        dynamic_sampling_biases: get_value_with_default(options, "sentry:dynamic_sampling_biases"),
        event_processing: EventProcessingResponse {
            symbolication_degraded: false,
        },
        symbol_sources: redacted_symbol_sources(options),
    }
}
