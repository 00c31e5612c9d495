//! Response payload types.
//!
//! These are the API-facing shapes. Field names are part of the HTTP
//! contract (camelCase), so every struct carries serde renames; optional
//! expansions are omitted from the payload entirely rather than emitted as
//! null.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::HashMap;

use crate::stats::{SessionStats, StatsSeries};
use crate::stores::Deploy;

/// Projects have no avatar uploads; the payload shape is kept for
/// compatibility and always carries a letter avatar.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AvatarResponse {
    #[serde(rename = "avatarType")]
    pub avatar_type: String,
    #[serde(rename = "avatarUuid")]
    pub avatar_uuid: Option<String>,
}

impl Default for AvatarResponse {
    fn default() -> Self {
        AvatarResponse {
            avatar_type: "letter_avatar".to_string(),
            avatar_uuid: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TeamResponse {
    pub id: String,
    pub slug: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrganizationResponse {
    pub id: String,
    pub slug: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LatestReleaseResponse {
    pub version: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventProcessingResponse {
    #[serde(rename = "symbolicationDegraded")]
    pub symbolication_degraded: bool,
}

/// Fields shared by every project payload shape.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBaseResponse {
    pub id: String,
    pub slug: String,
    // Deprecated: not read by the app anymore, still part of the contract.
    pub name: String,
    pub platform: Option<String>,
    pub date_created: DateTime<Utc>,
    pub is_bookmarked: bool,
    pub is_member: bool,
    pub features: Vec<String>,
    pub first_event: Option<DateTime<Utc>>,
    pub first_transaction_event: bool,
    pub access: Vec<String>,
    pub has_access: bool,
    pub has_custom_metrics: bool,
    pub has_minified_stack_trace: bool,
    pub has_monitors: bool,
    pub has_profiles: bool,
    pub has_replays: bool,
    pub has_sessions: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_stats: Option<StatsSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_stats: Option<SessionStats>,
}

/// Full single-project payload: the shared fields plus the presentation
/// fields the organization index view does not carry.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    #[serde(flatten)]
    pub base: ProjectBaseResponse,
    pub has_feedbacks: bool,
    pub has_new_feedbacks: bool,
    pub is_internal: bool,
    pub is_public: bool,
    pub avatar: AvatarResponse,
    pub color: String,
    pub status: String,
}

/// Base payload plus the team slice.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectWithTeamResponse {
    #[serde(flatten)]
    pub project: ProjectResponse,
    /// Deprecated singular form: the first of `teams`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamResponse>,
    pub teams: Vec<TeamResponse>,
}

/// Base payload plus the organization slice.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectWithOrganizationResponse {
    #[serde(flatten)]
    pub project: ProjectResponse,
    pub organization: OrganizationResponse,
}

/// Organization-index payload: the shared fields plus the team slice and
/// release/deploy/environment summary data.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummaryResponse {
    #[serde(flatten)]
    pub base: ProjectBaseResponse,
    /// Deprecated singular form: the first of `teams`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamResponse>,
    pub teams: Vec<TeamResponse>,
    pub platforms: Vec<String>,
    pub environments: Vec<String>,
    pub has_user_reports: bool,
    pub latest_release: Option<LatestReleaseResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_deploys: Option<HashMap<String, Deploy>>,
    pub event_processing: EventProcessingResponse,
    /// Raw-option expansion rows, present only when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<HashMap<String, JsonValue>>,
}

/// Single-project settings payload: everything the project settings UI
/// needs, including effective option values.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedProjectResponse {
    #[serde(flatten)]
    pub with_team: ProjectWithTeamResponse,
    pub latest_release: Option<LatestReleaseResponse>,
    pub options: JsonMap<String, JsonValue>,
    pub digests_min_delay: u64,
    pub digests_max_delay: u64,
    pub subject_prefix: String,
    pub allowed_domains: Vec<String>,
    pub resolve_age: u64,
    pub data_scrubber: bool,
    pub data_scrubber_defaults: bool,
    pub safe_fields: Vec<String>,
    pub store_crash_reports: Option<i64>,
    pub sensitive_fields: Vec<String>,
    pub subject_template: String,
    pub security_token: String,
    pub security_token_header: Option<String>,
    #[serde(rename = "verifySSL")]
    pub verify_ssl: bool,
    pub scrub_ip_addresses: bool,
    pub scrape_java_script: bool,
    pub grouping_config: JsonValue,
    pub grouping_enhancements: JsonValue,
    pub grouping_enhancements_base: JsonValue,
    pub secondary_grouping_expiry: JsonValue,
    pub secondary_grouping_config: JsonValue,
    pub grouping_auto_update: JsonValue,
    pub fingerprinting_rules: JsonValue,
    pub organization: OrganizationResponse,
    pub plugins: Vec<JsonValue>,
    pub platforms: Vec<String>,
    pub processing_issues: u64,
    pub default_environment: Option<String>,
    pub relay_pii_config: Option<String>,
    pub builtin_symbol_sources: JsonValue,
    pub dynamic_sampling_biases: JsonValue,
    pub event_processing: EventProcessingResponse,
    pub symbol_sources: String,
}
