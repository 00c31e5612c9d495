//! Feature Resolver: tiered feature-flag evaluation for a project set.
//!
//! Flags are evaluated per organization group through one batched call; only
//! flags the batch path could not answer fall back to one evaluation per
//! flag per group. The fallback is the identified performance hazard (it can
//! cost hundreds of milliseconds per flag on large organizations), so it is
//! restricted to the residual flag set and counted in metrics.

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

use crate::errors::StoreError;
use crate::metrics_defs;
use crate::stores::FeatureEvaluator;
use crate::types::{OrgId, Project, ProjectId, User};

/// Namespace prefix of project-scoped flags. Stripped for response keys.
pub const PROJECT_SCOPE_PREFIX: &str = "projects:";

/// Flags never read by the frontend. Dropped from the candidate set when the
/// caller collapses unused features. Static by design: an explicit list, not
/// derived from the registry.
pub const FEATURES_NOT_USED_ON_FRONTEND: &[&str] = &[
    "profiling-ingest-unsampled-profiles",
    "discard-transaction",
    "span-metrics-extraction-resource",
    "span-metrics-extraction-all-modules",
    "race-free-group-creation",
    "first-event-severity-new-escalation",
    "first-event-severity-calculation",
    "first-event-severity-alerting",
    "alert-filters",
    "servicehooks",
];

/// Resolves the enabled feature set for every project in the batch.
///
/// The result contains exactly one entry per input project, in input order.
/// Feature names are returned with their namespace prefix stripped. The
/// synthetic `releases` entry is driven by the project's `has_releases` data
/// flag and bypasses the registry entirely.
pub async fn resolve_features(
    projects: &[Project],
    user: &User,
    evaluator: &dyn FeatureEvaluator,
    filter_unused_on_frontend: bool,
) -> Result<IndexMap<ProjectId, Vec<String>>, StoreError> {
    // Evaluation context is organization-scoped; group the batch by org.
    let mut projects_by_org: IndexMap<OrgId, Vec<&Project>> = IndexMap::new();
    for project in projects {
        projects_by_org
            .entry(project.organization.id)
            .or_default()
            .push(project);
    }

    let mut features_by_project: IndexMap<ProjectId, Vec<String>> =
        projects.iter().map(|p| (p.id, Vec::new())).collect();

    let mut project_flags: Vec<String> = evaluator
        .list_project_flags()
        .into_iter()
        .filter(|flag| flag.starts_with(PROJECT_SCOPE_PREFIX))
        .collect();
    if filter_unused_on_frontend {
        project_flags.retain(|flag| {
            !FEATURES_NOT_USED_ON_FRONTEND.contains(&&flag[PROJECT_SCOPE_PREFIX.len()..])
        });
    }

    // Batch path. Any flag the batch call answered, for any project, is
    // settled and never re-evaluated: batch results take precedence even
    // when the answer was "inactive".
    let mut batch_checked: HashSet<String> = HashSet::new();
    for group in projects_by_org.values() {
        let organization = &group[0].organization;
        let batch_features = evaluator
            .batch_evaluate(&project_flags, user, group, organization)
            .await?;

        if batch_features.is_empty() {
            continue;
        }
        for project in group {
            let Some(by_flag) = batch_features.get(&format!("project:{}", project.id)) else {
                continue;
            };
            for (flag_name, active) in by_flag {
                if *active {
                    features_by_project[&project.id]
                        .push(flag_name[PROJECT_SCOPE_PREFIX.len()..].to_string());
                }
                batch_checked.insert(flag_name.clone());
            }
        }
    }

    // Degraded path for the residual flags, still batched across each org
    // group's projects.
    for flag_name in &project_flags {
        if batch_checked.contains(flag_name) {
            continue;
        }
        metrics::counter!(metrics_defs::FEATURE_FALLBACK_EVALUATIONS.name).increment(1);
        debug!(flag = %flag_name, "feature flag fell back to per-flag evaluation");

        let abbreviated = &flag_name[PROJECT_SCOPE_PREFIX.len()..];
        for group in projects_by_org.values() {
            let organization = &group[0].organization;
            let result = evaluator
                .evaluate_one(flag_name, organization, group, user)
                .await?;
            for (project_id, active) in result {
                if active && let Some(features) = features_by_project.get_mut(&project_id) {
                    features.push(abbreviated.to_string());
                }
            }
        }
    }

    for project in projects {
        if project.flags.has_releases {
            features_by_project[&project.id].push("releases".to_string());
        }
    }

    Ok(features_by_project)
}
