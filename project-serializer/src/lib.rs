//! Per-request aggregation engine for project API payloads.
//!
//! Given a batch of projects and the requesting user, this crate resolves
//! access scopes, enabled feature flags, effective option values and stats
//! series through batched store lookups, and serializes the results into
//! the camelCase response shapes of the project endpoints.

pub mod access;
pub mod errors;
pub mod features;
pub mod metrics_defs;
pub mod options;
pub mod roles;
pub mod serializer;
pub mod stats;
pub mod stores;
pub mod types;

#[cfg(test)]
pub(crate) mod testutils;

pub use errors::{Result, SerializerError, StoreError};
pub use serializer::{
    ProjectAttrs, ProjectSerializer, serialize, serialize_detailed, serialize_summary,
    serialize_with_organization, serialize_with_team,
};
pub use stores::Stores;
pub use types::{Project, RequestContext, User};
