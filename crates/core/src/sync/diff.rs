//! Diff of an upstream snapshot against the local store
//!
//! Produces three disjoint sets: landings to add, to update and to delete.
//! The upstream external id is the join key. Merges overwrite every mapped
//! attribute; records failing validation are dropped from the change set and
//! the stored version is left untouched.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use landfall_domain::{ExternalLanding, MeteoriteLanding};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::errors::SyncError;
use super::validator::RecordValidator;

/// Changes to apply to the local store in one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub to_add: Vec<MeteoriteLanding>,
    pub to_update: Vec<MeteoriteLanding>,
    pub to_delete: Vec<MeteoriteLanding>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Items that did not turn into changes, and why
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    /// Upstream items without an external id
    pub skipped_missing_id: usize,
    /// Repeated external ids after the first occurrence
    pub duplicates: usize,
    /// Candidates rejected by the record validator
    pub validation_errors: usize,
    /// Existing landings whose attributes did not change
    pub unchanged: usize,
}

/// Result of [`compute_diff`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    pub changes: ChangeSet,
    pub stats: DiffStats,
}

/// Compare `upstream` against `local` as of `now`.
///
/// `cancel` is polled once per upstream item; a fired token aborts the diff
/// with [`SyncError::Cancelled`] before anything is returned.
pub fn compute_diff(
    upstream: &[ExternalLanding],
    local: &[MeteoriteLanding],
    now: DateTime<Utc>,
    validator: &RecordValidator,
    cancel: &CancellationToken,
) -> Result<Diff, SyncError> {
    let index: HashMap<&str, &MeteoriteLanding> =
        local.iter().map(|record| (record.external_id.as_str(), record)).collect();
    let mut present: HashSet<&str> = HashSet::with_capacity(upstream.len());
    let mut diff = Diff::default();

    for item in upstream {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let Some(external_id) = item.external_id() else {
            diff.stats.skipped_missing_id += 1;
            debug!(name = ?item.name, "upstream item has no id, skipped");
            continue;
        };

        if !present.insert(external_id) {
            diff.stats.duplicates += 1;
            debug!(external_id, "duplicate upstream id, later occurrence ignored");
            continue;
        }

        let (candidate, is_new) = match index.get(external_id) {
            Some(existing) => {
                let merged = existing.merged_with(item, now);
                if merged.same_attributes(existing) {
                    diff.stats.unchanged += 1;
                    continue;
                }
                (merged, false)
            }
            None => (MeteoriteLanding::from_external(external_id, item, now), true),
        };

        if let Err(error) = validator.validate(&candidate, now) {
            diff.stats.validation_errors += 1;
            warn!(external_id, is_new, error = %error, "landing failed validation, skipped");
            continue;
        }

        if is_new {
            diff.changes.to_add.push(candidate);
        } else {
            diff.changes.to_update.push(candidate);
        }
    }

    diff.changes.to_delete = local
        .iter()
        .filter(|record| !present.contains(record.external_id.as_str()))
        .cloned()
        .collect();

    Ok(diff)
}
