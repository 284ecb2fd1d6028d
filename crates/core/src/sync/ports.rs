//! Port interfaces for sync operations

use async_trait::async_trait;
use landfall_domain::{ExternalLanding, MeteoriteLanding, Result};

/// Source of the full upstream catalogue
#[async_trait]
pub trait LandingSource: Send + Sync {
    /// Fetch the complete snapshot.
    ///
    /// `Ok(None)` means the upstream answered with no payload at all.
    async fn fetch_snapshot(&self) -> Result<Option<Vec<ExternalLanding>>>;
}

/// Local store of reconciled landings
///
/// Bulk operations are staged; nothing is durable until [`commit`] succeeds.
///
/// [`commit`]: LandingRepository::commit
#[async_trait]
pub trait LandingRepository: Send + Sync {
    /// Read every stored landing
    async fn read_all(&self) -> Result<Vec<MeteoriteLanding>>;

    /// Stage new landings for insertion
    async fn bulk_insert(&self, records: &[MeteoriteLanding]) -> Result<()>;

    /// Stage replacements for existing landings (matched by `id`)
    async fn bulk_update(&self, records: &[MeteoriteLanding]) -> Result<()>;

    /// Stage removal of landings (matched by `id`)
    async fn bulk_delete(&self, records: &[MeteoriteLanding]) -> Result<()>;

    /// Apply everything staged since the last commit as one unit
    async fn commit(&self) -> Result<()>;

    /// Drop staged work after a failed pass
    async fn discard_pending(&self) -> Result<()>;
}

/// Downstream read cache that must forget stale query results
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Best-effort signal; implementations log their own failures
    async fn invalidate_all(&self);
}
