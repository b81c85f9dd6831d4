//! Idempotency gate.
//!
//! A job id whose storage prefix holds any object has been processed (or is
//! being processed) and is not started again.
//!
//! The check is not atomic with the start of the job. Two triggers for the
//! same id arriving together can both see an empty prefix and both run the
//! pipeline; the second run overwrites the first run's artifacts with
//! equivalent ones. Execution is therefore at least once, not exactly once.
//! Making it exclusive would need a conditional write or a TTL lease keyed by
//! id in the store, taken before the first status write.

use crate::error::Jats2SiteError;
use crate::storage::ObjectStore;
use tracing::debug;

/// `true` if anything already exists under `prefix`.
pub async fn already_processed(
    store: &dyn ObjectStore,
    prefix: &str,
) -> Result<bool, Jats2SiteError> {
    let hit = store.exists(prefix).await?;
    debug!("Idempotency check {}: {}", prefix, if hit { "hit" } else { "miss" });
    Ok(hit)
}
