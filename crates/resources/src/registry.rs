//! The resource mutex registry

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};
use upd_errors::{Error, ResourceError};
use upd_types::ResourceId;

use crate::guard::{HeldResource, ResourceGuard};

/// Registry of named exclusive locks, one per distinct resource identifier.
///
/// Locks are created lazily on first reference and live for the duration of
/// the run. Fairness is FIFO per resource: tokio's async mutex queues
/// waiters in arrival order, so no pipeline is starved by repeated
/// cuts-in-line.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    locks: DashMap<ResourceId, Arc<Mutex<()>>>,
    holders: Arc<DashMap<ResourceId, String>>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every resource in `resources` for `owner`, as one batch.
    ///
    /// Identifiers are taken in lexicographic order — the same global total
    /// order for every caller in the system, so no two callers can each
    /// hold part of the other's set and wait on the remainder. The whole
    /// batch shares one deadline; if any single acquisition times out, all
    /// resources already acquired in the batch are released before the
    /// failure is returned.
    ///
    /// An empty set succeeds immediately with an empty guard.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Timeout`] naming the resource that could
    /// not be acquired within `timeout`.
    pub async fn acquire(
        &self,
        owner: &str,
        resources: &BTreeSet<ResourceId>,
        timeout: Duration,
    ) -> Result<ResourceGuard, Error> {
        let deadline = Instant::now() + timeout;
        let mut held = Vec::with_capacity(resources.len());

        // BTreeSet iterates in sorted order: this is the global total order.
        for id in resources {
            let lock = self.lock_for(id);
            trace!(owner, resource = %id, "waiting for resource");
            match timeout_at(deadline, lock.lock_owned()).await {
                Ok(permit) => {
                    held.push(HeldResource::new(
                        id.clone(),
                        owner.to_string(),
                        permit,
                        Arc::clone(&self.holders),
                    )?);
                    debug!(owner, resource = %id, "resource acquired");
                }
                Err(_) => {
                    // Dropping `held` releases every lock taken so far and
                    // clears the holder records; no partial hold survives.
                    drop(held);
                    debug!(owner, resource = %id, "resource acquisition timed out");
                    return Err(ResourceError::Timeout {
                        resource: id.clone(),
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    }
                    .into());
                }
            }
        }

        Ok(ResourceGuard::new(held))
    }

    /// The pipeline currently holding `id`, if any.
    #[must_use]
    pub fn held_by(&self, id: &str) -> Option<String> {
        self.holders.get(id).map(|entry| entry.value().clone())
    }

    /// Whether `id` is currently held.
    #[must_use]
    pub fn is_held(&self, id: &str) -> bool {
        self.holders.contains_key(id)
    }

    fn lock_for(&self, id: &ResourceId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
