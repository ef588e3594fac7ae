//! Resource guards
//!
//! A guard owns every mutex its batch acquired. Release runs on every exit
//! path of a phase: explicitly via [`ResourceGuard::release`], or through
//! `Drop` when the owning future is cancelled or panics. Both paths clear
//! the registry's holder records, so a cancelled pipeline can never leave a
//! resource observably held.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OwnedMutexGuard;
use tracing::error;
use upd_errors::{Error, ResourceError};
use upd_types::ResourceId;

/// One held resource: the owned mutex permit plus the bookkeeping needed to
/// clear the holder record when it drops.
#[derive(Debug)]
pub(crate) struct HeldResource {
    id: ResourceId,
    holders: Arc<DashMap<ResourceId, String>>,
    _permit: OwnedMutexGuard<()>,
}

impl HeldResource {
    pub(crate) fn new(
        id: ResourceId,
        owner: String,
        permit: OwnedMutexGuard<()>,
        holders: Arc<DashMap<ResourceId, String>>,
    ) -> Result<Self, Error> {
        // We hold the mutex, so no other holder record can exist. One here
        // means the bookkeeping is corrupt.
        if let Some(stale) = holders.insert(id.clone(), owner) {
            error!(resource = %id, stale_owner = %stale, "holder record existed for a free mutex");
            return Err(ResourceError::RegistryCorrupt {
                message: format!("resource {id} had holder {stale} while its mutex was free"),
            }
            .into());
        }
        Ok(Self {
            id,
            holders,
            _permit: permit,
        })
    }
}

impl Drop for HeldResource {
    fn drop(&mut self) {
        self.holders.remove(&self.id);
    }
}

/// Guard over one phase's acquired resource batch.
///
/// Releasing is idempotent: `release()` may be called any number of times,
/// and dropping an already-released guard is a no-op.
#[derive(Debug, Default)]
pub struct ResourceGuard {
    held: Vec<HeldResource>,
}

impl ResourceGuard {
    pub(crate) fn new(held: Vec<HeldResource>) -> Self {
        Self { held }
    }

    /// Release every held resource. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.held.clear();
    }

    /// Identifiers still held by this guard.
    #[must_use]
    pub fn resources(&self) -> Vec<ResourceId> {
        self.held.iter().map(|h| h.id.clone()).collect()
    }
}
