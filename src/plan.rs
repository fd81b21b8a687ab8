//! Request planning: which catalog entries still need fetching.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::cache::CacheStore;
use crate::catalog::Resource;

/// Result of filtering a catalog against the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    /// Number of distinct resources in the catalog.
    pub catalog_size: usize,
    /// Resources without a cache entry, in catalog order.
    pub pending: Vec<Resource>,
}

impl FetchPlan {
    /// Number of resources already cached.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.catalog_size - self.pending.len()
    }

    /// Whether nothing needs to be fetched.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Returns the resources of `catalog` that have no entry in `store`.
///
/// Pure filter over the cache directory: no network, no writes. Duplicate
/// file names are collapsed to their first occurrence so no two workers ever
/// target the same cache entry.
#[instrument(
    level = "debug",
    skip_all,
    fields(catalog = catalog.len(), dir = %store.dir().display())
)]
pub fn plan_requests(catalog: &[Resource], store: &CacheStore) -> FetchPlan {
    build_plan(catalog, |resource| !store.exists(&resource.file_name))
}

/// Plans the whole catalog as pending, as after a cache clear.
#[must_use]
pub fn plan_all(catalog: &[Resource]) -> FetchPlan {
    build_plan(catalog, |_| true)
}

fn build_plan(catalog: &[Resource], is_pending: impl Fn(&Resource) -> bool) -> FetchPlan {
    let mut seen = HashSet::with_capacity(catalog.len());
    let mut pending = Vec::new();

    for resource in catalog {
        if !seen.insert(resource.file_name.as_str()) {
            debug!(file_name = %resource.file_name, "duplicate resource in catalog, skipping");
            continue;
        }
        if is_pending(resource) {
            pending.push(resource.clone());
        }
    }

    let plan = FetchPlan {
        catalog_size: seen.len(),
        pending,
    };
    debug!(
        pending = plan.pending.len(),
        cached = plan.cached(),
        "planned requests"
    );
    plan
}
