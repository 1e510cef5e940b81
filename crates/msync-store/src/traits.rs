use std::sync::Arc;

use msync_types::{Payload, Value};

use crate::error::StoreResult;

/// Minimal storage capability the reconciler requires for one entity type.
///
/// Implementations must be safe to call from several receiving threads at
/// once; the reconciler holds no locks of its own.
pub trait Repository<M>: Send + Sync {
    /// Find the first entity whose `key` attribute equals `value`.
    ///
    /// Returns `Ok(None)` when nothing matches.
    fn find_by(&self, key: &str, value: &Value) -> StoreResult<Option<M>>;

    /// Build a new, unsaved entity with the given attributes assigned.
    fn create(&self, seed: &Payload) -> StoreResult<M>;

    /// Insert or update the entity. May assign a primary key.
    fn save(&self, model: &mut M) -> StoreResult<()>;

    /// Delete the entity. Returns `true` if it existed.
    fn delete(&self, model: &M) -> StoreResult<bool>;
}

impl<M, R: Repository<M> + ?Sized> Repository<M> for Arc<R> {
    fn find_by(&self, key: &str, value: &Value) -> StoreResult<Option<M>> {
        (**self).find_by(key, value)
    }

    fn create(&self, seed: &Payload) -> StoreResult<M> {
        (**self).create(seed)
    }

    fn save(&self, model: &mut M) -> StoreResult<()> {
        (**self).save(model)
    }

    fn delete(&self, model: &M) -> StoreResult<bool> {
        (**self).delete(model)
    }
}
