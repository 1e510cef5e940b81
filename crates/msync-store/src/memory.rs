use std::fmt;
use std::sync::{Arc, RwLock};

use msync_types::{Payload, Value};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::schema::{Model, ModelSchema};
use crate::traits::Repository;

/// In-memory repository for one entity type.
///
/// Rows are kept in insertion order behind a `RwLock`, so `find_by` returns
/// the first match the same way a database `LIMIT 1` without ordering would in
/// practice. Entities are cloned on read and write.
pub struct InMemoryRepository<M> {
    schema: Arc<ModelSchema<M>>,
    rows: RwLock<Vec<M>>,
}

impl<M: Model> InMemoryRepository<M> {
    /// Create an empty repository backed by `schema`.
    pub fn new(schema: Arc<ModelSchema<M>>) -> Self {
        Self {
            schema,
            rows: RwLock::new(Vec::new()),
        }
    }

    /// The schema this repository uses for attribute access.
    pub fn schema(&self) -> &Arc<ModelSchema<M>> {
        &self.schema
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.rows.read().expect("lock poisoned").len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.rows.read().expect("lock poisoned").is_empty()
    }

    /// Snapshot of every stored entity in insertion order.
    pub fn all(&self) -> Vec<M> {
        self.rows.read().expect("lock poisoned").clone()
    }

    /// Look an entity up by primary key.
    pub fn get(&self, id: &Value) -> StoreResult<Option<M>> {
        self.find_by(self.schema.primary_key(), id)
    }

    fn primary_key_of(&self, model: &M) -> StoreResult<Value> {
        Ok(self.schema.get(model, self.schema.primary_key())?)
    }

    fn position(&self, rows: &[M], id: &Value) -> StoreResult<Option<usize>> {
        for (index, row) in rows.iter().enumerate() {
            if &self.primary_key_of(row)? == id {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Next sequential integer key: one past the largest integer key stored.
    fn next_id(&self, rows: &[M]) -> StoreResult<u64> {
        let mut max: u64 = 0;
        for row in rows {
            if let Some(id) = self.primary_key_of(row)?.as_u64() {
                max = max.max(id);
            }
        }
        max.checked_add(1)
            .ok_or_else(|| StoreError::Backend("primary key space exhausted".into()))
    }
}

impl<M: Model> Repository<M> for InMemoryRepository<M> {
    fn find_by(&self, key: &str, value: &Value) -> StoreResult<Option<M>> {
        let rows = self.rows.read().expect("lock poisoned");
        for row in rows.iter() {
            if &self.schema.get(row, key)? == value {
                return Ok(Some(row.clone()));
            }
        }
        Ok(None)
    }

    fn create(&self, seed: &Payload) -> StoreResult<M> {
        Ok(self.schema.instantiate(seed)?)
    }

    fn save(&self, model: &mut M) -> StoreResult<()> {
        if let Err(errors) = self.schema.check(model) {
            return Err(StoreError::Validation {
                class: self.schema.class().to_string(),
                errors,
            });
        }

        let mut rows = self.rows.write().expect("lock poisoned");
        let mut id = self.primary_key_of(model)?;
        if id.is_null() {
            id = Value::from(self.next_id(&rows)?);
            self.schema
                .set(model, self.schema.primary_key(), id.clone())?;
        }

        match self.position(&rows, &id)? {
            Some(index) => rows[index] = model.clone(),
            None => rows.push(model.clone()),
        }
        debug!(class = self.schema.class(), id = %id, "entity saved");
        Ok(())
    }

    fn delete(&self, model: &M) -> StoreResult<bool> {
        let id = self.primary_key_of(model)?;
        if id.is_null() {
            return Ok(false);
        }
        let mut rows = self.rows.write().expect("lock poisoned");
        match self.position(&rows, &id)? {
            Some(index) => {
                rows.remove(index);
                debug!(class = self.schema.class(), id = %id, "entity deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<M> fmt::Debug for InMemoryRepository<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.rows.read().map(|rows| rows.len()).unwrap_or_default();
        f.debug_struct("InMemoryRepository")
            .field("schema", &self.schema)
            .field("row_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use serde_json::json;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Post {
        id: Option<u64>,
        title: String,
        slug: Option<String>,
    }

    fn repo() -> InMemoryRepository<Post> {
        let schema = ModelSchema::<Post>::builder("Post")
            .field("id", |p: &Post| p.id, |p, v| p.id = v)
            .field("title", |p: &Post| p.title.clone(), |p, v| p.title = v)
            .field("slug", |p: &Post| p.slug.clone(), |p, v| p.slug = v)
            .validate("title", |p: &Post| {
                if p.title.is_empty() {
                    Err("can't be blank".into())
                } else {
                    Ok(())
                }
            })
            .build()
            .unwrap();
        InMemoryRepository::new(Arc::new(schema))
    }

    fn post(title: &str) -> Post {
        Post {
            title: title.into(),
            ..Default::default()
        }
    }

    #[test]
    fn save_assigns_sequential_ids() {
        let repo = repo();
        let mut a = post("a");
        let mut b = post("b");
        repo.save(&mut a).unwrap();
        repo.save(&mut b).unwrap();
        assert_eq!(a.id, Some(1));
        assert_eq!(b.id, Some(2));
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn save_keeps_explicit_id_and_upserts() {
        let repo = repo();
        let mut p = Post {
            id: Some(5),
            ..post("first")
        };
        repo.save(&mut p).unwrap();
        p.title = "second".into();
        repo.save(&mut p).unwrap();
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(&json!(5)).unwrap().unwrap().title, "second");

        let mut next = post("next");
        repo.save(&mut next).unwrap();
        assert_eq!(next.id, Some(6));
    }

    #[test]
    fn save_runs_validation() {
        let repo = repo();
        let err = repo.save(&mut Post::default()).unwrap_err();
        assert_eq!(
            err,
            StoreError::Validation {
                class: "Post".into(),
                errors: vec!["title: can't be blank".into()],
            }
        );
        assert!(repo.is_empty());
    }

    #[test]
    fn find_by_secondary_key_returns_first_match() {
        let repo = repo();
        let mut a = Post {
            slug: Some("s".into()),
            ..post("a")
        };
        let mut b = Post {
            slug: Some("s".into()),
            ..post("b")
        };
        repo.save(&mut a).unwrap();
        repo.save(&mut b).unwrap();
        let found = repo.find_by("slug", &json!("s")).unwrap().unwrap();
        assert_eq!(found.title, "a");
        assert!(repo.find_by("slug", &json!("x")).unwrap().is_none());
    }

    #[test]
    fn find_by_unknown_key_is_schema_error() {
        let repo = repo();
        let mut a = post("a");
        repo.save(&mut a).unwrap();
        let err = repo.find_by("nope", &json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::Schema(SchemaError::UnknownField { .. })));
    }

    #[test]
    fn delete_is_idempotent() {
        let repo = repo();
        let mut a = post("a");
        repo.save(&mut a).unwrap();
        assert!(repo.delete(&a).unwrap());
        assert!(!repo.delete(&a).unwrap());
        assert!(!repo.delete(&post("unsaved")).unwrap());
        assert!(repo.is_empty());
    }

    #[test]
    fn exhausted_key_space_is_an_error_not_a_panic() {
        let repo = repo();
        let mut last = Post {
            id: Some(u64::MAX),
            ..post("last")
        };
        repo.save(&mut last).unwrap();

        let err = repo.save(&mut post("overflow")).unwrap_err();
        assert_eq!(err, StoreError::Backend("primary key space exhausted".into()));
        assert_eq!(repo.len(), 1);

        let mut explicit = Post {
            id: Some(1),
            ..post("explicit")
        };
        repo.save(&mut explicit).unwrap();
        assert_eq!(repo.len(), 2);
        assert_eq!(repo.get(&json!(1)).unwrap().unwrap().title, "explicit");
    }

    #[test]
    fn create_builds_unsaved_entity() {
        let repo = repo();
        let mut seed = Payload::new();
        seed.insert("id".into(), json!(3));
        let p = repo.create(&seed).unwrap();
        assert_eq!(p.id, Some(3));
        assert!(repo.is_empty());
    }
}
