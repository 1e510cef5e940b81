use std::collections::BTreeSet;
use std::sync::Arc;

use msync_store::{Model, ModelSchema, Repository};
use msync_types::{Envelope, Payload, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binding::{BoundHandler, HandlerBinding};
use crate::error::HandlerError;
use crate::report::Applied;

/// What to do with a create/update envelope that carries no identity value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingIdentityPolicy {
    /// Fail the invocation with [`HandlerError::MissingIdentity`].
    #[default]
    Reject,
    /// Build and save a new entity without an identity value, letting the
    /// repository assign one.
    Mint,
}

/// Type-erased entity class a reconciling binding resolves to.
///
/// Implemented by [`ModelTarget`]; the registry stores it as
/// `Arc<dyn EntityTarget>` so bindings for different entity types can share
/// one ordered list.
pub trait EntityTarget: Send + Sync {
    /// Local class name.
    fn class(&self) -> &str;

    /// Default identity attribute.
    fn primary_key(&self) -> &str;

    /// Returns `true` if the attribute can be read.
    fn has_attr(&self, name: &str) -> bool;

    /// Returns `true` if the attribute can be assigned from a payload.
    fn is_writable(&self, name: &str) -> bool;

    /// Apply `envelope` to local state as described by `binding`.
    fn reconcile(
        &self,
        envelope: &Envelope,
        binding: &HandlerBinding,
        policy: MissingIdentityPolicy,
    ) -> Result<Applied, HandlerError>;
}

/// Payload entries that survive the binding's allow-list.
///
/// With an allow-list, attributes outside it are dropped even when present;
/// allow-listed attributes absent from the payload are simply not yielded,
/// so the entity field keeps its current value.
pub fn project_payload<'a>(
    payload: &'a Payload,
    allowed: Option<&'a BTreeSet<String>>,
) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
    payload
        .iter()
        .filter(move |(name, _)| allowed.map_or(true, |set| set.contains(name.as_str())))
}

/// Reconciles envelopes into one entity type through its schema and
/// repository.
pub struct ModelTarget<M, R> {
    schema: Arc<ModelSchema<M>>,
    repo: R,
}

impl<M: Model, R: Repository<M>> ModelTarget<M, R> {
    pub fn new(schema: Arc<ModelSchema<M>>, repo: R) -> Self {
        Self { schema, repo }
    }

    pub fn schema(&self) -> &Arc<ModelSchema<M>> {
        &self.schema
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn seed(key: &str, id: &Value) -> Payload {
        let mut seed = Payload::new();
        seed.insert(key.to_string(), id.clone());
        seed
    }

    fn destroy(&self, key: &str, id: Option<&Value>) -> Result<Applied, HandlerError> {
        let Some(id) = id else {
            debug!(class = self.schema.class(), "destroy without identity, nothing to delete");
            return Ok(Applied::Skipped);
        };
        match self.repo.find_by(key, id)? {
            Some(model) => {
                self.repo.delete(&model)?;
                Ok(Applied::Deleted)
            }
            None => {
                debug!(class = self.schema.class(), key, id = %id, "entity already absent");
                Ok(Applied::Skipped)
            }
        }
    }

    fn upsert(
        &self,
        envelope: &Envelope,
        binding: &HandlerBinding,
        key: &str,
        policy: MissingIdentityPolicy,
    ) -> Result<Applied, HandlerError> {
        let (mut model, created) = match envelope.identity() {
            Some(id) => match self.repo.find_by(key, id)? {
                Some(model) => (model, false),
                None => (self.repo.create(&Self::seed(key, id))?, true),
            },
            None => match policy {
                MissingIdentityPolicy::Reject => {
                    return Err(HandlerError::MissingIdentity {
                        class: envelope.class.clone(),
                        action: envelope.action.to_string(),
                    })
                }
                MissingIdentityPolicy::Mint => (self.repo.create(&Payload::new())?, true),
            },
        };

        for (name, value) in project_payload(&envelope.payload, binding.allowed_attrs.as_ref()) {
            if binding.allowed_attrs.is_none() && !self.schema.is_writable(name) {
                debug!(class = self.schema.class(), attr = %name, "ignoring undeclared attribute");
                continue;
            }
            self.schema.set(&mut model, name, value.clone())?;
        }

        self.repo.save(&mut model)?;
        Ok(if created {
            Applied::Created
        } else {
            Applied::Updated
        })
    }
}

impl<M: Model, R: Repository<M>> EntityTarget for ModelTarget<M, R> {
    fn class(&self) -> &str {
        self.schema.class()
    }

    fn primary_key(&self) -> &str {
        self.schema.primary_key()
    }

    fn has_attr(&self, name: &str) -> bool {
        self.schema.has_field(name)
    }

    fn is_writable(&self, name: &str) -> bool {
        self.schema.is_writable(name)
    }

    fn reconcile(
        &self,
        envelope: &Envelope,
        binding: &HandlerBinding,
        policy: MissingIdentityPolicy,
    ) -> Result<Applied, HandlerError> {
        let key = binding
            .identity_key
            .as_deref()
            .unwrap_or_else(|| self.schema.primary_key());
        if envelope.action.is_destroy() {
            self.destroy(key, envelope.identity())
        } else {
            self.upsert(envelope, binding, key, policy)
        }
    }
}

/// Resolves, merges and persists entities for reconciling bindings.
#[derive(Clone, Copy, Debug, Default)]
pub struct Reconciler {
    policy: MissingIdentityPolicy,
}

impl Reconciler {
    pub fn new(policy: MissingIdentityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MissingIdentityPolicy {
        self.policy
    }

    /// Apply `envelope` through `binding`'s entity target.
    ///
    /// `destroy` deletes the matching entity or does nothing when it is
    /// absent; every other action is an upsert of the allow-listed payload
    /// attributes. Persistence failures are returned to the caller.
    pub fn reconcile(
        &self,
        envelope: &Envelope,
        binding: &HandlerBinding,
    ) -> Result<Applied, HandlerError> {
        match &binding.handler {
            BoundHandler::Reconciling(target) => target.reconcile(envelope, binding, self.policy),
            BoundHandler::Direct(_) => Err(HandlerError::NotReconciling(binding.label())),
        }
    }
}
