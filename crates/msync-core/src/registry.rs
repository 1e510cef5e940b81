use std::collections::HashMap;
use std::sync::Arc;

use msync_store::{Model, ModelSchema};
use msync_types::{Action, Payload};
use tracing::debug;

use crate::binding::{ClassHandler, HandlerBinding};
use crate::emitter::{Publication, PublicationInfo, PublishSettings};
use crate::error::{HandlerError, RegistryError, RegistryResult};
use crate::reconciler::EntityTarget;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Frozen, insertion-ordered set of handler bindings.
///
/// Populated once through a [`RegistryBuilder`] during process start and
/// read-only afterwards, so it can be shared between receiving threads
/// behind an `Arc` without locking.
#[derive(Debug, Default)]
pub struct Registry {
    bindings: Vec<HandlerBinding>,
    publications: Vec<PublicationInfo>,
}

impl Registry {
    /// Start the registration phase.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Every binding whose target class and action equal the given names,
    /// in registration order. Uniqueness is not enforced: all of them run.
    pub fn lookup(&self, class: &str, action: &str) -> Vec<&HandlerBinding> {
        self.bindings
            .iter()
            .filter(|binding| binding.matches(class, action))
            .collect()
    }

    /// All bindings in registration order.
    pub fn bindings(&self) -> &[HandlerBinding] {
        &self.bindings
    }

    /// Summaries of the registered publications.
    pub fn publications(&self) -> &[PublicationInfo] {
        &self.publications
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SubscribeSettings
// ---------------------------------------------------------------------------

/// Options for [`RegistryBuilder::register_subscribe`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeSettings {
    /// Allow-list of payload attributes merged into the entity (model mode).
    pub attrs: Option<Vec<String>>,
    /// Actions to subscribe to.
    pub actions: Vec<String>,
    /// Remote class name to listen for instead of the local class name.
    pub as_class: Option<String>,
    /// Identity key used to resolve the entity (model mode).
    pub id: Option<String>,
    /// Hand the payload to a class-level callable instead of reconciling.
    pub direct_mode: bool,
    /// Remote action name to listen for instead of the local action (direct mode).
    pub as_action: Option<String>,
}

impl SubscribeSettings {
    /// Reconcile the listed attributes on create, update and destroy.
    pub fn model<I, S>(attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attrs: Some(attrs.into_iter().map(Into::into).collect()),
            actions: Action::lifecycle().iter().map(ToString::to_string).collect(),
            as_class: None,
            id: None,
            direct_mode: false,
            as_action: None,
        }
    }

    /// Invoke the class handler registered for `action`.
    pub fn class_action(action: impl Into<String>) -> Self {
        Self {
            attrs: None,
            actions: vec![action.into()],
            as_class: None,
            id: None,
            direct_mode: true,
            as_action: None,
        }
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn as_class(mut self, class: impl Into<String>) -> Self {
        self.as_class = Some(class.into());
        self
    }

    pub fn id(mut self, key: impl Into<String>) -> Self {
        self.id = Some(key.into());
        self
    }

    pub fn as_action(mut self, action: impl Into<String>) -> Self {
        self.as_action = Some(action.into());
        self
    }
}

// ---------------------------------------------------------------------------
// RegistryBuilder
// ---------------------------------------------------------------------------

/// Registration-phase state.
///
/// Class handlers and entity targets are registered under explicit string
/// keys first; subscriptions then resolve against those keys immediately, so
/// a reference to an unknown class or action is a startup error rather than
/// a per-message one.
#[derive(Default)]
pub struct RegistryBuilder {
    bindings: Vec<HandlerBinding>,
    publications: Vec<PublicationInfo>,
    handlers: HashMap<(String, String), ClassHandler>,
    models: HashMap<String, Arc<dyn EntityTarget>>,
}

impl RegistryBuilder {
    /// Register the callable invoked for direct-mode subscriptions to
    /// `class`.`action`. Re-registering the same key replaces the callable.
    pub fn class_handler<F>(
        &mut self,
        class: impl Into<String>,
        action: impl Into<String>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&Payload) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers
            .insert((class.into(), action.into()), Arc::new(handler));
        self
    }

    /// Register the entity target used by model subscriptions to its class.
    pub fn model<T: EntityTarget + 'static>(&mut self, target: T) -> &mut Self {
        self.models
            .insert(target.class().to_string(), Arc::new(target));
        self
    }

    /// Like [`Self::model`], but fails instead of replacing an existing target.
    pub fn try_model<T: EntityTarget + 'static>(&mut self, target: T) -> RegistryResult<&mut Self> {
        if self.models.contains_key(target.class()) {
            return Err(RegistryError::DuplicateModel(target.class().to_string()));
        }
        Ok(self.model(target))
    }

    /// Append a fully formed binding.
    pub fn register(&mut self, binding: HandlerBinding) -> RegistryResult<&mut Self> {
        if binding.target_class.is_empty() {
            return Err(RegistryError::EmptyName { what: "target class" });
        }
        if binding.target_action.is_empty() {
            return Err(RegistryError::EmptyName {
                what: "target action",
            });
        }
        debug!(binding = %binding.label(), "binding registered");
        self.bindings.push(binding);
        Ok(self)
    }

    /// Subscribe local class `class` to remote change events.
    ///
    /// Model mode appends one reconciling binding per action; direct mode
    /// appends one direct binding per action, each resolved to the callable
    /// registered under `(class, action)`.
    pub fn register_subscribe(
        &mut self,
        class: &str,
        settings: SubscribeSettings,
    ) -> RegistryResult<&mut Self> {
        let class = class.trim();
        if class.is_empty() {
            return Err(RegistryError::EmptyName { what: "class" });
        }
        let target_class = settings.as_class.as_deref().unwrap_or(class);

        if settings.direct_mode {
            for action in &settings.actions {
                let action = Action::parse(action)?;
                let handler = self
                    .handlers
                    .get(&(class.to_string(), action.to_string()))
                    .cloned()
                    .ok_or_else(|| RegistryError::UnknownHandler {
                        class: class.to_string(),
                        action: action.to_string(),
                    })?;
                let target_action = match settings.as_action.as_deref() {
                    Some(as_action) => Action::parse(as_action)?,
                    None => action.clone(),
                };
                self.register(HandlerBinding::direct(
                    target_class,
                    target_action.as_str(),
                    class,
                    action.as_str(),
                    handler,
                ))?;
            }
            return Ok(self);
        }

        let target = self
            .models
            .get(class)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownModel(class.to_string()))?;

        if let Some(key) = settings.id.as_deref() {
            if !target.has_attr(key) {
                return Err(RegistryError::UnknownAttribute {
                    class: class.to_string(),
                    attr: key.to_string(),
                });
            }
        }
        if let Some(attrs) = settings.attrs.as_ref() {
            if let Some(attr) = attrs.iter().find(|attr| !target.is_writable(attr)) {
                return Err(RegistryError::UnknownAttribute {
                    class: class.to_string(),
                    attr: attr.clone(),
                });
            }
        }

        for action in &settings.actions {
            let action = Action::parse(action)?;
            let mut binding =
                HandlerBinding::reconciling(target_class, action.as_str(), Arc::clone(&target));
            if let Some(key) = settings.id.as_ref() {
                binding = binding.with_identity_key(key.clone());
            }
            if let Some(attrs) = settings.attrs.as_ref() {
                binding = binding.with_allowed_attrs(attrs.iter().cloned());
            }
            self.register(binding)?;
        }
        Ok(self)
    }

    /// Declare that mutations of `schema`'s class are published.
    ///
    /// The attribute allow-list and id accessor are checked against the
    /// schema now; the returned handle builds envelopes later.
    pub fn register_publish<M: Model>(
        &mut self,
        schema: Arc<ModelSchema<M>>,
        settings: PublishSettings<M>,
    ) -> RegistryResult<Publication<M>> {
        let unknown = settings
            .attrs
            .iter()
            .chain(settings.id.iter())
            .find(|attr| !schema.has_field(attr));
        if let Some(attr) = unknown {
            return Err(RegistryError::UnknownAttribute {
                class: schema.class().to_string(),
                attr: attr.clone(),
            });
        }
        if settings.as_class.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(RegistryError::EmptyName { what: "as_class" });
        }
        // Only destroy envelopes may carry an empty payload.
        if settings.attrs.is_empty() && settings.actions.iter().any(|a| !a.is_destroy()) {
            return Err(RegistryError::EmptyName { what: "publish attrs" });
        }

        let publication = Publication::new(schema, settings);
        let info = publication.info();
        debug!(class = %info.class, published_as = %info.as_class, "publication registered");
        self.publications.push(info);
        Ok(publication)
    }

    /// End the registration phase.
    pub fn build(self) -> Registry {
        Registry {
            bindings: self.bindings,
            publications: self.publications,
        }
    }
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("bindings", &self.bindings.len())
            .field("publications", &self.publications.len())
            .field("handlers", &self.handlers.len())
            .field("models", &self.models.len())
            .finish()
    }
}
