use std::fmt;
use std::sync::Arc;

use msync_store::{Model, ModelSchema};
use msync_types::{Action, Envelope, Payload};
use serde::Serialize;

use crate::error::EmitResult;

type SkipHook<M> = Arc<dyn Fn(&M, &Action) -> bool + Send + Sync>;

// ---------------------------------------------------------------------------
// PublishSettings
// ---------------------------------------------------------------------------

/// Options for [`RegistryBuilder::register_publish`](crate::RegistryBuilder::register_publish).
pub struct PublishSettings<M> {
    /// Attributes projected into the payload.
    pub attrs: Vec<String>,
    /// Actions that are published.
    pub actions: Vec<Action>,
    /// Class name to publish under instead of the schema's class.
    pub as_class: Option<String>,
    /// Attribute whose value is sent as the identity; the primary key when `None`.
    pub id: Option<String>,
    skip_if: Option<SkipHook<M>>,
}

impl<M> PublishSettings<M> {
    /// Publish the listed attributes on create, update and destroy.
    pub fn new<I, S>(attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attrs: attrs.into_iter().map(Into::into).collect(),
            actions: Action::lifecycle(),
            as_class: None,
            id: None,
            skip_if: None,
        }
    }

    pub fn actions<I: IntoIterator<Item = Action>>(mut self, actions: I) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }

    pub fn as_class(mut self, class: impl Into<String>) -> Self {
        self.as_class = Some(class.into());
        self
    }

    pub fn id(mut self, accessor: impl Into<String>) -> Self {
        self.id = Some(accessor.into());
        self
    }

    /// Suppress publishing when `hook` returns `true` for a mutation.
    pub fn skip_if<F>(mut self, hook: F) -> Self
    where
        F: Fn(&M, &Action) -> bool + Send + Sync + 'static,
    {
        self.skip_if = Some(Arc::new(hook));
        self
    }
}

impl<M> Clone for PublishSettings<M> {
    fn clone(&self) -> Self {
        Self {
            attrs: self.attrs.clone(),
            actions: self.actions.clone(),
            as_class: self.as_class.clone(),
            id: self.id.clone(),
            skip_if: self.skip_if.clone(),
        }
    }
}

impl<M> fmt::Debug for PublishSettings<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishSettings")
            .field("attrs", &self.attrs)
            .field("actions", &self.actions)
            .field("as_class", &self.as_class)
            .field("id", &self.id)
            .field("skip_if", &self.skip_if.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Envelope builders
// ---------------------------------------------------------------------------

/// Class-level envelope: no identity, no attribute list, `data` as payload.
pub fn build_class_envelope(class: &str, action: Action, data: Payload) -> EmitResult<Envelope> {
    let envelope = Envelope::new(class, action).with_payload(data);
    envelope.validate()?;
    Ok(envelope)
}

/// Entity-level envelope for a mutation of `model`.
///
/// The payload is the allow-listed attributes, or empty for `destroy`.
pub fn build_model_envelope<M: Model>(
    schema: &ModelSchema<M>,
    model: &M,
    action: Action,
    settings: &PublishSettings<M>,
) -> EmitResult<Envelope> {
    let class = settings.as_class.as_deref().unwrap_or(schema.class());
    let accessor = settings.id.as_deref().unwrap_or(schema.primary_key());
    let id = schema.get(model, accessor)?;
    let payload = if action.is_destroy() {
        Payload::new()
    } else {
        schema.project(model, settings.attrs.as_slice())?
    };

    let mut envelope = Envelope::new(class, action)
        .with_attrs(settings.attrs.iter().cloned())
        .with_payload(payload);
    if !id.is_null() {
        envelope = envelope.with_id(id);
    }
    envelope.validate()?;
    Ok(envelope)
}

// ---------------------------------------------------------------------------
// Publication
// ---------------------------------------------------------------------------

/// Summary of a registered publication, kept in the registry for inspection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PublicationInfo {
    /// Local class.
    pub class: String,
    /// Class name envelopes are published under.
    pub as_class: String,
    pub attrs: Vec<String>,
    pub actions: Vec<String>,
    /// Identity accessor.
    pub id: String,
}

/// Typed handle returned by publish registration.
pub struct Publication<M> {
    schema: Arc<ModelSchema<M>>,
    settings: PublishSettings<M>,
}

impl<M: Model> Publication<M> {
    pub fn new(schema: Arc<ModelSchema<M>>, settings: PublishSettings<M>) -> Self {
        Self { schema, settings }
    }

    /// Class name envelopes are published under.
    pub fn class(&self) -> &str {
        self.settings
            .as_class
            .as_deref()
            .unwrap_or(self.schema.class())
    }

    pub fn schema(&self) -> &Arc<ModelSchema<M>> {
        &self.schema
    }

    pub fn settings(&self) -> &PublishSettings<M> {
        &self.settings
    }

    /// Returns `true` if `action` is in the publish filter.
    pub fn publishes(&self, action: &Action) -> bool {
        self.settings.actions.contains(action)
    }

    /// Envelope for a mutation of `model`, or `None` when the action is
    /// filtered out or the skip hook vetoes it.
    pub fn envelope_for(&self, model: &M, action: Action) -> EmitResult<Option<Envelope>> {
        if !self.publishes(&action) {
            return Ok(None);
        }
        if let Some(skip) = &self.settings.skip_if {
            if skip(model, &action) {
                return Ok(None);
            }
        }
        build_model_envelope(&self.schema, model, action, &self.settings).map(Some)
    }

    pub fn info(&self) -> PublicationInfo {
        PublicationInfo {
            class: self.schema.class().to_string(),
            as_class: self.class().to_string(),
            attrs: self.settings.attrs.clone(),
            actions: self.settings.actions.iter().map(ToString::to_string).collect(),
            id: self
                .settings
                .id
                .clone()
                .unwrap_or_else(|| self.schema.primary_key().to_string()),
        }
    }
}

impl<M> Clone for Publication<M> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            settings: self.settings.clone(),
        }
    }
}

impl<M> fmt::Debug for Publication<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publication")
            .field("schema", &self.schema)
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::HandlerBinding;
    use crate::error::EmitError;
    use crate::reconciler::{EntityTarget, ModelTarget, Reconciler};
    use msync_store::InMemoryRepository;
    use msync_types::{TypeError, Value};
    use serde_json::json;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct User {
        id: Option<i64>,
        name: String,
        email: String,
        age: u32,
        banned: bool,
    }

    fn schema() -> Arc<ModelSchema<User>> {
        Arc::new(
            ModelSchema::<User>::builder("PublisherUser")
                .field("id", |u: &User| u.id, |u, v| u.id = v)
                .field("name", |u: &User| u.name.clone(), |u, v| u.name = v)
                .field("email", |u: &User| u.email.clone(), |u, v| u.email = v)
                .field("age", |u: &User| u.age, |u, v| u.age = v)
                .computed("custom_id", |u: &User| u.id.map(|id| id + 1000))
                .build()
                .unwrap(),
        )
    }

    fn user() -> User {
        User {
            id: Some(7),
            name: "ada".into(),
            email: "ada@example.com".into(),
            age: 36,
            banned: false,
        }
    }

    #[test]
    fn class_envelope_carries_data_verbatim() {
        let mut data = Payload::new();
        data.insert("msg".into(), json!("hello"));
        let envelope =
            build_class_envelope("User", Action::Custom("greeting".into()), data.clone()).unwrap();
        assert_eq!(envelope.class, "User");
        assert!(envelope.id.is_none());
        assert!(envelope.attrs.is_none());
        assert_eq!(envelope.payload, data);
    }

    #[test]
    fn class_envelope_requires_data() {
        let err = build_class_envelope("User", Action::Update, Payload::new()).unwrap_err();
        assert!(matches!(err, EmitError::Envelope(TypeError::EmptyPayload { .. })));
    }

    #[test]
    fn model_envelope_projects_allowed_attributes() {
        let settings = PublishSettings::new(["name", "email"]);
        let envelope = build_model_envelope(&schema(), &user(), Action::Update, &settings).unwrap();
        assert_eq!(envelope.class, "PublisherUser");
        assert_eq!(envelope.identity(), Some(&json!(7)));
        assert_eq!(envelope.payload.len(), 2);
        assert!(!envelope.payload.contains_key("age"));
        assert_eq!(envelope.payload["email"], json!("ada@example.com"));
    }

    #[test]
    fn destroy_envelope_has_empty_payload() {
        let settings = PublishSettings::new(["name"]);
        let envelope = build_model_envelope(&schema(), &user(), Action::Destroy, &settings).unwrap();
        assert!(envelope.payload.is_empty());
        assert_eq!(envelope.identity(), Some(&json!(7)));
        assert!(envelope.validate().is_ok());
    }

    #[test]
    fn as_class_and_id_accessor_are_honoured() {
        let settings = PublishSettings::new(["name"]).as_class("User").id("custom_id");
        let envelope = build_model_envelope(&schema(), &user(), Action::Create, &settings).unwrap();
        assert_eq!(envelope.class, "User");
        assert_eq!(envelope.identity(), Some(&json!(1007)));
    }

    #[test]
    fn unsaved_entity_publishes_without_identity() {
        let unsaved = User { id: None, ..user() };
        let settings = PublishSettings::new(["name"]);
        let envelope = build_model_envelope(&schema(), &unsaved, Action::Create, &settings).unwrap();
        assert!(envelope.id.is_none());
    }

    #[test]
    fn publication_filters_actions_and_skip_hook() {
        let publication = Publication::new(
            schema(),
            PublishSettings::new(["name"])
                .actions([Action::Create, Action::Destroy])
                .skip_if(|u: &User, _| u.banned),
        );
        assert!(publication
            .envelope_for(&user(), Action::Update)
            .unwrap()
            .is_none());
        assert!(publication
            .envelope_for(&user(), Action::Create)
            .unwrap()
            .is_some());
        let banned = User {
            banned: true,
            ..user()
        };
        assert!(publication
            .envelope_for(&banned, Action::Create)
            .unwrap()
            .is_none());
    }

    #[test]
    fn publication_info_describes_settings() {
        let publication = Publication::new(schema(), PublishSettings::new(["name"]).as_class("User"));
        let info = publication.info();
        assert_eq!(info.class, "PublisherUser");
        assert_eq!(info.as_class, "User");
        assert_eq!(info.actions, vec!["create", "update", "destroy"]);
        assert_eq!(info.id, "id");
    }

    #[test]
    fn published_envelope_reconciles_into_fresh_entity() {
        let publisher = schema();
        let settings = PublishSettings::new(["name", "email"]);
        let envelope = build_model_envelope(&publisher, &user(), Action::Create, &settings).unwrap();

        let subscriber = schema();
        let repo = Arc::new(InMemoryRepository::new(Arc::clone(&subscriber)));
        let target: Arc<dyn EntityTarget> =
            Arc::new(ModelTarget::new(subscriber, Arc::clone(&repo)));
        let binding = HandlerBinding::reconciling("PublisherUser", "create", target)
            .with_allowed_attrs(settings.attrs.iter().cloned());
        Reconciler::default().reconcile(&envelope, &binding).unwrap();

        let stored = repo.get(&Value::from(7)).unwrap().unwrap();
        assert_eq!(stored.name, "ada");
        assert_eq!(stored.email, "ada@example.com");
        assert_eq!(stored.age, 0);
    }
}
