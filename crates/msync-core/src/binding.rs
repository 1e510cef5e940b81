use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use msync_types::Payload;
use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::matcher::normalize_name;
use crate::reconciler::EntityTarget;

/// A class-level callable for direct-mode bindings. Receives the payload
/// verbatim.
pub type ClassHandler = Arc<dyn Fn(&Payload) -> Result<(), HandlerError> + Send + Sync>;

/// How a binding handles a matched envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingMode {
    /// Hand the payload to a class-level callable.
    Direct,
    /// Resolve, merge and persist an entity.
    Reconciling,
}

impl fmt::Display for BindingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Reconciling => f.write_str("reconciling"),
        }
    }
}

/// The implementation a binding was resolved to at registration time.
#[derive(Clone)]
pub enum BoundHandler {
    Direct(ClassHandler),
    Reconciling(Arc<dyn EntityTarget>),
}

/// One entry of the registry: which envelopes it matches and what runs when
/// it does.
#[derive(Clone)]
pub struct HandlerBinding {
    /// Class name matched against `Envelope::class`.
    pub target_class: String,
    /// Action name matched against `Envelope::action`.
    pub target_action: String,
    /// Local class the implementation belongs to.
    pub impl_class: String,
    /// Local action the implementation performs.
    pub impl_action: String,
    /// Attribute used to look the entity up; the model's primary key when `None`.
    pub identity_key: Option<String>,
    /// Strict allow-list of payload attributes merged into the entity.
    pub allowed_attrs: Option<BTreeSet<String>>,
    pub handler: BoundHandler,
}

impl HandlerBinding {
    /// A direct-mode binding.
    pub fn direct(
        target_class: impl Into<String>,
        target_action: impl Into<String>,
        impl_class: impl Into<String>,
        impl_action: impl Into<String>,
        handler: ClassHandler,
    ) -> Self {
        Self {
            target_class: normalize_name(&target_class.into()).to_string(),
            target_action: normalize_name(&target_action.into()).to_string(),
            impl_class: impl_class.into(),
            impl_action: impl_action.into(),
            identity_key: None,
            allowed_attrs: None,
            handler: BoundHandler::Direct(handler),
        }
    }

    /// A reconciling binding for `target`, performing `target_action` locally.
    pub fn reconciling(
        target_class: impl Into<String>,
        target_action: impl Into<String>,
        target: Arc<dyn EntityTarget>,
    ) -> Self {
        let target_action = normalize_name(&target_action.into()).to_string();
        Self {
            target_class: normalize_name(&target_class.into()).to_string(),
            impl_class: target.class().to_string(),
            impl_action: target_action.clone(),
            target_action,
            identity_key: None,
            allowed_attrs: None,
            handler: BoundHandler::Reconciling(target),
        }
    }

    pub fn with_identity_key(mut self, key: impl Into<String>) -> Self {
        self.identity_key = Some(key.into());
        self
    }

    pub fn with_allowed_attrs<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_attrs = Some(attrs.into_iter().map(Into::into).collect());
        self
    }

    pub fn mode(&self) -> BindingMode {
        match self.handler {
            BoundHandler::Direct(_) => BindingMode::Direct,
            BoundHandler::Reconciling(_) => BindingMode::Reconciling,
        }
    }

    /// Exact match on the normalized class and action names.
    pub fn matches(&self, class: &str, action: &str) -> bool {
        self.target_class == normalize_name(class) && self.target_action == normalize_name(action)
    }

    /// Short human-readable description used in logs and reports.
    pub fn label(&self) -> String {
        format!(
            "{}.{} -> {}.{} ({})",
            self.target_class,
            self.target_action,
            self.impl_class,
            self.impl_action,
            self.mode()
        )
    }
}

impl fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("target_class", &self.target_class)
            .field("target_action", &self.target_action)
            .field("impl_class", &self.impl_class)
            .field("impl_action", &self.impl_action)
            .field("mode", &self.mode())
            .field("identity_key", &self.identity_key)
            .field("allowed_attrs", &self.allowed_attrs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> ClassHandler {
        Arc::new(|_| Ok(()))
    }

    #[test]
    fn direct_binding_matches_exact_names() {
        let binding = HandlerBinding::direct("User", "greeting2", "SubscriberUser", "greeting", noop());
        assert_eq!(binding.mode(), BindingMode::Direct);
        assert!(binding.matches("User", "greeting2"));
        assert!(binding.matches(" User ", "greeting2"));
        assert!(!binding.matches("User", "greeting"));
        assert!(!binding.matches("user", "greeting2"));
    }

    #[test]
    fn label_describes_binding() {
        let binding = HandlerBinding::direct("User", "greeting3", "SubscriberUser", "greeting", noop());
        assert_eq!(
            binding.label(),
            "User.greeting3 -> SubscriberUser.greeting (direct)"
        );
    }

    #[test]
    fn builder_methods_set_reconcile_options() {
        let binding = HandlerBinding::direct("A", "b", "A", "b", noop())
            .with_identity_key("uuid")
            .with_allowed_attrs(["name", "email"]);
        assert_eq!(binding.identity_key.as_deref(), Some("uuid"));
        assert_eq!(binding.allowed_attrs.as_ref().unwrap().len(), 2);
    }
}
