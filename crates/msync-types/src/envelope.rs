use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::Action;
use crate::error::TypeError;
use crate::headers::MessageHeaders;

/// Attribute name → value mapping carried by an envelope.
pub type Payload = Map<String, Value>;

/// The canonical change event.
///
/// An envelope is self-describing: a receiver can match it against its
/// handler bindings using only `class` and `action`, without any schema
/// shared out of band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Entity class name as published (possibly an `as_class` alias).
    pub class: String,
    /// What happened.
    pub action: Action,
    /// Identity value of the entity, absent for class-level messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Attribute names the publisher projected into the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<BTreeSet<String>>,
    /// Attribute values.
    #[serde(default)]
    pub payload: Payload,
}

impl Envelope {
    /// Start an envelope with an empty payload.
    pub fn new(class: impl Into<String>, action: Action) -> Self {
        Self {
            class: class.into(),
            action,
            id: None,
            attrs: None,
            payload: Payload::new(),
        }
    }

    /// Set the identity value.
    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the projected attribute names.
    pub fn with_attrs<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs = Some(attrs.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Insert one payload attribute.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    /// The identity value, treating JSON `null` the same as absent.
    pub fn identity(&self) -> Option<&Value> {
        self.id.as_ref().filter(|v| !v.is_null())
    }

    /// Check the envelope invariants: non-blank class, non-empty action, and
    /// a non-empty payload for every action except `destroy`.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.class.trim().is_empty() {
            return Err(TypeError::EmptyClass);
        }
        if self.action.as_str().trim().is_empty() {
            return Err(TypeError::EmptyAction);
        }
        if self.payload.is_empty() && !self.action.is_destroy() {
            return Err(TypeError::EmptyPayload {
                action: self.action.to_string(),
            });
        }
        Ok(())
    }

    /// Transport attributes describing this envelope.
    pub fn headers(&self) -> MessageHeaders {
        MessageHeaders {
            class: self.class.clone(),
            action: self.action.to_string(),
            id: self.identity().cloned(),
            attrs: self.attrs.clone(),
            service_model_sync: true,
        }
    }

    /// Rebuild an envelope from transport attributes and a decoded payload.
    pub fn from_wire(headers: MessageHeaders, payload: Payload) -> Result<Self, TypeError> {
        let envelope = Self {
            class: headers.class,
            action: Action::parse(&headers.action)?,
            id: headers.id.filter(|v| !v.is_null()),
            attrs: headers.attrs,
            payload,
        };
        envelope.validate()?;
        Ok(envelope)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity() {
            Some(id) => write!(f, "{}#{} {}", self.class, id, self.action),
            None => write!(f, "{} {}", self.class, self.action),
        }
    }
}
