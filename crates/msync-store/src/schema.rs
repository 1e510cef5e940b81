use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use msync_types::{Payload, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{SchemaError, SchemaResult};

/// Bounds every entity type handled by msync must satisfy.
pub trait Model: Clone + Default + Send + Sync + 'static {}

impl<T: Clone + Default + Send + Sync + 'static> Model for T {}

type Getter<M> = Arc<dyn Fn(&M) -> SchemaResult<Value> + Send + Sync>;
type Setter<M> = Arc<dyn Fn(&mut M, Value) -> SchemaResult<()> + Send + Sync>;
type Rule<M> = Arc<dyn Fn(&M) -> Result<(), String> + Send + Sync>;

struct FieldAccessor<M> {
    get: Getter<M>,
    set: Option<Setter<M>>,
}

/// Attribute dispatch table for one entity type.
///
/// Maps attribute names to typed getter/setter closures so that payload
/// values can be merged into, and projected out of, plain Rust structs
/// without any reflection at message-processing time.
pub struct ModelSchema<M> {
    class: String,
    primary_key: String,
    fields: BTreeMap<String, FieldAccessor<M>>,
    rules: Vec<(String, Rule<M>)>,
}

impl<M: Model> ModelSchema<M> {
    /// Start declaring the schema for `class`.
    pub fn builder(class: impl Into<String>) -> ModelSchemaBuilder<M> {
        ModelSchemaBuilder {
            class: class.into(),
            primary_key: "id".to_string(),
            fields: BTreeMap::new(),
            rules: Vec::new(),
        }
    }

    /// The entity's own type name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Name of the primary identifier attribute.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Returns `true` if `name` was declared.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns `true` if `name` was declared with a setter.
    pub fn is_writable(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|f| f.set.is_some())
    }

    /// Declared attribute names in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Read one attribute as JSON.
    pub fn get(&self, model: &M, name: &str) -> SchemaResult<Value> {
        let accessor = self.accessor(name)?;
        (accessor.get)(model)
    }

    /// Assign one attribute from JSON.
    pub fn set(&self, model: &mut M, name: &str, value: Value) -> SchemaResult<()> {
        let accessor = self.accessor(name)?;
        let setter = accessor.set.as_ref().ok_or_else(|| SchemaError::ReadOnlyField {
            class: self.class.clone(),
            field: name.to_string(),
        })?;
        setter(model, value)
    }

    /// Project the listed attributes of `model` into a payload map.
    pub fn project<S: AsRef<str>>(&self, model: &M, attrs: &[S]) -> SchemaResult<Payload> {
        let mut payload = Payload::new();
        for name in attrs {
            let name = name.as_ref();
            payload.insert(name.to_string(), self.get(model, name)?);
        }
        Ok(payload)
    }

    /// A default instance with every seed attribute assigned.
    pub fn instantiate(&self, seed: &Payload) -> SchemaResult<M> {
        let mut model = M::default();
        for (name, value) in seed {
            self.set(&mut model, name, value.clone())?;
        }
        Ok(model)
    }

    /// Run every validation rule, collecting the failures.
    pub fn check(&self, model: &M) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .rules
            .iter()
            .filter_map(|(name, rule)| rule(model).err().map(|msg| format!("{name}: {msg}")))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn accessor(&self, name: &str) -> SchemaResult<&FieldAccessor<M>> {
        self.fields.get(name).ok_or_else(|| SchemaError::UnknownField {
            class: self.class.clone(),
            field: name.to_string(),
        })
    }
}

impl<M> fmt::Debug for ModelSchema<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("class", &self.class)
            .field("primary_key", &self.primary_key)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("rules", &self.rules.len())
            .finish()
    }
}

/// Builder for [`ModelSchema`].
pub struct ModelSchemaBuilder<M> {
    class: String,
    primary_key: String,
    fields: BTreeMap<String, FieldAccessor<M>>,
    rules: Vec<(String, Rule<M>)>,
}

impl<M: Model> ModelSchemaBuilder<M> {
    /// Override the primary identifier attribute (default `"id"`).
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    /// Declare a typed, writable attribute.
    ///
    /// Values are converted through serde, so a payload value that does not
    /// deserialize into `T` is a [`SchemaError::InvalidValue`].
    pub fn field<T, G, S>(self, name: impl Into<String>, get: G, set: S) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
        G: Fn(&M) -> T + Send + Sync + 'static,
        S: Fn(&mut M, T) + Send + Sync + 'static,
    {
        let name = name.into();
        let get_name = name.clone();
        let set_name = name.clone();
        self.raw_accessor(
            name,
            Arc::new(move |model: &M| to_json(&get_name, get(model))),
            Some(Arc::new(move |model: &mut M, value: Value| -> SchemaResult<()> {
                let typed: T = serde_json::from_value(value).map_err(|e| {
                    SchemaError::InvalidValue {
                        field: set_name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                set(model, typed);
                Ok(())
            })),
        )
    }

    /// Declare a typed, read-only attribute (e.g. a derived identifier).
    pub fn computed<T, G>(self, name: impl Into<String>, get: G) -> Self
    where
        T: Serialize + 'static,
        G: Fn(&M) -> T + Send + Sync + 'static,
    {
        let name = name.into();
        let get_name = name.clone();
        self.raw_accessor(
            name,
            Arc::new(move |model: &M| to_json(&get_name, get(model))),
            None,
        )
    }

    /// Declare a JSON-valued attribute.
    pub fn raw_field<G, S>(self, name: impl Into<String>, get: G, set: S) -> Self
    where
        G: Fn(&M) -> Value + Send + Sync + 'static,
        S: Fn(&mut M, Value) + Send + Sync + 'static,
    {
        self.raw_accessor(
            name.into(),
            Arc::new(move |model: &M| -> SchemaResult<Value> { Ok(get(model)) }),
            Some(Arc::new(move |model: &mut M, value: Value| -> SchemaResult<()> {
                set(model, value);
                Ok(())
            })),
        )
    }

    /// Add a save-time validation rule.
    pub fn validate<F>(mut self, name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&M) -> Result<(), String> + Send + Sync + 'static,
    {
        self.rules.push((name.into(), Arc::new(rule)));
        self
    }

    /// Finish the schema. The primary key must have been declared.
    pub fn build(self) -> SchemaResult<ModelSchema<M>> {
        if self.class.trim().is_empty() {
            return Err(SchemaError::EmptyClass);
        }
        if !self.fields.contains_key(&self.primary_key) {
            return Err(SchemaError::UnknownField {
                class: self.class,
                field: self.primary_key,
            });
        }
        Ok(ModelSchema {
            class: self.class,
            primary_key: self.primary_key,
            fields: self.fields,
            rules: self.rules,
        })
    }

    fn raw_accessor(mut self, name: String, get: Getter<M>, set: Option<Setter<M>>) -> Self {
        self.fields.insert(name, FieldAccessor { get, set });
        self
    }
}

fn to_json<T: Serialize>(field: &str, value: T) -> SchemaResult<Value> {
    serde_json::to_value(value).map_err(|e| SchemaError::InvalidValue {
        field: field.to_string(),
        reason: e.to_string(),
    })
}
