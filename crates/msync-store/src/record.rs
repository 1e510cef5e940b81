use std::collections::BTreeMap;

use msync_types::Value;
use serde::{Deserialize, Serialize};

use crate::error::SchemaResult;
use crate::schema::ModelSchema;

/// A schemaless entity: attribute name → JSON value.
///
/// Lets subscriptions be declared in configuration, without a Rust type per
/// entity class. The attribute set is still closed: only the names passed to
/// [`ModelSchema::record`] can be read or written.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Value of an attribute, `None` if it was never assigned.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl ModelSchema<Record> {
    /// Schema for a [`Record`] class with the given primary key and attributes.
    pub fn record<S: AsRef<str>>(
        class: impl Into<String>,
        primary_key: &str,
        attrs: &[S],
    ) -> SchemaResult<Self> {
        let mut builder = Self::builder(class).primary_key(primary_key);
        let names = std::iter::once(primary_key).chain(attrs.iter().map(AsRef::as_ref));
        for name in names {
            let get_name = name.to_string();
            let set_name = name.to_string();
            builder = builder.raw_field(
                name,
                move |r: &Record| r.fields.get(&get_name).cloned().unwrap_or(Value::Null),
                move |r: &mut Record, v| {
                    r.fields.insert(set_name.clone(), v);
                },
            );
        }
        builder.build()
    }
}
