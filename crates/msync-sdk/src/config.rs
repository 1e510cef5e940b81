use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use msync_core::{DispatcherConfig, MissingIdentityPolicy, ModelTarget, RegistryBuilder, SubscribeSettings};
use msync_store::{InMemoryRepository, ModelSchema, Record};
use msync_types::Action;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SdkError, SdkResult};

/// Process configuration.
///
/// ```toml
/// topic = "model-sync"
/// missing_identity = "reject"
///
/// [[subscriptions]]
/// class = "SubscriberUser"
/// attrs = ["name", "email"]
/// as_class = "User"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Topic every publisher and listener shares.
    pub topic: String,
    /// Handling of create/update envelopes without an identity value.
    pub missing_identity: MissingIdentityPolicy,
    /// Per-topic buffer of the in-memory transport.
    pub channel_capacity: usize,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Record-model subscriptions declared without Rust types.
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            topic: "model-sync".into(),
            missing_identity: MissingIdentityPolicy::Reject,
            channel_capacity: 1024,
            log_filter: "info".into(),
            subscriptions: Vec::new(),
        }
    }
}

/// One `[[subscriptions]]` entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionConfig {
    pub class: String,
    pub attrs: Vec<String>,
    /// Empty means create, update and destroy.
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_class: Option<String>,
    /// Identity key used to resolve entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
}

fn default_primary_key() -> String {
    "id".into()
}

impl SubscriptionConfig {
    /// Every attribute the record schema must declare besides the primary key.
    fn declared_attrs(&self) -> Vec<String> {
        let mut attrs: Vec<String> = self.attrs.clone();
        if let Some(id) = &self.id {
            if id != &self.primary_key && !attrs.contains(id) {
                attrs.push(id.clone());
            }
        }
        attrs
    }

    fn settings(&self) -> SubscribeSettings {
        let mut settings = SubscribeSettings::model(self.attrs.iter().cloned());
        if !self.actions.is_empty() {
            settings = settings.actions(self.actions.iter().cloned());
        }
        if let Some(as_class) = &self.as_class {
            settings = settings.as_class(as_class.clone());
        }
        if let Some(id) = &self.id {
            settings = settings.id(id.clone());
        }
        settings
    }
}

impl SyncConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> SdkResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SdkError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SdkResult<()> {
        if self.topic.trim().is_empty() {
            return Err(SdkError::InvalidConfig("topic must not be empty".into()));
        }
        if self.channel_capacity == 0 {
            return Err(SdkError::InvalidConfig(
                "channel_capacity must be greater than zero".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for sub in &self.subscriptions {
            if sub.class.trim().is_empty() {
                return Err(SdkError::InvalidConfig("subscription class must not be empty".into()));
            }
            if !seen.insert(sub.class.as_str()) {
                return Err(SdkError::InvalidConfig(format!(
                    "class {} is subscribed more than once",
                    sub.class
                )));
            }
            if sub.attrs.is_empty() {
                return Err(SdkError::InvalidConfig(format!(
                    "subscription {} lists no attrs",
                    sub.class
                )));
            }
            for action in &sub.actions {
                Action::parse(action).map_err(|e| {
                    SdkError::InvalidConfig(format!("subscription {}: {e}", sub.class))
                })?;
            }
        }
        Ok(())
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            missing_identity: self.missing_identity,
        }
    }
}

/// Register every configured subscription as a [`Record`] model backed by an
/// in-memory repository, returning the repositories keyed by class.
pub fn register_config_subscriptions(
    builder: &mut RegistryBuilder,
    config: &SyncConfig,
) -> SdkResult<BTreeMap<String, Arc<InMemoryRepository<Record>>>> {
    let mut repositories = BTreeMap::new();
    for sub in &config.subscriptions {
        let schema = Arc::new(ModelSchema::record(
            sub.class.as_str(),
            &sub.primary_key,
            sub.declared_attrs().as_slice(),
        )?);
        let repo = Arc::new(InMemoryRepository::new(Arc::clone(&schema)));
        builder.try_model(ModelTarget::new(schema, Arc::clone(&repo)))?;
        builder.register_subscribe(&sub.class, sub.settings())?;
        debug!(class = %sub.class, attrs = ?sub.attrs, "configured subscription registered");
        repositories.insert(sub.class.clone(), repo);
    }
    Ok(repositories)
}
