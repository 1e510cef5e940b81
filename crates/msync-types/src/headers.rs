use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute set sent alongside the encoded payload.
///
/// `service_model_sync` marks a message as produced by msync; receivers
/// sharing a topic with other producers ignore messages without it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageHeaders {
    pub class: String,
    pub action: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<BTreeSet<String>>,
    #[serde(default)]
    pub service_model_sync: bool,
}

impl MessageHeaders {
    /// Returns `true` if the message was produced by a model-sync publisher.
    pub fn is_managed(&self) -> bool {
        self.service_model_sync
    }
}
