use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// What happened to an entity.
///
/// The three lifecycle actions get their own variants because the reconciler
/// treats them specially; anything else travels as [`Action::Custom`] and is
/// only meaningful to direct-mode handlers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    Create,
    Update,
    Destroy,
    Custom(String),
}

impl Action {
    /// Parse an action name. Lifecycle names map to their variants, any other
    /// non-empty name becomes [`Action::Custom`].
    pub fn parse(name: &str) -> Result<Self, TypeError> {
        let name = name.trim();
        match name {
            "" => Err(TypeError::EmptyAction),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "destroy" => Ok(Self::Destroy),
            other => Ok(Self::Custom(other.to_string())),
        }
    }

    /// Normalized string form used for matching and on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
            Self::Custom(name) => name,
        }
    }

    /// Returns `true` for [`Action::Destroy`].
    pub fn is_destroy(&self) -> bool {
        matches!(self, Self::Destroy)
    }

    /// The default action set for model publications and subscriptions.
    pub fn lifecycle() -> Vec<Action> {
        vec![Self::Create, Self::Update, Self::Destroy]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Action {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}
