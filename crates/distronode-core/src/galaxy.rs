//! Galaxy requirements documents: `collections`/`roles` mappings and the
//! legacy bare list of roles.

use serde_yaml::{Mapping, Value};
use thiserror::Error;

const COLLECTIONS_KEY: &str = "collections";
const ROLES_KEY: &str = "roles";

#[derive(Debug, Error)]
pub enum GalaxyError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unexpected key '{0}'; expected 'collections' or 'roles'")]
    UnexpectedKey(String),
    #[error("'{0}' must be a list")]
    NotAList(String),
    #[error("expected a mapping with 'collections' or 'roles'")]
    NotAMapping,
    #[error("must define 'collections' or 'roles'")]
    Empty,
}

/// Parsed galaxy requirements: collection and role entries, each kept as the
/// YAML the user wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GalaxyRequirements {
    pub collections: Option<Vec<Value>>,
    pub roles: Option<Vec<Value>>,
}

impl GalaxyRequirements {
    pub fn parse(text: &str) -> Result<Self, GalaxyError> {
        let value: Value = serde_yaml::from_str(text)?;
        Self::from_value(&value)
    }

    /// Accept a mapping of `collections`/`roles`, or a bare list of roles.
    pub fn from_value(value: &Value) -> Result<Self, GalaxyError> {
        let requirements = match value {
            Value::Sequence(roles) => Self {
                collections: None,
                roles: Some(roles.clone()),
            },
            Value::Mapping(map) => {
                let mut out = Self::default();
                for (key, entry) in map {
                    let key = match key {
                        Value::String(s) => s.as_str(),
                        other => {
                            let text = serde_yaml::to_string(other)?;
                            return Err(GalaxyError::UnexpectedKey(text.trim_end().to_owned()));
                        }
                    };
                    let list = match entry {
                        Value::Null => None,
                        Value::Sequence(items) => Some(items.clone()),
                        _ => return Err(GalaxyError::NotAList(key.to_owned())),
                    };
                    match key {
                        COLLECTIONS_KEY => out.collections = list,
                        ROLES_KEY => out.roles = list,
                        other => return Err(GalaxyError::UnexpectedKey(other.to_owned())),
                    }
                }
                out
            }
            _ => return Err(GalaxyError::NotAMapping),
        };

        if requirements.collections.is_none() && requirements.roles.is_none() {
            return Err(GalaxyError::Empty);
        }
        Ok(requirements)
    }

    /// Canonical YAML: `collections` before `roles`, absent keys omitted.
    pub fn to_yaml(&self) -> Result<String, GalaxyError> {
        let mut map = Mapping::new();
        if let Some(collections) = &self.collections {
            map.insert(
                Value::from(COLLECTIONS_KEY),
                Value::Sequence(collections.clone()),
            );
        }
        if let Some(roles) = &self.roles {
            map.insert(Value::from(ROLES_KEY), Value::Sequence(roles.clone()));
        }
        Ok(serde_yaml::to_string(&Value::Mapping(map))?)
    }
}
