//! Newtype wrapper for canonical entity identifiers.
//!
//! Serializes as a plain string so identifiers can be bound directly as
//! statement parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Canonical identifier of one graph entity, e.g. `port/8080/tcp`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// The leading path segment naming the entity kind (`service`, `port`, ...).
    pub fn kind(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }
}

impl Deref for EntityId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for EntityId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for EntityId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_serializes_as_plain_string() {
        let id = EntityId::new("network/backend");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"network/backend\"");
        let back: EntityId = serde_json::from_str("\"network/backend\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn kind_is_first_segment() {
        assert_eq!(EntityId::from("service/app_yml/web").kind(), "service");
        assert_eq!(EntityId::from("port/80/tcp").kind(), "port");
    }

    #[test]
    fn compares_with_str() {
        let id = EntityId::from("image/nginx/latest");
        assert_eq!(id, "image/nginx/latest");
        assert_eq!(id.to_string(), "image/nginx/latest");
    }
}
