#![allow(dead_code)]

use std::fmt;

use thiserror::Error;

pub mod change;
pub mod host;
pub mod selector;

pub use change::{ChangeBatch, ChangeNotice, ChangeRecord};
pub use host::{ChangeSource, HostTree};
pub use selector::{Combinator, Compound, Selector, SelectorError};

/// Shared error type for the redaction engine crates.
#[derive(Debug, Error, Clone)]
pub enum RneError {
    #[error("{message}")]
    Message { message: String },
}

impl RneError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl From<SelectorError> for RneError {
    fn from(value: SelectorError) -> Self {
        RneError::new(value.to_string())
    }
}

/// Stable handle for a node of the host tree.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Handle returned by the host when a change observer is attached.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObserverId(pub u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// An external actor referenced by an item, e.g. an author's user id.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct IdentityId(pub String);

impl IdentityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IdentityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for IdentityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cached blocklist verdict for one identity.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Classification {
    #[default]
    Unknown,
    Tainted,
    Clean,
}

impl Classification {
    pub fn is_tainted(self) -> bool {
        matches!(self, Classification::Tainted)
    }

    pub fn as_option(self) -> Option<bool> {
        match self {
            Classification::Unknown => None,
            Classification::Tainted => Some(true),
            Classification::Clean => Some(false),
        }
    }
}

impl From<Option<bool>> for Classification {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Classification::Unknown,
            Some(true) => Classification::Tainted,
            Some(false) => Classification::Clean,
        }
    }
}

impl From<bool> for Classification {
    fn from(value: bool) -> Self {
        Classification::from(Some(value))
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EntityKind {
    Root,
    Stream,
    Item,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Root => "root",
            EntityKind::Stream => "stream",
            EntityKind::Item => "item",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Depth of a change observer: direct children only, or the whole subtree.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ObserveScope {
    Children,
    Subtree,
}

impl ObserveScope {
    pub fn from_subtree(subtree: bool) -> Self {
        if subtree {
            ObserveScope::Subtree
        } else {
            ObserveScope::Children
        }
    }

    pub fn is_subtree(self) -> bool {
        matches!(self, ObserveScope::Subtree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_round_trips_through_option() {
        for value in [None, Some(true), Some(false)] {
            assert_eq!(Classification::from(value).as_option(), value);
        }
        assert!(Classification::from(true).is_tainted());
        assert!(!Classification::Unknown.is_tainted());
        assert!(!Classification::Clean.is_tainted());
    }

    #[test]
    fn identity_display_is_raw_value() {
        let id = IdentityId::from("42");
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_str(), "42");
    }
}
