use rne_core_types::{EntityKind, RneError, SelectorError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("descriptor '{0}' is already defined in this set")]
    DuplicateDescriptor(String),
    #[error("no {kind} descriptor named '{name}'")]
    UnknownDescriptor { kind: EntityKind, name: String },
    #[error("{found} descriptor '{name}' does not belong in a {expected} set")]
    KindMismatch {
        name: String,
        expected: EntityKind,
        found: EntityKind,
    },
    #[error("invalid structural hint: {0}")]
    InvalidHint(#[from] SelectorError),
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),
}

impl RegistryError {
    pub fn into_rne_error(self, detail: impl Into<String>) -> RneError {
        RneError::new(format!("{}: {}", self, detail.into()))
    }
}

impl From<RegistryError> for RneError {
    fn from(value: RegistryError) -> Self {
        RneError::new(value.to_string())
    }
}
