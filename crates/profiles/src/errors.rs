use rne_core_types::{RneError, SelectorError};
use rne_registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unknown page profile '{0}'")]
    UnknownProfile(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("invalid selector: {0}")]
    Selector(#[from] SelectorError),
}

impl From<ProfileError> for RneError {
    fn from(value: ProfileError) -> Self {
        RneError::new(value.to_string())
    }
}
