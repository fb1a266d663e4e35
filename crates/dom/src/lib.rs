//! Observable in-memory document.
//!
//! Plays the part of the third-party page: an element tree that other code
//! mutates freely, plus a child-list observation mechanism that queues one
//! change record per mutation for every interested observer.

pub mod document;
pub mod errors;
pub mod model;

mod host;
mod matcher;
mod observe;

pub use document::Document;
pub use errors::DomError;
pub use model::El;
