//! podid core — domain models, error taxonomy and the persistence and
//! collaborator contracts the authentication layer is written against.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{ErrorKind, PodidError, PodidResult};
