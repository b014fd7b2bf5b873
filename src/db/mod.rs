//! Request store access.

mod repository;

#[cfg(feature = "local-repo")]
mod local;

pub use repository::{RepositoryError, RepositoryResult, RequestRepository};

#[cfg(feature = "local-repo")]
pub use local::LocalRepository;
