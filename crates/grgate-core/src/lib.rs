//! Core domain types and traits for GRGate.
//!
//! This crate contains:
//! - The platform contract every source-control backend implements
//! - Release, status and issue types shared by every crate
//! - Repository reference parsing
//! - Job identifiers
//! - An in-memory platform used by tests, behind the `testing` feature

pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod fakes;
pub mod id;
pub mod issue;
pub mod platform;
pub mod release;
pub mod repository;
pub mod status;

pub use error::{PlatformError, PlatformResult};
pub use id::JobId;
pub use issue::Issue;
pub use platform::{Platform, PlatformKind};
pub use release::{Release, ReleaseId};
pub use repository::RepositoryRef;
pub use status::{Status, merge_statuses};
