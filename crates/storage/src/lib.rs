//! Bucket access for garage-share
//!
//! This crate wraps the `object_store` crate behind a small bucket handle that
//! exposes exactly what the share subsystem needs from an S3-compatible cluster:
//! single-object get/put/delete, prefix enumeration, paginated directory-style
//! listing and time-boxed signed GET URLs.
//!
//! # Backends
//!
//! - **S3**: any S3-compatible endpoint (Garage, MinIO, AWS), path-style addressing
//! - **Memory**: an in-process store for tests and local development
//!
//! Backends are selected through the [`Connector`] trait, which turns a set of
//! resolved credentials plus a bucket name into a [`Bucket`].
//!
//! # Example
//!
//! ```rust,no_run
//! use common::share::{CredentialDefaults, Credentials};
//! use storage::{Connector, ListQuery, MemoryConnector};
//!
//! # async fn example() -> Result<(), storage::StorageError> {
//! let connector = MemoryConnector::new();
//! let creds = Credentials::new("GK1", "secret").resolve(&CredentialDefaults::default());
//! let bucket = connector.connect(&creds, "docs")?;
//!
//! let page = bucket.list_page(&ListQuery::default()).await?;
//! assert!(page.contents.is_empty());
//! # Ok(())
//! # }
//! ```

mod bucket;
mod connector;
mod error;
mod listing;
mod memory;

pub use bucket::Bucket;
pub use connector::{Connector, MemoryConnector, S3Connector, StorageConfig};
pub use error::{Result, StorageError};
pub use listing::{CommonPrefix, ListPage, ListQuery, ObjectEntry, DEFAULT_DELIMITER, MAX_KEYS};
