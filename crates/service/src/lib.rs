//! Share-token service for a Garage/S3 admin console.
//!
//! An operator holding storage credentials mints share tokens that let a
//! recipient list and download objects in one bucket, and nothing else:
//! - Share records persisted in the bucket itself ([`store`])
//! - Operator lifecycle: create, update, list, revoke, re-issue ([`manager`])
//! - Request-time token enforcement ([`gateway`])
//! - The read operations a token unlocks ([`executor`]) and the download relay ([`relay`])
//! - HTTP routers, state and process bootstrap

pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod http_server;
pub mod manager;
pub mod process;
pub mod relay;
pub mod state;
pub mod store;

pub use config::{Config as ServiceConfig, ConfigError, FileConfig};
pub use error::{RecipientError, ShareError};
pub use executor::{Executor, RecipientAction, RecipientOp, RecipientOutput, RecipientParams};
pub use gateway::{CapabilityGateway, ScopedContext};
pub use manager::{Ack, MintedShare, ShareManager, ShareOp, ShareOpOutput};
pub use state::{State as ServiceState, StateSetupError};
pub use store::{ObjectShareStore, ShareStore, StoreError};
