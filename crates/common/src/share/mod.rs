mod credentials;
mod payload;
mod record;

pub use credentials::{
    CredentialDefaults, Credentials, ResolvedCredentials, DEFAULT_ENDPOINT, DEFAULT_REGION,
};
pub use payload::EnvelopePayload;
pub use record::{Expiry, ExpiryError, Permission, ShareRecord, SHARE_PERMISSIONS};
