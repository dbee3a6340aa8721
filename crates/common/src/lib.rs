/**
 * Token envelope cryptography.
 *  - Key derivation from the configured secret
 *  - Sealing / opening of share tokens
 */
pub mod crypto;
/**
 * The share data model: durable records,
 *  operator credentials and the sealed
 *  envelope payload.
 */
pub mod share;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::crypto::{EnvelopeCodec, EnvelopeError, EnvelopeKey, KeyError};
    pub use crate::share::{
        CredentialDefaults, Credentials, EnvelopePayload, Expiry, ExpiryError, Permission,
        ResolvedCredentials, ShareRecord,
    };
    pub use crate::version::build_info;
}
