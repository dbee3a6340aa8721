//! Cryptographic primitives for share tokens
//!
//! A share token is a sealed envelope carrying real storage credentials plus the
//! bucket lock for a single share. Nothing about the token is tracked server-side:
//! possession of a token that opens under the server key is the whole capability,
//! and the share record in the bucket decides whether that capability is still live.
//!
//! # Envelope Format
//!
//! Tokens use the compact JWE layout with direct key agreement:
//!
//! ```text
//! base64url(header) . "" . base64url(iv) . base64url(ciphertext) . base64url(tag)
//! ```
//!
//! - **Header**: `{"alg":"dir","enc":"A256GCM"}`, authenticated as associated data
//! - **Cipher**: AES-256-GCM with a random 96-bit IV per token
//! - **Key**: HKDF-SHA256 over the configured secret (see [`EnvelopeKey`])
//!
//! Every segment is unpadded base64url, so a token can be dropped into a URL
//! query parameter as-is.

mod envelope;
mod key;

pub use envelope::{EnvelopeCodec, EnvelopeError, IV_SIZE, TAG_SIZE};
pub use key::{generate_secret, EnvelopeKey, KeyError, DEV_SECRET, KEY_SIZE, MIN_SECRET_LEN};
