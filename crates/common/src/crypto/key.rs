//! Envelope key derivation using HKDF-SHA256

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;

/// Size of the AES-256-GCM key in bytes
pub const KEY_SIZE: usize = 32;
/// Shortest secret we accept from configuration
pub const MIN_SECRET_LEN: usize = 16;
/// Documented development placeholder. Never valid outside development.
pub const DEV_SECRET: &str = "default-dev-secret-do-not-use-in-prod";

const KDF_SALT: &[u8] = b"garage-share/envelope/v1";
const KDF_INFO: &[u8] = b"A256GCM content encryption key";

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("envelope secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    TooShort(usize),
    #[error("key derivation failed")]
    Derivation,
    #[error("failed to gather randomness: {0}")]
    Random(String),
}

/// The symmetric key that seals and opens every share token.
///
/// Derived deterministically from a single configured secret, so every process
/// instance configured with the same secret can open tokens minted by any other.
#[derive(Clone, PartialEq, Eq)]
pub struct EnvelopeKey([u8; KEY_SIZE]);

impl fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnvelopeKey(<redacted>)")
    }
}

impl EnvelopeKey {
    /// Derive the envelope key from the operator-configured secret.
    pub fn derive(secret: &str) -> Result<Self, KeyError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(KeyError::TooShort(secret.len()));
        }

        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), secret.as_bytes());
        let mut okm = [0u8; KEY_SIZE];
        hk.expand(KDF_INFO, &mut okm)
            .map_err(|_| KeyError::Derivation)?;

        Ok(Self(okm))
    }

    /// Whether `secret` is the documented development placeholder
    pub fn is_dev_secret(secret: &str) -> bool {
        secret == DEV_SECRET
    }

    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// Generate a fresh hex-encoded 256-bit secret suitable for configuration.
pub fn generate_secret() -> Result<String, KeyError> {
    let mut buff = [0u8; KEY_SIZE];
    getrandom::getrandom(&mut buff).map_err(|e| KeyError::Random(e.to_string()))?;
    Ok(hex::encode(buff))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = EnvelopeKey::derive("correct horse battery staple").unwrap();
        let b = EnvelopeKey::derive("correct horse battery staple").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_secrets_give_distinct_keys() {
        let a = EnvelopeKey::derive("correct horse battery staple").unwrap();
        let b = EnvelopeKey::derive("correct horse battery stapler").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_is_not_the_repeated_secret() {
        let secret = "0123456789abcdef";
        let key = EnvelopeKey::derive(secret).unwrap();
        let repeated: Vec<u8> = secret.bytes().cycle().take(KEY_SIZE).collect();
        assert_ne!(key.bytes(), repeated.as_slice());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            EnvelopeKey::derive("short"),
            Err(KeyError::TooShort(5))
        ));
    }

    #[test]
    fn test_debug_redacts() {
        let key = EnvelopeKey::derive("correct horse battery staple").unwrap();
        assert_eq!(format!("{:?}", key), "EnvelopeKey(<redacted>)");
    }

    #[test]
    fn test_dev_secret_detection() {
        assert!(EnvelopeKey::is_dev_secret(DEV_SECRET));
        assert!(!EnvelopeKey::is_dev_secret(&generate_secret().unwrap()));
    }

    #[test]
    fn test_generated_secret_shape() {
        let secret = generate_secret().unwrap();
        assert_eq!(secret.len(), KEY_SIZE * 2);
        assert!(EnvelopeKey::derive(&secret).is_ok());
    }
}
