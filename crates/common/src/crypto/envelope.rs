//! Sealing and opening of compact share tokens using AES-256-GCM

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::key::{EnvelopeKey, KeyError};

/// Size of the AES-GCM IV in bytes
pub const IV_SIZE: usize = 12;
/// Size of the AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

const ALG_DIR: &str = "dir";
const ENC_A256GCM: &str = "A256GCM";
const SEGMENTS: usize = 5;

/// Errors that can occur while sealing or opening a token
///
/// Callers on an untrusted boundary must not surface the difference between
/// `Decode` and `Authentication`.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed token: {0}")]
    Decode(String),
    #[error("token failed authentication")]
    Authentication,
    #[error("failed to seal token: {0}")]
    Seal(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct ProtectedHeader {
    alg: String,
    enc: String,
}

impl Default for ProtectedHeader {
    fn default() -> Self {
        Self {
            alg: ALG_DIR.to_string(),
            enc: ENC_A256GCM.to_string(),
        }
    }
}

/// Seals serializable payloads into compact, URL-safe tokens and opens them again.
///
/// ```ignore
/// let codec = EnvelopeCodec::from_secret("a long operator supplied secret")?;
/// let token = codec.seal(&payload)?;
/// let opened: EnvelopePayload = codec.open(&token)?;
/// assert_eq!(opened, payload);
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    key: EnvelopeKey,
}

impl EnvelopeCodec {
    pub fn new(key: EnvelopeKey) -> Self {
        Self { key }
    }

    pub fn from_secret(secret: &str) -> Result<Self, KeyError> {
        Ok(Self::new(EnvelopeKey::derive(secret)?))
    }

    fn cipher(&self) -> Aes256Gcm {
        // KEY_SIZE is fixed at 32, which is exactly what Aes256Gcm wants
        Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(self.key.bytes()))
    }

    /// Serialize `payload` to JSON and seal it under the envelope key.
    pub fn seal<T: Serialize>(&self, payload: &T) -> Result<String, EnvelopeError> {
        let header = serde_json::to_vec(&ProtectedHeader::default())
            .map_err(|e| EnvelopeError::Seal(e.to_string()))?;
        let header_b64 = URL_SAFE_NO_PAD.encode(header);

        let plaintext =
            serde_json::to_vec(payload).map_err(|e| EnvelopeError::Seal(e.to_string()))?;

        let mut iv = [0u8; IV_SIZE];
        getrandom::getrandom(&mut iv)
            .map_err(|e| EnvelopeError::Seal(format!("failed to generate iv: {}", e)))?;

        let mut sealed = self
            .cipher()
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &plaintext,
                    aad: header_b64.as_bytes(),
                },
            )
            .map_err(|_| EnvelopeError::Seal("encrypt error".to_string()))?;

        // aes-gcm appends the tag to the ciphertext; the compact form carries it separately
        let tag = sealed.split_off(sealed.len() - TAG_SIZE);

        Ok(format!(
            "{}..{}.{}.{}",
            header_b64,
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(&sealed),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    /// Open a token produced by [`EnvelopeCodec::seal`].
    ///
    /// # Errors
    ///
    /// - `Decode` if the token is not five well-formed segments, names an
    ///   unsupported algorithm, or the authenticated plaintext is not a `T`
    /// - `Authentication` if the integrity check fails (tampering or wrong key)
    pub fn open<T: DeserializeOwned>(&self, token: &str) -> Result<T, EnvelopeError> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header_b64, encrypted_key, iv_b64, ciphertext_b64, tag_b64] = segments.as_slice()
        else {
            return Err(EnvelopeError::Decode(format!(
                "expected {} segments, got {}",
                SEGMENTS,
                segments.len()
            )));
        };

        if !encrypted_key.is_empty() {
            return Err(EnvelopeError::Decode(
                "direct encryption carries no encrypted key".to_string(),
            ));
        }

        let header: ProtectedHeader = serde_json::from_slice(&decode_segment(header_b64)?)
            .map_err(|e| EnvelopeError::Decode(format!("invalid header: {}", e)))?;
        if header.alg != ALG_DIR || header.enc != ENC_A256GCM {
            return Err(EnvelopeError::Decode(format!(
                "unsupported algorithm {}/{}",
                header.alg, header.enc
            )));
        }

        let iv = decode_segment(iv_b64)?;
        if iv.len() != IV_SIZE {
            return Err(EnvelopeError::Decode(format!(
                "invalid iv size, expected {}, got {}",
                IV_SIZE,
                iv.len()
            )));
        }
        let tag = decode_segment(tag_b64)?;
        if tag.len() != TAG_SIZE {
            return Err(EnvelopeError::Decode(format!(
                "invalid tag size, expected {}, got {}",
                TAG_SIZE,
                tag.len()
            )));
        }

        let mut sealed = decode_segment(ciphertext_b64)?;
        sealed.extend_from_slice(&tag);

        let plaintext = self
            .cipher()
            .decrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &sealed,
                    aad: header_b64.as_bytes(),
                },
            )
            .map_err(|_| EnvelopeError::Authentication)?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| EnvelopeError::Decode(format!("invalid payload: {}", e)))
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, EnvelopeError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| EnvelopeError::Decode(format!("invalid base64url segment: {}", e)))
}

#[cfg(test)]
mod test {
    use rand::Rng;
    use uuid::Uuid;

    use super::*;
    use crate::share::EnvelopePayload;

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::from_secret("an operator secret that is long enough").unwrap()
    }

    fn payload() -> EnvelopePayload {
        EnvelopePayload {
            id: Uuid::new_v4(),
            bucket: "docs".to_string(),
            ak: "GK31c2f218a2e44f485b94239e".to_string(),
            sk: "b892c0665f0ada8a4755dae98baa3b133590e11dae3bcc1f9d769d67f16c3835".to_string(),
            region: "garage".to_string(),
            endpoint: "http://localhost:3900".to_string(),
        }
    }

    #[test]
    fn test_seal_open_round_trip() {
        let codec = codec();
        let payload = payload();

        let token = codec.seal(&payload).unwrap();
        let opened: EnvelopePayload = codec.open(&token).unwrap();

        assert_eq!(opened, payload);
    }

    #[test]
    fn test_token_is_url_safe() {
        let token = codec().seal(&payload()).unwrap();

        assert_eq!(token.split('.').count(), SEGMENTS);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    }

    #[test]
    fn test_each_seal_uses_a_fresh_iv() {
        let codec = codec();
        let payload = payload();

        let a = codec.seal(&payload).unwrap();
        let b = codec.seal(&payload).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_secret_material_not_visible_in_token() {
        let payload = payload();
        let token = codec().seal(&payload).unwrap();

        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"dir","enc":"A256GCM"}"#);
        assert!(token.starts_with(&header));
        assert!(!token.contains(&URL_SAFE_NO_PAD.encode(payload.sk.as_bytes())));
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let token = codec().seal(&payload()).unwrap();
        let other = EnvelopeCodec::from_secret("a completely different operator secret").unwrap();

        let result = other.open::<EnvelopePayload>(&token);
        assert!(matches!(result, Err(EnvelopeError::Authentication)));
    }

    #[test]
    fn test_ciphertext_tamper_fails_authentication() {
        let codec = codec();
        let token = codec.seal(&payload()).unwrap();

        let segments: Vec<&str> = token.split('.').collect();
        let mut ciphertext = URL_SAFE_NO_PAD.decode(segments[3]).unwrap();
        ciphertext[0] ^= 0x01;
        let tampered = format!(
            "{}..{}.{}.{}",
            segments[0],
            segments[2],
            URL_SAFE_NO_PAD.encode(ciphertext),
            segments[4]
        );

        let result = codec.open::<EnvelopePayload>(&tampered);
        assert!(matches!(result, Err(EnvelopeError::Authentication)));
    }

    #[test]
    fn test_random_single_character_tamper_never_opens() {
        const ALPHABET: &[u8] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

        let codec = codec();
        let token = codec.seal(&payload()).unwrap();
        let mut rng = rand::rng();

        for _ in 0..1000 {
            let mut bytes = token.clone().into_bytes();
            let position = rng.random_range(0..bytes.len());
            let original = bytes[position];
            let replacement = loop {
                let candidate = ALPHABET[rng.random_range(0..ALPHABET.len())];
                if candidate != original {
                    break candidate;
                }
            };
            bytes[position] = replacement;
            let tampered = String::from_utf8(bytes).unwrap();

            assert!(
                codec.open::<EnvelopePayload>(&tampered).is_err(),
                "tampered token opened at position {}",
                position
            );
        }
    }

    #[test]
    fn test_malformed_tokens_fail_decode() {
        let codec = codec();

        for token in ["", "not-a-token", "a.b.c", "a..b.c.d.e", "!!!..a.b.c"] {
            let result = codec.open::<EnvelopePayload>(token);
            assert!(
                matches!(result, Err(EnvelopeError::Decode(_))),
                "expected decode error for {:?}",
                token
            );
        }
    }

    #[test]
    fn test_unsupported_algorithm_rejected() {
        let codec = codec();
        let token = codec.seal(&payload()).unwrap();
        let (_, rest) = token.split_once('.').unwrap();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"dir","enc":"A128GCM"}"#);
        let swapped = format!("{}.{}", header, rest);

        let result = codec.open::<EnvelopePayload>(&swapped);
        assert!(matches!(result, Err(EnvelopeError::Decode(_))));
    }
}
