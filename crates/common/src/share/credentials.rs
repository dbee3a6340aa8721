use std::fmt;

use serde::{Deserialize, Serialize};

/// Endpoint used when neither configuration nor the operator supplies one
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3900";
/// Region used when neither configuration nor the operator supplies one
pub const DEFAULT_REGION: &str = "garage";

/// Storage credentials as submitted by an (already authenticated) operator.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Server-side overrides applied when resolving operator credentials.
///
/// An override always wins over what the operator submitted, so a deployment can
/// pin the internal storage endpoint regardless of what the browser believes it is.
#[derive(Debug, Clone, Default)]
pub struct CredentialDefaults {
    pub endpoint: Option<String>,
    pub region: Option<String>,
}

/// Fully resolved connection parameters: what actually gets sealed into a token.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub endpoint: String,
}

impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: None,
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Apply server overrides and fallbacks: override, then submitted value, then default.
    pub fn resolve(&self, defaults: &CredentialDefaults) -> ResolvedCredentials {
        let endpoint = defaults
            .endpoint
            .clone()
            .or_else(|| self.endpoint.clone().filter(|e| !e.is_empty()))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let region = defaults
            .region
            .clone()
            .or_else(|| self.region.clone().filter(|r| !r.is_empty()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        ResolvedCredentials {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            region,
            endpoint,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}
