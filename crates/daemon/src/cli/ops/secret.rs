use clap::Args;

use common::crypto::{generate_secret, KeyError};

/// Print a fresh random envelope secret.
///
/// Every instance that should accept the same tokens needs the same secret.
/// Changing it invalidates every token already handed out.
#[derive(Args, Debug, Clone)]
pub struct Secret;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("failed to generate secret: {0}")]
    Generate(#[from] KeyError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Secret {
    type Error = SecretError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        Ok(generate_secret()?)
    }
}
