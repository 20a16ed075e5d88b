//! Error types for the provisioning workflow.

use thiserror::Error;

use crate::config_store::ConfigStoreError;
use crate::poller::PollError;

/// Errors raised while provisioning the gateway resources.
///
/// Control-plane failures keep the backend error as their source so callers
/// can inspect the remote code.
#[derive(Debug, Error)]
pub enum ProvisionError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the checkpoint cannot be read or written.
    #[error(transparent)]
    Checkpoint(#[from] ConfigStoreError),
    /// Raised when no function ARN can be found from any source.
    #[error("function ARN unavailable: {message}")]
    FunctionArnMissing {
        /// Operator guidance.
        message: String,
    },
    /// Raised when the stack output lookup fails.
    #[error("failed to look up function ARN from stack outputs: {0}")]
    FunctionLookup(#[source] E),
    /// Raised when creating the OAuth authorizer fails.
    #[error("failed to create authorizer: {0}")]
    Authorizer(#[source] E),
    /// Raised when creating the gateway fails.
    #[error("failed to create gateway: {0}")]
    Gateway(#[source] E),
    /// Raised when creating the gateway target fails.
    #[error("failed to create gateway target: {0}")]
    Target(#[source] E),
    /// Raised when a required readiness wait fails or times out.
    #[error(transparent)]
    Readiness(#[from] PollError),
}

impl<E> ProvisionError<E>
where
    E: std::error::Error + 'static,
{
    pub(super) fn function_arn_missing(stack_name: &str) -> Self {
        Self::FunctionArnMissing {
            message: format!(
                "deploy the function stack `{stack_name}` first, or pass --lambda-arn"
            ),
        }
    }
}
