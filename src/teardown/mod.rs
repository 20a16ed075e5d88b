//! Reverse-order removal of provisioned resources.
//!
//! The coordinator walks the checkpoint from the most dependent resource to
//! the least: target, gateway, then the authorizer pieces. Each deletion is
//! attempted independently and a failure never stops the pass. The
//! checkpoint is discarded at the end whatever happened, so the next
//! provisioning run starts from scratch.

mod types;

use std::future::Future;

use tracing::{info, warn};

use crate::checkpoint::Checkpoint;
use crate::config_store::CheckpointStore;
use crate::control::{AuthorizerPart, ControlPlane};

pub use types::{TeardownFailure, TeardownReport, TeardownResource};

/// Deletes everything a checkpoint records, then discards the checkpoint.
#[derive(Debug)]
pub struct TeardownCoordinator<'a, C, S> {
    control: &'a C,
    store: &'a S,
    resource_server_id: String,
}

impl<'a, C, S> TeardownCoordinator<'a, C, S>
where
    C: ControlPlane,
    S: CheckpointStore,
{
    /// Creates a coordinator. `resource_server_id` is used when the
    /// checkpoint predates recording the resource server identifier.
    #[must_use]
    pub fn new(control: &'a C, store: &'a S, resource_server_id: impl Into<String>) -> Self {
        Self {
            control,
            store,
            resource_server_id: resource_server_id.into(),
        }
    }

    /// Runs the teardown pass.
    pub async fn teardown(&self, checkpoint: &Checkpoint) -> TeardownReport {
        let mut report = TeardownReport::default();

        if let (Some(gateway_id), Some(target_id)) = (&checkpoint.gateway_id, &checkpoint.target_id)
        {
            let resource = TeardownResource::Target {
                gateway_id: gateway_id.clone(),
                target_id: target_id.clone(),
            };
            attempt(
                &mut report,
                resource,
                self.control.delete_target(gateway_id, target_id),
            )
            .await;
        }

        if let Some(gateway_id) = &checkpoint.gateway_id {
            let resource = TeardownResource::Gateway {
                gateway_id: gateway_id.clone(),
            };
            attempt(&mut report, resource, self.control.delete_gateway(gateway_id)).await;
        }

        for part in self.authorizer_parts(checkpoint) {
            let future = self.control.delete_authorizer_part(&part);
            attempt(&mut report, TeardownResource::Authorizer(part.clone()), future).await;
        }

        report.checkpoint_removed = match self.store.discard() {
            Ok(removed) => removed,
            Err(err) => {
                warn!("⚠️ Could not remove checkpoint: {err}");
                report.failures.push(TeardownFailure {
                    resource: TeardownResource::Checkpoint {
                        path: self.store.path().to_path_buf(),
                    },
                    message: err.to_string(),
                });
                false
            }
        };

        if report.is_clean() {
            info!("✅ Teardown removed {} resource(s)", report.deleted.len());
        } else {
            warn!(
                "⚠️ Teardown finished with {} failure(s)",
                report.failures.len()
            );
        }
        report
    }

    fn authorizer_parts(&self, checkpoint: &Checkpoint) -> Vec<AuthorizerPart> {
        let Some(cognito) = &checkpoint.cognito else {
            return Vec::new();
        };
        let user_pool_id = cognito.user_pool_id.clone();
        let mut parts = vec![
            AuthorizerPart::AppClient {
                user_pool_id: user_pool_id.clone(),
                client_id: cognito.client_id.clone(),
            },
            AuthorizerPart::ResourceServer {
                user_pool_id: user_pool_id.clone(),
                identifier: cognito
                    .resource_server_id
                    .clone()
                    .unwrap_or_else(|| self.resource_server_id.clone()),
            },
        ];
        if let Some(domain) = &cognito.domain_prefix {
            parts.push(AuthorizerPart::Domain {
                user_pool_id: user_pool_id.clone(),
                domain: domain.clone(),
            });
        }
        parts.push(AuthorizerPart::UserPool { user_pool_id });
        parts
    }
}

async fn attempt<E, F>(report: &mut TeardownReport, resource: TeardownResource, deletion: F)
where
    E: std::fmt::Display,
    F: Future<Output = Result<(), E>>,
{
    match deletion.await {
        Ok(()) => {
            info!("✅ Deleted {resource}");
            report.deleted.push(resource);
        }
        Err(err) => {
            warn!("⚠️ Failed to delete {resource}: {err}");
            report.failures.push(TeardownFailure {
                resource,
                message: err.to_string(),
            });
        }
    }
}
