//! Polls an instance until a wait phase is satisfied.

use super::classify::{Verdict, WaitPhase};
use crate::cancellation::CancellationToken;
use crate::errors::RetryError;
use crate::provider::{InstanceRecord, ProviderClient};
use crate::retry::{with_retry, RetryPolicy};
use tracing::debug;

/// Describes `id` until `phase` judges it ready.
///
/// Returns the last record seen, or `None` when readiness means the
/// instance is gone.
pub(crate) async fn wait_for(
    client: &dyn ProviderClient,
    id: &str,
    phase: WaitPhase,
    policy: &RetryPolicy,
    token: &CancellationToken,
) -> Result<Option<InstanceRecord>, RetryError<Verdict>> {
    with_retry(policy, token, Verdict::is_retryable, || async move {
        let observation = client.describe_instance(id).await;
        match phase.classify(&observation) {
            Verdict::Ready => Ok(observation.ok()),
            verdict => {
                debug!(instance_id = id, ?phase, %verdict, "Instance not ready");
                Err(verdict)
            }
        }
    })
    .await
}
