use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::builder::BuiltTransaction;
use crate::error::{Error, Result};

/// What the consensus service needs to start collecting signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub request_id: String,
    /// Hex of the canonical transaction bytes.
    pub raw: String,
}

/// Handle to a request awaiting signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Consensus submission service.
#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn create_transaction_requests(
        &self,
        requests: &[SubmissionRequest],
    ) -> Result<Vec<PendingRequest>>;
}

/// Hand `built` to the submission service. Called once; retries belong to
/// the caller, who can repeat the same request id safely.
pub async fn submit_transaction<S>(service: &S, built: &BuiltTransaction) -> Result<PendingRequest>
where
    S: SubmissionService + ?Sized,
{
    let request = built.submission_request();
    let request_id = request.request_id.clone();
    log::info!("submitting transaction request {request_id}");

    let pending = service
        .create_transaction_requests(std::slice::from_ref(&request))
        .await?;
    let pending = pending
        .into_iter()
        .find(|p| p.request_id == request_id)
        .ok_or_else(|| {
            Error::submission(format!("no pending request returned for {request_id}"), false)
        })?;

    log::info!(
        "request {} pending in state {}",
        pending.request_id,
        pending.state.as_deref().unwrap_or("unknown")
    );
    Ok(pending)
}
