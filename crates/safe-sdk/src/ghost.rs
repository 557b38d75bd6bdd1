//! One-time ("ghost") key resolution for outputs paying literal members.
//!
//! Every output whose destination names member identities is masked with
//! key material from the external derivation service. All such outputs
//! are requested in a single batched call, and nothing is attached unless
//! the whole batch comes back well-formed.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::draft::{DraftOutput, TransactionDraft};
use crate::error::{Error, Result};
use crate::hash::Key;
use crate::idempotency::ghost_hint;

/// Key request for the output at position `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostRequest {
    /// Destination members, sorted.
    pub receivers: Vec<String>,
    pub index: u8,
    pub hint: String,
}

/// Key material for one output: a key per receiver plus the mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostKeys {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub mask: Key,
    pub keys: Vec<Key>,
}

/// External key derivation service.
#[async_trait]
pub trait GhostKeyService: Send + Sync {
    /// One [`GhostKeys`] per request, in request order.
    async fn fetch_ghost_keys(
        &self,
        requests: &[GhostRequest],
        senders: &[String],
    ) -> Result<Vec<GhostKeys>>;
}

/// Bounded retry for the key service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    /// Delay before the first retry; doubles after each.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(10),
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }
}

/// Requests for every output needing masking, paired with its position.
pub fn ghost_requests(tx_hint: &Uuid, outputs: &[DraftOutput]) -> Result<Vec<(usize, GhostRequest)>> {
    outputs
        .iter()
        .enumerate()
        .filter(|(_, o)| o.destination.requires_masking())
        .map(|(position, o)| {
            let index = u8::try_from(position).map_err(|_| Error::TooManyOutputs(outputs.len()))?;
            let mut receivers = o.destination.members();
            receivers.sort();
            Ok((
                position,
                GhostRequest {
                    receivers,
                    index,
                    hint: ghost_hint(tx_hint, index).to_string(),
                },
            ))
        })
        .collect()
}

/// Fetch and attach ghost keys for every masked output of `draft`.
///
/// Either every masked output is keyed or the draft is left untouched.
pub async fn resolve_ghost_keys<S>(
    service: &S,
    draft: &mut TransactionDraft,
    policy: &RetryPolicy,
) -> Result<()>
where
    S: GhostKeyService + ?Sized,
{
    let pending = ghost_requests(&draft.hint, &draft.outputs)?;
    if pending.is_empty() {
        return Ok(());
    }
    let (positions, requests): (Vec<usize>, Vec<GhostRequest>) = pending.into_iter().unzip();
    let senders = draft.source.address.members();

    let responses = fetch_with_retry(service, &requests, &senders, policy).await?;

    if responses.len() != requests.len() {
        return Err(Error::ghost(
            format!(
                "requested keys for {} outputs, received {}",
                requests.len(),
                responses.len()
            ),
            false,
        ));
    }
    for (request, response) in requests.iter().zip(&responses) {
        if response.keys.len() != request.receivers.len() {
            return Err(Error::ghost(
                format!(
                    "output {}: {} receivers but {} keys",
                    request.index,
                    request.receivers.len(),
                    response.keys.len()
                ),
                false,
            ));
        }
    }

    for (position, keys) in positions.into_iter().zip(responses) {
        let output = &mut draft.outputs[position].output;
        output.keys = keys.keys;
        output.mask = Some(keys.mask);
    }
    Ok(())
}

async fn fetch_with_retry<S>(
    service: &S,
    requests: &[GhostRequest],
    senders: &[String],
    policy: &RetryPolicy,
) -> Result<Vec<GhostKeys>>
where
    S: GhostKeyService + ?Sized,
{
    let attempts = policy.attempts.max(1);
    let mut backoff = policy.backoff;
    let mut attempt = 1;
    loop {
        let err = match tokio::time::timeout(
            policy.timeout,
            service.fetch_ghost_keys(requests, senders),
        )
        .await
        {
            Ok(Ok(keys)) => return Ok(keys),
            Ok(Err(e @ Error::GhostKeyService { .. })) => e,
            Ok(Err(e)) => {
                let transient = e.is_retryable();
                Error::ghost(e.to_string(), transient)
            }
            Err(_) => Error::ghost(
                format!("no response within {}ms", policy.timeout.as_millis()),
                true,
            ),
        };

        if !err.is_retryable() || attempt >= attempts {
            return Err(err);
        }
        log::warn!("ghost key request attempt {attempt}/{attempts} failed: {err}; retrying in {backoff:?}");
        tokio::time::sleep(backoff).await;
        backoff = backoff.saturating_mul(2);
        attempt += 1;
    }
}
