//! In-memory stand-ins for the external services, plus fixtures.
//!
//! `MockBackend` serves UTXOs from a list, answers ghost key requests with
//! deterministic key material, and records everything it is asked, so
//! tests can assert on call counts and exact payloads without a network.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::address::Address;
use crate::amount::Amount;
use crate::error::{Error, Result};
use crate::ghost::{GhostKeyService, GhostKeys, GhostRequest};
use crate::hash::{Hash, Key};
use crate::submission::{PendingRequest, SubmissionRequest, SubmissionService};
use crate::utxo::{Utxo, UtxoQuery, UtxoSource};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Kernel asset hash used by every fixture UTXO.
pub const TEST_ASSET: Hash = Hash([0xa5; 32]);
pub const TEST_ASSET_ID: &str = "c6d0c728-2624-429b-8e0d-d9d19b6592fa";

/// Deterministic member identity.
pub fn member(n: u8) -> Uuid {
    Uuid::from_bytes([n; 16])
}

pub fn member_address(members: &[u8], threshold: u8) -> Address {
    Address::from_members(members.iter().map(|n| member(*n)).collect(), threshold)
        .expect("valid fixture address")
}

pub fn opaque_address(seed: u8) -> Address {
    Address::from_opaque_keys(vec![[seed; 64]], 1).expect("valid fixture address")
}

/// A UTXO of `amount` locked to `address`, identified by `n`.
pub fn utxo(n: u8, amount: &str, address: &Address) -> Utxo {
    Utxo {
        output_id: Uuid::from_bytes([0x10, n, 0, 0, 0, 0, 0x40, 0, 0x80, 0, 0, 0, 0, 0, 0, n])
            .to_string(),
        transaction_hash: Hash([n; 32]),
        output_index: u16::from(n),
        asset_id: TEST_ASSET_ID.to_string(),
        kernel_asset_id: TEST_ASSET,
        amount: amount.parse::<Amount>().expect("valid fixture amount"),
        receivers: address.members(),
        receivers_threshold: address.threshold(),
        state: Some("unspent".to_string()),
    }
}

/// Key material the mock derives for `request`: stable per hint.
pub fn ghost_keys_for(request: &GhostRequest) -> GhostKeys {
    let keys = (0..request.receivers.len())
        .map(|i| Key(Hash::sha256(format!("key:{}:{i}", request.hint).as_bytes()).0))
        .collect();
    GhostKeys {
        kind: "ghost_key".to_string(),
        mask: Key(Hash::sha256(format!("mask:{}", request.hint).as_bytes()).0),
        keys,
    }
}

// ---------------------------------------------------------------------------
// MockBackend
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockBackend {
    utxos: Mutex<Vec<Utxo>>,
    utxo_queries: Mutex<Vec<UtxoQuery>>,
    ghost_calls: AtomicUsize,
    ghost_batches: Mutex<Vec<(Vec<GhostRequest>, Vec<String>)>>,
    ghost_failures: Mutex<VecDeque<Error>>,
    ghost_delay: Mutex<Option<Duration>>,
    ghost_drop_last: Mutex<bool>,
    submissions: Mutex<Vec<SubmissionRequest>>,
    submission_failure: Mutex<Option<Error>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_utxos(utxos: Vec<Utxo>) -> Self {
        let backend = Self::default();
        *backend.utxos.lock().expect("mock lock") = utxos;
        backend
    }

    /// Fail the next ghost key calls with `errors`, in order.
    pub fn fail_ghost_calls(&self, errors: impl IntoIterator<Item = Error>) {
        self.ghost_failures
            .lock()
            .expect("mock lock")
            .extend(errors);
    }

    /// Delay every ghost key response.
    pub fn delay_ghost_calls(&self, delay: Duration) {
        *self.ghost_delay.lock().expect("mock lock") = Some(delay);
    }

    /// Answer ghost key batches with one entry missing.
    pub fn drop_last_ghost_key(&self) {
        *self.ghost_drop_last.lock().expect("mock lock") = true;
    }

    pub fn fail_submission(&self, error: Error) {
        *self.submission_failure.lock().expect("mock lock") = Some(error);
    }

    pub fn ghost_call_count(&self) -> usize {
        self.ghost_calls.load(Ordering::SeqCst)
    }

    pub fn ghost_batches(&self) -> Vec<(Vec<GhostRequest>, Vec<String>)> {
        self.ghost_batches.lock().expect("mock lock").clone()
    }

    pub fn utxo_queries(&self) -> Vec<UtxoQuery> {
        self.utxo_queries.lock().expect("mock lock").clone()
    }

    pub fn submissions(&self) -> Vec<SubmissionRequest> {
        self.submissions.lock().expect("mock lock").clone()
    }
}

#[async_trait]
impl UtxoSource for MockBackend {
    async fn list_unspent(&self, query: &UtxoQuery) -> Result<Vec<Utxo>> {
        self.utxo_queries
            .lock()
            .expect("mock lock")
            .push(query.clone());
        let mut wanted = query.members.clone();
        wanted.sort();
        let utxos = self.utxos.lock().expect("mock lock");
        Ok(utxos
            .iter()
            .filter(|u| {
                let mut receivers = u.receivers.clone();
                receivers.sort();
                u.asset_id == query.asset_id
                    && receivers == wanted
                    && u.receivers_threshold == query.threshold
            })
            .take(query.limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GhostKeyService for MockBackend {
    async fn fetch_ghost_keys(
        &self,
        requests: &[GhostRequest],
        senders: &[String],
    ) -> Result<Vec<GhostKeys>> {
        self.ghost_calls.fetch_add(1, Ordering::SeqCst);
        self.ghost_batches
            .lock()
            .expect("mock lock")
            .push((requests.to_vec(), senders.to_vec()));

        let delay = *self.ghost_delay.lock().expect("mock lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.ghost_failures.lock().expect("mock lock").pop_front();
        if let Some(err) = failure {
            return Err(err);
        }

        let mut keys: Vec<GhostKeys> = requests.iter().map(ghost_keys_for).collect();
        if *self.ghost_drop_last.lock().expect("mock lock") {
            keys.pop();
        }
        Ok(keys)
    }
}

#[async_trait]
impl SubmissionService for MockBackend {
    async fn create_transaction_requests(
        &self,
        requests: &[SubmissionRequest],
    ) -> Result<Vec<PendingRequest>> {
        self.submissions
            .lock()
            .expect("mock lock")
            .extend_from_slice(requests);

        let failure = self.submission_failure.lock().expect("mock lock").take();
        if let Some(err) = failure {
            return Err(err);
        }

        requests
            .iter()
            .map(|r| {
                let raw = hex::decode(&r.raw).map_err(|e| Error::submission(e.to_string(), false))?;
                Ok(PendingRequest {
                    request_id: r.request_id.clone(),
                    transaction_hash: Some(Hash::sha256(&raw).to_string()),
                    state: Some("initial".to_string()),
                })
            })
            .collect()
    }
}
