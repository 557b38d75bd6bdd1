use uuid::Uuid;

use crate::address::Address;
use crate::draft::TransactionDraft;
use crate::error::{Error, Result};
use crate::ghost::{GhostKeyService, RetryPolicy, resolve_ghost_keys};
use crate::hash::Hash;
use crate::idempotency::{DEFAULT_OPERATION_TAG, request_id};
use crate::planner::Payment;
use crate::submission::SubmissionRequest;
use crate::transaction::Transaction;
use crate::utxo::Utxo;

/// A constructed transaction ready for signing and submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltTransaction {
    pub transaction: Transaction,
    pub raw: Vec<u8>,
    pub request_id: Uuid,
    pub source: Address,
}

impl BuiltTransaction {
    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw)
    }

    pub fn hash(&self) -> Hash {
        Hash::sha256(&self.raw)
    }

    pub fn submission_request(&self) -> SubmissionRequest {
        SubmissionRequest {
            request_id: self.request_id.to_string(),
            raw: self.raw_hex(),
        }
    }
}

/// Builds one transaction spending a fixed UTXO set.
///
/// Stages run strictly in order: validate inputs, plan outputs, resolve
/// ghost keys, serialize, derive the request id.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    utxos: Vec<Utxo>,
    hint: Uuid,
    memo: Vec<u8>,
    operation_tag: String,
    retry: RetryPolicy,
}

impl TransactionBuilder {
    pub fn new(utxos: Vec<Utxo>) -> Self {
        Self {
            utxos,
            hint: Uuid::new_v4(),
            memo: Vec::new(),
            operation_tag: DEFAULT_OPERATION_TAG.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Fix the transaction hint instead of drawing a random one.
    pub fn with_hint(mut self, hint: Uuid) -> Self {
        self.hint = hint;
        self
    }

    /// Opaque memo stored as the transaction extra.
    pub fn with_memo(mut self, memo: impl Into<Vec<u8>>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn with_operation_tag(mut self, tag: impl Into<String>) -> Self {
        self.operation_tag = tag.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn make_transaction<G>(self, ghost: &G, payments: &[Payment]) -> Result<BuiltTransaction>
    where
        G: GhostKeyService + ?Sized,
    {
        let first_output_id = self
            .utxos
            .first()
            .map(|u| u.output_id.clone())
            .ok_or(Error::EmptyUtxoSet)?;

        let mut draft = TransactionDraft::new(self.hint, self.utxos)?;
        draft.set_extra(self.memo)?;
        log::debug!(
            "validated {} inputs totalling {} from {}",
            draft.inputs().len(),
            draft.source().total,
            draft.source().address
        );

        draft.plan(payments)?;
        log::debug!("planned {} outputs", draft.outputs().len());

        resolve_ghost_keys(ghost, &mut draft, &self.retry).await?;

        let source = draft.source().address.clone();
        let transaction = draft.finalize()?;
        let raw = transaction.dump()?;
        let request_id = request_id(&first_output_id, &self.operation_tag);

        log::info!(
            "built transaction {} ({} bytes), request {request_id}",
            Hash::sha256(&raw),
            raw.len()
        );
        Ok(BuiltTransaction {
            transaction,
            raw,
            request_id,
            source,
        })
    }
}
