use safe_sdk::{
    Address, Amount, GhostKeyService, Payment, PendingRequest, RetryPolicy, SubmissionService,
    Transaction, TransactionBuilder, UtxoQuery, UtxoSource, select_utxos, submit_transaction,
};
use serde::Serialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, Result};

/// A single-asset payment from the caller's own outputs.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub asset_id: String,
    pub amount: Amount,
    /// Falls back to the configured group.
    pub destination: Option<Address>,
    pub memo: Option<String>,
    /// Fixed transaction hint, for reproducible builds.
    pub hint: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub request_id: String,
    pub raw_hex: String,
    pub transaction_hash: String,
    pub pending: PendingRequest,
}

/// Runs the whole transfer: look up outputs, select, build, verify, submit.
///
/// Every collaborator is passed in; the service holds no global state.
pub struct TransferService<B> {
    backend: B,
    user_id: String,
    operation_tag: String,
    utxo_limit: usize,
    retry: RetryPolicy,
    group: Option<Address>,
}

impl<B> TransferService<B>
where
    B: UtxoSource + GhostKeyService + SubmissionService,
{
    pub fn new(backend: B, user_id: impl Into<String>) -> Self {
        let defaults = AppConfig::default();
        let retry = defaults.retry_policy();
        Self {
            backend,
            user_id: user_id.into(),
            operation_tag: defaults.operation_tag,
            utxo_limit: defaults.utxo_limit,
            retry,
            group: None,
        }
    }

    pub fn from_config(backend: B, config: &AppConfig) -> Result<Self> {
        let user_id = config
            .user_id
            .clone()
            .ok_or_else(|| AppError::Input("config has no user_id".into()))?;
        Ok(Self {
            backend,
            user_id,
            operation_tag: config.operation_tag.clone(),
            utxo_limit: config.utxo_limit,
            retry: config.retry_policy(),
            group: config.group_address()?,
        })
    }

    pub fn with_group(mut self, group: Address) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferOutcome> {
        let destination = request
            .destination
            .or_else(|| self.group.clone())
            .ok_or_else(|| AppError::Input("no destination and no group configured".into()))?;
        if request.amount.is_zero() {
            return Err(AppError::Input("amount must be positive".into()));
        }

        let query = UtxoQuery::new(&request.asset_id, vec![self.user_id.clone()], 1)
            .with_limit(self.utxo_limit);
        let unspent = self.backend.list_unspent(&query).await?;
        log::info!(
            "found {} unspent outputs of {}",
            unspent.len(),
            request.asset_id
        );
        let inputs = select_utxos(unspent, &request.amount)?;

        let mut builder = TransactionBuilder::new(inputs)
            .with_operation_tag(self.operation_tag.clone())
            .with_retry_policy(self.retry.clone());
        if let Some(hint) = request.hint {
            builder = builder.with_hint(hint);
        }
        if let Some(memo) = request.memo {
            builder = builder.with_memo(memo);
        }
        let built = builder
            .make_transaction(
                &self.backend,
                &[Payment::new(destination, request.amount)],
            )
            .await?;

        let decoded = Transaction::from_raw(&built.raw)?;
        if decoded != built.transaction {
            return Err(safe_sdk::Error::Serialization(
                "raw transaction does not decode to what was built".into(),
            )
            .into());
        }

        let pending = submit_transaction(&self.backend, &built).await?;
        Ok(TransferOutcome {
            request_id: built.request_id.to_string(),
            raw_hex: built.raw_hex(),
            transaction_hash: built.hash().to_string(),
            pending,
        })
    }
}
