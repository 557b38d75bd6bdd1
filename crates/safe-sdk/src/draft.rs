use uuid::Uuid;

use crate::address::Address;
use crate::amount::Integer;
use crate::error::{Error, Result};
use crate::planner::{Payment, plan_outputs};
use crate::transaction::{
    EXTRA_SIZE_LIMIT, Input, MAX_SLICE_COUNT, Output, TX_VERSION, Transaction,
};
use crate::utxo::{SourceSet, Utxo, validate_utxo_set};

/// A planned output together with the destination it pays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftOutput {
    pub destination: Address,
    pub output: Output,
}

/// Accumulating state of one transaction construction.
///
/// Created from a validated UTXO set, extended by the planner, keyed by
/// the ghost key resolver, then consumed by [`TransactionDraft::finalize`].
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub(crate) hint: Uuid,
    pub(crate) source: SourceSet,
    pub(crate) inputs: Vec<Utxo>,
    pub(crate) outputs: Vec<DraftOutput>,
    pub(crate) extra: Vec<u8>,
}

impl TransactionDraft {
    /// Validate `utxos` and open a draft spending all of them.
    pub fn new(hint: Uuid, utxos: Vec<Utxo>) -> Result<Self> {
        let source = validate_utxo_set(&utxos)?;
        if utxos.len() > MAX_SLICE_COUNT {
            return Err(Error::TooManyInputs(utxos.len()));
        }
        Ok(Self {
            hint,
            source,
            inputs: utxos,
            outputs: Vec::new(),
            extra: Vec::new(),
        })
    }

    pub fn hint(&self) -> Uuid {
        self.hint
    }

    pub fn source(&self) -> &SourceSet {
        &self.source
    }

    pub fn inputs(&self) -> &[Utxo] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[DraftOutput] {
        &self.outputs
    }

    pub fn set_extra(&mut self, extra: Vec<u8>) -> Result<()> {
        if extra.len() > EXTRA_SIZE_LIMIT {
            return Err(Error::ExtraTooLong(extra.len()));
        }
        self.extra = extra;
        Ok(())
    }

    /// Append the outputs for `payments`, plus change.
    pub fn plan(&mut self, payments: &[Payment]) -> Result<()> {
        if !self.outputs.is_empty() {
            return Err(Error::Serialization("draft outputs already planned".into()));
        }
        self.outputs = plan_outputs(&self.source, payments)?;
        Ok(())
    }

    /// Convert to the canonical transaction.
    ///
    /// Checks, in order: slice limits, every masked destination keyed,
    /// inputs representable, inputs and outputs balancing exactly.
    pub fn finalize(self) -> Result<Transaction> {
        if self.inputs.len() > MAX_SLICE_COUNT {
            return Err(Error::TooManyInputs(self.inputs.len()));
        }
        if self.outputs.len() > MAX_SLICE_COUNT {
            return Err(Error::TooManyOutputs(self.outputs.len()));
        }

        if let Some(index) = self
            .outputs
            .iter()
            .position(|o| o.destination.requires_masking() && !o.output.is_keyed())
        {
            return Err(Error::Serialization(format!(
                "output {index} pays literal members but has no ghost keys"
            )));
        }

        let inputs = self
            .inputs
            .iter()
            .map(|utxo| {
                let amount = Integer::from_amount(&utxo.amount).map_err(|_| {
                    Error::Serialization(format!(
                        "input {}:{} amount {} not representable",
                        utxo.transaction_hash, utxo.output_index, utxo.amount
                    ))
                })?;
                Ok(Input {
                    hash: utxo.transaction_hash,
                    index: utxo.output_index,
                    asset: utxo.kernel_asset_id,
                    amount,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let transaction = Transaction {
            version: TX_VERSION,
            hint: self.hint,
            inputs,
            outputs: self.outputs.into_iter().map(|o| o.output).collect(),
            extra: self.extra,
        };

        let input_total = transaction.input_total()?;
        let output_total = transaction.output_total()?;
        if input_total != output_total {
            return Err(Error::Serialization(format!(
                "unbalanced transaction: inputs {input_total}, outputs {output_total}"
            )));
        }
        Ok(transaction)
    }
}
