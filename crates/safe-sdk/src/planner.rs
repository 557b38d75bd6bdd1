use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::{Amount, Integer};
use crate::draft::DraftOutput;
use crate::error::{Error, Result};
use crate::transaction::{MAX_SLICE_COUNT, Output};
use crate::utxo::SourceSet;

/// An instruction to pay `amount` to `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub destination: Address,
    pub amount: Amount,
}

impl Payment {
    pub fn new(destination: Address, amount: Amount) -> Self {
        Self {
            destination,
            amount,
        }
    }
}

/// Turn `payments` into outputs, in order, with change to the source
/// address appended last when the inputs exceed the payments.
pub fn plan_outputs(source: &SourceSet, payments: &[Payment]) -> Result<Vec<DraftOutput>> {
    if let Some(zero) = payments.iter().position(|p| p.amount.is_zero()) {
        return Err(Error::InvalidAmount(format!("payment {zero} is zero")));
    }

    let spent = Amount::checked_sum(payments.iter().map(|p| &p.amount))
        .ok_or_else(|| Error::InvalidAmount("payment total overflows".into()))?;
    let remainder = source
        .total
        .checked_sub(&spent)
        .ok_or_else(|| Error::InsufficientFunds {
            required: spent.to_string(),
            available: source.total.to_string(),
        })?;

    let mut planned: Vec<Payment> = payments.to_vec();
    if !remainder.is_zero() {
        log::debug!("change of {remainder} returns to {}", source.address);
        planned.push(Payment::new(source.address.clone(), remainder));
    }
    if planned.len() > MAX_SLICE_COUNT {
        return Err(Error::TooManyOutputs(planned.len()));
    }

    planned
        .into_iter()
        .map(|payment| {
            let amount = Integer::from_amount(&payment.amount)?;
            let output = Output::new(amount, payment.destination.threshold_script());
            Ok(DraftOutput {
                destination: payment.destination,
                output,
            })
        })
        .collect()
}
