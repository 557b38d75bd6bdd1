use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::transaction::MAX_SLICE_COUNT;

/// Upper bound the lookup service accepts for one page of outputs.
pub const MAX_QUERY_LIMIT: usize = 10_000;

/// A spendable output as reported by the lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Opaque output identifier, the seed for the submission request id.
    pub output_id: String,
    pub transaction_hash: Hash,
    pub output_index: u16,
    /// Application-level asset identifier.
    pub asset_id: String,
    /// Ledger asset hash written into transaction inputs.
    pub kernel_asset_id: Hash,
    pub amount: Amount,
    pub receivers: Vec<String>,
    pub receivers_threshold: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Utxo {
    /// The address this output is locked to.
    pub fn address(&self) -> Result<Address> {
        Address::from_member_ids(&self.receivers, self.receivers_threshold)
    }
}

/// Result of validating a UTXO set: where it is locked, what it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    pub address: Address,
    pub asset: Hash,
    pub total: Amount,
}

/// Check that `utxos` share one address and one asset, and total them.
///
/// The first UTXO fixes the source address; any later UTXO locked
/// elsewhere is reported with its position.
pub fn validate_utxo_set(utxos: &[Utxo]) -> Result<SourceSet> {
    let first = utxos.first().ok_or(Error::EmptyUtxoSet)?;
    let address = first.address()?;
    let asset = first.kernel_asset_id;
    let mut total = first.amount;

    for (index, utxo) in utxos.iter().enumerate().skip(1) {
        let found = utxo.address()?;
        if found != address {
            return Err(Error::InconsistentSourceAddress {
                index,
                expected: address.to_string(),
                found: found.to_string(),
            });
        }
        if utxo.kernel_asset_id != asset {
            return Err(Error::MixedAssets { index });
        }
        total = total
            .checked_add(&utxo.amount)
            .ok_or_else(|| Error::InvalidAmount("input total overflows".into()))?;
    }

    Ok(SourceSet {
        address,
        asset,
        total,
    })
}

/// Take UTXOs in the given order until they cover `target`.
pub fn select_utxos(utxos: Vec<Utxo>, target: &Amount) -> Result<Vec<Utxo>> {
    if utxos.is_empty() {
        return Err(Error::EmptyUtxoSet);
    }

    let mut selected = Vec::new();
    let mut total = Amount::ZERO;
    for utxo in utxos {
        total = total
            .checked_add(&utxo.amount)
            .ok_or_else(|| Error::InvalidAmount("input total overflows".into()))?;
        selected.push(utxo);
        if total >= *target {
            break;
        }
    }

    if total < *target {
        return Err(Error::InsufficientFunds {
            required: target.to_string(),
            available: total.to_string(),
        });
    }
    if selected.len() > MAX_SLICE_COUNT {
        return Err(Error::TooManyInputs(selected.len()));
    }
    Ok(selected)
}

/// Unspent outputs of one asset locked to one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoQuery {
    pub asset_id: String,
    pub members: Vec<String>,
    pub threshold: u8,
    pub limit: usize,
}

impl UtxoQuery {
    pub fn new(asset_id: impl Into<String>, members: Vec<String>, threshold: u8) -> Self {
        Self {
            asset_id: asset_id.into(),
            members,
            threshold,
            limit: MAX_QUERY_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, MAX_QUERY_LIMIT);
        self
    }

    /// Member-set digest the lookup service indexes outputs by: hex SHA3-256
    /// of the sorted identities concatenated.
    pub fn members_hash(&self) -> String {
        let mut members = self.members.clone();
        members.sort();
        Hash::sha3_256(members.concat().as_bytes()).to_string()
    }
}

/// Source of unspent outputs.
#[async_trait]
pub trait UtxoSource: Send + Sync {
    /// Unspent outputs matching `query`, in the service's order.
    async fn list_unspent(&self, query: &UtxoQuery) -> Result<Vec<Utxo>>;
}

#[cfg(test)]
mod tests {
    use rand::seq::SliceRandom;

    use super::*;

    const M1: &str = "11111111-1111-4111-8111-111111111111";
    const M2: &str = "22222222-2222-4222-8222-222222222222";

    fn utxo(n: u8, amount: &str, receivers: &[&str], threshold: u8) -> Utxo {
        Utxo {
            output_id: format!("00000000-0000-4000-8000-0000000000{n:02x}"),
            transaction_hash: Hash([n; 32]),
            output_index: u16::from(n),
            asset_id: "c6d0c728-2624-429b-8e0d-d9d19b6592fa".into(),
            kernel_asset_id: Hash([0xa5; 32]),
            amount: amount.parse().unwrap(),
            receivers: receivers.iter().map(|s| s.to_string()).collect(),
            receivers_threshold: threshold,
            state: Some("unspent".into()),
        }
    }

    #[test]
    fn empty_set_is_rejected() {
        assert!(matches!(validate_utxo_set(&[]), Err(Error::EmptyUtxoSet)));
    }

    #[test]
    fn total_is_independent_of_order() {
        let mut utxos = vec![
            utxo(1, "0.1", &[M1, M2], 2),
            utxo(2, "2.00000001", &[M1, M2], 2),
            utxo(3, "7.5", &[M1, M2], 2),
            utxo(4, "1000", &[M1, M2], 2),
            utxo(5, "0.00000009", &[M1, M2], 2),
        ];
        let expected: Amount = "1009.6000001".parse().unwrap();

        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            utxos.shuffle(&mut rng);
            let source = validate_utxo_set(&utxos).unwrap();
            assert_eq!(source.total, expected);
            assert_eq!(source.address, Address::from_member_ids(&[M1, M2], 2).unwrap());
        }
    }

    #[test]
    fn differing_address_reports_position() {
        let utxos = vec![
            utxo(1, "1", &[M1, M2], 2),
            utxo(2, "1", &[M1, M2], 2),
            utxo(3, "1", &[M1, M2], 1),
        ];
        match validate_utxo_set(&utxos) {
            Err(Error::InconsistentSourceAddress {
                index,
                expected,
                found,
            }) => {
                assert_eq!(index, 2);
                assert_ne!(expected, found);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn mixed_assets_are_rejected() {
        let mut other = utxo(2, "1", &[M1], 1);
        other.kernel_asset_id = Hash([0x5a; 32]);
        let utxos = vec![utxo(1, "1", &[M1], 1), other];
        assert!(matches!(
            validate_utxo_set(&utxos),
            Err(Error::MixedAssets { index: 1 })
        ));
    }

    #[test]
    fn selection_stops_once_target_is_covered() {
        let utxos = vec![
            utxo(1, "1", &[M1], 1),
            utxo(2, "2", &[M1], 1),
            utxo(3, "4", &[M1], 1),
        ];
        let selected = select_utxos(utxos.clone(), &"2.5".parse().unwrap()).unwrap();
        assert_eq!(selected.len(), 2);

        let all = select_utxos(utxos.clone(), &"7".parse().unwrap()).unwrap();
        assert_eq!(all.len(), 3);

        assert!(matches!(
            select_utxos(utxos, &"7.00000001".parse().unwrap()),
            Err(Error::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn members_hash_ignores_order() {
        let a = UtxoQuery::new("asset", vec![M1.into(), M2.into()], 1);
        let b = UtxoQuery::new("asset", vec![M2.into(), M1.into()], 1);
        assert_eq!(a.members_hash(), b.members_hash());
        assert_eq!(
            a.members_hash(),
            "86d879ee329012adcaced3957c1bbb6c10dce1cd23ea20ef71db8180cad8a2a5"
        );
        assert_eq!(a.clone().with_limit(0).limit, 1);
        assert_eq!(a.with_limit(50_000).limit, MAX_QUERY_LIMIT);
    }
}
