use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::Integer;
use crate::error::{Error, Result};
use crate::hash::{Hash, Key};

pub const TX_MAGIC: [u8; 2] = [0x77, 0x77];
pub const TX_VERSION: u16 = 5;

/// Maximum number of inputs, and of outputs, in one transaction.
pub const MAX_SLICE_COUNT: usize = 256;

/// Maximum size of the extra (memo) field in bytes.
pub const EXTRA_SIZE_LIMIT: usize = 256;

const OPERATOR_CMP: u8 = 0xff;
const OPERATOR_SUM: u8 = 0xfe;

/// Output locking script.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Script(#[serde(with = "hex::serde")] Vec<u8>);

impl Script {
    /// M-of-N script: satisfied by `threshold` signatures from the owners.
    pub fn threshold(threshold: u8) -> Self {
        Self(vec![OPERATOR_CMP, OPERATOR_SUM, threshold])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OutputType {
    /// Locked by a threshold script. Every planned output uses this.
    Script = 0x00,
    /// Unlocked plain output, accepted when decoding.
    Plain = 0x01,
}

impl OutputType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(Self::Script),
            0x01 => Some(Self::Plain),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Reference to a spent UTXO, as carried in the encoded transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub hash: Hash,
    pub index: u16,
    pub asset: Hash,
    pub amount: Integer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub output_type: OutputType,
    pub amount: Integer,
    pub script: Script,
    /// One-time keys, one per receiver; empty until ghost keys are resolved.
    pub keys: Vec<Key>,
    pub mask: Option<Key>,
}

impl Output {
    pub fn new(amount: Integer, script: Script) -> Self {
        Self {
            output_type: OutputType::Script,
            amount,
            script,
            keys: Vec::new(),
            mask: None,
        }
    }

    pub fn is_keyed(&self) -> bool {
        !self.keys.is_empty() && self.mask.is_some()
    }
}

/// Finalized transaction in canonical form, ready to encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u16,
    pub hint: Uuid,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    #[serde(with = "hex::serde")]
    pub extra: Vec<u8>,
}

impl Transaction {
    /// SHA-256 over the canonical encoding.
    pub fn hash(&self) -> Result<Hash> {
        Ok(Hash::sha256(&self.dump()?))
    }

    pub fn input_total(&self) -> Result<Integer> {
        sum_integers(self.inputs.iter().map(|i| &i.amount))
    }

    pub fn output_total(&self) -> Result<Integer> {
        sum_integers(self.outputs.iter().map(|o| &o.amount))
    }
}

fn sum_integers<'a>(mut amounts: impl Iterator<Item = &'a Integer>) -> Result<Integer> {
    amounts.try_fold(Integer::default(), |acc, a| {
        acc.checked_add(a)
            .ok_or_else(|| Error::Serialization("amount total overflows".into()))
    })
}
