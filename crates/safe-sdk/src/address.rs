use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::transaction::Script;

/// Prefix of every rendered address.
pub const ADDRESS_PREFIX: &str = "MIX";
const ADDRESS_VERSION: u8 = 2;
const CHECKSUM_LEN: usize = 4;
const OPAQUE_KEY_LEN: usize = 64;

/// Public spend + view key pair of a script-only recipient.
pub type OpaqueKey = [u8; OPAQUE_KEY_LEN];

/// A multisig destination.
///
/// `Members` names its owners by identity, so outputs paying it must be
/// masked with one-time ghost keys. `Opaque` recipients are bare key pairs
/// with nothing to hide.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Members { members: Vec<Uuid>, threshold: u8 },
    Opaque { keys: Vec<OpaqueKey>, threshold: u8 },
}

impl Address {
    pub fn from_members(members: Vec<Uuid>, threshold: u8) -> Result<Self> {
        check_threshold(members.len(), threshold)?;
        let mut seen = HashSet::with_capacity(members.len());
        if let Some(dup) = members.iter().find(|m| !seen.insert(**m)) {
            return Err(Error::InvalidAddress(format!("duplicate member {dup}")));
        }
        Ok(Address::Members { members, threshold })
    }

    /// Parse identity strings as returned by the UTXO lookup service.
    pub fn from_member_ids<S: AsRef<str>>(members: &[S], threshold: u8) -> Result<Self> {
        let members = members
            .iter()
            .map(|m| {
                Uuid::parse_str(m.as_ref())
                    .map_err(|e| Error::InvalidAddress(format!("member {:?}: {e}", m.as_ref())))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_members(members, threshold)
    }

    pub fn from_opaque_keys(keys: Vec<OpaqueKey>, threshold: u8) -> Result<Self> {
        check_threshold(keys.len(), threshold)?;
        let mut seen = HashSet::with_capacity(keys.len());
        if keys.iter().any(|k| !seen.insert(*k)) {
            return Err(Error::InvalidAddress("duplicate opaque key".into()));
        }
        Ok(Address::Opaque { keys, threshold })
    }

    pub fn threshold(&self) -> u8 {
        match self {
            Address::Members { threshold, .. } | Address::Opaque { threshold, .. } => *threshold,
        }
    }

    /// Identity strings in address order; empty for opaque destinations.
    pub fn members(&self) -> Vec<String> {
        match self {
            Address::Members { members, .. } => members.iter().map(Uuid::to_string).collect(),
            Address::Opaque { .. } => Vec::new(),
        }
    }

    /// True when outputs to this address need ghost keys.
    pub fn requires_masking(&self) -> bool {
        matches!(self, Address::Members { .. })
    }

    pub fn threshold_script(&self) -> Script {
        Script::threshold(self.threshold())
    }

    fn payload(&self) -> Vec<u8> {
        let (count, body): (usize, Vec<u8>) = match self {
            Address::Members { members, .. } => (
                members.len(),
                members.iter().flat_map(|m| *m.as_bytes()).collect(),
            ),
            Address::Opaque { keys, .. } => (keys.len(), keys.concat()),
        };
        let mut payload = Vec::with_capacity(3 + body.len());
        payload.push(ADDRESS_VERSION);
        payload.push(self.threshold());
        // count <= 255 is enforced at construction
        payload.push(count as u8);
        payload.extend_from_slice(&body);
        payload
    }
}

fn check_threshold(count: usize, threshold: u8) -> Result<()> {
    if count == 0 || count > usize::from(u8::MAX) {
        return Err(Error::InvalidAddress(format!(
            "member count {count} outside 1..=255"
        )));
    }
    if threshold == 0 || usize::from(threshold) > count {
        return Err(Error::InvalidAddress(format!(
            "threshold {threshold} outside 1..={count}"
        )));
    }
    Ok(())
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut data = Vec::with_capacity(ADDRESS_PREFIX.len() + payload.len());
    data.extend_from_slice(ADDRESS_PREFIX.as_bytes());
    data.extend_from_slice(payload);
    let digest = Hash::sha3_256(&data);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest.as_bytes()[..CHECKSUM_LEN]);
    out
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut data = self.payload();
        let sum = checksum(&data);
        data.extend_from_slice(&sum);
        write!(f, "{ADDRESS_PREFIX}{}", bs58::encode(data).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let encoded = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or_else(|| Error::InvalidAddress(format!("missing {ADDRESS_PREFIX} prefix")))?;
        let data = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| Error::InvalidAddress(format!("base58: {e}")))?;
        if data.len() < 3 + CHECKSUM_LEN {
            return Err(Error::InvalidAddress("address too short".into()));
        }

        let (payload, sum) = data.split_at(data.len() - CHECKSUM_LEN);
        if checksum(payload) != sum {
            return Err(Error::InvalidAddress("checksum mismatch".into()));
        }
        if payload[0] != ADDRESS_VERSION {
            return Err(Error::InvalidAddress(format!(
                "unsupported version {}",
                payload[0]
            )));
        }

        let threshold = payload[1];
        let count = usize::from(payload[2]);
        let body = &payload[3..];
        if count > 0 && body.len() == count * 16 {
            let members = body
                .chunks_exact(16)
                .map(|c| Uuid::from_slice(c).map_err(|e| Error::InvalidAddress(e.to_string())))
                .collect::<Result<Vec<_>>>()?;
            Self::from_members(members, threshold)
        } else if count > 0 && body.len() == count * OPAQUE_KEY_LEN {
            let keys = body
                .chunks_exact(OPAQUE_KEY_LEN)
                .map(|c| {
                    let mut key = [0u8; OPAQUE_KEY_LEN];
                    key.copy_from_slice(c);
                    key
                })
                .collect();
            Self::from_opaque_keys(keys, threshold)
        } else {
            Err(Error::InvalidAddress(format!(
                "{} payload bytes do not match {count} recipients",
                body.len()
            )))
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
