//! Canonical binary encoding of [`Transaction`].
//!
//! All integers are big-endian. The layout is fixed field order with no
//! padding, so identical transactions always encode to identical bytes:
//!
//! ```text
//! magic 0x7777 | version u16 | hint [16]
//! inputs  u16 n  { hash [32] | index u16 | asset [32] | amount Integer }
//! outputs u16 n  { type u16 | amount Integer | script u16+bytes
//!                  | keys u16 n {[32]} | mask [32] when keys > 0 }
//! extra   u32+bytes
//! ```
//!
//! `Integer` is a u16 byte length followed by the minimal big-endian
//! magnitude.

use uuid::Uuid;

use crate::amount::Integer;
use crate::error::{Error, Result};
use crate::hash::{Hash, Key};
use crate::transaction::{
    EXTRA_SIZE_LIMIT, Input, MAX_SLICE_COUNT, Output, OutputType, Script, TX_MAGIC, TX_VERSION,
    Transaction,
};

impl Transaction {
    /// Encode to the canonical byte layout.
    pub fn dump(&self) -> Result<Vec<u8>> {
        if self.inputs.len() > MAX_SLICE_COUNT {
            return Err(Error::TooManyInputs(self.inputs.len()));
        }
        if self.outputs.len() > MAX_SLICE_COUNT {
            return Err(Error::TooManyOutputs(self.outputs.len()));
        }
        if self.extra.len() > EXTRA_SIZE_LIMIT {
            return Err(Error::ExtraTooLong(self.extra.len()));
        }

        let mut enc = Encoder::default();
        enc.write(&TX_MAGIC);
        enc.write_u16(self.version);
        enc.write(self.hint.as_bytes());

        enc.write_u16(self.inputs.len() as u16);
        for input in &self.inputs {
            enc.write(input.hash.as_bytes());
            enc.write_u16(input.index);
            enc.write(input.asset.as_bytes());
            enc.write_integer(&input.amount);
        }

        enc.write_u16(self.outputs.len() as u16);
        for (i, output) in self.outputs.iter().enumerate() {
            enc.write_output(i, output)?;
        }

        enc.write_u32(self.extra.len() as u32);
        enc.write(&self.extra);
        Ok(enc.buf)
    }

    pub fn dump_hex(&self) -> Result<String> {
        Ok(hex::encode(self.dump()?))
    }

    /// Decode the canonical layout, rejecting anything that would not
    /// re-encode to the same bytes.
    pub fn from_raw(raw: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(raw);

        if dec.read::<2>()? != TX_MAGIC {
            return Err(Error::Serialization("bad transaction magic".into()));
        }
        let version = dec.read_u16()?;
        if version != TX_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported transaction version {version}"
            )));
        }
        let hint = Uuid::from_bytes(dec.read::<16>()?);

        let input_count = usize::from(dec.read_u16()?);
        if input_count > MAX_SLICE_COUNT {
            return Err(Error::TooManyInputs(input_count));
        }
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(Input {
                hash: Hash(dec.read::<32>()?),
                index: dec.read_u16()?,
                asset: Hash(dec.read::<32>()?),
                amount: dec.read_integer()?,
            });
        }

        let output_count = usize::from(dec.read_u16()?);
        if output_count > MAX_SLICE_COUNT {
            return Err(Error::TooManyOutputs(output_count));
        }
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(dec.read_output()?);
        }

        let extra_len = dec.read_u32()? as usize;
        if extra_len > EXTRA_SIZE_LIMIT {
            return Err(Error::ExtraTooLong(extra_len));
        }
        let extra = dec.read_bytes(extra_len)?.to_vec();

        if !dec.is_empty() {
            return Err(Error::Serialization(format!(
                "{} trailing bytes after transaction",
                dec.remaining()
            )));
        }

        Ok(Transaction {
            version,
            hint,
            inputs,
            outputs,
            extra,
        })
    }

    pub fn from_hex(raw_hex: &str) -> Result<Self> {
        let raw = hex::decode(raw_hex.trim())
            .map_err(|e| Error::Serialization(format!("bad transaction hex: {e}")))?;
        Self::from_raw(&raw)
    }
}

#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn write_u16(&mut self, v: u16) {
        self.write(&v.to_be_bytes());
    }

    fn write_u32(&mut self, v: u32) {
        self.write(&v.to_be_bytes());
    }

    fn write_integer(&mut self, v: &Integer) {
        let magnitude = v.magnitude_bytes();
        self.write_u16(magnitude.len() as u16);
        self.write(&magnitude);
    }

    fn write_output(&mut self, index: usize, output: &Output) -> Result<()> {
        if output.keys.is_empty() != output.mask.is_none() {
            return Err(Error::Serialization(format!(
                "output {index}: keys and mask must be present together"
            )));
        }
        let script = output.script.as_bytes();
        if script.len() > usize::from(u16::MAX) || output.keys.len() > usize::from(u16::MAX) {
            return Err(Error::Serialization(format!("output {index}: field too long")));
        }

        self.write_u16(u16::from(output.output_type.as_u8()));
        self.write_integer(&output.amount);
        self.write_u16(script.len() as u16);
        self.write(script);
        self.write_u16(output.keys.len() as u16);
        for key in &output.keys {
            self.write(key.as_bytes());
        }
        if let Some(mask) = &output.mask {
            self.write(mask.as_bytes());
        }
        Ok(())
    }
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Serialization(format!(
                "truncated transaction: need {n} bytes at offset {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read::<2>()?))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read::<4>()?))
    }

    fn read_integer(&mut self) -> Result<Integer> {
        let len = usize::from(self.read_u16()?);
        Integer::from_magnitude_bytes(self.read_bytes(len)?)
    }

    fn read_output(&mut self) -> Result<Output> {
        let type_code = self.read_u16()?;
        let output_type = u8::try_from(type_code)
            .ok()
            .and_then(OutputType::from_u8)
            .ok_or_else(|| Error::Serialization(format!("unknown output type {type_code:#06x}")))?;
        let amount = self.read_integer()?;
        let script_len = usize::from(self.read_u16()?);
        let script = Script::from_bytes(self.read_bytes(script_len)?.to_vec());

        let key_count = usize::from(self.read_u16()?);
        let mut keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            keys.push(Key(self.read::<32>()?));
        }
        let mask = if key_count > 0 {
            Some(Key(self.read::<32>()?))
        } else {
            None
        };

        Ok(Output {
            output_type,
            amount,
            script,
            keys,
            mask,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transaction() -> Transaction {
        let mut keyed = Output::new(Integer::from_units(700_000_000), Script::threshold(2));
        keyed.keys = vec![Key([0x21; 32]), Key([0x22; 32])];
        keyed.mask = Some(Key([0x2f; 32]));

        Transaction {
            version: TX_VERSION,
            hint: Uuid::from_bytes([0x44; 16]),
            inputs: vec![Input {
                hash: Hash([0xaa; 32]),
                index: 3,
                asset: Hash([0xbb; 32]),
                amount: Integer::from_units(1_000_000_000),
            }],
            outputs: vec![
                Output::new(Integer::from_units(300_000_000), Script::threshold(1)),
                keyed,
            ],
            extra: b"memo".to_vec(),
        }
    }

    #[test]
    fn layout_of_header_and_first_input() {
        let raw = sample_transaction().dump().unwrap();
        assert_eq!(&raw[0..2], &[0x77, 0x77]);
        assert_eq!(&raw[2..4], &[0x00, 0x05]);
        assert_eq!(&raw[4..20], &[0x44; 16]);
        assert_eq!(&raw[20..22], &[0x00, 0x01]);
        assert_eq!(&raw[22..54], &[0xaa; 32]);
        assert_eq!(&raw[54..56], &[0x00, 0x03]);
        assert_eq!(&raw[56..88], &[0xbb; 32]);
        // 1_000_000_000 = 0x3b9aca00
        assert_eq!(&raw[88..94], &[0x00, 0x04, 0x3b, 0x9a, 0xca, 0x00]);
        assert!(raw.ends_with(&[0x00, 0x00, 0x00, 0x04, b'm', b'e', b'm', b'o']));
    }

    #[test]
    fn encoding_is_deterministic_and_decodable() {
        let tx = sample_transaction();
        let a = tx.dump().unwrap();
        let b = tx.clone().dump().unwrap();
        assert_eq!(a, b);
        assert_eq!(Transaction::from_raw(&a).unwrap(), tx);
        assert_eq!(Transaction::from_hex(&tx.dump_hex().unwrap()).unwrap(), tx);
    }

    #[test]
    fn keys_without_mask_cannot_be_encoded() {
        let mut tx = sample_transaction();
        tx.outputs[1].mask = None;
        assert!(matches!(tx.dump(), Err(Error::Serialization(_))));
    }

    #[test]
    fn limits_are_enforced() {
        let mut tx = sample_transaction();
        tx.extra = vec![0; EXTRA_SIZE_LIMIT + 1];
        assert!(matches!(tx.dump(), Err(Error::ExtraTooLong(257))));

        let mut tx = sample_transaction();
        tx.outputs = vec![tx.outputs[0].clone(); MAX_SLICE_COUNT + 1];
        assert!(matches!(tx.dump(), Err(Error::TooManyOutputs(257))));
    }

    #[test]
    fn decoder_rejects_malformed_input() {
        let raw = sample_transaction().dump().unwrap();

        assert!(Transaction::from_raw(&raw[..raw.len() - 1]).is_err());

        let mut trailing = raw.clone();
        trailing.push(0);
        assert!(Transaction::from_raw(&trailing).is_err());

        let mut bad_magic = raw.clone();
        bad_magic[0] = 0x00;
        assert!(Transaction::from_raw(&bad_magic).is_err());

        let mut bad_version = raw;
        bad_version[3] = 0x04;
        assert!(Transaction::from_raw(&bad_version).is_err());
    }
}
