//! Block decoder.

use crate::error::{DecodeError, Layer, TapError};
use crate::hash::block_hash;
use crate::proto::{self, TRANSACTIONS_FILTER};
use crate::tx::{decode_layer, Tx};

/// A decoded block. Transactions keep the order of the block's data entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub number: u64,
    pub hash: Vec<u8>,
    pub previous_hash: Vec<u8>,
    pub data_hash: Vec<u8>,
    pub txs: Vec<Tx>,
}

impl Block {
    /// Decode a block received from the event source.
    ///
    /// Fails on the first transaction that does not decode; a partially
    /// decoded block is never returned.
    pub fn decode(raw: &proto::Block) -> Result<Self, TapError> {
        let header = raw.header.as_ref().ok_or(DecodeError::Missing {
            layer: Layer::Block,
            field: "header",
        })?;
        let hash = block_hash(header)?;

        let envelopes: &[Vec<u8>] = raw.data.as_ref().map(|d| d.data.as_slice()).unwrap_or(&[]);
        let codes: &[u8] = raw
            .metadata
            .as_ref()
            .and_then(|m| m.metadata.get(TRANSACTIONS_FILTER))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut txs = Vec::with_capacity(envelopes.len());
        for (index, envelope) in envelopes.iter().enumerate() {
            let code = *codes.get(index).ok_or(DecodeError::MissingValidationCode {
                block: header.number,
                index,
            })?;
            txs.push(Tx::decode(envelope, header.number, index, code)?);
        }

        Ok(Self {
            number: header.number,
            hash,
            previous_hash: header.previous_hash.clone(),
            data_hash: header.data_hash.clone(),
            txs,
        })
    }

    /// Decode a serialized `common.Block`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TapError> {
        let raw: proto::Block = decode_layer(Layer::Block, bytes)?;
        Self::decode(&raw)
    }

    /// Lowercase hex of the block hash.
    pub fn hash_hex(&self) -> String {
        hex::encode(&self.hash)
    }

    pub fn valid_tx_count(&self) -> usize {
        self.txs.iter().filter(|tx| tx.is_valid()).count()
    }
}
