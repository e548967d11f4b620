//! Transaction decoder.
//!
//! [`Tx::decode`] peels an envelope layer by layer (envelope → payload →
//! channel header → signature header → transaction) and stops at the first
//! layer that fails. Chaincode-level structures are decoded lazily by the
//! accessor methods, each of which can fail on its own sub-payload without
//! touching the layers already validated.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use prost::Message;

use crate::error::{DecodeError, Layer};
use crate::proto::{
    self, ChaincodeAction, ChaincodeActionPayload, ChaincodeEvent, ChaincodeInvocationSpec,
    ChannelHeader, KvRwSet, SerializedIdentity, SignatureHeader, Timestamp, Transaction,
    TxReadWriteSet,
};
use crate::types::{format_timestamp, timestamp_utc, HeaderType, ValidationCode};

/// Decode `bytes` as `M`, tagging failures with `layer`.
pub(crate) fn decode_layer<M: Message + Default>(
    layer: Layer,
    bytes: &[u8],
) -> Result<M, DecodeError> {
    M::decode(bytes).map_err(|source| DecodeError::Malformed { layer, source })
}

/// A decoded transaction within a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Tx {
    /// Number of the block that carries this transaction.
    pub block_number: u64,
    /// Zero-based position within the block.
    pub index: usize,
    pub channel_header: ChannelHeader,
    /// `None` when the payload header carries no signature header bytes.
    pub signature_header: Option<SignatureHeader>,
    /// Only present for endorser transactions.
    pub transaction: Option<Transaction>,
    /// Taken from the block metadata, never from the envelope.
    pub validation_code: ValidationCode,
}

impl Tx {
    /// Decode a single transaction envelope.
    pub fn decode(
        envelope: &[u8],
        block_number: u64,
        index: usize,
        validation_byte: u8,
    ) -> Result<Self, DecodeError> {
        let envelope: proto::Envelope = decode_layer(Layer::Envelope, envelope)?;
        let payload: proto::Payload = decode_layer(Layer::Payload, &envelope.payload)?;
        let header = payload.header.as_ref().ok_or(DecodeError::Missing {
            layer: Layer::Payload,
            field: "header",
        })?;

        let channel_header: ChannelHeader =
            decode_layer(Layer::ChannelHeader, &header.channel_header)?;

        let signature_header = if header.signature_header.is_empty() {
            None
        } else {
            Some(decode_layer::<SignatureHeader>(
                Layer::SignatureHeader,
                &header.signature_header,
            )?)
        };

        let transaction = if HeaderType::from_i32(channel_header.r#type)
            == HeaderType::EndorserTransaction
        {
            Some(decode_layer::<Transaction>(Layer::Transaction, &payload.data)?)
        } else {
            None
        };

        Ok(Self {
            block_number,
            index,
            channel_header,
            signature_header,
            transaction,
            validation_code: ValidationCode::from_byte(validation_byte),
        })
    }

    /// Transaction ID.
    pub fn id(&self) -> &str {
        &self.channel_header.tx_id
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_header.channel_id
    }

    pub fn header_type(&self) -> HeaderType {
        HeaderType::from_i32(self.channel_header.r#type)
    }

    pub fn is_valid(&self) -> bool {
        self.validation_code.is_valid()
    }

    /// Returns `true` for a valid endorser transaction.
    pub fn is_valid_endorser(&self) -> bool {
        self.is_valid() && self.header_type() == HeaderType::EndorserTransaction
    }

    /// The channel header timestamp (zero when absent).
    pub fn timestamp(&self) -> Timestamp {
        self.channel_header.timestamp.unwrap_or_default()
    }

    pub fn utc(&self) -> Option<DateTime<Utc>> {
        timestamp_utc(&self.timestamp())
    }

    /// Timestamp as fixed-width RFC 3339 with nanoseconds.
    pub fn timestamp_string(&self) -> String {
        format_timestamp(&self.timestamp())
    }

    // ─── On-demand decoding ──────────────────────────────────────────────────

    /// Decode the creator identity from the signature header.
    pub fn creator_identity(&self) -> Result<Option<SerializedIdentity>, DecodeError> {
        match &self.signature_header {
            Some(sh) => decode_layer(Layer::SerializedIdentity, &sh.creator).map(Some),
            None => Ok(None),
        }
    }

    /// MSP ID of the creator, or an empty string if it cannot be decoded.
    pub fn msp_id(&self) -> String {
        match self.creator_identity() {
            Ok(Some(identity)) => identity.mspid,
            _ => String::new(),
        }
    }

    /// The first action's payload of an endorser transaction.
    fn first_action_payload(&self) -> Result<Option<ChaincodeActionPayload>, DecodeError> {
        if self.header_type() != HeaderType::EndorserTransaction {
            return Ok(None);
        }
        let Some(action) = self.transaction.as_ref().and_then(|t| t.actions.first()) else {
            return Ok(None);
        };
        decode_layer(Layer::ChaincodeActionPayload, &action.payload).map(Some)
    }

    /// Chaincode name and arguments the transaction was invoked with.
    pub fn chaincode_invocation_spec(
        &self,
    ) -> Result<Option<ChaincodeInvocationSpec>, DecodeError> {
        let Some(cap) = self.first_action_payload()? else {
            return Ok(None);
        };
        let proposal: proto::ChaincodeProposalPayload =
            decode_layer(Layer::ChaincodeProposalPayload, &cap.chaincode_proposal_payload)?;
        decode_layer(Layer::ChaincodeInvocationSpec, &proposal.input).map(Some)
    }

    /// The chaincode action (response + results + events) of the first action.
    pub fn chaincode_action(&self) -> Result<Option<ChaincodeAction>, DecodeError> {
        let Some(cap) = self.first_action_payload()? else {
            return Ok(None);
        };
        let endorsed = cap
            .action
            .as_ref()
            .filter(|a| !a.proposal_response_payload.is_empty())
            .ok_or(DecodeError::Missing {
                layer: Layer::ChaincodeActionPayload,
                field: "proposal response payload",
            })?;
        let response: proto::ProposalResponsePayload = decode_layer(
            Layer::ProposalResponsePayload,
            &endorsed.proposal_response_payload,
        )?;
        if response.extension.is_empty() {
            return Err(DecodeError::Missing {
                layer: Layer::ProposalResponsePayload,
                field: "extension",
            });
        }
        decode_layer(Layer::ChaincodeAction, &response.extension).map(Some)
    }

    /// The chaincode event, if the chaincode emitted one.
    pub fn chaincode_event(&self) -> Result<Option<ChaincodeEvent>, DecodeError> {
        match self.chaincode_action()? {
            Some(action) if !action.events.is_empty() => {
                decode_layer(Layer::ChaincodeEvent, &action.events).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// The raw read/write set of the chaincode action.
    pub fn read_write_set(&self) -> Result<Option<TxReadWriteSet>, DecodeError> {
        match self.chaincode_action()? {
            Some(action) => decode_layer(Layer::ReadWriteSet, &action.results).map(Some),
            None => Ok(None),
        }
    }

    /// Read/write sets keyed by namespace. Empty when there is no chaincode action.
    pub fn read_write_map(&self) -> Result<BTreeMap<String, KvRwSet>, DecodeError> {
        let mut map = BTreeMap::new();
        if let Some(rws) = self.read_write_set()? {
            for ns in rws.ns_rwset {
                let kv: KvRwSet = decode_layer(Layer::KvReadWriteSet, &ns.rwset)?;
                map.insert(ns.namespace, kv);
            }
        }
        Ok(map)
    }
}
