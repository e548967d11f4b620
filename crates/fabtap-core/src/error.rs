//! Error types for the fabtap pipeline.

use std::fmt;

use thiserror::Error;

/// Errors that can occur while listening to and processing blocks.
#[derive(Debug, Error)]
pub enum TapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("Handler error in '{handler}': {reason}")]
    Handler { handler: String, reason: String },

    #[error("Event registration failed: {0}")]
    Registration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl TapError {
    /// Shorthand for a handler failure.
    pub fn handler(handler: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Handler {
            handler: handler.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if the error came from malformed block or transaction bytes.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Hash(_))
    }

    /// Returns `true` if the error must be fixed by the caller before retrying.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// The protobuf layer a decode step was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Block,
    Envelope,
    Payload,
    ChannelHeader,
    SignatureHeader,
    Transaction,
    SerializedIdentity,
    ChaincodeActionPayload,
    ProposalResponsePayload,
    ChaincodeAction,
    ChaincodeEvent,
    ChaincodeProposalPayload,
    ChaincodeInvocationSpec,
    ReadWriteSet,
    KvReadWriteSet,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Block => "block",
            Self::Envelope => "envelope",
            Self::Payload => "payload",
            Self::ChannelHeader => "channel header",
            Self::SignatureHeader => "signature header",
            Self::Transaction => "transaction",
            Self::SerializedIdentity => "serialized identity",
            Self::ChaincodeActionPayload => "chaincode action payload",
            Self::ProposalResponsePayload => "proposal response payload",
            Self::ChaincodeAction => "chaincode action",
            Self::ChaincodeEvent => "chaincode event",
            Self::ChaincodeProposalPayload => "chaincode proposal payload",
            Self::ChaincodeInvocationSpec => "chaincode invocation spec",
            Self::ReadWriteSet => "read/write set",
            Self::KvReadWriteSet => "KV read/write set",
        };
        f.write_str(name)
    }
}

/// Errors raised while decoding block or transaction bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed {layer}: {source}")]
    Malformed {
        layer: Layer,
        #[source]
        source: prost::DecodeError,
    },

    #[error("{layer} is missing {field}")]
    Missing { layer: Layer, field: &'static str },

    #[error("No validation code for transaction {index} of block {block}")]
    MissingValidationCode { block: u64, index: usize },
}

impl DecodeError {
    /// The layer that failed, if the failure is tied to one.
    pub fn layer(&self) -> Option<Layer> {
        match self {
            Self::Malformed { layer, .. } | Self::Missing { layer, .. } => Some(*layer),
            Self::MissingValidationCode { .. } => None,
        }
    }
}

/// Errors from the block hash engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("Block number {number} does not fit in an ASN.1 signed 64-bit integer")]
    EncodingRange { number: u64 },
}
