//! Shared enumerations and timestamp helpers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::proto::Timestamp;

// ─── HeaderType ──────────────────────────────────────────────────────────────

/// `common.HeaderType` of a channel header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderType {
    Message,
    Config,
    ConfigUpdate,
    EndorserTransaction,
    OrdererTransaction,
    DeliverSeekInfo,
    ChaincodePackage,
    /// A value this build does not know about.
    Unknown(i32),
}

impl HeaderType {
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Message,
            1 => Self::Config,
            2 => Self::ConfigUpdate,
            3 => Self::EndorserTransaction,
            4 => Self::OrdererTransaction,
            5 => Self::DeliverSeekInfo,
            6 => Self::ChaincodePackage,
            other => Self::Unknown(other),
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::Message => 0,
            Self::Config => 1,
            Self::ConfigUpdate => 2,
            Self::EndorserTransaction => 3,
            Self::OrdererTransaction => 4,
            Self::DeliverSeekInfo => 5,
            Self::ChaincodePackage => 6,
            Self::Unknown(v) => v,
        }
    }

    /// Parse either the Fabric name (`"ENDORSER_TRANSACTION"`) or the numeric value.
    pub fn parse(s: &str) -> Option<Self> {
        if let Ok(n) = s.trim().parse::<i32>() {
            return Some(Self::from_i32(n));
        }
        let found = match s.trim().to_ascii_uppercase().as_str() {
            "MESSAGE" => Self::Message,
            "CONFIG" => Self::Config,
            "CONFIG_UPDATE" => Self::ConfigUpdate,
            "ENDORSER_TRANSACTION" => Self::EndorserTransaction,
            "ORDERER_TRANSACTION" => Self::OrdererTransaction,
            "DELIVER_SEEK_INFO" => Self::DeliverSeekInfo,
            "CHAINCODE_PACKAGE" => Self::ChaincodePackage,
            _ => return None,
        };
        Some(found)
    }

    /// Fabric's canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Message => "MESSAGE",
            Self::Config => "CONFIG",
            Self::ConfigUpdate => "CONFIG_UPDATE",
            Self::EndorserTransaction => "ENDORSER_TRANSACTION",
            Self::OrdererTransaction => "ORDERER_TRANSACTION",
            Self::DeliverSeekInfo => "DELIVER_SEEK_INFO",
            Self::ChaincodePackage => "CHAINCODE_PACKAGE",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for HeaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(v) => write!(f, "UNKNOWN({v})"),
            other => f.write_str(other.name()),
        }
    }
}

// ─── ValidationCode ──────────────────────────────────────────────────────────

macro_rules! validation_codes {
    ($($variant:ident = $value:literal => $name:literal,)+) => {
        /// `peer.TxValidationCode`, read from the block's transactions-filter metadata.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ValidationCode {
            $($variant,)+
            /// A byte this build does not know about.
            Unknown(u8),
        }

        impl ValidationCode {
            pub fn from_byte(byte: u8) -> Self {
                match byte {
                    $($value => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }

            pub fn as_byte(self) -> u8 {
                match self {
                    $(Self::$variant => $value,)+
                    Self::Unknown(b) => b,
                }
            }

            /// Fabric's canonical name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                    Self::Unknown(_) => "UNKNOWN",
                }
            }
        }
    };
}

validation_codes! {
    Valid = 0 => "VALID",
    NilEnvelope = 1 => "NIL_ENVELOPE",
    BadPayload = 2 => "BAD_PAYLOAD",
    BadCommonHeader = 3 => "BAD_COMMON_HEADER",
    BadCreatorSignature = 4 => "BAD_CREATOR_SIGNATURE",
    InvalidEndorserTransaction = 5 => "INVALID_ENDORSER_TRANSACTION",
    InvalidConfigTransaction = 6 => "INVALID_CONFIG_TRANSACTION",
    UnsupportedTxPayload = 7 => "UNSUPPORTED_TX_PAYLOAD",
    BadProposalTxid = 8 => "BAD_PROPOSAL_TXID",
    DuplicateTxid = 9 => "DUPLICATE_TXID",
    EndorsementPolicyFailure = 10 => "ENDORSEMENT_POLICY_FAILURE",
    MvccReadConflict = 11 => "MVCC_READ_CONFLICT",
    PhantomReadConflict = 12 => "PHANTOM_READ_CONFLICT",
    UnknownTxType = 13 => "UNKNOWN_TX_TYPE",
    TargetChainNotFound = 14 => "TARGET_CHAIN_NOT_FOUND",
    MarshalTxError = 15 => "MARSHAL_TX_ERROR",
    NilTxaction = 16 => "NIL_TXACTION",
    ExpiredChaincode = 17 => "EXPIRED_CHAINCODE",
    ChaincodeVersionConflict = 18 => "CHAINCODE_VERSION_CONFLICT",
    BadHeaderExtension = 19 => "BAD_HEADER_EXTENSION",
    BadChannelHeader = 20 => "BAD_CHANNEL_HEADER",
    BadResponsePayload = 21 => "BAD_RESPONSE_PAYLOAD",
    BadRwset = 22 => "BAD_RWSET",
    IllegalWriteset = 23 => "ILLEGAL_WRITESET",
    InvalidWriteset = 24 => "INVALID_WRITESET",
    InvalidChaincode = 25 => "INVALID_CHAINCODE",
    NotValidated = 254 => "NOT_VALIDATED",
    InvalidOtherReason = 255 => "INVALID_OTHER_REASON",
}

impl ValidationCode {
    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(b) => write!(f, "UNKNOWN({b})"),
            other => f.write_str(other.name()),
        }
    }
}

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// RFC 3339 with a fixed nine-digit fraction, so zero nanoseconds are not trimmed.
pub const RFC3339_NANO_FIXED: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

/// Convert a protobuf timestamp to UTC. Out-of-range values yield `None`.
pub fn timestamp_utc(ts: &Timestamp) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(ts.nanos).ok()?;
    DateTime::from_timestamp(ts.seconds, nanos)
}

/// Format a protobuf timestamp with [`RFC3339_NANO_FIXED`].
pub fn format_timestamp(ts: &Timestamp) -> String {
    match timestamp_utc(ts) {
        Some(utc) => utc.format(RFC3339_NANO_FIXED).to_string(),
        None => format!("invalid({}s,{}ns)", ts.seconds, ts.nanos),
    }
}
