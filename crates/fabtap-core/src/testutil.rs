//! Builders for protobuf fixtures used across unit tests.

use prost::Message;

use crate::proto::{self, TRANSACTIONS_FILTER};
use crate::types::HeaderType;

pub fn envelope_with_payload(payload: Vec<u8>) -> Vec<u8> {
    proto::Envelope {
        payload,
        signature: vec![0xde, 0xad],
    }
    .encode_to_vec()
}

pub fn channel_header(tx_id: &str, header_type: HeaderType) -> proto::ChannelHeader {
    proto::ChannelHeader {
        r#type: header_type.as_i32(),
        version: 0,
        timestamp: Some(proto::Timestamp {
            seconds: 1_600_000_000,
            nanos: 500,
        }),
        channel_id: "mychannel".into(),
        tx_id: tx_id.into(),
        epoch: 0,
        extension: vec![],
        tls_cert_hash: vec![],
    }
}

fn signature_header(mspid: &str) -> proto::SignatureHeader {
    proto::SignatureHeader {
        creator: proto::SerializedIdentity {
            mspid: mspid.into(),
            id_bytes: b"-----BEGIN CERTIFICATE-----".to_vec(),
        }
        .encode_to_vec(),
        nonce: vec![1, 2, 3],
    }
}

/// A config-block style envelope (payload data is not a peer transaction).
pub fn config_envelope(tx_id: &str) -> Vec<u8> {
    let payload = proto::Payload {
        header: Some(proto::Header {
            channel_header: channel_header(tx_id, HeaderType::Config).encode_to_vec(),
            signature_header: signature_header("OrdererMSP").encode_to_vec(),
        }),
        // ConfigEnvelope { config: Config { sequence: 1 } }
        data: vec![0x0a, 0x02, 0x08, 0x01],
    };
    envelope_with_payload(payload.encode_to_vec())
}

/// Builder for an endorser transaction envelope.
pub struct EndorserTx {
    pub tx_id: String,
    pub args: Vec<Vec<u8>>,
    pub response: proto::Response,
    pub event: Option<proto::ChaincodeEvent>,
    pub writes: Vec<(String, String, Vec<u8>)>,
    pub channel_header_override: Option<Vec<u8>>,
    pub events_override: Option<Vec<u8>>,
    pub empty_extension: bool,
    pub unsigned: bool,
}

impl EndorserTx {
    pub fn new(tx_id: &str) -> Self {
        Self {
            tx_id: tx_id.into(),
            args: vec![b"init".to_vec()],
            response: proto::Response {
                status: 200,
                message: String::new(),
                payload: vec![],
            },
            event: None,
            writes: vec![],
            channel_header_override: None,
            events_override: None,
            empty_extension: false,
            unsigned: false,
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|a| a.as_bytes().to_vec()).collect();
        self
    }

    pub fn response(mut self, status: i32, message: &str, payload: &[u8]) -> Self {
        self.response = proto::Response {
            status,
            message: message.into(),
            payload: payload.to_vec(),
        };
        self
    }

    pub fn event(mut self, name: &str, payload: &[u8]) -> Self {
        self.event = Some(proto::ChaincodeEvent {
            chaincode_id: "basic".into(),
            tx_id: self.tx_id.clone(),
            event_name: name.into(),
            payload: payload.to_vec(),
        });
        self
    }

    pub fn write(mut self, namespace: &str, key: &str, value: &[u8]) -> Self {
        self.writes
            .push((namespace.into(), key.into(), value.to_vec()));
        self
    }

    fn rwset(&self) -> Vec<u8> {
        let mut namespaces: Vec<proto::NsReadWriteSet> = Vec::new();
        for (ns, key, value) in &self.writes {
            let write = proto::KvWrite {
                key: key.clone(),
                is_delete: false,
                value: value.clone(),
            };
            let kv = proto::KvRwSet {
                reads: vec![proto::KvRead {
                    key: key.clone(),
                    version: Some(proto::Version {
                        block_num: 1,
                        tx_num: 0,
                    }),
                }],
                range_queries_info: vec![],
                writes: vec![write],
                metadata_writes: vec![],
            };
            namespaces.push(proto::NsReadWriteSet {
                namespace: ns.clone(),
                rwset: kv.encode_to_vec(),
            });
        }
        proto::TxReadWriteSet {
            data_model: 0,
            ns_rwset: namespaces,
        }
        .encode_to_vec()
    }

    pub fn encode(&self) -> Vec<u8> {
        let chaincode_id = proto::ChaincodeId {
            path: String::new(),
            name: "basic".into(),
            version: "1.0".into(),
        };
        let invocation = proto::ChaincodeInvocationSpec {
            chaincode_spec: Some(proto::ChaincodeSpec {
                r#type: 1,
                chaincode_id: Some(chaincode_id.clone()),
                input: Some(proto::ChaincodeInput {
                    args: self.args.clone(),
                    is_init: false,
                }),
                timeout: 0,
            }),
        };
        let proposal = proto::ChaincodeProposalPayload {
            input: invocation.encode_to_vec(),
        };
        let events = match (&self.events_override, &self.event) {
            (Some(raw), _) => raw.clone(),
            (None, Some(event)) => event.encode_to_vec(),
            (None, None) => vec![],
        };
        let action = proto::ChaincodeAction {
            results: self.rwset(),
            events,
            response: Some(self.response.clone()),
            chaincode_id: Some(chaincode_id),
        };
        let response_payload = proto::ProposalResponsePayload {
            proposal_hash: vec![0; 32],
            extension: if self.empty_extension {
                vec![]
            } else {
                action.encode_to_vec()
            },
        };
        let action_payload = proto::ChaincodeActionPayload {
            chaincode_proposal_payload: proposal.encode_to_vec(),
            action: Some(proto::ChaincodeEndorsedAction {
                proposal_response_payload: response_payload.encode_to_vec(),
                endorsements: vec![proto::Endorsement {
                    endorser: vec![1],
                    signature: vec![2],
                }],
            }),
        };
        let transaction = proto::Transaction {
            actions: vec![proto::TransactionAction {
                header: vec![],
                payload: action_payload.encode_to_vec(),
            }],
        };
        let channel_header = match &self.channel_header_override {
            Some(raw) => raw.clone(),
            None => channel_header(&self.tx_id, HeaderType::EndorserTransaction).encode_to_vec(),
        };
        let payload = proto::Payload {
            header: Some(proto::Header {
                channel_header,
                signature_header: if self.unsigned {
                    vec![]
                } else {
                    signature_header("Org1MSP").encode_to_vec()
                },
            }),
            data: transaction.encode_to_vec(),
        };
        envelope_with_payload(payload.encode_to_vec())
    }
}

/// Assemble a block with the given envelopes and validation codes.
pub fn block(number: u64, envelopes: Vec<Vec<u8>>, codes: Vec<u8>) -> proto::Block {
    let mut metadata = vec![Vec::new(); TRANSACTIONS_FILTER + 1];
    metadata[TRANSACTIONS_FILTER] = codes;
    proto::Block {
        header: Some(proto::BlockHeader {
            number,
            previous_hash: vec![0x11; 32],
            data_hash: vec![0x22; 32],
        }),
        data: Some(proto::BlockData { data: envelopes }),
        metadata: Some(proto::BlockMetadata { metadata }),
    }
}

/// A block of `count` valid endorser transactions named `tx-<number>-<i>`.
pub fn endorser_block(number: u64, count: usize) -> proto::Block {
    let envelopes = (0..count)
        .map(|i| EndorserTx::new(&format!("tx-{number}-{i}")).encode())
        .collect();
    block(number, envelopes, vec![0; count])
}
