//! Metadata sink, the keyed store that block summaries are written to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::error::TapError;

/// One record written to a [`MetadataSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRecord {
    pub key: String,
    pub value: serde_json::Value,
}

impl SinkRecord {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Default block mapping: keyed by `block/<number>`, value summarising the
    /// block and its transactions.
    pub fn block_summary(block: &Block) -> Self {
        let txs: Vec<serde_json::Value> = block
            .txs
            .iter()
            .map(|tx| {
                serde_json::json!({
                    "id": tx.id(),
                    "type": tx.header_type().name(),
                    "validation_code": tx.validation_code.name(),
                    "timestamp": tx.timestamp_string(),
                })
            })
            .collect();
        Self::new(
            format!("block/{}", block.number),
            serde_json::json!({
                "number": block.number,
                "hash": block.hash_hex(),
                "previous_hash": hex::encode(&block.previous_hash),
                "tx_count": block.txs.len(),
                "valid_tx_count": block.valid_tx_count(),
                "txs": txs,
            }),
        )
    }
}

/// Trait for keyed record stores.
#[async_trait]
pub trait MetadataSink: Send + Sync {
    /// Insert or overwrite the record under `record.key`.
    async fn put(&self, record: SinkRecord) -> Result<(), TapError>;

    /// Fetch a record by key.
    async fn get(&self, key: &str) -> Result<Option<SinkRecord>, TapError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, EndorserTx};

    #[test]
    fn block_summary_shape() {
        let raw = testutil::block(
            5,
            vec![EndorserTx::new("t0").encode(), EndorserTx::new("t1").encode()],
            vec![0, 10],
        );
        let block = Block::decode(&raw).unwrap();
        let record = SinkRecord::block_summary(&block);

        assert_eq!(record.key, "block/5");
        assert_eq!(record.value["number"], 5);
        assert_eq!(record.value["hash"], block.hash_hex());
        assert_eq!(record.value["tx_count"], 2);
        assert_eq!(record.value["valid_tx_count"], 1);
        assert_eq!(record.value["txs"][1]["id"], "t1");
        assert_eq!(
            record.value["txs"][1]["validation_code"],
            "ENDORSEMENT_POLICY_FAILURE"
        );
        assert_eq!(record.value["txs"][0]["type"], "ENDORSER_TRANSACTION");
    }
}
