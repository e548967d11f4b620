//! Terminal handler that dumps the contents of valid endorser transactions.

use async_trait::async_trait;

use super::TxHandler;
use crate::error::TapError;
use crate::tx::Tx;

/// Logs creator MSP, invocation arguments, chaincode response and event, and
/// the per-namespace read/write sets. Other transactions are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct InspectHandler;

impl InspectHandler {
    pub fn new() -> Self {
        Self
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[async_trait]
impl TxHandler for InspectHandler {
    async fn handle(&self, tx: &Tx) -> Result<(), TapError> {
        if !tx.is_valid_endorser() {
            return Ok(());
        }
        let id = tx.id();
        tracing::info!(id, msp_id = %tx.msp_id(), "creator");

        if let Some(spec) = tx.chaincode_invocation_spec()? {
            let cc = spec.chaincode_spec.unwrap_or_default();
            let name = cc.chaincode_id.map(|c| c.name).unwrap_or_default();
            tracing::info!(id, chaincode = %name, "invocation");
            for (i, arg) in cc.input.unwrap_or_default().args.iter().enumerate() {
                tracing::info!(id, index = i, arg = %lossy(arg), "invocation arg");
            }
        }

        if let Some(action) = tx.chaincode_action()? {
            let response = action.response.unwrap_or_default();
            tracing::info!(
                id,
                chaincode = %action.chaincode_id.map(|c| c.name).unwrap_or_default(),
                status = response.status,
                message = %response.message,
                payload = %lossy(&response.payload),
                "chaincode response"
            );
        }

        if let Some(event) = tx.chaincode_event()? {
            tracing::info!(
                id,
                event = %event.event_name,
                payload = %lossy(&event.payload),
                "chaincode event"
            );
        }

        for (namespace, kv) in tx.read_write_map()? {
            for (i, read) in kv.reads.iter().enumerate() {
                let version = read.version.unwrap_or_default();
                tracing::info!(
                    id,
                    namespace = %namespace,
                    index = i,
                    key = %read.key,
                    block_num = version.block_num,
                    tx_num = version.tx_num,
                    "read"
                );
            }
            for (i, write) in kv.writes.iter().enumerate() {
                tracing::info!(
                    id,
                    namespace = %namespace,
                    index = i,
                    key = %write.key,
                    is_delete = write.is_delete,
                    value = %lossy(&write.value),
                    "write"
                );
            }
        }
        Ok(())
    }
}
