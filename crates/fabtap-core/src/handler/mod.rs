//! Block and transaction handler chains.
//!
//! Handlers are singly linked: each node owns its optional `next` and is
//! built bottom-up before the listener starts. A node either delegates to
//! `next`, stops the chain (filters), or fans out into a transaction chain.
//! The first error anywhere in the chain is returned unchanged.
//!
//! ```text
//! CursorWriter → BlockLogger → BlockHashFilter → TxFanOut
//!                                                   └── ValidEndorserFilter → TxLogger → InspectHandler
//! ```

use async_trait::async_trait;

use crate::block::Block;
use crate::error::TapError;
use crate::tx::Tx;

pub mod block;
pub mod inspect;
pub mod tx;

pub use block::{BlockHashFilter, BlockLogger, CursorWriter, SinkWriter, TxFanOut};
pub use inspect::InspectHandler;
pub use tx::{TxIdFilter, TxLogger, TxTypeFilter, ValidEndorserFilter};

/// A node in the block chain.
#[async_trait]
pub trait BlockHandler: Send + Sync {
    async fn handle(&self, block: &Block) -> Result<(), TapError>;
}

/// A node in the transaction chain.
#[async_trait]
pub trait TxHandler: Send + Sync {
    async fn handle(&self, tx: &Tx) -> Result<(), TapError>;
}

/// Side effect run by a block filter when it rejects a block.
pub type BlockAction = Box<dyn Fn(&Block) -> Result<(), TapError> + Send + Sync>;

/// Side effect run by a tx filter when it rejects a transaction.
pub type TxAction = Box<dyn Fn(&Tx) -> Result<(), TapError> + Send + Sync>;

/// Run every action in order, stopping at the first error.
pub(crate) fn run_actions<T: ?Sized>(
    actions: &[Box<dyn Fn(&T) -> Result<(), TapError> + Send + Sync>],
    entity: &T,
) -> Result<(), TapError> {
    for action in actions {
        action(entity)?;
    }
    Ok(())
}

// ─── Filtered-logging actions ────────────────────────────────────────────────

/// Logs a block dropped by [`BlockHashFilter`] at debug level.
pub fn block_filtered_by_hash() -> BlockAction {
    Box::new(|block: &Block| {
        tracing::debug!(number = block.number, hash = %block.hash_hex(), "block filtered by hash");
        Ok(())
    })
}

/// Logs a transaction dropped by [`TxIdFilter`] at debug level.
pub fn tx_filtered_by_hash() -> TxAction {
    Box::new(|tx: &Tx| {
        tracing::debug!(block_number = tx.block_number, id = tx.id(), "tx filtered by hash");
        Ok(())
    })
}

/// Logs a transaction dropped by [`TxTypeFilter`] at debug level.
pub fn tx_filtered_by_type() -> TxAction {
    Box::new(|tx: &Tx| {
        tracing::debug!(
            block_number = tx.block_number,
            id = tx.id(),
            header_type = %tx.header_type(),
            "tx filtered by type"
        );
        Ok(())
    })
}

/// Logs a transaction dropped by [`ValidEndorserFilter`] at debug level.
pub fn tx_filtered_by_valid_endorser() -> TxAction {
    Box::new(|tx: &Tx| {
        tracing::debug!(
            block_number = tx.block_number,
            id = tx.id(),
            header_type = %tx.header_type(),
            validation = %tx.validation_code,
            "tx filtered by valid-endorser"
        );
        Ok(())
    })
}
