//! Block-level handlers.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::{run_actions, BlockAction, BlockHandler, TxHandler};
use crate::block::Block;
use crate::cursor::CursorStore;
use crate::error::TapError;
use crate::sink::{MetadataSink, SinkRecord};

pub(crate) fn compile(pattern: &str) -> Result<Regex, TapError> {
    Regex::new(pattern).map_err(|e| TapError::Config(format!("invalid filter pattern '{pattern}': {e}")))
}

async fn delegate(next: &Option<Box<dyn BlockHandler>>, block: &Block) -> Result<(), TapError> {
    match next {
        Some(next) => next.handle(block).await,
        None => Ok(()),
    }
}

// ─── BlockHashFilter ─────────────────────────────────────────────────────────

/// Passes blocks whose lowercase hex hash matches a regular expression.
pub struct BlockHashFilter {
    pattern: Regex,
    next: Option<Box<dyn BlockHandler>>,
    filtered_actions: Vec<BlockAction>,
}

impl BlockHashFilter {
    /// Fails with [`TapError::Config`] when `pattern` does not compile.
    pub fn new(next: Option<Box<dyn BlockHandler>>, pattern: &str) -> Result<Self, TapError> {
        Ok(Self {
            pattern: compile(pattern)?,
            next,
            filtered_actions: Vec::new(),
        })
    }

    /// Add an action to run for every rejected block.
    pub fn with_action(mut self, action: BlockAction) -> Self {
        self.filtered_actions.push(action);
        self
    }
}

#[async_trait]
impl BlockHandler for BlockHashFilter {
    async fn handle(&self, block: &Block) -> Result<(), TapError> {
        if self.pattern.is_match(&block.hash_hex()) {
            return delegate(&self.next, block).await;
        }
        run_actions(&self.filtered_actions, block)
    }
}

// ─── BlockLogger ─────────────────────────────────────────────────────────────

/// Logs a one-line summary of every block.
pub struct BlockLogger {
    next: Option<Box<dyn BlockHandler>>,
}

impl BlockLogger {
    pub fn new(next: Option<Box<dyn BlockHandler>>) -> Self {
        Self { next }
    }
}

#[async_trait]
impl BlockHandler for BlockLogger {
    async fn handle(&self, block: &Block) -> Result<(), TapError> {
        tracing::info!(
            number = block.number,
            hash = %block.hash_hex(),
            tx_count = block.txs.len(),
            "block"
        );
        delegate(&self.next, block).await
    }
}

// ─── TxFanOut ────────────────────────────────────────────────────────────────

/// Runs a transaction chain over each transaction of the block, in order.
pub struct TxFanOut {
    txs: Box<dyn TxHandler>,
}

impl TxFanOut {
    pub fn new(txs: Box<dyn TxHandler>) -> Self {
        Self { txs }
    }
}

#[async_trait]
impl BlockHandler for TxFanOut {
    async fn handle(&self, block: &Block) -> Result<(), TapError> {
        for tx in &block.txs {
            self.txs.handle(tx).await?;
        }
        Ok(())
    }
}

// ─── CursorWriter ────────────────────────────────────────────────────────────

/// Saves the block number to a [`CursorStore`] before delegating.
pub struct CursorWriter {
    store: Arc<dyn CursorStore>,
    next: Option<Box<dyn BlockHandler>>,
}

impl CursorWriter {
    pub fn new(next: Option<Box<dyn BlockHandler>>, store: Arc<dyn CursorStore>) -> Self {
        Self { store, next }
    }
}

#[async_trait]
impl BlockHandler for CursorWriter {
    async fn handle(&self, block: &Block) -> Result<(), TapError> {
        self.store.save(block.number).await?;
        tracing::trace!(number = block.number, "cursor saved");
        delegate(&self.next, block).await
    }
}

// ─── SinkWriter ──────────────────────────────────────────────────────────────

type RecordMapper = Box<dyn Fn(&Block) -> SinkRecord + Send + Sync>;

/// Maps each block to a [`SinkRecord`] and writes it to a [`MetadataSink`].
pub struct SinkWriter {
    sink: Arc<dyn MetadataSink>,
    mapper: RecordMapper,
    next: Option<Box<dyn BlockHandler>>,
}

impl SinkWriter {
    /// Uses [`SinkRecord::block_summary`] as the mapping.
    pub fn new(next: Option<Box<dyn BlockHandler>>, sink: Arc<dyn MetadataSink>) -> Self {
        Self::with_mapper(next, sink, SinkRecord::block_summary)
    }

    pub fn with_mapper<F>(next: Option<Box<dyn BlockHandler>>, sink: Arc<dyn MetadataSink>, mapper: F) -> Self
    where
        F: Fn(&Block) -> SinkRecord + Send + Sync + 'static,
    {
        Self {
            sink,
            mapper: Box::new(mapper),
            next,
        }
    }
}

#[async_trait]
impl BlockHandler for SinkWriter {
    async fn handle(&self, block: &Block) -> Result<(), TapError> {
        self.sink.put((self.mapper)(block)).await?;
        delegate(&self.next, block).await
    }
}
