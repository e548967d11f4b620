//! Event source interface and the block-file replay source.
//!
//! A source delivers [`BlockEvent`]s over a bounded channel. After
//! [`EventSource::unregister`] it must eventually push [`BlockEvent::Closed`]
//! (or drop the sender), which is how the listener learns that draining is
//! complete.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Layer, TapError};
use crate::proto;
use crate::tx::decode_layer;

/// Default capacity of the event channel.
pub const DEFAULT_BUFFER: usize = 100;

/// An item on the event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockEvent {
    Block(proto::Block),
    /// The subscription is closed; nothing follows.
    Closed,
}

/// Handle returned by [`EventSource::register`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Registration {
    id: u64,
}

impl Registration {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A feed of blocks.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Subscribe from `start_block` (inclusive), or from the newest block when `None`.
    async fn register(
        &self,
        start_block: Option<u64>,
    ) -> Result<(Registration, mpsc::Receiver<BlockEvent>), TapError>;

    /// Release a subscription. Safe to call more than once.
    async fn unregister(&self, registration: Registration);
}

// ─── ReplaySource ────────────────────────────────────────────────────────────

/// Replays a fixed set of blocks, ordered by block number.
///
/// The subscription stays open after the last block until it is unregistered,
/// like a live feed waiting for the next block.
pub struct ReplaySource {
    blocks: Arc<Vec<proto::Block>>,
    buffer: usize,
    next_id: AtomicU64,
    active: Mutex<HashMap<u64, CancellationToken>>,
}

fn number_of(block: &proto::Block) -> u64 {
    block.header.as_ref().map(|h| h.number).unwrap_or_default()
}

impl ReplaySource {
    pub fn new(mut blocks: Vec<proto::Block>) -> Self {
        blocks.sort_by_key(number_of);
        Self {
            blocks: Arc::new(blocks),
            buffer: DEFAULT_BUFFER,
            next_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Load every `*.block` / `*.pb` file in `dir` as a serialized `common.Block`.
    pub async fn from_dir(dir: impl AsRef<Path>) -> Result<Self, TapError> {
        let dir = dir.as_ref();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| TapError::Config(format!("read block directory {}: {e}", dir.display())))?;

        let mut blocks = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TapError::Config(format!("read block directory {}: {e}", dir.display())))?
        {
            let path = entry.path();
            let is_block_file = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("block") | Some("pb")
            );
            if !is_block_file || !path.is_file() {
                continue;
            }
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| TapError::Config(format!("read {}: {e}", path.display())))?;
            let block: proto::Block = decode_layer(Layer::Block, &bytes)?;
            tracing::debug!(path = %path.display(), number = number_of(&block), "loaded block file");
            blocks.push(block);
        }
        Ok(Self::new(blocks))
    }

    /// Channel capacity for new registrations.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of the newest block, if any.
    pub fn last_block_number(&self) -> Option<u64> {
        self.blocks.last().map(number_of)
    }

    /// Number of subscriptions not yet unregistered.
    pub fn active_registrations(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}

#[async_trait]
impl EventSource for ReplaySource {
    async fn register(
        &self,
        start_block: Option<u64>,
    ) -> Result<(Registration, mpsc::Receiver<BlockEvent>), TapError> {
        let selected: Vec<proto::Block> = match start_block {
            Some(start) => self
                .blocks
                .iter()
                .filter(|b| number_of(b) >= start)
                .cloned()
                .collect(),
            None => self.blocks.last().cloned().into_iter().collect(),
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.active.lock().unwrap().insert(id, token.clone());

        let (tx, rx) = mpsc::channel(self.buffer);
        tracing::debug!(id, ?start_block, blocks = selected.len(), "replay registered");

        tokio::spawn(async move {
            for block in selected {
                tokio::select! {
                    _ = token.cancelled() => break,
                    sent = tx.send(BlockEvent::Block(block)) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            token.cancelled().await;
            let _ = tx.send(BlockEvent::Closed).await;
        });

        Ok((Registration::new(id), rx))
    }

    async fn unregister(&self, registration: Registration) {
        let token = self.active.lock().unwrap().remove(&registration.id);
        if let Some(token) = token {
            tracing::debug!(id = registration.id, "replay unregistered");
            token.cancel();
        }
    }
}
