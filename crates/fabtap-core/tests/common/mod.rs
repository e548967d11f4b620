//! Shared fixtures for the listener integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prost::Message;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use fabtap_core::proto::{self, TRANSACTIONS_FILTER};
use fabtap_core::{Block, BlockEvent, BlockHandler, EventSource, HeaderType, Registration, TapError};

/// Envelope of an endorser transaction with no actions.
pub fn envelope(tx_id: &str) -> Vec<u8> {
    let channel_header = proto::ChannelHeader {
        r#type: HeaderType::EndorserTransaction.as_i32(),
        channel_id: "mychannel".into(),
        tx_id: tx_id.into(),
        timestamp: Some(proto::Timestamp {
            seconds: 1_700_000_000,
            nanos: 0,
        }),
        ..Default::default()
    };
    let payload = proto::Payload {
        header: Some(proto::Header {
            channel_header: channel_header.encode_to_vec(),
            signature_header: vec![],
        }),
        data: proto::Transaction::default().encode_to_vec(),
    };
    proto::Envelope {
        payload: payload.encode_to_vec(),
        signature: vec![],
    }
    .encode_to_vec()
}

pub fn block_with(number: u64, envelopes: Vec<Vec<u8>>) -> proto::Block {
    let mut metadata = vec![Vec::new(); TRANSACTIONS_FILTER + 1];
    metadata[TRANSACTIONS_FILTER] = vec![0; envelopes.len()];
    proto::Block {
        header: Some(proto::BlockHeader {
            number,
            previous_hash: vec![number as u8; 32],
            data_hash: vec![0x5a; 32],
        }),
        data: Some(proto::BlockData { data: envelopes }),
        metadata: Some(proto::BlockMetadata { metadata }),
    }
}

/// A block with one valid transaction named `tx-<number>`.
pub fn block(number: u64) -> proto::Block {
    block_with(number, vec![envelope(&format!("tx-{number}"))])
}

/// A block whose only envelope is not valid protobuf.
pub fn corrupt_block(number: u64) -> proto::Block {
    block_with(number, vec![vec![0xff, 0xff, 0xff]])
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// Records handled block numbers and reports each on a channel.
#[derive(Clone)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<u64>>>,
    notify: mpsc::UnboundedSender<u64>,
    fail_at: Option<u64>,
}

impl Recorder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<u64>) {
        let (notify, rx) = mpsc::unbounded_channel();
        (
            Self {
                seen: Arc::default(),
                notify,
                fail_at: None,
            },
            rx,
        )
    }

    pub fn failing_at(mut self, number: u64) -> Self {
        self.fail_at = Some(number);
        self
    }

    pub fn seen(&self) -> Vec<u64> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlockHandler for Recorder {
    async fn handle(&self, block: &Block) -> Result<(), TapError> {
        if self.fail_at == Some(block.number) {
            return Err(TapError::handler("recorder", format!("rejected block {}", block.number)));
        }
        self.seen.lock().unwrap().push(block.number);
        let _ = self.notify.send(block.number);
        Ok(())
    }
}

// ─── ScriptedSource ──────────────────────────────────────────────────────────

/// How a scripted subscription ends after its events are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// Wait for unregister, then send `Closed`.
    ClosedOnUnregister,
    /// Drop the sender once the script is delivered.
    DropSender,
}

/// Event source that plays a fixed script of events.
pub struct ScriptedSource {
    script: Vec<BlockEvent>,
    ending: Ending,
    buffer: usize,
    fail_register: bool,
    token: CancellationToken,
    pub unregister_calls: AtomicUsize,
    pub registered_from: Mutex<Option<Option<u64>>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<BlockEvent>) -> Self {
        Self {
            script,
            ending: Ending::ClosedOnUnregister,
            buffer: 100,
            fail_register: false,
            token: CancellationToken::new(),
            unregister_calls: AtomicUsize::new(0),
            registered_from: Mutex::new(None),
        }
    }

    pub fn blocks(numbers: impl IntoIterator<Item = u64>) -> Self {
        Self::new(numbers.into_iter().map(|n| BlockEvent::Block(block(n))).collect())
    }

    pub fn ending(mut self, ending: Ending) -> Self {
        self.ending = ending;
        self
    }

    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn failing() -> Self {
        let mut source = Self::new(vec![]);
        source.fail_register = true;
        source
    }

    pub fn unregisters(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn register(
        &self,
        start_block: Option<u64>,
    ) -> Result<(Registration, mpsc::Receiver<BlockEvent>), TapError> {
        if self.fail_register {
            return Err(TapError::Registration("peer unavailable".into()));
        }
        *self.registered_from.lock().unwrap() = Some(start_block);

        let (tx, rx) = mpsc::channel(self.buffer);
        let script = self.script.clone();
        let ending = self.ending;
        let token = self.token.clone();
        tokio::spawn(async move {
            for event in script {
                tokio::select! {
                    _ = token.cancelled() => break,
                    sent = tx.send(event) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            if ending == Ending::DropSender {
                return;
            }
            token.cancelled().await;
            let _ = tx.send(BlockEvent::Closed).await;
        });
        Ok((Registration::new(1), rx))
    }

    async fn unregister(&self, _registration: Registration) {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
    }
}

// ─── FloodingSource ──────────────────────────────────────────────────────────

/// Event source that keeps producing after it is unregistered.
///
/// Blocks `1, 2, ..` are sent until unregister. Then `trailing` more blocks
/// numbered from 1000 are pushed, and only after those is `Closed` sent.
pub struct FloodingSource {
    trailing: usize,
    buffer: usize,
    token: CancellationToken,
    pub trailing_sent: Arc<AtomicUsize>,
}

impl FloodingSource {
    pub fn new(trailing: usize, buffer: usize) -> Self {
        Self {
            trailing,
            buffer,
            token: CancellationToken::new(),
            trailing_sent: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn trailing_sent(&self) -> usize {
        self.trailing_sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for FloodingSource {
    async fn register(
        &self,
        _start_block: Option<u64>,
    ) -> Result<(Registration, mpsc::Receiver<BlockEvent>), TapError> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let token = self.token.clone();
        let trailing = self.trailing;
        let trailing_sent = self.trailing_sent.clone();
        tokio::spawn(async move {
            let mut number = 1;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    sent = tx.send(BlockEvent::Block(block(number))) => {
                        if sent.is_err() {
                            return;
                        }
                        number += 1;
                    }
                }
            }
            for i in 0..trailing {
                if tx.send(BlockEvent::Block(block(1000 + i as u64))).await.is_err() {
                    return;
                }
                trailing_sent.fetch_add(1, Ordering::SeqCst);
            }
            let _ = tx.send(BlockEvent::Closed).await;
        });
        Ok((Registration::new(1), rx))
    }

    async fn unregister(&self, _registration: Registration) {
        self.token.cancel();
    }
}
