//! The listener: registers with an event source and drives the block chain.
//!
//! # Lifecycle
//!
//! ```text
//! Idle → Registered → Running → Draining → Stopped
//! ```
//!
//! The loop waits on three things at once: the stop signal, the next event
//! from the source, and the final result queued by the shutdown task. A
//! shutdown can be started by a handler or decode error, by reaching the end
//! block, by the source closing, or by the stop signal. Only the first one
//! counts. Once started, the subscription is released in a background task
//! and further blocks are drained without being handled, until the source
//! confirms closure with [`BlockEvent::Closed`].

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::block::Block;
use crate::config::ListenerConfig;
use crate::cursor::CursorStore;
use crate::error::TapError;
use crate::handler::BlockHandler;
use crate::proto;
use crate::source::{BlockEvent, EventSource, Registration};

/// Callback invoked with the stop cause after a stop-signal shutdown.
pub type ShutdownCallback = Arc<dyn Fn(&str) + Send + Sync>;

// ─── StopSignal ──────────────────────────────────────────────────────────────

/// External, cooperative cancellation for a running listener.
///
/// Cloning yields a handle to the same signal. The first cause given to
/// [`stop`](Self::stop) is kept.
#[derive(Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    cause: Arc<OnceLock<String>>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.
    pub fn stop(&self, cause: impl Into<String>) {
        let _ = self.cause.set(cause.into());
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The cause passed to the first [`stop`](Self::stop) call.
    pub fn cause(&self) -> Option<&str> {
        self.cause.get().map(String::as_str)
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }
}

impl fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSignal")
            .field("stopped", &self.is_stopped())
            .field("cause", &self.cause())
            .finish()
    }
}

// ─── ListenerState ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Not yet started.
    Idle,
    /// Subscribed, loop not yet entered.
    Registered,
    /// Handling blocks.
    Running,
    /// Shutdown started; waiting for the source to close.
    Draining,
    /// Terminated.
    Stopped,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Registered => write!(f, "registered"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

// ─── Shutdown ────────────────────────────────────────────────────────────────

/// One-shot shutdown sequence: unregister, then hand the result to the loop.
struct Shutdown {
    source: Arc<dyn EventSource>,
    registration: Option<Registration>,
    done: Option<oneshot::Sender<Result<(), TapError>>>,
}

impl Shutdown {
    fn started(&self) -> bool {
        self.done.is_none()
    }

    /// Returns `false` if a shutdown was already under way; `result` is then dropped.
    fn begin(&mut self, result: Result<(), TapError>) -> bool {
        let Some(done) = self.done.take() else {
            return false;
        };
        let registration = self.registration.take();
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            if let Some(registration) = registration {
                source.unregister(registration).await;
            }
            let _ = done.send(result);
        });
        true
    }
}

// ─── Listener ────────────────────────────────────────────────────────────────

/// Drives one subscription through a root [`BlockHandler`].
pub struct Listener {
    source: Arc<dyn EventSource>,
    handler: Box<dyn BlockHandler>,
    start_block: Option<u64>,
    end_block: Option<u64>,
    stop: StopSignal,
    on_shutdown: Option<ShutdownCallback>,
    state: ListenerState,
}

impl Listener {
    pub fn builder() -> ListenerBuilder {
        ListenerBuilder::new()
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn start_block(&self) -> Option<u64> {
        self.start_block
    }

    pub fn end_block(&self) -> Option<u64> {
        self.end_block
    }

    /// A handle that stops this listener.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run until the end block, the source closes, a failure, or the stop signal.
    ///
    /// A listener runs once; calling this again returns [`TapError::Config`].
    pub async fn listen(&mut self) -> Result<(), TapError> {
        if self.state != ListenerState::Idle {
            return Err(TapError::Config(format!(
                "listener already used (state: {})",
                self.state
            )));
        }

        let (registration, mut events) = match self.source.register(self.start_block).await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.state = ListenerState::Stopped;
                tracing::error!(error = %e, "event registration failed");
                return Err(match e {
                    TapError::Registration(_) => e,
                    other => TapError::Registration(other.to_string()),
                });
            }
        };
        self.state = ListenerState::Registered;
        tracing::info!(
            registration = registration.id(),
            start = ?self.start_block,
            end = ?self.end_block,
            "listening"
        );

        let (done_tx, mut done_rx) = oneshot::channel();
        let mut shutdown = Shutdown {
            source: Arc::clone(&self.source),
            registration: Some(registration),
            done: Some(done_tx),
        };
        let mut closed = false;
        let mut result: Option<Result<(), TapError>> = None;
        let mut cancel_cause: Option<String> = None;
        self.state = ListenerState::Running;

        while !(closed && result.is_some()) {
            tokio::select! {
                biased;

                _ = self.stop.stopped(), if !shutdown.started() => {
                    let cause = self.stop.cause().unwrap_or("stop requested").to_string();
                    tracing::info!(cause = %cause, "stop signal received");
                    shutdown.begin(Ok(()));
                    cancel_cause = Some(cause);
                    self.state = ListenerState::Draining;
                }

                final_result = &mut done_rx, if result.is_none() => {
                    result = Some(final_result.unwrap_or_else(|_| {
                        Err(TapError::Other("shutdown task ended without a result".into()))
                    }));
                }

                event = events.recv(), if !closed => match event {
                    Some(BlockEvent::Block(raw)) => {
                        if shutdown.started() {
                            tracing::trace!(number = raw.header.as_ref().map(|h| h.number), "draining block");
                            continue;
                        }
                        let outcome = match self.process(&raw).await {
                            Ok(number) => match self.end_block {
                                Some(end) if number >= end => {
                                    tracing::info!(number, end, "end block reached");
                                    Some(Ok(()))
                                }
                                _ => None,
                            },
                            Err(e) => {
                                tracing::error!(error = %e, "block processing failed");
                                Some(Err(e))
                            }
                        };
                        if let Some(outcome) = outcome {
                            shutdown.begin(outcome);
                            self.state = ListenerState::Draining;
                        }
                    }
                    Some(BlockEvent::Closed) | None => {
                        closed = true;
                        if shutdown.begin(Ok(())) {
                            tracing::info!("event source closed");
                            self.state = ListenerState::Draining;
                        } else {
                            tracing::debug!("drain confirmed");
                        }
                    }
                },
            }
        }

        self.state = ListenerState::Stopped;
        if let (Some(cause), Some(callback)) = (cancel_cause, &self.on_shutdown) {
            callback(&cause);
        }
        let result = result.unwrap_or(Ok(()));
        match &result {
            Ok(()) => tracing::info!("listener stopped"),
            Err(e) => tracing::warn!(error = %e, "listener stopped with error"),
        }
        result
    }

    async fn process(&self, raw: &proto::Block) -> Result<u64, TapError> {
        let block = Block::decode(raw)?;
        self.handler.handle(&block).await?;
        Ok(block.number)
    }
}

// ─── ListenerBuilder ─────────────────────────────────────────────────────────

/// Fluent builder for [`Listener`].
///
/// ```rust,no_run
/// # async fn run() -> Result<(), fabtap_core::TapError> {
/// use std::sync::Arc;
/// use fabtap_core::{BlockLogger, Listener, ReplaySource};
///
/// let mut listener = Listener::builder()
///     .source(Arc::new(ReplaySource::from_dir("./blocks").await?))
///     .handler(Box::new(BlockLogger::new(None)))
///     .start_block(0)
///     .end_block(100)
///     .build()
///     .await?;
/// listener.listen().await
/// # }
/// ```
#[derive(Default)]
pub struct ListenerBuilder {
    source: Option<Arc<dyn EventSource>>,
    handler: Option<Box<dyn BlockHandler>>,
    start_block: Option<u64>,
    end_block: Option<u64>,
    stop: Option<StopSignal>,
    on_shutdown: Option<ShutdownCallback>,
    resume: Option<Arc<dyn CursorStore>>,
}

impl ListenerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event source (required).
    pub fn source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the root block handler (required).
    pub fn handler(mut self, handler: Box<dyn BlockHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// First block to receive. Without one, the source starts at its newest block.
    pub fn start_block(mut self, block: u64) -> Self {
        self.start_block = Some(block);
        self
    }

    /// Stop after handling a block numbered `block` or higher.
    pub fn end_block(mut self, block: u64) -> Self {
        self.end_block = Some(block);
        self
    }

    /// Apply the bounds from a [`ListenerConfig`]; unset fields are left alone.
    pub fn config(mut self, config: &ListenerConfig) -> Self {
        if let Some(start) = config.start_block {
            self.start_block = Some(start);
        }
        if let Some(end) = config.end_block {
            self.end_block = Some(end);
        }
        self
    }

    /// Use an existing stop signal instead of a fresh one.
    pub fn stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Called with the cause after a stop-signal shutdown has finished.
    pub fn on_shutdown<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_shutdown = Some(Arc::new(callback));
        self
    }

    /// Start from the block saved in `store` unless a start block is set explicitly.
    pub fn resume_from(mut self, store: Arc<dyn CursorStore>) -> Self {
        self.resume = Some(store);
        self
    }

    pub async fn build(self) -> Result<Listener, TapError> {
        let source = self
            .source
            .ok_or_else(|| TapError::Config("event source is required".into()))?;
        let handler = self
            .handler
            .ok_or_else(|| TapError::Config("block handler is required".into()))?;

        let mut start_block = self.start_block;
        if let (None, Some(store)) = (start_block, &self.resume) {
            start_block = store.load().await?;
            if let Some(number) = start_block {
                tracing::info!(block = number, "resuming from cursor");
            }
        }

        if let (Some(start), Some(end)) = (start_block, self.end_block) {
            if end < start {
                return Err(TapError::Config(format!(
                    "end block {end} is before start block {start}"
                )));
            }
        }

        Ok(Listener {
            source,
            handler,
            start_block,
            end_block: self.end_block,
            stop: self.stop.unwrap_or_default(),
            on_shutdown: self.on_shutdown,
            state: ListenerState::Idle,
        })
    }
}
