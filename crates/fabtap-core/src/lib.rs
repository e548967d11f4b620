//! fabtap-core: passive block listener for Hyperledger Fabric style ledgers.
//!
//! # Architecture
//!
//! ```text
//! EventSource ──BlockEvent──▶ Listener
//!                                ├── Block::decode   (hash engine + tx decoder)
//!                                └── BlockHandler chain
//!                                      ├── CursorWriter / SinkWriter / BlockLogger / BlockHashFilter
//!                                      └── TxFanOut ──▶ TxHandler chain
//!                                                         (TxIdFilter / TxTypeFilter / ValidEndorserFilter / TxLogger / InspectHandler)
//! ```

pub mod block;
pub mod config;
pub mod cursor;
pub mod error;
pub mod handler;
pub mod hash;
pub mod listener;
pub mod proto;
pub mod sink;
pub mod source;
pub mod tx;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use block::Block;
pub use config::{CursorConfig, FilterConfig, ListenerConfig, LogConfig, TapConfig};
pub use cursor::{CursorStore, FileCursorStore, MemoryCursorStore};
pub use error::{DecodeError, HashError, Layer, TapError};
pub use handler::{
    BlockHandler, BlockHashFilter, BlockLogger, CursorWriter, InspectHandler, SinkWriter,
    TxFanOut, TxHandler, TxIdFilter, TxLogger, TxTypeFilter, ValidEndorserFilter,
};
pub use listener::{Listener, ListenerBuilder, ListenerState, StopSignal};
pub use sink::{MetadataSink, SinkRecord};
pub use source::{BlockEvent, EventSource, Registration, ReplaySource};
pub use tx::Tx;
pub use types::{HeaderType, ValidationCode};
