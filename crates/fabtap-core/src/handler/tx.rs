//! Transaction-level handlers.

use async_trait::async_trait;
use regex::Regex;

use super::block::compile;
use super::{run_actions, TxAction, TxHandler};
use crate::error::TapError;
use crate::tx::Tx;
use crate::types::HeaderType;

async fn delegate(next: &Option<Box<dyn TxHandler>>, tx: &Tx) -> Result<(), TapError> {
    match next {
        Some(next) => next.handle(tx).await,
        None => Ok(()),
    }
}

/// Passes transactions whose ID matches a regular expression.
pub struct TxIdFilter {
    pattern: Regex,
    next: Option<Box<dyn TxHandler>>,
    filtered_actions: Vec<TxAction>,
}

impl TxIdFilter {
    /// Fails with [`TapError::Config`] when `pattern` does not compile.
    pub fn new(next: Option<Box<dyn TxHandler>>, pattern: &str) -> Result<Self, TapError> {
        Ok(Self {
            pattern: compile(pattern)?,
            next,
            filtered_actions: Vec::new(),
        })
    }

    pub fn with_action(mut self, action: TxAction) -> Self {
        self.filtered_actions.push(action);
        self
    }
}

#[async_trait]
impl TxHandler for TxIdFilter {
    async fn handle(&self, tx: &Tx) -> Result<(), TapError> {
        if self.pattern.is_match(tx.id()) {
            return delegate(&self.next, tx).await;
        }
        run_actions(&self.filtered_actions, tx)
    }
}

pub(crate) fn parse_header_type(value: &str) -> Result<HeaderType, TapError> {
    HeaderType::parse(value)
        .ok_or_else(|| TapError::Config(format!("unknown transaction header type '{value}'")))
}

/// Passes transactions of one header type.
pub struct TxTypeFilter {
    header_type: HeaderType,
    next: Option<Box<dyn TxHandler>>,
    filtered_actions: Vec<TxAction>,
}

impl TxTypeFilter {
    pub fn new(next: Option<Box<dyn TxHandler>>, header_type: HeaderType) -> Self {
        Self {
            header_type,
            next,
            filtered_actions: Vec::new(),
        }
    }

    /// Accepts a Fabric header type name or its numeric value.
    pub fn parse(next: Option<Box<dyn TxHandler>>, value: &str) -> Result<Self, TapError> {
        Ok(Self::new(next, parse_header_type(value)?))
    }

    pub fn header_type(&self) -> HeaderType {
        self.header_type
    }

    pub fn with_action(mut self, action: TxAction) -> Self {
        self.filtered_actions.push(action);
        self
    }
}

#[async_trait]
impl TxHandler for TxTypeFilter {
    async fn handle(&self, tx: &Tx) -> Result<(), TapError> {
        if tx.header_type() == self.header_type {
            return delegate(&self.next, tx).await;
        }
        run_actions(&self.filtered_actions, tx)
    }
}

/// Passes only valid endorser transactions.
pub struct ValidEndorserFilter {
    next: Option<Box<dyn TxHandler>>,
    filtered_actions: Vec<TxAction>,
}

impl ValidEndorserFilter {
    pub fn new(next: Option<Box<dyn TxHandler>>) -> Self {
        Self {
            next,
            filtered_actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: TxAction) -> Self {
        self.filtered_actions.push(action);
        self
    }
}

#[async_trait]
impl TxHandler for ValidEndorserFilter {
    async fn handle(&self, tx: &Tx) -> Result<(), TapError> {
        if tx.is_valid_endorser() {
            return delegate(&self.next, tx).await;
        }
        run_actions(&self.filtered_actions, tx)
    }
}

/// Logs a one-line summary of every transaction.
pub struct TxLogger {
    next: Option<Box<dyn TxHandler>>,
}

impl TxLogger {
    pub fn new(next: Option<Box<dyn TxHandler>>) -> Self {
        Self { next }
    }
}

#[async_trait]
impl TxHandler for TxLogger {
    async fn handle(&self, tx: &Tx) -> Result<(), TapError> {
        tracing::info!(
            id = tx.id(),
            header_type = %tx.header_type(),
            validation = %tx.validation_code,
            timestamp = %tx.timestamp_string(),
            "tx"
        );
        delegate(&self.next, tx).await
    }
}
