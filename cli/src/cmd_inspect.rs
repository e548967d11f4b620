//! `fabtap inspect`: replay a directory of block files through the listener.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use fabtap_core::handler::{
    block_filtered_by_hash, tx_filtered_by_hash, tx_filtered_by_type, tx_filtered_by_valid_endorser,
};
use fabtap_core::{
    BlockHandler, BlockHashFilter, BlockLogger, CursorWriter, FilterConfig, InspectHandler,
    Listener, ReplaySource, SinkWriter, TapConfig, TxFanOut, TxHandler, TxIdFilter, TxLogger,
    TxTypeFilter, ValidEndorserFilter,
};

use crate::config::{open_backend, Backend};

/// Transaction chain: id filter, type filter, valid-endorser filter, logger, inspector.
fn tx_chain(filters: &FilterConfig) -> Result<Box<dyn TxHandler>> {
    let mut chain: Box<dyn TxHandler> = Box::new(TxLogger::new(Some(Box::new(InspectHandler::new()))));
    if filters.valid_endorser_only {
        chain = Box::new(
            ValidEndorserFilter::new(Some(chain)).with_action(tx_filtered_by_valid_endorser()),
        );
    }
    if let Some(header_type) = &filters.tx_type {
        let filter = TxTypeFilter::parse(Some(chain), header_type)?;
        tracing::info!(header_type = %filter.header_type(), "tx type filter");
        chain = Box::new(filter.with_action(tx_filtered_by_type()));
    }
    if let Some(pattern) = &filters.tx_id {
        chain = Box::new(TxIdFilter::new(Some(chain), pattern)?.with_action(tx_filtered_by_hash()));
    }
    Ok(chain)
}

/// Block chain: cursor writer, sink writer, logger, hash filter, tx fan-out.
pub fn block_chain(filters: &FilterConfig, backend: Option<&Backend>) -> Result<Box<dyn BlockHandler>> {
    let mut chain: Box<dyn BlockHandler> = Box::new(TxFanOut::new(tx_chain(filters)?));
    if let Some(pattern) = &filters.block_hash {
        chain = Box::new(
            BlockHashFilter::new(Some(chain), pattern)?.with_action(block_filtered_by_hash()),
        );
    }
    chain = Box::new(BlockLogger::new(Some(chain)));
    if let Some(backend) = backend {
        if let Some(sink) = &backend.sink {
            chain = Box::new(SinkWriter::new(Some(chain), sink.clone()));
        }
        chain = Box::new(CursorWriter::new(Some(chain), backend.cursor.clone()));
    }
    Ok(chain)
}

pub async fn run(config: &TapConfig, blocks: &Path, follow: bool) -> Result<()> {
    let source = ReplaySource::from_dir(blocks)
        .await
        .with_context(|| format!("cannot load blocks from {}", blocks.display()))?
        .with_buffer(config.listener.channel_buffer);
    let Some(last) = source.last_block_number() else {
        bail!("no block files (*.block, *.pb) in {}", blocks.display());
    };
    tracing::info!(blocks = source.len(), last, dir = %blocks.display(), "loaded block files");

    let backend = match &config.cursor {
        Some(cursor) => Some(open_backend(cursor).await?),
        None => None,
    };

    let mut listener_config = config.listener.clone();
    if !follow && listener_config.end_block.is_none() {
        listener_config.end_block = Some(last);
    }
    if let Some(end) = listener_config.end_block {
        if end > last {
            tracing::warn!(end, last, "end block is past the last block file; waiting for Ctrl-C");
        }
    }

    let mut builder = Listener::builder()
        .source(Arc::new(source))
        .handler(block_chain(&config.filters, backend.as_ref())?)
        .config(&listener_config)
        .on_shutdown(|cause| tracing::info!(cause, "listener shut down"));
    if let Some(backend) = &backend {
        builder = builder.resume_from(backend.cursor.clone());
    }
    let mut listener = builder.build().await?;

    let stop = listener.stop_signal();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop("SIGINT");
        }
    });

    let result = listener.listen().await;
    ctrl_c.abort();
    result.context("listener failed")?;

    if let Some(backend) = &backend {
        if let Some(number) = backend.cursor.load().await? {
            println!("cursor: {number}");
        }
    }
    Ok(())
}
