//! fabtap CLI: replay and inspect Fabric block files.
//!
//! # Commands
//! ```text
//! fabtap inspect --blocks <dir> [--start N] [--end N] [--follow] [--cursor <file>] [--tx-type <type>]
//! fabtap cursor  show|set <N>   [--cursor <file>]
//! fabtap hash    --number N --previous <hex> --data <hex>
//! fabtap hash    --block <file>
//! fabtap info
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fabtap_core::{Block, CursorConfig, TapConfig};

mod cmd_cursor;
mod cmd_inspect;
mod config;
mod logging;

#[derive(Parser)]
#[command(
    name = "fabtap",
    about = "Passive block listener for Hyperledger Fabric ledgers",
    long_about = "
fabtap replays serialized Fabric blocks through a chain of filters and loggers,
tracks progress in a cursor, and computes block hashes.

ENVIRONMENT VARIABLES:
  RUST_LOG    Log filter directives; overrides --log-level and the config file
",
    version
)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Default log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a directory of block files through the listener
    Inspect(InspectArgs),

    /// Show or overwrite the saved cursor
    Cursor {
        /// Cursor file (overrides the config file)
        #[arg(long, global = true)]
        cursor: Option<PathBuf>,

        #[command(subcommand)]
        action: CursorAction,
    },

    /// Compute a block hash
    Hash {
        /// Block number
        #[arg(long, conflicts_with = "block", required_unless_present = "block")]
        number: Option<u64>,
        /// Previous block hash (hex)
        #[arg(long, default_value = "")]
        previous: String,
        /// Data hash (hex)
        #[arg(long, default_value = "")]
        data: String,
        /// Serialized block file; hashes its header
        #[arg(long)]
        block: Option<PathBuf>,
    },

    /// Show build and capability info
    Info,
}

#[derive(Args)]
struct InspectArgs {
    /// Directory of `*.block` / `*.pb` files
    #[arg(long, default_value = "./blocks")]
    blocks: PathBuf,
    /// First block (inclusive)
    #[arg(long)]
    start: Option<u64>,
    /// Last block (inclusive); defaults to the last block file
    #[arg(long)]
    end: Option<u64>,
    /// Keep listening after the last block until Ctrl-C
    #[arg(long)]
    follow: bool,
    /// Cursor file; resumes from and updates the saved block
    #[arg(long)]
    cursor: Option<PathBuf>,
    /// Only handle blocks whose hex hash matches this regex
    #[arg(long)]
    block_hash: Option<String>,
    /// Only handle transactions whose ID matches this regex
    #[arg(long)]
    tx_id: Option<String>,
    /// Only handle transactions of this header type (name or number)
    #[arg(long)]
    tx_type: Option<String>,
    /// Also pass invalid and non-endorser transactions to the tx handlers
    #[arg(long)]
    all_txs: bool,
    /// Event channel capacity
    #[arg(long)]
    buffer: Option<usize>,
}

#[derive(Subcommand)]
enum CursorAction {
    /// Print the saved block number
    Show,
    /// Overwrite the saved block number
    Set {
        block: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        cfg.logging.level = level.clone();
    }
    if cli.json_logs {
        cfg.logging.json = true;
    }
    logging::init_tracing(&cfg.logging);

    match cli.command {
        Commands::Inspect(args) => {
            let follow = args.follow;
            let blocks = args.blocks.clone();
            apply_inspect_args(&mut cfg, args);
            cfg.validate()?;
            cmd_inspect::run(&cfg, &blocks, follow).await
        }

        Commands::Cursor { cursor, action } => {
            if let Some(path) = cursor {
                cfg.cursor = Some(CursorConfig::File { path });
            }
            match action {
                CursorAction::Show => cmd_cursor::show(&cfg).await,
                CursorAction::Set { block } => cmd_cursor::set(&cfg, block).await,
            }
        }

        Commands::Hash { number, previous, data, block } => match block {
            Some(path) => cmd_hash_file(&path),
            None => cmd_hash(number.unwrap_or_default(), &previous, &data),
        },

        Commands::Info => cmd_info(),
    }
}

/// Command-line flags win over the config file.
fn apply_inspect_args(cfg: &mut TapConfig, args: InspectArgs) {
    if args.start.is_some() {
        cfg.listener.start_block = args.start;
    }
    if args.end.is_some() {
        cfg.listener.end_block = args.end;
    }
    if let Some(buffer) = args.buffer {
        cfg.listener.channel_buffer = buffer;
    }
    if let Some(path) = args.cursor {
        cfg.cursor = Some(CursorConfig::File { path });
    }
    if args.block_hash.is_some() {
        cfg.filters.block_hash = args.block_hash;
    }
    if args.tx_id.is_some() {
        cfg.filters.tx_id = args.tx_id;
    }
    if args.tx_type.is_some() {
        cfg.filters.tx_type = args.tx_type;
    }
    if args.all_txs {
        cfg.filters.valid_endorser_only = false;
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn parse_hex(label: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.strip_prefix("0x").unwrap_or(value)).with_context(|| format!("invalid {label} hex"))
}

fn cmd_hash(number: u64, previous: &str, data: &str) -> Result<()> {
    let previous = parse_hex("previous hash", previous)?;
    let data = parse_hex("data hash", data)?;
    let der = fabtap_core::hash::encode_header(number, &previous, &data)?;
    let hash = fabtap_core::hash::block_hash(&fabtap_core::proto::BlockHeader {
        number,
        previous_hash: previous,
        data_hash: data,
    })?;
    println!("DER:  {}", hex::encode(der));
    println!("Hash: {}", hex::encode(hash));
    Ok(())
}

fn cmd_hash_file(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let block = Block::from_bytes(&bytes).with_context(|| format!("cannot decode {}", path.display()))?;
    println!("Block:    {}", block.number);
    println!("Previous: {}", hex::encode(&block.previous_hash));
    println!("Data:     {}", hex::encode(&block.data_hash));
    println!("Hash:     {}", block.hash_hex());
    println!("Txs:      {} ({} valid)", block.txs.len(), block.valid_tx_count());
    Ok(())
}

fn cmd_info() -> Result<()> {
    println!("fabtap v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Block handlers: BlockHashFilter, BlockLogger, CursorWriter, SinkWriter, TxFanOut");
    println!("Tx handlers:    TxIdFilter, TxTypeFilter, ValidEndorserFilter, TxLogger, InspectHandler");
    println!("Event sources:  ReplaySource (directory of *.block / *.pb files)");
    if cfg!(feature = "sqlite") {
        println!("Cursor stores:  file, sqlite");
    } else {
        println!("Cursor stores:  file");
    }
    Ok(())
}
