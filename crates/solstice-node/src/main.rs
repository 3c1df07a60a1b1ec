//! solstice-node — the full-node binary.
//!
//! Startup sequence:
//!   1. Open the append-only block archive (§6.2 / C3)
//!   2. Apply genesis (§4.6) into a fresh in-memory [`Database`], then
//!      replay every block the archive already holds on top of it
//!   3. Start the read-only JSON-RPC 2.0 server (§6.3)
//!
//! No gossip transport and no block production loop run here — `solstice-p2p`
//! defines the chain-sync contract a networking layer would drive `Chain`
//! through, but wiring an actual wire protocol onto it is out of scope.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::RwLock;
use tracing::info;

use solstice_chain::database::Database;
use solstice_chain::Chain;
use solstice_forkdb::BlockStore;
use solstice_genesis::{apply_genesis, GenesisParams};
use solstice_rpc::{RpcServer, RpcServerState};

#[derive(Parser, Debug)]
#[command(name = "solstice-node", version, about = "Solstice full node")]
struct Args {
    /// Directory for the persistent block archive.
    #[arg(long, default_value = "~/.solstice/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8545")]
    rpc_addr: SocketAddr,

    /// Path to genesis params JSON. Required on every run: state is rebuilt
    /// by replaying the archive on top of genesis rather than loaded from a
    /// persisted snapshot, so restarts must point at the same genesis file
    /// the archive was first built from.
    #[arg(long)]
    genesis_params: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,solstice=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("solstice node starting");

    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let block_store =
        BlockStore::open(data_dir.join("blocks")).context("opening block archive")?;

    let params = load_genesis_params(&args.genesis_params)?;
    let chain = build_chain(block_store, &params)?;

    info!(
        head_block_number = chain.head_block_number(),
        chain_id = %chain.chain_id(),
        "chain ready"
    );

    let chain = Arc::new(RwLock::new(chain));
    let rpc_state = Arc::new(RpcServerState { chain });
    let rpc_handle = RpcServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    info!("node ready");
    rpc_handle.stopped().await;
    Ok(())
}

/// Applies genesis into a fresh [`Database`], then replays every block the
/// archive already holds on top of it — the archive is the only thing this
/// binary persists across restarts, so the in-memory object tables are
/// always rebuilt rather than loaded from a snapshot.
fn build_chain(block_store: BlockStore, params: &GenesisParams) -> anyhow::Result<Chain> {
    let mut db = Database::new();
    let chain_id = apply_genesis(&mut db, params).context("applying genesis")?;
    let mut chain = Chain::new(db, block_store, chain_id);

    match archive_head_num(&chain)? {
        Some(archive_head) => {
            info!(archive_head, "replaying archived blocks onto genesis");
            for num in 1..=archive_head {
                let block = chain
                    .get_block_by_num(num)?
                    .ok_or_else(|| anyhow::anyhow!("archive missing block {num} during replay"))?;
                chain
                    .push_block(block)
                    .with_context(|| format!("replaying block {num}"))?;
            }
        }
        None => info!("fresh archive — starting from genesis"),
    }

    Ok(chain)
}

/// Highest block number present in the archive, or `None` if it holds
/// nothing past genesis. Block 1 is the first non-genesis block, so its
/// presence is what distinguishes a fresh archive from one with history.
fn archive_head_num(chain: &Chain) -> anyhow::Result<Option<u32>> {
    if chain.get_block_by_num(1)?.is_none() {
        return Ok(None);
    }
    let mut num = 1;
    while chain.get_block_by_num(num + 1)?.is_some() {
        num += 1;
    }
    Ok(Some(num))
}

fn load_genesis_params(path: &Path) -> anyhow::Result<GenesisParams> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading genesis params from {}", path.display()))?;
    serde_json::from_str(&json).context("parsing genesis params JSON")
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
