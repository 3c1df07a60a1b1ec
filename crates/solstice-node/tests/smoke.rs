//! End-to-end smoke test for solstice-node.
//!
//! Starts a real node process against a freshly written genesis file and
//! queries the read-only RPC surface (§6.3) to confirm genesis state landed
//! correctly. Nothing here submits a transaction — this RPC surface never
//! accepts one; that is the block pipeline's job, driven by a networking
//! layer this workspace doesn't wire up.
//!
//! Run with:
//!   cargo test -p solstice-node --test smoke

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use jsonrpsee::http_client::HttpClientBuilder;

use solstice_core::PublicKeyType;
use solstice_genesis::{
    GenesisAccount, GenesisBalance, GenesisCommitteeMember, GenesisParams, GenesisWitness,
};
use solstice_rpc::SolsticeApiClient;

struct NodeGuard {
    child: Child,
    data_dir: PathBuf,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn key(byte: u8) -> PublicKeyType {
    let mut k = [0u8; 33];
    k[0] = 0x02;
    k[1] = byte;
    PublicKeyType(k)
}

fn write_genesis_params(path: &std::path::Path) {
    let params = GenesisParams {
        initial_timestamp: 1_700_000_000,
        core_asset_symbol: "CORE".to_string(),
        max_core_supply: 1_000_000_000_000,
        initial_accounts: vec![GenesisAccount {
            name: "init0".to_string(),
            owner_key: key(1),
            active_key: None,
            is_lifetime_member: true,
        }],
        initial_witness_candidates: vec![GenesisWitness {
            owner_name: "init0".to_string(),
            block_signing_key: key(2),
        }],
        initial_committee_candidates: vec![GenesisCommitteeMember {
            owner_name: "init0".to_string(),
        }],
        initial_active_witnesses: 1,
        initial_balances: vec![GenesisBalance {
            owner_name: "init0".to_string(),
            amount: 5_000,
        }],
    };
    std::fs::write(path, serde_json::to_string(&params).unwrap()).unwrap();
}

async fn wait_for_rpc(client: &jsonrpsee::http_client::HttpClient, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if client.get_chain_stats().await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    false
}

#[tokio::test]
async fn smoke_genesis_is_queryable_over_rpc() {
    let data_dir = std::env::temp_dir().join(format!("solstice_e2e_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();

    let params_path = data_dir.join("genesis-params.json");
    write_genesis_params(&params_path);

    let rpc_port = free_port();
    let rpc_url = format!("http://127.0.0.1:{rpc_port}");

    let node_bin = env!("CARGO_BIN_EXE_solstice-node");
    let child = Command::new(node_bin)
        .args([
            "--data-dir",
            data_dir.join("state").to_str().unwrap(),
            "--rpc-addr",
            &format!("127.0.0.1:{rpc_port}"),
            "--genesis-params",
            params_path.to_str().unwrap(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn solstice-node");

    let _guard = NodeGuard { child, data_dir };

    let client = HttpClientBuilder::default().build(&rpc_url).unwrap();
    assert!(
        wait_for_rpc(&client, Duration::from_secs(20)).await,
        "solstice-node did not become ready within 20 seconds"
    );

    // ── Chain stats reflect genesis, not an empty chain ───────────────────────
    let stats = client.get_chain_stats().await.unwrap();
    assert_eq!(stats.head_block_number, 0);
    assert_eq!(stats.active_witnesses, 1);
    assert_eq!(stats.active_committee_members, 1);

    // ── The lifetime-member account created at genesis is findable by name ────
    let matches = client
        .lookup_accounts("init0".to_string(), 10)
        .await
        .unwrap();
    let (_, init0_id) = matches
        .into_iter()
        .find(|(name, _)| name == "init0")
        .expect("init0 should be registered at genesis");

    // ── Its genesis balance carve-out landed ──────────────────────────────────
    let core_asset_id = "1.2.0".to_string();
    let balances = client
        .get_account_balances(init0_id, vec![core_asset_id.clone()])
        .await
        .unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].amount, "5000");

    // ── Sentinel accounts exist too ────────────────────────────────────────────
    let sentinels = client.lookup_accounts(String::new(), 100).await.unwrap();
    assert!(sentinels.iter().any(|(name, _)| name == "temp-account"));
    assert!(sentinels.iter().any(|(name, _)| name == "witness-account"));
    assert!(sentinels.iter().any(|(name, _)| name == "committee-account"));

    // ── An untraded market has an empty but well-formed order book ───────────
    let book = client
        .get_order_book(core_asset_id.clone(), core_asset_id, 10)
        .await
        .unwrap();
    assert!(book.bids.is_empty());
    assert!(book.asks.is_empty());
}
