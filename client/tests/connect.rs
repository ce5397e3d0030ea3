use axum::routing::post;
use axum::{Json, Router};
use lit_client::{ClientConfig, LitClient};
use lit_network::NodeTransport;
use lit_nullables::{handshake_json, NullBlockhashProvider, NullRegistry, NullTransport};
use lit_protocol::Endpoint;
use lit_types::{
    ContractContext, LitError, LitNetwork, RetryPolicy, StakingState, ValidatorSnapshot,
};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

const A: &str = "http://127.0.0.1:7470";
const B: &str = "http://127.0.0.1:7471";
const C: &str = "http://127.0.0.1:7472";
const D: &str = "http://127.0.0.1:7473";

const SIGN: Endpoint = Endpoint::new("/web/pkp/sign", "/v2");

fn handshake_url(peer: &str) -> String {
    format!("{peer}/web/handshake")
}

fn static_config(peers: &[&str], min: usize) -> ClientConfig {
    ClientConfig {
        lit_network: LitNetwork::Localhost,
        bootstrap_urls: peers.iter().map(|p| p.to_string()).collect(),
        min_node_count: Some(min),
        connect_timeout_ms: 5_000,
        retry_policy: RetryPolicy::new(10_000, 0, 0),
        ..ClientConfig::default()
    }
}

fn chain_config() -> ClientConfig {
    ClientConfig {
        lit_network: LitNetwork::Custom,
        connect_timeout_ms: 5_000,
        retry_policy: RetryPolicy::new(10_000, 0, 0),
        epoch_propagation_delay_ms: 0,
        ..ClientConfig::default()
    }
}

fn snapshot(peers: &[&str], min: usize, epoch: u64) -> ValidatorSnapshot {
    ValidatorSnapshot {
        min_node_count: min,
        bootstrap_urls: peers.iter().map(|p| p.to_string()).collect(),
        epoch_number: epoch,
        epoch_start_time: None,
    }
}

fn scripted(peers: &[&str]) -> Arc<NullTransport> {
    let transport = Arc::new(NullTransport::new());
    for peer in peers {
        transport.respond(handshake_url(peer), handshake_json("net", "0xaa"));
    }
    transport
}

fn client(config: ClientConfig, transport: Arc<NullTransport>) -> LitClient {
    let transport: Arc<dyn NodeTransport> = transport;
    LitClient::builder(config)
        .transport(transport)
        .blockhash_provider(Arc::new(NullBlockhashProvider::failing()))
        .build()
        .unwrap()
}

fn first_call_to(transport: &NullTransport, url: &str) -> serde_json::Value {
    transport
        .calls()
        .into_iter()
        .find(|c| c.url == url)
        .map(|c| c.body)
        .unwrap()
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn connects_at_quorum_and_publishes_the_snapshot() {
    let transport = Arc::new(NullTransport::new());
    transport
        .respond_after(handshake_url(A), Duration::from_millis(100), handshake_json("net", "0xaa"))
        .respond_after(handshake_url(B), Duration::from_millis(100), handshake_json("net", "0xaa"))
        .respond_after(handshake_url(C), Duration::from_millis(5_000), handshake_json("net", "0xaa"));
    let client = client(static_config(&[A, B, C], 2), transport);

    let started = Instant::now();
    let consensus = client.connect().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(client.is_ready());
    assert_eq!(consensus.network_pub_key, "net");
    assert_eq!(consensus.latest_blockhash, "0xaa");
    assert_eq!(client.consensus().as_deref(), Some(consensus.as_ref()));
    assert_eq!(
        client.connected_peers().into_iter().collect::<BTreeSet<_>>(),
        BTreeSet::from([A.to_string(), B.to_string()])
    );
    assert_eq!(
        client.node_set().into_iter().collect::<BTreeSet<_>>(),
        BTreeSet::from(["127.0.0.1:7470".to_string(), "127.0.0.1:7471".to_string()])
    );
    let snapshot = client.snapshot().unwrap();
    assert_eq!(snapshot.min_node_count, 2);
    assert_eq!(snapshot.peer_results.len(), 2);
}

#[tokio::test]
async fn concurrent_connects_share_one_round() {
    let transport = Arc::new(NullTransport::new());
    for peer in [A, B, C] {
        transport.respond_after(handshake_url(peer), Duration::from_millis(50), handshake_json("net", "0xaa"));
    }
    let client = client(static_config(&[A, B, C], 3), transport.clone());

    let (first, second) = tokio::join!(client.connect(), client.connect());

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn a_later_connect_runs_a_new_round() {
    let transport = scripted(&[A, B]);
    let client = client(static_config(&[A, B], 2), transport.clone());

    client.connect().await.unwrap();
    client.connect().await.unwrap();

    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn failed_first_connect_leaves_the_client_unready() {
    let transport = Arc::new(NullTransport::new());
    transport
        .respond(handshake_url(A), handshake_json("net", "0xaa"))
        .fail(handshake_url(B), LitError::NodeNotAuthorized("denied".into()));
    let client = client(static_config(&[A, B], 2), transport);

    let err = client.connect().await.unwrap_err();

    assert_eq!(err, LitError::NodeNotAuthorized("denied".into()));
    assert!(!client.is_ready());
    assert!(client.snapshot().is_none());
}

#[tokio::test]
async fn chain_resolved_without_peers_fails_before_any_handshake() {
    let transport = Arc::new(NullTransport::new());
    let registry = Arc::new(NullRegistry::new(snapshot(&[], 2, 5)));
    let client = LitClient::builder(chain_config())
        .transport(transport.clone())
        .registry(registry)
        .build()
        .unwrap();

    let err = client.connect().await.unwrap_err();

    assert!(matches!(err, LitError::InvalidArgument(_)), "{err:?}");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn chain_resolved_without_a_staking_contract_is_rejected() {
    let transport = Arc::new(NullTransport::new());
    let client = client(chain_config(), transport.clone());

    let err = client.connect().await.unwrap_err();

    assert!(matches!(err, LitError::InvalidArgument(_)), "{err:?}");
    assert_eq!(transport.call_count(), 0);
    let epoch = client.get_current_epoch_number().await.unwrap_err();
    assert!(matches!(epoch, LitError::UnknownError(_)), "{epoch:?}");
}

/// Answers the staking contract's validator query with peers A and B in epoch 9.
async fn staking_rpc(Json(request): Json<Value>) -> Json<Value> {
    let word = |v: u64| format!("{v:064x}");
    let localhost = u64::from(u32::from_be_bytes([127, 0, 0, 1]));
    let result = match request["method"].as_str() {
        Some("eth_call") => {
            let words = [
                3_600, 9, 1_700_003_600, 0, 60,
                2, 7 * 32,
                2,
                localhost, 0, 7470, 0xaa, 0, 0, 0,
                localhost, 0, 7471, 0xbb, 0, 0, 0,
            ];
            json!(format!("0x{}", words.map(word).concat()))
        }
        Some("eth_blockNumber") => json!("0x1"),
        Some("eth_getLogs") => json!([]),
        _ => Value::Null,
    };
    Json(json!({"jsonrpc": "2.0", "id": 1, "result": result}))
}

#[tokio::test]
async fn chain_resolved_network_reads_its_peers_over_rpc_by_default() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().route("/", post(staking_rpc)))
            .await
            .unwrap();
    });
    let config = ClientConfig {
        rpc_url: Some(format!("http://{addr}/")),
        contract_context: Some(ContractContext {
            staking_address: Some("0x5fbdb2315678afecb367f032d93f642f64180aa3".into()),
            ..ContractContext::default()
        }),
        ..chain_config()
    };
    let client = client(config, scripted(&[A, B]));

    client.connect().await.unwrap();

    assert!(client.is_ready());
    assert_eq!(
        client.connected_peers().into_iter().collect::<BTreeSet<_>>(),
        BTreeSet::from([A.to_string(), B.to_string()])
    );
    assert_eq!(client.epoch_state().await.number, Some(9));
    assert_eq!(client.get_current_epoch_number().await.unwrap(), 9);
}

#[tokio::test]
async fn chain_resolved_connect_tracks_epoch_and_watches_the_registry() {
    let transport = scripted(&[A, B, C]);
    let registry = Arc::new(NullRegistry::new(snapshot(&[A, B, C], 2, 7)));
    let client = LitClient::builder(chain_config())
        .transport(transport.clone())
        .registry(registry.clone())
        .build()
        .unwrap();

    client.connect().await.unwrap();

    assert_eq!(client.epoch_state().await.number, Some(7));
    assert_eq!(registry.listener_count(), 1);
    let stamped = first_call_to(&transport, &handshake_url(A));
    assert_eq!(stamped["epochNumber"], json!(7));

    registry.set_epoch(8);
    assert_eq!(client.get_current_epoch_number().await.unwrap(), 8);
}

#[tokio::test]
async fn validator_set_change_triggers_a_reconnect_to_the_new_peers() {
    let transport = scripted(&[A, B, C, D]);
    let registry = Arc::new(NullRegistry::new(snapshot(&[A, B, C], 2, 7)));
    let client = LitClient::builder(chain_config())
        .transport(transport.clone())
        .registry(registry.clone())
        .build()
        .unwrap();
    client.connect().await.unwrap();

    registry.set_snapshot(snapshot(&[B, C, D], 3, 8));
    assert_eq!(registry.emit(StakingState::NextValidatorSetLocked), 1);

    let reconnected = eventually(|| {
        client
            .snapshot()
            .is_some_and(|s| s.bootstrap_urls.iter().any(|u| u == D) && s.connected_peers.len() == 3)
    })
    .await;
    assert!(reconnected);
    assert_eq!(client.epoch_state().await.number, Some(8));
    assert!(eventually(|| registry.listener_count() == 1).await);
}

#[tokio::test]
async fn unchanged_validator_set_only_refreshes_the_epoch() {
    let transport = scripted(&[A, B, C]);
    let registry = Arc::new(NullRegistry::new(snapshot(&[A, B, C], 2, 7)));
    let client = LitClient::builder(chain_config())
        .transport(transport.clone())
        .registry(registry.clone())
        .build()
        .unwrap();
    client.connect().await.unwrap();
    let calls_after_connect = transport.call_count();

    registry.set_snapshot(snapshot(&[C, B, A], 2, 8));
    registry.emit(StakingState::NextValidatorSetLocked);

    let mut refreshed = false;
    for _ in 0..100 {
        if client.epoch_state().await.number == Some(8) {
            refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(refreshed);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.call_count(), calls_after_connect);
}

#[tokio::test]
async fn disconnect_releases_the_registry_subscription() {
    let registry = Arc::new(NullRegistry::new(snapshot(&[A, B], 2, 7)));
    let client = LitClient::builder(chain_config())
        .transport(scripted(&[A, B]))
        .registry(registry.clone())
        .build()
        .unwrap();
    client.connect().await.unwrap();
    assert_eq!(registry.listener_count(), 1);

    client.disconnect();

    assert!(!client.is_ready());
    assert!(eventually(|| registry.listener_count() == 0).await);
    assert!(client.snapshot().is_some());
}

fn slow_peers(peers: &[&str], delay: Duration) -> Arc<NullTransport> {
    let transport = Arc::new(NullTransport::new());
    for peer in peers {
        transport.respond_after(handshake_url(peer), delay, handshake_json("net", "0xaa"));
    }
    transport
}

#[tokio::test]
async fn disconnect_during_a_round_discards_its_result() {
    let transport = slow_peers(&[A, B], Duration::from_millis(200));
    let config = ClientConfig {
        blockhash_sync_interval_ms: 50,
        ..static_config(&[A, B], 2)
    };
    let client = client(config, transport.clone());

    let connecting = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.disconnect();

    let err = connecting.await.unwrap().unwrap_err();
    assert!(matches!(err, LitError::InitError(_)), "{err:?}");
    assert!(!client.is_ready());
    assert!(client.snapshot().is_none());

    // A background sync armed by the abandoned round would handshake again.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn disconnect_during_a_chain_resolved_round_leaves_no_subscription() {
    let registry = Arc::new(NullRegistry::new(snapshot(&[A, B], 2, 7)));
    let client = LitClient::builder(chain_config())
        .transport(slow_peers(&[A, B], Duration::from_millis(200)))
        .registry(registry.clone())
        .build()
        .unwrap();

    let connecting = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.disconnect();

    assert!(connecting.await.unwrap().is_err());
    assert!(!client.is_ready());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(registry.listener_count(), 0);
}

#[tokio::test]
async fn connect_after_disconnect_starts_a_fresh_round() {
    let transport = slow_peers(&[A, B], Duration::from_millis(200));
    let client = client(static_config(&[A, B], 2), transport.clone());

    let abandoned = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.disconnect();

    let consensus = client.connect().await.unwrap();

    assert!(abandoned.await.unwrap().is_err());
    assert_eq!(consensus.network_pub_key, "net");
    assert!(client.is_ready());
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn latest_blockhash_comes_from_the_handshake_while_fresh() {
    let provider = Arc::new(NullBlockhashProvider::succeeding("0xfromindexer"));
    let client = LitClient::builder(static_config(&[A, B], 2))
        .transport(scripted(&[A, B]))
        .blockhash_provider(provider.clone())
        .build()
        .unwrap();
    client.connect().await.unwrap();

    assert_eq!(client.get_latest_blockhash().await.unwrap(), "0xaa");
    assert_eq!(provider.fetches(), 0);
}

#[tokio::test]
async fn latest_blockhash_before_connect_uses_the_provider() {
    let provider = Arc::new(NullBlockhashProvider::succeeding("0xfromindexer"));
    let client = LitClient::builder(static_config(&[A, B], 2))
        .transport(scripted(&[A, B]))
        .blockhash_provider(provider.clone())
        .build()
        .unwrap();

    assert_eq!(client.get_latest_blockhash().await.unwrap(), "0xfromindexer");
    assert_eq!(provider.fetches(), 1);
}

#[tokio::test]
async fn stale_blockhash_triggers_a_background_resync() {
    let transport = scripted(&[A, B]);
    let config = ClientConfig {
        blockhash_sync_interval_ms: 50,
        ..static_config(&[A, B], 2)
    };
    let client = client(config, transport.clone());
    client.connect().await.unwrap();

    assert!(eventually(|| transport.call_count() >= 4).await);
    assert!(client.is_ready());
}

#[tokio::test]
async fn send_to_quorum_returns_the_first_successes() {
    let transport = scripted(&[A, B, C]);
    transport
        .respond(format!("{A}/web/pkp/sign/v2"), json!({"share": "a"}))
        .respond(format!("{B}/web/pkp/sign/v2"), json!({"share": "b"}))
        .respond_after(format!("{C}/web/pkp/sign/v2"), Duration::from_secs(5), json!({"share": "c"}));
    let client = client(static_config(&[A, B, C], 3), transport.clone());
    client.connect().await.unwrap();

    let responses = client
        .send_to_quorum(&SIGN, |peer| json!({"peer": peer}), Some(2))
        .await
        .unwrap();

    let peers: BTreeSet<_> = responses.iter().map(|(peer, _)| peer.clone()).collect();
    assert_eq!(peers, BTreeSet::from([A.to_string(), B.to_string()]));
    let sent = first_call_to(&transport, &format!("{A}/web/pkp/sign/v2"));
    assert_eq!(sent["peer"], json!(A));
}

#[tokio::test]
async fn send_to_quorum_maps_unauthorized_nodes() {
    let transport = scripted(&[A, B]);
    let denied = LitError::NodeError {
        error_code: Some("NodeNotAuthorized".into()),
        error_kind: Some("Validation".into()),
        status: Some(401),
        message: "session expired".into(),
    };
    for peer in [A, B] {
        transport.fail(format!("{peer}/web/pkp/sign/v2"), denied.clone());
    }
    let config = ClientConfig {
        alert_when_unauthorized: true,
        ..static_config(&[A, B], 2)
    };
    let client = client(config, transport);
    client.connect().await.unwrap();

    let err = client
        .send_to_quorum(&SIGN, |_| json!({}), None)
        .await
        .unwrap_err();

    assert!(matches!(err, LitError::NodeNotAuthorized(_)), "{err:?}");
}

#[tokio::test]
async fn send_to_quorum_requires_a_connection() {
    let transport = Arc::new(NullTransport::new());
    let client = client(static_config(&[A, B], 2), transport.clone());

    let err = client.send_to_quorum(&SIGN, |_| json!({}), None).await.unwrap_err();

    assert!(matches!(err, LitError::InitError(_)));
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn build_rejects_invalid_settings() {
    let config = ClientConfig {
        connect_timeout_ms: 0,
        ..static_config(&[A], 1)
    };
    assert!(matches!(
        LitClient::builder(config).build(),
        Err(LitError::InvalidArgument(_))
    ));
}
