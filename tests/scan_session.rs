use pia_wallet::{
    config::WalletConfig,
    db::get_unscan_records,
    scan::{ChannelEventSender, ProcessingEvent, ScanError, ScanStatusEvent},
    wallet::WalletContext,
};
use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method},
};

fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

async fn mount_head(server: &MockServer, height: u64) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "params": ["database_api", "get_dynamic_global_properties", []]
        })))
        .respond_with(rpc_result(json!({
            "head_block_number": height,
            "head_block_id": format!("head-{}", height),
            "last_irreversible_block_num": height - 1
        })))
        .mount(server)
        .await;
}

async fn mount_block(server: &MockServer, height: u64, operations: Vec<Value>) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "params": ["database_api", "get_block", [height]] })))
        .respond_with(rpc_result(json!({
            "block_number": height,
            "block_id": format!("block-{}", height),
            "previous": format!("block-{}", height - 1),
            "timestamp": "2019-06-04T08:25:36",
            "transactions": [{ "operations": operations }],
            "transaction_ids": [format!("tx-{}", height)]
        })))
        .mount(server)
        .await;
}

fn open_wallet(server: &MockServer) -> (TempDir, WalletContext) {
    let temp_dir = tempdir().unwrap();
    let config = WalletConfig {
        base_url: server.uri(),
        database_path: temp_dir.path().join("wallet.sqlite"),
        max_retries: 0,
        ..WalletConfig::default()
    };
    let context = WalletContext::open(config).unwrap();
    (temp_dir, context)
}

#[tokio::test]
async fn test_session_extracts_transfers_to_tracked_accounts() {
    let server = MockServer::start().await;
    mount_head(&server, 101).await;
    mount_block(&server, 100, vec![]).await;
    mount_block(
        &server,
        101,
        vec![
            json!(["transfer", {"from": "stranger", "to": "kencani", "amount": "2.50000000 PIA", "memo": "hi"}]),
            json!(["transfer", {"from": "stranger", "to": "other", "amount": "1.00000000 PIA", "memo": ""}]),
        ],
    )
    .await;

    let (_temp_dir, context) = open_wallet(&server);
    context
        .registry
        .register_account("acc-1", "kencani", None)
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let scanner = context.scanner(ChannelEventSender::new(tx));

    let summary = scanner.scan(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.start_height, 100);
    assert_eq!(summary.end_height, 101);
    assert_eq!(summary.blocks_scanned, 1);
    assert_eq!(summary.forks_detected, 0);
    assert_eq!(scanner.scanned_block_height().await.unwrap(), 101);
    drop(scanner);

    let mut extracted = Vec::new();
    let mut headers = Vec::new();
    let mut caught_up = false;
    while let Some(event) = rx.recv().await {
        match event {
            ProcessingEvent::ExtractData(e) => extracted.push(e),
            ProcessingEvent::NewBlock(header) => headers.push(header),
            ProcessingEvent::ScanStatus(ScanStatusEvent::CaughtUp { height }) => {
                assert_eq!(height, 101);
                caught_up = true;
            },
            ProcessingEvent::ScanStatus(_) => {},
        }
    }

    assert!(caught_up);
    assert_eq!(extracted.len(), 1);
    assert_eq!(extracted[0].account_key, "acc-1");
    let data = &extracted[0].data;
    assert_eq!(data.transaction.tx_id, "tx-101");
    assert_eq!(data.transaction.amount, "2.50000000");
    assert_eq!(data.transaction.block_hash, "block-101");
    assert!(data.inputs.is_empty());
    assert_eq!(data.outputs.len(), 1);
    assert_eq!(data.outputs[0].address, "kencani");

    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].height, 101);
    assert!(!headers[0].fork);

    let conn = context.pool.get().unwrap();
    assert!(get_unscan_records(&conn, "PIA").unwrap().is_empty());
}

#[tokio::test]
async fn test_rescan_of_unknown_block_is_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "block not found" }
        })))
        .mount(&server)
        .await;

    let (_temp_dir, context) = open_wallet(&server);
    let (tx, _rx) = mpsc::unbounded_channel();
    let scanner = context.scanner(ChannelEventSender::new(tx));

    let err = scanner.scan_block(500).await.unwrap_err();
    assert!(matches!(err, ScanError::Network(_)));
    assert_eq!(scanner.scanned_block_height().await.unwrap(), 0);

    let conn = context.pool.get().unwrap();
    let records = get_unscan_records(&conn, "PIA").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].block_height, 500);
}
