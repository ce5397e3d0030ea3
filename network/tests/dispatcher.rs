use lit_network::{NetworkMetrics, NodeTransport, RequestDispatcher};
use lit_nullables::NullTransport;
use lit_protocol::{RequestId, HEADER_REQUEST_ID, HEADER_SDK_TYPE, HEADER_SDK_VERSION, SDK_TYPE};
use lit_types::{EpochState, LitError, RetryPolicy, Timestamp};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const URL: &str = "http://127.0.0.1:7470/web/execute";

fn dispatcher(
    transport: Arc<NullTransport>,
    epoch: EpochState,
    policy: RetryPolicy,
) -> (RequestDispatcher, Arc<NetworkMetrics>) {
    let metrics = Arc::new(NetworkMetrics::new().unwrap());
    let transport: Arc<dyn NodeTransport> = transport;
    (
        RequestDispatcher::new(transport, Arc::new(RwLock::new(epoch)), policy, metrics.clone()),
        metrics,
    )
}

#[tokio::test]
async fn stamps_epoch_and_headers_and_strips_session_sigs() {
    let transport = Arc::new(NullTransport::new());
    transport.respond(URL, json!({"ok": true}));
    let epoch = EpochState::new(7, None, Timestamp::now());
    let (dispatcher, metrics) = dispatcher(transport.clone(), epoch, RetryPolicy::default());

    let body = json!({"code": "x", "sessionSigs": {"http://a": "sig"}});
    let response = dispatcher
        .send(URL, &RequestId::from_raw("abc"), &body)
        .await
        .unwrap();
    assert_eq!(response, json!({"ok": true}));

    let call = &transport.calls()[0];
    assert_eq!(call.body["epochNumber"], 7);
    assert_eq!(call.body["code"], "x");
    assert!(call.body.get("sessionSigs").is_none());
    assert_eq!(call.header(HEADER_REQUEST_ID), Some("lit_abc"));
    assert_eq!(call.header(HEADER_SDK_TYPE), Some(SDK_TYPE));
    assert!(call.header(HEADER_SDK_VERSION).is_some());
    assert_eq!(metrics.requests_dispatched.get(), 1);
}

#[tokio::test]
async fn unknown_epoch_is_sent_as_null() {
    let transport = Arc::new(NullTransport::new());
    transport.respond(URL, json!({}));
    let (dispatcher, _) = dispatcher(transport.clone(), EpochState::default(), RetryPolicy::default());

    dispatcher
        .send(URL, &RequestId::from_raw("1"), &json!({}))
        .await
        .unwrap();
    assert!(transport.calls()[0].body["epochNumber"].is_null());
}

#[tokio::test]
async fn epoch_is_read_at_send_time() {
    let transport = Arc::new(NullTransport::new());
    transport
        .fail(URL, LitError::network(URL, "reset"))
        .respond(URL, json!({}));
    let (dispatcher, _) = dispatcher(
        transport.clone(),
        EpochState::new(3, None, Timestamp::now()),
        RetryPolicy::new(1_000, 1, 50),
    );

    let epoch = dispatcher.epoch_state().clone();
    let updater = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        *epoch.write().await = EpochState::new(4, None, Timestamp::now());
    });

    dispatcher
        .send(URL, &RequestId::from_raw("1"), &json!({}))
        .await
        .unwrap();
    updater.await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].body["epochNumber"], 3);
    assert_eq!(calls[1].body["epochNumber"], 4);
}

#[tokio::test]
async fn transient_failures_are_retried_and_counted() {
    let transport = Arc::new(NullTransport::new());
    transport.fail(URL, LitError::network(URL, "refused"));
    let (dispatcher, metrics) = dispatcher(
        transport.clone(),
        EpochState::default(),
        RetryPolicy::new(1_000, 2, 1),
    );

    let err = dispatcher
        .send(URL, &RequestId::from_raw("1"), &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err, LitError::network(URL, "refused"));
    assert_eq!(transport.calls_to(URL), 3);
    assert_eq!(metrics.request_retries.get(), 2);
}

#[tokio::test]
async fn non_object_bodies_are_rejected_before_sending() {
    let transport = Arc::new(NullTransport::new());
    let (dispatcher, _) = dispatcher(transport.clone(), EpochState::default(), RetryPolicy::default());

    let err = dispatcher
        .send(URL, &RequestId::from_raw("1"), &json!([1, 2]))
        .await
        .unwrap_err();
    assert!(matches!(err, LitError::InvalidArgument(_)));
    assert_eq!(transport.call_count(), 0);
}
