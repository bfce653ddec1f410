//! End-to-end bridge tests against an in-process mock inference server
//!
//! A small axum app stands in for the Triton server: it answers the
//! readiness probe and the infer endpoint (KServe v2 binary extension),
//! counting calls and capturing request bodies so tests can assert what
//! actually went over the wire.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;

use edgeinfer_core::config::{Properties, PropertyValue};
use edgeinfer_core::data::{Record, TypedValue};
use edgeinfer_core::emit::RecordEmitter;
use edgeinfer_triton::{ConnectionManager, ConnectionState, TritonBridge};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}

/// What the mock infer endpoint answers
enum MockInfer {
    /// A single binary-encoded output tensor
    Binary {
        name: &'static str,
        datatype: &'static str,
        raw: Vec<u8>,
    },
    /// A binary output delivered only after a delay
    Delayed {
        delay: Duration,
        name: &'static str,
        datatype: &'static str,
        raw: Vec<u8>,
    },
    /// A failing call
    Error(StatusCode),
}

struct MockServer {
    addr: SocketAddr,
    infer_calls: Arc<AtomicUsize>,
    /// Captured (header_len, body) of every infer request
    requests: Arc<Mutex<Vec<(usize, Vec<u8>)>>>,
}

fn binary_response(name: &str, datatype: &str, raw: Vec<u8>) -> Response {
    let header = serde_json::json!({
        "model_name": "simple",
        "outputs": [{
            "name": name,
            "datatype": datatype,
            "shape": [raw.len() as i64],
            "parameters": { "binary_data_size": raw.len() },
        }],
    });
    let mut body = serde_json::to_vec(&header).unwrap();
    let json_len = body.len();
    body.extend_from_slice(&raw);

    Response::builder()
        .status(StatusCode::OK)
        .header("Inference-Header-Content-Length", json_len)
        .header("Content-Type", "application/octet-stream")
        .body(Body::from(body))
        .unwrap()
}

async fn spawn_mock(ready: StatusCode, infer: MockInfer) -> MockServer {
    let infer = Arc::new(infer);
    let infer_calls = Arc::new(AtomicUsize::new(0));
    let requests: Arc<Mutex<Vec<(usize, Vec<u8>)>>> = Arc::new(Mutex::new(Vec::new()));

    let calls = infer_calls.clone();
    let captured = requests.clone();
    let app = Router::new()
        .route("/v2/health/ready", get(move || async move { ready }))
        .route(
            "/v2/models/:model/infer",
            post(move |headers: HeaderMap, body: Bytes| {
                let infer = infer.clone();
                let calls = calls.clone();
                let captured = captured.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let header_len = headers
                        .get("inference-header-content-length")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(body.len());
                    captured.lock().unwrap().push((header_len, body.to_vec()));

                    match &*infer {
                        MockInfer::Binary {
                            name,
                            datatype,
                            raw,
                        } => binary_response(name, datatype, raw.clone()),
                        MockInfer::Delayed {
                            delay,
                            name,
                            datatype,
                            raw,
                        } => {
                            tokio::time::sleep(*delay).await;
                            binary_response(name, datatype, raw.clone())
                        }
                        MockInfer::Error(status) => Response::builder()
                            .status(*status)
                            .body(Body::from("model failed"))
                            .unwrap(),
                    }
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        addr,
        infer_calls,
        requests,
    }
}

#[derive(Default)]
struct RecordingEmitter {
    emissions: Mutex<Vec<Vec<Record>>>,
}

impl RecordingEmitter {
    fn emissions(&self) -> Vec<Vec<Record>> {
        self.emissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordEmitter for RecordingEmitter {
    async fn emit(&self, records: Vec<Record>) -> edgeinfer_core::Result<()> {
        self.emissions.lock().unwrap().push(records);
        Ok(())
    }
}

fn properties(addr: SocketAddr, output_type: &str, emit_on_empty: Option<bool>) -> Properties {
    let mut properties = HashMap::new();
    for (key, value) in [
        ("server.address", addr.ip().to_string().as_str()),
        ("model.name", "simple"),
        ("input.name", "data"),
        ("input.size", "2"),
        ("input.type", "FP32"),
        ("output.name", "my_output"),
        ("output.type", output_type),
    ] {
        properties.insert(key.to_string(), PropertyValue::String(value.to_string()));
    }
    properties.insert(
        "server.port".to_string(),
        PropertyValue::Integer(addr.port() as i64),
    );
    if let Some(flag) = emit_on_empty {
        properties.insert(
            "emit.on.empty.result".to_string(),
            PropertyValue::Boolean(flag),
        );
    }
    properties
}

fn string_record(payload: &str) -> Record {
    let mut record = Record::new();
    record.insert("data", TypedValue::String(payload.to_string()));
    record
}

#[tokio::test]
async fn test_fp32_inference_roundtrip() {
    init_tracing();
    let server = spawn_mock(
        StatusCode::OK,
        MockInfer::Binary {
            name: "my_output",
            datatype: "FP32",
            raw: 9.9_f32.to_le_bytes().to_vec(),
        },
    )
    .await;

    let emitter = Arc::new(RecordingEmitter::default());
    let bridge = TritonBridge::new(emitter.clone());
    bridge
        .activate(&properties(server.addr, "FP32", None))
        .await
        .unwrap();
    assert_eq!(bridge.connection().state().await, ConnectionState::Connected);

    bridge.on_batch(&[string_record("[1.4, 2.5]")]).await;

    // exactly one call, carrying the encoded fp32 payload
    assert_eq!(server.infer_calls.load(Ordering::SeqCst), 1);
    let requests = server.requests.lock().unwrap().clone();
    let (header_len, body) = &requests[0];
    let header: serde_json::Value = serde_json::from_slice(&body[..*header_len]).unwrap();
    assert_eq!(header["inputs"].as_array().unwrap().len(), 1);
    assert_eq!(header["inputs"][0]["name"], "data");
    assert_eq!(header["inputs"][0]["datatype"], "FP32");
    assert_eq!(header["inputs"][0]["parameters"]["binary_data_size"], 8);
    assert_eq!(header["outputs"][0]["name"], "my_output");
    let raw = &body[*header_len..];
    assert_eq!(raw.len(), 8);
    assert!((f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) - 1.4).abs() < 1e-6);

    // one emission, one record, one exploded field
    let emissions = emitter.emissions();
    assert_eq!(emissions.len(), 1);
    assert_eq!(emissions[0].len(), 1);
    let record = &emissions[0][0];
    assert_eq!(record.len(), 1);
    match record.get("my_output_0") {
        Some(TypedValue::Float(v)) => assert!((v - 9.9).abs() < 0.1),
        other => panic!("expected my_output_0 Float field, got {:?}", other),
    }
}

#[tokio::test]
async fn test_long_output_explodes_to_long_field() {
    init_tracing();
    let server = spawn_mock(
        StatusCode::OK,
        MockInfer::Binary {
            name: "my_output",
            datatype: "INT64",
            raw: 56_i64.to_le_bytes().to_vec(),
        },
    )
    .await;

    let emitter = Arc::new(RecordingEmitter::default());
    let bridge = TritonBridge::new(emitter.clone());
    bridge
        .activate(&properties(server.addr, "INT64", None))
        .await
        .unwrap();

    bridge.on_batch(&[string_record("[1.0, 2.0]")]).await;

    let emissions = emitter.emissions();
    assert_eq!(emissions.len(), 1);
    assert_eq!(
        emissions[0][0].get("my_output_0"),
        Some(&TypedValue::Long(56))
    );
}

#[tokio::test]
async fn test_malformed_record_is_isolated_from_valid_one() {
    init_tracing();
    let server = spawn_mock(
        StatusCode::OK,
        MockInfer::Binary {
            name: "my_output",
            datatype: "FP32",
            raw: 1.0_f32.to_le_bytes().to_vec(),
        },
    )
    .await;

    let emitter = Arc::new(RecordingEmitter::default());
    let bridge = TritonBridge::new(emitter.clone());
    bridge
        .activate(&properties(server.addr, "FP32", None))
        .await
        .unwrap();

    bridge
        .on_batch(&[string_record("not json at all"), string_record("[3.0, 4.0]")])
        .await;

    // the malformed record was dropped, the valid one still went out
    let requests = server.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let (header_len, body) = &requests[0];
    let header: serde_json::Value = serde_json::from_slice(&body[..*header_len]).unwrap();
    assert_eq!(header["inputs"].as_array().unwrap().len(), 1);

    let emissions = emitter.emissions();
    assert_eq!(emissions.len(), 1);
    assert!(emissions[0][0].get("my_output_0").is_some());
}

#[tokio::test]
async fn test_failed_inference_emits_empty_sequence() {
    init_tracing();
    let server = spawn_mock(
        StatusCode::OK,
        MockInfer::Error(StatusCode::INTERNAL_SERVER_ERROR),
    )
    .await;

    let emitter = Arc::new(RecordingEmitter::default());
    let bridge = TritonBridge::new(emitter.clone());
    bridge
        .activate(&properties(server.addr, "FP32", None))
        .await
        .unwrap();

    bridge.on_batch(&[string_record("[1.0, 2.0]")]).await;

    assert_eq!(server.infer_calls.load(Ordering::SeqCst), 1);
    let emissions = emitter.emissions();
    assert_eq!(emissions.len(), 1);
    assert!(emissions[0].is_empty());
}

#[tokio::test]
async fn test_failed_inference_suppressed_when_flag_off() {
    init_tracing();
    let server = spawn_mock(
        StatusCode::OK,
        MockInfer::Error(StatusCode::INTERNAL_SERVER_ERROR),
    )
    .await;

    let emitter = Arc::new(RecordingEmitter::default());
    let bridge = TritonBridge::new(emitter.clone());
    bridge
        .activate(&properties(server.addr, "FP32", Some(false)))
        .await
        .unwrap();

    bridge.on_batch(&[string_record("[1.0, 2.0]")]).await;

    assert!(emitter.emissions().is_empty(), "no downstream call at all");
}

#[tokio::test]
async fn test_update_switches_servers() {
    init_tracing();
    let server_a = spawn_mock(
        StatusCode::OK,
        MockInfer::Binary {
            name: "my_output",
            datatype: "FP32",
            raw: 1.0_f32.to_le_bytes().to_vec(),
        },
    )
    .await;
    let server_b = spawn_mock(
        StatusCode::OK,
        MockInfer::Binary {
            name: "my_output",
            datatype: "FP32",
            raw: 2.0_f32.to_le_bytes().to_vec(),
        },
    )
    .await;

    let emitter = Arc::new(RecordingEmitter::default());
    let bridge = TritonBridge::new(emitter.clone());
    bridge
        .activate(&properties(server_a.addr, "FP32", None))
        .await
        .unwrap();
    bridge.on_batch(&[string_record("[1.0, 2.0]")]).await;
    assert_eq!(server_a.infer_calls.load(Ordering::SeqCst), 1);

    bridge
        .update(&properties(server_b.addr, "FP32", None))
        .await
        .unwrap();
    assert_eq!(bridge.connection().state().await, ConnectionState::Connected);

    bridge.on_batch(&[string_record("[1.0, 2.0]")]).await;

    // no call reaches the old server after the update
    assert_eq!(server_a.infer_calls.load(Ordering::SeqCst), 1);
    assert_eq!(server_b.infer_calls.load(Ordering::SeqCst), 1);

    let emissions = emitter.emissions();
    assert_eq!(emissions.len(), 2);
    match emissions[1][0].get("my_output_0") {
        Some(TypedValue::Float(v)) => assert!((v - 2.0).abs() < 1e-6),
        other => panic!("expected result from the new server, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_server_times_out_to_empty_emission() {
    init_tracing();
    // the mock answers well past the per-call timeout configured below
    let server = spawn_mock(
        StatusCode::OK,
        MockInfer::Delayed {
            delay: Duration::from_secs(2),
            name: "my_output",
            datatype: "FP32",
            raw: 1.0_f32.to_le_bytes().to_vec(),
        },
    )
    .await;

    let emitter = Arc::new(RecordingEmitter::default());
    let connection =
        ConnectionManager::with_timeouts(Duration::from_secs(1), Duration::from_millis(250));
    let bridge = TritonBridge::with_connection(connection, emitter.clone());
    bridge
        .activate(&properties(server.addr, "FP32", None))
        .await
        .unwrap();
    assert_eq!(bridge.connection().state().await, ConnectionState::Connected);

    bridge.on_batch(&[string_record("[1.0, 2.0]")]).await;

    // the call was attempted, timed out, and degraded to an empty result
    assert_eq!(server.infer_calls.load(Ordering::SeqCst), 1);
    let emissions = emitter.emissions();
    assert_eq!(emissions.len(), 1);
    assert!(emissions[0].is_empty());
}

#[tokio::test]
async fn test_update_waits_for_in_flight_call() {
    init_tracing();
    let server_a = spawn_mock(
        StatusCode::OK,
        MockInfer::Delayed {
            delay: Duration::from_millis(500),
            name: "my_output",
            datatype: "FP32",
            raw: 1.0_f32.to_le_bytes().to_vec(),
        },
    )
    .await;
    let server_b = spawn_mock(
        StatusCode::OK,
        MockInfer::Binary {
            name: "my_output",
            datatype: "FP32",
            raw: 2.0_f32.to_le_bytes().to_vec(),
        },
    )
    .await;

    let emitter = Arc::new(RecordingEmitter::default());
    let bridge = Arc::new(TritonBridge::new(emitter.clone()));
    bridge
        .activate(&properties(server_a.addr, "FP32", None))
        .await
        .unwrap();

    let batch_bridge = bridge.clone();
    let batch = tokio::spawn(async move {
        batch_bridge.on_batch(&[string_record("[1.0, 2.0]")]).await;
    });

    // wait until the call is in flight against the old server
    while server_a.infer_calls.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    bridge
        .update(&properties(server_b.addr, "FP32", None))
        .await
        .unwrap();
    batch.await.unwrap();

    // the handle swap waited for the in-flight call, which completed
    // against the old server and emitted its result
    let emissions = emitter.emissions();
    assert_eq!(emissions.len(), 1);
    assert_eq!(emissions[0].len(), 1);
    match emissions[0][0].get("my_output_0") {
        Some(TypedValue::Float(v)) => assert!((v - 1.0).abs() < 1e-6),
        other => panic!("expected the old server's result, got {:?}", other),
    }

    // the next batch goes to the new server only
    bridge.on_batch(&[string_record("[1.0, 2.0]")]).await;
    assert_eq!(server_a.infer_calls.load(Ordering::SeqCst), 1);
    assert_eq!(server_b.infer_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_not_ready_server_degrades_gracefully() {
    init_tracing();
    let server = spawn_mock(
        StatusCode::SERVICE_UNAVAILABLE,
        MockInfer::Binary {
            name: "my_output",
            datatype: "FP32",
            raw: vec![],
        },
    )
    .await;

    let emitter = Arc::new(RecordingEmitter::default());
    let bridge = TritonBridge::new(emitter.clone());
    bridge
        .activate(&properties(server.addr, "FP32", None))
        .await
        .unwrap();
    assert_eq!(
        bridge.connection().state().await,
        ConnectionState::Disconnected
    );

    bridge.on_batch(&[string_record("[1.0, 2.0]")]).await;

    // no call was attempted; the batch degrades to an empty emission
    assert_eq!(server.infer_calls.load(Ordering::SeqCst), 0);
    let emissions = emitter.emissions();
    assert_eq!(emissions.len(), 1);
    assert!(emissions[0].is_empty());
}
