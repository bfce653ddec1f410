//! Triton HTTP client
//!
//! Speaks the KServe v2 REST protocol with the binary tensor extension:
//! the infer request body is a JSON header describing inputs and
//! requested outputs, followed by the concatenated raw tensor buffers;
//! the `Inference-Header-Content-Length` header marks where the JSON
//! ends. Responses are parsed the same way in reverse.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::warn;

use edgeinfer_core::tensor::{codec, DataType, TensorSpec, TensorValues};

use crate::{Error, Result};

/// Timeout for opening a connection to the server
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);
/// Per-call timeout for requests on an open connection
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

const INFERENCE_HEADER_CONTENT_LENGTH: &str = "Inference-Header-Content-Length";

/// One tensor input: its spec plus the encoded buffer
#[derive(Debug, Clone)]
pub struct InferInput {
    /// Name, shape and dtype of the tensor
    pub spec: TensorSpec,
    /// Little-endian tensor buffer
    pub data: Bytes,
}

/// One requested output tensor
#[derive(Debug, Clone)]
pub struct RequestedOutput {
    /// Output name as known to the model
    pub name: String,
    /// Request the binary-encoded representation
    pub binary: bool,
}

/// One inference call: model, accumulated inputs, requested outputs
#[derive(Debug, Clone)]
pub struct InferRequest {
    /// Target model identifier
    pub model_name: String,
    /// Ordered tensor inputs, one per valid source record
    pub inputs: Vec<InferInput>,
    /// Ordered requested outputs, parallel to `inputs`
    pub outputs: Vec<RequestedOutput>,
}

/// Decoded result of a successful inference call
#[derive(Debug, Clone, Default)]
pub struct InferResult {
    outputs: HashMap<String, TensorValues>,
}

impl InferResult {
    /// Look up a decoded output tensor by name
    pub fn output(&self, name: &str) -> Option<&TensorValues> {
        self.outputs.get(name)
    }

    /// Add a decoded output tensor
    pub fn insert_output(&mut self, name: impl Into<String>, values: TensorValues) {
        self.outputs.insert(name.into(), values);
    }

    /// Number of decoded outputs
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Whether the result carries no outputs
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    inputs: Vec<WireInput<'a>>,
    outputs: Vec<WireOutput<'a>>,
}

#[derive(Serialize)]
struct WireInput<'a> {
    name: &'a str,
    shape: &'a [i64],
    datatype: &'a str,
    parameters: BinarySizeParam,
}

#[derive(Serialize)]
struct BinarySizeParam {
    binary_data_size: usize,
}

#[derive(Serialize)]
struct WireOutput<'a> {
    name: &'a str,
    parameters: BinaryFlagParam,
}

#[derive(Serialize)]
struct BinaryFlagParam {
    binary_data: bool,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    outputs: Vec<WireResponseOutput>,
}

#[derive(Deserialize)]
struct WireResponseOutput {
    name: String,
    datatype: String,
    #[serde(default)]
    parameters: WireResponseParams,
}

#[derive(Deserialize, Default)]
struct WireResponseParams {
    #[serde(default)]
    binary_data_size: Option<usize>,
}

fn encode_request(request: &InferRequest) -> std::result::Result<(Vec<u8>, usize), String> {
    let header = WireRequest {
        inputs: request
            .inputs
            .iter()
            .map(|input| WireInput {
                name: &input.spec.name,
                shape: &input.spec.shape,
                datatype: input.spec.dtype.as_str(),
                parameters: BinarySizeParam {
                    binary_data_size: input.data.len(),
                },
            })
            .collect(),
        outputs: request
            .outputs
            .iter()
            .map(|output| WireOutput {
                name: &output.name,
                parameters: BinaryFlagParam {
                    binary_data: output.binary,
                },
            })
            .collect(),
    };

    let mut body = serde_json::to_vec(&header).map_err(|e| format!("cannot encode request: {e}"))?;
    let json_len = body.len();
    for input in &request.inputs {
        body.extend_from_slice(&input.data);
    }
    Ok((body, json_len))
}

fn decode_response(
    header_len: Option<usize>,
    body: &[u8],
) -> std::result::Result<InferResult, String> {
    // without the binary extension header the whole body is JSON
    let header_len = header_len.unwrap_or(body.len());
    if header_len > body.len() {
        return Err(format!(
            "inference header length {header_len} exceeds body length {}",
            body.len()
        ));
    }

    let header: WireResponse = serde_json::from_slice(&body[..header_len])
        .map_err(|e| format!("malformed response header: {e}"))?;

    let mut binary = &body[header_len..];
    let mut outputs = HashMap::new();
    for output in header.outputs {
        let dtype: DataType = output
            .datatype
            .parse()
            .map_err(|e| format!("output {}: {e}", output.name))?;
        let size = output
            .parameters
            .binary_data_size
            .ok_or_else(|| format!("output {} carries no binary data", output.name))?;
        if size > binary.len() {
            return Err(format!("truncated binary payload for output {}", output.name));
        }
        let (raw, rest) = binary.split_at(size);
        binary = rest;

        match codec::decode_tensor(raw, dtype).map_err(|e| e.to_string())? {
            Some(values) => {
                outputs.insert(output.name, values);
            }
            None => {
                warn!(
                    "unsupported datatype {} for output {}, nothing decoded",
                    dtype, output.name
                );
            }
        }
    }
    Ok(InferResult { outputs })
}

/// Live HTTP handle to one inference server
///
/// Owned exclusively by the connection manager; dropping the client
/// closes its connection pool.
#[derive(Debug)]
pub struct TritonClient {
    http: reqwest::Client,
    base_url: String,
    address: String,
}

impl TritonClient {
    /// Open a handle to `address` (`host:port`) and probe server readiness
    pub async fn connect(address: &str) -> Result<Self> {
        Self::connect_with_timeouts(address, CONNECT_TIMEOUT, REQUEST_TIMEOUT).await
    }

    /// Open a handle with explicit connect and per-call timeouts
    pub async fn connect_with_timeouts(
        address: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::connection(format!("cannot build HTTP client: {e}")))?;

        let client = Self {
            http,
            base_url: format!("http://{address}"),
            address: address.to_string(),
        };
        if !client.server_ready().await? {
            return Err(Error::connection(format!(
                "inference server {address} is not ready"
            )));
        }
        Ok(client)
    }

    /// The `host:port` this handle was opened against
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Probe `GET /v2/health/ready`
    pub async fn server_ready(&self) -> Result<bool> {
        let url = format!("{}/v2/health/ready", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::connection(format!("cannot reach inference server: {e}")))?;
        Ok(response.status().is_success())
    }

    /// Run one inference call
    ///
    /// Transport failures, timeouts, non-2xx statuses and malformed
    /// responses are all classified as [`Error::Inference`].
    pub async fn infer(&self, request: &InferRequest) -> Result<InferResult> {
        let model = request.model_name.as_str();
        let (body, json_len) =
            encode_request(request).map_err(|message| Error::inference(model, message))?;

        let url = format!("{}/v2/models/{}/infer", self.base_url, model);
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(INFERENCE_HEADER_CONTENT_LENGTH, json_len)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("request timed out: {e}")
                } else {
                    e.to_string()
                };
                Error::inference(model, message)
            })?;

        let status = response.status();
        let header_len = response
            .headers()
            .get(INFERENCE_HEADER_CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::inference(model, e.to_string()))?;

        if !status.is_success() {
            return Err(Error::inference(
                model,
                format!("server returned {status}: {}", String::from_utf8_lossy(&bytes)),
            ));
        }

        decode_response(header_len, &bytes).map_err(|message| Error::inference(model, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn fp32_input(name: &str, values: &[f32]) -> InferInput {
        let mut buf = bytes::BytesMut::new();
        for v in values {
            buf.put_f32_le(*v);
        }
        InferInput {
            spec: TensorSpec::new(name, vec![1, values.len() as i64], DataType::Fp32),
            data: buf.freeze(),
        }
    }

    #[test]
    fn test_encode_request_layout() {
        let request = InferRequest {
            model_name: "simple".into(),
            inputs: vec![fp32_input("INPUT0", &[1.4, 2.5])],
            outputs: vec![RequestedOutput {
                name: "OUTPUT0".into(),
                binary: true,
            }],
        };

        let (body, json_len) = encode_request(&request).unwrap();
        assert_eq!(body.len(), json_len + 8, "raw tensor bytes follow the JSON");

        let header: serde_json::Value = serde_json::from_slice(&body[..json_len]).unwrap();
        assert_eq!(header["inputs"][0]["name"], "INPUT0");
        assert_eq!(header["inputs"][0]["datatype"], "FP32");
        assert_eq!(header["inputs"][0]["shape"], serde_json::json!([1, 2]));
        assert_eq!(header["inputs"][0]["parameters"]["binary_data_size"], 8);
        assert_eq!(header["outputs"][0]["name"], "OUTPUT0");
        assert_eq!(header["outputs"][0]["parameters"]["binary_data"], true);

        let raw = &body[json_len..];
        assert_eq!(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]), 1.4);
    }

    fn binary_response_body(name: &str, datatype: &str, raw: &[u8]) -> (Vec<u8>, usize) {
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
        body.extend_from_slice(raw);
        (body, json_len)
    }

    #[test]
    fn test_decode_response_binary_output() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&9.9_f32.to_le_bytes());
        let (body, json_len) = binary_response_body("OUTPUT0", "FP32", &raw);

        let result = decode_response(Some(json_len), &body).unwrap();
        match result.output("OUTPUT0") {
            Some(TensorValues::F32(v)) => {
                assert_eq!(v.len(), 1);
                assert!((v[0] - 9.9).abs() < 0.1);
            }
            other => panic!("expected F32 output, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_response_missing_binary_size() {
        let body = serde_json::to_vec(&serde_json::json!({
            "outputs": [{ "name": "OUTPUT0", "datatype": "FP32", "shape": [1] }],
        }))
        .unwrap();
        assert!(decode_response(None, &body).is_err());
    }

    #[test]
    fn test_decode_response_truncated_payload() {
        let (mut body, json_len) = binary_response_body("OUTPUT0", "FP32", &[0u8; 8]);
        body.truncate(json_len + 4);
        assert!(decode_response(Some(json_len), &body).is_err());
    }

    #[test]
    fn test_decode_response_bad_header_length() {
        assert!(decode_response(Some(100), b"{}").is_err());
    }
}
