//! Bridge configuration
//!
//! The surrounding framework delivers configuration as an untyped
//! property map. [`BridgeOptions::from_properties`] validates it into an
//! immutable snapshot; a snapshot is superseded wholesale on
//! reconfiguration and never partially mutated. Validation failures are
//! configuration errors the caller recovers from by keeping its previous
//! valid options.

use std::collections::HashMap;

use crate::tensor::{DataType, TensorSpec};
use crate::{Error, Result};

/// Property key for the inference server host or IP
pub const PROPERTY_SERVER_ADDRESS: &str = "server.address";
/// Property key for the inference server port
pub const PROPERTY_SERVER_PORT: &str = "server.port";
/// Property key for the target model identifier
pub const PROPERTY_MODEL_NAME: &str = "model.name";
/// Property key for the record field carrying the input payload
pub const PROPERTY_INPUT_NAME: &str = "input.name";
/// Property key for the comma-separated input tensor shape
pub const PROPERTY_INPUT_SIZE: &str = "input.size";
/// Property key for the input tensor dtype
pub const PROPERTY_INPUT_TYPE: &str = "input.type";
/// Property key for the requested output tensor name
pub const PROPERTY_OUTPUT_NAME: &str = "output.name";
/// Property key for the output tensor dtype
pub const PROPERTY_OUTPUT_TYPE: &str = "output.type";
/// Property key for the emit-on-empty-result flag
pub const PROPERTY_EMIT_ON_EMPTY_RESULT: &str = "emit.on.empty.result";

/// One untyped configuration property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// String property
    String(String),
    /// Integer property
    Integer(i64),
    /// Boolean property
    Boolean(bool),
}

/// Untyped configuration map as delivered by the framework
pub type Properties = HashMap<String, PropertyValue>;

/// Validated, immutable bridge configuration snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    /// Inference server host or IP
    pub server_address: String,
    /// Inference server port
    pub server_port: u16,
    /// Target model identifier
    pub model_name: String,
    /// Record field name carrying the input payload
    pub input_name: String,
    /// Input tensor shape dimensions
    pub input_shape: Vec<i64>,
    /// Input tensor dtype
    pub input_type: DataType,
    /// Output tensor name requested from the server
    pub output_name: String,
    /// Dtype used to decode the result tensor
    pub output_type: DataType,
    /// Whether an empty result sequence is still emitted downstream
    pub emit_on_empty_result: bool,
}

impl BridgeOptions {
    /// Validate an untyped property map into an options snapshot
    pub fn from_properties(properties: &Properties) -> Result<Self> {
        let server_address = required_string(properties, PROPERTY_SERVER_ADDRESS)?;
        let server_port = required_port(properties, PROPERTY_SERVER_PORT)?;
        let model_name = required_string(properties, PROPERTY_MODEL_NAME)?;
        let input_name = required_string(properties, PROPERTY_INPUT_NAME)?;
        let input_shape = parse_shape(&required_string(properties, PROPERTY_INPUT_SIZE)?)?;
        let input_type = required_string(properties, PROPERTY_INPUT_TYPE)?.parse()?;
        let output_name = required_string(properties, PROPERTY_OUTPUT_NAME)?;
        let output_type = required_string(properties, PROPERTY_OUTPUT_TYPE)?.parse()?;

        let emit_on_empty_result = match properties.get(PROPERTY_EMIT_ON_EMPTY_RESULT) {
            Some(PropertyValue::Boolean(v)) => *v,
            Some(other) => {
                return Err(Error::config(format!(
                    "{PROPERTY_EMIT_ON_EMPTY_RESULT} must be a boolean, got {other:?}"
                )))
            }
            None => true,
        };

        Ok(Self {
            server_address,
            server_port,
            model_name,
            input_name,
            input_shape,
            input_type,
            output_name,
            output_type,
            emit_on_empty_result,
        })
    }

    /// `host:port` address of the inference server
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }

    /// Spec of the single configured input tensor
    pub fn input_spec(&self) -> TensorSpec {
        TensorSpec::new(
            self.input_name.clone(),
            self.input_shape.clone(),
            self.input_type,
        )
    }
}

fn required_string(properties: &Properties, key: &str) -> Result<String> {
    match properties.get(key) {
        Some(PropertyValue::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(PropertyValue::String(_)) => Err(Error::config(format!("{key} must not be empty"))),
        Some(other) => Err(Error::config(format!(
            "{key} must be a string, got {other:?}"
        ))),
        None => Err(Error::config(format!("missing required property {key}"))),
    }
}

fn required_port(properties: &Properties, key: &str) -> Result<u16> {
    match properties.get(key) {
        Some(PropertyValue::Integer(port)) => u16::try_from(*port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| Error::config(format!("{key} must be a port in 1..=65535, got {port}"))),
        Some(other) => Err(Error::config(format!(
            "{key} must be an integer, got {other:?}"
        ))),
        None => Err(Error::config(format!("missing required property {key}"))),
    }
}

fn parse_shape(value: &str) -> Result<Vec<i64>> {
    value
        .split(',')
        .map(|dim| {
            let dim = dim.trim();
            let parsed: i64 = dim
                .parse()
                .map_err(|_| Error::config(format!("invalid shape dimension: {dim:?}")))?;
            if parsed < 0 {
                return Err(Error::config(format!(
                    "shape dimensions must be non-negative, got {parsed}"
                )));
            }
            Ok(parsed)
        })
        .collect()
}
