//! Tensor element types
//!
//! The spellings match the inference server protocol (`"FP32"`,
//! `"UINT8"`, ...) and are used verbatim in configuration values and on
//! the wire.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Scalar element type of a tensor
///
/// `Fp16` and `Bytes` exist on the wire but are not handled by the
/// codec; they take the explicit unsupported branch which produces
/// nothing rather than silently succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Fp16,
    Fp32,
    Fp64,
    Bytes,
}

impl DataType {
    /// Protocol spelling of this dtype
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "BOOL",
            DataType::Uint8 => "UINT8",
            DataType::Int8 => "INT8",
            DataType::Uint16 => "UINT16",
            DataType::Int16 => "INT16",
            DataType::Uint32 => "UINT32",
            DataType::Int32 => "INT32",
            DataType::Uint64 => "UINT64",
            DataType::Int64 => "INT64",
            DataType::Fp16 => "FP16",
            DataType::Fp32 => "FP32",
            DataType::Fp64 => "FP64",
            DataType::Bytes => "BYTES",
        }
    }

    /// Size of one element in bytes, `None` for variable-width `Bytes`
    pub fn element_size(&self) -> Option<usize> {
        match self {
            DataType::Bool | DataType::Uint8 | DataType::Int8 => Some(1),
            DataType::Uint16 | DataType::Int16 | DataType::Fp16 => Some(2),
            DataType::Uint32 | DataType::Int32 | DataType::Fp32 => Some(4),
            DataType::Uint64 | DataType::Int64 | DataType::Fp64 => Some(8),
            DataType::Bytes => None,
        }
    }

    /// Whether the codec can convert values of this dtype
    pub fn is_supported(&self) -> bool {
        !matches!(self, DataType::Fp16 | DataType::Bytes)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BOOL" => Ok(DataType::Bool),
            "UINT8" => Ok(DataType::Uint8),
            "INT8" => Ok(DataType::Int8),
            "UINT16" => Ok(DataType::Uint16),
            "INT16" => Ok(DataType::Int16),
            "UINT32" => Ok(DataType::Uint32),
            "INT32" => Ok(DataType::Int32),
            "UINT64" => Ok(DataType::Uint64),
            "INT64" => Ok(DataType::Int64),
            "FP16" => Ok(DataType::Fp16),
            "FP32" => Ok(DataType::Fp32),
            "FP64" => Ok(DataType::Fp64),
            "BYTES" => Ok(DataType::Bytes),
            other => Err(Error::config(format!("unknown tensor datatype: {other}"))),
        }
    }
}
