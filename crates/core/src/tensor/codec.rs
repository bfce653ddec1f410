//! Stateless tensor codec
//!
//! Converts between record field payloads and dtype-tagged tensor
//! buffers in both directions:
//!
//! - input direction: a JSON array literal carried in a `String` field
//!   is parsed and serialized into a little-endian tensor buffer for
//!   the configured dtype ([`decode_json_payload`]);
//! - output direction: a raw little-endian tensor buffer returned by
//!   the server is decoded into a typed array ([`decode_tensor`]) and
//!   exploded into named scalar record fields ([`explode_fields`]).
//!
//! Integer payloads narrower than 64 bits are parsed through a wider
//! intermediate type and narrowed after the parse; an element that does
//! not fit the target width is a decode error local to that one field.
//! The `FP16` and `BYTES` dtypes take the explicit unsupported branch:
//! both directions yield `None` so the caller can report that nothing
//! was produced.

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;

use crate::data::TypedValue;
use crate::tensor::DataType;
use crate::{Error, Result};

/// A decoded tensor: one dtype-tagged array of values
#[derive(Debug, Clone, PartialEq)]
pub enum TensorValues {
    Bool(Vec<bool>),
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl TensorValues {
    /// The dtype this array was decoded as
    pub fn data_type(&self) -> DataType {
        match self {
            TensorValues::Bool(_) => DataType::Bool,
            TensorValues::U8(_) => DataType::Uint8,
            TensorValues::I8(_) => DataType::Int8,
            TensorValues::U16(_) => DataType::Uint16,
            TensorValues::I16(_) => DataType::Int16,
            TensorValues::U32(_) => DataType::Uint32,
            TensorValues::I32(_) => DataType::Int32,
            TensorValues::U64(_) => DataType::Uint64,
            TensorValues::I64(_) => DataType::Int64,
            TensorValues::F32(_) => DataType::Fp32,
            TensorValues::F64(_) => DataType::Fp64,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            TensorValues::Bool(v) => v.len(),
            TensorValues::U8(v) => v.len(),
            TensorValues::I8(v) => v.len(),
            TensorValues::U16(v) => v.len(),
            TensorValues::I16(v) => v.len(),
            TensorValues::U32(v) => v.len(),
            TensorValues::I32(v) => v.len(),
            TensorValues::U64(v) => v.len(),
            TensorValues::I64(v) => v.len(),
            TensorValues::F32(v) => v.len(),
            TensorValues::F64(v) => v.len(),
        }
    }

    /// Whether the array is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_array<T: DeserializeOwned>(payload: &str) -> Result<Vec<T>> {
    serde_json::from_str(payload)
        .map_err(|e| Error::decode(format!("invalid JSON array payload: {e}")))
}

fn narrow<T: TryFrom<i64>>(value: i64, dtype: DataType) -> Result<T> {
    T::try_from(value)
        .map_err(|_| Error::decode(format!("element {value} does not fit {dtype}")))
}

/// Serialize a JSON array payload into a little-endian tensor buffer
///
/// Returns `Ok(None)` for dtypes the codec does not handle (`FP16`,
/// `BYTES`); the caller must treat this as "nothing produced".
pub fn decode_json_payload(payload: &str, dtype: DataType) -> Result<Option<Bytes>> {
    let buf = match dtype {
        DataType::Bool => {
            let values = parse_array::<bool>(payload)?;
            let mut buf = BytesMut::with_capacity(values.len());
            for v in values {
                buf.put_u8(v as u8);
            }
            buf
        }
        DataType::Uint8 => {
            let values = parse_array::<i64>(payload)?;
            let mut buf = BytesMut::with_capacity(values.len());
            for v in values {
                buf.put_u8(narrow::<u8>(v, dtype)?);
            }
            buf
        }
        DataType::Int8 => {
            let values = parse_array::<i64>(payload)?;
            let mut buf = BytesMut::with_capacity(values.len());
            for v in values {
                buf.put_i8(narrow::<i8>(v, dtype)?);
            }
            buf
        }
        DataType::Uint16 => {
            let values = parse_array::<i64>(payload)?;
            let mut buf = BytesMut::with_capacity(values.len() * 2);
            for v in values {
                buf.put_u16_le(narrow::<u16>(v, dtype)?);
            }
            buf
        }
        DataType::Int16 => {
            let values = parse_array::<i64>(payload)?;
            let mut buf = BytesMut::with_capacity(values.len() * 2);
            for v in values {
                buf.put_i16_le(narrow::<i16>(v, dtype)?);
            }
            buf
        }
        DataType::Uint32 => {
            let values = parse_array::<i64>(payload)?;
            let mut buf = BytesMut::with_capacity(values.len() * 4);
            for v in values {
                buf.put_u32_le(narrow::<u32>(v, dtype)?);
            }
            buf
        }
        DataType::Int32 => {
            let values = parse_array::<i64>(payload)?;
            let mut buf = BytesMut::with_capacity(values.len() * 4);
            for v in values {
                buf.put_i32_le(narrow::<i32>(v, dtype)?);
            }
            buf
        }
        DataType::Uint64 => {
            let values = parse_array::<u64>(payload)?;
            let mut buf = BytesMut::with_capacity(values.len() * 8);
            for v in values {
                buf.put_u64_le(v);
            }
            buf
        }
        DataType::Int64 => {
            let values = parse_array::<i64>(payload)?;
            let mut buf = BytesMut::with_capacity(values.len() * 8);
            for v in values {
                buf.put_i64_le(v);
            }
            buf
        }
        DataType::Fp32 => {
            let values = parse_array::<f32>(payload)?;
            let mut buf = BytesMut::with_capacity(values.len() * 4);
            for v in values {
                buf.put_f32_le(v);
            }
            buf
        }
        DataType::Fp64 => {
            let values = parse_array::<f64>(payload)?;
            let mut buf = BytesMut::with_capacity(values.len() * 8);
            for v in values {
                buf.put_f64_le(v);
            }
            buf
        }
        DataType::Fp16 | DataType::Bytes => return Ok(None),
    };
    Ok(Some(buf.freeze()))
}

/// Decode a raw little-endian tensor buffer into a typed array
///
/// The buffer length must be an exact multiple of the element width.
/// Returns `Ok(None)` for dtypes the codec does not handle.
pub fn decode_tensor(raw: &[u8], dtype: DataType) -> Result<Option<TensorValues>> {
    let width = match dtype.element_size() {
        Some(width) if dtype.is_supported() => width,
        _ => return Ok(None),
    };
    if raw.len() % width != 0 {
        return Err(Error::decode(format!(
            "buffer length {} is not a multiple of element width {} for {}",
            raw.len(),
            width,
            dtype
        )));
    }

    let values = match dtype {
        DataType::Bool => TensorValues::Bool(raw.iter().map(|b| *b != 0).collect()),
        DataType::Uint8 => TensorValues::U8(raw.to_vec()),
        DataType::Int8 => TensorValues::I8(raw.iter().map(|b| *b as i8).collect()),
        DataType::Uint16 => TensorValues::U16(
            raw.chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        DataType::Int16 => TensorValues::I16(
            raw.chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        DataType::Uint32 => TensorValues::U32(
            raw.chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        DataType::Int32 => TensorValues::I32(
            raw.chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        DataType::Uint64 => TensorValues::U64(
            raw.chunks_exact(8)
                .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        DataType::Int64 => TensorValues::I64(
            raw.chunks_exact(8)
                .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        DataType::Fp32 => TensorValues::F32(
            raw.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        DataType::Fp64 => TensorValues::F64(
            raw.chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        DataType::Fp16 | DataType::Bytes => return Ok(None),
    };
    Ok(Some(values))
}

/// Explode a decoded tensor into named scalar record fields
///
/// Byte tensors map to exactly one `ByteArray` field named `output_name`
/// (the only dtype with a natural single-field representation). Every
/// other dtype produces one field per element, named
/// `"<output_name>_<index>"` with a zero-based index, in array order.
/// 16-bit integers widen to `Integer` fields; unsigned 32/64-bit values
/// keep their wire bits and surface as `Integer`/`Long`.
pub fn explode_fields(values: &TensorValues, output_name: &str) -> Vec<(String, TypedValue)> {
    fn indexed<T, F>(name: &str, values: &[T], to_value: F) -> Vec<(String, TypedValue)>
    where
        T: Copy,
        F: Fn(T) -> TypedValue,
    {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("{name}_{i}"), to_value(*v)))
            .collect()
    }

    match values {
        TensorValues::U8(v) => vec![(output_name.to_string(), TypedValue::ByteArray(v.clone()))],
        TensorValues::I8(v) => vec![(
            output_name.to_string(),
            TypedValue::ByteArray(v.iter().map(|b| *b as u8).collect()),
        )],
        TensorValues::Bool(v) => indexed(output_name, v, TypedValue::Boolean),
        TensorValues::U16(v) => indexed(output_name, v, |x| TypedValue::Integer(i32::from(x))),
        TensorValues::I16(v) => indexed(output_name, v, |x| TypedValue::Integer(i32::from(x))),
        TensorValues::U32(v) => indexed(output_name, v, |x| TypedValue::Integer(x as i32)),
        TensorValues::I32(v) => indexed(output_name, v, TypedValue::Integer),
        TensorValues::U64(v) => indexed(output_name, v, |x| TypedValue::Long(x as i64)),
        TensorValues::I64(v) => indexed(output_name, v, TypedValue::Long),
        TensorValues::F32(v) => indexed(output_name, v, TypedValue::Float),
        TensorValues::F64(v) => indexed(output_name, v, TypedValue::Double),
    }
}
