//! EdgeInfer core library
//!
//! Transport-free building blocks for edge-side inference bridges:
//! the typed record data model exchanged with the surrounding pipeline,
//! the dtype-tagged tensor codec, validated bridge options, and the
//! downstream emitter seam.
//!
//! Transport-specific pieces (the Triton HTTP client, connection
//! management, and the bridge component itself) live in `edgeinfer-triton`.

pub mod config;
pub mod data;
pub mod emit;
pub mod error;
pub mod tensor;

pub use error::{Error, Result};
