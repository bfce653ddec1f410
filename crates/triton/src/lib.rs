//! Triton inference server bridge
//!
//! Bridges a record pipeline to a remote Triton-style inference server:
//! one batch of records in, at most one inference call out, decoded
//! result records emitted downstream.
//!
//! - [`client`] speaks the KServe v2 HTTP protocol with the binary
//!   tensor extension;
//! - [`connection`] owns the single live client handle behind a guarded
//!   state machine;
//! - [`mapper`] turns records into tensor inputs and results back into
//!   records;
//! - [`component`] is the bridge component wired into the pipeline.

pub mod client;
pub mod component;
pub mod connection;
pub mod error;
pub mod mapper;

pub use client::{InferInput, InferRequest, InferResult, RequestedOutput, TritonClient};
pub use component::TritonBridge;
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{Error, Result};
