//! Downstream emitter seam
//!
//! The bridge never talks to the pipeline framework directly; it emits
//! result records through this narrow trait. Tests substitute a
//! recording fake.

use async_trait::async_trait;

use crate::data::Record;
use crate::Result;

/// Sink for result records produced by one batch cycle
#[async_trait]
pub trait RecordEmitter: Send + Sync {
    /// Forward a (possibly empty) ordered sequence of records downstream
    async fn emit(&self, records: Vec<Record>) -> Result<()>;
}
