//! Record ↔ tensor mapping
//!
//! [`map_batch`] turns one batch of input records into the input list of
//! a single inference call: one tensor slot per valid record, all using
//! the configured input name, shape and dtype. Records without the input
//! field, with a non-`String` field, or with an undecodable payload are
//! skipped individually; they never fail the batch.
//!
//! [`output_records`] turns a decoded inference result back into the
//! (at most one) output record emitted downstream.

use tracing::warn;

use edgeinfer_core::config::BridgeOptions;
use edgeinfer_core::data::{Record, TypedValue};
use edgeinfer_core::tensor::codec;

use crate::client::{InferInput, InferResult, RequestedOutput};

/// Map a batch of records into tensor inputs and requested outputs
///
/// Returns parallel lists: one input tensor and one requested-output
/// descriptor (binary encoding enabled) per valid record. An empty input
/// list means no inference call should be made for this batch.
pub fn map_batch(
    options: &BridgeOptions,
    records: &[Record],
) -> (Vec<InferInput>, Vec<RequestedOutput>) {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();

    for record in records {
        // absent input field: non-applicable data for this channel
        let Some(value) = record.get(&options.input_name) else {
            continue;
        };
        let TypedValue::String(payload) = value else {
            warn!(
                "only JSON string input is supported, got {} for field {}",
                value.type_name(),
                options.input_name
            );
            continue;
        };

        match codec::decode_json_payload(payload, options.input_type) {
            Ok(Some(data)) => {
                inputs.push(InferInput {
                    spec: options.input_spec(),
                    data,
                });
                outputs.push(RequestedOutput {
                    name: options.output_name.clone(),
                    binary: true,
                });
            }
            Ok(None) => {
                warn!(
                    "unsupported input datatype {}, no tensor produced",
                    options.input_type
                );
            }
            Err(e) => {
                warn!("dropping record with undecodable payload: {}", e);
            }
        }
    }

    (inputs, outputs)
}

/// Build the output records for a decoded inference result
///
/// Produces one record carrying the exploded fields of the configured
/// output tensor. A result without that output, or one whose datatype
/// does not match the configured output type, yields no records (the
/// empty sequence is then subject to the emission policy).
pub fn output_records(options: &BridgeOptions, result: &InferResult) -> Vec<Record> {
    let Some(values) = result.output(&options.output_name) else {
        warn!(
            "inference result has no output named {}",
            options.output_name
        );
        return Vec::new();
    };

    if values.data_type() != options.output_type {
        warn!(
            "output {} decoded as {} but {} is configured, dropping result",
            options.output_name,
            values.data_type(),
            options.output_type
        );
        return Vec::new();
    }

    let record: Record = codec::explode_fields(values, &options.output_name)
        .into_iter()
        .collect();
    vec![record]
}
