//! The Triton bridge component
//!
//! Wires the record mapper, the connection manager and the downstream
//! emitter into one pipeline component. Lifecycle follows the
//! surrounding framework: `activate` / `update` / `deactivate` carry a
//! fresh options snapshot, `on_batch` handles one upstream delivery
//! synchronously. All four failure kinds (configuration, connection,
//! decode, inference) are recovered here; none terminates the component.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info, warn};

use edgeinfer_core::config::{BridgeOptions, Properties};
use edgeinfer_core::data::Record;
use edgeinfer_core::emit::RecordEmitter;

use crate::client::{InferRequest, InferResult};
use crate::connection::ConnectionManager;
use crate::mapper;

/// Bridge between a record pipeline and a Triton inference server
pub struct TritonBridge {
    options: RwLock<Option<BridgeOptions>>,
    connection: ConnectionManager,
    emitter: Arc<dyn RecordEmitter>,
}

impl TritonBridge {
    /// Create an inactive bridge that emits downstream through `emitter`
    pub fn new(emitter: Arc<dyn RecordEmitter>) -> Self {
        Self::with_connection(ConnectionManager::new(), emitter)
    }

    /// Create a bridge around an injected connection manager
    ///
    /// Lets callers supply a manager with non-default timeouts.
    pub fn with_connection(connection: ConnectionManager, emitter: Arc<dyn RecordEmitter>) -> Self {
        Self {
            options: RwLock::new(None),
            connection,
            emitter,
        }
    }

    /// The connection manager owning the server handle
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Activate with an initial options snapshot and open the connection
    ///
    /// A connection failure is non-fatal: the bridge stays active in
    /// degraded no-inference mode until a later reconfiguration succeeds.
    pub async fn activate(&self, properties: &Properties) -> edgeinfer_core::Result<()> {
        info!("Activating Triton bridge...");
        let options = BridgeOptions::from_properties(properties)?;
        let address = options.server_url();
        *self.options.write() = Some(options);

        if let Err(e) = self.connection.connect(&address).await {
            warn!("activation continues without a connection: {}", e);
        }
        info!("Activating Triton bridge... Done");
        Ok(())
    }

    /// Replace the options snapshot and reopen the connection
    ///
    /// The old handle is closed before the new snapshot takes effect; a
    /// handle is never reused across an address change. On a
    /// configuration error the previous snapshot and connection stay in
    /// place.
    pub async fn update(&self, properties: &Properties) -> edgeinfer_core::Result<()> {
        info!("Updating Triton bridge...");
        let options = BridgeOptions::from_properties(properties)?;

        self.connection.disconnect().await;
        let address = options.server_url();
        *self.options.write() = Some(options);

        if let Err(e) = self.connection.connect(&address).await {
            warn!("update continues without a connection: {}", e);
        }
        info!("Updating Triton bridge... Done");
        Ok(())
    }

    /// Close the connection and drop the options snapshot
    ///
    /// Does not wait for an in-progress call; once the handle is closed
    /// such a call fails and is handled like any other inference failure.
    pub async fn deactivate(&self) {
        info!("Deactivating Triton bridge...");
        self.connection.disconnect().await;
        *self.options.write() = None;
        info!("Deactivating Triton bridge... Done");
    }

    /// Process one batch of input records
    ///
    /// Valid records become the input list of a single inference call;
    /// the decoded result becomes at most one output record. The result
    /// sequence is emitted downstream unless it is empty and the
    /// emit-on-empty-result flag is off, in which case no downstream
    /// call happens at all.
    pub async fn on_batch(&self, records: &[Record]) {
        let options = match self.options.read().clone() {
            Some(options) => options,
            None => {
                warn!("batch received before activation, ignoring");
                return;
            }
        };

        let (inputs, outputs) = mapper::map_batch(&options, records);

        let mut result_records = Vec::new();
        if !inputs.is_empty() {
            let request = InferRequest {
                model_name: options.model_name.clone(),
                inputs,
                outputs,
            };
            if let Some(result) = self.invoke(request).await {
                result_records = mapper::output_records(&options, &result);
            }
        }

        if !result_records.is_empty() || options.emit_on_empty_result {
            if let Err(e) = self.emitter.emit(result_records).await {
                error!("downstream emission failed: {}", e);
            }
        }
    }

    /// Issue one inference call against the current handle
    ///
    /// The connection slot stays locked for the duration of the call so
    /// a concurrent reconfiguration cannot swap the handle mid-call.
    /// Returns `None` when disconnected or when the call fails.
    async fn invoke(&self, request: InferRequest) -> Option<InferResult> {
        let slot = self.connection.slot().await;
        let Some(client) = slot.client() else {
            warn!("cannot process input data: inference client is not connected");
            return None;
        };

        match client.infer(&request).await {
            Ok(result) => Some(result),
            Err(e) => {
                error!(
                    "failed to run inference for model {}: {}",
                    request.model_name, e
                );
                None
            }
        }
    }
}
