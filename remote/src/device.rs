use std::{sync::Arc, time::Duration};

use log::info;

use daqlink_shared::{
    transport::Transport, ConfigError, Conflated, ConflatedReceiver, ConnectError, Connection,
    ConnectionStatus, CriticalErrorBus, MessageErrorBus, ReconnectError, RouteRegistry, Side,
};

use crate::gate::RemoteGate;

/// Collects remote gate mirrors during the configuration phase. Gates that
/// carry confirmed settings must be constructed against
/// [`status_slot`](RemoteDeviceBuilder::status_slot) so they can observe
/// connection availability.
pub struct RemoteDeviceBuilder {
    registry: RouteRegistry,
    status: Conflated<ConnectionStatus>,
    critical: CriticalErrorBus,
    gate_uids: Vec<String>,
}

impl RemoteDeviceBuilder {
    /// The connection-status slot the built device will publish into.
    pub fn status_slot(&self) -> Conflated<ConnectionStatus> {
        self.status.clone()
    }

    pub fn add_gate<T>(mut self, gate: &RemoteGate<T>) -> Result<Self, ConfigError>
    where
        T: Clone + Send + Sync + 'static,
    {
        gate.register_routes(&mut self.registry)?;
        self.gate_uids.push(gate.uid().to_string());
        Ok(self)
    }

    pub fn build(mut self, transport: Arc<dyn Transport>) -> Result<RemoteDevice, ConfigError> {
        let table = self.registry.freeze()?;
        info!(
            "remote device configured with {} gates, {} routes",
            self.gate_uids.len(),
            table.route_count()
        );
        Ok(RemoteDevice {
            connection: Connection::with_status_slot(table, transport, self.critical, self.status),
        })
    }
}

/// The consuming end of the link: mirrors a device's gates over one
/// connection.
pub struct RemoteDevice {
    connection: Connection,
}

impl RemoteDevice {
    pub fn builder(critical: CriticalErrorBus) -> RemoteDeviceBuilder {
        RemoteDeviceBuilder {
            registry: RouteRegistry::new(Side::Remote),
            status: Conflated::new(),
            critical,
            gate_uids: Vec::new(),
        }
    }

    pub async fn connect(&self) -> Result<(), ConnectError> {
        self.connection.connect().await
    }

    /// Tears down any existing transport and retries, bounded by `timeout`.
    pub async fn reconnect(&self, timeout: Duration) -> Result<(), ReconnectError> {
        self.connection.reconnect(timeout).await
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn status_updates(&self) -> ConflatedReceiver<ConnectionStatus> {
        self.connection.status_updates()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn critical_errors(&self) -> &CriticalErrorBus {
        self.connection.critical_errors()
    }

    pub fn message_errors(&self) -> &MessageErrorBus {
        self.connection.message_errors()
    }
}
