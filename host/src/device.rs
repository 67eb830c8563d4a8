use std::sync::Arc;

use log::info;

use daqlink_shared::{
    transport::Transport, ConfigError, Connection, ConnectionStatus, CriticalErrorBus,
    MessageErrorBus, RouteRegistry, Side,
};

use crate::gate::HostGate;

// gate shutdown, erased over the gate's value type
trait GateHandle: Send + Sync {
    fn uid(&self) -> &str;
    fn shutdown(&self);
}

impl<T> GateHandle for HostGate<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn uid(&self) -> &str {
        HostGate::uid(self)
    }

    fn shutdown(&self) {
        HostGate::shutdown(self)
    }
}

/// Collects host gates during the configuration phase; [`build`]
/// freezes the registry and hands out the running device.
///
/// [`build`]: HostDeviceBuilder::build
pub struct HostDeviceBuilder {
    registry: RouteRegistry,
    gates: Vec<Box<dyn GateHandle>>,
    critical: CriticalErrorBus,
}

impl HostDeviceBuilder {
    pub fn add_gate<T>(mut self, gate: &HostGate<T>) -> Result<Self, ConfigError>
    where
        T: Clone + Send + Sync + 'static,
    {
        gate.register_routes(&mut self.registry)?;
        self.gates.push(Box::new(gate.clone()));
        Ok(self)
    }

    pub fn build(mut self, transport: Arc<dyn Transport>) -> Result<HostDevice, ConfigError> {
        let table = self.registry.freeze()?;
        info!(
            "host device configured with {} gates, {} routes",
            self.gates.len(),
            table.route_count()
        );
        Ok(HostDevice {
            connection: Connection::new(table, transport, self.critical),
            gates: self.gates,
        })
    }
}

/// The device-owning end of the link: a frozen Host-side route table, the
/// gates bound into it, and the connection that serves them to a remote.
pub struct HostDevice {
    connection: Connection,
    gates: Vec<Box<dyn GateHandle>>,
}

impl HostDevice {
    /// Starts the configuration phase. Gates must be constructed with the
    /// same `critical` bus so command failures reach the device supervisor.
    pub fn builder(critical: CriticalErrorBus) -> HostDeviceBuilder {
        HostDeviceBuilder {
            registry: RouteRegistry::new(Side::Host),
            gates: Vec::new(),
            critical,
        }
    }

    /// Accepts a remote peer and serves the device's routes to it.
    pub async fn serve(&self) -> Result<(), daqlink_shared::ConnectError> {
        self.connection.connect().await
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
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

    /// Stops serving and cancels every gate's in-flight work. Gate teardown
    /// happens regardless of connection state.
    pub fn shutdown(&self) {
        self.connection.disconnect();
        for gate in &self.gates {
            info!("shutting down gate {}", gate.uid());
            gate.shutdown();
        }
    }
}

impl Drop for HostDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}
