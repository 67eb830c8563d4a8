use std::{sync::Arc, time::Instant};

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use daqlink_shared::{
    Codec, Conflated, ConfigError, CriticalError, CriticalErrorBus, GateFailure, GatePaths,
    JsonCodec, RateTracker, RouteRegistry, TransceivingState,
};

use crate::driver::{DriverError, GateDriver, RateConfigurableDriver};

enum RateMode {
    /// Rate is observed: a running average over produced values, published
    /// on the `update_rate` route.
    Tracked(Mutex<RateTracker>),
    /// Rate is commanded by the remote side and applied to the hardware;
    /// only the applied value is echoed.
    Configured(Arc<dyn RateConfigurableDriver>),
}

/// Host-side synchronized representation of one hardware channel.
///
/// Owns the gate's route slots and the Idle/Sampling state machine. Command
/// pings arriving from the remote side drive the underlying driver; the
/// state projection is echoed on `is_transceiving` only after the hardware
/// call succeeds. Cheap to clone; clones share the same gate.
pub struct HostGate<T> {
    inner: Arc<GateInner<T>>,
}

struct GateInner<T> {
    uid: String,
    paths: GatePaths,
    codec: Arc<dyn Codec<T>>,
    driver: Arc<dyn GateDriver>,
    value: Conflated<T>,
    is_transceiving: Conflated<bool>,
    update_rate: Conflated<f64>,
    failure: Conflated<GateFailure>,
    state: Mutex<TransceivingState>,
    rate_mode: RateMode,
    critical: CriticalErrorBus,
    // in-flight driver command tasks, cancelled when the owning device is
    // torn down, independent of connection state
    command_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T> Clone for HostGate<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> HostGate<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a gate whose update rate is observed from produced values.
    pub fn new<D>(
        uid: &str,
        codec: impl Codec<T> + 'static,
        driver: Arc<D>,
        critical: CriticalErrorBus,
    ) -> Self
    where
        D: GateDriver,
    {
        Self::build(uid, codec, driver, RateMode::Tracked(Mutex::new(RateTracker::new())), critical)
    }

    /// Creates a gate whose update rate is commanded. `initial_hz` is
    /// announced to the remote side so its confirmed setting initialises.
    pub fn with_configured_rate<D>(
        uid: &str,
        codec: impl Codec<T> + 'static,
        driver: Arc<D>,
        initial_hz: f64,
        critical: CriticalErrorBus,
    ) -> Self
    where
        D: RateConfigurableDriver,
    {
        let gate = Self::build(
            uid,
            codec,
            driver.clone(),
            RateMode::Configured(driver),
            critical,
        );
        gate.inner.update_rate.offer(initial_hz);
        gate
    }

    fn build<D>(
        uid: &str,
        codec: impl Codec<T> + 'static,
        driver: Arc<D>,
        rate_mode: RateMode,
        critical: CriticalErrorBus,
    ) -> Self
    where
        D: GateDriver,
    {
        let is_transceiving = Conflated::new();
        // announce Idle so a connecting remote learns the initial state
        is_transceiving.offer(false);
        Self {
            inner: Arc::new(GateInner {
                uid: uid.to_string(),
                paths: GatePaths::new(uid),
                codec: Arc::new(codec),
                driver,
                value: Conflated::new(),
                is_transceiving,
                update_rate: Conflated::new(),
                failure: Conflated::new(),
                state: Mutex::new(TransceivingState::Idle),
                rate_mode,
                critical,
                command_tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn uid(&self) -> &str {
        &self.inner.uid
    }

    /// Publishes a freshly produced value. Called from the driver's sampling
    /// loop; never blocks (conflated delivery).
    pub fn offer(&self, value: T) {
        self.inner.value.offer(value);
        if let RateMode::Tracked(tracker) = &self.inner.rate_mode {
            let mut tracker = tracker.lock();
            tracker.observe(Instant::now());
            if let Some(hz) = tracker.hz() {
                self.inner.update_rate.offer(hz);
            }
        }
    }

    /// Latest published value, if any.
    pub fn latest(&self) -> Option<T> {
        self.inner.value.latest()
    }

    pub fn state(&self) -> TransceivingState {
        *self.inner.state.lock()
    }

    /// Converts a fault raised while producing a value into a `failure`
    /// route notification. The gate's other routes keep running.
    pub fn report_failure(&self, error: DriverError) {
        warn!("gate {} reported failure: {error}", self.inner.uid);
        self.inner.failure.offer(GateFailure {
            uid: self.inner.uid.clone(),
            message: error.to_string(),
        });
    }

    /// Binds this gate's routes into the host-side registry.
    pub fn register_routes(&self, registry: &mut RouteRegistry) -> Result<(), ConfigError> {
        let paths = &self.inner.paths;

        registry
            .route(paths.value.clone())?
            .send_value(self.inner.codec.clone(), &self.inner.value);
        registry
            .route(paths.is_transceiving.clone())?
            .send_value(JsonCodec::new(), &self.inner.is_transceiving);
        registry
            .route(paths.failure.clone())?
            .send_value(JsonCodec::new(), &self.inner.failure);

        {
            let gate = self.clone();
            registry
                .route(paths.start_sampling.clone())?
                .receive_ping(move || gate.handle_start_sampling());
        }
        {
            let gate = self.clone();
            registry
                .route(paths.stop_transceiving.clone())?
                .receive_ping(move || gate.handle_stop_transceiving());
        }

        let update_rate = registry
            .route(paths.update_rate.clone())?
            .send_value(JsonCodec::new(), &self.inner.update_rate);
        if matches!(self.inner.rate_mode, RateMode::Configured(_)) {
            let gate = self.clone();
            update_rate.receive_value(JsonCodec::new(), move |hz: f64| {
                gate.handle_update_rate_request(hz)
            });
        }
        Ok(())
    }

    /// Cancels any in-flight driver command tasks. Called when the owning
    /// device is destroyed.
    pub fn shutdown(&self) {
        for task in self.inner.command_tasks.lock().drain(..) {
            task.abort();
        }
    }

    fn handle_start_sampling(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state == TransceivingState::Sampling {
                debug!("gate {}: start_sampling while Sampling, no-op", self.inner.uid);
                return;
            }
            // reserve the transition before the (async) hardware call so a
            // rapid repeat command cannot activate twice
            *state = TransceivingState::Sampling;
        }
        let inner = self.inner.clone();
        self.track_command(tokio::spawn(async move {
            match inner.driver.start_sampling().await {
                Ok(()) => inner.is_transceiving.offer(true),
                Err(err) => {
                    *inner.state.lock() = TransceivingState::Idle;
                    command_failed(&inner, "start_sampling", err);
                }
            }
        }));
    }

    fn handle_stop_transceiving(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state == TransceivingState::Idle {
                debug!(
                    "gate {}: stop_transceiving while Idle, no-op",
                    self.inner.uid
                );
                return;
            }
            *state = TransceivingState::Idle;
        }
        let inner = self.inner.clone();
        self.track_command(tokio::spawn(async move {
            match inner.driver.stop_transceiving().await {
                Ok(()) => inner.is_transceiving.offer(false),
                Err(err) => {
                    *inner.state.lock() = TransceivingState::Sampling;
                    command_failed(&inner, "stop_transceiving", err);
                }
            }
        }));
    }

    fn handle_update_rate_request(&self, hz: f64) {
        let RateMode::Configured(driver) = &self.inner.rate_mode else {
            warn!(
                "gate {}: update_rate write on a tracked-rate gate, ignoring",
                self.inner.uid
            );
            return;
        };
        let driver = driver.clone();
        let inner = self.inner.clone();
        self.track_command(tokio::spawn(async move {
            match driver.apply_update_rate(hz).await {
                // echoing the applied value is the remote's confirmation
                Ok(applied) => inner.update_rate.offer(applied),
                Err(err) => {
                    // no echo: the remote keeps its previously confirmed rate
                    warn!("gate {}: update rate rejected: {err}", inner.uid);
                    inner.failure.offer(GateFailure {
                        uid: inner.uid.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }));
    }

    fn track_command(&self, task: JoinHandle<()>) {
        let mut tasks = self.inner.command_tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }
}

fn command_failed<T>(inner: &GateInner<T>, command: &str, err: DriverError) {
    warn!("gate {}: {command} failed: {err}", inner.uid);
    inner.failure.offer(GateFailure {
        uid: inner.uid.clone(),
        message: err.to_string(),
    });
    inner.critical.publish(CriticalError::FailedMajorCommand {
        uid: inner.uid.clone(),
        detail: format!("{command}: {err}"),
    });
}
