use std::{collections::HashMap, mem, sync::Arc};

use futures_util::stream::{self, BoxStream, StreamExt};

use crate::{
    channel::{Conflated, Signal},
    codec::Codec,
    error::{ConfigError, DecodeError},
    path::Path,
};

/// Which end of the link a registry configures. The Host owns the hardware
/// channels; the Remote consumes them. Route directionality is expressed per
/// side, so the same path is typically send-bound on one side and
/// receive-bound on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Host,
    Remote,
}

/// Stream of encoded outbound payloads for one route. `None` items are Pings.
pub(crate) type OutboundStream = BoxStream<'static, Option<Vec<u8>>>;

/// A subscribable source of outbound payloads. Each connection session opens
/// its own stream so that a fresh session re-announces the route's latest
/// value (while Pings raised between sessions stay dropped).
pub(crate) trait OutboundSource: Send + Sync {
    fn open(&self) -> OutboundStream;
}

struct ValueSource<T> {
    slot: Conflated<T>,
    codec: Arc<dyn Codec<T>>,
}

impl<T> OutboundSource for ValueSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn open(&self) -> OutboundStream {
        let rx = self.slot.subscribe();
        let codec = self.codec.clone();
        stream::unfold((rx, codec), |(mut rx, codec)| async move {
            let value = rx.next().await;
            let bytes = codec.encode(&value);
            Some((Some(bytes), (rx, codec)))
        })
        .boxed()
    }
}

struct PingSource {
    signal: Signal,
}

impl OutboundSource for PingSource {
    fn open(&self) -> OutboundStream {
        let rx = self.signal.subscribe();
        stream::unfold(rx, |mut rx| async move {
            rx.wait().await;
            Some((None, rx))
        })
        .boxed()
    }
}

/// Action run on the dispatch task when an inbound frame for a route
/// arrives. Receives the frame's payload (`None` for a Ping).
pub(crate) type InboundAction =
    Box<dyn Fn(&Path, Option<&[u8]>) -> Result<(), DecodeError> + Send + Sync>;

#[derive(Default)]
pub(crate) struct RouteBinding {
    pub(crate) outbound: Option<Box<dyn OutboundSource>>,
    pub(crate) inbound: Option<InboundAction>,
}

/// Configuration-phase builder binding each [`Path`] on one [`Side`] to
/// local send/receive behavior.
///
/// Binding is only legal before [`freeze`](RouteRegistry::freeze); the
/// compiled [`RouteTable`] is immutable and safe for lock-free concurrent
/// lookup.
pub struct RouteRegistry {
    side: Side,
    routes: HashMap<Path, RouteBinding>,
    frozen: bool,
}

impl RouteRegistry {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            routes: HashMap::new(),
            frozen: false,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Opens a binding for `path`. Registering the same path twice on one
    /// side, or registering after `freeze()`, is a configuration error.
    pub fn route(&mut self, path: Path) -> Result<RouteBuilder<'_>, ConfigError> {
        if self.frozen {
            return Err(ConfigError::AlreadyFrozen);
        }
        if self.routes.contains_key(&path) {
            return Err(ConfigError::DuplicateRoute {
                path: path.to_string(),
            });
        }
        let binding = self.routes.entry(path).or_default();
        Ok(RouteBuilder { binding })
    }

    /// Compiles the collected bindings into an immutable lookup table.
    ///
    /// A route registered with neither direction bound is reported here, at
    /// configuration time, rather than surfacing as a silent dead route at
    /// runtime.
    pub fn freeze(&mut self) -> Result<Arc<RouteTable>, ConfigError> {
        if self.frozen {
            return Err(ConfigError::AlreadyFrozen);
        }
        for (path, binding) in &self.routes {
            if binding.outbound.is_none() && binding.inbound.is_none() {
                return Err(ConfigError::UnboundRoute {
                    path: path.to_string(),
                });
            }
        }
        self.frozen = true;
        Ok(Arc::new(RouteTable {
            side: self.side,
            routes: mem::take(&mut self.routes),
        }))
    }
}

/// One route's binding under construction. Either direction may be omitted
/// for one-directional routes; binding both makes the route bidirectional.
pub struct RouteBuilder<'a> {
    binding: &'a mut RouteBinding,
}

impl std::fmt::Debug for RouteBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteBuilder").finish_non_exhaustive()
    }
}

impl RouteBuilder<'_> {
    /// Outbound direction: encoded values are drawn from `slot`, conflated
    /// (a superseded value that was never transmitted is dropped).
    pub fn send_value<T, C>(self, codec: C, slot: &Conflated<T>) -> Self
    where
        T: Clone + Send + Sync + 'static,
        C: Codec<T> + 'static,
    {
        self.binding.outbound = Some(Box::new(ValueSource {
            slot: slot.clone(),
            codec: Arc::new(codec),
        }));
        self
    }

    /// Outbound direction: a Ping frame is sent whenever `signal` is raised.
    pub fn send_ping(self, signal: &Signal) -> Self {
        self.binding.outbound = Some(Box::new(PingSource {
            signal: signal.clone(),
        }));
        self
    }

    /// Inbound direction: decode the payload with `codec` and hand the value
    /// to `action`. Runs on the dispatch task; must not block.
    pub fn receive_value<T, C, F>(self, codec: C, action: F) -> Self
    where
        T: Send + Sync + 'static,
        C: Codec<T> + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.binding.inbound = Some(Box::new(move |path, payload| {
            let bytes = payload.ok_or_else(|| DecodeError::MissingPayload {
                path: path.to_string(),
            })?;
            let value = codec.decode(&path.to_string(), bytes)?;
            action(value);
            Ok(())
        }));
        self
    }

    /// Inbound direction: run `action` when a Ping for this route arrives.
    pub fn receive_ping<F>(self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.binding.inbound = Some(Box::new(move |_path, _payload| {
            action();
            Ok(())
        }));
        self
    }
}

/// Frozen, read-only dispatch table. Shared (`Arc`) by the connection's
/// dispatch and forwarding tasks; concurrent lookups need no locking.
pub struct RouteTable {
    side: Side,
    routes: HashMap<Path, RouteBinding>,
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("side", &self.side)
            .finish_non_exhaustive()
    }
}

impl RouteTable {
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub(crate) fn inbound(&self, path: &Path) -> Option<&InboundAction> {
        self.routes.get(path).and_then(|b| b.inbound.as_ref())
    }

    pub(crate) fn outbound_routes(&self) -> impl Iterator<Item = (&Path, &dyn OutboundSource)> {
        self.routes
            .iter()
            .filter_map(|(path, b)| b.outbound.as_deref().map(|src| (path, src)))
    }
}
