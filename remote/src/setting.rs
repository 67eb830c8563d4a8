use std::sync::Arc;

use log::debug;

use daqlink_shared::{
    Conflated, ConflatedReceiver, ConnectionStatus, SettingResult, UnviableReason,
};

/// Remote-settable state with speculative-set-then-confirm semantics.
///
/// `set(v)` enqueues `v` on the outbound request slot; the value observable
/// through [`value`](ConfirmedSetting::value) moves only when the peer
/// echoes the applied value back. A caller can therefore never observe a
/// value that was requested but not actually applied. Concurrent `set`
/// calls are conflated: only the most recent request is guaranteed sent.
pub struct ConfirmedSetting<T> {
    inner: Arc<SettingInner<T>>,
}

struct SettingInner<T> {
    confirmed: Conflated<T>,
    request: Conflated<T>,
    range: Option<(T, T)>,
    status: Conflated<ConnectionStatus>,
}

impl<T> Clone for ConfirmedSetting<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> ConfirmedSetting<T>
where
    T: Clone + PartialOrd + Send + Sync + 'static,
{
    pub(crate) fn new(status: Conflated<ConnectionStatus>, range: Option<(T, T)>) -> Self {
        Self {
            inner: Arc::new(SettingInner {
                confirmed: Conflated::new(),
                request: Conflated::new(),
                range,
                status,
            }),
        }
    }

    /// Attempts to set the target value. Returns `Unviable` (without
    /// sending) when no session is connected, when no confirmed value has
    /// initialised the setting yet, or when `value` falls outside the
    /// configured range. A rejected set leaves the confirmed value intact.
    pub fn set(&self, value: T) -> SettingResult {
        if self.inner.status.latest() != Some(ConnectionStatus::Connected) {
            return SettingResult::Unviable(UnviableReason::ConnectionUnavailable);
        }
        if self.inner.confirmed.latest().is_none() {
            return SettingResult::Unviable(UnviableReason::UninitialisedSetting);
        }
        if let Some((low, high)) = &self.inner.range {
            if value < *low || value > *high {
                return SettingResult::Unviable(UnviableReason::SettingOutOfRange);
            }
        }
        self.inner.request.offer(value);
        SettingResult::Viable
    }

    /// The last value the peer confirmed as applied, if any.
    pub fn value(&self) -> Option<T> {
        self.inner.confirmed.latest()
    }

    /// Stream of confirmed values.
    pub fn updates(&self) -> ConflatedReceiver<T> {
        self.inner.confirmed.subscribe()
    }

    /// Records a peer echo of the applied value.
    pub(crate) fn confirm(&self, value: T) {
        debug!("setting confirmed by peer echo");
        self.inner.confirmed.offer(value);
    }

    /// The outbound slot carrying set requests to the peer.
    pub(crate) fn request_slot(&self) -> &Conflated<T> {
        &self.inner.request
    }
}
