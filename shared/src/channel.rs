use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Single-slot, drop-oldest, multi-reader value holder.
///
/// A producer calls [`offer`](Conflated::offer), which never blocks: if the
/// previously offered value has not been consumed yet it is simply replaced.
/// Any number of receivers may subscribe; each tracks its own last-seen
/// version, so a slow reader never steals freshness from another. Every
/// reader always observes the most recently offered value, never a backlog.
pub struct Conflated<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    notify: Notify,
}

struct Slot<T> {
    value: Option<T>,
    version: u64,
}

impl<T: Clone> Conflated<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    value: None,
                    version: 0,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Replaces the slot's content with `value` and wakes all waiting
    /// receivers. Never blocks the producer.
    pub fn offer(&self, value: T) {
        {
            let mut slot = self.shared.slot.lock();
            slot.value = Some(value);
            slot.version += 1;
        }
        self.shared.notify.notify_waiters();
    }

    /// The most recently offered value, if any, without consuming it.
    pub fn latest(&self) -> Option<T> {
        self.shared.slot.lock().value.clone()
    }

    /// Creates a receiver. If a value is already present, the receiver's
    /// first [`next`](ConflatedReceiver::next) resolves immediately with it.
    pub fn subscribe(&self) -> ConflatedReceiver<T> {
        ConflatedReceiver {
            shared: self.shared.clone(),
            seen: 0,
        }
    }
}

impl<T: Clone> Default for Conflated<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Conflated<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// Reader end of a [`Conflated`] slot.
pub struct ConflatedReceiver<T> {
    shared: Arc<Shared<T>>,
    seen: u64,
}

impl<T: Clone> ConflatedReceiver<T> {
    /// Waits for a value this receiver has not observed yet and returns it.
    /// Values superseded before the call resolves are never returned.
    pub async fn next(&mut self) -> T {
        loop {
            // The notified future must be registered before the slot check,
            // otherwise an offer between check and await would be missed.
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let slot = self.shared.slot.lock();
                if slot.version > self.seen {
                    self.seen = slot.version;
                    if let Some(value) = slot.value.clone() {
                        return value;
                    }
                }
            }

            notified.await;
        }
    }

    /// Returns an unobserved value if one is present, without waiting.
    pub fn try_next(&mut self) -> Option<T> {
        let slot = self.shared.slot.lock();
        if slot.version > self.seen {
            self.seen = slot.version;
            slot.value.clone()
        } else {
            None
        }
    }
}

/// Payload-less counterpart of [`Conflated`], used for command Pings.
///
/// Multiple [`signal`](Signal::signal) calls before a waiting receiver wakes
/// collapse into a single wakeup: command delivery is last-command-wins, by
/// the same conflation policy values follow. Receivers observe only signals
/// raised after they subscribed, so commands issued while no session is
/// running are dropped rather than replayed.
pub struct Signal {
    shared: Arc<SignalShared>,
}

struct SignalShared {
    count: AtomicU64,
    notify: Notify,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SignalShared {
                count: AtomicU64::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Raises the signal, waking all waiting receivers.
    pub fn signal(&self) {
        self.shared.count.fetch_add(1, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }

    /// Creates a receiver that observes only signals raised from now on.
    pub fn subscribe(&self) -> SignalReceiver {
        SignalReceiver {
            seen: self.shared.count.load(Ordering::SeqCst),
            shared: self.shared.clone(),
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Signal {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// Reader end of a [`Signal`].
pub struct SignalReceiver {
    shared: Arc<SignalShared>,
    seen: u64,
}

impl SignalReceiver {
    /// Waits until the signal has been raised at least once since the last
    /// wait (or since subscription). Intervening raises collapse.
    pub async fn wait(&mut self) {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let count = self.shared.count.load(Ordering::SeqCst);
            if count > self.seen {
                self.seen = count;
                return;
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn last_offer_wins() {
        let slot = Conflated::new();
        let mut rx = slot.subscribe();
        slot.offer(1.0_f64);
        slot.offer(2.0_f64);
        assert_eq!(rx.next().await, 2.0);
        assert_eq!(rx.try_next(), None);
    }

    #[tokio::test]
    async fn late_subscriber_sees_current_value() {
        let slot = Conflated::new();
        slot.offer(0.0_f64);
        slot.offer(5.0_f64);
        let mut rx = slot.subscribe();
        assert_eq!(rx.next().await, 5.0);
    }

    #[tokio::test]
    async fn offer_never_blocks_without_consumers() {
        let slot = Conflated::new();
        for i in 0..10_000 {
            slot.offer(i);
        }
        assert_eq!(slot.latest(), Some(9_999));
    }

    #[tokio::test]
    async fn waiting_receiver_is_woken() {
        let slot = Conflated::new();
        let mut rx = slot.subscribe();
        let reader = tokio::spawn(async move { rx.next().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        slot.offer(42_u32);
        assert_eq!(reader.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn receivers_do_not_steal_from_each_other() {
        let slot = Conflated::new();
        let mut a = slot.subscribe();
        let mut b = slot.subscribe();
        slot.offer("reading".to_string());
        assert_eq!(a.next().await, "reading");
        assert_eq!(b.next().await, "reading");
    }

    #[tokio::test]
    async fn signals_collapse() {
        let signal = Signal::new();
        let mut rx = signal.subscribe();
        signal.signal();
        signal.signal();
        signal.signal();
        rx.wait().await;
        // all three raises collapsed into one wakeup
        assert!(tokio::time::timeout(Duration::from_millis(20), rx.wait())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn signal_receiver_ignores_earlier_raises() {
        let signal = Signal::new();
        signal.signal();
        let mut rx = signal.subscribe();
        let pending = tokio::time::timeout(Duration::from_millis(20), rx.wait()).await;
        assert!(pending.is_err());
    }
}
