//! Session Registry: tracks outstanding requests and expires them.
//!
//! Modeled as an arena: sessions live in a slot map indexed by a monotonic
//! sequence number; the key->index lookup and the timeout timer both
//! reference the index, never own the slot, so removal by index is safe
//! under concurrent access.

use gq_wire::ProtocolFamily;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::Error;

/// The composite identifier used to match an inbound packet to an
/// outstanding request.
///
/// Only used by the UDP families (A2S, Master) that this registry
/// arbitrates; RCON is deliberately not one of them (see
/// `gq_wire::ProtocolFamily`'s doc comment) so the key carries no RCON
/// request id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub remote: SocketAddr,
    pub family: ProtocolFamily,
}

impl SessionKey {
    pub fn udp(remote: SocketAddr, family: ProtocolFamily) -> Self {
        SessionKey { remote, family }
    }
}

/// Request priority. Ordered so that `High > Normal > Low` under the
/// derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    /// One step up, saturating at `High` — used by the Messenger's aging
    /// rule.
    pub fn promote(self) -> Priority {
        match self {
            Priority::Low => Priority::Normal,
            Priority::Normal => Priority::High,
            Priority::High => Priority::High,
        }
    }
}

struct Slot<T> {
    key: SessionKey,
    registered_at: Instant,
    completion: Option<oneshot::Sender<Result<T, Error>>>,
    timer: Option<JoinHandle<()>>,
}

struct Inner<T> {
    by_key: HashMap<SessionKey, u64>,
    slots: HashMap<u64, Slot<T>>,
}

/// The session registry, generic over the completion payload type so that
/// a single implementation serves every protocol family sharing the
/// Messenger.
pub struct SessionRegistry<T> {
    inner: Mutex<Inner<T>>,
    sequence: AtomicU64,
}

impl<T: Send + 'static> SessionRegistry<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(SessionRegistry {
            inner: Mutex::new(Inner { by_key: HashMap::new(), slots: HashMap::new() }),
            sequence: AtomicU64::new(0),
        })
    }

    /// Inserts the session and starts its timeout timer. Fails with
    /// [`Error::DuplicateSession`] if a live session with the same key
    /// already exists — the caller's completion sender is handed back
    /// unused so the caller can still resolve it (with `DuplicateSession`)
    /// rather than dropping it silently.
    #[allow(clippy::type_complexity)]
    pub fn register(
        self: &Arc<Self>,
        key: SessionKey,
        timeout: Duration,
        completion: oneshot::Sender<Result<T, Error>>,
    ) -> Result<u64, (Error, oneshot::Sender<Result<T, Error>>)> {
        let index = {
            let mut inner = self.inner.lock().unwrap();
            if inner.by_key.contains_key(&key) {
                return Err((Error::DuplicateSession(key), completion));
            }
            let index = self.sequence.fetch_add(1, Ordering::Relaxed);
            inner.by_key.insert(key.clone(), index);
            inner.slots.insert(
                index,
                Slot { key, registered_at: Instant::now(), completion: Some(completion), timer: None },
            );
            index
        };

        let registry = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            registry.expire(index);
        });

        let mut inner = self.inner.lock().unwrap();
        match inner.slots.get_mut(&index) {
            Some(slot) => slot.timer = Some(timer),
            None => timer.abort(), // already completed/cancelled before the timer was attached
        }
        Ok(index)
    }

    /// Atomically removes and returns the session's completion handle.
    /// Cancels its timer. Returns `None` if absent (already matched,
    /// expired, or cancelled) — an unmatched inbound packet is not an
    /// error.
    pub fn take(&self, key: &SessionKey) -> Option<(u64, oneshot::Sender<Result<T, Error>>)> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner.by_key.remove(key)?;
        let mut slot = inner.slots.remove(&index)?;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.completion.take().map(|c| (index, c))
    }

    /// Invoked by the timer; removes the session and completes its handle
    /// with [`Error::RequestTimedOut`] if still present. A no-op if the
    /// session was already taken or cancelled.
    pub fn expire(&self, index: u64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(mut slot) = inner.slots.remove(&index) {
            inner.by_key.remove(&slot.key);
            if let Some(completion) = slot.completion.take() {
                let _ = completion.send(Err(Error::RequestTimedOut));
            }
        }
    }

    /// User-initiated cancellation; a no-op if the response already matched.
    pub fn cancel(&self, index: u64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(mut slot) = inner.slots.remove(&index) {
            inner.by_key.remove(&slot.key);
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
            if let Some(completion) = slot.completion.take() {
                let _ = completion.send(Err(Error::Cancelled));
            }
        }
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.inner.lock().unwrap().by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn registered_at(&self, index: u64) -> Option<Instant> {
        self.inner.lock().unwrap().slots.get(&index).map(|s| s.registered_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gq_wire::ProtocolFamily;

    fn key(port: u16) -> SessionKey {
        SessionKey::udp(format!("127.0.0.1:{port}").parse().unwrap(), ProtocolFamily::A2sInfo)
    }

    #[tokio::test]
    async fn register_then_take_returns_completion() {
        let registry: Arc<SessionRegistry<u32>> = SessionRegistry::new();
        let (tx, rx) = oneshot::channel();
        let index = registry.register(key(1), Duration::from_secs(5), tx).unwrap();
        let (taken_index, completion) = registry.take(&key(1)).unwrap();
        assert_eq!(taken_index, index);
        completion.send(Ok(7)).unwrap();
        assert_eq!(rx.await.unwrap().unwrap(), 7);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn duplicate_session_is_rejected_without_disturbing_original() {
        let registry: Arc<SessionRegistry<u32>> = SessionRegistry::new();
        let (tx1, _rx1) = oneshot::channel();
        registry.register(key(2), Duration::from_secs(5), tx1).unwrap();

        let (tx2, rx2) = oneshot::channel::<Result<u32, Error>>();
        let err = registry.register(key(2), Duration::from_secs(5), tx2);
        match err {
            Err((Error::DuplicateSession(_), returned_tx)) => drop(returned_tx),
            _ => panic!("expected DuplicateSession with sender handed back"),
        }
        drop(rx2);

        assert_eq!(registry.len(), 1);
        // original session is unaffected and still resolvable
        let (_idx, completion) = registry.take(&key(2)).unwrap();
        completion.send(Ok(1)).unwrap();
    }

    #[tokio::test]
    async fn timeout_resolves_request_timed_out_and_clears_registry() {
        let registry: Arc<SessionRegistry<u32>> = SessionRegistry::new();
        let (tx, rx) = oneshot::channel();
        registry.register(key(3), Duration::from_millis(20), tx).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(250), rx).await;
        let resolved = result.expect("should resolve within 250ms").unwrap();
        assert!(matches!(resolved, Err(Error::RequestTimedOut)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn cancel_after_match_is_a_no_op() {
        let registry: Arc<SessionRegistry<u32>> = SessionRegistry::new();
        let (tx, rx) = oneshot::channel();
        let index = registry.register(key(4), Duration::from_secs(5), tx).unwrap();
        let (_idx, completion) = registry.take(&key(4)).unwrap();
        completion.send(Ok(99)).unwrap();

        registry.cancel(index); // no matching slot anymore; must not panic or double-send
        assert_eq!(rx.await.unwrap().unwrap(), 99);
    }

    #[tokio::test]
    async fn key_is_reusable_after_completion() {
        let registry: Arc<SessionRegistry<u32>> = SessionRegistry::new();
        let (tx1, _rx1) = oneshot::channel();
        registry.register(key(5), Duration::from_secs(5), tx1).unwrap();
        let (_idx, completion) = registry.take(&key(5)).unwrap();
        completion.send(Ok(1)).unwrap();

        let (tx2, _rx2) = oneshot::channel();
        assert!(registry.register(key(5), Duration::from_secs(5), tx2).is_ok());
    }

    #[test]
    fn priority_promotion_saturates_at_high() {
        assert_eq!(Priority::Low.promote(), Priority::Normal);
        assert_eq!(Priority::Normal.promote(), Priority::High);
        assert_eq!(Priority::High.promote(), Priority::High);
    }

    #[test]
    fn priority_ordering_is_high_first() {
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }
}
