//! Messenger: the shared outbound queue, rate limiter, and response
//! correlator for every UDP protocol family.
//!
//! Owns outbound queueing, dispatch, and response correlation. Runs as a
//! single actor task reachable only through channels — no
//! `Mutex<PriorityQueue>` shared directly with callers.

use gq_wire::a2s::{
    A2sInfoRequest, A2sInfoResponse, A2sPlayersRequest, A2sPlayersResult, A2sRulesRequest,
    A2sRulesResult, decode_a2s_players, decode_a2s_rules,
};
use gq_wire::master::{MasterServerRequest, MasterServerResponse};
use gq_wire::{ProtocolFamily, WireError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, oneshot};

use crate::config::Config;
use crate::error::Error;
use crate::session::{Priority, SessionKey, SessionRegistry};
use crate::transport::{InboundReceiver, UdpTransport};

/// The per-protocol request payloads the Messenger can encode and dispatch.
#[derive(Debug, Clone)]
pub enum RequestPayload {
    A2sInfo(A2sInfoRequest),
    A2sPlayers(A2sPlayersRequest),
    A2sRules(A2sRulesRequest),
    Master(MasterServerRequest),
}

impl RequestPayload {
    pub fn family(&self) -> ProtocolFamily {
        match self {
            RequestPayload::A2sInfo(_) => ProtocolFamily::A2sInfo,
            RequestPayload::A2sPlayers(_) => ProtocolFamily::A2sPlayers,
            RequestPayload::A2sRules(_) => ProtocolFamily::A2sRules,
            RequestPayload::Master(_) => ProtocolFamily::Master,
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            RequestPayload::A2sInfo(r) => r.encode(),
            RequestPayload::A2sPlayers(r) => r.encode(),
            RequestPayload::A2sRules(r) => r.encode(),
            RequestPayload::Master(r) => r.encode(),
        }
    }
}

/// The decoded response types the Messenger can hand back to a caller.
#[derive(Debug, Clone)]
pub enum ResponseMessage {
    A2sInfo(A2sInfoResponse),
    A2sPlayers(A2sPlayersResult),
    A2sRules(A2sRulesResult),
    Master(MasterServerResponse),
}

/// A caller's request, before it is assigned a sequence index.
pub struct OutboundRequest {
    pub payload: RequestPayload,
    pub destination: SocketAddr,
    pub priority: Priority,
}

type Completion = oneshot::Sender<Result<ResponseMessage, Error>>;

/// Identifies one `submit`ted request for the lifetime of its pending
/// response, so a caller can later ask [`Messenger::cancel`] to drop it.
pub type RequestId = u64;

struct QueuedItem {
    request: OutboundRequest,
    submitted_at: Instant,
    sequence: u64,
    completion: Completion,
}

const RATE_MAP_MAX_ENTRIES: usize = 4096;
const SESSION_INDEX_MAP_MAX_ENTRIES: usize = 4096;

/// Tracks, for requests that have left the queue and been registered with
/// the session registry, which registry index they were assigned — so
/// `Messenger::cancel` can find them by the `RequestId` handed back from
/// `submit`. Bounded and LRU-pruned like `RateLimiter`; a pruned or
/// otherwise stale entry just makes a later `cancel` a no-op, which is
/// indistinguishable from cancelling a request that already completed.
struct SessionIndexMap {
    by_sequence: Mutex<HashMap<RequestId, (u64, Instant)>>,
}

impl SessionIndexMap {
    fn new() -> Self {
        SessionIndexMap { by_sequence: Mutex::new(HashMap::new()) }
    }

    fn record(&self, sequence: RequestId, index: u64) {
        let mut map = self.by_sequence.lock().unwrap();
        map.insert(sequence, (index, Instant::now()));
        if map.len() > SESSION_INDEX_MAP_MAX_ENTRIES {
            let oldest = map.iter().min_by_key(|(_, &(_, t))| t).map(|(&seq, _)| seq);
            if let Some(oldest) = oldest {
                map.remove(&oldest);
            }
        }
    }

    fn take(&self, sequence: RequestId) -> Option<u64> {
        self.by_sequence.lock().unwrap().remove(&sequence).map(|(index, _)| index)
    }
}

/// Per-destination last-send timestamps, enforcing the Master Server
/// pacing delay. Pruned by LRU once it grows past [`RATE_MAP_MAX_ENTRIES`].
struct RateLimiter {
    last_send: Mutex<HashMap<SocketAddr, Instant>>,
}

impl RateLimiter {
    fn new() -> Self {
        RateLimiter { last_send: Mutex::new(HashMap::new()) }
    }

    async fn wait_if_needed(&self, destination: SocketAddr, min_interval: Duration) {
        let wait = {
            let map = self.last_send.lock().unwrap();
            map.get(&destination).and_then(|&last| {
                let elapsed = last.elapsed();
                (elapsed < min_interval).then(|| min_interval - elapsed)
            })
        };
        if let Some(wait) = wait {
            tokio::time::sleep(wait).await;
        }
    }

    fn record_send(&self, destination: SocketAddr) {
        let mut map = self.last_send.lock().unwrap();
        map.insert(destination, Instant::now());
        if map.len() > RATE_MAP_MAX_ENTRIES {
            let oldest = map.iter().min_by_key(|(_, &t)| t).map(|(&addr, _)| addr);
            if let Some(oldest) = oldest {
                map.remove(&oldest);
            }
        }
    }
}

struct MessengerState {
    queue: Mutex<Vec<QueuedItem>>,
    notify: Notify,
    sequence: AtomicU64,
    transport: Arc<UdpTransport>,
    registry: Arc<SessionRegistry<ResponseMessage>>,
    rate_limiter: RateLimiter,
    session_index: SessionIndexMap,
    config: Config,
}

/// Picks the queue index to dispatch next: highest effective priority
/// (after aging promotion) first, FIFO by sequence among ties.
fn select_next_index(queue: &[QueuedItem], aging: Duration) -> Option<usize> {
    let now = Instant::now();
    let mut best: Option<(usize, Priority, u64)> = None;
    for (i, item) in queue.iter().enumerate() {
        let mut effective = item.request.priority;
        if now.duration_since(item.submitted_at) > aging {
            effective = effective.promote();
        }
        let is_better = match best {
            None => true,
            Some((_, best_p, best_seq)) => {
                effective > best_p || (effective == best_p && item.sequence < best_seq)
            }
        };
        if is_better {
            best = Some((i, effective, item.sequence));
        }
    }
    best.map(|(i, _, _)| i)
}

pub struct Messenger {
    state: Arc<MessengerState>,
}

impl Messenger {
    /// Spawns the dispatch loop and the inbound-packet handler, both
    /// driven by the given transport.
    pub fn spawn(
        transport: Arc<UdpTransport>,
        inbound: InboundReceiver,
        registry: Arc<SessionRegistry<ResponseMessage>>,
        config: Config,
    ) -> Messenger {
        let state = Arc::new(MessengerState {
            queue: Mutex::new(Vec::new()),
            notify: Notify::new(),
            sequence: AtomicU64::new(0),
            transport,
            registry,
            rate_limiter: RateLimiter::new(),
            session_index: SessionIndexMap::new(),
            config,
        });

        tokio::spawn(dispatch_loop(Arc::clone(&state)));
        tokio::spawn(inbound_loop(Arc::clone(&state), inbound));

        Messenger { state }
    }

    /// Places `request` on the priority-ordered queue; returns its
    /// [`RequestId`] (for a later [`Messenger::cancel`]) alongside the
    /// completion handle.
    pub fn submit(
        &self,
        request: OutboundRequest,
    ) -> (RequestId, oneshot::Receiver<Result<ResponseMessage, Error>>) {
        let (tx, rx) = oneshot::channel();
        let sequence = self.state.sequence.fetch_add(1, Ordering::Relaxed);
        let item = QueuedItem { request, submitted_at: Instant::now(), sequence, completion: tx };
        {
            let mut queue = self.state.queue.lock().unwrap();
            queue.push(item);
        }
        self.state.notify.notify_one();
        (sequence, rx)
    }

    /// Cancels a previously submitted request by the id `submit` returned.
    /// A no-op if the request already completed (matched, timed out, or
    /// was already cancelled) or if `id` is unknown — see spec.md §5
    /// "Cancellation after the response has already been matched is a
    /// no-op".
    pub fn cancel(&self, id: RequestId) {
        let still_queued = {
            let mut queue = self.state.queue.lock().unwrap();
            queue.iter().position(|item| item.sequence == id).map(|i| queue.remove(i))
        };
        if let Some(item) = still_queued {
            let _ = item.completion.send(Err(Error::Cancelled));
            return;
        }
        if let Some(index) = self.state.session_index.take(id) {
            self.state.registry.cancel(index);
        }
        // Otherwise the request is between leaving the queue and being
        // registered (e.g. waiting on the Master Server rate limiter) —
        // a narrow window where cancellation is a documented no-op.
    }

    pub fn registry(&self) -> &Arc<SessionRegistry<ResponseMessage>> {
        &self.state.registry
    }
}

async fn dispatch_loop(state: Arc<MessengerState>) {
    loop {
        let item = loop {
            let next = {
                let mut queue = state.queue.lock().unwrap();
                select_next_index(&queue, state.config.priority_aging()).map(|i| queue.remove(i))
            };
            match next {
                Some(item) => break item,
                None => state.notify.notified().await,
            }
        };
        process_one(&state, item).await;
    }
}

async fn process_one(state: &Arc<MessengerState>, item: QueuedItem) {
    let QueuedItem { request, completion, sequence, .. } = item;
    let family = request.payload.family();
    let bytes = request.payload.encode();

    if bytes.len() > state.config.max_datagram_bytes {
        let _ = completion.send(Err(Error::PacketSizeLimitExceeded {
            limit: state.config.max_datagram_bytes,
            actual: bytes.len(),
        }));
        return;
    }

    if family == ProtocolFamily::Master {
        state
            .rate_limiter
            .wait_if_needed(request.destination, state.config.master_pacing_delay())
            .await;
    }

    let key = SessionKey::udp(request.destination, family);
    let completion = match state.registry.register(key, state.config.request_timeout(), completion) {
        Ok(index) => {
            state.session_index.record(sequence, index);
            None
        }
        Err((err, completion)) => {
            let _ = completion.send(Err(err));
            return;
        }
    };
    debug_assert!(completion.is_none());

    match state.transport.send(request.destination, &bytes).await {
        Ok(()) => {
            state.rate_limiter.record_send(request.destination);
        }
        Err(e) => {
            let key = SessionKey::udp(request.destination, family);
            if let Some((_idx, completion)) = state.registry.take(&key) {
                let _ = completion.send(Err(e));
            }
        }
    }
}

async fn inbound_loop(state: Arc<MessengerState>, mut inbound: InboundReceiver) {
    while let Some((source, bytes)) = inbound.recv().await {
        handle_inbound(&state, source, &bytes);
    }
}

fn handle_inbound(state: &Arc<MessengerState>, source: SocketAddr, bytes: &[u8]) {
    if bytes.len() < 5 {
        tracing::debug!(len = bytes.len(), "inbound packet too short to classify, discarding");
        return;
    }
    let discriminator = bytes[4];
    let (family, decoded): (ProtocolFamily, Result<ResponseMessage, Error>) = match discriminator {
        0x49 => (
            ProtocolFamily::A2sInfo,
            A2sInfoResponse::decode(bytes).map(ResponseMessage::A2sInfo).map_err(Error::from),
        ),
        0x44 => (
            ProtocolFamily::A2sPlayers,
            decode_a2s_players(bytes).map(ResponseMessage::A2sPlayers).map_err(Error::from),
        ),
        0x45 => (
            ProtocolFamily::A2sRules,
            decode_a2s_rules(bytes).map(ResponseMessage::A2sRules).map_err(Error::from),
        ),
        // 0x41 (challenge) is shared between A2S_PLAYERS and A2S_RULES;
        // disambiguate by which family has a live session for this source.
        0x41 => {
            if state.registry.contains(&SessionKey::udp(source, ProtocolFamily::A2sPlayers)) {
                (
                    ProtocolFamily::A2sPlayers,
                    decode_a2s_players(bytes).map(ResponseMessage::A2sPlayers).map_err(Error::from),
                )
            } else {
                (
                    ProtocolFamily::A2sRules,
                    decode_a2s_rules(bytes).map(ResponseMessage::A2sRules).map_err(Error::from),
                )
            }
        }
        0x66 => (
            ProtocolFamily::Master,
            MasterServerResponse::decode(bytes).map(ResponseMessage::Master).map_err(Error::from),
        ),
        other => {
            let _: WireError = WireError::unrecognized(other, bytes);
            tracing::debug!(discriminator = other, "unrecognized inbound discriminator, discarding");
            return;
        }
    };

    let key = SessionKey::udp(source, family);
    match state.registry.take(&key) {
        Some((_index, completion)) => {
            let _ = completion.send(decoded);
        }
        None => tracing::debug!(?key, "unmatched inbound packet discarded"),
    }
}
