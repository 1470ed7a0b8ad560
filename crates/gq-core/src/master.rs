//! Master Server iteration loop (C5).
//!
//! Drives the seeded-pagination protocol: start from the sentinel seed,
//! submit a page request, emit every non-sentinel, non-echoed entry to the
//! caller, and continue from the last entry of the page until the
//! terminator appears or the per-request timeout is hit.

use std::net::SocketAddr;
use std::time::Instant;

use gq_wire::endpoint::ServerEndpoint;
use gq_wire::master::MasterServerRequest;
use gq_wire::region::Region;

use crate::config::Config;
use crate::error::Error;
use crate::messenger::{Messenger, OutboundRequest, RequestPayload, ResponseMessage};
use crate::session::Priority;

/// States named in spec.md §4.5. The loop below is a straight-line
/// sequence of awaits rather than an explicit state object — each state
/// corresponds to a span of `query_all`'s body — but the names are kept in
/// `tracing` spans so the states are visible in logs/traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterIterationState {
    Idle,
    Querying,
    AwaitingResponse,
    Emitting,
    Done,
    Failed,
}

/// Per-entry events delivered to the caller during iteration.
///
/// `Entry` fires once per newly-observed, non-sentinel endpoint, in page
/// order. `TimedOut` fires at most once, when the registry's per-page
/// deadline elapses without a response — this is a graceful end of
/// iteration, not a propagated error (spec.md §4.5 step 6, §7).
#[derive(Debug, Clone)]
pub enum MasterEvent {
    Entry(ServerEndpoint),
    TimedOut,
}

/// Drives Master Server pagination on top of a shared [`Messenger`].
pub struct MasterServerClient {
    messenger: std::sync::Arc<Messenger>,
    config: Config,
}

impl MasterServerClient {
    pub fn new(messenger: std::sync::Arc<Messenger>, config: Config) -> Self {
        MasterServerClient { messenger, config }
    }

    /// Runs the full iteration, invoking `on_event` sequentially for every
    /// entry (and once for a timeout, if iteration ends that way), and
    /// returning the full accumulated list. Mirrors the original system's
    /// blocking all-at-once call.
    pub async fn query_all(
        &self,
        master_addr: SocketAddr,
        region: Region,
        filter: String,
        mut on_event: impl FnMut(MasterEvent),
    ) -> Result<Vec<ServerEndpoint>, Error> {
        let mut accumulated = Vec::new();
        let mut seed = ServerEndpoint::SENTINEL;
        let mut state = MasterIterationState::Idle;

        loop {
            state = MasterIterationState::Querying;
            tracing::debug!(?state, %seed, "master server page request");

            let (_request_id, rx) = self.messenger.submit(OutboundRequest {
                payload: RequestPayload::Master(MasterServerRequest {
                    region,
                    seed,
                    filter: filter.clone(),
                }),
                destination: master_addr,
                priority: Priority::High,
            });

            state = MasterIterationState::AwaitingResponse;
            let page = match rx.await {
                Ok(Ok(ResponseMessage::Master(resp))) => resp.entries,
                Ok(Ok(_other)) => {
                    state = MasterIterationState::Failed;
                    tracing::warn!(?state, "unexpected response type for master query");
                    return Err(Error::MalformedPayload(
                        "unexpected response type for master query".to_owned(),
                    ));
                }
                Ok(Err(Error::RequestTimedOut)) => {
                    state = MasterIterationState::Done;
                    tracing::debug!(?state, "master page deadline elapsed, ending iteration");
                    on_event(MasterEvent::TimedOut);
                    return Ok(accumulated);
                }
                Ok(Err(other)) => {
                    state = MasterIterationState::Failed;
                    tracing::warn!(?state, error = %other, "master query failed");
                    return Err(other);
                }
                Err(_recv_dropped) => {
                    state = MasterIterationState::Failed;
                    return Err(Error::Transport(
                        "messenger dropped the completion channel".to_owned(),
                    ));
                }
            };

            state = MasterIterationState::Emitting;
            let mut saw_terminator = false;
            for entry in &page {
                if entry.is_sentinel() {
                    // The terminator is always `0.0.0.0:0`, same as the
                    // sentinel seed that starts iteration — on the first
                    // page `seed` IS the sentinel too, so this check must
                    // run before the echo-skip below or the terminator on
                    // a first page is misread as an echoed seed (spec.md
                    // §9 "Sentinel overloading": position, not value,
                    // disambiguates terminator from echoed seed).
                    saw_terminator = true;
                    break;
                }
                if *entry == seed {
                    continue; // echoed seed from the previous page
                }
                on_event(MasterEvent::Entry(*entry));
                accumulated.push(*entry);
                tokio::time::sleep(self.config.master_pacing_delay()).await;
            }

            if saw_terminator {
                state = MasterIterationState::Done;
                tracing::debug!(?state, total = accumulated.len(), "master iteration complete");
                return Ok(accumulated);
            }

            seed = page.last().copied().unwrap_or(seed);
        }
    }

    /// Streaming variant: spawns the same loop as a background task and
    /// yields each non-sentinel endpoint over a channel as soon as it is
    /// observed, for callers that want to start processing before the
    /// whole iteration finishes.
    pub fn query_stream(
        self: std::sync::Arc<Self>,
        master_addr: SocketAddr,
        region: Region,
        filter: String,
    ) -> tokio::sync::mpsc::Receiver<ServerEndpoint> {
        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move {
            let send = |event: MasterEvent| {
                if let MasterEvent::Entry(entry) = event {
                    let _ = tx.try_send(entry);
                }
            };
            let started = Instant::now();
            let result = self.query_all(master_addr, region, filter, send).await;
            if let Err(e) = result {
                tracing::warn!(error = %e, elapsed = ?started.elapsed(), "master query_stream failed");
            }
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRegistry;
    use crate::transport::UdpTransport;
    use gq_test_utils::mock_master::MockMasterServer;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    fn endpoint(octets: [u8; 4], port: u16) -> ServerEndpoint {
        ServerEndpoint::new(SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::from(octets)), port))
    }

    async fn messenger_for(addr: SocketAddr) -> (Arc<Messenger>, SocketAddr) {
        let (transport, inbound) = UdpTransport::open("127.0.0.1:0".parse().unwrap(), 1400)
            .await
            .unwrap();
        let registry = SessionRegistry::new();
        let messenger = Arc::new(Messenger::spawn(
            Arc::new(transport),
            inbound,
            registry,
            Config::default(),
        ));
        (messenger, addr)
    }

    /// S1: single page with terminator. Raw response is [A,B,C,terminator];
    /// callback fires for A,B,C only; accumulator == [A,B,C].
    #[tokio::test]
    async fn s1_single_page_with_terminator() {
        let pages = vec![vec![
            endpoint([1, 2, 3, 4], 100),
            endpoint([5, 6, 7, 8], 200),
            endpoint([9, 10, 11, 12], 300),
            ServerEndpoint::SENTINEL,
        ]];
        let server = MockMasterServer::start(pages).await.unwrap();
        let (messenger, addr) = messenger_for(server.local_addr()).await;
        let client = MasterServerClient::new(messenger, Config::default());

        let mut seen = Vec::new();
        let result = client
            .query_all(addr, Region::Rest, String::new(), |e| {
                if let MasterEvent::Entry(ep) = e {
                    seen.push(ep);
                }
            })
            .await
            .unwrap();

        assert_eq!(result, seen);
        assert_eq!(result.len(), 3);
        assert!(!result.iter().any(ServerEndpoint::is_sentinel));
    }

    /// S2: two pages. Page1=[A,B,C] (no terminator) -> seed becomes C.
    /// Page2=[C,D,E,terminator]; echoed C is skipped; accumulator has five
    /// distinct entries, C exactly once.
    #[tokio::test]
    async fn s2_two_pages_dedupes_echoed_seed() {
        let a = endpoint([1, 1, 1, 1], 1);
        let b = endpoint([2, 2, 2, 2], 2);
        let c = endpoint([3, 3, 3, 3], 3);
        let d = endpoint([4, 4, 4, 4], 4);
        let e = endpoint([5, 5, 5, 5], 5);

        let pages = vec![vec![a, b, c], vec![c, d, e, ServerEndpoint::SENTINEL]];
        let server = MockMasterServer::start(pages).await.unwrap();
        let (messenger, addr) = messenger_for(server.local_addr()).await;
        let client = MasterServerClient::new(messenger, Config::default());

        let result = client
            .query_all(addr, Region::Rest, String::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(result, vec![a, b, c, d, e]);
    }

    /// Idempotence: running the same scripted iteration twice yields
    /// identical accumulated lists.
    #[tokio::test]
    async fn master_loop_is_idempotent_across_runs() {
        let pages = vec![vec![
            endpoint([1, 2, 3, 4], 100),
            endpoint([5, 6, 7, 8], 200),
            ServerEndpoint::SENTINEL,
        ]];
        let server = MockMasterServer::start(pages.clone()).await.unwrap();
        let (messenger, addr) = messenger_for(server.local_addr()).await;
        let client = MasterServerClient::new(messenger, Config::default());
        let first = client
            .query_all(addr, Region::Rest, String::new(), |_| {})
            .await
            .unwrap();

        let server2 = MockMasterServer::start(pages).await.unwrap();
        let (messenger2, addr2) = messenger_for(server2.local_addr()).await;
        let client2 = MasterServerClient::new(messenger2, Config::default());
        let second = client2
            .query_all(addr2, Region::Rest, String::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(first, second);
    }
}
