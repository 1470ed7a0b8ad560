//! End-to-end scenarios against the public facade, exercising the mock
//! UDP/TCP servers in `gq-test-utils` the way a real game server or master
//! server would be hit.

use std::net::Ipv4Addr;

use std::sync::atomic::{AtomicUsize, Ordering};

use gamequery::{Client, Config, MasterEvent, Region, ServerEndpoint};
use gq_test_utils::mock_rcon::{MockRconBehavior, MockRconServer};
use gq_test_utils::mock_udp::MockUdpServer;
use gq_wire::master::MasterServerResponse;

fn endpoint(octets: [u8; 4], port: u16) -> ServerEndpoint {
    ServerEndpoint::new(std::net::SocketAddr::new(
        std::net::IpAddr::V4(Ipv4Addr::from(octets)),
        port,
    ))
}

#[tokio::test]
async fn players_query_resolves_a_challenge_then_returns_entries() {
    let server = MockUdpServer::start(|_from, request| {
        let challenge = u32::from_le_bytes(request[5..9].try_into().unwrap());
        if challenge == gq_wire::a2s::CHALLENGE_PLACEHOLDER {
            let mut buf = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x41];
            buf.extend_from_slice(&0xAABB_CCDDu32.to_le_bytes());
            buf
        } else {
            let mut buf = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x44, 1, 0];
            buf.extend_from_slice(b"bob\0");
            buf.extend_from_slice(&5i32.to_le_bytes());
            buf.extend_from_slice(&42.0f32.to_le_bytes());
            buf
        }
    })
    .await
    .unwrap();

    let client = Client::bind_default().await.unwrap();
    let players = client.query_players(server.local_addr()).await.unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].name, "bob");
}

#[tokio::test]
async fn master_iteration_ends_gracefully_on_timeout() {
    // A master server that only ever answers the first request; the
    // second page request goes unanswered, so the registry times it out
    // and the loop treats that as a graceful end of iteration.
    let only_entry = endpoint([10, 0, 0, 1], 27015);
    let requests = AtomicUsize::new(0);
    let server = MockUdpServer::start(move |_from, _request| {
        if requests.fetch_add(1, Ordering::SeqCst) == 0 {
            MasterServerResponse { entries: vec![only_entry] }.encode()
        } else {
            Vec::new()
        }
    })
    .await
    .unwrap();

    let mut config = Config::default();
    config.request_timeout_ms = 150;
    let client = Client::bind(config).await.unwrap();

    let mut timed_out = false;
    let mut entries = Vec::new();
    let result = client
        .master()
        .query_all(server.local_addr(), Region::Rest, String::new(), |event| match event {
            MasterEvent::Entry(e) => entries.push(e),
            MasterEvent::TimedOut => timed_out = true,
        })
        .await
        .unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(entries, result);
    assert!(timed_out, "second page's timeout should end iteration gracefully");
}

#[tokio::test]
async fn rcon_auth_then_multi_packet_command_round_trip() {
    let server = MockRconServer::start(MockRconBehavior::SplitResponse {
        first: "cvar sv_gravity = ".to_owned(),
        second: "800".to_owned(),
    })
    .await
    .unwrap();

    let client = Client::bind_default().await.unwrap();
    let rcon = client.rcon_connect(server.local_addr(), "hunter2").await.unwrap();
    let reply = rcon.execute("sv_gravity").await.unwrap();
    assert_eq!(reply, "cvar sv_gravity = 800");
}

#[tokio::test]
async fn rcon_rejects_bad_password() {
    let server = MockRconServer::start(MockRconBehavior::RejectAuth).await.unwrap();
    let client = Client::bind_default().await.unwrap();
    let result = client.rcon_connect(server.local_addr(), "wrong").await;
    assert!(result.is_err());
}
