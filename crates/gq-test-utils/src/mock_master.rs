//! A scripted Valve Master Server: each successive request gets the next
//! page from a fixed script, encoded as a real wire response. The last
//! page repeats once the script is exhausted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gq_wire::endpoint::ServerEndpoint;
use gq_wire::master::MasterServerResponse;

use crate::mock_udp::MockUdpServer;

pub struct MockMasterServer {
    inner: MockUdpServer,
}

impl MockMasterServer {
    pub async fn start(pages: Vec<Vec<ServerEndpoint>>) -> std::io::Result<Self> {
        let pages = Arc::new(pages);
        let index = Arc::new(AtomicUsize::new(0));
        let inner = MockUdpServer::start(move |_from, _request| {
            let i = index.fetch_add(1, Ordering::SeqCst);
            let entries = pages
                .get(i.min(pages.len().saturating_sub(1)))
                .cloned()
                .unwrap_or_default();
            MasterServerResponse { entries }.encode()
        })
        .await?;
        Ok(MockMasterServer { inner })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }
}
