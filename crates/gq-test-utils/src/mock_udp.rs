//! A generic scriptable UDP server for integration testing.
//!
//! Binds to `127.0.0.1:0` and invokes the supplied handler for every
//! inbound datagram. A handler returning an empty `Vec` sends nothing back
//! — used to simulate a server that never replies (request timeout
//! scenarios).

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub struct MockUdpServer {
    addr: SocketAddr,
    _task: JoinHandle<()>,
}

impl MockUdpServer {
    pub async fn start<F>(handler: F) -> std::io::Result<Self>
    where
        F: Fn(SocketAddr, &[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;

        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((n, from)) => {
                        let response = handler(from, &buf[..n]);
                        if !response.is_empty() {
                            let _ = socket.send_to(&response, from).await;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(MockUdpServer { addr, _task: task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UdpSocket;

    #[tokio::test]
    async fn echoes_via_handler() {
        let server = MockUdpServer::start(|_from, req| req.to_vec()).await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"hi", server.local_addr()).await.unwrap();
        let mut buf = [0u8; 16];
        let (n, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hi");
    }

    #[tokio::test]
    async fn empty_response_sends_nothing() {
        let server = MockUdpServer::start(|_from, _req| Vec::new()).await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"hi", server.local_addr()).await.unwrap();
        let mut buf = [0u8; 16];
        let result = tokio::time::timeout(std::time::Duration::from_millis(100), client.recv_from(&mut buf)).await;
        assert!(result.is_err(), "expected no reply within 100ms");
    }
}
