//! Datagram Transport.
//!
//! Binds a single UDP socket and multiplexes every protocol family through
//! it. Retransmission is not this layer's job — UDP is fire-and-forget, and
//! retry belongs to the Messenger.

use crate::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Inbound datagrams arrive on this channel as `(source_address, bytes)`.
pub type InboundReceiver = mpsc::Receiver<(SocketAddr, Vec<u8>)>;

const RECV_BUF_SIZE: usize = 2048;
const INBOUND_CHANNEL_CAPACITY: usize = 256;

pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    max_datagram_bytes: usize,
    closed: Arc<AtomicBool>,
}

impl UdpTransport {
    /// Binds `local_binding` (pass `0.0.0.0:0` / `[::]:0` for an ephemeral
    /// port) and spawns the inbound dispatch loop. Returns the transport
    /// handle plus the receiving half of the inbound channel.
    pub async fn open(
        local_binding: SocketAddr,
        max_datagram_bytes: usize,
    ) -> Result<(Self, InboundReceiver), Error> {
        let socket = UdpSocket::bind(local_binding)
            .await
            .map_err(|e| Error::Transport(format!("bind {local_binding}: {e}")))?;
        let socket = Arc::new(socket);
        let closed = Arc::new(AtomicBool::new(false));

        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let recv_socket = Arc::clone(&socket);
        let recv_closed = Arc::clone(&closed);
        tokio::spawn(async move {
            let mut buf = vec![0u8; RECV_BUF_SIZE];
            loop {
                if recv_closed.load(Ordering::Acquire) {
                    break;
                }
                match recv_socket.recv_from(&mut buf).await {
                    Ok((n, source)) => {
                        if tx.send((source, buf[..n].to_vec())).await.is_err() {
                            // No receiver left listening; stop quietly.
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "udp recv_from failed");
                    }
                }
            }
        });

        Ok((UdpTransport { socket, max_datagram_bytes, closed }, rx))
    }

    /// Sends `bytes` to `destination`. Non-blocking beyond awaiting the OS
    /// accepting the datagram; never retries.
    pub async fn send(&self, destination: SocketAddr, bytes: &[u8]) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Transport("transport is closed".to_owned()));
        }
        if bytes.len() > self.max_datagram_bytes {
            return Err(Error::PacketSizeLimitExceeded {
                limit: self.max_datagram_bytes,
                actual: bytes.len(),
            });
        }
        self.socket
            .send_to(bytes, destination)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(())
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Idempotent: subsequent sends fail with [`Error::Transport`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_and_receive_round_trip() {
        let (a, _a_rx) = UdpTransport::open("127.0.0.1:0".parse().unwrap(), 1400)
            .await
            .unwrap();
        let (b, mut b_rx) = UdpTransport::open("127.0.0.1:0".parse().unwrap(), 1400)
            .await
            .unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send(b_addr, b"ping").await.unwrap();
        let (from, bytes) = b_rx.recv().await.unwrap();
        assert_eq!(bytes, b"ping");
        assert_ne!(from.port(), 0);
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected() {
        let (a, _rx) = UdpTransport::open("127.0.0.1:0".parse().unwrap(), 1400)
            .await
            .unwrap();
        let dest: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let big = vec![0u8; 1401];
        let err = a.send(dest, &big).await.unwrap_err();
        assert!(matches!(err, Error::PacketSizeLimitExceeded { limit: 1400, actual: 1401 }));
    }

    #[tokio::test]
    async fn closed_transport_rejects_sends() {
        let (a, _rx) = UdpTransport::open("127.0.0.1:0".parse().unwrap(), 1400)
            .await
            .unwrap();
        a.close();
        a.close(); // idempotent
        let dest: SocketAddr = "127.0.0.1:9".parse().unwrap();
        assert!(a.send(dest, b"x").await.is_err());
    }
}
