//! A scriptable Source RCON TCP server for testing the auth handshake and
//! multi-packet reassembly.

use std::net::SocketAddr;
use std::sync::Arc;

use gq_wire::rcon::{RconPacket, TYPE_AUTH_RESPONSE_OR_EXECCOMMAND, TYPE_RESPONSE_VALUE};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Canned server behaviors exercised by `gq-core`'s RCON tests.
pub enum MockRconBehavior {
    /// Always answers AUTH with id `-1` (authentication failure).
    RejectAuth,
    /// Accepts any password; echoes each command body back in a single
    /// `RESPONSE_VALUE` frame carrying the command's own request id.
    EchoCommand,
    /// Accepts any password; the first non-empty command gets its
    /// response split across two `RESPONSE_VALUE` frames (both carrying
    /// that command's id) before the follow-up empty command's echo
    /// terminates reassembly.
    SplitResponse { first: String, second: String },
}

pub struct MockRconServer {
    addr: SocketAddr,
    _task: JoinHandle<()>,
}

impl MockRconServer {
    pub async fn start(behavior: MockRconBehavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let behavior = Arc::new(behavior);

        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _peer)) => {
                        let behavior = Arc::clone(&behavior);
                        tokio::spawn(async move {
                            let _ = handle_connection(stream, behavior).await;
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(MockRconServer { addr, _task: task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

async fn read_frame(half: &mut ReadHalf<TcpStream>) -> std::io::Result<RconPacket> {
    let mut size_buf = [0u8; 4];
    half.read_exact(&mut size_buf).await?;
    let size = RconPacket::read_size_prefix(&size_buf);
    let mut body = vec![0u8; size.max(0) as usize];
    half.read_exact(&mut body).await?;
    RconPacket::decode_body(&body)
        .map_err(|e| std::io::Error::other(e.to_string()))
}

async fn write_frame(half: &mut WriteHalf<TcpStream>, packet: &RconPacket) -> std::io::Result<()> {
    half.write_all(&packet.encode()).await
}

async fn handle_connection(
    stream: TcpStream,
    behavior: Arc<MockRconBehavior>,
) -> std::io::Result<()> {
    let (mut read_half, write_half) = tokio::io::split(stream);
    let write_half = Mutex::new(write_half);

    let auth = read_frame(&mut read_half).await?;
    if matches!(behavior.as_ref(), MockRconBehavior::RejectAuth) {
        let mut w = write_half.lock().await;
        write_frame(
            &mut w,
            &RconPacket { id: -1, packet_type: TYPE_AUTH_RESPONSE_OR_EXECCOMMAND, body: String::new() },
        )
        .await?;
        return Ok(());
    }
    {
        let mut w = write_half.lock().await;
        write_frame(
            &mut w,
            &RconPacket {
                id: auth.id,
                packet_type: TYPE_AUTH_RESPONSE_OR_EXECCOMMAND,
                body: String::new(),
            },
        )
        .await?;
    }

    let mut split_sent = false;
    loop {
        let pkt = match read_frame(&mut read_half).await {
            Ok(p) => p,
            Err(_) => break,
        };
        let mut w = write_half.lock().await;
        match behavior.as_ref() {
            MockRconBehavior::RejectAuth => unreachable!("handled above"),
            MockRconBehavior::EchoCommand => {
                write_frame(
                    &mut w,
                    &RconPacket { id: pkt.id, packet_type: TYPE_RESPONSE_VALUE, body: pkt.body },
                )
                .await?;
            }
            MockRconBehavior::SplitResponse { first, second } => {
                if !pkt.body.is_empty() && !split_sent {
                    split_sent = true;
                    write_frame(
                        &mut w,
                        &RconPacket {
                            id: pkt.id,
                            packet_type: TYPE_RESPONSE_VALUE,
                            body: first.clone(),
                        },
                    )
                    .await?;
                    write_frame(
                        &mut w,
                        &RconPacket {
                            id: pkt.id,
                            packet_type: TYPE_RESPONSE_VALUE,
                            body: second.clone(),
                        },
                    )
                    .await?;
                } else {
                    write_frame(
                        &mut w,
                        &RconPacket { id: pkt.id, packet_type: TYPE_RESPONSE_VALUE, body: String::new() },
                    )
                    .await?;
                }
            }
        }
    }
    Ok(())
}
