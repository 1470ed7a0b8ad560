//! Source RCON state machine (C6): TCP connect, AUTH handshake, and
//! multi-packet response reassembly.
//!
//! Commands are serialized through a single actor task per connection —
//! one in flight at a time — which sidesteps having to pair up a real
//! command's request id with its empty follow-up's id across concurrently
//! executing commands (see DESIGN.md's Open Question decision for the
//! reassembly trick).

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::time::Duration;

use gq_wire::rcon::{RconPacket, TYPE_AUTH_RESPONSE_OR_EXECCOMMAND, TYPE_RESPONSE_VALUE};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::error::Error;

const AUTH_FAILURE_ID: i32 = -1;
const COMMAND_QUEUE_CAPACITY: usize = 32;

/// Per-connection lifecycle, per spec.md §3 "RCON stream state".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RconState {
    Disconnected,
    Connecting,
    Unauthenticated,
    Authenticated,
    Closed,
}

impl RconState {
    fn from_tag(tag: u8) -> RconState {
        match tag {
            0 => RconState::Disconnected,
            1 => RconState::Connecting,
            2 => RconState::Unauthenticated,
            3 => RconState::Authenticated,
            _ => RconState::Closed,
        }
    }

    fn tag(self) -> u8 {
        match self {
            RconState::Disconnected => 0,
            RconState::Connecting => 1,
            RconState::Unauthenticated => 2,
            RconState::Authenticated => 3,
            RconState::Closed => 4,
        }
    }
}

/// Reads length-prefixed RCON frames off a TCP read half. Framing (the
/// 4-byte size prefix) is a streaming concern and lives here; the pure
/// per-frame body codec lives in `gq_wire::rcon`.
struct FrameReader {
    half: ReadHalf<TcpStream>,
}

impl FrameReader {
    async fn read_packet(&mut self) -> Result<RconPacket, Error> {
        let mut size_buf = [0u8; 4];
        self.half
            .read_exact(&mut size_buf)
            .await
            .map_err(|e| Error::Transport(format!("rcon read size prefix: {e}")))?;
        let size = RconPacket::read_size_prefix(&size_buf);
        if size < 0 || size > 8192 {
            return Err(Error::MalformedPayload(format!("implausible rcon frame size {size}")));
        }
        let mut body = vec![0u8; size as usize];
        self.half
            .read_exact(&mut body)
            .await
            .map_err(|e| Error::Transport(format!("rcon read body: {e}")))?;
        RconPacket::decode_body(&body).map_err(Error::from)
    }
}

async fn write_packet(
    half: &mut WriteHalf<TcpStream>,
    packet: &RconPacket,
) -> Result<(), Error> {
    half.write_all(&packet.encode())
        .await
        .map_err(|e| Error::Transport(format!("rcon write: {e}")))
}

struct CommandMsg {
    command: String,
    completion: oneshot::Sender<Result<String, Error>>,
}

/// An authenticated RCON connection. `connect` performs the handshake;
/// `execute` drives one command through the reassembly trick and returns
/// its body.
pub struct RconClient {
    command_tx: mpsc::Sender<CommandMsg>,
    state: Arc<AtomicU8>,
}

impl RconClient {
    /// Connects, authenticates with `password`, and — on success — spawns
    /// the command actor. Returns [`Error::AuthenticationFailed`] if the
    /// server rejects the password; the connection is closed in that case
    /// and no [`RconClient`] is returned.
    pub async fn connect(
        addr: std::net::SocketAddr,
        password: &str,
        config: &Config,
    ) -> Result<RconClient, Error> {
        let state = Arc::new(AtomicU8::new(RconState::Connecting.tag()));
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Transport(format!("rcon connect {addr}: {e}")))?;
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = FrameReader { half: read_half };

        let ids = AtomicI32::new(1);
        let auth_id = next_id(&ids);
        write_packet(&mut write_half, &RconPacket::auth(auth_id, password)).await?;

        state.store(RconState::Unauthenticated.tag(), Ordering::Release);

        loop {
            let packet = reader.read_packet().await?;
            if packet.packet_type != TYPE_AUTH_RESPONSE_OR_EXECCOMMAND {
                // Some servers send an empty SERVERDATA_RESPONSE_VALUE
                // before the real auth response; ignore anything that
                // isn't the auth response itself.
                continue;
            }
            if packet.id == AUTH_FAILURE_ID {
                state.store(RconState::Closed.tag(), Ordering::Release);
                return Err(Error::AuthenticationFailed);
            }
            if packet.id == auth_id {
                break;
            }
        }

        state.store(RconState::Authenticated.tag(), Ordering::Release);

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let reassembly_timeout = config.rcon_reassembly_timeout();
        let actor_state = Arc::clone(&state);
        tokio::spawn(command_actor(reader, write_half, ids, rx, reassembly_timeout, actor_state));

        Ok(RconClient { command_tx: tx, state })
    }

    /// Executes one command and returns its reassembled body.
    pub async fn execute(&self, command: &str) -> Result<String, Error> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(CommandMsg { command: command.to_owned(), completion: tx })
            .await
            .map_err(|_| Error::Transport("rcon connection is closed".to_owned()))?;
        rx.await.map_err(|_| Error::Transport("rcon connection is closed".to_owned()))?
    }

    pub fn state(&self) -> RconState {
        RconState::from_tag(self.state.load(Ordering::Acquire))
    }
}

fn next_id(ids: &AtomicI32) -> i32 {
    loop {
        let id = ids.fetch_add(1, Ordering::Relaxed);
        if id != AUTH_FAILURE_ID {
            return id;
        }
    }
}

async fn command_actor(
    mut reader: FrameReader,
    mut writer: WriteHalf<TcpStream>,
    ids: AtomicI32,
    mut rx: mpsc::Receiver<CommandMsg>,
    reassembly_timeout: Duration,
    state: Arc<AtomicU8>,
) {
    while let Some(msg) = rx.recv().await {
        let result = run_one_command(&mut reader, &mut writer, &ids, &msg.command, reassembly_timeout).await;
        let closed = result.is_err();
        let _ = msg.completion.send(result);
        if closed {
            break;
        }
    }
    state.store(RconState::Closed.tag(), Ordering::Release);
    // Fail any commands still queued behind the one that closed the
    // connection — none arrive silently discarded (spec.md §7 "all errors
    // are surfaced via the per-request completion handle").
    while let Ok(msg) = rx.try_recv() {
        let _ = msg
            .completion
            .send(Err(Error::Transport("rcon connection is closed".to_owned())));
    }
}

async fn run_one_command(
    reader: &mut FrameReader,
    writer: &mut WriteHalf<TcpStream>,
    ids: &AtomicI32,
    command: &str,
    reassembly_timeout: Duration,
) -> Result<String, Error> {
    let real_id = next_id(ids);
    let terminator_id = next_id(ids);

    write_packet(writer, &RconPacket::exec_command(real_id, command)).await?;
    write_packet(writer, &RconPacket::exec_command(terminator_id, "")).await?;

    let mut buffer = String::new();
    let deadline = tokio::time::Instant::now() + reassembly_timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err(Error::RequestTimedOut);
        }
        let packet = match tokio::time::timeout(remaining, reader.read_packet()).await {
            Ok(Ok(packet)) => packet,
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => return Err(Error::RequestTimedOut),
        };
        if packet.id == terminator_id {
            return Ok(buffer);
        }
        if packet.id == real_id && packet.packet_type == TYPE_RESPONSE_VALUE {
            buffer.push_str(&packet.body);
        }
        // Frames for unrelated ids are ignored rather than discarded as
        // errors — a previous command's late straggler should not fail
        // the current one.
    }
}
