//! Discord local RPC over IPC
//!
//! Frames are `opcode: u32 LE`, `length: u32 LE`, then `length` bytes of JSON.
//! The client sends a handshake (op 0), waits for the READY dispatch, and
//! then issues `SET_ACTIVITY` commands as op 1 frames.

use crate::activity::Activity;
use crate::error::{PresenceError, Result};
use crate::PresenceClient;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

pub const RPC_VERSION: u32 = 1;

/// Largest frame we are willing to read
const MAX_FRAME_LEN: usize = 64 * 1024;

/// How many numbered sockets Discord may be listening on
const SOCKET_SLOTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl TryFrom<u32> for Opcode {
    type Error = PresenceError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Opcode::Handshake),
            1 => Ok(Opcode::Frame),
            2 => Ok(Opcode::Close),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            other => Err(PresenceError::Protocol(format!("unknown opcode {}", other))),
        }
    }
}

/// Anything we can speak the IPC protocol over
pub trait IpcStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> IpcStream for T {}

/// One open IPC session
pub struct IpcConnection<S> {
    stream: S,
}

impl<S: IpcStream> IpcConnection<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub async fn write_frame(&mut self, op: Opcode, payload: &Value) -> Result<()> {
        let body = serde_json::to_vec(payload)?;
        let mut frame = Vec::with_capacity(8 + body.len());
        frame.extend_from_slice(&(op as u32).to_le_bytes());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&body);

        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn read_frame(&mut self) -> Result<(Opcode, Value)> {
        let mut header = [0u8; 8];
        self.stream.read_exact(&mut header).await?;

        let op = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(PresenceError::Protocol(format!("frame too large ({} bytes)", len)));
        }

        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body).await?;

        let payload = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body)?
        };
        Ok((Opcode::try_from(op)?, payload))
    }

    /// Read the next command response, answering pings on the way
    async fn read_response(&mut self) -> Result<Value> {
        loop {
            let (op, payload) = self.read_frame().await?;
            match op {
                Opcode::Frame => return Ok(payload),
                Opcode::Ping => self.write_frame(Opcode::Pong, &payload).await?,
                Opcode::Pong => {}
                Opcode::Close => return Err(PresenceError::Rejected(error_message(&payload))),
                Opcode::Handshake => {
                    return Err(PresenceError::Protocol("unexpected handshake frame".into()))
                }
            }
        }
    }

    pub async fn handshake(&mut self, client_id: &str) -> Result<()> {
        self.write_frame(
            Opcode::Handshake,
            &json!({ "v": RPC_VERSION, "client_id": client_id }),
        )
        .await?;

        let (op, payload) = self.read_frame().await?;
        match op {
            Opcode::Frame if payload["evt"] == "READY" => {
                debug!(
                    "IPC ready (user: {})",
                    payload["data"]["user"]["username"].as_str().unwrap_or("unknown")
                );
                Ok(())
            }
            Opcode::Close => Err(PresenceError::Handshake(error_message(&payload))),
            _ => Err(PresenceError::Handshake(format!("unexpected reply: {}", payload))),
        }
    }

    /// Set (or with `None`, clear) the activity shown for process `pid`
    pub async fn set_activity(&mut self, pid: u32, activity: Option<&Activity>) -> Result<()> {
        let command = json!({
            "cmd": "SET_ACTIVITY",
            "args": { "pid": pid, "activity": activity },
            "nonce": uuid::Uuid::new_v4().to_string(),
        });
        self.write_frame(Opcode::Frame, &command).await?;

        let response = self.read_response().await?;
        if response["evt"] == "ERROR" {
            return Err(PresenceError::Rejected(error_message(&response["data"])));
        }
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        // Best effort: Discord may already have dropped the socket
        let _ = self.write_frame(Opcode::Close, &json!({})).await;
        self.stream.shutdown().await?;
        Ok(())
    }
}

fn error_message(payload: &Value) -> String {
    payload["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

/// Open the first Discord IPC endpoint that accepts a connection
pub async fn open_ipc_stream() -> Result<Box<dyn IpcStream>> {
    #[cfg(unix)]
    {
        for path in unix_socket_candidates() {
            if let Ok(stream) = tokio::net::UnixStream::connect(&path).await {
                debug!("Connected to Discord IPC at {}", path.display());
                return Ok(Box::new(stream));
            }
        }
    }

    #[cfg(windows)]
    {
        use tokio::net::windows::named_pipe::ClientOptions;
        for slot in 0..SOCKET_SLOTS {
            let name = format!(r"\\.\pipe\discord-ipc-{}", slot);
            if let Ok(pipe) = ClientOptions::new().open(&name) {
                debug!("Connected to Discord IPC at {}", name);
                return Ok(Box::new(pipe));
            }
        }
    }

    Err(PresenceError::DiscordNotRunning)
}

#[cfg(unix)]
fn unix_socket_candidates() -> Vec<std::path::PathBuf> {
    let dirs: Vec<std::path::PathBuf> = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .map(std::path::PathBuf::from)
        .chain(std::iter::once(std::path::PathBuf::from("/tmp")))
        .collect();

    dirs.iter()
        .flat_map(|dir| (0..SOCKET_SLOTS).map(move |slot| dir.join(format!("discord-ipc-{}", slot))))
        .collect()
}

/// [`PresenceClient`] talking to the local Discord client
pub struct DiscordIpcClient {
    connection: Option<IpcConnection<Box<dyn IpcStream>>>,
    pid: u32,
}

impl DiscordIpcClient {
    pub fn new() -> Self {
        Self {
            connection: None,
            pid: std::process::id(),
        }
    }

    fn connection(&mut self) -> Result<&mut IpcConnection<Box<dyn IpcStream>>> {
        self.connection.as_mut().ok_or(PresenceError::NotConnected)
    }

    /// Drop the connection after an I/O level failure
    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        if matches!(
            result,
            Err(PresenceError::Io(_)) | Err(PresenceError::Protocol(_)) | Err(PresenceError::Json(_))
        ) {
            self.connection = None;
        }
        result
    }
}

impl Default for DiscordIpcClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PresenceClient for DiscordIpcClient {
    async fn connect(&mut self, client_id: &str) -> Result<()> {
        if let Some(previous) = self.connection.take() {
            let _ = previous.close().await;
        }

        let mut connection = IpcConnection::new(open_ipc_stream().await?);
        connection.handshake(client_id).await?;
        info!("Connected to Discord with client ID {}", client_id);
        self.connection = Some(connection);
        Ok(())
    }

    async fn set_activity(&mut self, activity: &Activity) -> Result<()> {
        let pid = self.pid;
        let result = self.connection()?.set_activity(pid, Some(activity)).await;
        self.check(result)
    }

    async fn clear(&mut self) -> Result<()> {
        let pid = self.pid;
        let result = self.connection()?.set_activity(pid, None).await;
        self.check(result)
    }

    async fn close(&mut self) -> Result<()> {
        match self.connection.take() {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Activity;
    use tokio::io::{duplex, DuplexStream};

    /// Server side of a duplex pipe, speaking the same framing
    struct FakeDiscord {
        conn: IpcConnection<DuplexStream>,
    }

    impl FakeDiscord {
        fn pair() -> (IpcConnection<DuplexStream>, FakeDiscord) {
            let (client, server) = duplex(64 * 1024);
            (
                IpcConnection::new(client),
                FakeDiscord {
                    conn: IpcConnection::new(server),
                },
            )
        }

        async fn expect(&mut self, op: Opcode) -> Value {
            let (got, payload) = self.conn.read_frame().await.unwrap();
            assert_eq!(got, op);
            payload
        }

        async fn send(&mut self, op: Opcode, payload: Value) {
            self.conn.write_frame(op, &payload).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_frame_layout() {
        let (client, mut server) = duplex(1024);
        let mut conn = IpcConnection::new(client);
        conn.write_frame(Opcode::Frame, &json!({"a": 1})).await.unwrap();

        let mut raw = [0u8; 15];
        server.read_exact(&mut raw).await.unwrap();
        assert_eq!(&raw[0..4], &1u32.to_le_bytes());
        assert_eq!(&raw[4..8], &7u32.to_le_bytes());
        assert_eq!(&raw[8..], br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_handshake_ready() {
        let (mut client, mut discord) = FakeDiscord::pair();

        let server = tokio::spawn(async move {
            let hello = discord.expect(Opcode::Handshake).await;
            assert_eq!(hello["v"], 1);
            assert_eq!(hello["client_id"], "1352843252067209368");
            discord
                .send(
                    Opcode::Frame,
                    json!({"cmd": "DISPATCH", "evt": "READY", "data": {"user": {"username": "tester"}}}),
                )
                .await;
        });

        client.handshake("1352843252067209368").await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_rejected() {
        let (mut client, mut discord) = FakeDiscord::pair();

        let server = tokio::spawn(async move {
            discord.expect(Opcode::Handshake).await;
            discord
                .send(Opcode::Close, json!({"code": 4000, "message": "Invalid Client ID"}))
                .await;
        });

        let err = client.handshake("0").await.unwrap_err();
        assert!(matches!(err, PresenceError::Handshake(ref msg) if msg == "Invalid Client ID"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_set_and_clear_activity() {
        let (mut client, mut discord) = FakeDiscord::pair();

        let server = tokio::spawn(async move {
            let set = discord.expect(Opcode::Frame).await;
            assert_eq!(set["cmd"], "SET_ACTIVITY");
            assert_eq!(set["args"]["pid"], 42);
            assert_eq!(set["args"]["activity"]["details"], "Time");
            assert!(set["nonce"].is_string());
            discord
                .send(Opcode::Frame, json!({"cmd": "SET_ACTIVITY", "evt": null, "nonce": set["nonce"]}))
                .await;

            let clear = discord.expect(Opcode::Frame).await;
            assert!(clear["args"]["activity"].is_null());
            discord
                .send(Opcode::Frame, json!({"cmd": "SET_ACTIVITY", "evt": null}))
                .await;
        });

        let activity = Activity {
            details: Some("Time".into()),
            ..Default::default()
        };
        client.set_activity(42, Some(&activity)).await.unwrap();
        client.set_activity(42, None).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_response() {
        let (mut client, mut discord) = FakeDiscord::pair();

        let server = tokio::spawn(async move {
            discord.expect(Opcode::Frame).await;
            discord
                .send(
                    Opcode::Frame,
                    json!({"cmd": "SET_ACTIVITY", "evt": "ERROR", "data": {"code": 4000, "message": "child \"activity\" fails"}}),
                )
                .await;
        });

        let err = client
            .set_activity(1, Some(&Activity::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, PresenceError::Rejected(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_ping_is_answered() {
        let (mut client, mut discord) = FakeDiscord::pair();

        let server = tokio::spawn(async move {
            discord.expect(Opcode::Frame).await;
            discord.send(Opcode::Ping, json!({"n": 1})).await;
            let pong = discord.expect(Opcode::Pong).await;
            assert_eq!(pong["n"], 1);
            discord.send(Opcode::Frame, json!({"evt": null})).await;
        });

        client.set_activity(1, None).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (client, mut server) = duplex(1024);
        let mut conn = IpcConnection::new(client);

        let mut header = Vec::new();
        header.extend_from_slice(&1u32.to_le_bytes());
        header.extend_from_slice(&(10 * 1024 * 1024u32).to_le_bytes());
        server.write_all(&header).await.unwrap();

        assert!(matches!(
            conn.read_frame().await,
            Err(PresenceError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnected_client_errors() {
        let mut client = DiscordIpcClient::new();
        assert!(!client.is_connected());
        assert!(matches!(
            client.set_activity(&Activity::default()).await,
            Err(PresenceError::NotConnected)
        ));
        assert!(client.close().await.is_ok());
    }
}
