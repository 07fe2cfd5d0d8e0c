//! Message transport over Unix sockets
//!
//! Carries protocol requests from the CLI (standing in for the popup) to a
//! running page session. Uses length-prefixed JSON over Unix domain sockets.

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

pub mod messages;
pub mod router;

pub use messages::{Action, DownloadImage, FullscreenState, Request, Response, ToggleFeature};
pub use router::{Surface, route};

/// Maximum message size (10 MB) to prevent DoS via memory exhaustion
const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// One connected peer
pub struct IpcConnection {
    stream: UnixStream,
}

impl IpcConnection {
    pub async fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .await
            .context(format!("Failed to connect to session at {}", path.display()))?;
        Ok(Self { stream })
    }

    /// Next raw message, `None` once the peer hung up
    pub async fn recv(&mut self) -> Result<Option<Value>> {
        match read_message(&mut self.stream).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if is_eof(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn send<T: Serialize>(&mut self, msg: &T) -> Result<()> {
        write_message(&mut self.stream, msg).await
    }

    /// Send a request and wait for its response
    pub async fn request(&mut self, request: &Value) -> Result<Response> {
        self.send(request).await?;
        read_message(&mut self.stream).await
    }
}

/// Listening socket of a page session
pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl IpcServer {
    /// Create server and bind to specific socket path
    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create socket directory: {}", parent.display()))?;
        }

        // Remove stale socket if exists
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .context(format!("Failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .context(format!("Failed to bind socket at {}", socket_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        debug!(path = %socket_path.display(), "Listening for protocol requests");
        Ok(Self {
            listener,
            socket_path,
        })
    }

    pub async fn accept(&self) -> Result<IpcConnection> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept IPC connection")?;
        Ok(IpcConnection { stream })
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            warn!(path = %self.socket_path.display(), error = %e, "Failed to remove socket");
        }
    }
}

fn is_eof(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::UnexpectedEof)
    })
}

/// Write length-prefixed message to stream
pub async fn write_message<W, T>(stream: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(anyhow!(
            "Message too large: {} bytes (max: {})",
            json.len(),
            MAX_MESSAGE_SIZE
        ));
    }

    // Write length prefix (u32 little-endian)
    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .await
        .context("Failed to write message length")?;
    stream
        .write_all(&json)
        .await
        .context("Failed to write message payload")?;
    stream.flush().await.context("Failed to flush stream")?;

    Ok(())
}

/// Read length-prefixed message from stream
pub async fn read_message<R, T>(stream: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .context("Failed to read message length")?;
    let len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check (prevent DoS via huge allocation)
    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, MAX_MESSAGE_SIZE));
    }

    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .await
        .context("Failed to read message payload")?;

    serde_json::from_slice(&json_buf).context("Failed to deserialize message from JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_frame_round_trip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let request = Request::GetFullscreenState;

        write_message(&mut client, &request).await.unwrap();
        let raw: Value = read_message(&mut server).await.unwrap();
        assert_eq!(raw, json!({ "action": "getFullscreenState" }));
        assert_eq!(Request::from_value(raw).unwrap(), request);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = (MAX_MESSAGE_SIZE as u32) + 1;
        client.write_all(&len.to_le_bytes()).await.unwrap();

        let err = read_message::<_, Value>(&mut server).await.unwrap_err();
        assert!(err.to_string().contains("Message too large"));
    }

    #[tokio::test]
    async fn test_closed_peer_reads_as_eof() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        let err = read_message::<_, Value>(&mut server).await.unwrap_err();
        assert!(is_eof(&err));
    }

    #[tokio::test]
    async fn test_socket_request_response() {
        let path = std::env::temp_dir()
            .join(format!("bing-tools-ipc-test-{}", std::process::id()))
            .join("session.sock");
        let server = IpcServer::bind_to(path.clone()).unwrap();

        let serve = tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            while let Some(raw) = conn.recv().await.unwrap() {
                let response = match Request::from_value(raw) {
                    Ok(_) => Response::ok(),
                    Err(e) => Response::from(&e),
                };
                conn.send(&response).await.unwrap();
            }
        });

        let mut client = IpcConnection::connect_to(&path).await.unwrap();
        let ok = client.request(&json!({ "action": "getSettings" })).await.unwrap();
        assert!(ok.success);
        let unknown = client.request(&json!({ "action": "nope" })).await.unwrap();
        assert_eq!(unknown.error.as_deref(), Some("Unknown action: nope"));

        drop(client);
        serve.await.unwrap();
    }
}
