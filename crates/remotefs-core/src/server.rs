//! Reference server: serves one shared in-memory tree over WebSocket.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse,
};
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, StatusCode};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, error, info, warn};

use remotefs_platform::filesystem::{RenameOptions, WriteOptions};

use crate::config::ServerConfig;
use crate::protocol::{websocket_config, Message, MessageType, ProtocolError};
use crate::schema::{Command, Reply, Request, Response};
use crate::vfs::{CopyOptions, FsError, MemoryTree};

/// Faults that are not filesystem results. The connection that hit one is
/// closed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to encode response: {0}")]
    Encode(#[from] ProtocolError),
}

/// Turns command frames into response frames against a shared tree
#[derive(Clone)]
pub struct Dispatcher {
    tree: Arc<Mutex<MemoryTree>>,
}

impl Dispatcher {
    pub fn new(tree: MemoryTree) -> Self {
        Self {
            tree: Arc::new(Mutex::new(tree)),
        }
    }

    pub fn tree(&self) -> Arc<Mutex<MemoryTree>> {
        self.tree.clone()
    }

    /// Handle one binary frame. Returns the encoded response, or `None` when
    /// the frame was dropped.
    pub async fn handle_frame(&self, data: &[u8]) -> Result<Option<Vec<u8>>, DispatchError> {
        let msg = match Message::decode(data) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("ignoring malformed frame: {}", e);
                return Ok(None);
            }
        };

        if msg.message_type != MessageType::Command {
            warn!("ignoring {} frame from client", msg.message_type);
            return Ok(None);
        }

        let command = match Command::from_message(msg) {
            Ok(command) => command,
            Err(e) => {
                warn!("ignoring invalid command: {}", e);
                return Ok(None);
            }
        };

        let response = self.execute(command).await;
        Ok(Some(response.into_message().encode()?))
    }

    /// Run exactly one tree operation for the command
    pub async fn execute(&self, command: Command) -> Response {
        let Command { command_id, request } = command;
        let operation = request.operation();

        let result = {
            let mut tree = self.tree.lock().await;
            apply(&mut tree, request)
        };

        match result {
            Ok(reply) => Response::success(command_id, reply),
            Err(e) => {
                debug!("{} {} failed: {}", operation, command_id, e);
                Response::failure(command_id, e.code())
            }
        }
    }
}

fn apply(tree: &mut MemoryTree, request: Request) -> Result<Reply, FsError> {
    match request {
        Request::Status { path } => {
            info!("stat: {}", path);
            Ok(Reply::Status(tree.stat(&path)?))
        }
        Request::ReadDirectory { path } => {
            info!("read directory: {}", path);
            Ok(Reply::ReadDirectory(tree.read_directory(&path)?))
        }
        Request::CreateDirectory { path } => {
            info!("create directory: {}", path);
            tree.create_directory(&path)?;
            Ok(Reply::CreateDirectory)
        }
        Request::ReadFile { path } => {
            info!("read file: {}", path);
            Ok(Reply::ReadFile(tree.read_file(&path)?.to_vec()))
        }
        Request::WriteFile {
            path,
            create,
            overwrite,
            content,
        } => {
            info!("write file: {} ({} bytes)", path, content.len());
            let created = tree.write_file(&path, content, WriteOptions { create, overwrite })?;
            Ok(Reply::WriteFile { created })
        }
        Request::Delete { path } => {
            info!("delete: {}", path);
            tree.delete(&path)?;
            Ok(Reply::Delete)
        }
        Request::Rename {
            old_path,
            new_path,
            overwrite,
        } => {
            info!("rename: {} -> {}", old_path, new_path);
            tree.rename(&old_path, &new_path, RenameOptions { overwrite })?;
            Ok(Reply::Rename)
        }
        Request::Copy {
            source_path,
            destination_path,
            overwrite,
        } => {
            info!("copy: {} -> {}", source_path, destination_path);
            tree.copy(&source_path, &destination_path, CopyOptions { overwrite })?;
            Ok(Reply::Copy)
        }
        Request::Watch {
            path,
            recursive,
            excludes,
        } => {
            // Acknowledged only; no events are ever emitted
            debug!(
                "watch: {} (recursive={}, excludes={:?})",
                path, recursive, excludes
            );
            Ok(Reply::Watch)
        }
    }
}

pub struct Server {
    listener: TcpListener,
    dispatcher: Dispatcher,
    auth_token: Option<Arc<str>>,
}

impl Server {
    /// Bind the listener with an empty tree
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        Self::with_tree(config, MemoryTree::new()).await
    }

    pub async fn with_tree(config: &ServerConfig, tree: MemoryTree) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr.as_str())
            .await
            .with_context(|| format!("failed to bind {}", config.listen_addr))?;
        Ok(Self {
            listener,
            dispatcher: Dispatcher::new(tree),
            auth_token: config.auth_token.as_deref().map(Arc::from),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Accept connections until the listener fails
    pub async fn serve(self) -> Result<()> {
        info!("listening on {}", self.local_addr()?);
        if self.auth_token.is_none() {
            warn!("no auth token configured, accepting all clients");
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    continue;
                }
            };

            let dispatcher = self.dispatcher.clone();
            let auth_token = self.auth_token.clone();
            tokio::spawn(async move {
                handle_connection(stream, peer, dispatcher, auth_token).await;
            });
        }
    }
}

/// Compare credentials without an early exit on the first differing byte
fn token_matches(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    auth_token: Option<Arc<str>>,
) {
    let check_auth = move |req: &HandshakeRequest, resp: HandshakeResponse| {
        let Some(token) = auth_token else {
            return Ok(resp);
        };
        let expected = format!("Bearer {}", token);
        let presented = req
            .headers()
            .get(AUTHORIZATION)
            .map(|value| value.as_bytes())
            .unwrap_or_default();
        if token_matches(presented, expected.as_bytes()) {
            Ok(resp)
        } else {
            let mut reject = ErrorResponse::new(Some("unauthorized".to_string()));
            *reject.status_mut() = StatusCode::UNAUTHORIZED;
            Err(reject)
        }
    };

    let ws = match accept_hdr_async_with_config(stream, check_auth, Some(websocket_config())).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("handshake with {} failed: {}", peer, e);
            return;
        }
    };
    info!("client connected: {}", peer);

    let (mut ws_sink, mut ws_stream) = ws.split();
    while let Some(ws_msg) = ws_stream.next().await {
        match ws_msg {
            Ok(WsMessage::Binary(data)) => match dispatcher.handle_frame(&data).await {
                Ok(Some(frame)) => {
                    if let Err(e) = ws_sink.send(WsMessage::Binary(frame.into())).await {
                        warn!("send to {} failed: {}", peer, e);
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("closing connection to {}: {}", peer, e);
                    let _ = ws_sink.send(WsMessage::Close(None)).await;
                    break;
                }
            },
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("connection to {} failed: {}", peer, e);
                break;
            }
        }
    }

    info!("client disconnected: {}", peer);
}
