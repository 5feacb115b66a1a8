//! RPC client for a remote tree.
//!
//! Commands are pushed onto one ordered queue together with a single-use
//! completion handle. A session task owns the socket and the map of pending
//! requests; it only drains the queue while the connection is open, so
//! commands issued while connecting or after a disconnect wait instead of
//! being dropped. Responses are matched purely by `commandId`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use remotefs_platform::filesystem::{
    DirEntry, FileErrorCode, FileStat, FileSystemProvider, ProviderError, RenameOptions,
    WriteOptions,
};

use crate::config::ClientConfig;
use crate::protocol::{websocket_config, Message, MessageType, ProtocolError};
use crate::schema::{Command, CommandId, Operation, Reply, Request, Response, SchemaError};
use crate::vfs::CopyOptions;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Ids of requests whose callers gave up, remembered so a late response is
/// not mistaken for an unknown one
const ABANDONED_LIMIT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a filesystem error
    #[error("remote filesystem error: {0}")]
    Fs(FileErrorCode),
    #[error("server rejected the credentials")]
    Unauthorized,
    /// The response could not be validated; it is neither a success nor a
    /// filesystem failure
    #[error("invalid response: {0}")]
    InvalidResponse(#[from] SchemaError),
    /// The response frame for this request could not be decoded
    #[error("malformed response: {0}")]
    Malformed(ProtocolError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("connection closed before a response arrived")]
    ConnectionClosed,
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("request timed out")]
    Timeout,
    #[error("{expected} request answered with a {actual} result")]
    UnexpectedReply {
        expected: Operation,
        actual: Operation,
    },
}

impl From<ClientError> for ProviderError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Fs(code) => ProviderError::Code(code),
            ClientError::Unauthorized => ProviderError::Code(FileErrorCode::Unauthorized),
            other => ProviderError::Unavailable(other.to_string()),
        }
    }
}

/// Faults that end a session. Protocol violations reject every pending
/// request with the fault's description; transport failures reject them as
/// closed.
#[derive(Debug, Error)]
enum SessionFault {
    #[error("response for unknown command {0}")]
    UnknownCommandId(CommandId),
    #[error("server sent an event frame, which is not supported")]
    UnexpectedEvent,
    #[error("server sent a command frame")]
    UnexpectedCommand,
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

type ReplySender = oneshot::Sender<Result<Response, ClientError>>;

struct Outgoing {
    command_id: CommandId,
    operation: Operation,
    frame: Vec<u8>,
    reply: ReplySender,
}

struct Pending {
    operation: Operation,
    reply: ReplySender,
}

/// Requests sent on the current connection and still awaiting a response
#[derive(Default)]
struct InFlight {
    pending: HashMap<CommandId, Pending>,
    abandoned: VecDeque<CommandId>,
}

impl InFlight {
    fn insert(&mut self, command_id: CommandId, entry: Pending) {
        self.pending.insert(command_id, entry);
    }

    fn take(&mut self, command_id: &CommandId) -> Option<Pending> {
        self.pending.remove(command_id)
    }

    /// True if the id belonged to a request whose caller gave up
    fn forget_abandoned(&mut self, command_id: &CommandId) -> bool {
        match self.abandoned.iter().position(|id| id == command_id) {
            Some(index) => {
                self.abandoned.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drop entries whose caller is no longer waiting
    fn sweep(&mut self) {
        let gone: Vec<CommandId> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.reply.is_closed())
            .map(|(id, _)| id.clone())
            .collect();

        for command_id in gone {
            self.pending.remove(&command_id);
            debug!("caller for {} gave up while waiting", command_id);
            if self.abandoned.len() == ABANDONED_LIMIT {
                self.abandoned.pop_front();
            }
            self.abandoned.push_back(command_id);
        }
    }

    fn len(&self) -> usize {
        self.pending.len()
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn drain(&mut self) -> impl Iterator<Item = Pending> + '_ {
        self.abandoned.clear();
        self.pending.drain().map(|(_, entry)| entry)
    }
}

struct SessionHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Shared {
    config: ClientConfig,
    outgoing_tx: mpsc::Sender<Outgoing>,
    /// Held by the live session task; survives across reconnects
    outgoing_rx: Mutex<mpsc::Receiver<Outgoing>>,
    state: watch::Sender<ConnectionState>,
    session: Mutex<Option<SessionHandle>>,
}

/// Handle to a client session. Cheap to clone.
#[derive(Clone)]
pub struct RpcClient {
    shared: Arc<Shared>,
}

impl RpcClient {
    /// Create a client. Nothing is sent until [`RpcClient::connect`] succeeds.
    pub fn new(config: ClientConfig) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Closed);
        Self {
            shared: Arc::new(Shared {
                config,
                outgoing_tx,
                outgoing_rx: Mutex::new(outgoing_rx),
                state,
                session: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Open the connection. Returns immediately if it is already open, and
    /// waits for the outcome if another caller is connecting.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let claimed = self.shared.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return self.wait_open().await;
        }

        let ws = match self.open_socket().await {
            Ok(ws) => ws,
            Err(e) => {
                self.shared.state.send_replace(ConnectionState::Closed);
                return Err(e);
            }
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            run_session(shared, ws, shutdown_rx).await;
        });
        *self.shared.session.lock().await = Some(SessionHandle {
            shutdown: shutdown_tx,
            task,
        });

        self.wait_open().await
    }

    /// Wait until a connection attempt settles
    pub async fn wait_open(&self) -> Result<(), ClientError> {
        let mut rx = self.shared.state.subscribe();
        let state = *rx
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await
            .map_err(|_| ClientError::ConnectionClosed)?;
        match state {
            ConnectionState::Open => Ok(()),
            _ => Err(ClientError::ConnectionClosed),
        }
    }

    /// Close the current connection and wait for the session to wind down.
    /// On return the state is `Closed`. Requests still waiting for a response
    /// are rejected; queued ones stay queued for the next connection.
    pub async fn close(&self) {
        let Some(session) = self.shared.session.lock().await.take() else {
            return;
        };
        let _ = session.shutdown.send(());
        if let Err(e) = session.task.await {
            error!("session task failed: {}", e);
            self.shared.state.send_replace(ConnectionState::Closed);
        }
    }

    async fn open_socket(&self) -> Result<WsStream, ClientError> {
        let url = self.shared.config.ws_url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::Connect(e.to_string()))?;

        if let Some(auth) = &self.shared.config.auth_header {
            let value = HeaderValue::from_str(auth)
                .map_err(|e| ClientError::Connect(format!("invalid auth header: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        info!("connecting to {}", url);
        match connect_async_with_config(request, Some(websocket_config()), false).await {
            Ok((ws, _)) => Ok(ws),
            Err(tokio_tungstenite::tungstenite::Error::Http(response))
                if response.status() == StatusCode::UNAUTHORIZED =>
            {
                warn!("server at {} rejected credentials", url);
                Err(ClientError::Unauthorized)
            }
            Err(e) => Err(ClientError::Connect(e.to_string())),
        }
    }

    async fn call(&self, request: Request) -> Result<Reply, ClientError> {
        let command = Command::new(request);
        let command_id = command.command_id.clone();
        let operation = command.operation();
        let frame = command.into_message().encode()?;

        let (reply_tx, reply_rx) = oneshot::channel();
        debug!("queueing {} {}", operation, command_id);
        self.shared
            .outgoing_tx
            .send(Outgoing {
                command_id,
                operation,
                frame,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ClientError::ConnectionClosed)?;

        let received = match self.shared.config.request_timeout() {
            Some(limit) => tokio::time::timeout(limit, reply_rx)
                .await
                .map_err(|_| ClientError::Timeout)?,
            None => reply_rx.await,
        };
        let response = received.map_err(|_| ClientError::ConnectionClosed)??;

        let reply = response.outcome.map_err(ClientError::Fs)?;
        if reply.operation() != operation {
            return Err(unexpected(operation, &reply));
        }
        Ok(reply)
    }

    pub async fn stat(&self, path: &str) -> Result<FileStat, ClientError> {
        match self.call(Request::Status { path: path.to_string() }).await? {
            Reply::Status(stat) => Ok(stat),
            other => Err(unexpected(Operation::Status, &other)),
        }
    }

    pub async fn read_directory(&self, path: &str) -> Result<Vec<DirEntry>, ClientError> {
        match self.call(Request::ReadDirectory { path: path.to_string() }).await? {
            Reply::ReadDirectory(entries) => Ok(entries),
            other => Err(unexpected(Operation::ReadDirectory, &other)),
        }
    }

    pub async fn create_directory(&self, path: &str) -> Result<(), ClientError> {
        match self.call(Request::CreateDirectory { path: path.to_string() }).await? {
            Reply::CreateDirectory => Ok(()),
            other => Err(unexpected(Operation::CreateDirectory, &other)),
        }
    }

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        match self.call(Request::ReadFile { path: path.to_string() }).await? {
            Reply::ReadFile(content) => Ok(content),
            other => Err(unexpected(Operation::ReadFile, &other)),
        }
    }

    /// Returns whether the file was newly created
    pub async fn write_file(
        &self,
        path: &str,
        content: Vec<u8>,
        options: WriteOptions,
    ) -> Result<bool, ClientError> {
        let request = Request::WriteFile {
            path: path.to_string(),
            create: options.create,
            overwrite: options.overwrite,
            content,
        };
        match self.call(request).await? {
            Reply::WriteFile { created } => Ok(created),
            other => Err(unexpected(Operation::WriteFile, &other)),
        }
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        match self.call(Request::Delete { path: path.to_string() }).await? {
            Reply::Delete => Ok(()),
            other => Err(unexpected(Operation::Delete, &other)),
        }
    }

    pub async fn rename(
        &self,
        old_path: &str,
        new_path: &str,
        options: RenameOptions,
    ) -> Result<(), ClientError> {
        let request = Request::Rename {
            old_path: old_path.to_string(),
            new_path: new_path.to_string(),
            overwrite: options.overwrite,
        };
        match self.call(request).await? {
            Reply::Rename => Ok(()),
            other => Err(unexpected(Operation::Rename, &other)),
        }
    }

    pub async fn copy(
        &self,
        source_path: &str,
        destination_path: &str,
        options: CopyOptions,
    ) -> Result<(), ClientError> {
        let request = Request::Copy {
            source_path: source_path.to_string(),
            destination_path: destination_path.to_string(),
            overwrite: options.overwrite,
        };
        match self.call(request).await? {
            Reply::Copy => Ok(()),
            other => Err(unexpected(Operation::Copy, &other)),
        }
    }

    /// Register interest in a path. The server acknowledges but never
    /// delivers change events.
    pub async fn watch(&self, path: &str, recursive: bool, excludes: Vec<String>) -> Result<(), ClientError> {
        let request = Request::Watch {
            path: path.to_string(),
            recursive,
            excludes,
        };
        match self.call(request).await? {
            Reply::Watch => Ok(()),
            other => Err(unexpected(Operation::Watch, &other)),
        }
    }
}

fn unexpected(expected: Operation, reply: &Reply) -> ClientError {
    ClientError::UnexpectedReply {
        expected,
        actual: reply.operation(),
    }
}

#[async_trait]
impl FileSystemProvider for RpcClient {
    async fn ensure_connected(&self) -> Result<(), ProviderError> {
        if self.state() == ConnectionState::Open {
            return Ok(());
        }
        Ok(self.connect().await?)
    }

    async fn stat(&self, path: &str) -> Result<FileStat, ProviderError> {
        Ok(RpcClient::stat(self, path).await?)
    }

    async fn read_directory(&self, path: &str) -> Result<Vec<DirEntry>, ProviderError> {
        Ok(RpcClient::read_directory(self, path).await?)
    }

    async fn create_directory(&self, path: &str) -> Result<(), ProviderError> {
        Ok(RpcClient::create_directory(self, path).await?)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        Ok(RpcClient::read_file(self, path).await?)
    }

    async fn write_file(
        &self,
        path: &str,
        content: Vec<u8>,
        options: WriteOptions,
    ) -> Result<bool, ProviderError> {
        Ok(RpcClient::write_file(self, path, content, options).await?)
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        Ok(RpcClient::delete(self, path).await?)
    }

    async fn rename(
        &self,
        old_path: &str,
        new_path: &str,
        options: RenameOptions,
    ) -> Result<(), ProviderError> {
        Ok(RpcClient::rename(self, old_path, new_path, options).await?)
    }
}

async fn run_session(shared: Arc<Shared>, ws: WsStream, mut shutdown: oneshot::Receiver<()>) {
    let mut outgoing_rx = shared.outgoing_rx.lock().await;
    shared.state.send_replace(ConnectionState::Open);
    info!("connection open");

    let (mut ws_sink, mut ws_stream) = ws.split();
    let mut in_flight = InFlight::default();

    let outcome: Result<(), SessionFault> = loop {
        tokio::select! {
            // Incoming frames
            ws_msg = ws_stream.next() => {
                match ws_msg {
                    Some(Ok(WsMessage::Binary(data))) => {
                        if let Err(fault) = handle_frame(&data, &mut in_flight) {
                            break Err(fault);
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if let Err(e) = ws_sink.send(WsMessage::Pong(data)).await {
                            break Err(e.into());
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        info!("server sent close frame");
                        break Ok(());
                    }
                    Some(Ok(_)) => {} // text, pong
                    Some(Err(e)) => break Err(e.into()),
                    None => {
                        info!("WebSocket stream ended");
                        break Ok(());
                    }
                }
            }

            // Queued commands, in submission order
            outgoing = outgoing_rx.recv() => {
                let Some(Outgoing { command_id, operation, frame, reply }) = outgoing else {
                    break Ok(());
                };
                if reply.is_closed() {
                    debug!("caller for {} gave up before it was sent", command_id);
                    continue;
                }

                in_flight.sweep();
                in_flight.insert(command_id.clone(), Pending { operation, reply });
                debug!("sending {} {}", operation, command_id);
                if let Err(e) = ws_sink.send(WsMessage::Binary(frame.into())).await {
                    if let Some(entry) = in_flight.take(&command_id) {
                        let _ = entry.reply.send(Err(ClientError::ConnectionClosed));
                    }
                    break Err(e.into());
                }
            }

            _ = &mut shutdown => {
                info!("closing connection");
                let _ = ws_sink.send(WsMessage::Close(None)).await;
                break Ok(());
            }
        }
    };

    shared.state.send_replace(ConnectionState::Closed);

    let reason = match outcome {
        Ok(()) => None,
        Err(SessionFault::Transport(e)) => {
            warn!("connection dropped: {}", e);
            None
        }
        Err(fault) => {
            error!("connection terminated: {}", fault);
            Some(fault.to_string())
        }
    };

    if !in_flight.is_empty() {
        warn!("rejecting {} in-flight request(s)", in_flight.len());
    }
    for entry in in_flight.drain() {
        let err = match &reason {
            Some(reason) => ClientError::ConnectionLost(reason.clone()),
            None => ClientError::ConnectionClosed,
        };
        let _ = entry.reply.send(Err(err));
    }
}

fn handle_frame(data: &[u8], in_flight: &mut InFlight) -> Result<(), SessionFault> {
    let msg = match Message::decode(data) {
        Ok(msg) => msg,
        Err(e) => {
            // A broken response still names its caller if the id is readable
            let owner = Message::recover_response_id(data)
                .map(|id| CommandId::from(id.as_str()))
                .and_then(|command_id| in_flight.take(&command_id).map(|entry| (command_id, entry)));
            match owner {
                Some((command_id, entry)) => {
                    warn!("malformed {} response for {}: {}", entry.operation, command_id, e);
                    let _ = entry.reply.send(Err(ClientError::Malformed(e)));
                }
                None => warn!("dropping undecodable frame: {}", e),
            }
            return Ok(());
        }
    };

    match msg.message_type {
        MessageType::Response => {
            let command_id = CommandId::from(msg.command_id().unwrap_or_default());
            let Some(entry) = in_flight.take(&command_id) else {
                if in_flight.forget_abandoned(&command_id) {
                    debug!("late response for abandoned request {}", command_id);
                    return Ok(());
                }
                return Err(SessionFault::UnknownCommandId(command_id));
            };

            let result = Response::from_message(msg, entry.operation).map_err(|e| {
                warn!("invalid {} response for {}: {}", entry.operation, command_id, e);
                ClientError::InvalidResponse(e)
            });
            if entry.reply.send(result).is_err() {
                debug!("caller for {} went away", command_id);
            }
            Ok(())
        }
        MessageType::Event => Err(SessionFault::UnexpectedEvent),
        MessageType::Command => Err(SessionFault::UnexpectedCommand),
    }
}
