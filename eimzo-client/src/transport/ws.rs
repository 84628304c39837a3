// WebSocket transport to the local signing agent
//
// One long-lived connection per transport instance. A background read task
// owns the receive half; senders share the write half behind a mutex. The
// agent answers frames in arrival order, so outstanding calls form a FIFO
// queue; each entry is tagged with an application-assigned correlation id
// and resolved through a oneshot channel. When the socket closes, every
// outstanding call is failed rather than dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use eimzo_common::Logger;

use crate::config::UnavailablePolicy;
use crate::transport::{
    AgentRequest, AgentResponse, AgentTransport, AgentVersion, TransportError,
};

/// Default endpoint of the local agent.
pub const DEFAULT_AGENT_URL: &str = "ws://127.0.0.1:64646/service/cryptapi";

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type CallResult = std::result::Result<AgentResponse, TransportError>;

struct PendingCall {
    correlation_id: String,
    reply: oneshot::Sender<CallResult>,
}

/// WebSocket channel to the local signing agent.
pub struct WsTransport {
    url: String,
    policy: UnavailablePolicy,
    writer: Arc<Mutex<Option<WsSink>>>,
    pending: Arc<Mutex<VecDeque<PendingCall>>>,
    logger: Logger,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, policy: UnavailablePolicy, logger: Logger) -> Self {
        Self {
            url: url.into(),
            policy,
            writer: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(VecDeque::new())),
            logger,
        }
    }

    /// Install the API keys allow-listing this origin with the agent.
    ///
    /// Must be called once before any functional RPC. When the agent is
    /// unreachable the behavior follows the configured policy: `Silent`
    /// resolves anyway so the application stays usable without the agent
    /// installed, `Surface` propagates the transport error. An agent that
    /// rejects the keys is logged and tolerated either way; subsequent
    /// calls will report their own failures.
    pub async fn apikey(&self, keys: &[String]) -> std::result::Result<(), TransportError> {
        match self.dispatch(AgentRequest::handshake(keys.to_vec())).await {
            Ok(response) if response.success => {
                self.logger.info("agent api keys installed");
                Ok(())
            }
            Ok(response) => {
                self.logger.warn(format!(
                    "agent rejected api keys: {}",
                    response.reason.unwrap_or_default()
                ));
                Ok(())
            }
            Err(err) => match self.policy {
                UnavailablePolicy::Silent => {
                    self.logger
                        .warn(format!("agent unreachable during handshake: {err}"));
                    Ok(())
                }
                UnavailablePolicy::Surface => Err(err),
            },
        }
    }

    /// Query the installed agent version.
    pub async fn version(&self) -> std::result::Result<AgentVersion, TransportError> {
        let response = self.dispatch(AgentRequest::version()).await?;
        if !response.success {
            return Err(TransportError::InvalidFrame(format!(
                "version call failed: {}",
                response.reason.unwrap_or_default()
            )));
        }
        let major = response.major.as_deref().unwrap_or_default();
        let minor = response.minor.as_deref().unwrap_or_default();
        match (major.parse(), minor.parse()) {
            (Ok(major), Ok(minor)) => Ok(AgentVersion { major, minor }),
            _ => Err(TransportError::InvalidFrame(format!(
                "unparseable agent version {major}.{minor}"
            ))),
        }
    }

    /// Establish the connection if none exists and spawn the read task.
    async fn ensure_connected(&self) -> std::result::Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        if writer.is_some() {
            return Ok(());
        }

        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(self.url.clone(), e.to_string()))?;
        self.logger.info(format!("connected to agent at {}", self.url));

        let (sink, source) = stream.split();
        *writer = Some(sink);

        let pending = self.pending.clone();
        let writer_slot = self.writer.clone();
        let logger = self.logger.clone();
        tokio::spawn(async move {
            read_loop(source, pending, writer_slot, logger).await;
        });
        Ok(())
    }

    async fn dispatch(&self, request: AgentRequest) -> CallResult {
        let frame =
            serde_json::to_string(&request).map_err(|e| TransportError::Send(e.to_string()))?;

        self.ensure_connected().await?;

        let correlation_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        // Queue position must match frame order on the wire, so the
        // pending entry is registered and the frame sent under one writer
        // lock; concurrent dispatches cannot interleave between the two.
        let send_result = {
            let mut writer = self.writer.lock().await;
            match writer.as_mut() {
                Some(sink) => {
                    self.pending.lock().await.push_back(PendingCall {
                        correlation_id: correlation_id.clone(),
                        reply: tx,
                    });
                    sink.send(Message::Text(frame))
                        .await
                        .map_err(|e| TransportError::Send(e.to_string()))
                }
                None => Err(TransportError::NotConnected),
            }
        };

        if let Err(err) = send_result {
            // The frame never left; withdraw our queue slot so later
            // responses keep lining up with their calls.
            let mut pending = self.pending.lock().await;
            if let Some(position) = pending
                .iter()
                .position(|call| call.correlation_id == correlation_id)
            {
                pending.remove(position);
            }
            drop(pending);
            *self.writer.lock().await = None;
            return Err(err);
        }

        self.logger.debug(format!(
            "call {correlation_id} ({}) dispatched",
            request.name
        ));

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }
}

#[async_trait]
impl AgentTransport for WsTransport {
    async fn call(&self, request: AgentRequest) -> CallResult {
        self.dispatch(request).await
    }
}

async fn read_loop(
    mut source: WsSource,
    pending: Arc<Mutex<VecDeque<PendingCall>>>,
    writer_slot: Arc<Mutex<Option<WsSink>>>,
    logger: Logger,
) {
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let call = pending.lock().await.pop_front();
                match call {
                    Some(call) => {
                        let parsed = serde_json::from_str::<AgentResponse>(&text)
                            .map_err(|e| TransportError::InvalidFrame(e.to_string()));
                        logger.debug(format!("call {} resolved", call.correlation_id));
                        let _ = call.reply.send(parsed);
                    }
                    None => {
                        logger.warn("agent frame received with no outstanding call");
                    }
                }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    // The socket is gone. Fail whatever is still outstanding so no caller
    // hangs on a response that will never arrive.
    *writer_slot.lock().await = None;
    let mut pending = pending.lock().await;
    while let Some(call) = pending.pop_front() {
        let _ = call.reply.send(Err(TransportError::ConnectionClosed));
    }
    logger.info("agent connection closed");
}
