use crate::config::Endpoint;
use crate::error::TransportResult;
use crate::transport::{MemoryTransport, TcpTransport, TlsTransport, Transport};
use serde::Serialize;
use shared::message::{Frame, FrameKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::task::JoinHandle;

/// Callback invoked with every broadcast received on a subscribed topic.
pub type MessageHandler = Arc<dyn Fn(MensajeEntrante) + Send + Sync>;

/// Broadcast payload delivered to a topic handler.
#[derive(Debug, Clone)]
pub enum MensajeEntrante {
    /// Payload decoded as a JSON document
    Json(serde_json::Value),
    /// Payload that did not decode as JSON
    Crudo(Vec<u8>),
}

/// Broker Client
///
/// A pub/sub client for the order-status broker. Supports topic
/// subscription with per-topic handlers and fire-and-forget publication
/// to command destinations.
///
/// Every operation reports failure through its return value and a log
/// line instead of an error; callers decide whether to retry.
#[derive(Clone)]
pub struct BrokerClient {
    inner: Arc<Inner>,
}

struct Inner {
    conexion: Mutex<Option<Conexion>>,
    subs: Mutex<HashMap<String, MessageHandler>>,
}

#[derive(Debug)]
struct Conexion {
    transport: ActiveTransport,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Drop for Conexion {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[derive(Debug, Clone)]
enum ActiveTransport {
    Tcp(TcpTransport),
    Tls(TlsTransport),
    Memory(MemoryTransport),
}

impl ActiveTransport {
    async fn read_frame(&self) -> TransportResult<Frame> {
        match self {
            ActiveTransport::Tcp(t) => t.read_frame().await,
            ActiveTransport::Tls(t) => t.read_frame().await,
            ActiveTransport::Memory(t) => t.read_frame().await,
        }
    }

    async fn write_frame(&self, frame: &Frame) -> TransportResult<()> {
        match self {
            ActiveTransport::Tcp(t) => t.write_frame(frame).await,
            ActiveTransport::Tls(t) => t.write_frame(frame).await,
            ActiveTransport::Memory(t) => t.write_frame(frame).await,
        }
    }

    async fn close(&self) -> TransportResult<()> {
        match self {
            ActiveTransport::Tcp(t) => t.close().await,
            ActiveTransport::Tls(t) => t.close().await,
            ActiveTransport::Memory(t) => t.close().await,
        }
    }
}

impl BrokerClient {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                conexion: Mutex::new(None),
                subs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Connect to the broker.
    ///
    /// Keeps an existing live connection and replaces a dead one. Topics
    /// registered before a drop are re-announced on the new connection, so
    /// a reconnect restores deliveries without re-subscribing.
    pub async fn connect(&self, endpoint: &Endpoint) -> bool {
        if self.is_connected() {
            return true;
        }

        let transport = match Self::dial(endpoint).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Broker connect failed: {}", e);
                return false;
            }
        };

        let alive = Arc::new(AtomicBool::new(true));
        let reader =
            Self::spawn_read_loop(transport.clone(), alive.clone(), Arc::downgrade(&self.inner));
        {
            let mut guard = self.inner.conexion.lock().unwrap();
            // Replacing a dead connection aborts its read task via Drop
            *guard = Some(Conexion {
                transport: transport.clone(),
                alive,
                reader,
            });
        }

        let topics: Vec<String> = {
            let subs = self.inner.subs.lock().unwrap();
            subs.keys().cloned().collect()
        };
        for topic in topics {
            if let Err(e) = transport.write_frame(&Frame::subscribe(&topic)).await {
                tracing::warn!(topic = %topic, "Failed to re-announce subscription: {}", e);
            }
        }

        true
    }

    async fn dial(endpoint: &Endpoint) -> TransportResult<ActiveTransport> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(ActiveTransport::Tcp(TcpTransport::connect(addr).await?)),
            Endpoint::Tls { addr, domain } => Ok(ActiveTransport::Tls(
                TlsTransport::connect(addr, domain).await?,
            )),
            Endpoint::Memory {
                to_broker,
                from_broker,
            } => Ok(ActiveTransport::Memory(MemoryTransport::new(
                from_broker,
                to_broker,
            ))),
        }
    }

    fn spawn_read_loop(
        transport: ActiveTransport,
        alive: Arc<AtomicBool>,
        inner: Weak<Inner>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match transport.read_frame().await {
                    Ok(frame) => {
                        let Some(inner) = inner.upgrade() else {
                            break;
                        };
                        inner.dispatch(frame);
                    }
                    Err(e) => {
                        tracing::error!("Transport read error: {}", e);
                        alive.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        })
    }

    /// Whether the current connection is still live.
    pub fn is_connected(&self) -> bool {
        let guard = self.inner.conexion.lock().unwrap();
        guard
            .as_ref()
            .map(|c| c.alive.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Current transport, filtered by liveness.
    fn transport(&self) -> Option<ActiveTransport> {
        let guard = self.inner.conexion.lock().unwrap();
        guard
            .as_ref()
            .filter(|c| c.alive.load(Ordering::SeqCst))
            .map(|c| c.transport.clone())
    }

    /// Register a handler for a broadcast topic and announce the
    /// subscription to the broker.
    ///
    /// Subscribing again to the same topic replaces the handler without
    /// re-announcing. On a wire failure the handler stays registered so a
    /// later reconnect can announce it.
    pub async fn subscribe(&self, topic: &str, handler: MessageHandler) -> bool {
        let Some(transport) = self.transport() else {
            tracing::warn!(topic = %topic, "Subscribe requested while disconnected");
            return false;
        };

        let replaced = {
            let mut subs = self.inner.subs.lock().unwrap();
            subs.insert(topic.to_string(), handler).is_some()
        };
        if replaced {
            // Topic already announced; only the handler changes
            tracing::debug!(topic = %topic, "Replaced handler for topic");
            return true;
        }

        match transport.write_frame(&Frame::subscribe(topic)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(topic = %topic, "Failed to announce subscription: {}", e);
                false
            }
        }
    }

    /// Drop the handler for a topic and announce the unsubscribe.
    ///
    /// Returns true when the topic ends up unregistered, including the
    /// case where it never was.
    pub async fn unsubscribe(&self, topic: &str) -> bool {
        let removed = {
            let mut subs = self.inner.subs.lock().unwrap();
            subs.remove(topic).is_some()
        };
        if !removed {
            return true;
        }

        let Some(transport) = self.transport() else {
            // Nothing to announce on a dead connection
            return true;
        };
        if let Err(e) = transport.write_frame(&Frame::unsubscribe(topic)).await {
            tracing::warn!(topic = %topic, "Failed to announce unsubscribe: {}", e);
        }
        true
    }

    /// Publish a JSON body to a command destination (fire and forget).
    pub async fn send_message<T: Serialize>(&self, destination: &str, body: &T) -> bool {
        let Some(transport) = self.transport() else {
            tracing::warn!(destination = %destination, "Send requested while disconnected");
            return false;
        };

        let payload = match serde_json::to_vec(body) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(destination = %destination, "Failed to serialize message: {}", e);
                return false;
            }
        };

        match transport
            .write_frame(&Frame::publish(destination, payload))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(destination = %destination, "Failed to publish message: {}", e);
                false
            }
        }
    }

    /// Tear down the connection and clear every registered handler.
    ///
    /// Unsubscribes are announced best-effort; a dead link is simply
    /// dropped.
    pub async fn disconnect(&self) -> bool {
        let conexion = {
            let mut guard = self.inner.conexion.lock().unwrap();
            guard.take()
        };
        let Some(conexion) = conexion else {
            return true;
        };

        let topics: Vec<String> = {
            let mut subs = self.inner.subs.lock().unwrap();
            subs.drain().map(|(topic, _)| topic).collect()
        };

        if conexion.alive.load(Ordering::SeqCst) {
            for topic in &topics {
                let _ = conexion
                    .transport
                    .write_frame(&Frame::unsubscribe(topic))
                    .await;
            }
            if let Err(e) = conexion.transport.close().await {
                tracing::debug!("Transport close error: {}", e);
            }
        }
        conexion.alive.store(false, Ordering::SeqCst);
        // Dropping the connection aborts the read task
        true
    }
}

impl Default for BrokerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Inner {
    /// Route a broadcast frame to the handler registered for its topic.
    fn dispatch(&self, frame: Frame) {
        if frame.kind != FrameKind::Message {
            tracing::debug!(kind = %frame.kind, topic = %frame.topic, "Ignoring non-broadcast frame");
            return;
        }

        let handler = {
            let subs = self.subs.lock().unwrap();
            subs.get(&frame.topic).cloned()
        };
        let Some(handler) = handler else {
            tracing::debug!(topic = %frame.topic, "No handler registered for topic");
            return;
        };

        let mensaje = match serde_json::from_slice(&frame.payload) {
            Ok(value) => MensajeEntrante::Json(value),
            Err(_) => MensajeEntrante::Crudo(frame.payload),
        };
        handler(mensaje);
    }
}
