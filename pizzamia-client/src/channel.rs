//! Order-status channel
//!
//! [`PedidoEstadoChannel`] owns the broker connection for the
//! `/topic/estado-pedidos` feed: it subscribes on init, fans incoming
//! state changes out to registered listeners, publishes change requests
//! and keeps reconnecting in the background when the broker is away.
//! It also answers the role-policy questions (which transitions a role
//! may perform, which states it sees) without touching the network.

use crate::broker::{BrokerClient, MensajeEntrante, MessageHandler};
use crate::config::{ChannelConfig, Endpoint};
use crate::notify::{Notifier, TracingNotifier};
use shared::message::{
    Aviso, CambioEstado, CategoriaAviso, DEST_CAMBIAR_ESTADO, TOPIC_ESTADO_PEDIDOS,
};
use shared::models::{Estado, EstadoPedido, Rol};
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Event handed to channel listeners.
///
/// Broadcasts normally decode into a [`CambioEstado`]; a payload that
/// does not is handed over raw instead of being dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum EventoEstado {
    /// Decoded state-change broadcast
    Cambio(CambioEstado),
    /// Payload that did not decode as a state change
    Crudo(Vec<u8>),
}

#[derive(Clone)]
struct ListenerEntry {
    id: Uuid,
    callback: Arc<dyn Fn(&EventoEstado) + Send + Sync>,
}

/// Handle returned by [`PedidoEstadoChannel::on_state_change`].
///
/// Dropping the handle keeps the listener registered for the life of
/// the channel; call [`ListenerHandle::unsubscribe`] to remove it.
pub struct ListenerHandle {
    id: Uuid,
    listeners: Weak<RwLock<Vec<ListenerEntry>>>,
}

impl ListenerHandle {
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            let mut guard = listeners.write().unwrap();
            guard.retain(|listener| listener.id != self.id);
        }
    }
}

/// Order-status channel service.
///
/// One instance per console session, created by the composition root
/// and shared as an `Arc`. The public surface reports failure through
/// booleans and operator notices; errors never escape as panics.
pub struct PedidoEstadoChannel {
    /// Weak self-handle for the background tasks this channel spawns.
    me: Weak<PedidoEstadoChannel>,
    broker: BrokerClient,
    config: ChannelConfig,
    notifier: Arc<dyn Notifier>,
    listeners: Arc<RwLock<Vec<ListenerEntry>>>,
    endpoint: RwLock<Option<Endpoint>>,
    initialized: AtomicBool,
    retry: Mutex<Option<CancellationToken>>,
    pendientes: Mutex<VecDeque<CambioEstado>>,
}

impl PedidoEstadoChannel {
    /// Create a channel that reports notices through `tracing`.
    pub fn new(config: ChannelConfig) -> Arc<Self> {
        Self::with_notifier(config, Arc::new(TracingNotifier))
    }

    /// Create a channel with a custom notice sink.
    pub fn with_notifier(config: ChannelConfig, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            broker: BrokerClient::new(),
            config,
            notifier,
            listeners: Arc::new(RwLock::new(Vec::new())),
            endpoint: RwLock::new(None),
            initialized: AtomicBool::new(false),
            retry: Mutex::new(None),
            pendientes: Mutex::new(VecDeque::new()),
        })
    }

    /// Connect to the broker and subscribe to the order-status topic.
    ///
    /// An already-initialized channel returns true without touching the
    /// connection. On failure a connectivity notice goes out, a
    /// background retry loop starts with exponential backoff, and init
    /// returns false; the channel flips to initialized once a retry
    /// lands.
    pub async fn init(&self, endpoint: Endpoint) -> bool {
        if self.initialized.load(Ordering::SeqCst) {
            return true;
        }

        {
            let mut guard = self.endpoint.write().unwrap();
            *guard = Some(endpoint);
        }

        if self.conectar_y_suscribir().await {
            self.initialized.store(true, Ordering::SeqCst);
            tracing::info!("Order-status channel ready");
            return true;
        }

        self.notifier.notify(
            Aviso::advertencia(
                "Conexión",
                "Error de conexión con el servidor. Reintentando...",
            )
            .con_categoria(CategoriaAviso::Red),
        );
        self.spawn_retry();
        false
    }

    /// One connect-and-subscribe attempt against the stored endpoint.
    async fn conectar_y_suscribir(&self) -> bool {
        let endpoint = {
            let guard = self.endpoint.read().unwrap();
            guard.clone()
        };
        let Some(endpoint) = endpoint else {
            tracing::warn!("No endpoint configured; call init first");
            return false;
        };

        if !self.broker.connect(&endpoint).await {
            return false;
        }
        self.broker
            .subscribe(TOPIC_ESTADO_PEDIDOS, self.dispatcher())
            .await
    }

    /// Handler the broker invokes with every order-status broadcast.
    ///
    /// Captures the listener list and the notifier, never the channel
    /// itself, so the broker's handler map does not keep the channel
    /// alive.
    fn dispatcher(&self) -> MessageHandler {
        let listeners = self.listeners.clone();
        let notifier = self.notifier.clone();
        Arc::new(move |mensaje| match mensaje {
            MensajeEntrante::Json(value) => {
                match serde_json::from_value::<CambioEstado>(value.clone()) {
                    Ok(cambio) => Self::despachar(&listeners, notifier.as_ref(), cambio),
                    Err(e) => {
                        tracing::warn!("Broadcast is not a state change; forwarding raw: {}", e);
                        Self::notificar_listeners(
                            &listeners,
                            &EventoEstado::Crudo(value.to_string().into_bytes()),
                        );
                    }
                }
            }
            MensajeEntrante::Crudo(bytes) => {
                tracing::warn!(len = bytes.len(), "Non-JSON broadcast; forwarding raw");
                Self::notificar_listeners(&listeners, &EventoEstado::Crudo(bytes));
            }
        })
    }

    /// Fan a decoded state-change event out to the listeners and emit
    /// the operator notice.
    ///
    /// Server-rejected changes surface as an error notice and skip the
    /// listeners.
    fn despachar(
        listeners: &RwLock<Vec<ListenerEntry>>,
        notifier: &dyn Notifier,
        cambio: CambioEstado,
    ) {
        if let Some(error) = &cambio.error {
            tracing::warn!(
                pedido = cambio.pedido_id,
                "Server rejected state change: {}",
                error
            );
            notifier.notify(
                Aviso::error("Pedidos", format!("Error: {}", error))
                    .con_categoria(CategoriaAviso::Negocio),
            );
            return;
        }

        let pedido_id = cambio.pedido_id;
        let nombre = cambio
            .nuevo_estado_nombre
            .clone()
            .unwrap_or_else(|| format!("estado {}", cambio.nuevo_estado_id));

        Self::notificar_listeners(listeners, &EventoEstado::Cambio(cambio));

        notifier.notify(Aviso::exito(
            "Pedidos",
            format!("Pedido #{} actualizado a {}", pedido_id, nombre),
        ));
    }

    /// Invoke every registered listener with the event, in registration
    /// order. A panicking listener is logged and the rest still run.
    fn notificar_listeners(listeners: &RwLock<Vec<ListenerEntry>>, evento: &EventoEstado) {
        let snapshot: Vec<ListenerEntry> = {
            let guard = listeners.read().unwrap();
            guard.clone()
        };
        for listener in &snapshot {
            let resultado = std::panic::catch_unwind(AssertUnwindSafe(|| {
                (listener.callback)(evento);
            }));
            if let Err(panic_info) = resultado {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                tracing::error!(listener = %listener.id, "State-change listener panicked: {}", msg);
            }
        }
    }

    /// Register a listener invoked with every accepted state change.
    ///
    /// Payloads that fail to decode arrive as [`EventoEstado::Crudo`]
    /// rather than being dropped.
    pub fn on_state_change<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&EventoEstado) + Send + Sync + 'static,
    {
        let entry = ListenerEntry {
            id: Uuid::new_v4(),
            callback: Arc::new(callback),
        };
        let id = entry.id;
        {
            let mut guard = self.listeners.write().unwrap();
            guard.push(entry);
        }
        ListenerHandle {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Request a state change for an order.
    ///
    /// Returns whether the request went out on the wire. While the
    /// broker is unreachable the request is queued, a background
    /// reconnect starts and the call returns false; queued requests are
    /// flushed once the link comes back.
    pub async fn cambiar_estado(
        &self,
        pedido_id: i64,
        nuevo_estado_id: i64,
        empleado_id: i64,
        estado_anterior_id: Option<i64>,
    ) -> bool {
        if empleado_id <= 0 {
            self.notifier
                .notify(Aviso::error("Pedidos", "No se pudo identificar al empleado"));
            return false;
        }

        let cambio =
            CambioEstado::solicitud(pedido_id, nuevo_estado_id, empleado_id, estado_anterior_id);

        if !self.broker.is_connected() {
            self.encolar(cambio);
            self.notifier.notify(
                Aviso::advertencia("Conexión", "Intentando conectar al servidor...")
                    .con_categoria(CategoriaAviso::Red),
            );

            if let Some(canal) = self.me.upgrade() {
                tokio::spawn(async move {
                    if !canal.reconnect().await {
                        canal.notifier.notify(
                            Aviso::error(
                                "Conexión",
                                "No se pudo establecer conexión con el servidor",
                            )
                            .con_categoria(CategoriaAviso::Red),
                        );
                    }
                });
            }
            return false;
        }

        let enviado = self.broker.send_message(DEST_CAMBIAR_ESTADO, &cambio).await;
        if enviado {
            self.notifier
                .notify(Aviso::info("Pedidos", "Procesando cambio de estado..."));
        } else {
            self.notifier.notify(Aviso::error(
                "Pedidos",
                "Error al enviar solicitud de cambio de estado",
            ));
        }
        enviado
    }

    /// Queue a request for delivery after the next successful reconnect.
    fn encolar(&self, cambio: CambioEstado) {
        let mut pendientes = self.pendientes.lock().unwrap();
        pendientes.push_back(cambio);
        tracing::debug!(en_cola = pendientes.len(), "Queued state change while offline");
    }

    /// Re-establish the connection and flush queued requests.
    pub async fn reconnect(&self) -> bool {
        if !self.conectar_y_suscribir().await {
            return false;
        }
        self.drain_pendientes().await;
        true
    }

    /// Send queued state changes in arrival order, stopping at the
    /// first failure.
    async fn drain_pendientes(&self) {
        loop {
            let siguiente = {
                let mut pendientes = self.pendientes.lock().unwrap();
                pendientes.pop_front()
            };
            let Some(cambio) = siguiente else {
                break;
            };

            if self.broker.send_message(DEST_CAMBIAR_ESTADO, &cambio).await {
                self.notifier
                    .notify(Aviso::info("Pedidos", "Procesando cambio de estado..."));
            } else {
                {
                    let mut pendientes = self.pendientes.lock().unwrap();
                    pendientes.push_front(cambio);
                }
                self.notifier.notify(Aviso::error(
                    "Pedidos",
                    "No se pudo enviar la solicitud después de reconectar",
                ));
                break;
            }
        }
    }

    /// Start the background retry loop, superseding any previous one.
    fn spawn_retry(&self) {
        let token = CancellationToken::new();
        {
            let mut guard = self.retry.lock().unwrap();
            if let Some(anterior) = guard.replace(token.clone()) {
                anterior.cancel();
            }
        }

        let canal = self.me.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            let mut delay = config.retry_delay;
            let mut intentos: u32 = 0;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }

                let Some(canal) = canal.upgrade() else {
                    return;
                };
                intentos += 1;

                if canal.conectar_y_suscribir().await {
                    canal.initialized.store(true, Ordering::SeqCst);
                    tracing::info!(intentos, "Connection established after retry");
                    canal.drain_pendientes().await;
                    return;
                }

                if config.max_retry_attempts != 0 && intentos >= config.max_retry_attempts {
                    tracing::error!(intentos, "Giving up on broker connection");
                    canal.notifier.notify(
                        Aviso::error("Conexión", "No se pudo establecer conexión con el servidor")
                            .con_categoria(CategoriaAviso::Red),
                    );
                    return;
                }

                tracing::warn!(intentos, reintento_en = ?delay, "Broker connect failed; will retry");
                delay = config.next_delay(delay);
            }
        });
    }

    /// Whether `rol` may move an order from `estado_actual` to
    /// `nuevo_estado`.
    ///
    /// Administrators pass regardless of the state strings; every other
    /// role needs both states to parse and the transition to sit in its
    /// allowance table. Names are matched case-insensitively.
    pub fn puede_realizar_cambio(
        &self,
        estado_actual: &str,
        nuevo_estado: &str,
        rol: Option<&str>,
    ) -> bool {
        let Some(rol) = rol.and_then(Rol::from_nombre) else {
            return false;
        };
        if rol == Rol::Administrador {
            return true;
        }

        let (Some(actual), Some(destino)) = (
            EstadoPedido::from_denominacion(estado_actual),
            EstadoPedido::from_denominacion(nuevo_estado),
        ) else {
            return false;
        };
        rol.puede_transicion(actual, destino)
    }

    /// States `rol` may move an order in `estado_actual` to, drawn from
    /// the `todos` catalog. Administrators get the whole catalog;
    /// unknown roles get nothing.
    pub fn estados_disponibles(
        &self,
        estado_actual: &str,
        rol: Option<&str>,
        todos: &[Estado],
    ) -> Vec<Estado> {
        let Some(parseado) = rol.and_then(Rol::from_nombre) else {
            return Vec::new();
        };
        if parseado == Rol::Administrador {
            return todos.to_vec();
        }

        todos
            .iter()
            .filter(|estado| self.puede_realizar_cambio(estado_actual, &estado.denominacion, rol))
            .cloned()
            .collect()
    }

    /// Display names of the order states visible to `rol`.
    pub fn estados_visibles(&self, rol: Option<&str>) -> Vec<&'static str> {
        rol.and_then(Rol::from_nombre)
            .map(|rol| {
                rol.estados_visibles()
                    .iter()
                    .map(|estado| estado.denominacion())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_connected(&self) -> bool {
        self.broker.is_connected()
    }

    /// Number of state changes queued while offline.
    pub fn cambios_pendientes(&self) -> usize {
        self.pendientes.lock().unwrap().len()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Tear the channel down: stop retries, unsubscribe, disconnect and
    /// drop every listener and queued request.
    pub async fn cleanup(&self) {
        let token = {
            let mut guard = self.retry.lock().unwrap();
            guard.take()
        };
        if let Some(token) = token {
            token.cancel();
        }

        if self.broker.is_connected() {
            self.broker.unsubscribe(TOPIC_ESTADO_PEDIDOS).await;
            self.broker.disconnect().await;
        }

        self.listeners.write().unwrap().clear();
        self.pendientes.lock().unwrap().clear();
        self.initialized.store(false, Ordering::SeqCst);
        tracing::info!("Order-status channel closed");
    }
}
