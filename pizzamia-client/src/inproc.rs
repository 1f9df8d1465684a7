//! In-process broker loopback
//!
//! A minimal broker for demos and integration tests: it accepts
//! state-change publications, enriches them with the state name from
//! its catalog and broadcasts the result to every subscriber of the
//! order-status topic, the same contract the production broker honors.

use crate::config::Endpoint;
use shared::message::{CambioEstado, DEST_CAMBIAR_ESTADO, Frame, FrameKind, TOPIC_ESTADO_PEDIDOS};
use shared::models::Estado;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct InProcessBroker {
    to_broker: broadcast::Sender<Frame>,
    from_broker: broadcast::Sender<Frame>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl InProcessBroker {
    /// Start the loopback with the state catalog used to enrich events.
    pub fn spawn(estados: Vec<Estado>) -> Self {
        let (to_broker, rx) = broadcast::channel(64);
        let (from_broker, _) = broadcast::channel(64);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(Self::run(
            rx,
            from_broker.clone(),
            estados,
            shutdown.clone(),
        ));

        Self {
            to_broker,
            from_broker,
            shutdown,
            task,
        }
    }

    /// Endpoint clients connect to.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::memory(&self.to_broker, &self.from_broker)
    }

    /// Broadcast an accepted state change to every subscriber.
    pub fn publicar(&self, cambio: &CambioEstado) {
        let payload = serde_json::to_vec(cambio).expect("Failed to serialize state change");
        let _ = self
            .from_broker
            .send(Frame::message(TOPIC_ESTADO_PEDIDOS, payload));
    }

    /// Broadcast a rejection for an order.
    pub fn rechazar(&self, pedido_id: i64, motivo: &str) {
        let cambio = CambioEstado::solicitud(pedido_id, 0, 0, None).con_error(motivo);
        self.publicar(&cambio);
    }

    async fn run(
        mut rx: broadcast::Receiver<Frame>,
        from_broker: broadcast::Sender<Frame>,
        estados: Vec<Estado>,
        shutdown: CancellationToken,
    ) {
        loop {
            let frame = tokio::select! {
                _ = shutdown.cancelled() => break,
                recibido = rx.recv() => match recibido {
                    Ok(frame) => frame,
                    Err(broadcast::error::RecvError::Lagged(saltados)) => {
                        tracing::warn!(saltados, "In-process broker lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            match frame.kind {
                FrameKind::Publish if frame.topic == DEST_CAMBIAR_ESTADO => {
                    let cambio: CambioEstado = match frame.parse_payload() {
                        Ok(cambio) => cambio,
                        Err(e) => {
                            tracing::warn!("Discarding malformed publication: {}", e);
                            continue;
                        }
                    };
                    let enriquecido = Self::enriquecer(cambio, &estados);
                    let payload = serde_json::to_vec(&enriquecido)
                        .expect("Failed to serialize state change");
                    let _ = from_broker.send(Frame::message(TOPIC_ESTADO_PEDIDOS, payload));
                }
                FrameKind::Subscribe | FrameKind::Unsubscribe => {
                    // Broadcast fan-out needs no per-topic bookkeeping
                    tracing::debug!(kind = %frame.kind, topic = %frame.topic, "Subscription frame");
                }
                _ => {
                    tracing::debug!(kind = %frame.kind, topic = %frame.topic, "Ignoring frame");
                }
            }
        }
    }

    /// Fill the state name from the catalog when the publisher left it out.
    fn enriquecer(cambio: CambioEstado, estados: &[Estado]) -> CambioEstado {
        if cambio.nuevo_estado_nombre.is_some() {
            return cambio;
        }
        match estados.iter().find(|e| e.id == cambio.nuevo_estado_id) {
            Some(estado) => {
                let nombre = estado.denominacion.clone();
                cambio.con_nombre(nombre)
            }
            None => cambio,
        }
    }

    /// Stop the loopback task.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.task.await;
    }
}
