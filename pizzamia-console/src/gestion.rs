//! Order management facade
//!
//! [`GestionPedidos`] is what the management screen talks to: it wires
//! the order-status channel to the local queue, validates and sends
//! state-change requests for the session's role and employee, and runs
//! the connection supervisor. One instance per operator session,
//! assembled by the composition root.

use crate::cola::{ColaPedidos, Reconciliacion};
use crate::lookup::PedidoLookup;
use crate::supervisor::{ConnectionSupervisor, SupervisorHandle};
use pizzamia_client::{EventoEstado, ListenerHandle, Notifier, PedidoEstadoChannel};
use shared::message::{Aviso, CategoriaAviso};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Operator session context.
#[derive(Debug, Clone)]
pub struct Sesion {
    /// Role string as issued by the backend, `None` for unauthenticated
    /// sessions. Parsed fail-closed by the policy layer.
    pub rol: Option<String>,
    pub empleado_id: i64,
}

/// Background work started by [`GestionPedidos::start`].
pub struct GestionHandle {
    escucha: ListenerHandle,
    reconcile: JoinHandle<()>,
    supervisor: SupervisorHandle,
}

impl GestionHandle {
    /// Stop listening and supervising. The channel itself stays up;
    /// tear it down separately with its own cleanup.
    pub async fn stop(self) {
        self.escucha.unsubscribe();
        self.reconcile.abort();
        self.supervisor.stop().await;
    }
}

pub struct GestionPedidos {
    canal: Arc<PedidoEstadoChannel>,
    cola: Arc<Mutex<ColaPedidos>>,
    lookup: Arc<dyn PedidoLookup>,
    notifier: Arc<dyn Notifier>,
    sesion: Sesion,
}

impl GestionPedidos {
    pub fn new(
        canal: Arc<PedidoEstadoChannel>,
        cola: Arc<Mutex<ColaPedidos>>,
        lookup: Arc<dyn PedidoLookup>,
        notifier: Arc<dyn Notifier>,
        sesion: Sesion,
    ) -> Self {
        Self {
            canal,
            cola,
            lookup,
            notifier,
            sesion,
        }
    }

    pub fn cola(&self) -> Arc<Mutex<ColaPedidos>> {
        self.cola.clone()
    }

    /// Subscribe the queue to the order-status feed and start the
    /// connection supervisor.
    ///
    /// Events are handed off to a reconciliation task so the channel's
    /// dispatch never blocks on queue locks or backend fetches.
    pub fn start(&self) -> GestionHandle {
        let (tx, mut rx) = mpsc::unbounded_channel();
        // The queue only consumes decoded changes; raw payloads stay
        // with listeners that want them
        let escucha = self.canal.on_state_change(move |evento| {
            if let EventoEstado::Cambio(cambio) = evento {
                let _ = tx.send(cambio.clone());
            }
        });

        let cola = self.cola.clone();
        let lookup = self.lookup.clone();
        let notifier = self.notifier.clone();
        let reconcile = tokio::spawn(async move {
            while let Some(cambio) = rx.recv().await {
                let mut cola = cola.lock().await;
                match cola.reconciliar(&cambio, lookup.as_ref()).await {
                    Ok(Reconciliacion::Insertado) => {
                        notifier.notify(
                            Aviso::exito("Pedidos", format!("Nuevo pedido #{}", cambio.pedido_id))
                                .con_data(serde_json::json!({"sonido": true})),
                        );
                    }
                    Ok(resultado) => {
                        tracing::debug!(
                            pedido = cambio.pedido_id,
                            resultado = ?resultado,
                            "State change merged"
                        );
                    }
                    Err(e) => {
                        tracing::error!(pedido = cambio.pedido_id, "Reconciliation failed: {}", e);
                        notifier.notify(Aviso::error(
                            "Pedidos",
                            format!("No se pudo actualizar el pedido #{}", cambio.pedido_id),
                        ));
                    }
                }
            }
        });

        let supervisor =
            ConnectionSupervisor::new(self.canal.clone(), self.notifier.clone()).spawn();

        GestionHandle {
            escucha,
            reconcile,
            supervisor,
        }
    }

    /// Validate and send a state change for an order in the queue.
    ///
    /// The role policy is checked against the order's current state
    /// before anything goes out. The queue is updated optimistically
    /// whether the request went on the wire or was left queued for the
    /// reconnect; the broker broadcast settles the final state either
    /// way. Returns whether the request went out.
    pub async fn solicitar_cambio(&self, pedido_id: i64, nuevo_estado_id: i64) -> bool {
        let (estado_actual, destino, estado_anterior_id) = {
            let cola = self.cola.lock().await;
            let actual = cola.estado_de(pedido_id).map(str::to_string);
            let destino = cola.estado_por_id(nuevo_estado_id).cloned();
            let anterior = actual.as_deref().and_then(|nombre| {
                cola.estados()
                    .iter()
                    .find(|e| e.denominacion.eq_ignore_ascii_case(nombre))
                    .map(|e| e.id)
            });
            (actual, destino, anterior)
        };

        let Some(estado_actual) = estado_actual else {
            tracing::warn!(pedido = pedido_id, "Order not in the current view");
            self.notifier.notify(Aviso::error(
                "Pedidos",
                format!("El pedido #{} no está en la vista actual", pedido_id),
            ));
            return false;
        };
        let Some(destino) = destino else {
            self.notifier
                .notify(Aviso::error("Pedidos", "Estado de destino desconocido"));
            return false;
        };

        if !self.canal.puede_realizar_cambio(
            &estado_actual,
            &destino.denominacion,
            self.sesion.rol.as_deref(),
        ) {
            self.notifier.notify(
                Aviso::advertencia(
                    "Pedidos",
                    format!(
                        "El rol actual no permite pasar de {} a {}",
                        estado_actual, destino.denominacion
                    ),
                )
                .con_categoria(CategoriaAviso::Negocio),
            );
            return false;
        }

        let enviado = self
            .canal
            .cambiar_estado(
                pedido_id,
                nuevo_estado_id,
                self.sesion.empleado_id,
                estado_anterior_id,
            )
            .await;

        {
            let mut cola = self.cola.lock().await;
            cola.aplicar_optimista(pedido_id, &destino);
        }

        if !enviado {
            self.notifier.notify(
                Aviso::advertencia(
                    "Pedidos",
                    format!("Cambio del pedido #{} pendiente de confirmación", pedido_id),
                )
                .con_categoria(CategoriaAviso::Negocio),
            );
        }
        enviado
    }
}
