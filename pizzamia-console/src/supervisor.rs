//! Connection supervisor
//!
//! Periodic liveness probe over the order-status channel. When the link
//! drops it tells the operator once, keeps attempting a reconnect every
//! tick, and tells the operator once more when the link is back.

use pizzamia_client::{Notifier, PedidoEstadoChannel};
use shared::message::{Aviso, CategoriaAviso};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

pub struct ConnectionSupervisor {
    canal: Arc<PedidoEstadoChannel>,
    notifier: Arc<dyn Notifier>,
    check_interval: Duration,
}

/// Running supervisor task. Stop it before dropping the channel.
pub struct SupervisorHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.task.await;
    }
}

impl ConnectionSupervisor {
    /// Supervisor probing at the channel's configured interval.
    pub fn new(canal: Arc<PedidoEstadoChannel>, notifier: Arc<dyn Notifier>) -> Self {
        let check_interval = canal.config().probe_interval;
        Self {
            canal,
            notifier,
            check_interval,
        }
    }

    pub fn with_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// Start probing in the background.
    pub fn spawn(self) -> SupervisorHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(shutdown.clone()));
        SupervisorHandle { shutdown, task }
    }

    /// Probe loop. Notices go out on transitions only: one when the
    /// link is lost, one when it is restored, no matter how many probes
    /// fail in between.
    async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.check_interval);
        let mut fallos_consecutivos: u32 = 0;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }

            if self.canal.is_connected() {
                if fallos_consecutivos > 0 {
                    // Someone else restored the link between probes
                    tracing::info!(fallos = fallos_consecutivos, "Broker link is back");
                    fallos_consecutivos = 0;
                    self.notificar_restablecida();
                }
                continue;
            }

            fallos_consecutivos += 1;
            tracing::warn!(fallos = fallos_consecutivos, "Broker link down");
            if fallos_consecutivos == 1 {
                self.notifier.notify(
                    Aviso::advertencia(
                        "Conexión",
                        "Conexión con el servidor perdida. Reconectando...",
                    )
                    .con_categoria(CategoriaAviso::Red),
                );
            }

            if self.canal.reconnect().await {
                tracing::info!(fallos = fallos_consecutivos, "Reconnected to the broker");
                fallos_consecutivos = 0;
                self.notificar_restablecida();
            }
        }
    }

    fn notificar_restablecida(&self) {
        self.notifier.notify(
            Aviso::exito("Conexión", "Conexión con el servidor restablecida")
                .con_categoria(CategoriaAviso::Red),
        );
    }
}
