//! Operator notice sink
//!
//! The channel reports connection and order events as [`Aviso`] values
//! through this trait. The console crate plugs its own sink in; the
//! default forwards everything to the tracing subscriber.

use shared::message::{Aviso, NivelAviso};

/// Sink for operator-facing notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, aviso: Aviso);
}

/// Notifier that logs every notice through `tracing`.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, aviso: Aviso) {
        match aviso.nivel {
            NivelAviso::Info | NivelAviso::Exito => {
                tracing::info!(titulo = %aviso.titulo, categoria = %aviso.categoria, "{}", aviso.mensaje);
            }
            NivelAviso::Advertencia => {
                tracing::warn!(titulo = %aviso.titulo, categoria = %aviso.categoria, "{}", aviso.mensaje);
            }
            NivelAviso::Error => {
                tracing::error!(titulo = %aviso.titulo, categoria = %aviso.categoria, "{}", aviso.mensaje);
            }
        }
    }
}
