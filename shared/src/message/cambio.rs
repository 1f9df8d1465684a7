//! Order state-change event

use serde::{Deserialize, Serialize};

/// A state transition, as carried on the wire in both directions.
///
/// Field names are fixed by the broker protocol. An event is either a
/// transition notification (`error` absent) or a broker rejection
/// (`error` present); a rejection is never interpreted as success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CambioEstado {
    pub pedido_id: i64,
    pub nuevo_estado_id: i64,
    pub empleado_id: i64,
    /// State the order was believed to be in when the request was made.
    /// Optimistic-concurrency hint, not enforced by this layer.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub estado_anterior_id: Option<i64>,
    /// Absent on outgoing requests; the broker fills it in on broadcasts.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nuevo_estado_nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl CambioEstado {
    /// Outgoing transition request.
    pub fn solicitud(
        pedido_id: i64,
        nuevo_estado_id: i64,
        empleado_id: i64,
        estado_anterior_id: Option<i64>,
    ) -> Self {
        Self {
            pedido_id,
            nuevo_estado_id,
            empleado_id,
            estado_anterior_id,
            nuevo_estado_nombre: None,
            error: None,
        }
    }

    pub fn con_nombre(mut self, nombre: impl Into<String>) -> Self {
        self.nuevo_estado_nombre = Some(nombre.into());
        self
    }

    pub fn con_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// True when the broker rejected the request.
    pub fn es_error(&self) -> bool {
        self.error.is_some()
    }
}
