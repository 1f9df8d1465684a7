//! Pedido view model as served by the backend

use super::estado::Estado;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoEnvio {
    Delivery,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoPago {
    Efectivo,
    Mercadopago,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cliente {
    pub id: i64,
    pub nombre: String,
    pub apellido: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Empleado {
    pub id: i64,
    pub nombre: String,
    pub apellido: String,
}

/// Sellable item reference inside a detail line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticuloRef {
    pub id: i64,
    pub denominacion: String,
    pub precio_venta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromocionRef {
    pub id: i64,
    pub descuento: f64,
}

/// One line of a pedido. Exactly one of the articulo fields is set by the
/// backend; promotions come as a separate reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetallePedido {
    pub id: i64,
    pub cantidad: i32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sub_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub articulo_insumo: Option<ArticuloRef>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub articulo_manufacturado: Option<ArticuloRef>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub promocion: Option<PromocionRef>,
}

/// An order moving through the pipeline, as held by the console queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pedido {
    pub id: i64,
    pub hora_estimada_finalizacion: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_costo: Option<f64>,
    pub estado: Estado,
    pub tipo_envio: TipoEnvio,
    pub tipo_pago: TipoPago,
    #[serde(default)]
    pub detalles: Vec<DetallePedido>,
    pub cliente: Cliente,
    pub empleado: Empleado,
}

impl Pedido {
    pub fn estado_nombre(&self) -> &str {
        &self.estado.denominacion
    }

    /// Overwrite only the state, leaving the rest of the row untouched.
    pub fn actualizar_estado(&mut self, id: i64, denominacion: impl Into<String>) {
        self.estado = Estado::new(id, denominacion);
    }
}
