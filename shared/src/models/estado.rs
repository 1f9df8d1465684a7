//! Order pipeline states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline state of a pedido.
///
/// The backend identifies states by numeric id and denomination string;
/// the synchronization layer reasons over denominations, so parsing is
/// total and fail-closed: an unknown denomination maps to `None` instead
/// of being carried around as a raw string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstadoPedido {
    /// Waiting to be accepted by the cashier
    EnEspera,
    /// Queued to the kitchen
    EnCocina,
    /// Being cooked
    EnPreparacion,
    /// Ready for invoicing or dispatch
    Listo,
    /// Invoiced
    Facturado,
    /// Out for delivery
    EnDelivery,
    /// Delivered to the customer
    Entregado,
    /// Terminal, reachable only through the administrative role
    Cancelado,
}

impl EstadoPedido {
    /// All states in pipeline order, `Cancelado` last.
    pub const TODOS: [EstadoPedido; 8] = [
        EstadoPedido::EnEspera,
        EstadoPedido::EnCocina,
        EstadoPedido::EnPreparacion,
        EstadoPedido::Listo,
        EstadoPedido::Facturado,
        EstadoPedido::EnDelivery,
        EstadoPedido::Entregado,
        EstadoPedido::Cancelado,
    ];

    /// Denomination as served by the backend.
    pub fn denominacion(&self) -> &'static str {
        match self {
            EstadoPedido::EnEspera => "EN ESPERA",
            EstadoPedido::EnCocina => "EN COCINA",
            EstadoPedido::EnPreparacion => "EN PREPARACION",
            EstadoPedido::Listo => "LISTO",
            EstadoPedido::Facturado => "FACTURADO",
            EstadoPedido::EnDelivery => "EN DELIVERY",
            EstadoPedido::Entregado => "ENTREGADO",
            EstadoPedido::Cancelado => "CANCELADO",
        }
    }

    /// Case-insensitive parse of a backend denomination.
    pub fn from_denominacion(denominacion: &str) -> Option<Self> {
        match denominacion.trim().to_uppercase().as_str() {
            "EN ESPERA" => Some(EstadoPedido::EnEspera),
            "EN COCINA" => Some(EstadoPedido::EnCocina),
            "EN PREPARACION" => Some(EstadoPedido::EnPreparacion),
            "LISTO" => Some(EstadoPedido::Listo),
            "FACTURADO" => Some(EstadoPedido::Facturado),
            "EN DELIVERY" => Some(EstadoPedido::EnDelivery),
            "ENTREGADO" => Some(EstadoPedido::Entregado),
            "CANCELADO" => Some(EstadoPedido::Cancelado),
            _ => None,
        }
    }

    pub fn es_terminal(&self) -> bool {
        matches!(self, EstadoPedido::Cancelado)
    }
}

impl fmt::Display for EstadoPedido {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.denominacion())
    }
}

/// Catalog form of a state as served by the backend.
///
/// The `nombre` alias covers the spelling used inside pedido payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estado {
    pub id: i64,
    #[serde(alias = "nombre")]
    pub denominacion: String,
}

impl Estado {
    pub fn new(id: i64, denominacion: impl Into<String>) -> Self {
        Self {
            id,
            denominacion: denominacion.into(),
        }
    }

    /// Parsed pipeline state, `None` for denominations this layer does not know.
    pub fn como_estado_pedido(&self) -> Option<EstadoPedido> {
        EstadoPedido::from_denominacion(&self.denominacion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denominacion_roundtrip() {
        for estado in EstadoPedido::TODOS {
            assert_eq!(
                EstadoPedido::from_denominacion(estado.denominacion()),
                Some(estado)
            );
        }
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(
            EstadoPedido::from_denominacion("en preparacion"),
            Some(EstadoPedido::EnPreparacion)
        );
        assert_eq!(
            EstadoPedido::from_denominacion("  Listo "),
            Some(EstadoPedido::Listo)
        );
    }

    #[test]
    fn test_parse_unknown_is_none() {
        assert_eq!(EstadoPedido::from_denominacion("EN HORNO"), None);
        assert_eq!(EstadoPedido::from_denominacion(""), None);
    }

    #[test]
    fn test_solo_cancelado_es_terminal() {
        for estado in EstadoPedido::TODOS {
            assert_eq!(estado.es_terminal(), estado == EstadoPedido::Cancelado);
        }
    }

    #[test]
    fn test_estado_catalogo_alias_nombre() {
        let desde_catalogo: Estado =
            serde_json::from_str(r#"{"id": 4, "denominacion": "LISTO"}"#).unwrap();
        let desde_pedido: Estado = serde_json::from_str(r#"{"id": 4, "nombre": "LISTO"}"#).unwrap();
        assert_eq!(desde_catalogo, desde_pedido);
        assert_eq!(desde_pedido.como_estado_pedido(), Some(EstadoPedido::Listo));
    }
}
