//! Operator roles and the state-change policy tables

use super::estado::EstadoPedido;
use std::fmt;

/// Role of the operator driving a console session.
///
/// Supplied externally per session and parsed fail-closed: an unknown
/// role string maps to `None` and is denied everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rol {
    Administrador,
    Cajero,
    Cocinero,
    Delivery,
}

impl Rol {
    /// Case-insensitive parse of the session role string.
    ///
    /// `ADMIN` is accepted as a legacy spelling of `ADMINISTRADOR`.
    pub fn from_nombre(nombre: &str) -> Option<Self> {
        match nombre.trim().to_uppercase().as_str() {
            "ADMINISTRADOR" | "ADMIN" => Some(Rol::Administrador),
            "CAJERO" => Some(Rol::Cajero),
            "COCINERO" => Some(Rol::Cocinero),
            "DELIVERY" => Some(Rol::Delivery),
            _ => None,
        }
    }

    pub fn nombre(&self) -> &'static str {
        match self {
            Rol::Administrador => "ADMINISTRADOR",
            Rol::Cajero => "CAJERO",
            Rol::Cocinero => "COCINERO",
            Rol::Delivery => "DELIVERY",
        }
    }

    /// Transition permission table.
    ///
    /// `Administrador` is unrestricted. For the other roles any pair not
    /// listed here is denied, including `ENTREGADO -> FACTURADO` for anyone
    /// but the cashier and every transition into `CANCELADO`.
    pub fn puede_transicion(&self, actual: EstadoPedido, destino: EstadoPedido) -> bool {
        use EstadoPedido::*;

        match self {
            Rol::Administrador => true,
            Rol::Cajero => matches!(
                (actual, destino),
                (EnEspera, EnCocina)
                    | (Listo, Facturado)
                    | (Listo, EnDelivery)
                    | (Entregado, Facturado)
            ),
            Rol::Cocinero => matches!(
                (actual, destino),
                (EnCocina, EnPreparacion) | (EnPreparacion, Listo)
            ),
            Rol::Delivery => matches!((actual, destino), (EnDelivery, Entregado)),
        }
    }

    /// States a role's queue view may display. `Cancelado` is never listed.
    pub fn estados_visibles(&self) -> &'static [EstadoPedido] {
        use EstadoPedido::*;

        match self {
            Rol::Administrador => &[
                EnEspera,
                EnCocina,
                EnPreparacion,
                Listo,
                Facturado,
                EnDelivery,
                Entregado,
            ],
            Rol::Cajero => &[EnEspera, Listo, Entregado, Facturado],
            Rol::Cocinero => &[EnCocina, EnPreparacion],
            Rol::Delivery => &[EnDelivery, Entregado],
        }
    }

    pub fn puede_ver(&self, estado: EstadoPedido) -> bool {
        self.estados_visibles().contains(&estado)
    }
}

impl fmt::Display for Rol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nombre())
    }
}
