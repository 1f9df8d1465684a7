//! Shared types for the PizzaMia console stack
//!
//! Domain model and wire types used across the synchronization client
//! and the operator console crates.

pub mod message;
pub mod models;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Wire re-exports (for convenient access)
pub use message::{Aviso, CambioEstado, CategoriaAviso, Frame, FrameKind, NivelAviso};
pub use message::{DEST_CAMBIAR_ESTADO, TOPIC_ESTADO_PEDIDOS};

// Domain re-exports
pub use models::{Estado, EstadoPedido, Pedido, Rol, TipoEnvio, TipoPago};
