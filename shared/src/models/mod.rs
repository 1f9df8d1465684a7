//! Data models
//!
//! Shared between the synchronization client and the console (via API).
//! All IDs are `i64` as served by the backend.

pub mod estado;
pub mod pedido;
pub mod rol;

// Re-exports
pub use estado::*;
pub use pedido::*;
pub use rol::*;
