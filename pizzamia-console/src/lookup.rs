//! External order lookup collaborators
//!
//! The console reaches the backend only through this seam: fetch one
//! order by id, or list the orders for the current view. The deployed
//! console's REST client implements it; tests plug an in-memory double.

use async_trait::async_trait;
use shared::models::Pedido;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("order {0} not found")]
    NoEncontrado(i64),
    #[error("backend request failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait PedidoLookup: Send + Sync {
    async fn buscar_pedido(&self, id: i64) -> Result<Pedido, LookupError>;
    async fn listar_pedidos(&self) -> Result<Vec<Pedido>, LookupError>;
}
