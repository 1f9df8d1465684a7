//! PizzaMia Console - order queue management for operators
//!
//! The consuming side of the order-status channel: the local order
//! queue with its reconciliation rules, the connection supervisor and
//! the composition root that wires both to a channel for one operator
//! session.

pub mod cola;
pub mod gestion;
pub mod lookup;
pub mod supervisor;

pub use cola::{ColaPedidos, Reconciliacion};
pub use gestion::{GestionHandle, GestionPedidos, Sesion};
pub use lookup::{LookupError, PedidoLookup};
pub use supervisor::{ConnectionSupervisor, SupervisorHandle};
