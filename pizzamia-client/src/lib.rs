//! PizzaMia Client - order-status synchronization for operator consoles
//!
//! Keeps every connected console consistent with the kitchen/cashier/
//! delivery order pipeline in near-real time: a framed publish/subscribe
//! connection to the broker, the single order-state topic subscription,
//! the role policy for state transitions and the reconnection behavior.

pub mod broker;
pub mod channel;
pub mod config;
pub mod error;
pub mod notify;
pub mod transport;

#[cfg(feature = "in-process")]
pub mod inproc;

pub use broker::{BrokerClient, MensajeEntrante, MessageHandler};
pub use channel::{EventoEstado, ListenerHandle, PedidoEstadoChannel};
pub use config::{ChannelConfig, Endpoint};
pub use error::{TransportError, TransportResult};
pub use notify::{Notifier, TracingNotifier};

#[cfg(feature = "in-process")]
pub use inproc::InProcessBroker;

// Re-export shared wire types for convenience
pub use shared::{Aviso, CambioEstado, DEST_CAMBIAR_ESTADO, TOPIC_ESTADO_PEDIDOS};
