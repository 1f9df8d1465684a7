//! Wire types for the order-status synchronization channel
//!
//! These types are shared between the operator clients and the broker
//! loopback used for in-process runs, for both in-memory and network
//! (TCP/TLS) communication.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod aviso;
pub mod cambio;

pub use aviso::{Aviso, CategoriaAviso, NivelAviso};
pub use cambio::CambioEstado;

/// Broadcast topic carrying order state-change events.
pub const TOPIC_ESTADO_PEDIDOS: &str = "/topic/estado-pedidos";

/// Command destination a client publishes state-change requests to.
pub const DEST_CAMBIAR_ESTADO: &str = "/app/cambiar-estado";

/// Frame kinds exchanged between a client and the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    /// Client registers interest in a topic
    Subscribe = 0,
    /// Client drops interest in a topic
    Unsubscribe = 1,
    /// Client publication to a command destination
    Publish = 2,
    /// Broker broadcast to every subscriber of a topic
    Message = 3,
}

impl TryFrom<u8> for FrameKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrameKind::Subscribe),
            1 => Ok(FrameKind::Unsubscribe),
            2 => Ok(FrameKind::Publish),
            3 => Ok(FrameKind::Message),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Subscribe => write!(f, "subscribe"),
            FrameKind::Unsubscribe => write!(f, "unsubscribe"),
            FrameKind::Publish => write!(f, "publish"),
            FrameKind::Message => write!(f, "message"),
        }
    }
}

/// Wire unit between a client and the broker.
///
/// `topic` is the broadcast topic for `Subscribe`/`Unsubscribe`/`Message`
/// frames and the command destination for `Publish` frames. Payloads are
/// opaque bytes at this level; the channel layer decodes them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub kind: FrameKind,
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn subscribe(topic: &str) -> Self {
        Self {
            kind: FrameKind::Subscribe,
            topic: topic.to_string(),
            payload: Vec::new(),
        }
    }

    pub fn unsubscribe(topic: &str) -> Self {
        Self {
            kind: FrameKind::Unsubscribe,
            topic: topic.to_string(),
            payload: Vec::new(),
        }
    }

    pub fn publish(destination: &str, payload: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Publish,
            topic: destination.to_string(),
            payload,
        }
    }

    pub fn message(topic: &str, payload: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Message,
            topic: topic.to_string(),
            payload,
        }
    }

    /// Parse the payload as JSON into the given type.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}
