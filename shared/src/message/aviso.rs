//! User-facing notices
//!
//! The synchronization layer never renders UI; it emits these payloads
//! through a notifier sink and the console decides how to show them
//! (toast, status bar, log).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Notice severity, matching the toast kinds of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NivelAviso {
    Info,
    Exito,
    Advertencia,
    Error,
}

impl fmt::Display for NivelAviso {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NivelAviso::Info => write!(f, "info"),
            NivelAviso::Exito => write!(f, "exito"),
            NivelAviso::Advertencia => write!(f, "advertencia"),
            NivelAviso::Error => write!(f, "error"),
        }
    }
}

/// Notice category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoriaAviso {
    /// Service lifecycle
    Sistema,
    /// Connectivity
    Red,
    /// Orders and transitions
    Negocio,
}

impl fmt::Display for CategoriaAviso {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoriaAviso::Sistema => write!(f, "sistema"),
            CategoriaAviso::Red => write!(f, "red"),
            CategoriaAviso::Negocio => write!(f, "negocio"),
        }
    }
}

/// Notice payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aviso {
    pub titulo: String,
    pub mensaje: String,
    pub nivel: NivelAviso,
    pub categoria: CategoriaAviso,
    /// Extra hints for the renderer, e.g. `{"sonido": true}`.
    pub data: Option<serde_json::Value>,
}

impl Aviso {
    pub fn info(titulo: impl Into<String>, mensaje: impl Into<String>) -> Self {
        Self {
            titulo: titulo.into(),
            mensaje: mensaje.into(),
            nivel: NivelAviso::Info,
            categoria: CategoriaAviso::Sistema,
            data: None,
        }
    }

    pub fn exito(titulo: impl Into<String>, mensaje: impl Into<String>) -> Self {
        Self {
            titulo: titulo.into(),
            mensaje: mensaje.into(),
            nivel: NivelAviso::Exito,
            categoria: CategoriaAviso::Negocio,
            data: None,
        }
    }

    pub fn advertencia(titulo: impl Into<String>, mensaje: impl Into<String>) -> Self {
        Self {
            titulo: titulo.into(),
            mensaje: mensaje.into(),
            nivel: NivelAviso::Advertencia,
            categoria: CategoriaAviso::Sistema,
            data: None,
        }
    }

    pub fn error(titulo: impl Into<String>, mensaje: impl Into<String>) -> Self {
        Self {
            titulo: titulo.into(),
            mensaje: mensaje.into(),
            nivel: NivelAviso::Error,
            categoria: CategoriaAviso::Sistema,
            data: None,
        }
    }

    pub fn con_categoria(mut self, categoria: CategoriaAviso) -> Self {
        self.categoria = categoria;
        self
    }

    pub fn con_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
