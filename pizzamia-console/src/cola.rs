//! Local order queue and reconciliation
//!
//! [`ColaPedidos`] holds the orders one operator session is looking at
//! and merges every accepted state-change event into it: update in
//! place, drop what left the role's view, fetch what entered it, or
//! reload the whole collection when the active state filter matches.
//! It also applies the management screen's in-memory filters.

use crate::lookup::{LookupError, PedidoLookup};
use shared::message::CambioEstado;
use shared::models::{Estado, EstadoPedido, Pedido, Rol};

/// Outcome of merging one state-change event into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliacion {
    /// Order present: state updated in place
    Actualizado,
    /// Order present but its new state left the role's view
    Removido,
    /// Order fetched by id and prepended
    Insertado,
    /// Active state filter matched: collection reloaded
    RecargaCompleta,
    /// Event not relevant for this session
    Ignorado,
}

/// Order queue of one operator session.
pub struct ColaPedidos {
    pedidos: Vec<Pedido>,
    rol: Option<Rol>,
    filtro_estado: Option<String>,
    busqueda: String,
    cantidad: usize,
    estados: Vec<Estado>,
}

impl ColaPedidos {
    /// Create an empty queue for a session role and a state catalog.
    pub fn new(rol: Option<&str>, estados: Vec<Estado>) -> Self {
        Self {
            pedidos: Vec::new(),
            rol: rol.and_then(Rol::from_nombre),
            filtro_estado: None,
            busqueda: String::new(),
            cantidad: 10,
            estados,
        }
    }

    /// Replace the collection, e.g. after the initial page load.
    pub fn cargar(&mut self, pedidos: Vec<Pedido>) {
        self.pedidos = pedidos;
    }

    pub fn pedidos(&self) -> &[Pedido] {
        &self.pedidos
    }

    pub fn rol(&self) -> Option<Rol> {
        self.rol
    }

    pub fn estados(&self) -> &[Estado] {
        &self.estados
    }

    /// Catalog entry by id.
    pub fn estado_por_id(&self, id: i64) -> Option<&Estado> {
        self.estados.iter().find(|e| e.id == id)
    }

    /// Current state name of an order in the queue.
    pub fn estado_de(&self, pedido_id: i64) -> Option<&str> {
        self.pedidos
            .iter()
            .find(|p| p.id == pedido_id)
            .map(|p| p.estado_nombre())
    }

    pub fn set_filtro_estado(&mut self, filtro: Option<String>) {
        self.filtro_estado = filtro;
    }

    pub fn set_busqueda(&mut self, busqueda: impl Into<String>) {
        self.busqueda = busqueda.into();
    }

    pub fn set_cantidad(&mut self, cantidad: usize) {
        self.cantidad = cantidad;
    }

    /// Merge one accepted state change into the queue.
    ///
    /// A state the catalog cannot name is ignored. For an order already
    /// in the queue the state is rewritten; if the new state left a
    /// restricted role's view the order goes away, while administrators
    /// keep every order they hold. For an absent order a matching state
    /// filter reloads the whole collection; otherwise, if the new state
    /// sits in the role's visible set, the order is fetched and
    /// prepended.
    pub async fn reconciliar(
        &mut self,
        cambio: &CambioEstado,
        lookup: &dyn PedidoLookup,
    ) -> Result<Reconciliacion, LookupError> {
        let Some(nombre) = self.resolver_nombre(cambio) else {
            tracing::warn!(
                pedido = cambio.pedido_id,
                estado = cambio.nuevo_estado_id,
                "State id not in catalog; event ignored"
            );
            return Ok(Reconciliacion::Ignorado);
        };

        let visible = self.visible_para_rol(&nombre);
        let es_admin = self.rol == Some(Rol::Administrador);

        if let Some(idx) = self.pedidos.iter().position(|p| p.id == cambio.pedido_id) {
            self.pedidos[idx].actualizar_estado(cambio.nuevo_estado_id, &nombre);
            // Only restricted roles lose orders that leave their view
            if !es_admin && !visible {
                self.pedidos.remove(idx);
                return Ok(Reconciliacion::Removido);
            }
            return Ok(Reconciliacion::Actualizado);
        }

        // A matching state filter wins over the incremental insert
        if self
            .filtro_estado
            .as_deref()
            .is_some_and(|filtro| filtro.eq_ignore_ascii_case(&nombre))
        {
            self.pedidos = lookup.listar_pedidos().await?;
            return Ok(Reconciliacion::RecargaCompleta);
        }

        if visible {
            let pedido = lookup.buscar_pedido(cambio.pedido_id).await?;
            self.pedidos.insert(0, pedido);
            return Ok(Reconciliacion::Insertado);
        }

        Ok(Reconciliacion::Ignorado)
    }

    /// Optimistically set an order's state ahead of broker confirmation.
    pub fn aplicar_optimista(&mut self, pedido_id: i64, estado: &Estado) -> bool {
        match self.pedidos.iter_mut().find(|p| p.id == pedido_id) {
            Some(pedido) => {
                pedido.actualizar_estado(estado.id, &estado.denominacion);
                true
            }
            None => false,
        }
    }

    /// Queue view after state filter, free-text search and page size.
    ///
    /// Search matches the order id as text and the customer's name or
    /// surname, case-insensitively.
    pub fn pedidos_filtrados(&self) -> Vec<&Pedido> {
        let busqueda = self.busqueda.trim().to_lowercase();
        self.pedidos
            .iter()
            .filter(|p| match self.filtro_estado.as_deref() {
                Some(filtro) => p.estado_nombre().eq_ignore_ascii_case(filtro),
                None => true,
            })
            .filter(|p| {
                if busqueda.is_empty() {
                    return true;
                }
                p.id.to_string().contains(&busqueda)
                    || p.cliente.nombre.to_lowercase().contains(&busqueda)
                    || p.cliente.apellido.to_lowercase().contains(&busqueda)
            })
            .take(self.cantidad)
            .collect()
    }

    /// State name from the event, else from the catalog by id.
    fn resolver_nombre(&self, cambio: &CambioEstado) -> Option<String> {
        if let Some(nombre) = &cambio.nuevo_estado_nombre {
            return Some(nombre.clone());
        }
        self.estados
            .iter()
            .find(|e| e.id == cambio.nuevo_estado_id)
            .map(|e| e.denominacion.clone())
    }

    /// Fail-closed visibility against the role's state table: no role
    /// and unknown states are not visible.
    fn visible_para_rol(&self, nombre: &str) -> bool {
        let Some(rol) = self.rol else {
            return false;
        };
        match EstadoPedido::from_denominacion(nombre) {
            Some(estado) => rol.puede_ver(estado),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use shared::models::{Cliente, Empleado, TipoEnvio, TipoPago};
    use std::collections::HashMap;

    fn catalogo() -> Vec<Estado> {
        EstadoPedido::TODOS
            .iter()
            .enumerate()
            .map(|(i, estado)| Estado::new(i as i64 + 1, estado.denominacion()))
            .collect()
    }

    fn pedido(id: i64, estado: Estado, nombre: &str, apellido: &str) -> Pedido {
        Pedido {
            id,
            hora_estimada_finalizacion: Utc::now(),
            total: Some(2500.0),
            total_costo: Some(1500.0),
            estado,
            tipo_envio: TipoEnvio::Local,
            tipo_pago: TipoPago::Efectivo,
            detalles: Vec::new(),
            cliente: Cliente {
                id,
                nombre: nombre.to_string(),
                apellido: apellido.to_string(),
                email: format!("{}@mail.com", nombre.to_lowercase()),
            },
            empleado: Empleado {
                id: 7,
                nombre: "Luis".to_string(),
                apellido: "Paz".to_string(),
            },
        }
    }

    /// In-memory lookup double.
    #[derive(Default)]
    struct MemoriaLookup {
        por_id: HashMap<i64, Pedido>,
        listado: Vec<Pedido>,
    }

    #[async_trait]
    impl PedidoLookup for MemoriaLookup {
        async fn buscar_pedido(&self, id: i64) -> Result<Pedido, LookupError> {
            self.por_id
                .get(&id)
                .cloned()
                .ok_or(LookupError::NoEncontrado(id))
        }

        async fn listar_pedidos(&self) -> Result<Vec<Pedido>, LookupError> {
            Ok(self.listado.clone())
        }
    }

    fn evento(pedido_id: i64, estado_id: i64, nombre: &str) -> CambioEstado {
        CambioEstado::solicitud(pedido_id, estado_id, 7, None).con_nombre(nombre)
    }

    #[tokio::test]
    async fn test_actualiza_pedido_presente() {
        let mut cola = ColaPedidos::new(Some("ADMINISTRADOR"), catalogo());
        cola.cargar(vec![pedido(1001, Estado::new(2, "EN COCINA"), "Ana", "Suarez")]);
        let lookup = MemoriaLookup::default();

        let resultado = cola
            .reconciliar(&evento(1001, 4, "LISTO"), &lookup)
            .await
            .unwrap();

        assert_eq!(resultado, Reconciliacion::Actualizado);
        assert_eq!(cola.estado_de(1001), Some("LISTO"));
    }

    #[tokio::test]
    async fn test_cocinero_pierde_el_pedido_que_termina() {
        let mut cola = ColaPedidos::new(Some("COCINERO"), catalogo());
        cola.cargar(vec![pedido(
            1001,
            Estado::new(3, "EN PREPARACION"),
            "Ana",
            "Suarez",
        )]);
        let lookup = MemoriaLookup::default();

        let resultado = cola
            .reconciliar(&evento(1001, 4, "LISTO"), &lookup)
            .await
            .unwrap();

        assert_eq!(resultado, Reconciliacion::Removido);
        assert!(cola.pedidos().is_empty());
    }

    #[tokio::test]
    async fn test_cajero_recibe_pedido_nuevo_al_frente() {
        let mut cola = ColaPedidos::new(Some("CAJERO"), catalogo());
        cola.cargar(vec![pedido(900, Estado::new(1, "EN ESPERA"), "Juan", "Gomez")]);
        let lookup = MemoriaLookup {
            por_id: HashMap::from([(
                1001,
                pedido(1001, Estado::new(4, "LISTO"), "Ana", "Suarez"),
            )]),
            listado: Vec::new(),
        };

        let resultado = cola
            .reconciliar(&evento(1001, 4, "LISTO"), &lookup)
            .await
            .unwrap();

        assert_eq!(resultado, Reconciliacion::Insertado);
        assert_eq!(cola.pedidos().len(), 2);
        assert_eq!(cola.pedidos()[0].id, 1001);
        assert_eq!(cola.pedidos()[1].id, 900);
    }

    #[tokio::test]
    async fn test_filtro_activo_recarga_la_coleccion() {
        let mut cola = ColaPedidos::new(Some("CAJERO"), catalogo());
        cola.set_filtro_estado(Some("LISTO".to_string()));
        let lookup = MemoriaLookup {
            por_id: HashMap::from([(
                1001,
                pedido(1001, Estado::new(4, "LISTO"), "Ana", "Suarez"),
            )]),
            listado: vec![
                pedido(1001, Estado::new(4, "LISTO"), "Ana", "Suarez"),
                pedido(1002, Estado::new(4, "LISTO"), "Eva", "Luna"),
            ],
        };

        // The reload replaces the collection; no single fetch happens
        let resultado = cola
            .reconciliar(&evento(1001, 4, "LISTO"), &lookup)
            .await
            .unwrap();

        assert_eq!(resultado, Reconciliacion::RecargaCompleta);
        assert_eq!(cola.pedidos().len(), 2);
    }

    #[tokio::test]
    async fn test_evento_fuera_de_vista_se_ignora() {
        let mut cola = ColaPedidos::new(Some("DELIVERY"), catalogo());
        let lookup = MemoriaLookup::default();

        let resultado = cola
            .reconciliar(&evento(1001, 2, "EN COCINA"), &lookup)
            .await
            .unwrap();

        assert_eq!(resultado, Reconciliacion::Ignorado);
        assert!(cola.pedidos().is_empty());
    }

    #[tokio::test]
    async fn test_nombre_resuelto_desde_el_catalogo() {
        let mut cola = ColaPedidos::new(Some("CAJERO"), catalogo());
        let lookup = MemoriaLookup {
            por_id: HashMap::from([(
                1001,
                pedido(1001, Estado::new(4, "LISTO"), "Ana", "Suarez"),
            )]),
            listado: Vec::new(),
        };

        // Event without a name; id 4 resolves to LISTO via the catalog
        let sin_nombre = CambioEstado::solicitud(1001, 4, 7, None);
        let resultado = cola.reconciliar(&sin_nombre, &lookup).await.unwrap();

        assert_eq!(resultado, Reconciliacion::Insertado);
        assert_eq!(cola.pedidos()[0].estado_nombre(), "LISTO");
    }

    #[tokio::test]
    async fn test_estado_desconocido_se_ignora() {
        let mut cola = ColaPedidos::new(Some("ADMINISTRADOR"), catalogo());
        cola.cargar(vec![pedido(1001, Estado::new(1, "EN ESPERA"), "Ana", "Suarez")]);
        let lookup = MemoriaLookup::default();

        let sin_nombre = CambioEstado::solicitud(1001, 99, 7, None);
        let resultado = cola.reconciliar(&sin_nombre, &lookup).await.unwrap();

        assert_eq!(resultado, Reconciliacion::Ignorado);
        assert_eq!(cola.estado_de(1001), Some("EN ESPERA"));
    }

    #[tokio::test]
    async fn test_admin_no_inserta_pedido_cancelado() {
        let mut cola = ColaPedidos::new(Some("ADMINISTRADOR"), catalogo());
        let lookup = MemoriaLookup {
            por_id: HashMap::from([(
                3001,
                pedido(3001, Estado::new(8, "CANCELADO"), "Ana", "Suarez"),
            )]),
            listado: Vec::new(),
        };

        // CANCELADO sits outside the admin view table; nothing is fetched
        let resultado = cola
            .reconciliar(&evento(3001, 8, "CANCELADO"), &lookup)
            .await
            .unwrap();

        assert_eq!(resultado, Reconciliacion::Ignorado);
        assert!(cola.pedidos().is_empty());
    }

    #[tokio::test]
    async fn test_admin_no_inserta_estado_fuera_del_pipeline() {
        let mut cola = ColaPedidos::new(Some("ADMINISTRADOR"), catalogo());
        let lookup = MemoriaLookup {
            por_id: HashMap::from([(3002, pedido(3002, Estado::new(4, "LISTO"), "Eva", "Luna"))]),
            listado: Vec::new(),
        };

        let resultado = cola
            .reconciliar(&evento(3002, 4, "MISTERIO"), &lookup)
            .await
            .unwrap();

        assert_eq!(resultado, Reconciliacion::Ignorado);
        assert!(cola.pedidos().is_empty());
    }

    #[tokio::test]
    async fn test_admin_conserva_el_pedido_cancelado() {
        let mut cola = ColaPedidos::new(Some("ADMINISTRADOR"), catalogo());
        cola.cargar(vec![pedido(1001, Estado::new(1, "EN ESPERA"), "Ana", "Suarez")]);
        let lookup = MemoriaLookup::default();

        let resultado = cola
            .reconciliar(&evento(1001, 8, "CANCELADO"), &lookup)
            .await
            .unwrap();

        assert_eq!(resultado, Reconciliacion::Actualizado);
        assert_eq!(cola.estado_de(1001), Some("CANCELADO"));
    }

    #[test]
    fn test_aplicar_optimista() {
        let mut cola = ColaPedidos::new(Some("CAJERO"), catalogo());
        cola.cargar(vec![pedido(1001, Estado::new(1, "EN ESPERA"), "Ana", "Suarez")]);

        assert!(cola.aplicar_optimista(1001, &Estado::new(2, "EN COCINA")));
        assert_eq!(cola.estado_de(1001), Some("EN COCINA"));

        assert!(!cola.aplicar_optimista(9999, &Estado::new(2, "EN COCINA")));
    }

    #[test]
    fn test_pedidos_filtrados() {
        let mut cola = ColaPedidos::new(Some("ADMINISTRADOR"), catalogo());
        cola.cargar(vec![
            pedido(1001, Estado::new(4, "LISTO"), "Ana", "Suarez"),
            pedido(1002, Estado::new(1, "EN ESPERA"), "Eva", "Luna"),
            pedido(1003, Estado::new(4, "LISTO"), "Juan", "Gomez"),
        ]);

        cola.set_filtro_estado(Some("LISTO".to_string()));
        let listos: Vec<i64> = cola.pedidos_filtrados().iter().map(|p| p.id).collect();
        assert_eq!(listos, [1001, 1003]);

        cola.set_filtro_estado(None);
        cola.set_busqueda("luna");
        let por_apellido: Vec<i64> = cola.pedidos_filtrados().iter().map(|p| p.id).collect();
        assert_eq!(por_apellido, [1002]);

        cola.set_busqueda("100");
        cola.set_cantidad(2);
        let truncados = cola.pedidos_filtrados();
        assert_eq!(truncados.len(), 2);
    }
}
