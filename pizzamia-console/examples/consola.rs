//! Cashier console session over the in-process broker
//!
//! Assembles a full session the way the composition root does: broker,
//! channel, order queue, lookup, management facade and supervisor, then
//! drives an order through the cashier's view.
//!
//! Run: cargo run -p pizzamia-console --example consola

use async_trait::async_trait;
use chrono::Utc;
use pizzamia_client::{ChannelConfig, InProcessBroker, PedidoEstadoChannel, TracingNotifier};
use pizzamia_console::{ColaPedidos, GestionPedidos, LookupError, PedidoLookup, Sesion};
use shared::message::CambioEstado;
use shared::models::{Cliente, Empleado, Estado, EstadoPedido, Pedido, TipoEnvio, TipoPago};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

fn pedido_demo(id: i64, estado: Estado) -> Pedido {
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
            nombre: "Ana".to_string(),
            apellido: "Suarez".to_string(),
            email: "ana@mail.com".to_string(),
        },
        empleado: Empleado {
            id: 7,
            nombre: "Luis".to_string(),
            apellido: "Paz".to_string(),
        },
    }
}

/// Stand-in for the REST client of the deployed console.
struct DemoLookup;

#[async_trait]
impl PedidoLookup for DemoLookup {
    async fn buscar_pedido(&self, id: i64) -> Result<Pedido, LookupError> {
        Ok(pedido_demo(id, Estado::new(4, "LISTO")))
    }

    async fn listar_pedidos(&self) -> Result<Vec<Pedido>, LookupError> {
        Ok(vec![pedido_demo(1001, Estado::new(1, "EN ESPERA"))])
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let catalogo: Vec<Estado> = EstadoPedido::TODOS
        .iter()
        .enumerate()
        .map(|(i, estado)| Estado::new(i as i64 + 1, estado.denominacion()))
        .collect();

    // 1. Broker and channel
    let broker = InProcessBroker::spawn(catalogo.clone());
    let canal = PedidoEstadoChannel::new(ChannelConfig::default());
    if !canal.init(broker.endpoint()).await {
        return Err("channel init failed".into());
    }

    // 2. Queue for a cashier session, loaded through the lookup seam
    let lookup = Arc::new(DemoLookup);
    let mut inicial = ColaPedidos::new(Some("CAJERO"), catalogo);
    inicial.cargar(lookup.listar_pedidos().await?);
    let cola = Arc::new(Mutex::new(inicial));

    // 3. Management facade with its supervisor
    let gestion = GestionPedidos::new(
        canal.clone(),
        cola.clone(),
        lookup,
        Arc::new(TracingNotifier),
        Sesion {
            rol: Some("CAJERO".to_string()),
            empleado_id: 7,
        },
    );
    let handle = gestion.start();

    // 4. Send EN ESPERA -> EN COCINA; the broadcast drops the order from
    // the cashier's view
    println!("cambio aceptado: {}", gestion.solicitar_cambio(1001, 2).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("pedidos en la vista: {}", cola.lock().await.pedidos().len());

    // 5. An order turns LISTO elsewhere and enters the view
    broker.publicar(&CambioEstado::solicitud(2002, 4, 9, None));
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Some(primero) = cola.lock().await.pedidos().first() {
        println!("al frente: #{} en {}", primero.id, primero.estado_nombre());
    }

    // 6. The cashier cannot push it into the kitchen
    println!("cambio denegado: {}", !gestion.solicitar_cambio(2002, 3).await);

    handle.stop().await;
    canal.cleanup().await;
    broker.stop().await;
    Ok(())
}
