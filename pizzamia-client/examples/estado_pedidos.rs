//! End-to-end order-status flow over the in-process broker
//!
//! Starts the loopback broker, opens a channel, registers a listener
//! and walks an order through the role policy and a server rejection.
//!
//! Run: cargo run --example estado_pedidos --features in-process

use pizzamia_client::{ChannelConfig, EventoEstado, InProcessBroker, PedidoEstadoChannel};
use shared::models::{Estado, EstadoPedido};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // State catalog as the backend would serve it
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

    let escucha = canal.on_state_change(|evento| match evento {
        EventoEstado::Cambio(cambio) => println!(
            "  -> pedido #{} ahora en {}",
            cambio.pedido_id,
            cambio.nuevo_estado_nombre.as_deref().unwrap_or("?")
        ),
        EventoEstado::Crudo(bytes) => {
            println!("  -> difusión sin decodificar ({} bytes)", bytes.len())
        }
    });

    // 2. Role policy, answered locally
    println!(
        "CAJERO puede EN ESPERA -> EN COCINA: {}",
        canal.puede_realizar_cambio("EN ESPERA", "EN COCINA", Some("CAJERO"))
    );
    let disponibles = canal.estados_disponibles("LISTO", Some("CAJERO"), &catalogo);
    println!(
        "CAJERO desde LISTO: {:?}",
        disponibles
            .iter()
            .map(|e| e.denominacion.as_str())
            .collect::<Vec<_>>()
    );
    println!("COCINERO ve: {:?}", canal.estados_visibles(Some("COCINERO")));

    // 3. Request a change; the broker enriches it and broadcasts it back
    canal.cambiar_estado(1001, 2, 7, Some(1)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // 4. A rejection reaches the operator as an error notice
    broker.rechazar(1002, "El pedido ya fue facturado");
    tokio::time::sleep(Duration::from_millis(100)).await;

    escucha.unsubscribe();
    canal.cleanup().await;
    broker.stop().await;
    Ok(())
}
