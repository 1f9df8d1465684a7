//! Console flows over the channel
//!
//! End-to-end runs of the management facade: a cashier session against
//! the in-process broker loopback, and the connection supervisor
//! against a real TCP broker that goes away and comes back.

use async_trait::async_trait;
use chrono::Utc;
use pizzamia_client::transport::read_frame_from;
use pizzamia_client::{
    ChannelConfig, Endpoint, InProcessBroker, Notifier, PedidoEstadoChannel,
};
use pizzamia_console::{
    ColaPedidos, ConnectionSupervisor, GestionPedidos, LookupError, PedidoLookup, Sesion,
};
use shared::message::{Aviso, CambioEstado};
use shared::models::{Cliente, Empleado, Estado, EstadoPedido, Pedido, TipoEnvio, TipoPago};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Notice sink that records everything for assertions.
#[derive(Clone, Default)]
struct RecordingNotifier {
    avisos: Arc<std::sync::Mutex<Vec<Aviso>>>,
}

impl RecordingNotifier {
    fn avisos(&self) -> Vec<Aviso> {
        self.avisos.lock().unwrap().clone()
    }

    fn contiene(&self, fragmento: &str) -> bool {
        self.avisos().iter().any(|a| a.mensaje.contains(fragmento))
    }

    fn cuenta(&self, fragmento: &str) -> usize {
        self.avisos()
            .iter()
            .filter(|a| a.mensaje.contains(fragmento))
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, aviso: Aviso) {
        self.avisos.lock().unwrap().push(aviso);
    }
}

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

#[derive(Default)]
struct MemoriaLookup {
    por_id: HashMap<i64, Pedido>,
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
        Ok(self.por_id.values().cloned().collect())
    }
}

async fn esperar_cola(
    cola: &Arc<Mutex<ColaPedidos>>,
    descripcion: &str,
    condicion: impl Fn(&ColaPedidos) -> bool,
) {
    for _ in 0..100 {
        {
            let guard = cola.lock().await;
            if condicion(&guard) {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {descripcion}");
}

async fn esperar(descripcion: &str, condicion: impl Fn() -> bool) {
    for _ in 0..100 {
        if condicion() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {descripcion}");
}

#[tokio::test]
async fn test_flujo_cajero_sobre_broker_en_proceso() {
    let broker = InProcessBroker::spawn(catalogo());
    let notifier = RecordingNotifier::default();
    let canal =
        PedidoEstadoChannel::with_notifier(ChannelConfig::default(), Arc::new(notifier.clone()));
    assert!(canal.init(broker.endpoint()).await);

    let mut inicial = ColaPedidos::new(Some("CAJERO"), catalogo());
    inicial.cargar(vec![pedido(1001, Estado::new(1, "EN ESPERA"), "Ana", "Suarez")]);
    let cola = Arc::new(Mutex::new(inicial));

    let lookup = Arc::new(MemoriaLookup {
        por_id: HashMap::from([(
            2002,
            pedido(2002, Estado::new(4, "LISTO"), "Eva", "Luna"),
        )]),
    });

    let gestion = GestionPedidos::new(
        canal.clone(),
        cola.clone(),
        lookup,
        Arc::new(notifier.clone()),
        Sesion {
            rol: Some("CAJERO".to_string()),
            empleado_id: 7,
        },
    );
    let handle = gestion.start();

    // Cashier sends EN ESPERA -> EN COCINA; the queue moves optimistically
    assert!(gestion.solicitar_cambio(1001, 2).await);
    {
        let guard = cola.lock().await;
        assert_eq!(guard.estado_de(1001), Some("EN COCINA"));
    }

    // The broker's broadcast settles it: EN COCINA is outside the
    // cashier's view, so the order leaves the queue
    esperar_cola(&cola, "order to leave the view", |c| c.pedidos().is_empty()).await;

    // An order turning LISTO elsewhere enters the cashier's view; the
    // event carries no name, the catalog supplies it
    broker.publicar(&CambioEstado::solicitud(2002, 4, 9, None));
    esperar_cola(&cola, "new order at the head", |c| {
        c.pedidos().first().map(|p| p.id) == Some(2002)
    })
    .await;
    {
        let guard = cola.lock().await;
        assert_eq!(guard.estado_de(2002), Some("LISTO"));
    }
    esperar("new-order notice", || notifier.contiene("Nuevo pedido #2002")).await;
    let nuevo = notifier
        .avisos()
        .into_iter()
        .find(|a| a.mensaje.contains("Nuevo pedido #2002"))
        .unwrap();
    assert_eq!(nuevo.data.unwrap()["sonido"], true);

    // LISTO -> EN PREPARACION is not in the cashier's table
    assert!(!gestion.solicitar_cambio(2002, 3).await);
    assert!(notifier.contiene("El rol actual no permite pasar de LISTO a EN PREPARACION"));
    {
        let guard = cola.lock().await;
        assert_eq!(guard.estado_de(2002), Some("LISTO"));
    }

    handle.stop().await;
    canal.cleanup().await;
    broker.stop().await;
}

/// Broker fixture that accepts one connection and discards its frames.
struct BrokerTcp {
    addr: String,
    task: JoinHandle<()>,
}

impl BrokerTcp {
    async fn arrancar() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self::sobre(listener)
    }

    async fn arrancar_en(puerto: u16) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", puerto)).await.unwrap();
        Self::sobre(listener)
    }

    fn sobre(listener: TcpListener) -> Self {
        let addr = listener.local_addr().unwrap().to_string();
        let task = tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            // Keep the write half open so the client only sees EOF when
            // the fixture stops
            let (mut lectura, _escritura) = stream.into_split();
            while read_frame_from(&mut lectura).await.is_ok() {}
        });
        Self { addr, task }
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::Tcp(self.addr.clone())
    }

    fn puerto(&self) -> u16 {
        self.addr.rsplit_once(':').unwrap().1.parse().unwrap()
    }

    fn detener(self) {
        self.task.abort();
    }
}

#[tokio::test]
async fn test_supervisor_reconecta_por_tcp() {
    let broker = BrokerTcp::arrancar().await;
    let puerto = broker.puerto();

    let notifier = RecordingNotifier::default();
    let canal =
        PedidoEstadoChannel::with_notifier(ChannelConfig::default(), Arc::new(notifier.clone()));
    assert!(canal.init(broker.endpoint()).await);

    let supervisor = ConnectionSupervisor::new(canal.clone(), Arc::new(notifier.clone()))
        .with_interval(Duration::from_millis(30))
        .spawn();

    // Broker goes away: exactly one lost notice however many probes fail
    broker.detener();
    esperar("lost notice", || {
        notifier.contiene("Conexión con el servidor perdida")
    })
    .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(notifier.cuenta("Conexión con el servidor perdida"), 1);

    // Broker back on the same port: one restored notice, link up
    let broker = BrokerTcp::arrancar_en(puerto).await;
    esperar("restored notice", || {
        notifier.contiene("Conexión con el servidor restablecida")
    })
    .await;
    esperar("link up", || canal.is_connected()).await;
    assert_eq!(notifier.cuenta("Conexión con el servidor restablecida"), 1);

    supervisor.stop().await;
    canal.cleanup().await;
    broker.detener();
}
