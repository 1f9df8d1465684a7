use async_trait::async_trait;
use rustls::ClientConfig;
use rustls_pki_types::ServerName;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, broadcast};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::error::{TransportError, TransportResult};
use shared::message::{Frame, FrameKind};

/// Upper bound on the topic field of a frame
pub const MAX_TOPIC_LEN: usize = 1024;

/// Upper bound on the payload field of a frame (1 MiB)
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

/// Transport abstraction for broker communication
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn read_frame(&self) -> TransportResult<Frame>;
    async fn write_frame(&self, frame: &Frame) -> TransportResult<()>;
    async fn close(&self) -> TransportResult<()>;
}

/// Encode a frame into its wire form.
///
/// Layout: kind (1 byte), topic length (2 bytes LE), topic bytes,
/// payload length (4 bytes LE), payload bytes.
pub fn encode_frame(frame: &Frame) -> TransportResult<Vec<u8>> {
    if frame.topic.len() > MAX_TOPIC_LEN {
        return Err(TransportError::InvalidFrame(format!(
            "topic exceeds {} bytes",
            MAX_TOPIC_LEN
        )));
    }
    if frame.payload.len() > MAX_PAYLOAD_LEN {
        return Err(TransportError::InvalidFrame(format!(
            "payload exceeds {} bytes",
            MAX_PAYLOAD_LEN
        )));
    }

    let mut data = Vec::with_capacity(1 + 2 + frame.topic.len() + 4 + frame.payload.len());
    data.push(frame.kind as u8);
    data.extend_from_slice(&(frame.topic.len() as u16).to_le_bytes());
    data.extend_from_slice(frame.topic.as_bytes());
    data.extend_from_slice(&(frame.payload.len() as u32).to_le_bytes());
    data.extend_from_slice(&frame.payload);
    Ok(data)
}

/// Read one frame from an async reader.
pub async fn read_frame_from<R>(reader: &mut R) -> TransportResult<Frame>
where
    R: AsyncRead + Unpin,
{
    // Read frame kind (1 byte)
    let mut kind_buf = [0u8; 1];
    reader.read_exact(&mut kind_buf).await?;

    let kind = FrameKind::try_from(kind_buf[0])
        .map_err(|_| TransportError::InvalidFrame(format!("unknown frame kind {}", kind_buf[0])))?;

    // Read topic length (2 bytes LE)
    let mut topic_len_buf = [0u8; 2];
    reader.read_exact(&mut topic_len_buf).await?;
    let topic_len = u16::from_le_bytes(topic_len_buf) as usize;
    if topic_len > MAX_TOPIC_LEN {
        return Err(TransportError::InvalidFrame(format!(
            "topic exceeds {} bytes",
            MAX_TOPIC_LEN
        )));
    }

    // Read topic
    let mut topic_buf = vec![0u8; topic_len];
    reader.read_exact(&mut topic_buf).await?;
    let topic = String::from_utf8(topic_buf)
        .map_err(|e| TransportError::InvalidFrame(format!("topic is not utf-8: {}", e)))?;

    // Read payload length (4 bytes LE)
    let mut payload_len_buf = [0u8; 4];
    reader.read_exact(&mut payload_len_buf).await?;
    let payload_len = u32::from_le_bytes(payload_len_buf) as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(TransportError::InvalidFrame(format!(
            "payload exceeds {} bytes",
            MAX_PAYLOAD_LEN
        )));
    }

    // Read payload
    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await?;

    Ok(Frame {
        kind,
        topic,
        payload,
    })
}

/// Write one frame to an async writer.
pub async fn write_frame_to<W>(writer: &mut W, frame: &Frame) -> TransportResult<()>
where
    W: AsyncWrite + Unpin,
{
    let data = encode_frame(frame)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// TCP Transport Implementation
#[derive(Debug, Clone)]
pub struct TcpTransport {
    reader: Arc<Mutex<OwnedReadHalf>>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl TcpTransport {
    pub async fn connect(addr: &str) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read_frame(&self) -> TransportResult<Frame> {
        let mut reader = self.reader.lock().await;
        read_frame_from(&mut *reader).await
    }

    async fn write_frame(&self, frame: &Frame) -> TransportResult<()> {
        let mut writer = self.writer.lock().await;
        write_frame_to(&mut *writer, frame).await
    }

    async fn close(&self) -> TransportResult<()> {
        // Dropping the Arc references will eventually close the stream
        Ok(())
    }
}

/// TLS Transport Implementation
#[derive(Debug, Clone)]
pub struct TlsTransport {
    reader: Arc<Mutex<tokio::io::ReadHalf<TlsStream<TcpStream>>>>,
    writer: Arc<Mutex<tokio::io::WriteHalf<TlsStream<TcpStream>>>>,
}

impl TlsTransport {
    pub async fn connect(addr: &str, domain: &str) -> TransportResult<Self> {
        let connector = TlsConnector::from(Arc::new(tls_config()));
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let domain = ServerName::try_from(domain)
            .map_err(|e| TransportError::Connection(format!("Invalid domain: {}", e)))?
            .to_owned();

        let stream = connector
            .connect(domain, stream)
            .await
            .map_err(|e| TransportError::Connection(format!("TLS handshake failed: {}", e)))?;

        let (reader, writer) = tokio::io::split(stream);

        Ok(Self {
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
        })
    }
}

/// Client TLS config trusting the webpki root set.
fn tls_config() -> ClientConfig {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

#[async_trait]
impl Transport for TlsTransport {
    async fn read_frame(&self) -> TransportResult<Frame> {
        let mut reader = self.reader.lock().await;
        read_frame_from(&mut *reader).await
    }

    async fn write_frame(&self, frame: &Frame) -> TransportResult<()> {
        let mut writer = self.writer.lock().await;
        write_frame_to(&mut *writer, frame).await
    }

    async fn close(&self) -> TransportResult<()> {
        Ok(())
    }
}

/// Memory Transport Implementation (for In-Process communication)
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    /// Receiver for frames FROM the broker (broadcasts)
    rx: Arc<Mutex<broadcast::Receiver<Frame>>>,
    /// Sender for frames TO the broker
    tx: broadcast::Sender<Frame>,
}

impl MemoryTransport {
    /// Create a new memory transport
    ///
    /// # Arguments
    /// * `from_broker` - The broker's broadcast sender (to subscribe to updates)
    /// * `to_broker` - The channel to send frames TO the broker
    pub fn new(from_broker: &broadcast::Sender<Frame>, to_broker: &broadcast::Sender<Frame>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(from_broker.subscribe())),
            tx: to_broker.clone(),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_frame(&self) -> TransportResult<Frame> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .map_err(|e| TransportError::Connection(format!("Memory channel error: {}", e)))
    }

    async fn write_frame(&self, frame: &Frame) -> TransportResult<()> {
        self.tx
            .send(frame.clone())
            .map_err(|e| TransportError::Connection(format!("Failed to send to broker: {}", e)))?;
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::message::DEST_CAMBIAR_ESTADO;

    #[tokio::test]
    async fn test_codec_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let frame = Frame::publish(DEST_CAMBIAR_ESTADO, br#"{"pedidoId":7}"#.to_vec());

        write_frame_to(&mut client, &frame).await.unwrap();
        let leido = read_frame_from(&mut server).await.unwrap();

        assert_eq!(leido, frame);
    }

    #[tokio::test]
    async fn test_codec_rechaza_kind_desconocido() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[9u8]).await.unwrap();
        client.write_all(&0u16.to_le_bytes()).await.unwrap();
        client.write_all(&0u32.to_le_bytes()).await.unwrap();

        let err = read_frame_from(&mut server).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidFrame(_)));
    }

    #[test]
    fn test_encode_limita_topic() {
        let topic = "x".repeat(MAX_TOPIC_LEN + 1);
        let frame = Frame::subscribe(&topic);
        assert!(matches!(
            encode_frame(&frame),
            Err(TransportError::InvalidFrame(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_transport_ida_y_vuelta() {
        let (to_broker, mut broker_rx) = broadcast::channel(8);
        let (from_broker, _) = broadcast::channel(8);
        let transport = MemoryTransport::new(&from_broker, &to_broker);

        let solicitud = Frame::subscribe("/topic/estado-pedidos");
        transport.write_frame(&solicitud).await.unwrap();
        assert_eq!(broker_rx.recv().await.unwrap(), solicitud);

        let difusion = Frame::message("/topic/estado-pedidos", b"{}".to_vec());
        from_broker.send(difusion.clone()).unwrap();
        assert_eq!(transport.read_frame().await.unwrap(), difusion);
    }
}
