use crate::config::{ConfigError, DeliveryTarget, Transport};
use crate::tls::TlsConfig;
use async_trait::async_trait;
use rustls::pki_types::ServerName;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio_rustls::TlsConnector;

/// A live, exclusively owned connection to the collector.
#[async_trait]
pub trait Connection: Send {
    /// Write the whole payload as one unit.
    async fn write(&mut self, payload: &[u8]) -> io::Result<()>;

    /// Close the connection in an orderly way.
    async fn close(&mut self) -> io::Result<()>;
}

/// Opens fresh connections to a fixed destination.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self) -> io::Result<Box<dyn Connection>>;
}

struct StreamConnection<S> {
    stream: S,
}

#[async_trait]
impl<S> Connection for StreamConnection<S>
where
    S: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, payload: &[u8]) -> io::Result<()> {
        self.stream.write_all(payload).await?;
        self.stream.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

struct DatagramConnection {
    socket: UdpSocket,
}

#[async_trait]
impl Connection for DatagramConnection {
    async fn write(&mut self, payload: &[u8]) -> io::Result<()> {
        let sent = self.socket.send(payload).await?;
        if sent != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("datagram truncated: sent {sent} of {} bytes", payload.len()),
            ));
        }
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct TlsDial {
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

/// Dials the resolved [`DeliveryTarget`] over TLS/TCP, plain TCP or UDP.
pub struct NetDialer {
    target: DeliveryTarget,
    tls: Option<TlsDial>,
}

impl NetDialer {
    /// Prepare a dialer. For encrypted targets the TLS connector is built
    /// here, loading the platform trust store when no custom roots were
    /// supplied.
    pub fn new(target: DeliveryTarget) -> Result<Self, ConfigError> {
        let tls = if target.is_encrypted() {
            let config = match target.tls_config() {
                Some(config) => config.clone(),
                None => TlsConfig::native_roots()?,
            };
            let server_name = ServerName::try_from(target.host().to_string()).map_err(|e| {
                ConfigError::Tls(format!("invalid server name {:?}: {e}", target.host()))
            })?;
            Some(TlsDial {
                connector: config.connector(),
                server_name,
            })
        } else {
            None
        };
        Ok(Self { target, tls })
    }

    pub fn target(&self) -> &DeliveryTarget {
        &self.target
    }

    async fn dial_udp(&self) -> io::Result<UdpSocket> {
        let peer = tokio::net::lookup_host(self.target.address())
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no address found for {}", self.target.address()),
                )
            })?;
        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;
        Ok(socket)
    }
}

#[async_trait]
impl Dialer for NetDialer {
    async fn dial(&self) -> io::Result<Box<dyn Connection>> {
        match self.target.transport() {
            Transport::Udp => {
                let socket = self.dial_udp().await?;
                Ok(Box::new(DatagramConnection { socket }))
            }
            Transport::Tcp => {
                let stream = TcpStream::connect(self.target.address()).await?;
                stream.set_nodelay(true)?;
                match &self.tls {
                    Some(tls) => {
                        let stream = tls
                            .connector
                            .connect(tls.server_name.clone(), stream)
                            .await?;
                        Ok(Box::new(StreamConnection { stream }))
                    }
                    None => Ok(Box::new(StreamConnection { stream })),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_connection_writes_then_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let dialer = NetDialer::new(DeliveryTarget::plain("127.0.0.1", port, Transport::Tcp)).unwrap();

        let mut conn = dialer.dial().await.unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();
        conn.write(b"T1{\"msg\":\"hello\"}\n").await.unwrap();
        conn.close().await.unwrap();

        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"T1{\"msg\":\"hello\"}\n");
    }

    #[tokio::test]
    async fn udp_connection_sends_one_datagram() {
        let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = collector.local_addr().unwrap().port();
        let dialer = NetDialer::new(DeliveryTarget::plain("127.0.0.1", port, Transport::Udp)).unwrap();

        let mut conn = dialer.dial().await.unwrap();
        conn.write(b"T1line\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = collector.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"T1line\n");
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn tcp_dial_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dialer = NetDialer::new(DeliveryTarget::plain("127.0.0.1", port, Transport::Tcp)).unwrap();
        assert!(dialer.dial().await.is_err());
    }
}
