//! Datagram connection: one UDP flow to a gateway, a node, or (in server
//! mode) everyone sending to the unsolicited port.
//!
//! DTLS-PSK is a deployment concern of the datagram layer only; the PSK
//! is carried here so sub-connections inherit it, and the rest of the
//! stack never looks below the datagram contract. Without a DTLS binding
//! linked in, traffic runs over plain UDP.

use crate::error::{Error, TransportError};
use crate::lock;
use async_trait::async_trait;
use smol::net::UdpSocket;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};

/// Largest datagram we expect from a Z/IP Gateway.
const MAX_DATAGRAM: usize = 1500;

/// Receives datagrams from a [`Connection`]'s socket, one at a time, in
/// arrival order.
#[async_trait]
pub trait DatagramHandler: Send + Sync {
    async fn datagram_received(&self, data: &[u8], from: SocketAddr);
}

#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    psk: Option<Vec<u8>>,
    rx_task: Mutex<Option<smol::Task<()>>>,
}

impl Connection {
    /// Open a client flow to `address`.
    pub async fn connect(address: SocketAddr, psk: Option<&[u8]>) -> Result<Self, Error> {
        let bind = match address {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|_| TransportError::Setup)?;

        socket
            .connect(address)
            .await
            .map_err(|_| TransportError::Setup)?;

        if psk.is_some() {
            log::debug!("PSK configured but no DTLS binding linked; using plain UDP");
        }

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                socket,
                peer: Some(address),
                psk: psk.map(<[u8]>::to_vec),
                rx_task: Mutex::new(None),
            }),
        })
    }

    /// Open a server socket delivering `(bytes, sender)` pairs.
    pub async fn listen(psk: Option<&[u8]>, port: u16) -> Result<Self, Error> {
        let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port))
            .await
            .map_err(|_| TransportError::Setup)?;

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                socket,
                peer: None,
                psk: psk.map(<[u8]>::to_vec),
                rx_task: Mutex::new(None),
            }),
        })
    }

    /// Start delivering inbound datagrams to `handler`. One receive task
    /// per connection keeps inbound ordering single-consumer.
    pub fn start(&self, handler: Arc<dyn DatagramHandler>) {
        let socket = self.inner.socket.clone();

        let task = smol::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM];

            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, from)) => handler.datagram_received(&buf[..len], from).await,
                    Err(e) => {
                        log::warn!("receive loop terminated: {}", e);

                        break;
                    }
                }
            }
        });

        *lock(&self.inner.rx_task) = Some(task);
    }

    /// Send to the connected peer.
    pub async fn send(&self, data: &[u8]) -> Result<(), Error> {
        if self.inner.peer.is_none() {
            return Err(TransportError::NotConnected.into());
        }

        self.inner
            .socket
            .send(data)
            .await
            .map_err(|_| TransportError::Send)?;

        Ok(())
    }

    /// Send to an explicit address (server mode).
    pub async fn send_to(&self, data: &[u8], address: SocketAddr) -> Result<(), Error> {
        self.inner
            .socket
            .send_to(data, address)
            .await
            .map_err(|_| TransportError::Send)?;

        Ok(())
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        self.inner
            .socket
            .local_addr()
            .map_err(|_| TransportError::NotConnected.into())
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer
    }

    pub fn psk(&self) -> Option<&[u8]> {
        self.inner.psk.as_deref()
    }

    /// Cancel the receive task. The socket closes once the last clone of
    /// this connection is gone.
    pub fn stop(&self) {
        lock(&self.inner.rx_task).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Sink {
        hits: AtomicUsize,
        last: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl DatagramHandler for Sink {
        async fn datagram_received(&self, data: &[u8], _from: SocketAddr) {
            *lock(&self.last) = data.to_vec();
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn loopback_round_trip() {
        smol::block_on(async {
            let server = Connection::listen(None, 0).await.unwrap();
            let port = server.local_addr().unwrap().port();
            let sink = Arc::new(Sink {
                hits: AtomicUsize::new(0),
                last: Mutex::new(Vec::new()),
            });

            server.start(Arc::clone(&sink) as Arc<dyn DatagramHandler>);

            let client = Connection::connect(
                SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), port),
                None,
            )
            .await
            .unwrap();

            client.send(b"\x23\x03\x80").await.unwrap();

            for _ in 0..100 {
                if sink.hits.load(Ordering::SeqCst) > 0 {
                    break;
                }

                smol::Timer::after(Duration::from_millis(10)).await;
            }

            assert_eq!(*lock(&sink.last), b"\x23\x03\x80".to_vec());

            client.stop();
            server.stop();
        });
    }

    #[test]
    fn send_without_peer_fails() {
        smol::block_on(async {
            let server = Connection::listen(None, 0).await.unwrap();

            assert_eq!(
                server.send(b"x").await,
                Err(Error::Transport(TransportError::NotConnected))
            );
        });
    }
}
