//! Z/IP transport: ZIP_PACKET semantics over one datagram connection.
//!
//! Every outbound command rides in a `ZIP_PACKET` with a fresh sequence
//! number and `ackRequest` set; the ack (or nack) resolves a slot in the
//! correlator. Inbound traffic is routed here: acks to their slots,
//! solicited replies to message waiters, everything else to the
//! connection's [`CommandRouter`]. An idle connection pings its peer
//! every 25 s.

use crate::command::{Command, ZwaveFrame};
use crate::command_class::zip::{HeaderExtension, ZipKeepAlive, ZipPacket};
use crate::connection::{Connection, DatagramHandler};
use crate::correlator::{AckRegistry, MessageWaiters};
use crate::error::Error;
use crate::{lock, DEFAULT_TIMEOUT, KEEP_ALIVE_INTERVAL};
use async_trait::async_trait;
use core::sync::atomic::{AtomicU8, Ordering};
use core::time::Duration;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

/// Receives the commands a [`ZipConnection`] could not match to a waiter.
#[async_trait]
pub trait CommandRouter: Send + Sync {
    async fn command_received(&self, command: Command, header: HeaderExtension, source_ep: u8);
}

/// A sequenced Z/IP flow to one peer (the gateway or a single node).
#[derive(Clone)]
pub struct ZipConnection {
    inner: Arc<ZipConnectionInner>,
}

pub(crate) struct ZipConnectionInner {
    conn: Connection,
    seq_no: AtomicU8,
    acks: AckRegistry,
    waiters: MessageWaiters,
    last_tx: Mutex<Instant>,
    keep_alive_task: Mutex<Option<smol::Task<()>>>,
    router: Mutex<Option<Arc<dyn CommandRouter>>>,
}

impl ZipConnection {
    /// Connect to `address` and start the receive and keep-alive tasks.
    pub async fn connect(address: SocketAddr, psk: Option<&[u8]>) -> Result<Self, Error> {
        let conn = Connection::connect(address, psk).await?;
        let zip = Self {
            inner: Arc::new(ZipConnectionInner {
                conn: conn.clone(),
                seq_no: AtomicU8::new(0),
                acks: AckRegistry::default(),
                waiters: MessageWaiters::default(),
                last_tx: Mutex::new(Instant::now()),
                keep_alive_task: Mutex::new(None),
                router: Mutex::new(None),
            }),
        };

        conn.start(Arc::new(ZipDatagramHandler {
            inner: Arc::downgrade(&zip.inner),
        }));
        zip.start_keep_alive();

        Ok(zip)
    }

    /// Route unmatched inbound commands to `router`.
    pub fn set_router(&self, router: Arc<dyn CommandRouter>) {
        *lock(&self.inner.router) = Some(router);
    }

    pub fn psk(&self) -> Option<&[u8]> {
        self.inner.conn.psk()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        self.inner.conn.local_addr()
    }

    pub(crate) fn waiters(&self) -> &MessageWaiters {
        &self.inner.waiters
    }

    /// Send `command` to the root endpoint with the default deadline.
    pub async fn send(&self, command: Command) -> Result<(), Error> {
        self.send_with(command, 0, 0, DEFAULT_TIMEOUT).await
    }

    /// Send `command` between explicit endpoints, awaiting the ack up to
    /// `timeout` (or longer if the node announces it is asleep).
    pub async fn send_with(
        &self,
        command: Command,
        source_ep: u8,
        dest_ep: u8,
        timeout: Duration,
    ) -> Result<(), Error> {
        let seq_no = self
            .inner
            .seq_no
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1);
        let packet = ZipPacket::request(seq_no, source_ep, dest_ep, command);
        let bytes = Command::from(packet).compose()?;

        // Install the slot before the bytes leave, so the ack cannot
        // race it.
        let wait = self.inner.acks.insert(seq_no)?;

        self.inner.transmit(&bytes).await?;

        wait.wait(timeout).await
    }

    /// Send `command` and await the first inbound frame of type `R`.
    ///
    /// Matching is by frame type, not sequence number; callers needing a
    /// specific instance register a waiter before sending.
    pub async fn send_and_receive<R>(&self, command: Command, timeout: Duration) -> Result<R, Error>
    where
        R: ZwaveFrame + TryFrom<Command>,
    {
        self.inner.waiters.add_waiting_session(R::HID);
        self.send_with(command, 0, 0, timeout).await?;

        let reply = self.inner.waiters.wait_for_message(R::HID, timeout).await?;

        R::try_from(reply).map_err(|_| Error::Internal)
    }

    fn start_keep_alive(&self) {
        let weak = Arc::downgrade(&self.inner);

        let task = smol::spawn(async move {
            loop {
                let idle = {
                    let Some(inner) = weak.upgrade() else { break };

                    lock(&inner.last_tx).elapsed()
                };

                if idle < KEEP_ALIVE_INTERVAL {
                    smol::Timer::after(KEEP_ALIVE_INTERVAL - idle).await;

                    continue;
                }

                {
                    let Some(inner) = weak.upgrade() else { break };

                    match Command::from(ZipKeepAlive::ping()).compose() {
                        Ok(bytes) => {
                            if let Err(e) = inner.transmit(&bytes).await {
                                log::warn!("keep-alive failed: {}", e);
                            }
                        }
                        Err(e) => log::error!("keep-alive compose failed: {}", e),
                    }
                }

                smol::Timer::after(KEEP_ALIVE_INTERVAL).await;
            }
        });

        *lock(&self.inner.keep_alive_task) = Some(task);
    }

    /// Cancel the timers and the receive task.
    pub fn stop(&self) {
        lock(&self.inner.keep_alive_task).take();
        self.inner.conn.stop();
    }
}

impl ZipConnectionInner {
    /// Write raw bytes and reset the keep-alive clock.
    pub(crate) async fn transmit(&self, bytes: &[u8]) -> Result<(), Error> {
        self.conn.send(bytes).await?;

        *lock(&self.last_tx) = Instant::now();

        Ok(())
    }

    async fn handle_datagram(self: &Arc<Self>, data: &[u8]) {
        let command = match Command::decode(data) {
            Ok(command) => command,
            Err(e) => {
                log::warn!("dropping undecodable datagram {:02x?}: {}", data, e);

                return;
            }
        };

        match command {
            Command::ZipPacket(packet) => self.handle_zip_packet(packet).await,
            Command::ZipKeepAlive(keep_alive) => {
                if keep_alive.ack_request {
                    self.answer_keep_alive().await;
                }
            }
            advertisement @ Command::ZipNodeAdvertisement(_) => {
                self.deliver(advertisement, HeaderExtension::default(), 0)
                    .await;
            }
            other => {
                log::warn!("dropping unexpected bare frame {}", other.name());
            }
        }
    }

    async fn answer_keep_alive(&self) {
        match Command::from(ZipKeepAlive::pong()).compose() {
            Ok(bytes) => {
                if let Err(e) = self.transmit(&bytes).await {
                    log::warn!("keep-alive answer failed: {}", e);
                }
            }
            Err(e) => log::error!("keep-alive compose failed: {}", e),
        }
    }

    async fn handle_zip_packet(self: &Arc<Self>, packet: ZipPacket) {
        // Ack bookkeeping comes before command dispatch.
        if packet.ack_response {
            if !self.acks.received(packet.seq_no) {
                log::warn!("ack for unknown seq {}", packet.seq_no);
            }

            return;
        }

        if packet.nack_response {
            if packet.nack_waiting {
                let delay = packet.header_extension.expected_delay().unwrap_or(0);

                self.acks.queued(packet.seq_no, delay);
            } else if !self.acks.failed(packet.seq_no) {
                log::warn!("nack for unknown seq {}", packet.seq_no);
            }

            return;
        }

        if packet.ack_request {
            let response = ZipPacket::response(true, &packet);

            match Command::from(response).compose() {
                Ok(bytes) => {
                    if let Err(e) = self.transmit(&bytes).await {
                        log::warn!("ack response failed: {}", e);
                    }
                }
                Err(e) => log::error!("ack response compose failed: {}", e),
            }
        }

        if let Some(command) = packet.command {
            self.deliver(*command, packet.header_extension, packet.source_ep)
                .await;
        }
    }

    async fn deliver(self: &Arc<Self>, command: Command, header: HeaderExtension, source_ep: u8) {
        if self.waiters.message_received(&command) {
            return;
        }

        let router = lock(&self.router).clone();

        match router {
            Some(router) => router.command_received(command, header, source_ep).await,
            None => log::info!("unhandled inbound {}", command.name()),
        }
    }
}

struct ZipDatagramHandler {
    inner: Weak<ZipConnectionInner>,
}

#[async_trait]
impl DatagramHandler for ZipDatagramHandler {
    async fn datagram_received(&self, data: &[u8], _from: SocketAddr) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_datagram(data).await;
        }
    }
}
