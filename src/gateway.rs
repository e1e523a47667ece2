//! The Z/IP Gateway controller: network management RPCs on the primary
//! connection, lazily opened sub-connections per node, and the
//! unsolicited intake socket.

use crate::command::{Command, ZwaveFrame};
use crate::command_class::network_management_inclusion::{
    AddNodeMode, FailedNodeRemove, NodeAdd, NodeAddDskSet, NodeAddKeysSet, NodeRemove,
    RemoveNodeMode, SecurityKeys, TransmitOptions,
};
use crate::command_class::network_management_proxy::{
    FailedNodeListGet, FailedNodeListReport, MultiChannelCapabilityGet,
    MultiChannelCapabilityReport, MultiChannelEndPointGet, MultiChannelEndPointReport,
    NodeInfoCachedGet, NodeInfoCachedReport, NodeListGet, NodeListReport,
};
use crate::command_class::zip::{HeaderExtension, ZipPacket};
use crate::command_class::zip_gateway::{
    GatewayMode, GatewayModeGet, GatewayModeReport, GatewayModeSet, UnsolicitedDestinationSet,
};
use crate::command_class::zip_nd::{ZipInvNodeSolicitation, ZipNodeAdvertisement};
use crate::connection::{Connection, DatagramHandler};
use crate::error::Error;
use crate::listener::{AdapterListener, Listeners};
use crate::transport::{CommandRouter, ZipConnection};
use crate::{lock, DEFAULT_TIMEOUT, ZIP_PORT};
use async_trait::async_trait;
use core::sync::atomic::{AtomicU8, Ordering};
use core::time::Duration;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex, Weak};

/// Gateway-side view of one node.
#[derive(Debug, Default, Clone)]
struct NodeEntry {
    ipv6: Option<Ipv6Addr>,
}

/// Handle to a Z/IP Gateway. Cheap to clone; all clones share one
/// primary connection and node table.
#[derive(Clone)]
pub struct ZipGateway {
    inner: Arc<GatewayInner>,
}

pub(crate) struct GatewayInner {
    conn: ZipConnection,
    nm_seq: AtomicU8,
    /// The controller's own node id; 0 until the first NODE_LIST_REPORT.
    node_id: AtomicU8,
    nodes: Mutex<BTreeMap<u8, NodeEntry>>,
    node_connections: Mutex<HashMap<u8, ZipConnection>>,
    unsolicited: Mutex<Option<Connection>>,
    listeners: Listeners<dyn AdapterListener>,
}

impl ZipGateway {
    /// Connect to the gateway at `address` (normally port 4123).
    pub async fn connect(address: SocketAddr, psk: Option<&[u8]>) -> Result<Self, Error> {
        let conn = ZipConnection::connect(address, psk).await?;
        let gateway = Self {
            inner: Arc::new(GatewayInner {
                conn: conn.clone(),
                nm_seq: AtomicU8::new(0),
                node_id: AtomicU8::new(0),
                nodes: Mutex::new(BTreeMap::new()),
                node_connections: Mutex::new(HashMap::new()),
                unsolicited: Mutex::new(None),
                listeners: Listeners::default(),
            }),
        };

        conn.set_router(Arc::new(PrimaryRouter {
            gateway: Arc::downgrade(&gateway.inner),
        }));

        Ok(gateway)
    }

    pub fn add_listener(&self, listener: &Arc<dyn AdapterListener>) {
        self.inner.listeners.add(listener);
    }

    pub(crate) fn listeners(&self) -> &Listeners<dyn AdapterListener> {
        &self.inner.listeners
    }

    /// The controller's own node id; 0 before the first node list query.
    pub fn node_id(&self) -> u8 {
        self.inner.node_id.load(Ordering::Relaxed)
    }

    /// Node ids currently cached from the gateway.
    pub fn node_ids(&self) -> BTreeSet<u8> {
        lock(&self.inner.nodes).keys().copied().collect()
    }

    fn next_nm_seq(&self) -> u8 {
        self.inner
            .nm_seq
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1)
    }

    /// Send on the primary connection with default endpoints.
    pub async fn send(&self, command: Command) -> Result<(), Error> {
        self.inner.conn.send(command).await
    }

    /// Send on the primary connection with explicit endpoints and
    /// deadline.
    pub async fn send_with(
        &self,
        command: Command,
        source_ep: u8,
        dest_ep: u8,
        timeout: Duration,
    ) -> Result<(), Error> {
        self.inner
            .conn
            .send_with(command, source_ep, dest_ep, timeout)
            .await
    }

    async fn rpc<R>(&self, command: Command) -> Result<R, Error>
    where
        R: ZwaveFrame + TryFrom<Command>,
    {
        self.inner.conn.send_and_receive(command, DEFAULT_TIMEOUT).await
    }

    /// Best-effort send used by the inclusion helpers: failures are
    /// logged and reported as `false`.
    async fn send_bool(&self, command: Command) -> bool {
        let name = command.name();

        match self.send(command).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("{} failed: {}", name, e);

                false
            }
        }
    }

    /// Query the node list, refresh the cache and learn our own node id.
    pub async fn get_node_list(&self) -> Result<BTreeSet<u8>, Error> {
        let report: NodeListReport = self
            .rpc(
                NodeListGet {
                    seq_no: self.next_nm_seq(),
                }
                .into(),
            )
            .await?;

        self.inner
            .node_id
            .store(report.node_list_controller_id, Ordering::Relaxed);
        self.inner.apply_node_list(&report);

        Ok(report.nodes.0)
    }

    pub async fn get_failed_node_list(&self) -> Result<BTreeSet<u8>, Error> {
        let report: FailedNodeListReport = self
            .rpc(
                FailedNodeListGet {
                    seq_no: self.next_nm_seq(),
                }
                .into(),
            )
            .await?;

        Ok(report.nodes.0)
    }

    pub async fn get_node_info(&self, node_id: u8) -> Result<NodeInfoCachedReport, Error> {
        self.rpc(
            NodeInfoCachedGet {
                seq_no: self.next_nm_seq(),
                max_age: 15,
                node_id,
            }
            .into(),
        )
        .await
    }

    /// Total endpoint count (individual plus aggregated) behind a node.
    pub async fn get_multi_channel_end_points(&self, node_id: u8) -> Result<u8, Error> {
        let report: MultiChannelEndPointReport = self
            .rpc(
                MultiChannelEndPointGet {
                    seq_no: self.next_nm_seq(),
                    node_id,
                }
                .into(),
            )
            .await?;

        Ok(report.individual_end_points + report.aggregated_end_points)
    }

    pub async fn get_multi_channel_capability(
        &self,
        node_id: u8,
        end_point: u8,
    ) -> Result<MultiChannelCapabilityReport, Error> {
        self.rpc(
            MultiChannelCapabilityGet {
                seq_no: self.next_nm_seq(),
                node_id,
                end_point,
            }
            .into(),
        )
        .await
    }

    /// Open the network for inclusion.
    pub async fn add_node(&self, tx_options: TransmitOptions) -> bool {
        self.send_bool(
            NodeAdd {
                seq_no: self.next_nm_seq(),
                mode: AddNodeMode::AnyS2,
                tx_options,
            }
            .into(),
        )
        .await
    }

    pub async fn add_node_stop(&self) -> bool {
        self.send_bool(
            NodeAdd {
                seq_no: self.next_nm_seq(),
                mode: AddNodeMode::Stop,
                tx_options: TransmitOptions::empty(),
            }
            .into(),
        )
        .await
    }

    /// Open the network for exclusion.
    pub async fn remove_node(&self) -> bool {
        self.send_bool(
            NodeRemove {
                seq_no: self.next_nm_seq(),
                mode: RemoveNodeMode::Any,
            }
            .into(),
        )
        .await
    }

    pub async fn remove_node_stop(&self) -> bool {
        self.send_bool(
            NodeRemove {
                seq_no: self.next_nm_seq(),
                mode: RemoveNodeMode::Stop,
            }
            .into(),
        )
        .await
    }

    pub async fn remove_failed_node(&self, node_id: u8) -> bool {
        self.send_bool(
            FailedNodeRemove {
                seq_no: self.next_nm_seq(),
                node_id,
            }
            .into(),
        )
        .await
    }

    /// Answer a NODE_ADD_DSK_REPORT during S2 bootstrapping.
    pub async fn add_node_dsk_set(
        &self,
        accept: bool,
        input_dsk_length: u8,
        dsk: zipcrab_wire::Dsk,
    ) -> bool {
        self.send_bool(
            NodeAddDskSet {
                seq_no: self.next_nm_seq(),
                accept,
                input_dsk_length,
                dsk,
            }
            .into(),
        )
        .await
    }

    /// Answer a NODE_ADD_KEYS_REPORT during S2 bootstrapping.
    pub async fn add_node_keys_set(
        &self,
        grant_csa: bool,
        accept: bool,
        granted_keys: SecurityKeys,
    ) -> bool {
        self.send_bool(
            NodeAddKeysSet {
                seq_no: self.next_nm_seq(),
                grant_csa,
                accept,
                granted_keys,
            }
            .into(),
        )
        .await
    }

    /// Resolve a node's IPv6 address through the gateway.
    pub async fn ip_of_node(&self, node_id: u8) -> Result<Ipv6Addr, Error> {
        let advertisement: ZipNodeAdvertisement = self
            .rpc(
                ZipInvNodeSolicitation {
                    local: false,
                    node_id,
                }
                .into(),
            )
            .await?;

        Ok(advertisement.ipv6)
    }

    /// Read the gateway mode and write `mode` only when it differs.
    pub async fn set_gateway_mode(&self, mode: GatewayMode) -> Result<bool, Error> {
        let report: GatewayModeReport = self.rpc(GatewayModeGet.into()).await?;

        if report.mode == mode {
            return Ok(true);
        }

        self.send(GatewayModeSet { mode }.into()).await?;

        Ok(true)
    }

    /// Open the unsolicited server socket, announce it to the gateway and
    /// learn the IPv6 address of every cached node.
    pub async fn setup_unsolicited_connection(&self, port: u16) -> Result<(), Error> {
        let psk = self.inner.conn.psk().map(<[u8]>::to_vec);
        let server = Connection::listen(psk.as_deref(), port).await?;

        server.start(Arc::new(UnsolicitedHandler {
            gateway: Arc::downgrade(&self.inner),
        }));

        let bound = server.local_addr()?.port();

        *lock(&self.inner.unsolicited) = Some(server);

        let local = self.inner.conn.local_addr()?;
        let ipv6 = match local.ip() {
            IpAddr::V6(addr) => addr,
            IpAddr::V4(addr) => addr.to_ipv6_mapped(),
        };

        self.send(UnsolicitedDestinationSet { ipv6, port: bound }.into())
            .await?;

        for node_id in self.node_ids() {
            match self.ip_of_node(node_id).await {
                Ok(addr) => {
                    if let Some(entry) = lock(&self.inner.nodes).get_mut(&node_id) {
                        entry.ipv6 = Some(addr);
                    }
                }
                Err(e) => log::warn!("no address for node {}: {}", node_id, e),
            }
        }

        Ok(())
    }

    /// The memoized sub-connection to a node, opened on first use with
    /// the primary connection's PSK.
    pub async fn connect_to_node(&self, node_id: u8) -> Result<ZipConnection, Error> {
        if let Some(existing) = lock(&self.inner.node_connections).get(&node_id) {
            return Ok(existing.clone());
        }

        let cached_ipv6 = lock(&self.inner.nodes).get(&node_id).and_then(|e| e.ipv6);
        let ipv6 = match cached_ipv6 {
            Some(addr) => addr,
            None => {
                let addr = self.ip_of_node(node_id).await?;

                if let Some(entry) = lock(&self.inner.nodes).get_mut(&node_id) {
                    entry.ipv6 = Some(addr);
                }

                addr
            }
        };

        let conn =
            ZipConnection::connect(SocketAddr::new(IpAddr::V6(ipv6), ZIP_PORT), self.inner.conn.psk())
                .await?;

        conn.set_router(Arc::new(NodeRouter {
            gateway: Arc::downgrade(&self.inner),
            node_id,
        }));

        let mut connections = lock(&self.inner.node_connections);

        // A concurrent caller may have raced us here; keep the first.
        if let Some(existing) = connections.get(&node_id) {
            conn.stop();

            return Ok(existing.clone());
        }

        connections.insert(node_id, conn.clone());

        Ok(conn)
    }

    /// Send to a node over its sub-connection.
    pub async fn send_to_node(
        &self,
        node_id: u8,
        command: Command,
        source_ep: u8,
        dest_ep: u8,
        timeout: Duration,
    ) -> Result<(), Error> {
        let conn = self.connect_to_node(node_id).await?;

        conn.send_with(command, source_ep, dest_ep, timeout).await
    }

    /// Tear down every connection this gateway owns.
    pub fn stop(&self) {
        for (_, conn) in lock(&self.inner.node_connections).drain() {
            conn.stop();
        }

        if let Some(server) = lock(&self.inner.unsolicited).take() {
            server.stop();
        }

        self.inner.conn.stop();
    }
}

impl GatewayInner {
    fn handle(self: &Arc<Self>) -> ZipGateway {
        ZipGateway {
            inner: Arc::clone(self),
        }
    }

    /// Refresh the node cache from a report, keeping known addresses.
    fn apply_node_list(&self, report: &NodeListReport) {
        let mut nodes = lock(&self.nodes);

        nodes.retain(|id, _| report.nodes.contains(*id));

        for id in report.nodes.iter() {
            nodes.entry(id).or_default();
        }
    }

    fn node_by_ip(&self, ip: IpAddr) -> Option<u8> {
        let needle = canonical_v6(ip);

        lock(&self.nodes)
            .iter()
            .find(|(_, entry)| entry.ipv6.map(|a| canonical_v6(IpAddr::V6(a))) == Some(needle))
            .map(|(id, _)| *id)
    }

    /// Packets arriving on the unsolicited socket: map the sender to a
    /// node, answer ack requests, fan the command out to listeners.
    async fn handle_unsolicited(self: &Arc<Self>, data: &[u8], from: SocketAddr) {
        let packet = match Command::decode(data) {
            Ok(Command::ZipPacket(packet)) => packet,
            Ok(other) => {
                log::warn!("non Z/IP frame {} on unsolicited socket", other.name());

                return;
            }
            Err(e) => {
                log::warn!("dropping undecodable unsolicited {:02x?}: {}", data, e);

                return;
            }
        };

        let Some(node_id) = self.node_by_ip(from.ip()) else {
            if packet.ack_request {
                log::warn!(
                    "dropping unsolicited from {}: {}",
                    from,
                    crate::error::ProtocolError::UnansweredAckRequest
                );
            } else {
                log::info!("unsolicited packet from unknown sender {}", from);
            }

            return;
        };

        if packet.ack_request {
            let server = lock(&self.unsolicited).clone();

            if let Some(server) = server {
                match Command::from(ZipPacket::response(true, &packet)).compose() {
                    Ok(bytes) => {
                        if let Err(e) = server.send_to(&bytes, from).await {
                            log::warn!("unsolicited ack response failed: {}", e);
                        }
                    }
                    Err(e) => log::error!("ack response compose failed: {}", e),
                }
            }
        }

        let Some(command) = packet.command else {
            return;
        };

        if let Command::NodeListReport(ref report) = *command {
            self.node_id
                .store(report.node_list_controller_id, Ordering::Relaxed);
            self.apply_node_list(report);

            let gateway = self.handle();

            self.listeners
                .notify(|l| {
                    let sender = gateway.clone();

                    async move { l.node_list_updated(sender).await }
                })
                .await;
        }

        self.dispatch_from_node(node_id, packet.source_ep, *command, packet.header_extension)
            .await;
    }

    /// Fan a node-originated command out to the adapter listeners.
    async fn dispatch_from_node(
        self: &Arc<Self>,
        node_id: u8,
        source_ep: u8,
        command: Command,
        header: HeaderExtension,
    ) {
        let gateway = self.handle();

        self.listeners
            .notify(|l| {
                let sender = gateway.clone();
                let command = command.clone();
                let header = header.clone();

                async move {
                    l.message_received(sender, node_id, source_ep, command, header)
                        .await
                }
            })
            .await;
    }

    /// Commands on the primary connection that no waiter claimed.
    async fn handle_primary(self: &Arc<Self>, command: Command) {
        let gateway = self.handle();

        match command {
            Command::NodeAddStatus(status) => {
                self.listeners
                    .notify(|l| {
                        let sender = gateway.clone();
                        let status = status.clone();

                        async move { l.add_node_status(sender, status).await }
                    })
                    .await;
            }
            Command::NodeRemoveStatus(status) => {
                self.listeners
                    .notify(|l| {
                        let sender = gateway.clone();

                        async move { l.remove_node_status(sender, status).await }
                    })
                    .await;
            }
            Command::NodeListReport(report) => {
                self.node_id
                    .store(report.node_list_controller_id, Ordering::Relaxed);
                self.apply_node_list(&report);

                self.listeners
                    .notify(|l| {
                        let sender = gateway.clone();

                        async move { l.node_list_updated(sender).await }
                    })
                    .await;
            }
            other => {
                self.listeners
                    .notify(|l| {
                        let sender = gateway.clone();
                        let message = other.clone();

                        async move { l.on_message_received(sender, message).await }
                    })
                    .await;
            }
        }
    }
}

/// IPv4-mapped and plain addresses compare equal.
fn canonical_v6(ip: IpAddr) -> Ipv6Addr {
    match ip {
        IpAddr::V6(addr) => match addr.to_ipv4_mapped() {
            Some(v4) => v4.to_ipv6_mapped(),
            None => addr,
        },
        IpAddr::V4(addr) => addr.to_ipv6_mapped(),
    }
}

struct PrimaryRouter {
    gateway: Weak<GatewayInner>,
}

#[async_trait]
impl CommandRouter for PrimaryRouter {
    async fn command_received(&self, command: Command, _header: HeaderExtension, _source_ep: u8) {
        if let Some(gateway) = self.gateway.upgrade() {
            gateway.handle_primary(command).await;
        }
    }
}

/// Router for a per-node sub-connection: its inbound stream is node
/// traffic like the unsolicited socket's.
struct NodeRouter {
    gateway: Weak<GatewayInner>,
    node_id: u8,
}

#[async_trait]
impl CommandRouter for NodeRouter {
    async fn command_received(&self, command: Command, header: HeaderExtension, source_ep: u8) {
        if let Some(gateway) = self.gateway.upgrade() {
            gateway
                .dispatch_from_node(self.node_id, source_ep, command, header)
                .await;
        }
    }
}

struct UnsolicitedHandler {
    gateway: Weak<GatewayInner>,
}

#[async_trait]
impl DatagramHandler for UnsolicitedHandler {
    async fn datagram_received(&self, data: &[u8], from: SocketAddr) {
        if let Some(gateway) = self.gateway.upgrade() {
            gateway.handle_unsolicited(data, from).await;
        }
    }
}
