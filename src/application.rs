//! The embedding facade: startup/shutdown, node construction (multi
//! channel endpoints included), interviews under the storage lock, and
//! node-list reconciliation.

use crate::command::Command;
use crate::command_class::network_management_inclusion::{
    InclusionStatus, NodeAddStatus, NodeRemoveStatus,
};
use crate::command_class::zip::HeaderExtension;
use crate::command_class::zip_gateway::GatewayMode;
use crate::command_class::COMMAND_CLASS_MULTI_CHANNEL_V2;
use crate::error::Error;
use crate::gateway::ZipGateway;
use crate::listener::{AdapterListener, ApplicationListener, Listeners};
use crate::node::Node;
use crate::{lock, ZIP_PORT};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, Weak};

/// Owns the gateway adapter and the node table. Cheap to clone.
#[derive(Clone)]
pub struct Application {
    inner: Arc<AppInner>,
}

pub(crate) struct AppInner {
    adapter: ZipGateway,
    nodes: Mutex<BTreeMap<(u8, u8), Node>>,
    listeners: Listeners<dyn ApplicationListener>,
    /// Keeps the weakly registered adapter listener alive.
    bridge: Mutex<Option<Arc<AdapterBridge>>>,
}

impl Application {
    pub fn new(adapter: ZipGateway) -> Self {
        let app = Self {
            inner: Arc::new(AppInner {
                adapter,
                nodes: Mutex::new(BTreeMap::new()),
                listeners: Listeners::default(),
                bridge: Mutex::new(None),
            }),
        };
        let bridge = Arc::new(AdapterBridge {
            app: Arc::downgrade(&app.inner),
        });

        app.inner
            .adapter
            .add_listener(&(Arc::clone(&bridge) as Arc<dyn AdapterListener>));
        *lock(&app.inner.bridge) = Some(bridge);

        app
    }

    pub fn adapter(&self) -> &ZipGateway {
        &self.inner.adapter
    }

    pub fn add_listener(&self, listener: &Arc<dyn ApplicationListener>) {
        self.inner.listeners.add(listener);
    }

    pub fn node(&self, root_node_id: u8, endpoint: u8) -> Option<Node> {
        lock(&self.inner.nodes)
            .get(&(root_node_id, endpoint))
            .cloned()
    }

    pub fn nodes(&self) -> Vec<Node> {
        lock(&self.inner.nodes).values().cloned().collect()
    }

    /// Bring the network model up: gateway mode, unsolicited socket, node
    /// list, per-node construction and interview.
    pub async fn startup(&self) -> Result<(), Error> {
        self.inner
            .adapter
            .set_gateway_mode(GatewayMode::Standalone)
            .await?;

        let node_ids = self.inner.adapter.get_node_list().await?;

        if let Err(e) = self
            .inner
            .adapter
            .setup_unsolicited_connection(ZIP_PORT)
            .await
        {
            log::warn!("unsolicited destination not available: {}", e);
        }

        let own_id = self.inner.adapter.node_id();
        let mut added = Vec::new();

        for node_id in node_ids {
            if node_id == own_id {
                continue;
            }

            match self.inner.load_node(node_id).await {
                Ok(mut nodes) => added.append(&mut nodes),
                Err(e) => log::warn!("loading node {} failed: {}", node_id, e),
            }
        }

        for node in &added {
            let guard = node.storage_lock();

            if let Err(e) = node.interview().await {
                log::warn!("interview of node {:?} failed: {}", node.id(), e);
            }

            drop(guard);
        }

        self.inner.emit_added(self, added).await;

        Ok(())
    }

    /// Stop the mailbox-free parts of the stack: connections and timers.
    pub async fn shutdown(&self) {
        self.inner.adapter.stop();
    }
}

impl AppInner {
    fn handle(self: &Arc<Self>) -> Application {
        Application {
            inner: Arc::clone(self),
        }
    }

    /// Build the root node (and its endpoint nodes) for `node_id` from
    /// the gateway's cached information.
    async fn load_node(&self, node_id: u8) -> Result<Vec<Node>, Error> {
        let info = self.adapter.get_node_info(node_id).await?;
        let node = Node::new(&self.adapter, node_id, &info.command_classes);

        node.set_listening(info.listening);
        node.set_flirs(info.flirs());
        node.set_basic_device_class(info.basic_device_class);
        node.set_generic_device_class(info.generic_device_class);
        node.set_specific_device_class(info.specific_device_class);

        let mut nodes = vec![node.clone()];

        if node.supports(COMMAND_CLASS_MULTI_CHANNEL_V2) {
            let count = self.adapter.get_multi_channel_end_points(node_id).await?;

            for endpoint in 1..=count {
                let capability = self
                    .adapter
                    .get_multi_channel_capability(node_id, endpoint)
                    .await?;
                let endpoint_node =
                    Node::new_endpoint(&node, endpoint, &capability.command_classes);

                endpoint_node.set_generic_device_class(capability.generic_device_class);
                endpoint_node.set_specific_device_class(capability.specific_device_class);
                nodes.push(endpoint_node);
            }
        }

        let mut table = lock(&self.nodes);

        for n in &nodes {
            table.insert(n.id(), n.clone());
        }

        Ok(nodes)
    }

    /// Emit the batch `nodesAdded` then one `nodeAdded` per node.
    async fn emit_added(&self, app: &Application, added: Vec<Node>) {
        if added.is_empty() {
            return;
        }

        self.listeners
            .notify(|l| {
                let sender = app.clone();
                let nodes = added.clone();

                async move { l.nodes_added(sender, nodes).await }
            })
            .await;

        for node in added {
            self.listeners
                .notify(|l| {
                    let sender = app.clone();
                    let node = node.clone();

                    async move { l.node_added(sender, node).await }
                })
                .await;
        }
    }

    /// Emit one `nodeRemoved` per node, then the batch `nodesRemoved`.
    async fn emit_removed(&self, app: &Application, removed: Vec<(u8, u8)>) {
        if removed.is_empty() {
            return;
        }

        for id in &removed {
            let id = *id;

            self.listeners
                .notify(|l| {
                    let sender = app.clone();

                    async move { l.node_removed(sender, id).await }
                })
                .await;
        }

        self.listeners
            .notify(|l| {
                let sender = app.clone();
                let ids = removed.clone();

                async move { l.nodes_removed(sender, ids).await }
            })
            .await;
    }

    /// Reconcile the node table against the gateway's fresh node list:
    /// drop nodes that left the network, build and interview newcomers.
    async fn reconcile(self: &Arc<Self>) {
        let app = self.handle();
        let current = self.adapter.node_ids();
        let own_id = self.adapter.node_id();

        let (removed, known_roots): (Vec<(u8, u8)>, BTreeSet<u8>) = {
            let mut table = lock(&self.nodes);
            let removed: Vec<(u8, u8)> = table
                .keys()
                .copied()
                .filter(|(root, _)| !current.contains(root))
                .collect();

            for id in &removed {
                table.remove(id);
            }

            (removed, table.keys().map(|(root, _)| *root).collect())
        };

        self.emit_removed(&app, removed).await;

        let mut added = Vec::new();

        for node_id in current {
            if node_id == own_id || known_roots.contains(&node_id) {
                continue;
            }

            match self.load_node(node_id).await {
                Ok(mut nodes) => added.append(&mut nodes),
                Err(e) => log::warn!("loading node {} failed: {}", node_id, e),
            }
        }

        for node in &added {
            let guard = node.storage_lock();

            if let Err(e) = node.interview().await {
                log::warn!("interview of node {:?} failed: {}", node.id(), e);
            }

            drop(guard);
        }

        self.emit_added(&app, added).await;
    }

    /// Route an inbound node command to the matching node object.
    async fn route_to_node(&self, root_node_id: u8, end_point: u8, message: Command) {
        let node = lock(&self.nodes)
            .get(&(root_node_id, end_point))
            .cloned();

        let Some(node) = node else {
            log::info!(
                "message for unknown node {}:{} ({})",
                root_node_id,
                end_point,
                message.name()
            );

            return;
        };

        match node.handle_message(message).await {
            Ok(_) => {}
            Err(Error::Unhandled) => {}
            Err(e) => log::warn!(
                "dispatch to node {}:{} failed: {}",
                root_node_id,
                end_point,
                e
            ),
        }
    }
}

/// Adapter listener wiring gateway events into the application.
pub(crate) struct AdapterBridge {
    app: Weak<AppInner>,
}

#[async_trait]
impl AdapterListener for AdapterBridge {
    async fn message_received(
        &self,
        _sender: ZipGateway,
        root_node_id: u8,
        end_point: u8,
        message: Command,
        _header: HeaderExtension,
    ) {
        if let Some(app) = self.app.upgrade() {
            app.route_to_node(root_node_id, end_point, message).await;
        }
    }

    async fn node_list_updated(&self, _sender: ZipGateway) {
        if let Some(app) = self.app.upgrade() {
            app.reconcile().await;
        }
    }

    async fn add_node_status(&self, _sender: ZipGateway, status: NodeAddStatus) {
        let Some(app) = self.app.upgrade() else {
            return;
        };

        if status.status != InclusionStatus::Done || status.new_node_id == 0 {
            return;
        }

        let handle = app.handle();

        match app.load_node(status.new_node_id).await {
            Ok(added) => {
                for node in &added {
                    let guard = node.storage_lock();

                    if let Err(e) = node.interview().await {
                        log::warn!("interview of node {:?} failed: {}", node.id(), e);
                    }

                    drop(guard);
                }

                app.emit_added(&handle, added).await;
            }
            Err(e) => log::warn!("loading added node {} failed: {}", status.new_node_id, e),
        }
    }

    async fn remove_node_status(&self, _sender: ZipGateway, status: NodeRemoveStatus) {
        let Some(app) = self.app.upgrade() else {
            return;
        };

        if status.status != InclusionStatus::Done {
            return;
        }

        let handle = app.handle();

        // nodeID 0 reports an exclusion outside this network; it still
        // fires the removal events with id 0.
        let removed: Vec<(u8, u8)> = if status.node_id == 0 {
            vec![(0, 0)]
        } else {
            let mut table = lock(&app.nodes);
            let removed: Vec<(u8, u8)> = table
                .keys()
                .copied()
                .filter(|(root, _)| *root == status.node_id)
                .collect();

            for id in &removed {
                table.remove(id);
            }

            removed
        };

        app.emit_removed(&handle, removed).await;
    }
}
