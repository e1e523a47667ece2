//! Typed observer registries.
//!
//! Registration is weak: the embedder owns its listeners, adding one here
//! never extends its lifetime, and dead entries are pruned on the next
//! dispatch. Two dispatch flavors exist: [`Listeners::speak`] spawns one
//! detached task per listener (fire and forget, a panicking handler
//! cannot take its siblings down), while [`Listeners::notify`]/
//! [`Listeners::ask`] await the handlers one by one in registration
//! order.

use crate::command::Command;
use crate::command_class::network_management_inclusion::{NodeAddStatus, NodeRemoveStatus};
use crate::command_class::zip::HeaderExtension;
use crate::gateway::ZipGateway;
use crate::lock;
use crate::node::Node;
use async_trait::async_trait;
use core::future::Future;
use std::sync::{Arc, Mutex, Weak};

/// Observer list for one listener trait.
pub struct Listeners<L: ?Sized> {
    inner: Mutex<Vec<Weak<L>>>,
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }
}

impl<L: ?Sized + Send + Sync + 'static> Listeners<L> {
    pub fn add(&self, listener: &Arc<L>) {
        lock(&self.inner).push(Arc::downgrade(listener));
    }

    /// Live listeners in registration order; drops dead entries.
    pub(crate) fn snapshot(&self) -> Vec<Arc<L>> {
        let mut entries = lock(&self.inner);

        entries.retain(|weak| weak.strong_count() > 0);

        entries.iter().filter_map(Weak::upgrade).collect()
    }

    /// Fire and forget: spawn one task per listener.
    pub(crate) fn speak<F, Fut>(&self, f: F)
    where
        F: Fn(Arc<L>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        for listener in self.snapshot() {
            smol::spawn(f(listener)).detach();
        }
    }

    /// Await every handler in registration order.
    pub(crate) async fn notify<F, Fut>(&self, f: F)
    where
        F: Fn(Arc<L>) -> Fut,
        Fut: Future<Output = ()>,
    {
        for listener in self.snapshot() {
            f(listener).await;
        }
    }

    /// Await every handler and collect the answers.
    pub(crate) async fn ask<T, F, Fut>(&self, f: F) -> Vec<T>
    where
        F: Fn(Arc<L>) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut answers = Vec::new();

        for listener in self.snapshot() {
            answers.push(f(listener).await);
        }

        answers
    }
}

/// Events surfaced by a [`ZipGateway`].
#[async_trait]
pub trait AdapterListener: Send + Sync {
    /// A command arrived from a node, mapped from the unsolicited socket
    /// or a per-node connection.
    async fn message_received(
        &self,
        _sender: ZipGateway,
        _root_node_id: u8,
        _end_point: u8,
        _message: Command,
        _header: HeaderExtension,
    ) {
    }

    /// A command arrived on the gateway connection itself without a
    /// matching waiter.
    async fn on_message_received(&self, _sender: ZipGateway, _message: Command) {}

    /// The gateway's node list changed; read the fresh set with
    /// [`ZipGateway::node_ids`].
    async fn node_list_updated(&self, _sender: ZipGateway) {}

    async fn add_node_status(&self, _sender: ZipGateway, _status: NodeAddStatus) {}

    async fn remove_node_status(&self, _sender: ZipGateway, _status: NodeRemoveStatus) {}
}

/// Events surfaced by a [`Node`].
#[async_trait]
pub trait NodeListener: Send + Sync {
    /// Attributes changed; persistence hooks save here. Suppressed and
    /// batched while the node's storage lock is held.
    async fn node_updated(&self, _node: Node) {}

    /// A command class finished (part of) its interview.
    async fn command_class_updated(&self, _node: Node, _class_id: u8) {}

    /// Last-resort inbound dispatch; return true to mark the message
    /// handled.
    async fn on_message(&self, _node: Node, _message: Command) -> bool {
        false
    }
}

/// Events surfaced by an [`Application`](crate::Application).
#[async_trait]
pub trait ApplicationListener: Send + Sync {
    async fn node_added(&self, _sender: crate::Application, _node: Node) {}

    async fn nodes_added(&self, _sender: crate::Application, _nodes: Vec<Node>) {}

    /// `(rootNodeId, endpoint)` of the removed node.
    async fn node_removed(&self, _sender: crate::Application, _node_id: (u8, u8)) {}

    async fn nodes_removed(&self, _sender: crate::Application, _node_ids: Vec<(u8, u8)>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    #[test]
    fn dead_listeners_are_pruned() {
        let listeners: Listeners<Counter> = Listeners::default();
        let keep = Arc::new(Counter(AtomicUsize::new(0)));
        let dropped = Arc::new(Counter(AtomicUsize::new(0)));

        listeners.add(&keep);
        listeners.add(&dropped);
        drop(dropped);

        assert_eq!(listeners.snapshot().len(), 1);
    }

    #[test]
    fn ask_collects_in_order() {
        smol::block_on(async {
            let listeners: Listeners<Counter> = Listeners::default();
            let first = Arc::new(Counter(AtomicUsize::new(1)));
            let second = Arc::new(Counter(AtomicUsize::new(2)));

            listeners.add(&first);
            listeners.add(&second);

            let answers = listeners
                .ask(|l| async move { l.0.load(Ordering::Relaxed) })
                .await;

            assert_eq!(answers, vec![1, 2]);
        });
    }
}
