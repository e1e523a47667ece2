//! Mailbox service: queues commands for sleeping nodes until they wake.
//!
//! Entries are deduplicated by CRC-16/AUG-CCITT over the payload. While
//! an entry waits, a heartbeat task tells the node's queue every 60 s
//! that the frame is still pending (every tenth beat is a PING). A
//! wakeup notification or queue ack pops the next entry.

use crate::command::Command;
use crate::command_class::mailbox::{
    MailboxConfigurationSet, MailboxMode, MailboxQueue, QueueOperation,
};
use crate::command_class::zip::HeaderExtension;
use crate::error::Error;
use crate::gateway::ZipGateway;
use crate::listener::AdapterListener;
use crate::lock;
use crate::DEFAULT_TIMEOUT;
use async_trait::async_trait;
use core::time::Duration;
use crc::Crc;
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::{Arc, Mutex, Weak};

/// CRC-16/AUG-CCITT, the checksum the mailbox specification names for
/// entry deduplication.
const CRC16: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_SPI_FUJITSU);

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Every tenth heartbeat is a PING instead of WAITING.
const PING_EVERY: u32 = 10;

struct QueueItem {
    node_id: u8,
    handle: u8,
    data: Vec<u8>,
    crc: u16,
    heartbeat: Mutex<Option<smol::Task<()>>>,
}

impl QueueItem {
    fn new(node_id: u8, handle: u8, data: Vec<u8>) -> Arc<Self> {
        let crc = CRC16.checksum(&data);

        Arc::new(Self {
            node_id,
            handle,
            data,
            crc,
            heartbeat: Mutex::new(None),
        })
    }

    /// Start telling the node's queue we are still here.
    fn start_heartbeat(self: &Arc<Self>, adapter: ZipGateway) {
        let item = Arc::clone(self);

        let task = smol::spawn(async move {
            let mut beat = 0u32;

            loop {
                smol::Timer::after(HEARTBEAT_INTERVAL).await;
                beat += 1;

                let operation = if beat % PING_EVERY == 0 {
                    QueueOperation::Ping
                } else {
                    QueueOperation::Waiting
                };
                let queue = MailboxQueue {
                    last: false,
                    operation,
                    queue_handle: item.handle,
                    mailbox_entry: item.data.clone(),
                };

                if let Err(e) = adapter
                    .send_to_node(item.node_id, queue.into(), 0, 0, DEFAULT_TIMEOUT)
                    .await
                {
                    log::warn!("mailbox heartbeat to node {} failed: {}", item.node_id, e);
                }
            }
        });

        *lock(&self.heartbeat) = Some(task);
    }

    fn stop_heartbeat(&self) {
        lock(&self.heartbeat).take();
    }
}

/// Gateway-side mailbox for sleeping nodes.
pub struct MailboxService {
    inner: Arc<MailboxInner>,
    /// Keeps the weakly registered adapter listener alive.
    _bridge: Arc<MailboxBridge>,
}

struct MailboxInner {
    adapter: ZipGateway,
    last_queue_id: Mutex<Option<u8>>,
    queues: Mutex<HashMap<u8, Vec<Arc<QueueItem>>>>,
}

impl MailboxService {
    pub fn new(adapter: &ZipGateway) -> Self {
        let inner = Arc::new(MailboxInner {
            adapter: adapter.clone(),
            last_queue_id: Mutex::new(None),
            queues: Mutex::new(HashMap::new()),
        });
        let bridge = Arc::new(MailboxBridge {
            inner: Arc::downgrade(&inner),
        });

        adapter.add_listener(&(Arc::clone(&bridge) as Arc<dyn AdapterListener>));

        Self {
            inner,
            _bridge: bridge,
        }
    }

    /// Tell the gateway to forward mailbox traffic to us.
    pub async fn initialize(&self, destination: Ipv6Addr, port: u16) -> Result<(), Error> {
        self.inner
            .adapter
            .send(
                MailboxConfigurationSet {
                    mode: MailboxMode::EnableProxyForwarding,
                    forwarding_destination_ipv6: destination,
                    udp_port_number: port,
                }
                .into(),
            )
            .await
    }

    /// Queue a payload for a sleeping node. Returns false (silently, per
    /// the dedup contract) when an identical payload is already queued.
    pub async fn push(&self, node_id: u8, queue_handle: u8, data: Vec<u8>) -> bool {
        self.inner.push(node_id, queue_handle, data).await
    }

    /// Entries currently queued for `queue_handle`.
    pub fn queue_len(&self, queue_handle: u8) -> usize {
        lock(&self.inner.queues)
            .get(&queue_handle)
            .map_or(0, Vec::len)
    }

    /// Cancel every heartbeat and drop all queues.
    pub fn stop(&self) {
        for (_, items) in lock(&self.inner.queues).drain() {
            for item in items {
                item.stop_heartbeat();
            }
        }
    }
}

impl MailboxInner {
    async fn push(&self, node_id: u8, queue_handle: u8, data: Vec<u8>) -> bool {
        let item = QueueItem::new(node_id, queue_handle, data);

        {
            let queues = lock(&self.queues);

            if queues
                .get(&queue_handle)
                .is_some_and(|items| items.iter().any(|i| i.crc == item.crc))
            {
                return false;
            }
        }

        let queue = MailboxQueue {
            last: false,
            operation: QueueOperation::Waiting,
            queue_handle,
            mailbox_entry: item.data.clone(),
        };

        if let Err(e) = self
            .adapter
            .send_to_node(node_id, queue.into(), 0, 0, DEFAULT_TIMEOUT)
            .await
        {
            log::warn!("mailbox push to node {} failed: {}", node_id, e);

            return false;
        }

        item.start_heartbeat(self.adapter.clone());

        let mut queues = lock(&self.queues);
        let items = queues.entry(queue_handle).or_default();

        // Re-check: an identical payload may have landed while we talked
        // to the node.
        if items.iter().any(|i| i.crc == item.crc) {
            item.stop_heartbeat();

            return false;
        }

        items.push(item);

        true
    }

    /// Deliver the next entry of `queue_handle` to a now-awake node.
    async fn pop(&self, node_id: u8, queue_handle: u8) {
        let (item, now_empty) = {
            let mut queues = lock(&self.queues);
            let items = queues.entry(queue_handle).or_default();
            let item = items.pop();

            (item, items.is_empty())
        };

        let queue = match &item {
            Some(item) => MailboxQueue {
                last: now_empty,
                operation: QueueOperation::Pop,
                queue_handle,
                mailbox_entry: item.data.clone(),
            },
            None => MailboxQueue {
                last: true,
                operation: QueueOperation::Pop,
                queue_handle,
                mailbox_entry: Vec::new(),
            },
        };

        match self
            .adapter
            .send_to_node(node_id, queue.into(), 0, 0, DEFAULT_TIMEOUT)
            .await
        {
            Ok(()) => {
                if let Some(item) = item {
                    item.stop_heartbeat();
                }
            }
            Err(e) => log::warn!("mailbox pop to node {} failed: {}", node_id, e),
        }
    }
}

struct MailboxBridge {
    inner: Weak<MailboxInner>,
}

#[async_trait]
impl AdapterListener for MailboxBridge {
    async fn message_received(
        &self,
        _sender: ZipGateway,
        root_node_id: u8,
        _end_point: u8,
        message: Command,
        _header: HeaderExtension,
    ) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };

        match message {
            Command::MailboxWakeupNotification(wakeup) => {
                *lock(&inner.last_queue_id) = Some(wakeup.queue_handle);

                inner.pop(root_node_id, wakeup.queue_handle).await;
            }
            Command::MailboxQueue(queue) => match queue.operation {
                QueueOperation::Ack => {
                    let handle = if queue.queue_handle != 0 {
                        queue.queue_handle
                    } else {
                        lock(&inner.last_queue_id).unwrap_or(0)
                    };

                    inner.pop(root_node_id, handle).await;
                }
                QueueOperation::Push => {
                    inner
                        .push(root_node_id, queue.queue_handle, queue.mailbox_entry)
                        .await;
                }
                _ => {}
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_is_aug_ccitt() {
        // The catalog check value for CRC-16/AUG-CCITT.
        assert_eq!(CRC16.checksum(b"123456789"), 0xe5cc);
    }
}
