//! The node and endpoint model: command class ownership, NIF parsing,
//! inbound dispatch (supervision included), the interview loop and the
//! storage lock batching persistence notifications.

use crate::command::{Command, ZwaveFrame};
use crate::command_class::supervision::SupervisionReport;
use crate::command_class::version::{VersionCommandClassGet, VersionCommandClassReport};
use crate::command_class::{
    class_spec, CommandClass, MARK_SECURITY_SCHEME_0, MARK_SUPPORT_CONTROL,
};
use crate::error::Error;
use crate::gateway::ZipGateway;
use crate::listener::{Listeners, NodeListener};
use crate::{lock, DEFAULT_TIMEOUT};
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use core::time::Duration;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::correlator::MessageWaiters;

/// Persistence-dirty tracking; see [`Node::storage_lock`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
enum StorageState {
    #[default]
    Clean,
    LockedClean,
    LockedDirty,
}

/// One addressable entity: a root node (`endpoint == 0`) or a
/// multi channel endpoint delegating its connectivity attributes to the
/// root. Cheap to clone.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    root_node_id: u8,
    endpoint: u8,
    parent: Option<Node>,
    adapter: ZipGateway,
    listening: AtomicBool,
    flirs: AtomicBool,
    is_failed: AtomicBool,
    basic_device_class: AtomicU8,
    generic_device_class: AtomicU8,
    specific_device_class: AtomicU8,
    supported: Mutex<BTreeMap<u8, CommandClass>>,
    controlled: Mutex<BTreeMap<u8, CommandClass>>,
    waiters: MessageWaiters,
    storage: Mutex<StorageState>,
    listeners: Listeners<dyn NodeListener>,
}

/// Walk a raw NIF byte sequence into supported/controlled class maps.
///
/// `0xF1 0x00` is the Security Scheme 0 mark: what follows is supported
/// and S0-protected. `0xEF` is the support/control mark: what follows is
/// controlled. Extended ids (first byte `0xF1..=0xFF`) occupy two bytes.
fn parse_nif(nif: &[u8]) -> (BTreeMap<u8, CommandClass>, BTreeMap<u8, CommandClass>) {
    let mut supported = BTreeMap::new();
    let mut controlled = BTreeMap::new();
    let mut security_s0 = false;
    let mut in_controlled = false;
    let mut at = 0;

    while at < nif.len() {
        let byte = nif[at];

        if byte == MARK_SECURITY_SCHEME_0[0] && nif.get(at + 1) == Some(&MARK_SECURITY_SCHEME_0[1])
        {
            security_s0 = true;
            in_controlled = false;
            at += 2;

            continue;
        }

        if byte == MARK_SUPPORT_CONTROL {
            in_controlled = true;
            at += 1;

            continue;
        }

        // An extended id occupies two bytes; no extended class is
        // registered yet, so it loads as unknown under its first byte.
        if byte >= 0xf1 {
            at += 1;
        }

        let class = CommandClass::load(byte, security_s0);

        if in_controlled {
            controlled.insert(byte, class);
        } else {
            supported.insert(byte, class);
        }

        at += 1;
    }

    (supported, controlled)
}

impl Node {
    /// Build a root node from its NIF class bytes.
    pub fn new(adapter: &ZipGateway, root_node_id: u8, nif: &[u8]) -> Self {
        let (supported, controlled) = parse_nif(nif);

        Self {
            inner: Arc::new(NodeInner {
                root_node_id,
                endpoint: 0,
                parent: None,
                adapter: adapter.clone(),
                listening: AtomicBool::new(false),
                flirs: AtomicBool::new(false),
                is_failed: AtomicBool::new(false),
                basic_device_class: AtomicU8::new(0),
                generic_device_class: AtomicU8::new(0),
                specific_device_class: AtomicU8::new(0),
                supported: Mutex::new(supported),
                controlled: Mutex::new(controlled),
                waiters: MessageWaiters::default(),
                storage: Mutex::new(StorageState::Clean),
                listeners: Listeners::default(),
            }),
        }
    }

    /// Build an endpoint view sharing the parent's connectivity
    /// attributes but owning its own command class set.
    pub fn new_endpoint(parent: &Node, endpoint: u8, nif: &[u8]) -> Self {
        let (supported, controlled) = parse_nif(nif);

        Self {
            inner: Arc::new(NodeInner {
                root_node_id: parent.root_node_id(),
                endpoint,
                parent: Some(parent.clone()),
                adapter: parent.inner.adapter.clone(),
                listening: AtomicBool::new(false),
                flirs: AtomicBool::new(false),
                is_failed: AtomicBool::new(false),
                basic_device_class: AtomicU8::new(0),
                generic_device_class: AtomicU8::new(0),
                specific_device_class: AtomicU8::new(0),
                supported: Mutex::new(supported),
                controlled: Mutex::new(controlled),
                waiters: MessageWaiters::default(),
                storage: Mutex::new(StorageState::Clean),
                listeners: Listeners::default(),
            }),
        }
    }

    pub fn root_node_id(&self) -> u8 {
        self.inner.root_node_id
    }

    pub fn endpoint(&self) -> u8 {
        self.inner.endpoint
    }

    /// `(rootNodeId, endpoint)` identity of this node.
    pub fn id(&self) -> (u8, u8) {
        (self.inner.root_node_id, self.inner.endpoint)
    }

    pub fn adapter(&self) -> &ZipGateway {
        &self.inner.adapter
    }

    pub fn add_listener(&self, listener: &Arc<dyn NodeListener>) {
        self.inner.listeners.add(listener);
    }

    pub fn listening(&self) -> bool {
        match &self.inner.parent {
            Some(parent) => parent.listening(),
            None => self.inner.listening.load(Ordering::Relaxed),
        }
    }

    pub fn set_listening(&self, listening: bool) {
        self.inner.listening.store(listening, Ordering::Relaxed);
    }

    /// A frequently listening (FLiRS) node sleeps between wakeup beams.
    pub fn flirs(&self) -> bool {
        match &self.inner.parent {
            Some(parent) => parent.flirs(),
            None => self.inner.flirs.load(Ordering::Relaxed),
        }
    }

    pub fn set_flirs(&self, flirs: bool) {
        self.inner.flirs.store(flirs, Ordering::Relaxed);
    }

    pub fn is_failed(&self) -> bool {
        match &self.inner.parent {
            Some(parent) => parent.is_failed(),
            None => self.inner.is_failed.load(Ordering::Relaxed),
        }
    }

    pub fn set_is_failed(&self, is_failed: bool) {
        self.inner.is_failed.store(is_failed, Ordering::Relaxed);
    }

    pub fn basic_device_class(&self) -> u8 {
        match &self.inner.parent {
            Some(parent) => parent.basic_device_class(),
            None => self.inner.basic_device_class.load(Ordering::Relaxed),
        }
    }

    pub fn set_basic_device_class(&self, class: u8) {
        self.inner.basic_device_class.store(class, Ordering::Relaxed);
    }

    pub fn generic_device_class(&self) -> u8 {
        self.inner.generic_device_class.load(Ordering::Relaxed)
    }

    pub fn set_generic_device_class(&self, class: u8) {
        self.inner
            .generic_device_class
            .store(class, Ordering::Relaxed);
    }

    pub fn specific_device_class(&self) -> u8 {
        self.inner.specific_device_class.load(Ordering::Relaxed)
    }

    pub fn set_specific_device_class(&self, class: u8) {
        self.inner
            .specific_device_class
            .store(class, Ordering::Relaxed);
    }

    pub fn supports(&self, class_id: u8) -> bool {
        lock(&self.inner.supported).contains_key(&class_id)
    }

    pub fn supported_classes(&self) -> Vec<u8> {
        lock(&self.inner.supported).keys().copied().collect()
    }

    pub fn controlled_classes(&self) -> Vec<u8> {
        lock(&self.inner.controlled).keys().copied().collect()
    }

    /// Read-only access to one supported class.
    pub fn with_class<T>(&self, class_id: u8, f: impl FnOnce(&CommandClass) -> T) -> Option<T> {
        lock(&self.inner.supported).get(&class_id).map(|cc| f(cc))
    }

    /// Mutate one supported class and mark the node dirty.
    pub(crate) fn with_supported_class<T>(
        &self,
        class_id: u8,
        f: impl FnOnce(&mut CommandClass) -> T,
    ) -> Option<T> {
        let out = lock(&self.inner.supported).get_mut(&class_id).map(f);

        if out.is_some() {
            self.touch();
        }

        out
    }

    /// Send a command to this node (root endpoint semantics are implied
    /// by `endpoint == 0`).
    pub async fn send(&self, command: Command) -> Result<(), Error> {
        self.send_with(command, 0, DEFAULT_TIMEOUT).await
    }

    pub async fn send_with(
        &self,
        command: Command,
        source_ep: u8,
        timeout: Duration,
    ) -> Result<(), Error> {
        self.inner
            .adapter
            .send_to_node(
                self.inner.root_node_id,
                command,
                source_ep,
                self.inner.endpoint,
                timeout,
            )
            .await
    }

    /// Send a command and await the first reply of type `R`, with the
    /// waiter registered before the send.
    pub async fn send_and_receive<R>(&self, command: impl Into<Command>) -> Result<R, Error>
    where
        R: ZwaveFrame + TryFrom<Command>,
    {
        self.send_and_receive_timeout(command, DEFAULT_TIMEOUT).await
    }

    pub async fn send_and_receive_timeout<R>(
        &self,
        command: impl Into<Command>,
        timeout: Duration,
    ) -> Result<R, Error>
    where
        R: ZwaveFrame + TryFrom<Command>,
    {
        self.inner.waiters.add_waiting_session(R::HID);
        self.send_with(command.into(), 0, timeout).await?;

        let reply = self
            .inner
            .waiters
            .wait_for_message(R::HID, timeout)
            .await?;

        R::try_from(reply).map_err(|_| Error::Internal)
    }

    /// Register interest in the next frame of type `R` without sending.
    pub fn add_waiting_session<R: ZwaveFrame>(&self) {
        self.inner.waiters.add_waiting_session(R::HID);
    }

    /// Await a previously registered session.
    pub async fn wait_for_message<R>(&self, timeout: Duration) -> Result<R, Error>
    where
        R: ZwaveFrame + TryFrom<Command>,
    {
        let reply = self
            .inner
            .waiters
            .wait_for_message(R::HID, timeout)
            .await?;

        R::try_from(reply).map_err(|_| Error::Internal)
    }

    /// Dispatch an inbound command addressed to this node.
    ///
    /// Supervision envelopes are unwrapped: the inner command goes
    /// through normal dispatch and a SUPERVISION_REPORT answers with the
    /// outcome. Returns [`Error::Unhandled`] when nothing consumed the
    /// message.
    pub async fn handle_message(&self, message: Command) -> Result<bool, Error> {
        let handled = match message {
            Command::SupervisionGet(get) => {
                let inner_handled = self.dispatch((*get.command).clone()).await;
                let report = SupervisionReport::done(get.session_id, inner_handled);

                if let Err(e) = self.send(report.into()).await {
                    log::warn!("supervision report to node {} failed: {}", self.inner.root_node_id, e);
                }

                inner_handled
            }
            other => self.dispatch(other).await,
        };

        if handled {
            Ok(true)
        } else {
            Err(Error::Unhandled)
        }
    }

    async fn dispatch(&self, message: Command) -> bool {
        // Session waiters first: a solicited reply must not leak into the
        // class handlers.
        if self.inner.waiters.message_received(&message) {
            return true;
        }

        let class_id = message.cmd_class();
        let class_handled = lock(&self.inner.supported)
            .get_mut(&class_id)
            .map(|cc| cc.handle_message(&message));

        match class_handled {
            Some(true) => {
                self.touch();

                return true;
            }
            Some(false) | None => {}
        }

        let answers = self
            .inner
            .listeners
            .ask(|l| {
                let node = self.clone();
                let message = message.clone();

                async move { l.on_message(node, message).await }
            })
            .await;

        if answers.into_iter().any(|handled| handled) {
            return true;
        }

        log::info!(
            "node {}:{} left {} unhandled",
            self.inner.root_node_id,
            self.inner.endpoint,
            message.name()
        );

        false
    }

    /// Interview every supported command class. Per-class failures are
    /// logged and the loop continues.
    pub async fn interview(&self) -> Result<(), Error> {
        for class_id in self.supported_classes() {
            match self.interview_class(class_id).await {
                Ok(true) => {}
                Ok(false) => log::warn!(
                    "unable to determine version for class 0x{:02X} on node {}",
                    class_id,
                    self.inner.root_node_id
                ),
                Err(e) => log::warn!(
                    "interview of class 0x{:02X} on node {} failed: {}",
                    class_id,
                    self.inner.root_node_id,
                    e
                ),
            }
        }

        Ok(())
    }

    /// Interview one class: probe the version when unknown, run the
    /// class-specific steps, mark interviewed and announce the update.
    pub async fn interview_class(&self, class_id: u8) -> Result<bool, Error> {
        let Some(version) = self.with_class(class_id, |cc| cc.version()) else {
            return Err(Error::NotFound);
        };

        let version = if version == 0 {
            self.request_class_version(class_id).await?
        } else {
            version
        };

        if version == 0 {
            return Ok(false);
        }

        if let Some(spec) = class_spec(class_id) {
            (spec.interview)(self, class_id).await?;
        }

        self.with_supported_class(class_id, |cc| cc.set_interviewed(true));
        self.speak_command_class_updated(class_id);

        Ok(true)
    }

    /// Probe a class version; a timeout leaves it at 0.
    pub async fn request_class_version(&self, class_id: u8) -> Result<u8, Error> {
        let report: VersionCommandClassReport = match self
            .send_and_receive(VersionCommandClassGet {
                requested_command_class: class_id,
            })
            .await
        {
            Ok(report) => report,
            Err(Error::Timeout) => return Ok(0),
            Err(e) => return Err(e),
        };

        self.with_supported_class(class_id, |cc| {
            cc.set_version(report.command_class_version)
        });
        self.speak_command_class_updated(class_id);

        Ok(report.command_class_version)
    }

    /// Enter the batch region: `nodeUpdated` is suppressed until the
    /// guard drops, then emitted at most once.
    ///
    /// # Panics
    ///
    /// The lock is not re-entrant; acquiring it twice is a programmer
    /// error.
    pub fn storage_lock(&self) -> StorageLock {
        let mut state = lock(&self.inner.storage);

        match *state {
            StorageState::Clean => *state = StorageState::LockedClean,
            StorageState::LockedClean | StorageState::LockedDirty => {
                panic!("storage lock is not re-entrant")
            }
        }

        StorageLock { node: self.clone() }
    }

    /// Record an attribute change, emitting `nodeUpdated` now or at
    /// guard drop.
    pub(crate) fn touch(&self) {
        let mut state = lock(&self.inner.storage);

        match *state {
            StorageState::Clean => {
                drop(state);
                self.speak_node_updated();
            }
            StorageState::LockedClean => *state = StorageState::LockedDirty,
            StorageState::LockedDirty => {}
        }
    }

    fn speak_node_updated(&self) {
        let node = self.clone();

        self.inner.listeners.speak(move |l| {
            let node = node.clone();

            async move { l.node_updated(node).await }
        });
    }

    fn speak_command_class_updated(&self, class_id: u8) {
        let node = self.clone();

        self.inner.listeners.speak(move |l| {
            let node = node.clone();

            async move { l.command_class_updated(node, class_id).await }
        });
    }
}

impl core::fmt::Debug for Node {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node")
            .field("root_node_id", &self.inner.root_node_id)
            .field("endpoint", &self.inner.endpoint)
            .field("supported", &self.supported_classes())
            .finish()
    }
}

/// Guard for the batch region opened by [`Node::storage_lock`]. Dropping
/// it emits the deferred `nodeUpdated` exactly once if anything changed.
pub struct StorageLock {
    node: Node,
}

impl Drop for StorageLock {
    fn drop(&mut self) {
        let dirty = {
            let mut state = lock(&self.node.inner.storage);
            let dirty = matches!(*state, StorageState::LockedDirty);

            *state = StorageState::Clean;

            dirty
        };

        if dirty {
            self.node.speak_node_updated();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_class::{
        COMMAND_CLASS_BASIC, COMMAND_CLASS_BATTERY, COMMAND_CLASS_SWITCH_BINARY,
        COMMAND_CLASS_VERSION, COMMAND_CLASS_ZWAVEPLUS_INFO,
    };

    #[test]
    fn nif_walk_plain() {
        let (supported, controlled) = parse_nif(&[
            COMMAND_CLASS_ZWAVEPLUS_INFO,
            COMMAND_CLASS_SWITCH_BINARY,
            COMMAND_CLASS_VERSION,
        ]);

        assert_eq!(supported.len(), 3);
        assert!(controlled.is_empty());
        assert!(!supported[&COMMAND_CLASS_VERSION].security_s0());
    }

    #[test]
    fn nif_walk_control_mark() {
        let (supported, controlled) =
            parse_nif(&[COMMAND_CLASS_BASIC, 0xef, COMMAND_CLASS_SWITCH_BINARY]);

        assert_eq!(supported.len(), 1);
        assert!(supported.contains_key(&COMMAND_CLASS_BASIC));
        assert_eq!(controlled.len(), 1);
        assert!(controlled.contains_key(&COMMAND_CLASS_SWITCH_BINARY));
    }

    #[test]
    fn nif_walk_security_mark() {
        let (supported, _) = parse_nif(&[
            COMMAND_CLASS_BASIC,
            0xf1,
            0x00,
            COMMAND_CLASS_BATTERY,
        ]);

        assert!(!supported[&COMMAND_CLASS_BASIC].security_s0());
        assert!(supported[&COMMAND_CLASS_BATTERY].security_s0());
    }

    #[test]
    fn security_mark_resets_control() {
        let (supported, controlled) = parse_nif(&[
            0xef,
            COMMAND_CLASS_BASIC,
            0xf1,
            0x00,
            COMMAND_CLASS_BATTERY,
        ]);

        assert!(controlled.contains_key(&COMMAND_CLASS_BASIC));
        assert!(supported.contains_key(&COMMAND_CLASS_BATTERY));
    }
}
