//! A pure Rust Z/IP Gateway client.
//!
//! zipcrab talks to a Z/IP Gateway over UDP, carrying Z-Wave command
//! class frames inside Z/IP packets. It keeps a model of the nodes in the
//! network (multi channel endpoints included), interviews their supported
//! command classes, buffers traffic for sleeping nodes in a mailbox
//! service and surfaces asynchronous reports through typed listener
//! traits.
//!
//! The layering, bottom up:
//!
//! - [`zipcrab_wire`] (re-exported as [`wire`]): bit-granular codec
//!   primitives.
//! - [`command`]: the [`Command`] frame sum type and its
//!   `(cmdClass, cmd)` registry.
//! - [`Connection`]: one UDP (or DTLS-PSK) datagram flow.
//! - [`ZipConnection`]: Z/IP packet semantics — sequence numbers,
//!   ack/nack/waiting, keep-alives.
//! - [`ZipGateway`]: network management RPCs, per-node sub-connections
//!   and unsolicited intake.
//! - [`Node`] / [`Application`]: the node model and the embedding
//!   facade.

pub mod application;
pub mod command;
pub mod command_class;
pub mod connection;
pub(crate) mod correlator;
pub mod error;
pub mod gateway;
pub mod listener;
pub mod mailbox;
pub mod node;
#[cfg(feature = "serde")]
pub mod persist;
pub mod transport;

use core::future::Future;
use core::pin::Pin;
use core::time::Duration;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use application::Application;
pub use command::{Command, Opaque, ZwaveFrame};
pub use command_class::{ClassState, CommandClass};
pub use connection::Connection;
pub use error::{Error, ProtocolError, TransportError};
pub use gateway::ZipGateway;
pub use listener::{AdapterListener, ApplicationListener, NodeListener};
pub use mailbox::MailboxService;
pub use node::Node;
pub use transport::ZipConnection;
pub use zipcrab_wire as wire;

/// The UDP port Z/IP Gateways, nodes and the unsolicited destination all
/// listen on.
pub const ZIP_PORT: u16 = 4123;

/// Idle time after which a connection pings its peer.
pub(crate) const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Default deadline for acks, replies and RPCs.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lock a mutex, shrugging off poisoning: all guarded sections are short
/// and leave the data consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
