//! Request/response correlation: ack slots keyed by sequence number and
//! one-shot message waiters keyed by frame `hid`.
//!
//! Both tables are registered *before* the request hits the wire, so a
//! reply racing the registration can never be lost. Waiters are woken
//! through [`AtomicWaker`]; the state mutex is held while registering the
//! waker, which orders registration against the transition that wakes it.

use crate::command::Command;
use crate::error::{Error, ProtocolError};
use crate::lock;
use atomic_waker::AtomicWaker;
use core::task::Poll;
use core::time::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Grace period added on top of a nack-waiting node's announced delay.
const QUEUED_GRACE: Duration = Duration::from_secs(60);

/// Grace period when the announced delay is negative: the node should
/// have been awake already.
const UNEXPECTED_SLEEP_GRACE: Duration = Duration::from_secs(120);

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub(crate) enum AckState {
    #[default]
    Pending,
    /// The gateway queued the frame for a sleeping node; the delay is its
    /// announced time-to-wakeup in seconds.
    Queued {
        delay_secs: i32,
    },
    Received,
    Failed,
}

#[derive(Debug, Default)]
struct AckSlot {
    /// State plus a transition counter so a waiter never misses two
    /// transitions in a row.
    state: Mutex<(AckState, u32)>,
    waker: AtomicWaker,
}

impl AckSlot {
    fn transition(&self, state: AckState) {
        let mut guard = lock(&self.state);

        guard.0 = state;
        guard.1 += 1;

        self.waker.wake();
    }
}

/// Ack slots for in-flight sends, keyed by Z/IP sequence number.
#[derive(Debug, Default)]
pub(crate) struct AckRegistry {
    slots: Mutex<HashMap<u8, Arc<AckSlot>>>,
}

impl AckRegistry {
    /// Install a slot for `seq_no`. The returned waiter removes the slot
    /// when dropped. Installing over a live slot is a programmer error.
    pub(crate) fn insert(&self, seq_no: u8) -> Result<AckWait<'_>, Error> {
        let mut slots = lock(&self.slots);

        if slots.contains_key(&seq_no) {
            return Err(ProtocolError::DuplicateAckId(seq_no).into());
        }

        let slot = Arc::new(AckSlot::default());

        slots.insert(seq_no, Arc::clone(&slot));

        Ok(AckWait {
            registry: self,
            seq_no,
            slot,
        })
    }

    fn transition(&self, seq_no: u8, state: AckState) -> bool {
        match lock(&self.slots).get(&seq_no) {
            Some(slot) => {
                slot.transition(state);

                true
            }
            None => false,
        }
    }

    /// Resolve the slot with success. Returns false when nothing waits on
    /// `seq_no`.
    pub(crate) fn received(&self, seq_no: u8) -> bool {
        self.transition(seq_no, AckState::Received)
    }

    /// Mark the slot queued behind a sleeping node.
    pub(crate) fn queued(&self, seq_no: u8, delay_secs: i32) -> bool {
        self.transition(seq_no, AckState::Queued { delay_secs })
    }

    /// Fail the slot: nack without the waiting flag.
    pub(crate) fn failed(&self, seq_no: u8) -> bool {
        self.transition(seq_no, AckState::Failed)
    }
}

/// A pending ack. Dropping it (on success, failure or timeout) frees the
/// sequence number for reuse.
pub(crate) struct AckWait<'a> {
    registry: &'a AckRegistry,
    seq_no: u8,
    slot: Arc<AckSlot>,
}

impl AckWait<'_> {
    async fn next_event(&self, seen: u32) -> (AckState, u32) {
        core::future::poll_fn(|cx| {
            let guard = lock(&self.slot.state);

            if guard.1 != seen {
                return Poll::Ready(*guard);
            }

            // Registering under the state lock orders us against
            // `transition`, which takes the lock before waking.
            self.slot.waker.register(cx.waker());

            Poll::Pending
        })
        .await
    }

    /// Await the ack. A nack-waiting transition extends the deadline to
    /// the node's announced delay plus a grace period; a second silence
    /// is a hard timeout.
    pub(crate) async fn wait(self, timeout: Duration) -> Result<(), Error> {
        let mut deadline = Instant::now() + timeout;
        let mut seen = 0;

        loop {
            let event = async { Some(self.next_event(seen).await) };
            let expiry = async {
                smol::Timer::at(deadline).await;

                None
            };

            match futures_lite::future::or(event, expiry).await {
                Some((AckState::Received, _)) => return Ok(()),
                Some((AckState::Failed, _)) => return Err(ProtocolError::NackFail.into()),
                Some((AckState::Queued { delay_secs }, epoch)) => {
                    seen = epoch;

                    let grace = if delay_secs < 0 {
                        UNEXPECTED_SLEEP_GRACE
                    } else {
                        Duration::from_secs(delay_secs as u64) + QUEUED_GRACE
                    };

                    deadline = Instant::now() + grace;
                }
                Some((AckState::Pending, epoch)) => seen = epoch,
                None => return Err(Error::Timeout),
            }
        }
    }
}

impl Drop for AckWait<'_> {
    fn drop(&mut self) {
        lock(&self.registry.slots).remove(&self.seq_no);
    }
}

#[derive(Debug, Default)]
struct MessageSlot {
    result: Mutex<Option<Command>>,
    waker: AtomicWaker,
}

/// One-shot reply waiters keyed by frame `hid`. The first matching
/// inbound frame wins.
#[derive(Debug, Default)]
pub(crate) struct MessageWaiters {
    slots: Mutex<HashMap<u16, Arc<MessageSlot>>>,
}

impl MessageWaiters {
    /// Install a waiter for `hid` ahead of the send, so the reply cannot
    /// race the registration.
    pub(crate) fn add_waiting_session(&self, hid: u16) {
        lock(&self.slots).entry(hid).or_default();
    }

    /// Offer an inbound frame to the waiter table. Consumes the matching
    /// slot and returns true when someone was waiting.
    pub(crate) fn message_received(&self, command: &Command) -> bool {
        let Some(slot) = lock(&self.slots).remove(&command.hid()) else {
            return false;
        };

        *lock(&slot.result) = Some(command.clone());
        slot.waker.wake();

        true
    }

    /// Await the frame registered under `hid`, installing the slot if
    /// [`Self::add_waiting_session`] did not already. The slot is cleaned
    /// up on every exit path.
    pub(crate) async fn wait_for_message(
        &self,
        hid: u16,
        timeout: Duration,
    ) -> Result<Command, Error> {
        let slot = Arc::clone(lock(&self.slots).entry(hid).or_default());

        let received = async {
            core::future::poll_fn(|cx| {
                let mut result = lock(&slot.result);

                if let Some(command) = result.take() {
                    return Poll::Ready(command);
                }

                slot.waker.register(cx.waker());

                Poll::Pending
            })
            .await
        };
        let expiry = async {
            smol::Timer::after(timeout).await;
        };

        let outcome = futures_lite::future::or(
            async { Some(received.await) },
            async {
                expiry.await;

                None
            },
        )
        .await;

        // On timeout the slot may still sit in the table; only remove it
        // if it is ours (a fulfilled slot was already taken out, and a
        // later waiter may have installed a fresh one).
        let mut slots = lock(&self.slots);

        if slots.get(&hid).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
            slots.remove(&hid);
        }

        drop(slots);

        outcome.ok_or(Error::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_class::network_management_proxy::NodeListGet;
    use crate::command::ZwaveFrame;

    #[test]
    fn ack_resolves() {
        smol::block_on(async {
            let registry = AckRegistry::default();
            let wait = registry.insert(7).unwrap();

            assert!(registry.received(7));
            wait.wait(Duration::from_millis(100)).await.unwrap();

            // Slot freed on drop; the seq number can be reused.
            registry.insert(7).unwrap();
        });
    }

    #[test]
    fn duplicate_seq_is_programmer_error() {
        let registry = AckRegistry::default();
        let _wait = registry.insert(7).unwrap();

        assert_eq!(
            registry.insert(7).err(),
            Some(Error::Protocol(ProtocolError::DuplicateAckId(7)))
        );
    }

    #[test]
    fn ack_timeout() {
        smol::block_on(async {
            let registry = AckRegistry::default();
            let wait = registry.insert(1).unwrap();

            assert_eq!(
                wait.wait(Duration::from_millis(20)).await,
                Err(Error::Timeout)
            );
            assert!(!registry.received(1));
        });
    }

    #[test]
    fn nack_fails_fast() {
        smol::block_on(async {
            let registry = AckRegistry::default();
            let wait = registry.insert(1).unwrap();

            registry.failed(1);

            assert_eq!(
                wait.wait(Duration::from_millis(100)).await,
                Err(Error::Protocol(ProtocolError::NackFail))
            );
        });
    }

    #[test]
    fn queued_extends_deadline() {
        smol::block_on(async {
            let registry = Arc::new(AckRegistry::default());
            let wait = registry.insert(9).unwrap();

            let resolver = {
                let registry = Arc::clone(&registry);

                smol::spawn(async move {
                    // Queue before the original 50 ms deadline, ack after
                    // it: only the extended deadline lets this succeed.
                    smol::Timer::after(Duration::from_millis(20)).await;
                    registry.queued(9, 0);
                    smol::Timer::after(Duration::from_millis(80)).await;
                    registry.received(9);
                })
            };

            wait.wait(Duration::from_millis(50)).await.unwrap();
            resolver.await;
        });
    }

    #[test]
    fn waiter_fulfilled_out_of_order() {
        smol::block_on(async {
            let waiters = MessageWaiters::default();
            let command = Command::from(NodeListGet { seq_no: 1 });

            // Register, deliver, then await: the result must not be lost.
            waiters.add_waiting_session(NodeListGet::HID);
            assert!(waiters.message_received(&command));

            let got = waiters
                .wait_for_message(NodeListGet::HID, Duration::from_millis(50))
                .await
                .unwrap();

            assert_eq!(got, command);
        });
    }

    #[test]
    fn waiter_ignores_unrelated() {
        smol::block_on(async {
            let waiters = MessageWaiters::default();

            assert!(!waiters.message_received(&Command::from(NodeListGet { seq_no: 1 })));
            assert_eq!(
                waiters
                    .wait_for_message(0x5202, Duration::from_millis(20))
                    .await,
                Err(Error::Timeout)
            );
        });
    }
}
