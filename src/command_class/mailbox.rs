//! COMMAND_CLASS_MAILBOX frames. The queueing service built on top of
//! them lives in [`crate::mailbox`].

use super::{zw_enum, COMMAND_CLASS_MAILBOX as CMD_CLASS};
use crate::command::ZwaveFrame;
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use core::net::Ipv6Addr;
use zipcrab_wire::{BitReader, BitWriter, ZipWireRead, ZipWireWrite};

pub const MAILBOX_CONFIGURATION_GET: u8 = 0x01;
pub const MAILBOX_CONFIGURATION_SET: u8 = 0x02;
pub const MAILBOX_CONFIGURATION_REPORT: u8 = 0x03;
pub const MAILBOX_QUEUE: u8 = 0x04;
pub const MAILBOX_WAKEUP_NOTIFICATION: u8 = 0x05;
pub const MAILBOX_NODE_FAILING: u8 = 0x06;
pub const MAILBOX_QUEUE_FLUSH: u8 = 0x07;

zw_enum! {
    /// Mailbox operating mode.
    pub enum MailboxMode {
        Disable = 0x00,
        EnableService = 0x01,
        EnableProxyForwarding = 0x02,
    }
}

zw_enum! {
    /// MAILBOX_QUEUE operation.
    pub enum QueueOperation {
        Push = 0x00,
        Pop = 0x01,
        Waiting = 0x02,
        Ping = 0x03,
        Ack = 0x04,
        Nack = 0x05,
        QueueFull = 0x06,
    }
}

empty_frame! {
    /// MAILBOX_CONFIGURATION_GET.
    MailboxConfigurationGet, CMD_CLASS, MAILBOX_CONFIGURATION_GET,
    "MAILBOX_CONFIGURATION_GET"
}

/// MAILBOX_CONFIGURATION_SET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxConfigurationSet {
    pub mode: MailboxMode,
    pub forwarding_destination_ipv6: Ipv6Addr,
    pub udp_port_number: u16,
}

impl ZwaveFrame for MailboxConfigurationSet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = MAILBOX_CONFIGURATION_SET;
    const NAME: &'static str = "MAILBOX_CONFIGURATION_SET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        reader.skip_bits(5)?;
        let mode = MailboxMode::from(reader.bits(3)?);
        let forwarding_destination_ipv6 = Ipv6Addr::deserialize(reader)?;
        let udp_port_number = u16::deserialize(reader)?;

        Ok(Self {
            mode,
            forwarding_destination_ipv6,
            udp_port_number,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.reserved(5);
        writer.bits(u8::from(self.mode), 3);
        self.forwarding_destination_ipv6
            .serialize(writer)
            .map_err(Error::from)?;
        self.udp_port_number.serialize(writer).map_err(Error::from)
    }
}

/// MAILBOX_CONFIGURATION_REPORT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxConfigurationReport {
    pub supported_modes: u8,
    pub mode: MailboxMode,
    pub mailbox_capacity: u16,
    pub forwarding_destination_ipv6: Ipv6Addr,
    pub udp_port_number: u16,
}

impl ZwaveFrame for MailboxConfigurationReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = MAILBOX_CONFIGURATION_REPORT;
    const NAME: &'static str = "MAILBOX_CONFIGURATION_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        reader.skip_bits(3)?;
        let supported_modes = reader.bits(2)?;
        let mode = MailboxMode::from(reader.bits(3)?);
        let mailbox_capacity = u16::deserialize(reader)?;
        let forwarding_destination_ipv6 = Ipv6Addr::deserialize(reader)?;
        let udp_port_number = u16::deserialize(reader)?;

        Ok(Self {
            supported_modes,
            mode,
            mailbox_capacity,
            forwarding_destination_ipv6,
            udp_port_number,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.reserved(3);
        writer.bits(self.supported_modes, 2);
        writer.bits(u8::from(self.mode), 3);
        self.mailbox_capacity
            .serialize(writer)
            .map_err(Error::from)?;
        self.forwarding_destination_ipv6
            .serialize(writer)
            .map_err(Error::from)?;
        self.udp_port_number.serialize(writer).map_err(Error::from)
    }
}

/// MAILBOX_QUEUE: push/pop/heartbeat traffic for one queue.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MailboxQueue {
    /// This is the final entry for the queue.
    pub last: bool,
    pub operation: QueueOperation,
    pub queue_handle: u8,
    pub mailbox_entry: Vec<u8>,
}

impl Default for QueueOperation {
    fn default() -> Self {
        Self::Push
    }
}

impl ZwaveFrame for MailboxQueue {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = MAILBOX_QUEUE;
    const NAME: &'static str = "MAILBOX_QUEUE";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        reader.skip_bits(4)?;
        let last = reader.bit()?;
        let operation = QueueOperation::from(reader.bits(3)?);
        let queue_handle = reader.byte()?;
        let mailbox_entry = reader.remaining().to_vec();

        Ok(Self {
            last,
            operation,
            queue_handle,
            mailbox_entry,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.reserved(4);
        writer.flag(self.last);
        writer.bits(u8::from(self.operation), 3);
        writer.byte(self.queue_handle).map_err(Error::from)?;
        writer.bytes(&self.mailbox_entry).map_err(Error::from)
    }
}

/// MAILBOX_WAKEUP_NOTIFICATION.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MailboxWakeupNotification {
    pub queue_handle: u8,
}

impl ZwaveFrame for MailboxWakeupNotification {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = MAILBOX_WAKEUP_NOTIFICATION;
    const NAME: &'static str = "MAILBOX_WAKEUP_NOTIFICATION";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            queue_handle: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.queue_handle).map_err(Error::from)
    }
}

/// MAILBOX_NODE_FAILING.
///
/// `queueHandle` is specified as a single byte, but zipgateway (observed
/// on 7.11.01) sends a 16-byte structure instead; a 16-byte payload takes
/// the last byte.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MailboxNodeFailing {
    pub queue_handle: u8,
}

impl ZwaveFrame for MailboxNodeFailing {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = MAILBOX_NODE_FAILING;
    const NAME: &'static str = "MAILBOX_NODE_FAILING";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        if reader.bytes_left() == 16 {
            reader.bytes(15)?;
        }

        Ok(Self {
            queue_handle: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.queue_handle).map_err(Error::from)
    }
}

/// MAILBOX_QUEUE_FLUSH.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MailboxQueueFlush {
    pub queue_handle: u8,
}

impl ZwaveFrame for MailboxQueueFlush {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = MAILBOX_QUEUE_FLUSH;
    const NAME: &'static str = "MAILBOX_QUEUE_FLUSH";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            queue_handle: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.queue_handle).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use pretty_assertions::assert_eq;

    #[test]
    fn configuration_set_round_trip() {
        let set = MailboxConfigurationSet {
            mode: MailboxMode::EnableProxyForwarding,
            forwarding_destination_ipv6: "fd00:aaaa::2".parse().unwrap(),
            udp_port_number: 4123,
        };

        let raw = Command::from(set.clone()).compose().unwrap();

        assert_eq!(raw[2], 0x02);
        assert_eq!(raw.len(), 2 + 1 + 16 + 2);
        assert_eq!(
            Command::decode(&raw).unwrap(),
            Command::MailboxConfigurationSet(set)
        );
    }

    #[test]
    fn queue_round_trip() {
        let queue = MailboxQueue {
            last: true,
            operation: QueueOperation::Pop,
            queue_handle: 3,
            mailbox_entry: vec![0x20, 0x01, 0xff],
        };

        let raw = Command::from(queue.clone()).compose().unwrap();

        // last flag at bit 3, operation in the low three bits
        assert_eq!(raw[2], 0b0000_1001);
        assert_eq!(
            Command::decode(&raw).unwrap(),
            Command::MailboxQueue(queue)
        );
    }

    #[test]
    fn node_failing_single_byte() {
        let raw = [0x69, 0x06, 0x07];
        let Command::MailboxNodeFailing(failing) = Command::decode(&raw).unwrap() else {
            panic!("expected MAILBOX_NODE_FAILING");
        };

        assert_eq!(failing.queue_handle, 7);
    }

    #[test]
    fn node_failing_sixteen_byte_quirk() {
        // zipgateway 7.11.01 wraps the handle in a 16-byte structure; the
        // handle is the last byte.
        let mut raw = vec![0x69, 0x06];

        raw.extend_from_slice(&[0x00; 15]);
        raw.push(0x07);

        let Command::MailboxNodeFailing(failing) = Command::decode(&raw).unwrap() else {
            panic!("expected MAILBOX_NODE_FAILING");
        };

        assert_eq!(failing.queue_handle, 7);
    }
}
