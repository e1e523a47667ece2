//! COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION: adding, removing and
//! repairing nodes, including the S2 bootstrapping exchanges.

use super::{zw_enum, COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION as CMD_CLASS};
use crate::command::ZwaveFrame;
use crate::error::Error;
use zipcrab_wire::{BitReader, BitWriter, Dsk, WireError, ZipWireRead, ZipWireWrite};

pub const NODE_ADD: u8 = 0x01;
pub const NODE_ADD_STATUS: u8 = 0x02;
pub const NODE_REMOVE: u8 = 0x03;
pub const NODE_REMOVE_STATUS: u8 = 0x04;
pub const FAILED_NODE_REMOVE: u8 = 0x07;
pub const FAILED_NODE_REMOVE_STATUS: u8 = 0x08;
pub const FAILED_NODE_REPLACE: u8 = 0x09;
pub const FAILED_NODE_REPLACE_STATUS: u8 = 0x0a;
pub const NODE_NEIGHBOR_UPDATE_REQUEST: u8 = 0x0b;
pub const NODE_NEIGHBOR_UPDATE_STATUS: u8 = 0x0c;
pub const RETURN_ROUTE_ASSIGN: u8 = 0x0d;
pub const RETURN_ROUTE_ASSIGN_COMPLETE: u8 = 0x0e;
pub const RETURN_ROUTE_DELETE: u8 = 0x0f;
pub const RETURN_ROUTE_DELETE_COMPLETE: u8 = 0x10;
pub const NODE_ADD_KEYS_REPORT: u8 = 0x11;
pub const NODE_ADD_KEYS_SET: u8 = 0x12;
pub const NODE_ADD_DSK_REPORT: u8 = 0x13;
pub const NODE_ADD_DSK_SET: u8 = 0x14;
pub const SMART_START_JOIN_STARTED_REPORT: u8 = 0x15;

zw_enum! {
    /// Outcome of an add/remove operation.
    pub enum InclusionStatus {
        Ok = 0x01,
        Done = 0x06,
        Failed = 0x07,
        SecurityFailed = 0x09,
    }
}

zw_enum! {
    /// NODE_ADD mode.
    pub enum AddNodeMode {
        Any = 0x01,
        Stop = 0x05,
        /// Any node, S2 bootstrapping included.
        AnyS2 = 0x07,
    }
}

zw_enum! {
    /// NODE_REMOVE mode.
    pub enum RemoveNodeMode {
        Any = 0x01,
        Stop = 0x05,
    }
}

bitflags::bitflags! {
    /// Z-Wave transmit options used when including a node.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
    pub struct TransmitOptions: u8 {
        const ACK = 0x01;
        const LOW_POWER = 0x02;
        const AUTO_ROUTE = 0x04;
        const NO_ROUTE = 0x10;
        const EXPLORE = 0x20;
    }
}

bitflags::bitflags! {
    /// S2 key classes granted during bootstrapping.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
    pub struct SecurityKeys: u8 {
        const S2_UNAUTHENTICATED = 0x01;
        const S2_AUTHENTICATED = 0x02;
        const S2_ACCESS_CONTROL = 0x04;
        const S0 = 0x80;
    }
}

/// NODE_ADD.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NodeAdd {
    pub seq_no: u8,
    pub mode: AddNodeMode,
    pub tx_options: TransmitOptions,
}

impl Default for AddNodeMode {
    fn default() -> Self {
        Self::AnyS2
    }
}

impl Default for RemoveNodeMode {
    fn default() -> Self {
        Self::Any
    }
}

impl Default for InclusionStatus {
    fn default() -> Self {
        Self::Failed
    }
}

impl ZwaveFrame for NodeAdd {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_ADD;
    const NAME: &'static str = "NODE_ADD";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        reader.skip_bits(8)?;
        let mode = AddNodeMode::from(reader.byte()?);
        let tx_options = TransmitOptions::from_bits_retain(reader.byte()?);

        Ok(Self {
            seq_no,
            mode,
            tx_options,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.reserved(8);
        writer.byte(self.mode.into()).map_err(Error::from)?;
        writer.byte(self.tx_options.bits()).map_err(Error::from)
    }
}

/// NODE_ADD_STATUS: outcome of an inclusion, carrying the new node's NIF.
///
/// `nodeInfoLength` covers itself, the two capability bytes, the three
/// device class bytes and the command class list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeAddStatus {
    pub seq_no: u8,
    pub status: InclusionStatus,
    pub new_node_id: u8,
    pub listening: bool,
    pub zwave_protocol: u8,
    pub opt_func: bool,
    pub sensor_1000ms: bool,
    pub sensor_250ms: bool,
    pub zwave_protocol2: u8,
    pub basic_device_class: u8,
    pub generic_device_class: u8,
    pub specific_device_class: u8,
    pub command_classes: Vec<u8>,
    pub granted_keys: SecurityKeys,
    pub kex_fail_type: u8,
    /// Present from protocol version 3 on; `Some(empty)` when the frame
    /// carried a zero length.
    pub dsk: Option<Dsk>,
}

impl ZwaveFrame for NodeAddStatus {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_ADD_STATUS;
    const NAME: &'static str = "NODE_ADD_STATUS";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        let status = InclusionStatus::from(reader.byte()?);
        reader.skip_bits(8)?;
        let new_node_id = reader.byte()?;
        let node_info_length = reader.byte()?;
        let listening = reader.bit()?;
        let zwave_protocol = reader.bits(7)?;
        let opt_func = reader.bit()?;
        let sensor_1000ms = reader.bit()?;
        let sensor_250ms = reader.bit()?;
        let zwave_protocol2 = reader.bits(5)?;
        let basic_device_class = reader.byte()?;
        let generic_device_class = reader.byte()?;
        let specific_device_class = reader.byte()?;

        // Everything in nodeInfoLength except the six fixed bytes is the
        // class list.
        let class_count = usize::from(node_info_length)
            .checked_sub(6)
            .ok_or(Error::Decode(WireError::BadLength))?;
        let command_classes = reader.bytes(class_count)?.to_vec();

        let granted_keys = SecurityKeys::from_bits_retain(reader.byte()?);
        let kex_fail_type = reader.byte()?;

        let dsk = if reader.bytes_left() > 0 {
            Some(Dsk::deserialize(reader)?)
        } else {
            None
        };

        Ok(Self {
            seq_no,
            status,
            new_node_id,
            listening,
            zwave_protocol,
            opt_func,
            sensor_1000ms,
            sensor_250ms,
            zwave_protocol2,
            basic_device_class,
            generic_device_class,
            specific_device_class,
            command_classes,
            granted_keys,
            kex_fail_type,
            dsk,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.status.into()).map_err(Error::from)?;
        writer.reserved(8);
        writer.byte(self.new_node_id).map_err(Error::from)?;

        let node_info_length = u8::try_from(6 + self.command_classes.len())
            .map_err(|_| Error::Encode(WireError::ValueOutOfRange))?;

        writer.byte(node_info_length).map_err(Error::from)?;
        writer.flag(self.listening);
        writer.bits(self.zwave_protocol, 7);
        writer.flag(self.opt_func);
        writer.flag(self.sensor_1000ms);
        writer.flag(self.sensor_250ms);
        writer.bits(self.zwave_protocol2, 5);
        writer.byte(self.basic_device_class).map_err(Error::from)?;
        writer
            .byte(self.generic_device_class)
            .map_err(Error::from)?;
        writer
            .byte(self.specific_device_class)
            .map_err(Error::from)?;
        writer.bytes(&self.command_classes).map_err(Error::from)?;
        writer
            .byte(self.granted_keys.bits())
            .map_err(Error::from)?;
        writer.byte(self.kex_fail_type).map_err(Error::from)?;

        if let Some(dsk) = &self.dsk {
            dsk.serialize(writer).map_err(Error::from)?;
        }

        Ok(())
    }
}

/// NODE_REMOVE.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NodeRemove {
    pub seq_no: u8,
    pub mode: RemoveNodeMode,
}

impl ZwaveFrame for NodeRemove {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_REMOVE;
    const NAME: &'static str = "NODE_REMOVE";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        reader.skip_bits(8)?;
        let mode = RemoveNodeMode::from(reader.byte()?);

        Ok(Self { seq_no, mode })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.reserved(8);
        writer.byte(self.mode.into()).map_err(Error::from)
    }
}

/// NODE_REMOVE_STATUS. `nodeID == 0` reports an exclusion of a node that
/// was never part of this network.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NodeRemoveStatus {
    pub seq_no: u8,
    pub status: InclusionStatus,
    pub node_id: u8,
}

impl ZwaveFrame for NodeRemoveStatus {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_REMOVE_STATUS;
    const NAME: &'static str = "NODE_REMOVE_STATUS";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
            status: InclusionStatus::from(reader.byte()?),
            node_id: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.status.into()).map_err(Error::from)?;
        writer.byte(self.node_id).map_err(Error::from)
    }
}

macro_rules! seq_and_node_frame {
    ($(#[$meta:meta])* $ty:ident, $cmd:expr, $name:literal, $second:ident) => {
        $(#[$meta])*
        #[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
        pub struct $ty {
            pub seq_no: u8,
            pub $second: u8,
        }

        impl ZwaveFrame for $ty {
            const CMD_CLASS: u8 = CMD_CLASS;
            const CMD: u8 = $cmd;
            const NAME: &'static str = $name;

            fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
                Ok(Self {
                    seq_no: reader.byte()?,
                    $second: reader.byte()?,
                })
            }

            fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
                writer.byte(self.seq_no).map_err(Error::from)?;
                writer.byte(self.$second).map_err(Error::from)
            }
        }
    };
}

seq_and_node_frame! {
    /// FAILED_NODE_REMOVE.
    FailedNodeRemove, FAILED_NODE_REMOVE, "FAILED_NODE_REMOVE", node_id
}

seq_and_node_frame! {
    /// NODE_NEIGHBOR_UPDATE_REQUEST.
    NodeNeighborUpdateRequest, NODE_NEIGHBOR_UPDATE_REQUEST,
    "NODE_NEIGHBOR_UPDATE_REQUEST", node_id
}

seq_and_node_frame! {
    /// NODE_NEIGHBOR_UPDATE_STATUS.
    NodeNeighborUpdateStatus, NODE_NEIGHBOR_UPDATE_STATUS,
    "NODE_NEIGHBOR_UPDATE_STATUS", status
}

seq_and_node_frame! {
    /// RETURN_ROUTE_ASSIGN_COMPLETE.
    ReturnRouteAssignComplete, RETURN_ROUTE_ASSIGN_COMPLETE,
    "RETURN_ROUTE_ASSIGN_COMPLETE", status
}

seq_and_node_frame! {
    /// RETURN_ROUTE_DELETE.
    ReturnRouteDelete, RETURN_ROUTE_DELETE, "RETURN_ROUTE_DELETE", node_id
}

seq_and_node_frame! {
    /// RETURN_ROUTE_DELETE_COMPLETE.
    ReturnRouteDeleteComplete, RETURN_ROUTE_DELETE_COMPLETE,
    "RETURN_ROUTE_DELETE_COMPLETE", status
}

/// FAILED_NODE_REMOVE_STATUS.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FailedNodeRemoveStatus {
    pub seq_no: u8,
    pub status: u8,
    pub node_id: u8,
}

impl ZwaveFrame for FailedNodeRemoveStatus {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = FAILED_NODE_REMOVE_STATUS;
    const NAME: &'static str = "FAILED_NODE_REMOVE_STATUS";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
            status: reader.byte()?,
            node_id: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.status).map_err(Error::from)?;
        writer.byte(self.node_id).map_err(Error::from)
    }
}

/// FAILED_NODE_REPLACE.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FailedNodeReplace {
    pub seq_no: u8,
    pub node_id: u8,
    pub tx_options: TransmitOptions,
    pub mode: AddNodeMode,
}

impl ZwaveFrame for FailedNodeReplace {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = FAILED_NODE_REPLACE;
    const NAME: &'static str = "FAILED_NODE_REPLACE";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
            node_id: reader.byte()?,
            tx_options: TransmitOptions::from_bits_retain(reader.byte()?),
            mode: AddNodeMode::from(reader.byte()?),
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.node_id).map_err(Error::from)?;
        writer.byte(self.tx_options.bits()).map_err(Error::from)?;
        writer.byte(self.mode.into()).map_err(Error::from)
    }
}

/// FAILED_NODE_REPLACE_STATUS.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FailedNodeReplaceStatus {
    pub seq_no: u8,
    pub status: u8,
    pub node_id: u8,
}

impl ZwaveFrame for FailedNodeReplaceStatus {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = FAILED_NODE_REPLACE_STATUS;
    const NAME: &'static str = "FAILED_NODE_REPLACE_STATUS";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
            status: reader.byte()?,
            node_id: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.status).map_err(Error::from)?;
        writer.byte(self.node_id).map_err(Error::from)
    }
}

/// RETURN_ROUTE_ASSIGN.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ReturnRouteAssign {
    pub seq_no: u8,
    pub source_node_id: u8,
    pub destination_node_id: u8,
}

impl ZwaveFrame for ReturnRouteAssign {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = RETURN_ROUTE_ASSIGN;
    const NAME: &'static str = "RETURN_ROUTE_ASSIGN";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
            source_node_id: reader.byte()?,
            destination_node_id: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.source_node_id).map_err(Error::from)?;
        writer
            .byte(self.destination_node_id)
            .map_err(Error::from)
    }
}

/// NODE_ADD_KEYS_REPORT: the joining node requests its key classes.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NodeAddKeysReport {
    pub seq_no: u8,
    pub request_csa: bool,
    pub requested_keys: SecurityKeys,
}

impl ZwaveFrame for NodeAddKeysReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_ADD_KEYS_REPORT;
    const NAME: &'static str = "NODE_ADD_KEYS_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        reader.skip_bits(7)?;
        let request_csa = reader.bit()?;
        let requested_keys = SecurityKeys::from_bits_retain(reader.byte()?);

        Ok(Self {
            seq_no,
            request_csa,
            requested_keys,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.reserved(7);
        writer.flag(self.request_csa);
        writer
            .byte(self.requested_keys.bits())
            .map_err(Error::from)
    }
}

/// NODE_ADD_KEYS_SET: the controller's grant decision.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NodeAddKeysSet {
    pub seq_no: u8,
    pub grant_csa: bool,
    pub accept: bool,
    pub granted_keys: SecurityKeys,
}

impl ZwaveFrame for NodeAddKeysSet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_ADD_KEYS_SET;
    const NAME: &'static str = "NODE_ADD_KEYS_SET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        reader.skip_bits(6)?;
        let grant_csa = reader.bit()?;
        let accept = reader.bit()?;
        let granted_keys = SecurityKeys::from_bits_retain(reader.byte()?);

        Ok(Self {
            seq_no,
            grant_csa,
            accept,
            granted_keys,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.reserved(6);
        writer.flag(self.grant_csa);
        writer.flag(self.accept);
        writer
            .byte(self.granted_keys.bits())
            .map_err(Error::from)
    }
}

/// NODE_ADD_DSK_REPORT: the joining node's DSK, with the count of digits
/// the installer must type back.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeAddDskReport {
    pub seq_no: u8,
    pub input_dsk_length: u8,
    pub dsk: Dsk,
}

impl ZwaveFrame for NodeAddDskReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_ADD_DSK_REPORT;
    const NAME: &'static str = "NODE_ADD_DSK_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        reader.skip_bits(4)?;
        let input_dsk_length = reader.bits(4)?;
        let dsk = Dsk::deserialize(reader)?;

        Ok(Self {
            seq_no,
            input_dsk_length,
            dsk,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.reserved(4);
        writer.bits(self.input_dsk_length, 4);
        self.dsk.serialize(writer).map_err(Error::from)
    }
}

/// NODE_ADD_DSK_SET: accept/reject with the completed DSK input.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeAddDskSet {
    pub seq_no: u8,
    pub accept: bool,
    pub input_dsk_length: u8,
    pub dsk: Dsk,
}

impl ZwaveFrame for NodeAddDskSet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_ADD_DSK_SET;
    const NAME: &'static str = "NODE_ADD_DSK_SET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        let accept = reader.bit()?;
        reader.skip_bits(3)?;
        let input_dsk_length = reader.bits(4)?;
        let dsk = Dsk::deserialize(reader)?;

        Ok(Self {
            seq_no,
            accept,
            input_dsk_length,
            dsk,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.flag(self.accept);
        writer.reserved(3);
        writer.bits(self.input_dsk_length, 4);
        self.dsk.serialize(writer).map_err(Error::from)
    }
}

/// SMART_START_JOIN_STARTED_REPORT.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SmartStartJoinStartedReport {
    pub seq_no: u8,
    pub dsk: Dsk,
}

impl ZwaveFrame for SmartStartJoinStartedReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = SMART_START_JOIN_STARTED_REPORT;
    const NAME: &'static str = "SMART_START_JOIN_STARTED_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
            dsk: Dsk::deserialize(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        self.dsk.serialize(writer).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use pretty_assertions::assert_eq;

    #[test]
    fn inclusion_status_vector() {
        let raw = b"\x34\x02\x0c\x06\x00\x4e\x15\xd3\x9c\x04\x10\x01\x5e\x25\x27\x85\x5c\x70\x72\x75\x86\x5a\x59\x73\x7a\x68\x23\x00\x00\x00";
        let decoded = Command::decode(raw).unwrap();

        let Command::NodeAddStatus(ref status) = decoded else {
            panic!("expected NODE_ADD_STATUS");
        };

        assert_eq!(status.seq_no, 12);
        assert_eq!(status.status, InclusionStatus::Done);
        assert_eq!(status.new_node_id, 78);
        assert!(status.listening);
        assert_eq!(
            status.command_classes,
            vec![
                0x5e, 0x25, 0x27, 0x85, 0x5c, 0x70, 0x72, 0x75, 0x86, 0x5a, 0x59, 0x73, 0x7a,
                0x68, 0x23
            ]
        );
        assert_eq!(status.granted_keys, SecurityKeys::empty());
        assert_eq!(status.kex_fail_type, 0);
        assert_eq!(status.dsk, Some(Dsk::empty()));

        assert_eq!(decoded.compose().unwrap(), raw.to_vec());
    }

    #[test]
    fn node_add_round_trip() {
        let add = NodeAdd {
            seq_no: 3,
            mode: AddNodeMode::AnyS2,
            tx_options: TransmitOptions::ACK | TransmitOptions::EXPLORE,
        };

        let raw = Command::from(add).compose().unwrap();

        assert_eq!(raw, vec![0x34, 0x01, 0x03, 0x00, 0x07, 0x21]);
        assert_eq!(Command::decode(&raw).unwrap(), Command::NodeAdd(add));
    }

    #[test]
    fn keys_set_flags() {
        let set = NodeAddKeysSet {
            seq_no: 1,
            grant_csa: false,
            accept: true,
            granted_keys: SecurityKeys::S2_UNAUTHENTICATED | SecurityKeys::S0,
        };

        let raw = Command::from(set).compose().unwrap();

        assert_eq!(raw, vec![0x34, 0x12, 0x01, 0x01, 0x81]);
        assert_eq!(Command::decode(&raw).unwrap(), Command::NodeAddKeysSet(set));
    }

    #[test]
    fn dsk_set_round_trip() {
        let dsk: Dsk = "32333-28706-61913-46249-43027-54794-27762-42208"
            .parse()
            .unwrap();
        let set = NodeAddDskSet {
            seq_no: 7,
            accept: true,
            input_dsk_length: 2,
            dsk: dsk.clone(),
        };

        let raw = Command::from(set.clone()).compose().unwrap();

        assert_eq!(raw[2..5], [0x07, 0x82, 0x10]);
        assert_eq!(&raw[5..], dsk.as_bytes());
        assert_eq!(Command::decode(&raw).unwrap(), Command::NodeAddDskSet(set));
    }

    #[test]
    fn remove_status_out_of_network() {
        let raw = [0x34, 0x04, 0x02, 0x06, 0x00];
        let decoded = Command::decode(&raw).unwrap();

        assert_eq!(
            decoded,
            Command::NodeRemoveStatus(NodeRemoveStatus {
                seq_no: 2,
                status: InclusionStatus::Done,
                node_id: 0,
            })
        );
    }
}
