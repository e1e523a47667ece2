//! COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY: node list, cached node info
//! and multi channel topology queries answered by the Z/IP Gateway.

use super::COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY as CMD_CLASS;
use crate::command::ZwaveFrame;
use crate::error::Error;
use std::collections::BTreeSet;
use zipcrab_wire::{BitReader, BitWriter, WireError, ZipWireRead, ZipWireWrite};

pub const NODE_LIST_GET: u8 = 0x01;
pub const NODE_LIST_REPORT: u8 = 0x02;
pub const NODE_INFO_CACHED_GET: u8 = 0x03;
pub const NODE_INFO_CACHED_REPORT: u8 = 0x04;
pub const NM_MULTI_CHANNEL_END_POINT_GET: u8 = 0x05;
pub const NM_MULTI_CHANNEL_END_POINT_REPORT: u8 = 0x06;
pub const NM_MULTI_CHANNEL_CAPABILITY_GET: u8 = 0x07;
pub const NM_MULTI_CHANNEL_CAPABILITY_REPORT: u8 = 0x08;
pub const FAILED_NODE_LIST_GET: u8 = 0x0b;
pub const FAILED_NODE_LIST_REPORT: u8 = 0x0c;

/// The 29-byte node bitmask used by list reports: bit `i` of byte `b` set
/// means node `b * 8 + i + 1` is present.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeBitmask(pub BTreeSet<u8>);

impl NodeBitmask {
    const WIDTH: usize = 29;

    pub fn contains(&self, node_id: u8) -> bool {
        self.0.contains(&node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u8> for NodeBitmask {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl ZipWireWrite for NodeBitmask {
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        let mut raw = [0u8; Self::WIDTH];

        for node_id in &self.0 {
            let index = usize::from(node_id - 1);

            raw[index / 8] |= 1 << (index % 8);
        }

        writer.bytes(&raw)
    }
}

impl ZipWireRead for NodeBitmask {
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        let raw = reader.bytes(Self::WIDTH)?;
        let mut nodes = BTreeSet::new();

        for (byte_index, byte) in raw.iter().enumerate() {
            for bit in 0..8 {
                if byte & (1 << bit) != 0 {
                    nodes.insert((byte_index * 8 + bit + 1) as u8);
                }
            }
        }

        Ok(Self(nodes))
    }
}

/// NODE_LIST_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NodeListGet {
    pub seq_no: u8,
}

impl ZwaveFrame for NodeListGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_LIST_GET;
    const NAME: &'static str = "NODE_LIST_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)
    }
}

/// NODE_LIST_REPORT.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeListReport {
    pub seq_no: u8,
    /// 0 means the list is up to date.
    pub status: u8,
    /// The gateway controller's own node id.
    pub node_list_controller_id: u8,
    pub nodes: NodeBitmask,
}

impl ZwaveFrame for NodeListReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_LIST_REPORT;
    const NAME: &'static str = "NODE_LIST_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
            status: reader.byte()?,
            node_list_controller_id: reader.byte()?,
            nodes: NodeBitmask::deserialize(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.status).map_err(Error::from)?;
        writer
            .byte(self.node_list_controller_id)
            .map_err(Error::from)?;
        self.nodes.serialize(writer).map_err(Error::from)
    }
}

/// NODE_INFO_CACHED_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NodeInfoCachedGet {
    pub seq_no: u8,
    /// `2^maxAge` minutes of cache staleness the caller will accept; 15
    /// accepts any age.
    pub max_age: u8,
    pub node_id: u8,
}

impl ZwaveFrame for NodeInfoCachedGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_INFO_CACHED_GET;
    const NAME: &'static str = "NODE_INFO_CACHED_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        reader.skip_bits(4)?;
        let max_age = reader.bits(4)?;
        let node_id = reader.byte()?;

        Ok(Self {
            seq_no,
            max_age,
            node_id,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.reserved(4);
        writer.bits(self.max_age, 4);
        writer.byte(self.node_id).map_err(Error::from)
    }
}

/// NODE_INFO_CACHED_REPORT: the gateway's cached NIF for one node.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeInfoCachedReport {
    pub seq_no: u8,
    pub status: u8,
    pub age: u8,
    pub listening: bool,
    pub zwave_protocol: u8,
    pub opt_func: bool,
    /// Frequently listening at 1000 ms.
    pub sensor_1000ms: bool,
    /// Frequently listening at 250 ms.
    pub sensor_250ms: bool,
    pub zwave_protocol2: u8,
    pub granted_keys: u8,
    pub basic_device_class: u8,
    pub generic_device_class: u8,
    pub specific_device_class: u8,
    /// Raw NIF class bytes, marks included.
    pub command_classes: Vec<u8>,
}

impl NodeInfoCachedReport {
    /// A FLiRS node listens on a 250 ms or 1000 ms wakeup beam.
    pub fn flirs(&self) -> bool {
        self.sensor_250ms || self.sensor_1000ms
    }
}

impl ZwaveFrame for NodeInfoCachedReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NODE_INFO_CACHED_REPORT;
    const NAME: &'static str = "NODE_INFO_CACHED_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        let status = reader.bits(4)?;
        let age = reader.bits(4)?;
        let listening = reader.bit()?;
        let zwave_protocol = reader.bits(7)?;
        let opt_func = reader.bit()?;
        let sensor_1000ms = reader.bit()?;
        let sensor_250ms = reader.bit()?;
        let zwave_protocol2 = reader.bits(5)?;
        reader.skip_bits(8)?;
        let granted_keys = reader.byte()?;
        let basic_device_class = reader.byte()?;
        let generic_device_class = reader.byte()?;
        let specific_device_class = reader.byte()?;
        let command_classes = reader.remaining().to_vec();

        Ok(Self {
            seq_no,
            status,
            age,
            listening,
            zwave_protocol,
            opt_func,
            sensor_1000ms,
            sensor_250ms,
            zwave_protocol2,
            granted_keys,
            basic_device_class,
            generic_device_class,
            specific_device_class,
            command_classes,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.bits(self.status, 4);
        writer.bits(self.age, 4);
        writer.flag(self.listening);
        writer.bits(self.zwave_protocol, 7);
        writer.flag(self.opt_func);
        writer.flag(self.sensor_1000ms);
        writer.flag(self.sensor_250ms);
        writer.bits(self.zwave_protocol2, 5);
        writer.reserved(8);
        writer.byte(self.granted_keys).map_err(Error::from)?;
        writer.byte(self.basic_device_class).map_err(Error::from)?;
        writer
            .byte(self.generic_device_class)
            .map_err(Error::from)?;
        writer
            .byte(self.specific_device_class)
            .map_err(Error::from)?;
        writer.bytes(&self.command_classes).map_err(Error::from)
    }
}

/// NM_MULTI_CHANNEL_END_POINT_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MultiChannelEndPointGet {
    pub seq_no: u8,
    pub node_id: u8,
}

impl ZwaveFrame for MultiChannelEndPointGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NM_MULTI_CHANNEL_END_POINT_GET;
    const NAME: &'static str = "NM_MULTI_CHANNEL_END_POINT_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
            node_id: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.node_id).map_err(Error::from)
    }
}

/// NM_MULTI_CHANNEL_END_POINT_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MultiChannelEndPointReport {
    pub seq_no: u8,
    pub node_id: u8,
    pub individual_end_points: u8,
    pub aggregated_end_points: u8,
}

impl ZwaveFrame for MultiChannelEndPointReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NM_MULTI_CHANNEL_END_POINT_REPORT;
    const NAME: &'static str = "NM_MULTI_CHANNEL_END_POINT_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        let node_id = reader.byte()?;
        reader.skip_bits(1)?;
        let individual_end_points = reader.bits(7)?;

        // The aggregated count was added in a later revision.
        let aggregated_end_points = if reader.bytes_left() > 0 {
            reader.skip_bits(1)?;
            reader.bits(7)?
        } else {
            0
        };

        Ok(Self {
            seq_no,
            node_id,
            individual_end_points,
            aggregated_end_points,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.node_id).map_err(Error::from)?;
        writer.reserved(1);
        writer.bits(self.individual_end_points, 7);
        writer.reserved(1);
        writer.bits(self.aggregated_end_points, 7);

        Ok(())
    }
}

/// NM_MULTI_CHANNEL_CAPABILITY_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MultiChannelCapabilityGet {
    pub seq_no: u8,
    pub node_id: u8,
    pub end_point: u8,
}

impl ZwaveFrame for MultiChannelCapabilityGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NM_MULTI_CHANNEL_CAPABILITY_GET;
    const NAME: &'static str = "NM_MULTI_CHANNEL_CAPABILITY_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        let node_id = reader.byte()?;
        reader.skip_bits(1)?;
        let end_point = reader.bits(7)?;

        Ok(Self {
            seq_no,
            node_id,
            end_point,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.node_id).map_err(Error::from)?;
        writer.reserved(1);
        writer.bits(self.end_point, 7);

        Ok(())
    }
}

/// NM_MULTI_CHANNEL_CAPABILITY_REPORT.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MultiChannelCapabilityReport {
    pub seq_no: u8,
    pub node_id: u8,
    pub end_point: u8,
    pub generic_device_class: u8,
    pub specific_device_class: u8,
    /// Raw NIF class bytes of the endpoint.
    pub command_classes: Vec<u8>,
}

impl ZwaveFrame for MultiChannelCapabilityReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = NM_MULTI_CHANNEL_CAPABILITY_REPORT;
    const NAME: &'static str = "NM_MULTI_CHANNEL_CAPABILITY_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        let node_id = reader.byte()?;
        reader.skip_bits(1)?;
        let end_point = reader.bits(7)?;
        let generic_device_class = reader.byte()?;
        let specific_device_class = reader.byte()?;
        let command_classes = reader.remaining().to_vec();

        Ok(Self {
            seq_no,
            node_id,
            end_point,
            generic_device_class,
            specific_device_class,
            command_classes,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.node_id).map_err(Error::from)?;
        writer.reserved(1);
        writer.bits(self.end_point, 7);
        writer
            .byte(self.generic_device_class)
            .map_err(Error::from)?;
        writer
            .byte(self.specific_device_class)
            .map_err(Error::from)?;
        writer.bytes(&self.command_classes).map_err(Error::from)
    }
}

/// FAILED_NODE_LIST_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FailedNodeListGet {
    pub seq_no: u8,
}

impl ZwaveFrame for FailedNodeListGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = FAILED_NODE_LIST_GET;
    const NAME: &'static str = "FAILED_NODE_LIST_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)
    }
}

/// FAILED_NODE_LIST_REPORT.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FailedNodeListReport {
    pub seq_no: u8,
    pub nodes: NodeBitmask,
}

impl ZwaveFrame for FailedNodeListReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = FAILED_NODE_LIST_REPORT;
    const NAME: &'static str = "FAILED_NODE_LIST_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
            nodes: NodeBitmask::deserialize(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        self.nodes.serialize(writer).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use pretty_assertions::assert_eq;

    #[test]
    fn node_list_report_round_trip() {
        let mut raw = vec![0x52, 0x02, 0x02, 0x00, 0x01, 0x21];

        raw.extend_from_slice(&[0x00; 28]);

        let decoded = Command::decode(&raw).unwrap();

        let Command::NodeListReport(ref report) = decoded else {
            panic!("expected NODE_LIST_REPORT");
        };

        assert_eq!(report.seq_no, 2);
        assert_eq!(report.status, 0);
        assert_eq!(report.node_list_controller_id, 1);
        assert_eq!(report.nodes, [1u8, 6].into_iter().collect());

        assert_eq!(decoded.compose().unwrap(), raw);
    }

    #[test]
    fn bitmask_edges() {
        let mask: NodeBitmask = [1u8, 8, 9, 232].into_iter().collect();
        let mut writer = BitWriter::new();

        mask.serialize(&mut writer).unwrap();

        let raw = writer.into_bytes();

        assert_eq!(raw.len(), 29);
        assert_eq!(raw[0], 0b1000_0001);
        assert_eq!(raw[1], 0b0000_0001);
        assert_eq!(raw[28], 0b1000_0000);

        let mut reader = BitReader::new(&raw);

        assert_eq!(NodeBitmask::deserialize(&mut reader).unwrap(), mask);
    }

    #[test]
    fn cached_nif_round_trip() {
        let report = NodeInfoCachedReport {
            seq_no: 5,
            status: 0,
            age: 3,
            listening: true,
            zwave_protocol: 0x53,
            opt_func: true,
            sensor_1000ms: false,
            sensor_250ms: true,
            zwave_protocol2: 0x1c,
            granted_keys: 0x81,
            basic_device_class: 0x04,
            generic_device_class: 0x10,
            specific_device_class: 0x01,
            command_classes: vec![0x5e, 0x25, 0xef, 0x20],
        };

        assert!(report.flirs());

        let raw = Command::from(report.clone()).compose().unwrap();
        let back = Command::decode(&raw).unwrap();

        assert_eq!(back, Command::NodeInfoCachedReport(report));
    }

    #[test]
    fn end_point_report_without_aggregated() {
        let raw = [0x52, 0x06, 0x01, 0x07, 0x04];
        let decoded = Command::decode(&raw).unwrap();

        let Command::MultiChannelEndPointReport(report) = decoded else {
            panic!("expected NM_MULTI_CHANNEL_END_POINT_REPORT");
        };

        assert_eq!(report.node_id, 7);
        assert_eq!(report.individual_end_points, 4);
        assert_eq!(report.aggregated_end_points, 0);
    }
}
