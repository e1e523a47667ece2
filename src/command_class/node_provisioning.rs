//! COMMAND_CLASS_NODE_PROVISIONING: the gateway's SmartStart provisioning
//! list.

use super::COMMAND_CLASS_NODE_PROVISIONING as CMD_CLASS;
use crate::command::ZwaveFrame;
use crate::error::Error;
use zipcrab_wire::{BitReader, BitWriter, Dsk, WireError, ZipWireRead, ZipWireWrite};

pub const COMMAND_NODE_PROVISIONING_SET: u8 = 0x01;
pub const COMMAND_NODE_PROVISIONING_DELETE: u8 = 0x02;
pub const COMMAND_NODE_PROVISIONING_LIST_ITERATION_GET: u8 = 0x03;
pub const COMMAND_NODE_PROVISIONING_LIST_ITERATION_REPORT: u8 = 0x04;

/// One metadata extension of a provisioning list entry.
///
/// The type rides in the top seven bits of the head byte, critical in the
/// bottom bit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MetaExtension {
    pub extension_type: u8,
    pub critical: bool,
    pub data: Vec<u8>,
}

fn parse_extensions(reader: &mut BitReader<'_>) -> Result<Vec<MetaExtension>, Error> {
    let mut extensions = Vec::new();

    while !reader.is_empty() {
        let extension_type = reader.bits(7)?;
        let critical = reader.bit()?;
        let length = usize::from(reader.byte()?);
        let data = reader.bytes(length)?.to_vec();

        extensions.push(MetaExtension {
            extension_type,
            critical,
            data,
        });
    }

    Ok(extensions)
}

fn write_extensions(writer: &mut BitWriter, extensions: &[MetaExtension]) -> Result<(), Error> {
    for extension in extensions {
        writer.bits(extension.extension_type, 7);
        writer.flag(extension.critical);

        let length = u8::try_from(extension.data.len())
            .map_err(|_| Error::Encode(WireError::ValueOutOfRange))?;

        writer.byte(length).map_err(Error::from)?;
        writer.bytes(&extension.data).map_err(Error::from)?;
    }

    Ok(())
}

/// NODE_PROVISIONING_SET.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeProvisioningSet {
    pub seq_no: u8,
    pub dsk: Dsk,
    pub meta_data_extensions: Vec<MetaExtension>,
}

impl ZwaveFrame for NodeProvisioningSet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = COMMAND_NODE_PROVISIONING_SET;
    const NAME: &'static str = "NODE_PROVISIONING_SET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
            dsk: Dsk::deserialize(reader)?,
            meta_data_extensions: parse_extensions(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        self.dsk.serialize(writer).map_err(Error::from)?;
        write_extensions(writer, &self.meta_data_extensions)
    }
}

/// NODE_PROVISIONING_DELETE.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeProvisioningDelete {
    pub seq_no: u8,
    pub dsk: Dsk,
}

impl ZwaveFrame for NodeProvisioningDelete {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = COMMAND_NODE_PROVISIONING_DELETE;
    const NAME: &'static str = "NODE_PROVISIONING_DELETE";

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

/// NODE_PROVISIONING_LIST_ITERATION_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NodeProvisioningListIterationGet {
    pub seq_no: u8,
    pub remaining_counter: u8,
}

impl ZwaveFrame for NodeProvisioningListIterationGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = COMMAND_NODE_PROVISIONING_LIST_ITERATION_GET;
    const NAME: &'static str = "NODE_PROVISIONING_LIST_ITERATION_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            seq_no: reader.byte()?,
            remaining_counter: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.remaining_counter).map_err(Error::from)
    }
}

/// NODE_PROVISIONING_LIST_ITERATION_REPORT. The DSK length rides in a
/// five-bit field here rather than a full length byte.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeProvisioningListIterationReport {
    pub seq_no: u8,
    pub remaining_count: u8,
    pub dsk: Dsk,
    pub meta_data_extensions: Vec<MetaExtension>,
}

impl ZwaveFrame for NodeProvisioningListIterationReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = COMMAND_NODE_PROVISIONING_LIST_ITERATION_REPORT;
    const NAME: &'static str = "NODE_PROVISIONING_LIST_ITERATION_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let seq_no = reader.byte()?;
        let remaining_count = reader.byte()?;
        reader.skip_bits(3)?;
        let dsk_length = reader.bits(5)?;
        let dsk = Dsk::new(reader.bytes(usize::from(dsk_length))?.to_vec())
            .map_err(Error::Decode)?;
        let meta_data_extensions = parse_extensions(reader)?;

        Ok(Self {
            seq_no,
            remaining_count,
            dsk,
            meta_data_extensions,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.seq_no).map_err(Error::from)?;
        writer.byte(self.remaining_count).map_err(Error::from)?;
        writer.reserved(3);
        writer.bits(self.dsk.as_bytes().len() as u8, 5);
        writer.bytes(self.dsk.as_bytes()).map_err(Error::from)?;
        write_extensions(writer, &self.meta_data_extensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_round_trip() {
        let set = NodeProvisioningSet {
            seq_no: 4,
            dsk: "32333-28706-61913-46249-43027-54794-27762-42208"
                .parse()
                .unwrap(),
            meta_data_extensions: vec![MetaExtension {
                extension_type: 0x32,
                critical: false,
                data: b"lamp".to_vec(),
            }],
        };

        let raw = Command::from(set.clone()).compose().unwrap();
        let back = Command::decode(&raw).unwrap();

        assert_eq!(back, Command::NodeProvisioningSet(set));
    }

    #[test]
    fn iteration_report_five_bit_dsk_length() {
        let report = NodeProvisioningListIterationReport {
            seq_no: 1,
            remaining_count: 0,
            dsk: "32333-28706-61913-46249-43027-54794-27762-42208"
                .parse()
                .unwrap(),
            meta_data_extensions: Vec::new(),
        };

        let raw = Command::from(report.clone()).compose().unwrap();

        assert_eq!(raw[4], 0x10);
        assert_eq!(raw.len(), 2 + 2 + 1 + 16);
        assert_eq!(
            Command::decode(&raw).unwrap(),
            Command::NodeProvisioningListIterationReport(report)
        );
    }
}
