//! COMMAND_CLASS_MULTI_CHANNEL_V2: endpoint discovery on the node itself.
//!
//! Endpoint addressing rides in the Z/IP packet's source/destination
//! endpoint fields, so the encapsulation commands of this class are not
//! needed here; the topology of a node is normally read through the
//! network management proxy, with these frames as the node-local
//! fallback.

use super::COMMAND_CLASS_MULTI_CHANNEL_V2 as CMD_CLASS;
use crate::command::ZwaveFrame;
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use zipcrab_wire::{BitReader, BitWriter};

pub const MULTI_CHANNEL_END_POINT_GET: u8 = 0x07;
pub const MULTI_CHANNEL_END_POINT_REPORT: u8 = 0x08;
pub const MULTI_CHANNEL_CAPABILITY_GET: u8 = 0x09;
pub const MULTI_CHANNEL_CAPABILITY_REPORT: u8 = 0x0a;

empty_frame! {
    /// MULTI_CHANNEL_END_POINT_GET.
    EndPointGet, CMD_CLASS, MULTI_CHANNEL_END_POINT_GET,
    "MULTI_CHANNEL_END_POINT_GET"
}

/// MULTI_CHANNEL_END_POINT_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct EndPointReport {
    /// The endpoint count may change at runtime.
    pub dynamic: bool,
    /// All endpoints share one device class and command class set.
    pub identical: bool,
    pub individual_end_points: u8,
    /// Version 4; zero when the frame predates aggregation.
    pub aggregated_end_points: u8,
}

impl ZwaveFrame for EndPointReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = MULTI_CHANNEL_END_POINT_REPORT;
    const NAME: &'static str = "MULTI_CHANNEL_END_POINT_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let dynamic = reader.bit()?;
        let identical = reader.bit()?;
        reader.skip_bits(6)?;
        reader.skip_bits(1)?;
        let individual_end_points = reader.bits(7)?;

        let aggregated_end_points = if reader.bytes_left() > 0 {
            reader.skip_bits(1)?;
            reader.bits(7)?
        } else {
            0
        };

        Ok(Self {
            dynamic,
            identical,
            individual_end_points,
            aggregated_end_points,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.flag(self.dynamic);
        writer.flag(self.identical);
        writer.reserved(6);
        writer.reserved(1);
        writer.bits(self.individual_end_points, 7);
        writer.reserved(1);
        writer.bits(self.aggregated_end_points, 7);

        Ok(())
    }
}

/// MULTI_CHANNEL_CAPABILITY_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CapabilityGet {
    pub end_point: u8,
}

impl ZwaveFrame for CapabilityGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = MULTI_CHANNEL_CAPABILITY_GET;
    const NAME: &'static str = "MULTI_CHANNEL_CAPABILITY_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        reader.skip_bits(1)?;

        Ok(Self {
            end_point: reader.bits(7)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.reserved(1);
        writer.bits(self.end_point, 7);

        Ok(())
    }
}

/// MULTI_CHANNEL_CAPABILITY_REPORT.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapabilityReport {
    pub dynamic: bool,
    pub end_point: u8,
    pub generic_device_class: u8,
    pub specific_device_class: u8,
    /// Raw NIF class bytes of the endpoint.
    pub command_classes: Vec<u8>,
}

impl ZwaveFrame for CapabilityReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = MULTI_CHANNEL_CAPABILITY_REPORT;
    const NAME: &'static str = "MULTI_CHANNEL_CAPABILITY_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let dynamic = reader.bit()?;
        let end_point = reader.bits(7)?;
        let generic_device_class = reader.byte()?;
        let specific_device_class = reader.byte()?;
        let command_classes = reader.remaining().to_vec();

        Ok(Self {
            dynamic,
            end_point,
            generic_device_class,
            specific_device_class,
            command_classes,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.flag(self.dynamic);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use pretty_assertions::assert_eq;

    #[test]
    fn end_point_report_round_trip() {
        let report = EndPointReport {
            dynamic: false,
            identical: true,
            individual_end_points: 2,
            aggregated_end_points: 0,
        };

        let raw = Command::from(report).compose().unwrap();

        assert_eq!(raw, vec![0x60, 0x08, 0x40, 0x02, 0x00]);
        assert_eq!(Command::decode(&raw).unwrap(), Command::EndPointReport(report));
    }

    #[test]
    fn capability_report_carries_nif() {
        let raw = [0x60, 0x0a, 0x01, 0x10, 0x01, 0x25, 0x20];
        let Command::CapabilityReport(report) = Command::decode(&raw).unwrap() else {
            panic!("expected MULTI_CHANNEL_CAPABILITY_REPORT");
        };

        assert_eq!(report.end_point, 1);
        assert!(!report.dynamic);
        assert_eq!(report.command_classes, vec![0x25, 0x20]);
    }
}
