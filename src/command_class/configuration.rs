//! COMMAND_CLASS_CONFIGURATION: sized, signed device parameters.

use super::{ClassSpec, ClassState, CommandClass, COMMAND_CLASS_CONFIGURATION as CMD_CLASS};
use crate::command::{Command, ZwaveFrame};
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use std::collections::BTreeMap;
use zipcrab_wire::{BitReader, BitWriter, WireError};

pub const CONFIGURATION_SET: u8 = 0x04;
pub const CONFIGURATION_GET: u8 = 0x05;
pub const CONFIGURATION_REPORT: u8 = 0x06;

/// Read a `size`-byte signed big-endian value.
fn read_sized(reader: &mut BitReader<'_>, size: u8) -> Result<i32, Error> {
    if !matches!(size, 1 | 2 | 4) {
        return Err(Error::Decode(WireError::BadLength));
    }

    let raw = reader.bytes(usize::from(size))?;
    let mut value = if raw[0] & 0x80 != 0 { -1i32 } else { 0 };

    for byte in raw {
        value = (value << 8) | i32::from(*byte);
    }

    Ok(value)
}

/// Write a `size`-byte big-endian value.
fn write_sized(writer: &mut BitWriter, size: u8, value: i32) -> Result<(), Error> {
    if !matches!(size, 1 | 2 | 4) {
        return Err(Error::Encode(WireError::ValueOutOfRange));
    }

    let raw = value.to_be_bytes();

    writer
        .bytes(&raw[4 - usize::from(size)..])
        .map_err(Error::from)
}

/// CONFIGURATION_SET: `value` is written with the width the `size` field
/// declares.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ConfigurationSet {
    pub parameter_number: u8,
    /// Reset the parameter to its factory default; `value` is ignored by
    /// the device but still occupies `size` bytes.
    pub default: bool,
    pub size: u8,
    pub value: i32,
}

impl ZwaveFrame for ConfigurationSet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = CONFIGURATION_SET;
    const NAME: &'static str = "CONFIGURATION_SET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let parameter_number = reader.byte()?;
        let default = reader.bit()?;
        reader.skip_bits(4)?;
        let size = reader.bits(3)?;
        let value = read_sized(reader, size)?;

        Ok(Self {
            parameter_number,
            default,
            size,
            value,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.parameter_number).map_err(Error::from)?;
        writer.flag(self.default);
        writer.reserved(4);
        writer.bits(self.size, 3);
        write_sized(writer, self.size, self.value)
    }
}

/// CONFIGURATION_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ConfigurationGet {
    pub parameter_number: u8,
}

impl ZwaveFrame for ConfigurationGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = CONFIGURATION_GET;
    const NAME: &'static str = "CONFIGURATION_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            parameter_number: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.parameter_number).map_err(Error::from)
    }
}

/// CONFIGURATION_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ConfigurationReport {
    pub parameter_number: u8,
    pub size: u8,
    pub value: i32,
}

impl ZwaveFrame for ConfigurationReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = CONFIGURATION_REPORT;
    const NAME: &'static str = "CONFIGURATION_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let parameter_number = reader.byte()?;
        reader.skip_bits(5)?;
        let size = reader.bits(3)?;
        let value = read_sized(reader, size)?;

        Ok(Self {
            parameter_number,
            size,
            value,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.parameter_number).map_err(Error::from)?;
        writer.reserved(5);
        writer.bits(self.size, 3);
        write_sized(writer, self.size, self.value)
    }
}

/// Parameter values seen in reports.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfigurationState {
    pub parameters: BTreeMap<u8, i32>,
}

fn new_state() -> ClassState {
    ClassState::Configuration(ConfigurationState::default())
}

fn interview<'a>(_node: &'a Node, _class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async { Ok(()) })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    let Command::ConfigurationReport(report) = message else {
        return false;
    };

    if let ClassState::Configuration(state) = cc.state_mut() {
        state
            .parameters
            .insert(report.parameter_number, report.value);
    }

    true
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_CONFIGURATION",
    new_state,
    interview,
    handle,
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_sized_values() {
        let set = ConfigurationSet {
            parameter_number: 9,
            default: false,
            size: 2,
            value: -2,
        };

        let raw = Command::from(set).compose().unwrap();

        assert_eq!(raw, vec![0x70, 0x04, 0x09, 0x02, 0xff, 0xfe]);
        assert_eq!(Command::decode(&raw).unwrap(), Command::ConfigurationSet(set));

        let one_byte = ConfigurationSet {
            parameter_number: 1,
            default: true,
            size: 1,
            value: 0x7f,
        };

        assert_eq!(
            Command::from(one_byte).compose().unwrap(),
            vec![0x70, 0x04, 0x01, 0x81, 0x7f]
        );
    }

    #[test]
    fn report_sign_extends() {
        let raw = [0x70, 0x06, 0x04, 0x01, 0x80];
        let Command::ConfigurationReport(report) = Command::decode(&raw).unwrap() else {
            panic!("expected CONFIGURATION_REPORT");
        };

        assert_eq!(report.value, -128);
        assert_eq!(report.size, 1);
    }

    #[test]
    fn bad_size_is_rejected() {
        // size 3 is not a legal width
        let raw = [0x70, 0x06, 0x04, 0x03, 0x01, 0x02, 0x03];

        assert_eq!(
            Command::decode(&raw),
            Err(Error::Decode(WireError::BadLength))
        );
    }
}
