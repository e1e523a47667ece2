//! COMMAND_CLASS_VERSION: library/protocol/application versions and the
//! per-class version probe every interview starts with.

use super::{ClassSpec, ClassState, CommandClass, COMMAND_CLASS_VERSION as CMD_CLASS};
use crate::command::{Command, ZwaveFrame};
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use zipcrab_wire::{BitReader, BitWriter};

pub const VERSION_GET: u8 = 0x11;
pub const VERSION_REPORT: u8 = 0x12;
pub const VERSION_COMMAND_CLASS_GET: u8 = 0x13;
pub const VERSION_COMMAND_CLASS_REPORT: u8 = 0x14;

empty_frame! {
    /// VERSION_GET.
    VersionGet, CMD_CLASS, VERSION_GET, "VERSION_GET"
}

/// VERSION_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct VersionReport {
    pub zwave_library_type: u8,
    pub zwave_protocol_version: u8,
    pub zwave_protocol_sub_version: u8,
    pub application_version: u8,
    pub application_sub_version: u8,
}

impl ZwaveFrame for VersionReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = VERSION_REPORT;
    const NAME: &'static str = "VERSION_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            zwave_library_type: reader.byte()?,
            zwave_protocol_version: reader.byte()?,
            zwave_protocol_sub_version: reader.byte()?,
            application_version: reader.byte()?,
            application_sub_version: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.zwave_library_type).map_err(Error::from)?;
        writer
            .byte(self.zwave_protocol_version)
            .map_err(Error::from)?;
        writer
            .byte(self.zwave_protocol_sub_version)
            .map_err(Error::from)?;
        writer.byte(self.application_version).map_err(Error::from)?;
        writer
            .byte(self.application_sub_version)
            .map_err(Error::from)
    }
}

/// VERSION_COMMAND_CLASS_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct VersionCommandClassGet {
    pub requested_command_class: u8,
}

impl ZwaveFrame for VersionCommandClassGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = VERSION_COMMAND_CLASS_GET;
    const NAME: &'static str = "VERSION_COMMAND_CLASS_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            requested_command_class: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer
            .byte(self.requested_command_class)
            .map_err(Error::from)
    }
}

/// VERSION_COMMAND_CLASS_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct VersionCommandClassReport {
    pub requested_command_class: u8,
    pub command_class_version: u8,
}

impl ZwaveFrame for VersionCommandClassReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = VERSION_COMMAND_CLASS_REPORT;
    const NAME: &'static str = "VERSION_COMMAND_CLASS_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            requested_command_class: reader.byte()?,
            command_class_version: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer
            .byte(self.requested_command_class)
            .map_err(Error::from)?;
        writer
            .byte(self.command_class_version)
            .map_err(Error::from)
    }
}

/// Versions reported by VERSION_GET.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionState {
    pub zwave_library_type: u8,
    pub zwave_protocol_version: u8,
    pub zwave_protocol_sub_version: u8,
    pub application_version: u8,
    pub application_sub_version: u8,
}

fn new_state() -> ClassState {
    ClassState::Version(VersionState::default())
}

fn interview<'a>(node: &'a Node, class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        let report: VersionReport = node.send_and_receive(VersionGet).await?;

        node.with_supported_class(class_id, |cc| {
            if let ClassState::Version(state) = cc.state_mut() {
                *state = VersionState {
                    zwave_library_type: report.zwave_library_type,
                    zwave_protocol_version: report.zwave_protocol_version,
                    zwave_protocol_sub_version: report.zwave_protocol_sub_version,
                    application_version: report.application_version,
                    application_sub_version: report.application_sub_version,
                };
            }
        });

        Ok(())
    })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    let Command::VersionReport(report) = message else {
        return false;
    };

    if let ClassState::Version(state) = cc.state_mut() {
        state.zwave_library_type = report.zwave_library_type;
        state.zwave_protocol_version = report.zwave_protocol_version;
        state.zwave_protocol_sub_version = report.zwave_protocol_sub_version;
        state.application_version = report.application_version;
        state.application_sub_version = report.application_sub_version;
    }

    true
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_VERSION",
    new_state,
    interview,
    handle,
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn version_report_round_trip() {
        let raw = [0x86, 0x12, 0x03, 0x04, 0x3d, 0x01, 0x00];
        let decoded = Command::decode(&raw).unwrap();

        assert_eq!(
            decoded,
            Command::VersionReport(VersionReport {
                zwave_library_type: 3,
                zwave_protocol_version: 4,
                zwave_protocol_sub_version: 0x3d,
                application_version: 1,
                application_sub_version: 0,
            })
        );
        assert_eq!(decoded.compose().unwrap(), raw.to_vec());
    }

    #[test]
    fn class_probe_round_trip() {
        let raw = Command::from(VersionCommandClassGet {
            requested_command_class: 0x25,
        })
        .compose()
        .unwrap();

        assert_eq!(raw, vec![0x86, 0x13, 0x25]);

        let report = Command::decode(&[0x86, 0x14, 0x25, 0x02]).unwrap();

        assert_eq!(
            report,
            Command::VersionCommandClassReport(VersionCommandClassReport {
                requested_command_class: 0x25,
                command_class_version: 2,
            })
        );
    }

    #[test]
    fn report_updates_state() {
        let mut cc = CommandClass::load(CMD_CLASS, false);
        let report = VersionReport {
            zwave_library_type: 6,
            ..VersionReport::default()
        };

        assert!(cc.handle_message(&Command::from(report)));

        let ClassState::Version(state) = cc.state() else {
            panic!("expected version state");
        };

        assert_eq!(state.zwave_library_type, 6);
    }
}
