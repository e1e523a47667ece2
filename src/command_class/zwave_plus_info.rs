//! COMMAND_CLASS_ZWAVEPLUS_INFO.

use super::{ClassSpec, ClassState, CommandClass, COMMAND_CLASS_ZWAVEPLUS_INFO as CMD_CLASS};
use crate::command::{Command, ZwaveFrame};
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use zipcrab_wire::{BitReader, BitWriter, ZipWireRead, ZipWireWrite};

pub const ZWAVEPLUS_INFO_GET: u8 = 0x01;
pub const ZWAVEPLUS_INFO_REPORT: u8 = 0x02;

empty_frame! {
    /// ZWAVEPLUS_INFO_GET.
    ZwavePlusInfoGet, CMD_CLASS, ZWAVEPLUS_INFO_GET, "ZWAVEPLUS_INFO_GET"
}

/// ZWAVEPLUS_INFO_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ZwavePlusInfoReport {
    pub zwave_plus_version: u8,
    pub role_type: u8,
    pub node_type: u8,
    pub installer_icon_type: u16,
    pub user_icon_type: u16,
}

impl ZwaveFrame for ZwavePlusInfoReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ZWAVEPLUS_INFO_REPORT;
    const NAME: &'static str = "ZWAVEPLUS_INFO_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            zwave_plus_version: reader.byte()?,
            role_type: reader.byte()?,
            node_type: reader.byte()?,
            installer_icon_type: u16::deserialize(reader)?,
            user_icon_type: u16::deserialize(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.zwave_plus_version).map_err(Error::from)?;
        writer.byte(self.role_type).map_err(Error::from)?;
        writer.byte(self.node_type).map_err(Error::from)?;
        self.installer_icon_type
            .serialize(writer)
            .map_err(Error::from)?;
        self.user_icon_type.serialize(writer).map_err(Error::from)
    }
}

/// Z-Wave Plus identity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ZwavePlusInfoState {
    pub zwave_plus_version: u8,
    pub role_type: u8,
    pub node_type: u8,
    pub installer_icon_type: u16,
    pub user_icon_type: u16,
}

fn new_state() -> ClassState {
    ClassState::ZwavePlusInfo(ZwavePlusInfoState::default())
}

fn interview<'a>(node: &'a Node, class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        let report: ZwavePlusInfoReport = node.send_and_receive(ZwavePlusInfoGet).await?;

        node.with_supported_class(class_id, |cc| {
            if let ClassState::ZwavePlusInfo(state) = cc.state_mut() {
                *state = ZwavePlusInfoState {
                    zwave_plus_version: report.zwave_plus_version,
                    role_type: report.role_type,
                    node_type: report.node_type,
                    installer_icon_type: report.installer_icon_type,
                    user_icon_type: report.user_icon_type,
                };
            }
        });

        Ok(())
    })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    let Command::ZwavePlusInfoReport(report) = message else {
        return false;
    };

    if let ClassState::ZwavePlusInfo(state) = cc.state_mut() {
        *state = ZwavePlusInfoState {
            zwave_plus_version: report.zwave_plus_version,
            role_type: report.role_type,
            node_type: report.node_type,
            installer_icon_type: report.installer_icon_type,
            user_icon_type: report.user_icon_type,
        };
    }

    true
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_ZWAVEPLUS_INFO",
    new_state,
    interview,
    handle,
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn report_round_trip() {
        // Version 2, role CST, node type, wall switch icons.
        let raw = [0x5e, 0x02, 0x02, 0x05, 0x00, 0x07, 0x00, 0x07, 0x01];
        let decoded = Command::decode(&raw).unwrap();

        assert_eq!(
            decoded,
            Command::ZwavePlusInfoReport(ZwavePlusInfoReport {
                zwave_plus_version: 2,
                role_type: 5,
                node_type: 0,
                installer_icon_type: 0x0700,
                user_icon_type: 0x0701,
            })
        );
        assert_eq!(decoded.compose().unwrap(), raw.to_vec());
        assert_eq!(
            Command::from(ZwavePlusInfoGet).compose().unwrap(),
            vec![0x5e, 0x01]
        );
    }

    #[test]
    fn report_updates_state() {
        let mut cc = CommandClass::load(CMD_CLASS, false);
        let report = ZwavePlusInfoReport {
            zwave_plus_version: 1,
            role_type: 6,
            node_type: 0,
            installer_icon_type: 0x0600,
            user_icon_type: 0x0600,
        };

        assert!(cc.handle_message(&Command::from(report)));

        let ClassState::ZwavePlusInfo(state) = cc.state() else {
            panic!("expected zwave plus info state");
        };

        assert_eq!(state.role_type, 6);
        assert_eq!(state.installer_icon_type, 0x0600);
    }
}
