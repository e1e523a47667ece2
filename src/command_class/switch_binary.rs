//! COMMAND_CLASS_SWITCH_BINARY.

use super::{ClassSpec, ClassState, CommandClass, COMMAND_CLASS_SWITCH_BINARY as CMD_CLASS};
use crate::command::{Command, ZwaveFrame};
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use zipcrab_wire::{BitReader, BitWriter};

pub const SWITCH_BINARY_SET: u8 = 0x01;
pub const SWITCH_BINARY_GET: u8 = 0x02;
pub const SWITCH_BINARY_REPORT: u8 = 0x03;

/// SWITCH_BINARY_SET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SwitchBinarySet {
    pub value: u8,
}

impl ZwaveFrame for SwitchBinarySet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = SWITCH_BINARY_SET;
    const NAME: &'static str = "SWITCH_BINARY_SET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            value: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.value).map_err(Error::from)
    }
}

empty_frame! {
    /// SWITCH_BINARY_GET.
    SwitchBinaryGet, CMD_CLASS, SWITCH_BINARY_GET, "SWITCH_BINARY_GET"
}

/// SWITCH_BINARY_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SwitchBinaryReport {
    pub value: u8,
}

impl ZwaveFrame for SwitchBinaryReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = SWITCH_BINARY_REPORT;
    const NAME: &'static str = "SWITCH_BINARY_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            value: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.value).map_err(Error::from)
    }
}

/// Last reported switch state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchBinaryState {
    pub value: Option<u8>,
}

fn new_state() -> ClassState {
    ClassState::SwitchBinary(SwitchBinaryState::default())
}

fn interview<'a>(node: &'a Node, class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        let report: SwitchBinaryReport = node.send_and_receive(SwitchBinaryGet).await?;

        node.with_supported_class(class_id, |cc| {
            if let ClassState::SwitchBinary(state) = cc.state_mut() {
                state.value = Some(report.value);
            }
        });

        Ok(())
    })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    let Command::SwitchBinaryReport(report) = message else {
        return false;
    };

    if let ClassState::SwitchBinary(state) = cc.state_mut() {
        state.value = Some(report.value);
    }

    true
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_SWITCH_BINARY",
    new_state,
    interview,
    handle,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip() {
        assert_eq!(
            Command::from(SwitchBinarySet { value: 0xff }).compose().unwrap(),
            vec![0x25, 0x01, 0xff]
        );
        assert_eq!(
            Command::from(SwitchBinaryGet).compose().unwrap(),
            vec![0x25, 0x02]
        );

        let raw = [0x25, 0x03, 0x00];
        let decoded = Command::decode(&raw).unwrap();

        assert_eq!(
            decoded,
            Command::SwitchBinaryReport(SwitchBinaryReport { value: 0x00 })
        );
        assert_eq!(decoded.compose().unwrap(), raw.to_vec());
    }

    #[test]
    fn report_updates_state() {
        let mut cc = CommandClass::load(CMD_CLASS, false);

        assert!(cc.handle_message(&Command::from(SwitchBinaryReport { value: 0xff })));
        assert!(!cc.handle_message(&Command::from(SwitchBinaryGet)));

        let ClassState::SwitchBinary(state) = cc.state() else {
            panic!("expected switch binary state");
        };

        assert_eq!(state.value, Some(0xff));
    }
}
