//! COMMAND_CLASS_BASIC: the lowest common denominator value interface.

use super::{ClassSpec, ClassState, CommandClass, COMMAND_CLASS_BASIC as CMD_CLASS};
use crate::command::{Command, ZwaveFrame};
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use zipcrab_wire::{BitReader, BitWriter};

pub const BASIC_SET: u8 = 0x01;
pub const BASIC_GET: u8 = 0x02;
pub const BASIC_REPORT: u8 = 0x03;

/// BASIC_SET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BasicSet {
    pub value: u8,
}

impl ZwaveFrame for BasicSet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = BASIC_SET;
    const NAME: &'static str = "BASIC_SET";

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
    /// BASIC_GET.
    BasicGet, CMD_CLASS, BASIC_GET, "BASIC_GET"
}

/// BASIC_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BasicReport {
    pub value: u8,
}

impl ZwaveFrame for BasicReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = BASIC_REPORT;
    const NAME: &'static str = "BASIC_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            value: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.value).map_err(Error::from)
    }
}

/// Last reported basic value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicState {
    pub value: Option<u8>,
}

fn new_state() -> ClassState {
    ClassState::Basic(BasicState::default())
}

fn interview<'a>(_node: &'a Node, _class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async { Ok(()) })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    let Command::BasicReport(report) = message else {
        return false;
    };

    if let ClassState::Basic(state) = cc.state_mut() {
        state.value = Some(report.value);
    }

    true
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_BASIC",
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
            Command::from(BasicSet { value: 0xff }).compose().unwrap(),
            vec![0x20, 0x01, 0xff]
        );
        assert_eq!(
            Command::from(BasicGet).compose().unwrap(),
            vec![0x20, 0x02]
        );
        assert_eq!(
            Command::decode(&[0x20, 0x03, 0x63]).unwrap(),
            Command::BasicReport(BasicReport { value: 0x63 })
        );
    }

    #[test]
    fn report_updates_state() {
        let mut cc = CommandClass::load(CMD_CLASS, false);

        assert!(cc.handle_message(&Command::from(BasicReport { value: 42 })));
        assert!(!cc.handle_message(&Command::from(BasicGet)));

        let ClassState::Basic(state) = cc.state() else {
            panic!("expected basic state");
        };

        assert_eq!(state.value, Some(42));
    }
}
