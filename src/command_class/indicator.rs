//! COMMAND_CLASS_INDICATOR (version 1 value interface).

use super::{ClassSpec, ClassState, CommandClass, COMMAND_CLASS_INDICATOR as CMD_CLASS};
use crate::command::{Command, ZwaveFrame};
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use zipcrab_wire::{BitReader, BitWriter};

pub const INDICATOR_SET: u8 = 0x01;
pub const INDICATOR_GET: u8 = 0x02;
pub const INDICATOR_REPORT: u8 = 0x03;

/// INDICATOR_SET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct IndicatorSet {
    pub value: u8,
}

impl ZwaveFrame for IndicatorSet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = INDICATOR_SET;
    const NAME: &'static str = "INDICATOR_SET";

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
    /// INDICATOR_GET.
    IndicatorGet, CMD_CLASS, INDICATOR_GET, "INDICATOR_GET"
}

/// INDICATOR_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct IndicatorReport {
    pub value: u8,
}

impl ZwaveFrame for IndicatorReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = INDICATOR_REPORT;
    const NAME: &'static str = "INDICATOR_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            value: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.value).map_err(Error::from)
    }
}

/// Last reported indicator value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndicatorState {
    pub value: Option<u8>,
}

fn new_state() -> ClassState {
    ClassState::Indicator(IndicatorState::default())
}

fn interview<'a>(_node: &'a Node, _class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async { Ok(()) })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    let Command::IndicatorReport(report) = message else {
        return false;
    };

    if let ClassState::Indicator(state) = cc.state_mut() {
        state.value = Some(report.value);
    }

    true
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_INDICATOR",
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
            Command::from(IndicatorSet { value: 0x01 }).compose().unwrap(),
            vec![0x87, 0x01, 0x01]
        );
        assert_eq!(
            Command::from(IndicatorGet).compose().unwrap(),
            vec![0x87, 0x02]
        );

        let raw = [0x87, 0x03, 0xff];
        let decoded = Command::decode(&raw).unwrap();

        assert_eq!(
            decoded,
            Command::IndicatorReport(IndicatorReport { value: 0xff })
        );
        assert_eq!(decoded.compose().unwrap(), raw.to_vec());
    }

    #[test]
    fn report_updates_state() {
        let mut cc = CommandClass::load(CMD_CLASS, false);

        assert!(cc.handle_message(&Command::from(IndicatorReport { value: 0x63 })));
        assert!(!cc.handle_message(&Command::from(IndicatorGet)));

        let ClassState::Indicator(state) = cc.state() else {
            panic!("expected indicator state");
        };

        assert_eq!(state.value, Some(0x63));
    }
}
