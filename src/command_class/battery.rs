//! COMMAND_CLASS_BATTERY.

use super::{ClassSpec, ClassState, CommandClass, COMMAND_CLASS_BATTERY as CMD_CLASS};
use crate::command::{Command, ZwaveFrame};
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use zipcrab_wire::{BitReader, BitWriter};

pub const BATTERY_GET: u8 = 0x02;
pub const BATTERY_REPORT: u8 = 0x03;

/// Charge level reported as `0xff` when the battery is critically low.
pub const BATTERY_LOW: u8 = 0xff;

empty_frame! {
    /// BATTERY_GET.
    BatteryGet, CMD_CLASS, BATTERY_GET, "BATTERY_GET"
}

/// BATTERY_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BatteryReport {
    pub value: u8,
}

impl BatteryReport {
    pub fn is_low(&self) -> bool {
        self.value == BATTERY_LOW
    }
}

impl ZwaveFrame for BatteryReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = BATTERY_REPORT;
    const NAME: &'static str = "BATTERY_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            value: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.value).map_err(Error::from)
    }
}

/// Last reported battery level.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatteryState {
    pub level: Option<u8>,
}

fn new_state() -> ClassState {
    ClassState::Battery(BatteryState::default())
}

fn interview<'a>(node: &'a Node, class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        let report: BatteryReport = node.send_and_receive(BatteryGet).await?;

        node.with_supported_class(class_id, |cc| {
            if let ClassState::Battery(state) = cc.state_mut() {
                state.level = Some(report.value);
            }
        });

        Ok(())
    })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    let Command::BatteryReport(report) = message else {
        return false;
    };

    if let ClassState::Battery(state) = cc.state_mut() {
        state.level = Some(report.value);
    }

    true
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_BATTERY",
    new_state,
    interview,
    handle,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_low_battery() {
        let Command::BatteryReport(report) = Command::decode(&[0x80, 0x03, 0xff]).unwrap() else {
            panic!("expected BATTERY_REPORT");
        };

        assert!(report.is_low());
    }
}
