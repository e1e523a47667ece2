//! COMMAND_CLASS_SENSOR_MULTILEVEL.

use super::{ClassSpec, ClassState, CommandClass, COMMAND_CLASS_SENSOR_MULTILEVEL as CMD_CLASS};
use crate::command::{Command, ZwaveFrame};
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use zipcrab_wire::{BitReader, BitWriter, ScaledValue, ZipWireRead, ZipWireWrite};

pub const SENSOR_MULTILEVEL_GET: u8 = 0x04;
pub const SENSOR_MULTILEVEL_REPORT: u8 = 0x05;

empty_frame! {
    /// SENSOR_MULTILEVEL_GET.
    SensorMultilevelGet, CMD_CLASS, SENSOR_MULTILEVEL_GET,
    "SENSOR_MULTILEVEL_GET"
}

/// SENSOR_MULTILEVEL_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SensorMultilevelReport {
    pub sensor_type: u8,
    pub value: ScaledValue,
}

impl ZwaveFrame for SensorMultilevelReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = SENSOR_MULTILEVEL_REPORT;
    const NAME: &'static str = "SENSOR_MULTILEVEL_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            sensor_type: reader.byte()?,
            value: ScaledValue::deserialize(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.sensor_type).map_err(Error::from)?;
        self.value.serialize(writer).map_err(Error::from)
    }
}

/// Last reading per sensor type is not tracked; only the most recent
/// report is kept.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorMultilevelState {
    pub sensor_type: Option<u8>,
    pub last_reading: Option<ScaledValue>,
}

fn new_state() -> ClassState {
    ClassState::SensorMultilevel(SensorMultilevelState::default())
}

fn interview<'a>(_node: &'a Node, _class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async { Ok(()) })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    let Command::SensorMultilevelReport(report) = message else {
        return false;
    };

    if let ClassState::SensorMultilevel(state) = cc.state_mut() {
        state.sensor_type = Some(report.sensor_type);
        state.last_reading = Some(report.value);
    }

    true
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_SENSOR_MULTILEVEL",
    new_state,
    interview,
    handle,
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn temperature_report() {
        // Sensor type 1 (temperature), 22.5 C: precision 1, scale 0,
        // size 2, mantissa 225.
        let raw = [0x31, 0x05, 0x01, 0x22, 0x00, 0xe1];
        let Command::SensorMultilevelReport(report) = Command::decode(&raw).unwrap() else {
            panic!("expected SENSOR_MULTILEVEL_REPORT");
        };

        assert_eq!(report.sensor_type, 1);
        assert_eq!(report.value.value(), 22.5);
        assert_eq!(
            Command::from(report).compose().unwrap(),
            raw.to_vec()
        );
    }
}
