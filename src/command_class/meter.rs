//! COMMAND_CLASS_METER.

use super::{ClassSpec, ClassState, CommandClass, COMMAND_CLASS_METER as CMD_CLASS};
use crate::command::{Command, ZwaveFrame};
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use zipcrab_wire::{BitReader, BitWriter, ScaledValue, ZipWireRead, ZipWireWrite};

pub const METER_GET: u8 = 0x01;
pub const METER_REPORT: u8 = 0x02;
pub const METER_SUPPORTED_GET: u8 = 0x03;
pub const METER_SUPPORTED_REPORT: u8 = 0x04;

empty_frame! {
    /// METER_GET.
    MeterGet, CMD_CLASS, METER_GET, "METER_GET"
}

/// METER_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MeterReport {
    pub rate_type: u8,
    pub meter_type: u8,
    pub value: ScaledValue,
}

impl ZwaveFrame for MeterReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = METER_REPORT;
    const NAME: &'static str = "METER_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        reader.skip_bits(1)?;
        let rate_type = reader.bits(2)?;
        let meter_type = reader.bits(5)?;
        let value = ScaledValue::deserialize(reader)?;

        Ok(Self {
            rate_type,
            meter_type,
            value,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.reserved(1);
        writer.bits(self.rate_type, 2);
        writer.bits(self.meter_type, 5);
        self.value.serialize(writer).map_err(Error::from)
    }
}

empty_frame! {
    /// METER_SUPPORTED_GET.
    MeterSupportedGet, CMD_CLASS, METER_SUPPORTED_GET, "METER_SUPPORTED_GET"
}

/// METER_SUPPORTED_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MeterSupportedReport {
    pub can_reset: bool,
    pub meter_type: u8,
    pub scale_supported: u8,
}

impl ZwaveFrame for MeterSupportedReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = METER_SUPPORTED_REPORT;
    const NAME: &'static str = "METER_SUPPORTED_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let can_reset = reader.bit()?;
        reader.skip_bits(2)?;
        let meter_type = reader.bits(5)?;
        let scale_supported = reader.byte()?;

        Ok(Self {
            can_reset,
            meter_type,
            scale_supported,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.flag(self.can_reset);
        writer.reserved(2);
        writer.bits(self.meter_type, 5);
        writer.byte(self.scale_supported).map_err(Error::from)
    }
}

/// Meter capabilities and the last reading.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeterState {
    pub meter_type: u8,
    pub can_reset: bool,
    pub scale_supported: u8,
    pub last_reading: Option<ScaledValue>,
}

fn new_state() -> ClassState {
    ClassState::Meter(MeterState::default())
}

/// Capability probing arrived with version 2.
fn interview<'a>(node: &'a Node, class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        let version = node
            .with_supported_class(class_id, |cc| cc.version())
            .unwrap_or(0);

        if version < 2 {
            return Ok(());
        }

        let report: MeterSupportedReport = node.send_and_receive(MeterSupportedGet).await?;

        node.with_supported_class(class_id, |cc| {
            if let ClassState::Meter(state) = cc.state_mut() {
                state.meter_type = report.meter_type;
                state.can_reset = report.can_reset;
                state.scale_supported = report.scale_supported;
            }
        });

        Ok(())
    })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    match message {
        Command::MeterReport(report) => {
            if let ClassState::Meter(state) = cc.state_mut() {
                state.meter_type = report.meter_type;
                state.last_reading = Some(report.value);
            }

            true
        }
        Command::MeterSupportedReport(report) => {
            if let ClassState::Meter(state) = cc.state_mut() {
                state.meter_type = report.meter_type;
                state.can_reset = report.can_reset;
                state.scale_supported = report.scale_supported;
            }

            true
        }
        _ => false,
    }
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_METER",
    new_state,
    interview,
    handle,
};
