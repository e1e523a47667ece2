//! COMMAND_CLASS_MANUFACTURER_SPECIFIC.

use super::{
    ClassSpec, ClassState, CommandClass, COMMAND_CLASS_MANUFACTURER_SPECIFIC as CMD_CLASS,
};
use crate::command::{Command, ZwaveFrame};
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use zipcrab_wire::{BitReader, BitWriter, ZipWireRead, ZipWireWrite};

pub const MANUFACTURER_SPECIFIC_GET: u8 = 0x04;
pub const MANUFACTURER_SPECIFIC_REPORT: u8 = 0x05;

empty_frame! {
    /// MANUFACTURER_SPECIFIC_GET.
    ManufacturerSpecificGet, CMD_CLASS, MANUFACTURER_SPECIFIC_GET,
    "MANUFACTURER_SPECIFIC_GET"
}

/// MANUFACTURER_SPECIFIC_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ManufacturerSpecificReport {
    pub manufacturer_id: u16,
    pub product_type_id: u16,
    pub product_id: u16,
}

impl ZwaveFrame for ManufacturerSpecificReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = MANUFACTURER_SPECIFIC_REPORT;
    const NAME: &'static str = "MANUFACTURER_SPECIFIC_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            manufacturer_id: u16::deserialize(reader)?,
            product_type_id: u16::deserialize(reader)?,
            product_id: u16::deserialize(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        self.manufacturer_id.serialize(writer).map_err(Error::from)?;
        self.product_type_id.serialize(writer).map_err(Error::from)?;
        self.product_id.serialize(writer).map_err(Error::from)
    }
}

/// Manufacturer and product identity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManufacturerSpecificState {
    pub manufacturer_id: u16,
    pub product_type_id: u16,
    pub product_id: u16,
}

fn new_state() -> ClassState {
    ClassState::ManufacturerSpecific(ManufacturerSpecificState::default())
}

fn interview<'a>(node: &'a Node, class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        let report: ManufacturerSpecificReport =
            node.send_and_receive(ManufacturerSpecificGet).await?;

        node.with_supported_class(class_id, |cc| {
            if let ClassState::ManufacturerSpecific(state) = cc.state_mut() {
                state.manufacturer_id = report.manufacturer_id;
                state.product_type_id = report.product_type_id;
                state.product_id = report.product_id;
            }
        });

        Ok(())
    })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    let Command::ManufacturerSpecificReport(report) = message else {
        return false;
    };

    if let ClassState::ManufacturerSpecific(state) = cc.state_mut() {
        state.manufacturer_id = report.manufacturer_id;
        state.product_type_id = report.product_type_id;
        state.product_id = report.product_id;
    }

    true
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_MANUFACTURER_SPECIFIC",
    new_state,
    interview,
    handle,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_round_trip() {
        let raw = [0x72, 0x05, 0x00, 0x63, 0x49, 0x52, 0x30, 0x09];
        let decoded = Command::decode(&raw).unwrap();

        assert_eq!(
            decoded,
            Command::ManufacturerSpecificReport(ManufacturerSpecificReport {
                manufacturer_id: 0x0063,
                product_type_id: 0x4952,
                product_id: 0x3009,
            })
        );
        assert_eq!(decoded.compose().unwrap(), raw.to_vec());
    }
}
