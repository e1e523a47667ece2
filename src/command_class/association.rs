//! COMMAND_CLASS_ASSOCIATION: grouping membership, including the lifeline
//! group routing unsolicited reports to the controller.

use super::{ClassSpec, ClassState, CommandClass, COMMAND_CLASS_ASSOCIATION as CMD_CLASS};
use crate::command::{Command, ZwaveFrame};
use crate::command_class::zip_gateway::empty_frame;
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use zipcrab_wire::{BitReader, BitWriter, WireError, ZipWireRead, ZipWireWrite};

pub const ASSOCIATION_SET: u8 = 0x01;
pub const ASSOCIATION_GET: u8 = 0x02;
pub const ASSOCIATION_REPORT: u8 = 0x03;
pub const ASSOCIATION_REMOVE: u8 = 0x04;
pub const ASSOCIATION_GROUPINGS_GET: u8 = 0x05;
pub const ASSOCIATION_GROUPINGS_REPORT: u8 = 0x06;

/// The lifeline group of a Z-Wave Plus device is always group 1.
pub const LIFELINE_GROUP: u8 = 1;

// TODO: read the controller id from the gateway's node list instead of
// assuming the primary controller is node 1.
pub(crate) const LIFELINE_CONTROLLER_ID: u8 = 1;

/// Association member list: a run of plain node ids, then (after a `0x00`
/// marker) `(nodeId, endpoint)` pairs running to the end of the frame.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssociationNodes {
    pub nodes: Vec<u8>,
    pub endpoints: Vec<(u8, u8)>,
}

impl AssociationNodes {
    const MULTI_CHANNEL_MARKER: u8 = 0x00;

    pub fn single(node_id: u8) -> Self {
        Self {
            nodes: vec![node_id],
            endpoints: Vec::new(),
        }
    }
}

impl ZipWireWrite for AssociationNodes {
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        writer.bytes(&self.nodes)?;

        if !self.endpoints.is_empty() {
            writer.byte(Self::MULTI_CHANNEL_MARKER)?;

            for (node_id, endpoint) in &self.endpoints {
                writer.byte(*node_id)?;
                writer.byte(*endpoint)?;
            }
        }

        Ok(())
    }
}

impl ZipWireRead for AssociationNodes {
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        let raw = reader.remaining();
        let mut parts = raw.splitn(2, |b| *b == Self::MULTI_CHANNEL_MARKER);

        let nodes = parts.next().unwrap_or(&[]).to_vec();
        let tail = parts.next().unwrap_or(&[]);

        if tail.len() % 2 != 0 {
            return Err(WireError::BadLength);
        }

        let endpoints = tail.chunks(2).map(|pair| (pair[0], pair[1])).collect();

        Ok(Self { nodes, endpoints })
    }
}

/// ASSOCIATION_SET.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssociationSet {
    pub grouping_identifier: u8,
    pub nodes: AssociationNodes,
}

impl ZwaveFrame for AssociationSet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ASSOCIATION_SET;
    const NAME: &'static str = "ASSOCIATION_SET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            grouping_identifier: reader.byte()?,
            nodes: AssociationNodes::deserialize(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.grouping_identifier).map_err(Error::from)?;
        self.nodes.serialize(writer).map_err(Error::from)
    }
}

/// ASSOCIATION_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct AssociationGet {
    pub grouping_identifier: u8,
}

impl ZwaveFrame for AssociationGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ASSOCIATION_GET;
    const NAME: &'static str = "ASSOCIATION_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            grouping_identifier: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.grouping_identifier).map_err(Error::from)
    }
}

/// ASSOCIATION_REPORT.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssociationReport {
    pub grouping_identifier: u8,
    pub max_nodes_supported: u8,
    pub reports_to_follow: u8,
    pub nodes: AssociationNodes,
}

impl ZwaveFrame for AssociationReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ASSOCIATION_REPORT;
    const NAME: &'static str = "ASSOCIATION_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            grouping_identifier: reader.byte()?,
            max_nodes_supported: reader.byte()?,
            reports_to_follow: reader.byte()?,
            nodes: AssociationNodes::deserialize(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.grouping_identifier).map_err(Error::from)?;
        writer.byte(self.max_nodes_supported).map_err(Error::from)?;
        writer.byte(self.reports_to_follow).map_err(Error::from)?;
        self.nodes.serialize(writer).map_err(Error::from)
    }
}

/// ASSOCIATION_REMOVE.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssociationRemove {
    pub grouping_identifier: u8,
    pub nodes: AssociationNodes,
}

impl ZwaveFrame for AssociationRemove {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ASSOCIATION_REMOVE;
    const NAME: &'static str = "ASSOCIATION_REMOVE";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            grouping_identifier: reader.byte()?,
            nodes: AssociationNodes::deserialize(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.grouping_identifier).map_err(Error::from)?;
        self.nodes.serialize(writer).map_err(Error::from)
    }
}

empty_frame! {
    /// ASSOCIATION_GROUPINGS_GET.
    AssociationGroupingsGet, CMD_CLASS, ASSOCIATION_GROUPINGS_GET,
    "ASSOCIATION_GROUPINGS_GET"
}

/// ASSOCIATION_GROUPINGS_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct AssociationGroupingsReport {
    pub supported_groupings: u8,
}

impl ZwaveFrame for AssociationGroupingsReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ASSOCIATION_GROUPINGS_REPORT;
    const NAME: &'static str = "ASSOCIATION_GROUPINGS_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            supported_groupings: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.supported_groupings).map_err(Error::from)
    }
}

/// Groupings and lifeline membership.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssociationState {
    pub supported_groupings: u8,
    pub lifeline_nodes: Vec<u8>,
}

fn new_state() -> ClassState {
    ClassState::Association(AssociationState::default())
}

/// Query the grouping count, make sure the controller sits in the
/// lifeline group, then read the group back.
fn interview<'a>(node: &'a Node, class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        let groupings: AssociationGroupingsReport =
            node.send_and_receive(AssociationGroupingsGet).await?;

        node.with_supported_class(class_id, |cc| {
            if let ClassState::Association(state) = cc.state_mut() {
                state.supported_groupings = groupings.supported_groupings;
            }
        });

        node.send(
            AssociationSet {
                grouping_identifier: LIFELINE_GROUP,
                nodes: AssociationNodes::single(LIFELINE_CONTROLLER_ID),
            }
            .into(),
        )
        .await?;

        let report: AssociationReport = node
            .send_and_receive(AssociationGet {
                grouping_identifier: LIFELINE_GROUP,
            })
            .await?;

        node.with_supported_class(class_id, |cc| {
            if let ClassState::Association(state) = cc.state_mut() {
                state.lifeline_nodes = report.nodes.nodes.clone();
            }
        });

        Ok(())
    })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    match message {
        Command::AssociationGroupingsReport(report) => {
            if let ClassState::Association(state) = cc.state_mut() {
                state.supported_groupings = report.supported_groupings;
            }

            true
        }
        Command::AssociationReport(report) => {
            if report.grouping_identifier == LIFELINE_GROUP {
                if let ClassState::Association(state) = cc.state_mut() {
                    state.lifeline_nodes = report.nodes.nodes.clone();
                }
            }

            true
        }
        _ => false,
    }
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_ASSOCIATION",
    new_state,
    interview,
    handle,
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_plain_nodes() {
        let set = AssociationSet {
            grouping_identifier: 1,
            nodes: AssociationNodes {
                nodes: vec![1, 5],
                endpoints: Vec::new(),
            },
        };

        let raw = Command::from(set.clone()).compose().unwrap();

        assert_eq!(raw, vec![0x85, 0x01, 0x01, 0x01, 0x05]);
        assert_eq!(Command::decode(&raw).unwrap(), Command::AssociationSet(set));
    }

    #[test]
    fn set_with_endpoint_pairs() {
        let set = AssociationSet {
            grouping_identifier: 2,
            nodes: AssociationNodes {
                nodes: vec![1],
                endpoints: vec![(6, 2), (7, 1)],
            },
        };

        let raw = Command::from(set.clone()).compose().unwrap();

        assert_eq!(
            raw,
            vec![0x85, 0x01, 0x02, 0x01, 0x00, 0x06, 0x02, 0x07, 0x01]
        );
        assert_eq!(Command::decode(&raw).unwrap(), Command::AssociationSet(set));
    }

    #[test]
    fn report_round_trip() {
        let raw = [0x85, 0x03, 0x01, 0x05, 0x00, 0x01];
        let Command::AssociationReport(report) = Command::decode(&raw).unwrap() else {
            panic!("expected ASSOCIATION_REPORT");
        };

        assert_eq!(report.grouping_identifier, 1);
        assert_eq!(report.max_nodes_supported, 5);
        assert_eq!(report.nodes.nodes, vec![1]);
    }

    #[test]
    fn odd_endpoint_tail_is_rejected() {
        let raw = [0x85, 0x01, 0x01, 0x01, 0x00, 0x06];

        assert!(Command::decode(&raw).is_err());
    }
}
