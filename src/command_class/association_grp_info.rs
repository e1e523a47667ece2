//! COMMAND_CLASS_ASSOCIATION_GRP_INFO: names, profiles and command lists
//! of a node's association groups.

use super::{ClassSpec, ClassState, CommandClass, COMMAND_CLASS_ASSOCIATION_GRP_INFO as CMD_CLASS};
use crate::command::{Command, ZwaveFrame};
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use std::collections::BTreeMap;
use zipcrab_wire::{BitReader, BitWriter, WireError, ZipWireRead, ZipWireWrite};

pub const ASSOCIATION_GROUP_NAME_GET: u8 = 0x01;
pub const ASSOCIATION_GROUP_NAME_REPORT: u8 = 0x02;
pub const ASSOCIATION_GROUP_INFO_GET: u8 = 0x03;
pub const ASSOCIATION_GROUP_INFO_REPORT: u8 = 0x04;
pub const ASSOCIATION_GROUP_COMMAND_LIST_GET: u8 = 0x05;
pub const ASSOCIATION_GROUP_COMMAND_LIST_REPORT: u8 = 0x06;

/// GROUP_NAME_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GroupNameGet {
    pub grouping_identifier: u8,
}

impl ZwaveFrame for GroupNameGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ASSOCIATION_GROUP_NAME_GET;
    const NAME: &'static str = "GROUP_NAME_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            grouping_identifier: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.grouping_identifier).map_err(Error::from)
    }
}

/// GROUP_NAME_REPORT: a length-prefixed UTF-8 group name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupNameReport {
    pub grouping_identifier: u8,
    pub name: String,
}

impl ZwaveFrame for GroupNameReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ASSOCIATION_GROUP_NAME_REPORT;
    const NAME: &'static str = "GROUP_NAME_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            grouping_identifier: reader.byte()?,
            name: String::deserialize(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.grouping_identifier).map_err(Error::from)?;
        self.name.serialize(writer).map_err(Error::from)
    }
}

/// GROUP_INFO_GET. `listMode` with group 0 asks for every group at once.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GroupInfoGet {
    pub refresh_cache: bool,
    pub list_mode: bool,
    pub grouping_identifier: u8,
}

impl ZwaveFrame for GroupInfoGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ASSOCIATION_GROUP_INFO_GET;
    const NAME: &'static str = "GROUP_INFO_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let refresh_cache = reader.bit()?;
        let list_mode = reader.bit()?;
        reader.skip_bits(6)?;
        let grouping_identifier = reader.byte()?;

        Ok(Self {
            refresh_cache,
            list_mode,
            grouping_identifier,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.flag(self.refresh_cache);
        writer.flag(self.list_mode);
        writer.reserved(6);
        writer.byte(self.grouping_identifier).map_err(Error::from)
    }
}

/// One group entry of a GROUP_INFO_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub grouping_identifier: u8,
    pub mode: u8,
    pub profile: u16,
    pub event_code: u16,
}

/// GROUP_INFO_REPORT: `groupCount` seven-byte group entries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupInfoReport {
    pub list_mode: bool,
    pub dynamic_info: bool,
    pub groups: Vec<GroupInfo>,
}

impl ZwaveFrame for GroupInfoReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ASSOCIATION_GROUP_INFO_REPORT;
    const NAME: &'static str = "GROUP_INFO_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let list_mode = reader.bit()?;
        let dynamic_info = reader.bit()?;
        let group_count = reader.bits(6)?;
        let mut groups = Vec::with_capacity(usize::from(group_count));

        for _ in 0..group_count {
            let grouping_identifier = reader.byte()?;
            let mode = reader.byte()?;
            let profile = u16::deserialize(reader)?;
            reader.skip_bits(8)?;
            let event_code = u16::deserialize(reader)?;

            groups.push(GroupInfo {
                grouping_identifier,
                mode,
                profile,
                event_code,
            });
        }

        Ok(Self {
            list_mode,
            dynamic_info,
            groups,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.flag(self.list_mode);
        writer.flag(self.dynamic_info);

        let count =
            u8::try_from(self.groups.len()).map_err(|_| Error::Encode(WireError::ValueOutOfRange))?;

        if count >= 0x40 {
            return Err(Error::Encode(WireError::ValueOutOfRange));
        }

        writer.bits(count, 6);

        for group in &self.groups {
            writer.byte(group.grouping_identifier).map_err(Error::from)?;
            writer.byte(group.mode).map_err(Error::from)?;
            group.profile.serialize(writer).map_err(Error::from)?;
            writer.reserved(8);
            group.event_code.serialize(writer).map_err(Error::from)?;
        }

        Ok(())
    }
}

/// GROUP_COMMAND_LIST_GET.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GroupCommandListGet {
    pub allow_cache: bool,
    pub grouping_identifier: u8,
}

impl ZwaveFrame for GroupCommandListGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ASSOCIATION_GROUP_COMMAND_LIST_GET;
    const NAME: &'static str = "GROUP_COMMAND_LIST_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let allow_cache = reader.bit()?;
        reader.skip_bits(7)?;
        let grouping_identifier = reader.byte()?;

        Ok(Self {
            allow_cache,
            grouping_identifier,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.flag(self.allow_cache);
        writer.reserved(7);
        writer.byte(self.grouping_identifier).map_err(Error::from)
    }
}

/// GROUP_COMMAND_LIST_REPORT: a length-prefixed run of
/// `(commandClass, command)` pairs the group emits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupCommandListReport {
    pub grouping_identifier: u8,
    pub commands: Vec<(u8, u8)>,
}

impl ZwaveFrame for GroupCommandListReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ASSOCIATION_GROUP_COMMAND_LIST_REPORT;
    const NAME: &'static str = "GROUP_COMMAND_LIST_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let grouping_identifier = reader.byte()?;
        let length = usize::from(reader.byte()?);
        let raw = reader.bytes(length)?;

        if raw.len() % 2 != 0 {
            // TODO: extended (two byte) command class ids in the list.
            return Err(Error::Decode(WireError::BadLength));
        }

        let commands = raw.chunks(2).map(|pair| (pair[0], pair[1])).collect();

        Ok(Self {
            grouping_identifier,
            commands,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.grouping_identifier).map_err(Error::from)?;

        let length = u8::try_from(self.commands.len() * 2)
            .map_err(|_| Error::Encode(WireError::ValueOutOfRange))?;

        writer.byte(length).map_err(Error::from)?;

        for (class, command) in &self.commands {
            writer.byte(*class).map_err(Error::from)?;
            writer.byte(*command).map_err(Error::from)?;
        }

        Ok(())
    }
}

/// What an association group is for.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupRecord {
    pub name: String,
    pub profile: u16,
    pub commands: Vec<(u8, u8)>,
}

/// Groups discovered during the interview.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssociationGrpInfoState {
    pub groupings: BTreeMap<u8, GroupRecord>,
}

fn new_state() -> ClassState {
    ClassState::AssociationGrpInfo(AssociationGrpInfoState::default())
}

/// Ask for all groups at once, then fetch each group's name and command
/// list.
fn interview<'a>(node: &'a Node, class_id: u8) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        let info: GroupInfoReport = node
            .send_and_receive(GroupInfoGet {
                refresh_cache: false,
                list_mode: true,
                grouping_identifier: 0,
            })
            .await?;

        for group in info.groups {
            let name: GroupNameReport = node
                .send_and_receive(GroupNameGet {
                    grouping_identifier: group.grouping_identifier,
                })
                .await?;
            let commands: GroupCommandListReport = node
                .send_and_receive(GroupCommandListGet {
                    allow_cache: true,
                    grouping_identifier: group.grouping_identifier,
                })
                .await?;

            node.with_supported_class(class_id, |cc| {
                if let ClassState::AssociationGrpInfo(state) = cc.state_mut() {
                    state.groupings.insert(
                        group.grouping_identifier,
                        GroupRecord {
                            name: name.name.clone(),
                            profile: group.profile,
                            commands: commands.commands.clone(),
                        },
                    );
                }
            });
        }

        Ok(())
    })
}

fn handle(cc: &mut CommandClass, message: &Command) -> bool {
    let ClassState::AssociationGrpInfo(state) = cc.state_mut() else {
        return false;
    };

    match message {
        Command::GroupInfoReport(report) => {
            for group in &report.groups {
                state
                    .groupings
                    .entry(group.grouping_identifier)
                    .or_default()
                    .profile = group.profile;
            }

            true
        }
        Command::GroupNameReport(report) => {
            if let Some(group) = state.groupings.get_mut(&report.grouping_identifier) {
                group.name = report.name.clone();
            }

            true
        }
        Command::GroupCommandListReport(report) => {
            state
                .groupings
                .entry(report.grouping_identifier)
                .or_default()
                .commands = report.commands.clone();

            true
        }
        _ => false,
    }
}

pub(crate) static SPEC: ClassSpec = ClassSpec {
    id: CMD_CLASS,
    name: "COMMAND_CLASS_ASSOCIATION_GRP_INFO",
    new_state,
    interview,
    handle,
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn info_report_round_trip() {
        let report = GroupInfoReport {
            list_mode: true,
            dynamic_info: false,
            groups: vec![
                GroupInfo {
                    grouping_identifier: 1,
                    mode: 0,
                    profile: 0x0001,
                    event_code: 0,
                },
                GroupInfo {
                    grouping_identifier: 2,
                    mode: 0,
                    profile: 0x2001,
                    event_code: 0,
                },
            ],
        };

        let raw = Command::from(report.clone()).compose().unwrap();

        assert_eq!(raw[2], 0b1000_0010);
        assert_eq!(raw.len(), 3 + 2 * 7);
        assert_eq!(
            Command::decode(&raw).unwrap(),
            Command::GroupInfoReport(report)
        );
    }

    #[test]
    fn command_list_round_trip() {
        let report = GroupCommandListReport {
            grouping_identifier: 1,
            commands: vec![(0x25, 0x03), (0x20, 0x01)],
        };

        let raw = Command::from(report.clone()).compose().unwrap();

        assert_eq!(raw, vec![0x59, 0x06, 0x01, 0x04, 0x25, 0x03, 0x20, 0x01]);
        assert_eq!(
            Command::decode(&raw).unwrap(),
            Command::GroupCommandListReport(report)
        );
    }

    #[test]
    fn name_report_reads_prefixed_string() {
        let raw = [0x59, 0x02, 0x01, 0x08, b'L', b'i', b'f', b'e', b'l', b'i', b'n', b'e'];
        let Command::GroupNameReport(report) = Command::decode(&raw).unwrap() else {
            panic!("expected GROUP_NAME_REPORT");
        };

        assert_eq!(report.grouping_identifier, 1);
        assert_eq!(report.name, "Lifeline");
    }
}
