//! The polymorphic Z-Wave command frame and its `(cmdClass, cmd)` registry.
//!
//! Every registered frame is a plain struct implementing [`ZwaveFrame`];
//! the [`Command`] sum type closes over all of them plus an [`Opaque`]
//! fallback that preserves unknown frames byte-for-byte. The `commands!`
//! macro below generates the registry dispatch in both directions.

use crate::command_class::application_status::{ApplicationBusy, ApplicationRejectedRequest};
use crate::command_class::association::{
    AssociationGet, AssociationGroupingsGet, AssociationGroupingsReport, AssociationRemove,
    AssociationReport, AssociationSet,
};
use crate::command_class::association_grp_info::{
    GroupCommandListGet, GroupCommandListReport, GroupInfoGet, GroupInfoReport, GroupNameGet,
    GroupNameReport,
};
use crate::command_class::basic::{BasicGet, BasicReport, BasicSet};
use crate::command_class::battery::{BatteryGet, BatteryReport};
use crate::command_class::configuration::{ConfigurationGet, ConfigurationReport, ConfigurationSet};
use crate::command_class::indicator::{IndicatorGet, IndicatorReport, IndicatorSet};
use crate::command_class::mailbox::{
    MailboxConfigurationGet, MailboxConfigurationReport, MailboxConfigurationSet, MailboxQueue,
    MailboxNodeFailing, MailboxQueueFlush, MailboxWakeupNotification,
};
use crate::command_class::manufacturer_specific::{
    ManufacturerSpecificGet, ManufacturerSpecificReport,
};
use crate::command_class::meter::{MeterGet, MeterReport, MeterSupportedGet, MeterSupportedReport};
use crate::command_class::multi_channel::{
    CapabilityGet, CapabilityReport, EndPointGet, EndPointReport,
};
use crate::command_class::network_management_inclusion::{
    FailedNodeRemove, FailedNodeRemoveStatus, FailedNodeReplace, FailedNodeReplaceStatus, NodeAdd,
    NodeAddDskReport, NodeAddDskSet, NodeAddKeysReport, NodeAddKeysSet, NodeAddStatus, NodeRemove,
    NodeRemoveStatus, NodeNeighborUpdateRequest, NodeNeighborUpdateStatus, ReturnRouteAssign,
    ReturnRouteAssignComplete, ReturnRouteDelete, ReturnRouteDeleteComplete,
    SmartStartJoinStartedReport,
};
use crate::command_class::network_management_proxy::{
    FailedNodeListGet, FailedNodeListReport, MultiChannelCapabilityGet,
    MultiChannelCapabilityReport, MultiChannelEndPointGet, MultiChannelEndPointReport,
    NodeInfoCachedGet, NodeInfoCachedReport, NodeListGet, NodeListReport,
};
use crate::command_class::node_provisioning::{
    NodeProvisioningDelete, NodeProvisioningListIterationGet,
    NodeProvisioningListIterationReport, NodeProvisioningSet,
};
use crate::command_class::sensor_multilevel::{SensorMultilevelGet, SensorMultilevelReport};
use crate::command_class::supervision::{SupervisionGet, SupervisionReport};
use crate::command_class::switch_binary::{SwitchBinaryGet, SwitchBinaryReport, SwitchBinarySet};
use crate::command_class::version::{
    VersionCommandClassGet, VersionCommandClassReport, VersionGet, VersionReport,
};
use crate::command_class::zip::{ZipKeepAlive, ZipPacket};
use crate::command_class::zip_gateway::{
    ApplicationNodeInfoGet, ApplicationNodeInfoReport, ApplicationNodeInfoSet, GatewayLockSet,
    GatewayModeGet, GatewayModeReport, GatewayModeSet, GatewayPeerGet, GatewayPeerReport,
    GatewayPeerSet, UnsolicitedDestinationGet, UnsolicitedDestinationReport,
    UnsolicitedDestinationSet,
};
use crate::command_class::zip_nd::{
    ZipInvNodeSolicitation, ZipNodeAdvertisement, ZipNodeSolicitation,
};
use crate::command_class::zwave_plus_info::{ZwavePlusInfoGet, ZwavePlusInfoReport};
use crate::error::Error;
use zipcrab_wire::{BitReader, BitWriter};

/// A registered Z-Wave command class frame.
///
/// The wire layout is the declared attribute order of the implementing
/// struct; `parse` and `write` must mirror each other bit for bit.
pub trait ZwaveFrame: Sized {
    /// Command class identifier.
    const CMD_CLASS: u8;

    /// Command identifier within the class.
    const CMD: u8;

    /// The frame name as given by the Z-Wave specification.
    const NAME: &'static str;

    /// Registry key: `(cmdClass << 8) | cmd`.
    const HID: u16 = (Self::CMD_CLASS as u16) << 8 | Self::CMD as u16;

    /// Parse the frame body (everything after the two id bytes).
    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error>;

    /// Write the frame body (everything after the two id bytes).
    fn write(&self, writer: &mut BitWriter) -> Result<(), Error>;
}

/// A frame whose `(cmdClass, cmd)` pair is not registered.
///
/// `hid` and the raw payload are preserved so the frame can be re-emitted
/// byte-for-byte (mailbox entries forward frames we do not understand). A
/// buffer shorter than the two id bytes decodes with `hid == 0`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Opaque {
    pub hid: u16,
    pub payload: Vec<u8>,
}

impl Opaque {
    pub fn cmd_class(&self) -> u8 {
        (self.hid >> 8) as u8
    }

    pub fn cmd(&self) -> u8 {
        (self.hid & 0xff) as u8
    }
}

macro_rules! commands {
    ($($variant:ident),+ $(,)?) => {
        /// Every Z-Wave command frame this stack understands, plus
        /// [`Opaque`] for everything else.
        #[derive(Debug, Clone, PartialEq)]
        #[non_exhaustive]
        pub enum Command {
            $($variant($variant),)+
            Opaque(Opaque),
        }

        $(
            impl From<$variant> for Command {
                fn from(frame: $variant) -> Self {
                    Command::$variant(frame)
                }
            }

            impl TryFrom<Command> for $variant {
                type Error = Command;

                fn try_from(command: Command) -> Result<Self, Command> {
                    match command {
                        Command::$variant(frame) => Ok(frame),
                        other => Err(other),
                    }
                }
            }
        )+

        impl Command {
            /// The frame name, or `UNKNOWN` for opaque frames.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Command::$variant(_) => <$variant>::NAME,)+
                    Command::Opaque(_) => "UNKNOWN",
                }
            }

            /// Registry key of this frame.
            pub fn hid(&self) -> u16 {
                match self {
                    $(Command::$variant(_) => <$variant>::HID,)+
                    Command::Opaque(o) => o.hid,
                }
            }

            fn parse_registered(
                hid: u16,
                reader: &mut BitReader<'_>,
            ) -> Result<Option<Command>, Error> {
                let command = match hid {
                    $(h if h == <$variant>::HID => {
                        Command::$variant(<$variant>::parse(reader)?)
                    })+
                    _ => return Ok(None),
                };

                Ok(Some(command))
            }

            fn write_body(&self, writer: &mut BitWriter) -> Result<(), Error> {
                match self {
                    $(Command::$variant(frame) => frame.write(writer),)+
                    Command::Opaque(o) => {
                        writer.bytes(&o.payload).map_err(Error::from)
                    }
                }
            }
        }
    };
}

commands! {
    // COMMAND_CLASS_ZIP
    ZipPacket,
    ZipKeepAlive,
    // COMMAND_CLASS_ZIP_ND
    ZipNodeAdvertisement,
    ZipNodeSolicitation,
    ZipInvNodeSolicitation,
    // COMMAND_CLASS_ZIP_GATEWAY
    GatewayModeSet,
    GatewayModeGet,
    GatewayModeReport,
    GatewayPeerSet,
    GatewayPeerGet,
    GatewayPeerReport,
    GatewayLockSet,
    UnsolicitedDestinationSet,
    UnsolicitedDestinationGet,
    UnsolicitedDestinationReport,
    ApplicationNodeInfoSet,
    ApplicationNodeInfoGet,
    ApplicationNodeInfoReport,
    // COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY
    NodeListGet,
    NodeListReport,
    NodeInfoCachedGet,
    NodeInfoCachedReport,
    MultiChannelEndPointGet,
    MultiChannelEndPointReport,
    MultiChannelCapabilityGet,
    MultiChannelCapabilityReport,
    FailedNodeListGet,
    FailedNodeListReport,
    // COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION
    NodeAdd,
    NodeAddStatus,
    NodeRemove,
    NodeRemoveStatus,
    FailedNodeRemove,
    FailedNodeRemoveStatus,
    FailedNodeReplace,
    FailedNodeReplaceStatus,
    NodeNeighborUpdateRequest,
    NodeNeighborUpdateStatus,
    ReturnRouteAssign,
    ReturnRouteAssignComplete,
    ReturnRouteDelete,
    ReturnRouteDeleteComplete,
    NodeAddKeysReport,
    NodeAddKeysSet,
    NodeAddDskReport,
    NodeAddDskSet,
    SmartStartJoinStartedReport,
    // COMMAND_CLASS_VERSION
    VersionGet,
    VersionReport,
    VersionCommandClassGet,
    VersionCommandClassReport,
    // COMMAND_CLASS_SUPERVISION
    SupervisionGet,
    SupervisionReport,
    // COMMAND_CLASS_MULTI_CHANNEL_V2
    EndPointGet,
    EndPointReport,
    CapabilityGet,
    CapabilityReport,
    // COMMAND_CLASS_MAILBOX
    MailboxConfigurationGet,
    MailboxConfigurationSet,
    MailboxConfigurationReport,
    MailboxQueue,
    MailboxWakeupNotification,
    MailboxNodeFailing,
    MailboxQueueFlush,
    // COMMAND_CLASS_BASIC
    BasicSet,
    BasicGet,
    BasicReport,
    // COMMAND_CLASS_CONFIGURATION
    ConfigurationSet,
    ConfigurationGet,
    ConfigurationReport,
    // COMMAND_CLASS_ASSOCIATION
    AssociationSet,
    AssociationGet,
    AssociationReport,
    AssociationRemove,
    AssociationGroupingsGet,
    AssociationGroupingsReport,
    // COMMAND_CLASS_ASSOCIATION_GRP_INFO
    GroupNameGet,
    GroupNameReport,
    GroupInfoGet,
    GroupInfoReport,
    GroupCommandListGet,
    GroupCommandListReport,
    // COMMAND_CLASS_BATTERY
    BatteryGet,
    BatteryReport,
    // COMMAND_CLASS_SWITCH_BINARY
    SwitchBinarySet,
    SwitchBinaryGet,
    SwitchBinaryReport,
    // COMMAND_CLASS_MANUFACTURER_SPECIFIC
    ManufacturerSpecificGet,
    ManufacturerSpecificReport,
    // COMMAND_CLASS_ZWAVEPLUS_INFO
    ZwavePlusInfoGet,
    ZwavePlusInfoReport,
    // COMMAND_CLASS_METER
    MeterGet,
    MeterReport,
    MeterSupportedGet,
    MeterSupportedReport,
    // COMMAND_CLASS_SENSOR_MULTILEVEL
    SensorMultilevelGet,
    SensorMultilevelReport,
    // COMMAND_CLASS_APPLICATION_STATUS
    ApplicationBusy,
    ApplicationRejectedRequest,
    // COMMAND_CLASS_INDICATOR
    IndicatorSet,
    IndicatorGet,
    IndicatorReport,
    // COMMAND_CLASS_NODE_PROVISIONING
    NodeProvisioningSet,
    NodeProvisioningDelete,
    NodeProvisioningListIterationGet,
    NodeProvisioningListIterationReport,
}

impl Command {
    /// Command class identifier of this frame.
    pub fn cmd_class(&self) -> u8 {
        (self.hid() >> 8) as u8
    }

    /// Command identifier of this frame within its class.
    pub fn cmd(&self) -> u8 {
        (self.hid() & 0xff) as u8
    }

    /// Decode a frame from raw bytes.
    ///
    /// An unregistered `(cmdClass, cmd)` yields [`Command::Opaque`]; fewer
    /// than two bytes yield an opaque frame with `hid == 0`. A registered
    /// frame whose body fails to parse is an error — callers on the
    /// receive path log the raw bytes and drop the datagram.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 2 {
            return Ok(Command::Opaque(Opaque {
                hid: 0,
                payload: bytes.to_vec(),
            }));
        }

        let hid = u16::from_be_bytes([bytes[0], bytes[1]]);
        let mut reader = BitReader::new(&bytes[2..]);

        match Self::parse_registered(hid, &mut reader)? {
            Some(command) => Ok(command),
            None => Ok(Command::Opaque(Opaque {
                hid,
                payload: bytes[2..].to_vec(),
            })),
        }
    }

    /// Compose this frame to its wire form: `cmdClass`, `cmd`, then the
    /// attributes in declared order.
    pub fn compose(&self) -> Result<Vec<u8>, Error> {
        let mut writer = BitWriter::new();

        // An opaque frame with hid 0 came from a buffer too short to carry
        // the id bytes; re-emit it verbatim.
        if self.hid() != 0 {
            writer
                .bytes(&self.hid().to_be_bytes())
                .map_err(Error::from)?;
        }

        self.write_body(&mut writer)?;

        Ok(writer.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_frame_is_opaque() {
        let raw = [0xee, 0x01, 0xaa, 0xbb];
        let decoded = Command::decode(&raw).unwrap();

        let Command::Opaque(ref o) = decoded else {
            panic!("expected opaque frame");
        };

        assert_eq!(o.hid, 0xee01);
        assert_eq!(o.cmd_class(), 0xee);
        assert_eq!(o.cmd(), 0x01);
        assert_eq!(o.payload, vec![0xaa, 0xbb]);
        assert_eq!(decoded.name(), "UNKNOWN");

        // Opaque frames re-emit byte for byte.
        assert_eq!(decoded.compose().unwrap(), raw.to_vec());
    }

    #[test]
    fn short_frame_is_opaque_hid_zero() {
        let decoded = Command::decode(&[0x20]).unwrap();

        assert_eq!(decoded.hid(), 0);
        assert_eq!(decoded.compose().unwrap(), vec![0x20]);
    }

    #[test]
    fn registered_round_trip() {
        let raw = [0x52, 0x01, 0x07];
        let decoded = Command::decode(&raw).unwrap();

        assert_eq!(decoded, Command::NodeListGet(NodeListGet { seq_no: 7 }));
        assert_eq!(decoded.name(), "NODE_LIST_GET");
        assert_eq!(decoded.cmd_class(), 0x52);
        assert_eq!(decoded.cmd(), 0x01);
        assert_eq!(decoded.compose().unwrap(), raw.to_vec());
    }

    #[test]
    fn typed_extraction() {
        let decoded = Command::decode(&[0x20, 0x03, 0xff]).unwrap();
        let report = BasicReport::try_from(decoded).unwrap();

        assert_eq!(report.value, 0xff);
        assert!(BasicReport::try_from(Command::from(BasicGet)).is_err());
    }
}
