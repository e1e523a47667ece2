//! COMMAND_CLASS_ZIP_GATEWAY: gateway operating mode, peer profiles and
//! the unsolicited destination.

use super::{zw_enum, COMMAND_CLASS_ZIP_GATEWAY as CMD_CLASS};
use crate::command::ZwaveFrame;
use crate::error::Error;
use core::net::Ipv6Addr;
use zipcrab_wire::{BitReader, BitWriter, ZipWireRead, ZipWireWrite};

pub const GATEWAY_MODE_SET: u8 = 0x01;
pub const GATEWAY_MODE_GET: u8 = 0x02;
pub const GATEWAY_MODE_REPORT: u8 = 0x03;
pub const GATEWAY_PEER_SET: u8 = 0x04;
pub const GATEWAY_PEER_GET: u8 = 0x05;
pub const GATEWAY_PEER_REPORT: u8 = 0x06;
pub const GATEWAY_LOCK_SET: u8 = 0x07;
pub const UNSOLICITED_DESTINATION_SET: u8 = 0x08;
pub const UNSOLICITED_DESTINATION_GET: u8 = 0x09;
pub const UNSOLICITED_DESTINATION_REPORT: u8 = 0x0a;
pub const COMMAND_APPLICATION_NODE_INFO_SET: u8 = 0x0b;
pub const COMMAND_APPLICATION_NODE_INFO_GET: u8 = 0x0c;
pub const COMMAND_APPLICATION_NODE_INFO_REPORT: u8 = 0x0d;

zw_enum! {
    /// Gateway operating mode.
    pub enum GatewayMode {
        Standalone = 0x01,
        Portal = 0x02,
    }
}

macro_rules! mode_frame {
    ($(#[$meta:meta])* $ty:ident, $cmd:expr, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        pub struct $ty {
            pub mode: GatewayMode,
        }

        impl ZwaveFrame for $ty {
            const CMD_CLASS: u8 = CMD_CLASS;
            const CMD: u8 = $cmd;
            const NAME: &'static str = $name;

            fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
                Ok(Self {
                    mode: GatewayMode::from(reader.byte()?),
                })
            }

            fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
                writer.byte(self.mode.into()).map_err(Error::from)
            }
        }
    };
}

mode_frame! {
    /// GATEWAY_MODE_SET.
    GatewayModeSet, GATEWAY_MODE_SET, "GATEWAY_MODE_SET"
}

mode_frame! {
    /// GATEWAY_MODE_REPORT.
    GatewayModeReport, GATEWAY_MODE_REPORT, "GATEWAY_MODE_REPORT"
}

macro_rules! empty_frame {
    ($(#[$meta:meta])* $ty:ident, $class:expr, $cmd:expr, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
        pub struct $ty;

        impl ZwaveFrame for $ty {
            const CMD_CLASS: u8 = $class;
            const CMD: u8 = $cmd;
            const NAME: &'static str = $name;

            fn parse(_reader: &mut BitReader<'_>) -> Result<Self, Error> {
                Ok(Self)
            }

            fn write(&self, _writer: &mut BitWriter) -> Result<(), Error> {
                Ok(())
            }
        }
    };
}

pub(crate) use empty_frame;

empty_frame! {
    /// GATEWAY_MODE_GET.
    GatewayModeGet, CMD_CLASS, GATEWAY_MODE_GET, "GATEWAY_MODE_GET"
}

empty_frame! {
    /// GATEWAY_PEER_GET.
    GatewayPeerGet, CMD_CLASS, GATEWAY_PEER_GET, "GATEWAY_PEER_GET"
}

empty_frame! {
    /// UNSOLICITED_DESTINATION_GET.
    UnsolicitedDestinationGet, CMD_CLASS, UNSOLICITED_DESTINATION_GET,
    "UNSOLICITED_DESTINATION_GET"
}

empty_frame! {
    /// COMMAND_APPLICATION_NODE_INFO_GET.
    ApplicationNodeInfoGet, CMD_CLASS, COMMAND_APPLICATION_NODE_INFO_GET,
    "COMMAND_APPLICATION_NODE_INFO_GET"
}

/// Shared body of GATEWAY_PEER_SET / GATEWAY_PEER_REPORT.
macro_rules! peer_frame {
    ($(#[$meta:meta])* $ty:ident, $cmd:expr, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $ty {
            pub peer_profile: u8,
            pub ipv6: Ipv6Addr,
            pub port: u16,
            pub peer_name: Vec<u8>,
        }

        impl Default for $ty {
            fn default() -> Self {
                Self {
                    peer_profile: 0,
                    ipv6: Ipv6Addr::UNSPECIFIED,
                    port: 0,
                    peer_name: Vec::new(),
                }
            }
        }

        impl ZwaveFrame for $ty {
            const CMD_CLASS: u8 = CMD_CLASS;
            const CMD: u8 = $cmd;
            const NAME: &'static str = $name;

            fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
                let peer_profile = reader.byte()?;
                let ipv6 = Ipv6Addr::deserialize(reader)?;
                let port = u16::deserialize(reader)?;
                reader.skip_bits(2)?;
                let name_length = reader.bits(6)?;
                let peer_name = reader.bytes(usize::from(name_length))?.to_vec();

                Ok(Self {
                    peer_profile,
                    ipv6,
                    port,
                    peer_name,
                })
            }

            fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
                writer.byte(self.peer_profile).map_err(Error::from)?;
                self.ipv6.serialize(writer).map_err(Error::from)?;
                self.port.serialize(writer).map_err(Error::from)?;
                writer.reserved(2);
                writer.bits(self.peer_name.len() as u8, 6);
                writer.bytes(&self.peer_name).map_err(Error::from)
            }
        }
    };
}

peer_frame! {
    /// GATEWAY_PEER_SET.
    GatewayPeerSet, GATEWAY_PEER_SET, "GATEWAY_PEER_SET"
}

peer_frame! {
    /// GATEWAY_PEER_REPORT.
    GatewayPeerReport, GATEWAY_PEER_REPORT, "GATEWAY_PEER_REPORT"
}

/// GATEWAY_LOCK_SET: lock the gateway configuration, optionally keeping
/// it discoverable.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GatewayLockSet {
    pub show: bool,
    pub lock: bool,
}

impl ZwaveFrame for GatewayLockSet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = GATEWAY_LOCK_SET;
    const NAME: &'static str = "GATEWAY_LOCK_SET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        reader.skip_bits(6)?;
        let show = reader.bit()?;
        let lock = reader.bit()?;

        Ok(Self { show, lock })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.reserved(6);
        writer.flag(self.show);
        writer.flag(self.lock);

        Ok(())
    }
}

/// Shared body of UNSOLICITED_DESTINATION_SET / _REPORT.
macro_rules! unsolicited_frame {
    ($(#[$meta:meta])* $ty:ident, $cmd:expr, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $ty {
            pub ipv6: Ipv6Addr,
            pub port: u16,
        }

        impl ZwaveFrame for $ty {
            const CMD_CLASS: u8 = CMD_CLASS;
            const CMD: u8 = $cmd;
            const NAME: &'static str = $name;

            fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
                Ok(Self {
                    ipv6: Ipv6Addr::deserialize(reader)?,
                    port: u16::deserialize(reader)?,
                })
            }

            fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
                self.ipv6.serialize(writer).map_err(Error::from)?;
                self.port.serialize(writer).map_err(Error::from)
            }
        }
    };
}

unsolicited_frame! {
    /// UNSOLICITED_DESTINATION_SET: where the gateway should send
    /// unsolicited node traffic.
    UnsolicitedDestinationSet, UNSOLICITED_DESTINATION_SET,
    "UNSOLICITED_DESTINATION_SET"
}

unsolicited_frame! {
    /// UNSOLICITED_DESTINATION_REPORT.
    UnsolicitedDestinationReport, UNSOLICITED_DESTINATION_REPORT,
    "UNSOLICITED_DESTINATION_REPORT"
}

/// Shared body of COMMAND_APPLICATION_NODE_INFO_SET / _REPORT: the NIF the
/// gateway advertises on our behalf.
macro_rules! node_info_frame {
    ($(#[$meta:meta])* $ty:ident, $cmd:expr, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, PartialEq, Eq)]
        pub struct $ty {
            /// Raw NIF class bytes, marks included.
            pub command_classes: Vec<u8>,
        }

        impl ZwaveFrame for $ty {
            const CMD_CLASS: u8 = CMD_CLASS;
            const CMD: u8 = $cmd;
            const NAME: &'static str = $name;

            fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
                Ok(Self {
                    command_classes: reader.remaining().to_vec(),
                })
            }

            fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
                writer.bytes(&self.command_classes).map_err(Error::from)
            }
        }
    };
}

node_info_frame! {
    /// COMMAND_APPLICATION_NODE_INFO_SET.
    ApplicationNodeInfoSet, COMMAND_APPLICATION_NODE_INFO_SET,
    "COMMAND_APPLICATION_NODE_INFO_SET"
}

node_info_frame! {
    /// COMMAND_APPLICATION_NODE_INFO_REPORT.
    ApplicationNodeInfoReport, COMMAND_APPLICATION_NODE_INFO_REPORT,
    "COMMAND_APPLICATION_NODE_INFO_REPORT"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use pretty_assertions::assert_eq;

    #[test]
    fn mode_round_trip() {
        let raw = Command::from(GatewayModeSet {
            mode: GatewayMode::Standalone,
        })
        .compose()
        .unwrap();

        assert_eq!(raw, vec![0x5f, 0x01, 0x01]);
        assert_eq!(
            Command::decode(&[0x5f, 0x03, 0x02]).unwrap(),
            Command::GatewayModeReport(GatewayModeReport {
                mode: GatewayMode::Portal,
            })
        );
    }

    #[test]
    fn unsolicited_destination_round_trip() {
        let set = UnsolicitedDestinationSet {
            ipv6: "fd00:aaaa::2".parse().unwrap(),
            port: 4123,
        };

        let raw = Command::from(set.clone()).compose().unwrap();

        assert_eq!(raw.len(), 2 + 16 + 2);
        assert_eq!(&raw[18..], &[0x10, 0x1b]);
        assert_eq!(
            Command::decode(&raw).unwrap(),
            Command::UnsolicitedDestinationSet(set)
        );
    }

    #[test]
    fn peer_set_name_length() {
        let set = GatewayPeerSet {
            peer_profile: 1,
            ipv6: "fd00::1".parse().unwrap(),
            port: 443,
            peer_name: b"portal".to_vec(),
        };

        let raw = Command::from(set.clone()).compose().unwrap();

        // Name length rides in the low six bits.
        assert_eq!(raw[2 + 1 + 16 + 2], 6);
        assert_eq!(Command::decode(&raw).unwrap(), Command::GatewayPeerSet(set));
    }
}
