//! COMMAND_CLASS_ZIP_ND: IPv6 neighbor discovery for Z-Wave nodes.

use super::COMMAND_CLASS_ZIP_ND as CMD_CLASS;
use crate::command::ZwaveFrame;
use crate::error::Error;
use core::net::Ipv6Addr;
use zipcrab_wire::{BitReader, BitWriter, HomeId, ZipWireRead, ZipWireWrite};

pub const ZIP_NODE_ADVERTISEMENT: u8 = 0x01;
pub const ZIP_NODE_SOLICITATION: u8 = 0x02;
pub const ZIP_INV_NODE_SOLICITATION: u8 = 0x03;

/// ZIP_NODE_ADVERTISEMENT: maps a node id to its IPv6 address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipNodeAdvertisement {
    pub local: bool,
    /// 0 = information is valid, 1 = obsolete, 2 = unknown.
    pub validity: u8,
    pub node_id: u8,
    pub ipv6: Ipv6Addr,
    pub home_id: HomeId,
}

impl Default for ZipNodeAdvertisement {
    fn default() -> Self {
        Self {
            local: false,
            validity: 0,
            node_id: 0,
            ipv6: Ipv6Addr::UNSPECIFIED,
            home_id: HomeId::default(),
        }
    }
}

impl ZwaveFrame for ZipNodeAdvertisement {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ZIP_NODE_ADVERTISEMENT;
    const NAME: &'static str = "ZIP_NODE_ADVERTISEMENT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        reader.skip_bits(5)?;
        let local = reader.bit()?;
        let validity = reader.bits(2)?;
        let node_id = reader.byte()?;
        let ipv6 = Ipv6Addr::deserialize(reader)?;
        let home_id = HomeId::deserialize(reader)?;

        Ok(Self {
            local,
            validity,
            node_id,
            ipv6,
            home_id,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.reserved(5);
        writer.flag(self.local);
        writer.bits(self.validity, 2);
        writer.byte(self.node_id).map_err(Error::from)?;
        self.ipv6.serialize(writer).map_err(Error::from)?;
        self.home_id.serialize(writer).map_err(Error::from)
    }
}

/// ZIP_NODE_SOLICITATION: ask for the node id behind an IPv6 address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipNodeSolicitation {
    pub ipv6: Ipv6Addr,
}

impl ZwaveFrame for ZipNodeSolicitation {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ZIP_NODE_SOLICITATION;
    const NAME: &'static str = "ZIP_NODE_SOLICITATION";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        reader.skip_bits(8)?;

        Ok(Self {
            ipv6: Ipv6Addr::deserialize(reader)?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.reserved(8);
        self.ipv6.serialize(writer).map_err(Error::from)
    }
}

/// ZIP_INV_NODE_SOLICITATION: ask for the IPv6 address behind a node id.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ZipInvNodeSolicitation {
    /// Request the site-local address instead of the global one.
    pub local: bool,
    pub node_id: u8,
}

impl ZwaveFrame for ZipInvNodeSolicitation {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = ZIP_INV_NODE_SOLICITATION;
    const NAME: &'static str = "ZIP_INV_NODE_SOLICITATION";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        reader.skip_bits(4)?;
        let local = reader.bit()?;
        reader.skip_bits(3)?;
        let node_id = reader.byte()?;

        Ok(Self { local, node_id })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.reserved(4);
        writer.flag(self.local);
        writer.reserved(3);
        writer.byte(self.node_id).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use pretty_assertions::assert_eq;

    #[test]
    fn advertisement_round_trip() {
        let advert = ZipNodeAdvertisement {
            local: true,
            validity: 0,
            node_id: 6,
            ipv6: "fd00:bbbb::6".parse().unwrap(),
            home_id: HomeId(0xc0febabe),
        };

        let raw = Command::from(advert.clone()).compose().unwrap();

        assert_eq!(raw.len(), 2 + 2 + 16 + 4);
        assert_eq!(raw[2], 0b0000_0100);
        assert_eq!(
            Command::decode(&raw).unwrap(),
            Command::ZipNodeAdvertisement(advert)
        );
    }

    #[test]
    fn inv_solicitation_round_trip() {
        let raw = Command::from(ZipInvNodeSolicitation {
            local: false,
            node_id: 42,
        })
        .compose()
        .unwrap();

        assert_eq!(raw, vec![0x58, 0x03, 0x00, 0x2a]);
    }
}
