//! COMMAND_CLASS_ZIP: the Z/IP envelope carried between host and gateway.

use super::{zw_enum, COMMAND_CLASS_ZIP};
use crate::command::{Command, ZwaveFrame};
use crate::error::Error;
use zipcrab_wire::{BitReader, BitWriter, WireError};

pub const COMMAND_ZIP_PACKET: u8 = 0x02;
pub const COMMAND_ZIP_KEEP_ALIVE: u8 = 0x03;

zw_enum! {
    /// Header extension TLV option types.
    pub enum ZipOptionType {
        /// Seconds until a sleeping node is expected to pick the frame up.
        ExpectedDelay = 0x01,
        MaintenanceGet = 0x02,
        /// Nested TLV stream of installation/maintenance values.
        MaintenanceReport = 0x03,
        /// Security class the frame was received under, plus a CRC16 flag.
        EncapsulationFormatInfo = 0x04,
        MulticastAddressing = 0x05,
    }
}

/// One `(critical, type, length, value)` option of a Z/IP header
/// extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionOption {
    pub critical: bool,
    pub option_type: ZipOptionType,
    pub data: Vec<u8>,
}

/// The optional TLV block between the fixed Z/IP header and the embedded
/// command. An empty extension is simply not present on the wire.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HeaderExtension {
    pub options: Vec<ExtensionOption>,
}

impl HeaderExtension {
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Build an extension carrying only an expected-delay option.
    pub fn with_expected_delay(seconds: i32) -> Self {
        let raw = seconds.to_be_bytes();

        Self {
            options: vec![ExtensionOption {
                critical: false,
                option_type: ZipOptionType::ExpectedDelay,
                data: raw[1..].to_vec(),
            }],
        }
    }

    fn find(&self, option_type: ZipOptionType) -> Option<&ExtensionOption> {
        self.options.iter().find(|o| o.option_type == option_type)
    }

    /// Expected delay in seconds, sign-extended from the 24-bit wire form.
    pub fn expected_delay(&self) -> Option<i32> {
        let option = self.find(ZipOptionType::ExpectedDelay)?;
        let raw: [u8; 3] = option.data.as_slice().try_into().ok()?;
        let sign = if raw[0] & 0x80 != 0 { 0xff } else { 0x00 };

        Some(i32::from_be_bytes([sign, raw[0], raw[1], raw[2]]))
    }

    /// Security class and CRC16 flag of the encapsulation format option.
    pub fn encapsulation_format(&self) -> Option<(u8, bool)> {
        let option = self.find(ZipOptionType::EncapsulationFormatInfo)?;
        let security_class = *option.data.first()?;
        let crc16 = option.data.get(1).is_some_and(|b| b & 0x01 != 0);

        Some((security_class, crc16))
    }

    pub(crate) fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        // The length byte includes itself.
        let ext_len = reader.byte()?;
        let body = reader.bytes(usize::from(ext_len).saturating_sub(1))?;

        let mut options = Vec::new();
        let mut at = 0;

        while at < body.len() {
            let head = *body.get(at).ok_or(WireError::BadLength)?;
            let len = usize::from(*body.get(at + 1).ok_or(WireError::BadLength)?);
            let data = body.get(at + 2..at + 2 + len).ok_or(WireError::BadLength)?;

            options.push(ExtensionOption {
                critical: head & 0x80 != 0,
                option_type: ZipOptionType::from(head & 0x7f),
                data: data.to_vec(),
            });

            at += 2 + len;
        }

        Ok(Self { options })
    }

    pub(crate) fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        let body_len: usize = self.options.iter().map(|o| 2 + o.data.len()).sum();
        let ext_len = u8::try_from(body_len + 1).map_err(|_| WireError::ValueOutOfRange)?;

        writer.byte(ext_len)?;

        for option in &self.options {
            let head = (option.critical as u8) << 7 | u8::from(option.option_type);

            writer.byte(head)?;
            writer.byte(
                u8::try_from(option.data.len()).map_err(|_| WireError::ValueOutOfRange)?,
            )?;
            writer.bytes(&option.data)?;
        }

        Ok(())
    }
}

/// ZIP_PACKET: the sequenced, ack-carrying envelope for one Z-Wave
/// command.
///
/// The `headerExtIncluded`/`zwCmdIncluded` wire flags are derived from
/// content on compose: an empty extension and an absent command write as
/// zero flags.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ZipPacket {
    pub ack_request: bool,
    pub ack_response: bool,
    pub nack_response: bool,
    pub nack_waiting: bool,
    pub nack_queue_full: bool,
    pub nack_option_error: bool,
    pub more_information: bool,
    pub secure_origin: bool,
    pub seq_no: u8,
    pub source_ep: u8,
    pub dest_ep: u8,
    pub header_extension: HeaderExtension,
    pub command: Option<Box<Command>>,
}

impl ZipPacket {
    /// An outbound command envelope requesting an ack.
    pub fn request(seq_no: u8, source_ep: u8, dest_ep: u8, command: Command) -> Self {
        Self {
            ack_request: true,
            secure_origin: true,
            seq_no,
            source_ep,
            dest_ep,
            command: Some(Box::new(command)),
            ..Self::default()
        }
    }

    /// The paired response to an `ackRequest` frame: same sequence number,
    /// endpoints swapped.
    pub fn response(success: bool, request: &ZipPacket) -> Self {
        Self {
            ack_response: success,
            nack_response: !success,
            secure_origin: true,
            seq_no: request.seq_no,
            source_ep: request.dest_ep,
            dest_ep: request.source_ep,
            ..Self::default()
        }
    }
}

impl ZwaveFrame for ZipPacket {
    const CMD_CLASS: u8 = COMMAND_CLASS_ZIP;
    const CMD: u8 = COMMAND_ZIP_PACKET;
    const NAME: &'static str = "ZIP_PACKET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let ack_request = reader.bit()?;
        let ack_response = reader.bit()?;
        let nack_response = reader.bit()?;
        let nack_waiting = reader.bit()?;
        let nack_queue_full = reader.bit()?;
        let nack_option_error = reader.bit()?;
        reader.skip_bits(2)?;

        let header_ext_included = reader.bit()?;
        let zw_cmd_included = reader.bit()?;
        let more_information = reader.bit()?;
        let secure_origin = reader.bit()?;
        reader.skip_bits(4)?;

        let seq_no = reader.byte()?;

        reader.skip_bits(1)?;
        let source_ep = reader.bits(7)?;
        reader.skip_bits(1)?;
        let dest_ep = reader.bits(7)?;

        let header_extension = if header_ext_included {
            HeaderExtension::deserialize(reader)?
        } else {
            HeaderExtension::default()
        };

        let command = if zw_cmd_included {
            Some(Box::new(Command::decode(reader.remaining())?))
        } else {
            None
        };

        Ok(Self {
            ack_request,
            ack_response,
            nack_response,
            nack_waiting,
            nack_queue_full,
            nack_option_error,
            more_information,
            secure_origin,
            seq_no,
            source_ep,
            dest_ep,
            header_extension,
            command,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.flag(self.ack_request);
        writer.flag(self.ack_response);
        writer.flag(self.nack_response);
        writer.flag(self.nack_waiting);
        writer.flag(self.nack_queue_full);
        writer.flag(self.nack_option_error);
        writer.reserved(2);

        writer.flag(!self.header_extension.is_empty());
        writer.flag(self.command.is_some());
        writer.flag(self.more_information);
        writer.flag(self.secure_origin);
        writer.reserved(4);

        writer.byte(self.seq_no).map_err(Error::from)?;

        writer.reserved(1);
        writer.bits(self.source_ep, 7);
        writer.reserved(1);
        writer.bits(self.dest_ep, 7);

        if !self.header_extension.is_empty() {
            self.header_extension.serialize(writer)?;
        }

        if let Some(command) = &self.command {
            writer.bytes(&command.compose()?).map_err(Error::from)?;
        }

        Ok(())
    }
}

/// ZIP_KEEP_ALIVE: ping/pong to hold the gateway association open.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ZipKeepAlive {
    pub ack_request: bool,
    pub ack_response: bool,
}

impl ZipKeepAlive {
    pub fn ping() -> Self {
        Self {
            ack_request: true,
            ack_response: false,
        }
    }

    pub fn pong() -> Self {
        Self {
            ack_request: false,
            ack_response: true,
        }
    }
}

impl ZwaveFrame for ZipKeepAlive {
    const CMD_CLASS: u8 = COMMAND_CLASS_ZIP;
    const CMD: u8 = COMMAND_ZIP_KEEP_ALIVE;
    const NAME: &'static str = "ZIP_KEEP_ALIVE";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let ack_request = reader.bit()?;
        let ack_response = reader.bit()?;
        reader.skip_bits(6)?;

        Ok(Self {
            ack_request,
            ack_response,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.flag(self.ack_request);
        writer.flag(self.ack_response);
        writer.reserved(6);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_class::network_management_proxy::NodeListGet;
    use pretty_assertions::assert_eq;

    #[test]
    fn zip_packet_framing() {
        let raw = b"\x23\x02\x80\x50\x02\x00\x00\x52\x01\x02";
        let decoded = Command::decode(raw).unwrap();

        let Command::ZipPacket(ref packet) = decoded else {
            panic!("expected ZIP_PACKET");
        };

        assert!(packet.ack_request);
        assert!(packet.secure_origin);
        assert!(!packet.ack_response);
        assert!(!packet.nack_response);
        assert_eq!(packet.seq_no, 2);
        assert_eq!(packet.source_ep, 0);
        assert_eq!(packet.dest_ep, 0);
        assert_eq!(
            packet.command.as_deref(),
            Some(&Command::NodeListGet(NodeListGet { seq_no: 2 }))
        );

        assert_eq!(decoded.compose().unwrap(), raw.to_vec());
    }

    #[test]
    fn bare_packet_is_five_bytes() {
        let packet = ZipPacket {
            ack_response: true,
            secure_origin: true,
            seq_no: 9,
            ..ZipPacket::default()
        };

        let raw = Command::from(packet).compose().unwrap();

        // Two id bytes, then exactly the five fixed header bytes.
        assert_eq!(raw.len(), 2 + 5);
    }

    #[test]
    fn paired_response_swaps_endpoints() {
        let request = ZipPacket {
            ack_request: true,
            seq_no: 0x42,
            source_ep: 3,
            dest_ep: 0,
            ..ZipPacket::default()
        };

        let response = ZipPacket::response(true, &request);

        assert!(response.ack_response);
        assert!(!response.nack_response);
        assert_eq!(response.seq_no, 0x42);
        assert_eq!(response.source_ep, 0);
        assert_eq!(response.dest_ep, 3);
    }

    #[test]
    fn expected_delay_round_trip() {
        let ext = HeaderExtension::with_expected_delay(600);
        let packet = ZipPacket {
            nack_response: true,
            nack_waiting: true,
            seq_no: 1,
            header_extension: ext,
            ..ZipPacket::default()
        };

        let raw = Command::from(packet.clone()).compose().unwrap();
        let back = Command::decode(&raw).unwrap();

        let Command::ZipPacket(ref parsed) = back else {
            panic!("expected ZIP_PACKET");
        };

        assert_eq!(parsed.header_extension.expected_delay(), Some(600));
        assert_eq!(back.compose().unwrap(), raw);
    }

    #[test]
    fn extension_tlv_walk() {
        // extLen 10 (self + two TLVs), expected delay 1 s, then a
        // non-critical encapsulation format option.
        let raw = [
            0x0a, 0x01, 0x03, 0x00, 0x00, 0x01, 0x04, 0x02, 0x80, 0x01,
        ];
        let mut reader = BitReader::new(&raw);
        let ext = HeaderExtension::deserialize(&mut reader).unwrap();

        assert_eq!(ext.options.len(), 2);
        assert_eq!(ext.expected_delay(), Some(1));
        assert_eq!(ext.encapsulation_format(), Some((0x80, true)));
    }

    #[test]
    fn keep_alive_round_trip() {
        let raw = Command::from(ZipKeepAlive::ping()).compose().unwrap();

        assert_eq!(raw, vec![0x23, 0x03, 0x80]);

        let Command::ZipKeepAlive(pong) = Command::decode(&[0x23, 0x03, 0x40]).unwrap() else {
            panic!("expected ZIP_KEEP_ALIVE");
        };

        assert_eq!(pong, ZipKeepAlive::pong());
    }
}
