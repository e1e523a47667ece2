//! COMMAND_CLASS_SUPERVISION: an envelope wrapping another command and
//! expecting an acknowledging report.

use super::COMMAND_CLASS_SUPERVISION as CMD_CLASS;
use crate::command::{Command, ZwaveFrame};
use crate::error::Error;
use zipcrab_wire::{BitReader, BitWriter, WireError};

pub const SUPERVISION_GET: u8 = 0x01;
pub const SUPERVISION_REPORT: u8 = 0x02;

/// SUPERVISION_REPORT status: the wrapped command was handled.
pub const SUPERVISION_OK: u8 = 0xff;

/// SUPERVISION_REPORT status: no handler accepted the wrapped command.
pub const SUPERVISION_NO_SUPPORT: u8 = 0x00;

/// SUPERVISION_GET: a session-tagged, length-prefixed embedded command.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisionGet {
    pub status_updates: bool,
    pub session_id: u8,
    pub command: Box<Command>,
}

impl ZwaveFrame for SupervisionGet {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = SUPERVISION_GET;
    const NAME: &'static str = "SUPERVISION_GET";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let status_updates = reader.bit()?;
        reader.skip_bits(1)?;
        let session_id = reader.bits(6)?;
        let length = usize::from(reader.byte()?);
        let inner = reader.bytes(length)?;

        Ok(Self {
            status_updates,
            session_id,
            command: Box::new(Command::decode(inner)?),
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.flag(self.status_updates);
        writer.reserved(1);
        writer.bits(self.session_id, 6);

        let inner = self.command.compose()?;
        let length =
            u8::try_from(inner.len()).map_err(|_| Error::Encode(WireError::ValueOutOfRange))?;

        writer.byte(length).map_err(Error::from)?;
        writer.bytes(&inner).map_err(Error::from)
    }
}

/// SUPERVISION_REPORT.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SupervisionReport {
    pub more_status_updates: bool,
    /// Version 2.
    pub wake_up_request: bool,
    pub session_id: u8,
    pub status: u8,
    pub duration: u8,
}

impl SupervisionReport {
    /// The immediate answer to a SUPERVISION_GET.
    pub fn done(session_id: u8, handled: bool) -> Self {
        Self {
            more_status_updates: false,
            wake_up_request: false,
            session_id,
            status: if handled {
                SUPERVISION_OK
            } else {
                SUPERVISION_NO_SUPPORT
            },
            duration: 0,
        }
    }
}

impl ZwaveFrame for SupervisionReport {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = SUPERVISION_REPORT;
    const NAME: &'static str = "SUPERVISION_REPORT";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        let more_status_updates = reader.bit()?;
        let wake_up_request = reader.bit()?;
        let session_id = reader.bits(6)?;
        let status = reader.byte()?;
        let duration = reader.byte()?;

        Ok(Self {
            more_status_updates,
            wake_up_request,
            session_id,
            status,
            duration,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.flag(self.more_status_updates);
        writer.flag(self.wake_up_request);
        writer.bits(self.session_id, 6);
        writer.byte(self.status).map_err(Error::from)?;
        writer.byte(self.duration).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_class::basic::BasicReport;
    use pretty_assertions::assert_eq;

    #[test]
    fn get_wraps_embedded_command() {
        let get = SupervisionGet {
            status_updates: false,
            session_id: 3,
            command: Box::new(Command::from(BasicReport { value: 0xff })),
        };

        let raw = Command::from(get.clone()).compose().unwrap();

        // session byte, inner length, then BASIC_REPORT(0xff)
        assert_eq!(raw, vec![0x6c, 0x01, 0x03, 0x03, 0x20, 0x03, 0xff]);
        assert_eq!(Command::decode(&raw).unwrap(), Command::SupervisionGet(get));
    }

    #[test]
    fn report_status_values() {
        let handled = SupervisionReport::done(3, true);

        assert_eq!(
            Command::from(handled).compose().unwrap(),
            vec![0x6c, 0x02, 0x03, 0xff, 0x00]
        );

        let unhandled = SupervisionReport::done(5, false);

        assert_eq!(unhandled.status, SUPERVISION_NO_SUPPORT);
    }

    #[test]
    fn get_with_truncated_inner_fails() {
        // Declared length runs past the end of the frame.
        let raw = [0x6c, 0x01, 0x03, 0x09, 0x20, 0x03];

        assert_eq!(
            Command::decode(&raw),
            Err(Error::Decode(WireError::ShortRead))
        );
    }
}
