//! COMMAND_CLASS_APPLICATION_STATUS: busy/rejected indications nodes send
//! instead of a real answer.

use super::COMMAND_CLASS_APPLICATION_STATUS as CMD_CLASS;
use crate::command::ZwaveFrame;
use crate::error::Error;
use zipcrab_wire::{BitReader, BitWriter};

pub const APPLICATION_BUSY: u8 = 0x01;
pub const APPLICATION_REJECTED_REQUEST: u8 = 0x02;

/// APPLICATION_BUSY.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ApplicationBusy {
    /// 0 = try again later, 1 = try again in `waitTime`, 2 = request
    /// queued.
    pub status: u8,
    pub wait_time: u8,
}

impl ZwaveFrame for ApplicationBusy {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = APPLICATION_BUSY;
    const NAME: &'static str = "APPLICATION_BUSY";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            status: reader.byte()?,
            wait_time: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.status).map_err(Error::from)?;
        writer.byte(self.wait_time).map_err(Error::from)
    }
}

/// APPLICATION_REJECTED_REQUEST.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ApplicationRejectedRequest {
    pub status: u8,
}

impl ZwaveFrame for ApplicationRejectedRequest {
    const CMD_CLASS: u8 = CMD_CLASS;
    const CMD: u8 = APPLICATION_REJECTED_REQUEST;
    const NAME: &'static str = "APPLICATION_REJECTED_REQUEST";

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            status: reader.byte()?,
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<(), Error> {
        writer.byte(self.status).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    #[test]
    fn busy_round_trip() {
        // Try again in waitTime seconds.
        let raw = [0x22, 0x01, 0x01, 0x0a];
        let decoded = Command::decode(&raw).unwrap();

        assert_eq!(
            decoded,
            Command::ApplicationBusy(ApplicationBusy {
                status: 1,
                wait_time: 10,
            })
        );
        assert_eq!(decoded.compose().unwrap(), raw.to_vec());
    }

    #[test]
    fn rejected_request_round_trip() {
        let raw = [0x22, 0x02, 0x00];
        let decoded = Command::decode(&raw).unwrap();

        assert_eq!(
            decoded,
            Command::ApplicationRejectedRequest(ApplicationRejectedRequest { status: 0 })
        );
        assert_eq!(decoded.compose().unwrap(), raw.to_vec());
    }
}
