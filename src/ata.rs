// SPDX-License-Identifier: MPL-2.0
//! ATA command encoding and the data structures returned by ATA commands.
//! Opcodes and layouts follow ACS-3 (T13/2161-D) and ATA8-ACS (T13/1699-D).

pub mod command;
pub mod identification;

pub use command::Cmd48bit;
pub use identification::IdentifyDevice;

/// ATA opcodes this crate issues or names.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum AtaCommand {
    Nop = 0x00,
    ReadLogExt = 0x2F,
    IdentifyPacketDevice = 0xA1,
    CheckPowerMode = 0xE5,
    IdentifyDevice = 0xEC,
}

impl From<AtaCommand> for u8 {
    fn from(cmd: AtaCommand) -> Self {
        cmd as u8
    }
}

impl core::convert::TryFrom<u8> for AtaCommand {
    type Error = u8;

    fn try_from(opcode: u8) -> Result<Self, Self::Error> {
        match opcode {
            0x00 => Ok(AtaCommand::Nop),
            0x2F => Ok(AtaCommand::ReadLogExt),
            0xA1 => Ok(AtaCommand::IdentifyPacketDevice),
            0xE5 => Ok(AtaCommand::CheckPowerMode),
            0xEC => Ok(AtaCommand::IdentifyDevice),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::TryFrom;

    #[test]
    fn opcodes_round_trip_through_u8() {
        for cmd in [
            AtaCommand::Nop,
            AtaCommand::ReadLogExt,
            AtaCommand::IdentifyPacketDevice,
            AtaCommand::CheckPowerMode,
            AtaCommand::IdentifyDevice,
        ]
        .iter()
        {
            assert_eq!(AtaCommand::try_from(u8::from(*cmd)), Ok(*cmd));
        }
        assert_eq!(AtaCommand::try_from(0xB0), Err(0xB0));
    }
}
