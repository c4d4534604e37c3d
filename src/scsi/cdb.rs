// SPDX-License-Identifier: MPL-2.0
use crate::ata::{AtaCommand, Cmd48bit};
use crate::error::{Error, Result};
use bit_field::BitField;
use core::convert::TryFrom;
use core::ops::Range;
use static_assertions::assert_eq_size;

/// SCSI operation code of ATA PASS-THROUGH (16).
pub const ATA_PASS_THROUGH_16: u8 = 0x85;
/// Length of an ATA PASS-THROUGH (16) CDB.
pub const CDB_LEN: usize = 16;

// Byte 1
const PROTOCOL: Range<usize> = 1..5;
const EXTEND: usize = 0;
const MULTIPLE: Range<usize> = 5..8;
// Byte 2
const OFFLINE: Range<usize> = 6..8;
const CK_COND: usize = 5;
const T_DIR: usize = 3;
const BYT_BLOK: usize = 2;
const T_LENGTH: Range<usize> = 0..2;
// Bytes 3..=14
const ATA_CMD: Range<usize> = 3..15;
const CONTROL: usize = 15;

/// Reset pseudo-protocols. These share the protocol field with [`Protocol`] but are only
/// written by [`AtaCdb::hard_reset`] and [`AtaCdb::soft_reset`].
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ResetProtocol {
    HardReset = 0x00,
    Srst = 0x01,
}

/// ATA protocols for the PROTOCOL field (ATA Command Pass-Through rev. 8, p. 5).
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Protocol {
    NonData = 0x03,
    PioDataIn = 0x04,
    PioDataOut = 0x05,
    Dma = 0x06,
    DmaQueued = 0x07,
    DeviceDiagnostic = 0x08,
    DeviceReset = 0x09,
    UdmaDataIn = 0x0A,
    UdmaDataOut = 0x0B,
    Fpdma = 0x0C,
    ReturnResponse = 0x0F,
}

impl Protocol {
    pub const ALL: [Protocol; 11] = [
        Protocol::NonData,
        Protocol::PioDataIn,
        Protocol::PioDataOut,
        Protocol::Dma,
        Protocol::DmaQueued,
        Protocol::DeviceDiagnostic,
        Protocol::DeviceReset,
        Protocol::UdmaDataIn,
        Protocol::UdmaDataOut,
        Protocol::Fpdma,
        Protocol::ReturnResponse,
    ];
}

impl TryFrom<u8> for Protocol {
    type Error = u8;

    fn try_from(field: u8) -> core::result::Result<Self, Self::Error> {
        Protocol::ALL
            .iter()
            .copied()
            .find(|p| *p as u8 == field)
            .ok_or(field)
    }
}

/// ATA PASS-THROUGH (16) command descriptor block.
/// See ATA Command Pass-Through rev. 8, p. 9 (T10/04-262r8).
///
/// * `[0]`: OPERATION CODE (0x85)
/// * `[1]`: MULTIPLE_COUNT (7:5) | PROTOCOL (4:1) | EXTEND (0)
/// * `[2]`: OFF_LINE (7:6) | CK_COND (5) | T_DIR (3) | BYT_BLOK (2) | T_LENGTH (1:0)
/// * `[3..=14]`: ATA 48-bit command
/// * `[15]`: CONTROL
///
/// Every setter only touches the bits of its own field.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct AtaCdb([u8; CDB_LEN]);
assert_eq_size!(AtaCdb, [u8; CDB_LEN]);

impl Default for AtaCdb {
    fn default() -> Self {
        Self::new()
    }
}

impl AtaCdb {
    /// Returns a zeroed CDB carrying the pass-through opcode.
    pub fn new() -> Self {
        let mut cdb = [0u8; CDB_LEN];
        cdb[0] = ATA_PASS_THROUGH_16;
        AtaCdb(cdb)
    }

    pub fn as_bytes(&self) -> &[u8; CDB_LEN] {
        &self.0
    }

    pub fn set_protocol(&mut self, protocol: Protocol) -> &mut Self {
        self.0[1].set_bits(PROTOCOL, protocol as u8);
        self
    }

    /// Returns the protocol, or `None` if the field holds a reset pseudo-protocol or a
    /// reserved value.
    pub fn protocol(&self) -> Option<Protocol> {
        Protocol::try_from(self.protocol_field()).ok()
    }

    /// Raw 4-bit PROTOCOL field.
    pub fn protocol_field(&self) -> u8 {
        self.0[1].get_bits(PROTOCOL)
    }

    pub fn set_extend(&mut self) -> &mut Self {
        self.0[1].set_bit(EXTEND, true);
        self
    }

    pub fn unset_extend(&mut self) -> &mut Self {
        self.0[1].set_bit(EXTEND, false);
        self
    }

    pub fn is_extend(&self) -> bool {
        self.0[1].get_bit(EXTEND)
    }

    /// Stores `count` as its base-2 logarithm. `count` must be a power of two in 1..=128.
    pub fn set_multiple(&mut self, count: u8) -> Result<&mut Self> {
        if !count.is_power_of_two() {
            return Err(Error::InvalidMultipleCount(count));
        }
        self.0[1].set_bits(MULTIPLE, count.trailing_zeros() as u8);
        Ok(self)
    }

    pub fn reset_multiple(&mut self) -> &mut Self {
        self.0[1].set_bits(MULTIPLE, 0);
        self
    }

    pub fn multiple(&self) -> u8 {
        1 << self.0[1].get_bits(MULTIPLE)
    }

    /// Data flows from the device to the host.
    pub fn set_host_dir(&mut self) -> &mut Self {
        self.0[2].set_bit(T_DIR, true);
        self
    }

    /// Data flows from the host to the device.
    pub fn set_dev_dir(&mut self) -> &mut Self {
        self.0[2].set_bit(T_DIR, false);
        self
    }

    pub fn reset_dir(&mut self) -> &mut Self {
        self.set_dev_dir()
    }

    pub fn is_dev_dir(&self) -> bool {
        !self.0[2].get_bit(T_DIR)
    }

    pub fn is_host_dir(&self) -> bool {
        self.0[2].get_bit(T_DIR)
    }

    /// Transfer length in blocks, located by the T_LENGTH selector (masked to 2 bits).
    pub fn set_block_size(&mut self, t_length: u8) -> &mut Self {
        self.0[2].set_bit(BYT_BLOK, true);
        self.0[2].set_bits(T_LENGTH, t_length & 0b11);
        self
    }

    /// Transfer length in bytes, located by the T_LENGTH selector (masked to 2 bits).
    pub fn set_byte_size(&mut self, t_length: u8) -> &mut Self {
        self.0[2].set_bit(BYT_BLOK, false);
        self.0[2].set_bits(T_LENGTH, t_length & 0b11);
        self
    }

    pub fn clear_size(&mut self) -> &mut Self {
        self.0[2].set_bit(BYT_BLOK, false);
        self.0[2].set_bits(T_LENGTH, 0);
        self
    }

    pub fn is_block_cmd(&self) -> bool {
        self.0[2].get_bit(BYT_BLOK)
    }

    pub fn t_length(&self) -> u8 {
        self.0[2].get_bits(T_LENGTH)
    }

    /// Asks the SATL to return the ATA registers as sense data on completion.
    pub fn set_check_condition(&mut self, check: bool) -> &mut Self {
        self.0[2].set_bit(CK_COND, check);
        self
    }

    pub fn is_check_condition(&self) -> bool {
        self.0[2].get_bit(CK_COND)
    }

    /// OFF_LINE code; the device may be off-line for `2^(code + 1) - 2` seconds.
    pub fn offline(&self) -> u8 {
        self.0[2].get_bits(OFFLINE)
    }

    pub fn set_ata_cmd48bit(&mut self, cmd: &Cmd48bit) -> &mut Self {
        self.0[ATA_CMD].copy_from_slice(&cmd.to_raw());
        self
    }

    pub fn ata_cmd48bit(&self) -> Cmd48bit {
        let mut raw = [0u8; 12];
        raw.copy_from_slice(&self.0[ATA_CMD]);
        Cmd48bit::from_raw(raw)
    }

    pub fn set_control(&mut self, control: u8) -> &mut Self {
        self.0[CONTROL] = control;
        self
    }

    pub fn control(&self) -> u8 {
        self.0[CONTROL]
    }

    fn reset(protocol: ResetProtocol, seconds: u8) -> Result<Self> {
        // floor(log2(seconds + 2)) - 1; seconds + 2 >= 2 so the result is never negative
        let span = u16::from(seconds) + 2;
        let code = (15 - span.leading_zeros()) - 1;
        if code > 0b11 {
            return Err(Error::InvalidOfflineTime(seconds));
        }
        let mut cdb = Self::new();
        cdb.0[1].set_bits(PROTOCOL, protocol as u8);
        cdb.0[2].set_bits(OFFLINE, code as u8);
        Ok(cdb)
    }

    /// Hard reset CDB. `seconds` is the time the device may stay off-line (at most 29).
    pub fn hard_reset(seconds: u8) -> Result<Self> {
        Self::reset(ResetProtocol::HardReset, seconds)
    }

    /// Software reset (SRST) CDB. `seconds` is the time the device may stay off-line (at most 29).
    pub fn soft_reset(seconds: u8) -> Result<Self> {
        Self::reset(ResetProtocol::Srst, seconds)
    }

    /// IDENTIFY DEVICE: PIO data-in, one block whose length is given by the sector count.
    pub fn identify() -> Self {
        let mut cmd = Cmd48bit::new();
        cmd.set_command(AtaCommand::IdentifyDevice);

        let mut cdb = Self::new();
        cdb.set_protocol(Protocol::PioDataIn)
            .set_host_dir()
            .set_block_size(2)
            .set_ata_cmd48bit(&cmd);
        cdb
    }
}

impl AsRef<[u8]> for AtaCdb {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
