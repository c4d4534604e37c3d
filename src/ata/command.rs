// SPDX-License-Identifier: MPL-2.0
use super::AtaCommand;
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// ATA 48-bit register block as it is carried in bytes 3..14 of an ATA PASS-THROUGH (16) CDB.
/// See T13/1699-D rev. 4a, p. 109.
///
/// Each 16-bit register is stored high byte first: the first byte is the "previous" (HOB)
/// content and the second byte the "current" content.
///
/// * Feature: bytes 1:0
/// * Count: bytes 3:2
/// * LBA low, mid, high: bytes 9:4
/// * Device: byte 10
/// * Command: byte 11
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct Cmd48bit {
    feature: [u8; 2],
    count: [u8; 2],
    lba: [[u8; 2]; 3],
    device: u8,
    command: u8,
}
assert_eq_size!(Cmd48bit, [u8; 12]);

impl Cmd48bit {
    /// Returns an all-zero register block.
    pub fn new() -> Self {
        Self::new_zeroed()
    }

    /// Builds a register block from its 12-byte wire form.
    pub fn from_raw(raw: [u8; 12]) -> Self {
        let mut cmd = Self::new_zeroed();
        cmd.as_bytes_mut().copy_from_slice(&raw);
        cmd
    }

    /// Returns the 12-byte wire form.
    pub fn to_raw(&self) -> [u8; 12] {
        let mut raw = [0u8; 12];
        raw.copy_from_slice(self.as_bytes());
        raw
    }

    // IDENTIFY DEVICE - 0xEC, PIO Data-In
    //   FEATURE: N/A
    //   COUNT:   N/A
    //   LBA:     N/A
    //   DEVICE:  bit 4 transport dependent
    //   COMMAND: 0xEC
    pub fn set_command(&mut self, cmd: AtaCommand) -> &mut Self {
        self.command = cmd as u8;
        self
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn set_feature(&mut self, feature: u16) -> &mut Self {
        self.feature = feature.to_be_bytes();
        self
    }

    pub fn feature(&self) -> u16 {
        u16::from_be_bytes(self.feature)
    }

    pub fn set_count(&mut self, count: u16) -> &mut Self {
        self.count = count.to_be_bytes();
        self
    }

    pub fn count(&self) -> u16 {
        u16::from_be_bytes(self.count)
    }

    /// LBA low register: LBA 31:24 (previous) and 7:0 (current).
    pub fn set_lba_low(&mut self, word: u16) -> &mut Self {
        self.lba[0] = word.to_be_bytes();
        self
    }

    pub fn lba_low(&self) -> u16 {
        u16::from_be_bytes(self.lba[0])
    }

    /// LBA mid register: LBA 39:32 (previous) and 15:8 (current).
    pub fn set_lba_mid(&mut self, word: u16) -> &mut Self {
        self.lba[1] = word.to_be_bytes();
        self
    }

    pub fn lba_mid(&self) -> u16 {
        u16::from_be_bytes(self.lba[1])
    }

    /// LBA high register: LBA 47:40 (previous) and 23:16 (current).
    pub fn set_lba_high(&mut self, word: u16) -> &mut Self {
        self.lba[2] = word.to_be_bytes();
        self
    }

    pub fn lba_high(&self) -> u16 {
        u16::from_be_bytes(self.lba[2])
    }

    /// Spreads a 48-bit LBA over the three LBA registers. Bits above 47 are ignored.
    pub fn set_lba(&mut self, lba: u64) -> &mut Self {
        let b = lba.to_le_bytes();
        self.lba = [[b[3], b[0]], [b[4], b[1]], [b[5], b[2]]];
        self
    }

    /// Reassembles the 48-bit LBA from the three LBA registers.
    pub fn lba(&self) -> u64 {
        let [low, mid, high] = self.lba;
        u64::from_le_bytes([low[1], mid[1], high[1], low[0], mid[0], high[0], 0, 0])
    }

    pub fn set_device(&mut self, device: u8) -> &mut Self {
        self.device = device;
        self
    }

    pub fn device(&self) -> u8 {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_command_only_touches_last_byte() {
        let mut cmd = Cmd48bit::new();
        cmd.set_command(AtaCommand::IdentifyDevice);
        let mut expected = [0u8; 12];
        expected[11] = 0xEC;
        assert_eq!(cmd.to_raw(), expected);
        assert_eq!(cmd.command(), 0xEC);
    }

    #[test]
    fn fields_are_independent() {
        let mut cmd = Cmd48bit::new();
        cmd.set_feature(0x1122)
            .set_count(0x3344)
            .set_lba_low(0x5566)
            .set_lba_mid(0x7788)
            .set_lba_high(0x99AA)
            .set_device(0x40)
            .set_command(AtaCommand::ReadLogExt);
        assert_eq!(
            cmd.to_raw(),
            [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0x40, 0x2F]
        );

        cmd.set_count(0);
        assert_eq!(cmd.feature(), 0x1122);
        assert_eq!(cmd.count(), 0);
        assert_eq!(cmd.lba_low(), 0x5566);
        assert_eq!(cmd.lba_mid(), 0x7788);
        assert_eq!(cmd.lba_high(), 0x99AA);
        assert_eq!(cmd.device(), 0x40);
        assert_eq!(cmd.command(), 0x2F);
    }

    #[test]
    fn lba48_maps_onto_register_words() {
        let mut cmd = Cmd48bit::new();
        cmd.set_lba(0x0000_A1B2_C3D4_E5F6);
        // current bytes carry LBA 23:0, previous bytes carry LBA 47:24
        assert_eq!(cmd.lba_low(), 0xC3F6);
        assert_eq!(cmd.lba_mid(), 0xB2E5);
        assert_eq!(cmd.lba_high(), 0xA1D4);
        assert_eq!(cmd.lba(), 0x0000_A1B2_C3D4_E5F6);

        cmd.set_lba(0xFFFF_0000_0000_0001);
        assert_eq!(cmd.lba(), 1);
    }

    #[test]
    fn raw_round_trip() {
        let raw = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
        assert_eq!(Cmd48bit::from_raw(raw).to_raw(), raw);
    }
}
