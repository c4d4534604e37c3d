// SPDX-License-Identifier: MPL-2.0
//! IDENTIFY DEVICE data (ACS-3, 7.12.7).
//!
//! The 512-byte response is 256 words. Numeric words are read high byte first; double and quad
//! words are built from consecutive words, first word least significant. The ASCII fields are
//! stored with the two bytes of every word swapped and are padded with spaces.
use crate::error::{Error, Result};
use bit_field::BitField;
use byteorder::{BigEndian, ByteOrder};
use log::*;
use static_assertions::const_assert_eq;

/// Size of the IDENTIFY DEVICE response.
pub const IDENTIFY_LEN: usize = 512;
const WORDS: usize = IDENTIFY_LEN / 2;
const_assert_eq!(WORDS, 256);

const SERIAL: core::ops::Range<usize> = 20..40;
const FIRMWARE: core::ops::Range<usize> = 46..54;
const MODEL: core::ops::Range<usize> = 54..94;
const MEDIA_SERIAL: core::ops::Range<usize> = 352..412;

const INTEGRITY_SIGNATURE: u8 = 0xA5;

/// Swaps every pair of bytes (2k, 2k+1). A trailing odd byte is kept as is.
pub fn word_swap(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.chunks_exact_mut(2).for_each(|pair| pair.swap(0, 1));
    out
}

/// Word-swaps an ATA string field and returns it as text, padding included.
pub fn swapped_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(&word_swap(bytes)).into_owned()
}

/// Decoded IDENTIFY DEVICE data. Fields carry the raw word values; reserved, retired and
/// obsolete words are skipped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IdentifyDevice {
    raw: [u8; IDENTIFY_LEN],

    /// Word 0: general configuration
    pub general_config: u16,
    /// Word 2: specific configuration
    pub specific_config: u16,
    /// Words 7..8: reserved for CFA
    pub cfa_reserved: u32,
    /// Word 48: Trusted Computing feature set options
    pub trusted_computing: u16,
    /// Words 49..50: capabilities
    pub capabilities: u32,
    /// Word 53: field validity and free-fall control
    pub word53: u16,
    /// Word 59: multiple sector setting and sanitize support
    pub word59: u16,
    /// Words 60..61: user addressable sectors for 28-bit commands
    pub lba28_sectors: u32,
    /// Word 63: multiword DMA modes
    pub word63: u16,
    /// Word 64: PIO modes
    pub word64: u16,
    /// Word 65: minimum multiword DMA cycle time (ns)
    pub min_mw_dma_cycle: u16,
    /// Word 66: recommended multiword DMA cycle time (ns)
    pub rec_mw_dma_cycle: u16,
    /// Word 67: minimum PIO cycle time without flow control (ns)
    pub min_pio_cycle: u16,
    /// Word 68: minimum PIO cycle time with IORDY (ns)
    pub min_pio_iordy_cycle: u16,
    /// Word 69: additional supported
    pub additional_supported: u16,
    /// Words 71..74: reserved for IDENTIFY PACKET DEVICE
    pub identify_packet_device: [u16; 4],
    /// Word 75: queue depth
    pub queue_depth: u16,
    /// Word 76: Serial ATA capabilities
    pub sata_capabilities: u16,
    /// Word 77: Serial ATA additional capabilities
    pub sata_additional_capabilities: u16,
    /// Word 78: Serial ATA features supported
    pub sata_features_supported: u16,
    /// Word 79: Serial ATA features enabled
    pub sata_features_enabled: u16,
    /// Word 80: major version
    pub major_version: u16,
    /// Word 81: minor version
    pub minor_version: u16,
    /// Words 82..87: commands and feature sets supported and enabled
    pub command_sets: [u16; 6],
    /// Word 88: Ultra DMA modes
    pub ultra_dma_modes: u16,
    /// Word 89: normal security erase time
    pub word89: u16,
    /// Word 90: enhanced security erase time
    pub word90: u16,
    /// Word 91: current APM level
    pub apm_level: u16,
    /// Word 92: master password identifier
    pub master_password_id: u16,
    /// Word 93: hardware reset result
    pub hw_reset_result: u16,
    /// Word 95: stream minimum request size
    pub stream_min_request_size: u16,
    /// Word 96: streaming transfer time, DMA
    pub stream_dma_time: u16,
    /// Word 97: streaming access latency
    pub stream_access_latency: u16,
    /// Words 98..99: streaming performance granularity
    pub stream_performance_granularity: u32,
    /// Words 100..103: user addressable sectors for 48-bit commands
    pub lba48_sectors: u64,
    /// Word 104: streaming transfer time, PIO
    pub stream_pio_time: u16,
    /// Word 105: maximum 512-byte blocks per DATA SET MANAGEMENT command
    pub max_dsm_blocks: u16,
    /// Word 106: physical sector size / logical sector size
    pub sector_size_info: u16,
    /// Word 107: inter-seek delay for acoustic testing
    pub inter_seek_delay: u16,
    /// Words 108..111: world wide name
    pub world_wide_name: u64,
    /// Words 117..118: logical sector size in words
    pub logical_sector_words: u32,
    /// Words 119..120: command and feature sets supported and enabled, continued
    pub command_sets_ext: [u16; 2],
    /// Word 128: security status
    pub security_status: u16,
    /// Words 129..159: vendor specific
    pub vendor_specific: [u16; 31],
    /// Words 160..167: reserved for CFA
    pub cfa_reserved2: [u16; 8],
    /// Word 168: device nominal form factor
    pub form_factor: u16,
    /// Word 169: DATA SET MANAGEMENT support
    pub dsm_support: u16,
    /// Words 170..173: additional product identifier
    pub additional_product_id: [u16; 4],
    /// Word 206: SCT Command Transport
    pub sct_command_transport: u16,
    /// Word 209: alignment of logical sectors within a physical sector
    pub sector_alignment: u16,
    /// Words 210..211: Write-Read-Verify sector mode 3 count
    pub wrv_mode3_count: u32,
    /// Words 212..213: Write-Read-Verify sector mode 2 count
    pub wrv_mode2_count: u32,
    /// Word 217: nominal media rotation rate
    pub nominal_rotation_rate: u16,
    /// Word 220: Write-Read-Verify feature set current mode
    pub wrv_mode: u16,
    /// Word 222: transport major version
    pub transport_major: u16,
    /// Word 223: transport minor version
    pub transport_minor: u16,
    /// Words 230..233: extended number of user addressable sectors
    pub extended_sectors: u64,
    /// Word 234: minimum 512-byte blocks per DOWNLOAD MICROCODE operation
    pub min_microcode_blocks: u16,
    /// Word 235: maximum 512-byte blocks per DOWNLOAD MICROCODE operation
    pub max_microcode_blocks: u16,
    /// Word 255: integrity word
    pub integrity: u16,
}

fn dword(words: &[u16]) -> u32 {
    u32::from(words[0]) | u32::from(words[1]) << 16
}

fn qword(words: &[u16]) -> u64 {
    words
        .iter()
        .take(4)
        .enumerate()
        .fold(0, |acc, (i, w)| acc | u64::from(*w) << (16 * i))
}

fn array<const N: usize>(words: &[u16]) -> [u16; N] {
    let mut out = [0u16; N];
    out.copy_from_slice(&words[..N]);
    out
}

impl IdentifyDevice {
    /// Decodes a response buffer, which must be exactly 512 bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != IDENTIFY_LEN {
            return Err(Error::InvalidLength {
                expected: IDENTIFY_LEN,
                actual: bytes.len(),
            });
        }
        let mut raw = [0u8; IDENTIFY_LEN];
        raw.copy_from_slice(bytes);
        let id = Self::from_bytes(&raw);
        if id.integrity_valid() == Some(false) {
            warn!(
                "IDENTIFY DEVICE integrity word {:#06x} does not match the data",
                id.integrity
            );
        }
        Ok(id)
    }

    pub fn from_bytes(raw: &[u8; IDENTIFY_LEN]) -> Self {
        let mut w = [0u16; WORDS];
        BigEndian::read_u16_into(raw, &mut w);

        IdentifyDevice {
            raw: *raw,
            general_config: w[0],
            specific_config: w[2],
            cfa_reserved: dword(&w[7..9]),
            trusted_computing: w[48],
            capabilities: dword(&w[49..51]),
            word53: w[53],
            word59: w[59],
            lba28_sectors: dword(&w[60..62]),
            word63: w[63],
            word64: w[64],
            min_mw_dma_cycle: w[65],
            rec_mw_dma_cycle: w[66],
            min_pio_cycle: w[67],
            min_pio_iordy_cycle: w[68],
            additional_supported: w[69],
            identify_packet_device: array(&w[71..75]),
            queue_depth: w[75],
            sata_capabilities: w[76],
            sata_additional_capabilities: w[77],
            sata_features_supported: w[78],
            sata_features_enabled: w[79],
            major_version: w[80],
            minor_version: w[81],
            command_sets: array(&w[82..88]),
            ultra_dma_modes: w[88],
            word89: w[89],
            word90: w[90],
            apm_level: w[91],
            master_password_id: w[92],
            hw_reset_result: w[93],
            stream_min_request_size: w[95],
            stream_dma_time: w[96],
            stream_access_latency: w[97],
            stream_performance_granularity: dword(&w[98..100]),
            lba48_sectors: qword(&w[100..104]),
            stream_pio_time: w[104],
            max_dsm_blocks: w[105],
            sector_size_info: w[106],
            inter_seek_delay: w[107],
            world_wide_name: qword(&w[108..112]),
            logical_sector_words: dword(&w[117..119]),
            command_sets_ext: array(&w[119..121]),
            security_status: w[128],
            vendor_specific: array(&w[129..160]),
            cfa_reserved2: array(&w[160..168]),
            form_factor: w[168],
            dsm_support: w[169],
            additional_product_id: array(&w[170..174]),
            sct_command_transport: w[206],
            sector_alignment: w[209],
            wrv_mode3_count: dword(&w[210..212]),
            wrv_mode2_count: dword(&w[212..214]),
            nominal_rotation_rate: w[217],
            wrv_mode: w[220],
            transport_major: w[222],
            transport_minor: w[223],
            extended_sectors: qword(&w[230..234]),
            min_microcode_blocks: w[234],
            max_microcode_blocks: w[235],
            integrity: w[255],
        }
    }

    /// The response exactly as the device sent it.
    pub fn as_bytes(&self) -> &[u8; IDENTIFY_LEN] {
        &self.raw
    }

    pub fn serial(&self) -> String {
        swapped_string(&self.raw[SERIAL])
    }

    pub fn firmware(&self) -> String {
        swapped_string(&self.raw[FIRMWARE])
    }

    pub fn model(&self) -> String {
        swapped_string(&self.raw[MODEL])
    }

    pub fn media_serial(&self) -> String {
        swapped_string(&self.raw[MEDIA_SERIAL])
    }

    /// Word 0 bit 15 is cleared by ATA devices.
    pub fn is_ata(&self) -> bool {
        !self.general_config.get_bit(15)
    }

    /// Word 83 bit 10: 48-bit Address feature set supported.
    pub fn supports_lba48(&self) -> bool {
        self.command_sets[1].get_bit(10)
    }

    pub fn user_sectors(&self) -> u64 {
        if self.supports_lba48() {
            self.lba48_sectors
        } else {
            u64::from(self.lba28_sectors)
        }
    }

    // word 106 is only meaningful when bit 14 is set and bit 15 is clear
    fn sector_size_info_valid(&self) -> bool {
        self.sector_size_info.get_bits(14..16) == 0b01
    }

    /// Logical sector size in bytes.
    pub fn logical_sector_size(&self) -> u32 {
        if self.sector_size_info_valid()
            && self.sector_size_info.get_bit(12)
            && self.logical_sector_words != 0
        {
            self.logical_sector_words.saturating_mul(2)
        } else {
            512
        }
    }

    /// Physical sector size in bytes.
    pub fn physical_sector_size(&self) -> u32 {
        let logical = self.logical_sector_size();
        if self.sector_size_info_valid() && self.sector_size_info.get_bit(13) {
            logical << self.sector_size_info.get_bits(0..4)
        } else {
            logical
        }
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.user_sectors()
            .saturating_mul(u64::from(self.logical_sector_size()))
    }

    /// `None` if the rate is not reported, `Some(0)` for non-rotating media, rpm otherwise.
    pub fn rotation_rate(&self) -> Option<u16> {
        match self.nominal_rotation_rate {
            0x0001 => Some(0),
            rpm @ 0x0401..=0xFFFE => Some(rpm),
            _ => None,
        }
    }

    /// Checks the integrity word. `None` when the device does not provide a checksum.
    pub fn integrity_valid(&self) -> Option<bool> {
        if self.raw[IDENTIFY_LEN - 2] != INTEGRITY_SIGNATURE {
            return None;
        }
        let sum = self.raw.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        Some(sum == 0)
    }
}
