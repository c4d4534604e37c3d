// SPDX-License-Identifier: MPL-2.0
//! Linux SCSI generic (sg) version 3 interface: the `sg_io_hdr` envelope and the
//! synchronous `SG_IO` call.
//! Reference: https://www.tldp.org/HOWTO/SCSI-Generic-HOWTO/x364.html
use super::cdb::AtaCdb;
use crate::error::{Error, Result};
use bitflags::bitflags;
use core::fmt;
use heapless::Vec as SenseVec;
use log::*;
use std::fs::File;
use std::io;
use std::ptr;
use std::time::Duration;

/// Synchronous SCSI command ioctl (version 3 interface only).
pub const SG_IO: u32 = 0x2285;
/// Interface id of the version 3 header.
pub const SG_INTERFACE_ID_ORIG: i32 = b'S' as i32;
/// Size of the sense buffer handed to the driver.
pub const SG_SENSE_LEN: usize = 32;
/// Timeout used when none is configured.
pub const SG_DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Data transfer direction of an sg request.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Direction {
    None = -1,
    ToDev = -2,
    FromDev = -3,
    ToFromDev = -4,
}

bitflags! {
    /// Bits of the `info` word filled in by the driver.
    pub struct SgInfo: u32 {
        /// Set when any of the status fields reports a problem.
        const CHECK = 0x1;
        const INDIRECT_IO = 0x0;
        const DIRECT_IO = 0x2;
        const MIXED_IO = 0x4;
    }
}

impl SgInfo {
    pub const OK_MASK: u32 = 0x1;
}

/// `struct sg_io_hdr` from `<scsi/sg.h>`.
#[repr(C)]
#[derive(Debug)]
pub struct SgIoHeader {
    pub(crate) interface_id: i32,
    pub(crate) dxfer_direction: i32,
    pub(crate) cmd_len: u8,
    pub(crate) mx_sb_len: u8,
    pub(crate) iovec_count: u16,
    pub(crate) dxfer_len: u32,
    pub(crate) dxferp: *mut u8,
    pub(crate) cmdp: *const u8,
    pub(crate) sbp: *mut u8,
    pub(crate) timeout: u32,
    pub(crate) flags: u32,
    pub(crate) pack_id: i32,
    pub(crate) usr_ptr: *mut libc::c_void,
    pub(crate) status: u8,
    pub(crate) masked_status: u8,
    pub(crate) msg_status: u8,
    pub(crate) sb_len_wr: u8,
    pub(crate) host_status: u16,
    pub(crate) driver_status: u16,
    pub(crate) resid: i32,
    pub(crate) duration: u32,
    pub(crate) info: u32,
}

impl SgIoHeader {
    /// Builds a header pointing at `cdb`, `data` and `sense`. The pointers are only valid while
    /// the three borrows are, so the header must not outlive the call it is built for.
    fn new(cdb: &AtaCdb, direction: Direction, data: &mut [u8], sense: &mut [u8], timeout: u32) -> Self {
        let dxferp = if data.is_empty() {
            ptr::null_mut()
        } else {
            data.as_mut_ptr()
        };
        SgIoHeader {
            interface_id: SG_INTERFACE_ID_ORIG,
            dxfer_direction: direction as i32,
            cmd_len: cdb.as_bytes().len() as u8,
            mx_sb_len: sense.len() as u8,
            iovec_count: 0,
            dxfer_len: data.len() as u32,
            dxferp,
            cmdp: cdb.as_bytes().as_ptr(),
            sbp: sense.as_mut_ptr(),
            timeout,
            flags: 0,
            pack_id: 0,
            usr_ptr: ptr::null_mut(),
            status: 0,
            masked_status: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        }
    }

    pub fn is_info_ok(&self) -> bool {
        self.info & SgInfo::OK_MASK == 0
    }

    pub fn info(&self) -> SgInfo {
        SgInfo::from_bits_truncate(self.info)
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn host_status(&self) -> u16 {
        self.host_status
    }

    pub fn driver_status(&self) -> u16 {
        self.driver_status
    }

    /// Number of bytes the driver wrote into the sense buffer.
    pub fn sense_len(&self) -> usize {
        usize::from(self.sb_len_wr).min(usize::from(self.mx_sb_len))
    }

    /// Transfer length minus the number of bytes actually transferred.
    pub fn resid(&self) -> i32 {
        self.resid
    }

    /// Time the command took, in milliseconds.
    pub fn duration(&self) -> u32 {
        self.duration
    }
}

/// Something that can perform the blocking `SG_IO` call for a prepared header.
pub trait SgTransport {
    /// Issues `SG_IO` with `header`. An `Err` means the call itself could not be made; the
    /// command outcome is reported through the header's status fields.
    fn sg_io(&self, header: &mut SgIoHeader) -> io::Result<()>;
}

#[cfg(target_os = "linux")]
impl SgTransport for File {
    fn sg_io(&self, header: &mut SgIoHeader) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the header and every buffer it points to are borrowed for the whole call.
        let ret = unsafe { libc::ioctl(self.as_raw_fd(), SG_IO as _, header as *mut SgIoHeader) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl SgTransport for File {
    fn sg_io(&self, _header: &mut SgIoHeader) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "SG_IO is only available on Linux",
        ))
    }
}

/// Sense keys (SPC-4, table 28).
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SenseKey {
    NoSense,
    RecoveredError,
    NotReady,
    MediumError,
    HardwareError,
    IllegalRequest,
    UnitAttention,
    DataProtect,
    BlankCheck,
    VendorSpecific,
    CopyAborted,
    AbortedCommand,
    Reserved,
    VolumeOverflow,
    Miscompare,
    Completed,
}

impl From<u8> for SenseKey {
    fn from(key: u8) -> Self {
        match key & 0x0F {
            0x0 => SenseKey::NoSense,
            0x1 => SenseKey::RecoveredError,
            0x2 => SenseKey::NotReady,
            0x3 => SenseKey::MediumError,
            0x4 => SenseKey::HardwareError,
            0x5 => SenseKey::IllegalRequest,
            0x6 => SenseKey::UnitAttention,
            0x7 => SenseKey::DataProtect,
            0x8 => SenseKey::BlankCheck,
            0x9 => SenseKey::VendorSpecific,
            0xA => SenseKey::CopyAborted,
            0xB => SenseKey::AbortedCommand,
            0xC => SenseKey::Reserved,
            0xD => SenseKey::VolumeOverflow,
            0xE => SenseKey::Miscompare,
            _ => SenseKey::Completed,
        }
    }
}

/// A command that reached the device but completed with a failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SgIoError {
    /// SCSI status byte
    pub status: u8,
    /// SCSI status shifted right by one (obsolete driver convention)
    pub masked_status: u8,
    /// Host adapter status
    pub host_status: u16,
    /// Driver status
    pub driver_status: u16,
    sense: SenseVec<u8, SG_SENSE_LEN>,
}

impl SgIoError {
    fn new(header: &SgIoHeader, sense: &[u8]) -> Self {
        let mut bytes = SenseVec::new();
        // cannot fail: sense is never longer than SG_SENSE_LEN
        let _ = bytes.extend_from_slice(&sense[..header.sense_len().min(SG_SENSE_LEN)]);
        SgIoError {
            status: header.status,
            masked_status: header.masked_status,
            host_status: header.host_status,
            driver_status: header.driver_status,
            sense: bytes,
        }
    }

    /// Sense bytes written by the driver.
    pub fn sense(&self) -> &[u8] {
        &self.sense
    }

    /// Sense key from fixed (0x70/0x71) or descriptor (0x72/0x73) format sense data.
    pub fn sense_key(&self) -> Option<SenseKey> {
        let response_code = self.sense.first()? & 0x7F;
        match response_code {
            0x70 | 0x71 => self.sense.get(2).map(|b| SenseKey::from(*b)),
            0x72 | 0x73 => self.sense.get(1).map(|b| SenseKey::from(*b)),
            _ => None,
        }
    }

    /// Additional sense code and qualifier.
    pub fn asc_ascq(&self) -> Option<(u8, u8)> {
        let response_code = self.sense.first()? & 0x7F;
        let at = match response_code {
            0x70 | 0x71 => 12,
            0x72 | 0x73 => 2,
            _ => return None,
        };
        Some((*self.sense.get(at)?, *self.sense.get(at + 1)?))
    }
}

impl fmt::Display for SgIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error status (scsi: {:#04x}, host: {:#04x}, driver: {:#04x})",
            self.status, self.host_status, self.driver_status
        )
    }
}

impl std::error::Error for SgIoError {}

/// Transport settings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SgConfig {
    /// Advisory command timeout handed to the driver.
    pub timeout: Duration,
}

impl Default for SgConfig {
    fn default() -> Self {
        SgConfig {
            timeout: SG_DEFAULT_TIMEOUT,
        }
    }
}

impl SgConfig {
    fn timeout_ms(&self) -> u32 {
        let ms = self.timeout.as_millis();
        if ms > u128::from(u32::MAX) {
            u32::MAX
        } else {
            ms as u32
        }
    }
}

/// A SCSI generic handle able to carry ATA PASS-THROUGH (16) commands.
#[derive(Debug)]
pub struct SgDevice<T = File> {
    transport: T,
    config: SgConfig,
}

impl<T: SgTransport> SgDevice<T> {
    pub fn new(transport: T, config: SgConfig) -> Self {
        SgDevice { transport, config }
    }

    pub fn config(&self) -> &SgConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Sends `cdb` and reads `len` bytes back from the device. The returned buffer is exactly
    /// what the device transferred, byte order untouched.
    pub fn execute(&self, cdb: &AtaCdb, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Err(Error::InvalidLength {
                expected: 1,
                actual: 0,
            });
        }
        let mut response = vec![0u8; len];
        self.transfer(cdb, Direction::FromDev, &mut response)?;
        Ok(response)
    }

    /// Performs one `SG_IO` call moving `data` in `direction`.
    pub fn transfer(&self, cdb: &AtaCdb, direction: Direction, data: &mut [u8]) -> Result<()> {
        let mut sense = [0u8; SG_SENSE_LEN];
        let mut header = SgIoHeader::new(cdb, direction, data, &mut sense, self.config.timeout_ms());
        trace!(
            "SG_IO cdb={:02x?} dir={:?} len={}",
            cdb.as_bytes(),
            direction,
            header.dxfer_len
        );

        if let Err(e) = self.transport.sg_io(&mut header) {
            debug!("SG_IO call failed: {}", e);
            return Err(Error::Io(e));
        }

        debug!(
            "SG_IO done: status={:#04x} host={:#04x} driver={:#04x} info={:#x} resid={} took {}ms",
            header.status,
            header.host_status,
            header.driver_status,
            header.info,
            header.resid,
            header.duration
        );

        if !header.is_info_ok() {
            let err = SgIoError::new(&header, &sense);
            warn!("ATA pass-through failed: {} sense={:02x?}", err, err.sense());
            return Err(Error::Protocol(err));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scsi::cdb::CDB_LEN;
    use std::cell::RefCell;

    /// Completion values a [`MockTransport`] writes into the header.
    #[derive(Clone, Debug, Default)]
    pub(crate) struct Completion {
        pub(crate) status: u8,
        pub(crate) host_status: u16,
        pub(crate) driver_status: u16,
        pub(crate) info: u32,
        pub(crate) sense: Vec<u8>,
        pub(crate) data: Vec<u8>,
    }

    /// What the transport saw when it was called.
    #[derive(Clone, Debug)]
    pub(crate) struct Seen {
        pub(crate) interface_id: i32,
        pub(crate) direction: i32,
        pub(crate) cdb: Vec<u8>,
        pub(crate) dxfer_len: u32,
        pub(crate) mx_sb_len: u8,
        pub(crate) timeout: u32,
    }

    pub(crate) enum MockTransport {
        Fail(io::ErrorKind),
        Complete(Completion, RefCell<Vec<Seen>>),
    }

    impl MockTransport {
        pub(crate) fn completing(completion: Completion) -> Self {
            MockTransport::Complete(completion, RefCell::new(Vec::new()))
        }

        pub(crate) fn calls(&self) -> Vec<Seen> {
            match self {
                MockTransport::Complete(_, seen) => seen.borrow().clone(),
                MockTransport::Fail(_) => Vec::new(),
            }
        }
    }

    impl SgTransport for MockTransport {
        fn sg_io(&self, header: &mut SgIoHeader) -> io::Result<()> {
            let (completion, seen) = match self {
                MockTransport::Fail(kind) => return Err(io::Error::from(*kind)),
                MockTransport::Complete(completion, seen) => (completion, seen),
            };
            let cdb = unsafe { std::slice::from_raw_parts(header.cmdp, usize::from(header.cmd_len)) };
            seen.borrow_mut().push(Seen {
                interface_id: header.interface_id,
                direction: header.dxfer_direction,
                cdb: cdb.to_vec(),
                dxfer_len: header.dxfer_len,
                mx_sb_len: header.mx_sb_len,
                timeout: header.timeout,
            });

            if !header.dxferp.is_null() {
                let data = unsafe {
                    std::slice::from_raw_parts_mut(header.dxferp, header.dxfer_len as usize)
                };
                let n = data.len().min(completion.data.len());
                data[..n].copy_from_slice(&completion.data[..n]);
            }
            let sense = unsafe { std::slice::from_raw_parts_mut(header.sbp, usize::from(header.mx_sb_len)) };
            let n = sense.len().min(completion.sense.len());
            sense[..n].copy_from_slice(&completion.sense[..n]);

            header.sb_len_wr = n as u8;
            header.status = completion.status;
            header.masked_status = completion.status >> 1;
            header.host_status = completion.host_status;
            header.driver_status = completion.driver_status;
            header.info = completion.info;
            Ok(())
        }
    }

    #[test]
    fn header_is_the_kernel_layout() {
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<SgIoHeader>(), 88);
        #[cfg(target_pointer_width = "32")]
        assert_eq!(std::mem::size_of::<SgIoHeader>(), 64);
    }

    #[test]
    fn execute_builds_header_and_returns_data() {
        let data: Vec<u8> = (0..=255u8).cycle().take(512).collect();
        let mock = MockTransport::completing(Completion {
            data: data.clone(),
            ..Completion::default()
        });
        let dev = SgDevice::new(mock, SgConfig::default());

        let response = dev.execute(&AtaCdb::identify(), 512).unwrap();
        assert_eq!(response, data);

        let calls = dev.transport().calls();
        assert_eq!(calls.len(), 1);
        let seen = &calls[0];
        assert_eq!(seen.interface_id, 'S' as i32);
        assert_eq!(seen.direction, Direction::FromDev as i32);
        assert_eq!(seen.cdb, AtaCdb::identify().as_bytes().to_vec());
        assert_eq!(seen.cdb.len(), CDB_LEN);
        assert_eq!(seen.dxfer_len, 512);
        assert_eq!(seen.mx_sb_len as usize, SG_SENSE_LEN);
        assert_eq!(seen.timeout, 1000);
    }

    #[test]
    fn timeout_is_configurable() {
        let mock = MockTransport::completing(Completion::default());
        let config = SgConfig {
            timeout: Duration::from_secs(5),
        };
        let dev = SgDevice::new(mock, config);
        dev.execute(&AtaCdb::identify(), 16).unwrap();
        assert_eq!(dev.transport().calls()[0].timeout, 5000);
    }

    #[test]
    fn info_check_bit_is_a_protocol_error() {
        let sense = vec![0x72, 0x05, 0x24, 0x00, 0, 0, 0, 0];
        let mock = MockTransport::completing(Completion {
            status: 0x02,
            host_status: 0x07,
            driver_status: 0x08,
            info: SgInfo::CHECK.bits(),
            sense: sense.clone(),
            data: vec![0xFF; 512],
        });
        let dev = SgDevice::new(mock, SgConfig::default());

        match dev.execute(&AtaCdb::identify(), 512) {
            Err(Error::Protocol(err)) => {
                assert_eq!(err.status, 0x02);
                assert_eq!(err.masked_status, 0x01);
                assert_eq!(err.host_status, 0x07);
                assert_eq!(err.driver_status, 0x08);
                assert_eq!(err.sense(), &sense[..]);
                assert_eq!(err.sense_key(), Some(SenseKey::IllegalRequest));
                assert_eq!(err.asc_ascq(), Some((0x24, 0x00)));
                assert_eq!(
                    err.to_string(),
                    "error status (scsi: 0x02, host: 0x07, driver: 0x08)"
                );
            }
            other => panic!("expected a protocol error, got {:?}", other),
        }
    }

    #[test]
    fn status_without_check_bit_is_success() {
        let mock = MockTransport::completing(Completion {
            status: 0x02,
            info: SgInfo::DIRECT_IO.bits(),
            data: vec![0xAB; 4],
            ..Completion::default()
        });
        let dev = SgDevice::new(mock, SgConfig::default());
        assert_eq!(dev.execute(&AtaCdb::identify(), 4).unwrap(), vec![0xAB; 4]);
    }

    #[test]
    fn transport_failure_is_passed_through() {
        let dev = SgDevice::new(
            MockTransport::Fail(io::ErrorKind::PermissionDenied),
            SgConfig::default(),
        );
        match dev.execute(&AtaCdb::identify(), 512) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("expected an io error, got {:?}", other),
        }
    }

    #[test]
    fn zero_length_response_is_rejected() {
        let dev = SgDevice::new(MockTransport::completing(Completion::default()), SgConfig::default());
        assert!(matches!(
            dev.execute(&AtaCdb::identify(), 0),
            Err(Error::InvalidLength { actual: 0, .. })
        ));
        assert!(dev.transport().calls().is_empty());
    }

    #[test]
    fn fixed_format_sense_key() {
        let mut sense = vec![0u8; 18];
        sense[0] = 0x70;
        sense[2] = 0x03;
        sense[12] = 0x11;
        sense[13] = 0x04;
        let mock = MockTransport::completing(Completion {
            info: SgInfo::CHECK.bits(),
            sense,
            ..Completion::default()
        });
        let dev = SgDevice::new(mock, SgConfig::default());
        match dev.execute(&AtaCdb::identify(), 512) {
            Err(Error::Protocol(err)) => {
                assert_eq!(err.sense_key(), Some(SenseKey::MediumError));
                assert_eq!(err.asc_ascq(), Some((0x11, 0x04)));
            }
            other => panic!("expected a protocol error, got {:?}", other),
        }
    }
}
