// SPDX-License-Identifier: MPL-2.0
//! The smartata library sends ATA commands to disks that are only reachable through the Linux
//! SCSI generic (sg) driver. Commands travel inside an ATA PASS-THROUGH (16) CDB
//! ([SAT-4](https://www.t10.org/drafts.htm#SCSI3_SAT)) and are issued with one blocking
//! `SG_IO` call per command.
//!
//! # Modules
//!
//! * ata: 48-bit ATA register block and IDENTIFY DEVICE data
//! * scsi: ATA PASS-THROUGH (16) CDB codec and the `SG_IO` transport
//! * device: device sessions
//! * scan: discovery of device nodes

/// The ata module contains the ATA command encoder and the IDENTIFY DEVICE decoder.
pub mod ata;
/// The device module contains storage device sessions.
pub mod device;
pub mod error;
/// The scan module finds device nodes by name.
pub mod scan;
/// The scsi module contains the pass-through CDB and the sg transport.
pub mod scsi;

pub use ata::{AtaCommand, Cmd48bit, IdentifyDevice};
pub use device::{DeviceType, SataDevice, StorageDevice, StorageMeta};
pub use error::{Error, Result};
pub use scan::{dev_files, scan_sata, ScanConfig};
pub use scsi::cdb::{AtaCdb, Protocol};
pub use scsi::sg::{SgConfig, SgDevice, SgIoError, SgTransport};
