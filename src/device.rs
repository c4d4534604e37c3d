// SPDX-License-Identifier: MPL-2.0
//! Storage device sessions.
use crate::ata::identification::IDENTIFY_LEN;
use crate::ata::IdentifyDevice;
use crate::error::Result;
use crate::scsi::cdb::AtaCdb;
use crate::scsi::sg::{SgConfig, SgDevice, SgTransport};
use log::*;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Kind of storage device a node belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DeviceType {
    Sata,
    Nvme,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Sata => "sata",
            DeviceType::Nvme => "nvme",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a device. Model, firmware and serial are empty until the device is identified.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StorageMeta {
    pub device_type: DeviceType,
    pub path: PathBuf,
    pub model: String,
    pub firmware: String,
    pub serial: String,
}

impl StorageMeta {
    pub fn new(device_type: DeviceType, path: impl Into<PathBuf>) -> Self {
        StorageMeta {
            device_type,
            path: path.into(),
            model: String::new(),
            firmware: String::new(),
            serial: String::new(),
        }
    }
}

/// Operations every storage device session provides, whatever command set it speaks.
pub trait StorageDevice {
    /// Data returned by the identify command of this device type.
    type Identify;

    fn device_type(&self) -> DeviceType;

    fn path(&self) -> &Path;

    /// Asks the device to identify itself.
    fn identify(&mut self) -> Result<Self::Identify>;

    /// Releases the handle. The session cannot be used afterwards.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// A SATA device reached through the SCSI generic driver.
#[derive(Debug)]
pub struct SataDevice<T = File> {
    meta: StorageMeta,
    sg: SgDevice<T>,
}

impl SataDevice<File> {
    /// Opens `path` read-write with the default transport settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, SgConfig::default())
    }

    pub fn open_with(path: impl AsRef<Path>, config: SgConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        info!("opened SATA device {}", path.display());
        Ok(Self::with_transport(path, file, config))
    }
}

impl<T: SgTransport> SataDevice<T> {
    /// Builds a session over an already opened transport.
    pub fn with_transport(path: impl Into<PathBuf>, transport: T, config: SgConfig) -> Self {
        SataDevice {
            meta: StorageMeta::new(DeviceType::Sata, path),
            sg: SgDevice::new(transport, config),
        }
    }

    pub fn meta(&self) -> &StorageMeta {
        &self.meta
    }

    pub fn sg(&self) -> &SgDevice<T> {
        &self.sg
    }
}

impl<T: SgTransport> StorageDevice for SataDevice<T> {
    type Identify = IdentifyDevice;

    fn device_type(&self) -> DeviceType {
        self.meta.device_type
    }

    fn path(&self) -> &Path {
        &self.meta.path
    }

    fn identify(&mut self) -> Result<IdentifyDevice> {
        let response = self.sg.execute(&AtaCdb::identify(), IDENTIFY_LEN)?;
        let id = IdentifyDevice::decode(&response)?;

        self.meta.model = id.model().trim().to_string();
        self.meta.firmware = id.firmware().trim().to_string();
        self.meta.serial = id.serial().trim().to_string();
        info!(
            "{}: model \"{}\" firmware \"{}\" serial \"{}\"",
            self.meta.path.display(),
            self.meta.model,
            self.meta.firmware,
            self.meta.serial
        );
        Ok(id)
    }

    fn close(self) -> Result<()> {
        debug!("closing {}", self.meta.path.display());
        drop(self.sg.into_transport());
        Ok(())
    }
}
