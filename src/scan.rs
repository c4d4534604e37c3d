// SPDX-License-Identifier: MPL-2.0
//! Discovery of storage device nodes.
use crate::device::{DeviceType, SataDevice};
use crate::error::Result;
use crate::scsi::sg::SgConfig;
use log::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub const DEVICE_ROOT: &str = "/dev";

#[cfg(target_os = "macos")]
const SATA_PATTERN: &str = r"^disk[0-9]*$";
#[cfg(not(target_os = "macos"))]
const SATA_PATTERN: &str = r"^sd[a-z]$";
const NVME_PATTERN: &str = r"^nvme[0-9]*$";

/// Where to look for device nodes and which names belong to which device type.
#[derive(Clone, Debug)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub sata: Regex,
    pub nvme: Regex,
}

impl ScanConfig {
    pub fn new(root: impl Into<PathBuf>, sata_pattern: &str, nvme_pattern: &str) -> Result<Self> {
        Ok(ScanConfig {
            root: root.into(),
            sata: Regex::new(sata_pattern)?,
            nvme: Regex::new(nvme_pattern)?,
        })
    }

    /// `/dev` with the naming scheme of the host operating system.
    pub fn for_host() -> Result<Self> {
        Self::new(DEVICE_ROOT, SATA_PATTERN, NVME_PATTERN)
    }

    fn pattern(&self, device_type: DeviceType) -> &Regex {
        match device_type {
            DeviceType::Sata => &self.sata,
            DeviceType::Nvme => &self.nvme,
        }
    }
}

/// Lists the nodes under the configured root whose names match `device_type`, sorted.
/// Directories are never returned.
pub fn dev_files(config: &ScanConfig, device_type: DeviceType) -> Result<Vec<PathBuf>> {
    let pattern = config.pattern(device_type);
    let mut files = Vec::new();

    for entry in fs::read_dir(&config.root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        match name.to_str() {
            Some(name) if pattern.is_match(name) => files.push(config.root.join(name)),
            _ => {}
        }
    }

    files.sort();
    debug!(
        "found {} {} node(s) under {}",
        files.len(),
        device_type,
        config.root.display()
    );
    Ok(files)
}

/// Opens every SATA node and adds it to `storage`, keyed by path. Nodes that cannot be opened
/// are skipped.
pub fn scan_sata(
    config: &ScanConfig,
    sg_config: SgConfig,
    mut storage: BTreeMap<PathBuf, SataDevice>,
) -> Result<BTreeMap<PathBuf, SataDevice>> {
    for path in dev_files(config, DeviceType::Sata)? {
        match SataDevice::open_with(&path, sg_config) {
            Ok(dev) => {
                storage.insert(path, dev);
            }
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::StorageDevice;
    use crate::error::Error;
    use std::path::Path;

    struct TempRoot(PathBuf);

    impl TempRoot {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!("smartata-{}-{}", name, std::process::id()));
            let _ = fs::remove_dir_all(&path);
            fs::create_dir_all(&path).unwrap();
            TempRoot(path)
        }

        fn touch(&self, name: &str) {
            fs::write(self.0.join(name), b"").unwrap();
        }

        fn linux(&self) -> ScanConfig {
            ScanConfig::new(&self.0, r"^sd[a-z]$", r"^nvme[0-9]*$").unwrap()
        }
    }

    impl Drop for TempRoot {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn lists_matching_nodes_sorted() {
        let root = TempRoot::new("list");
        for name in ["sdb", "sda", "sda1", "sdaa", "sd1", "nvme0", "nvme0n1", "nvme", "loop0"].iter() {
            root.touch(name);
        }
        fs::create_dir(root.0.join("sdc")).unwrap();
        fs::create_dir(root.0.join("nvme1")).unwrap();
        let config = root.linux();

        assert_eq!(
            dev_files(&config, DeviceType::Sata).unwrap(),
            vec![root.0.join("sda"), root.0.join("sdb")]
        );
        assert_eq!(
            dev_files(&config, DeviceType::Nvme).unwrap(),
            vec![root.0.join("nvme"), root.0.join("nvme0")]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let config = ScanConfig::new("/nonexistent/smartata", r"^sd[a-z]$", r"^nvme[0-9]*$").unwrap();
        assert!(matches!(dev_files(&config, DeviceType::Sata), Err(Error::Io(_))));
    }

    #[test]
    fn bad_pattern_is_rejected() {
        assert!(matches!(
            ScanConfig::new("/dev", r"^sd[a-z$", NVME_PATTERN),
            Err(Error::Pattern(_))
        ));
    }

    #[test]
    fn host_defaults_compile() {
        let config = ScanConfig::for_host().unwrap();
        assert_eq!(config.root, Path::new("/dev"));
        assert!(config.nvme.is_match("nvme0"));
        assert!(!config.nvme.is_match("nvme0n1"));
        #[cfg(target_os = "linux")]
        {
            assert!(config.sata.is_match("sda"));
            assert!(!config.sata.is_match("sda1"));
        }
    }

    #[test]
    fn scan_keys_sessions_by_path() {
        let root = TempRoot::new("scan");
        root.touch("sda");
        root.touch("sdb");
        root.touch("nvme0");
        #[cfg(unix)]
        std::os::unix::fs::symlink(root.0.join("gone"), root.0.join("sdz")).unwrap();

        let storage = scan_sata(&root.linux(), SgConfig::default(), BTreeMap::new()).unwrap();
        let keys: Vec<_> = storage.keys().cloned().collect();
        assert_eq!(keys, vec![root.0.join("sda"), root.0.join("sdb")]);
        for (path, dev) in storage.iter() {
            assert_eq!(dev.path(), path.as_path());
            assert_eq!(dev.device_type(), DeviceType::Sata);
        }
    }
}
