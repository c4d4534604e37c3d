// SPDX-License-Identifier: MPL-2.0
use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use log::{Level, LevelFilter, Log, Metadata, Record};
use smartata::{scan_sata, SataDevice, ScanConfig, SgConfig, StorageDevice};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
/// Identify SATA disks through the SCSI generic driver
struct CommandLine {
    /// Directory scanned for device nodes when no paths are given
    #[arg(long)]
    root: Option<PathBuf>,

    /// SG_IO command timeout in milliseconds
    #[arg(long = "timeout-ms", default_value_t = 1000)]
    timeout_ms: u64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Device nodes to identify
    paths: Vec<PathBuf>,
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(
            std::io::stderr(),
            "[{:<5}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => match std::env::var("SMARTATA_LOG") {
            Ok(value) => value
                .parse::<LevelFilter>()
                .with_context(|| format!("bad SMARTATA_LOG value {:?}", value))?,
            Err(_) => LevelFilter::Warn,
        },
        1 => Level::Debug.to_level_filter(),
        _ => Level::Trace.to_level_filter(),
    };
    log::set_logger(&LOGGER).context("logger already installed")?;
    log::set_max_level(level);
    Ok(())
}

fn report(dev: &mut SataDevice) -> Result<()> {
    let id = dev
        .identify()
        .with_context(|| format!("IDENTIFY DEVICE failed on {}", dev.path().display()))?;
    let meta = dev.meta();
    println!("{}", meta.path.display());
    println!("  type:     {}", meta.device_type);
    println!("  model:    {}", meta.model);
    println!("  firmware: {}", meta.firmware);
    println!("  serial:   {}", meta.serial);
    println!(
        "  capacity: {} bytes ({} sectors of {} bytes)",
        id.capacity_bytes(),
        id.user_sectors(),
        id.logical_sector_size()
    );
    match id.rotation_rate() {
        Some(0) => println!("  rotation: solid state"),
        Some(rpm) => println!("  rotation: {} rpm", rpm),
        None => {}
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = CommandLine::parse();
    init_logging(args.verbose)?;

    let sg_config = SgConfig {
        timeout: Duration::from_millis(args.timeout_ms),
    };

    let mut devices = BTreeMap::new();
    if args.paths.is_empty() {
        let mut config = ScanConfig::for_host()?;
        if let Some(root) = args.root {
            config.root = root;
        }
        devices = scan_sata(&config, sg_config, devices)
            .with_context(|| format!("failed to scan {}", config.root.display()))?;
    } else {
        for path in args.paths {
            let dev = SataDevice::open_with(&path, sg_config)
                .with_context(|| format!("failed to open {}", path.display()))?;
            devices.insert(path, dev);
        }
    }

    if devices.is_empty() {
        bail!("no SATA devices found");
    }

    let mut failures = 0;
    for (_, mut dev) in devices {
        if let Err(e) = report(&mut dev) {
            eprintln!("{:#}", e);
            failures += 1;
        }
        dev.close()?;
    }
    if failures > 0 {
        bail!("{} device(s) could not be identified", failures);
    }
    Ok(())
}
