use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use sed_device_scan::descriptor::DESCRIPTOR_RECORD_LEN;
use sed_device_scan::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sedscan")]
#[command(about = "Discover block-storage devices and their self-encrypting drive descriptors")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to sedscan.toml in the user config dir)
    #[arg(long, global = true, env = "SEDSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    /// Query ATA/NVMe identify data for SMART-capable devices
    #[arg(long, global = true)]
    identify_fallback: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every discovered block-storage device
    Scan {
        /// Registry snapshot (JSON)
        #[arg(short, long)]
        registry: PathBuf,

        /// Show the full descriptor of each device
        #[arg(short, long)]
        detailed: bool,

        /// Print devices as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one device by reference name (e.g. disk2)
    Query {
        name: String,

        /// Registry snapshot (JSON)
        #[arg(short, long)]
        registry: PathBuf,

        /// Print the device as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the serialized descriptor record of one device as hex
    Dump {
        name: String,

        /// Registry snapshot (JSON)
        #[arg(short, long)]
        registry: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.debug, cli.json_logs);
    if !cfg!(feature = "color-output") {
        colored::control::set_override(false);
    }

    let mut config = ScanConfig::load(cli.config.as_deref())
        .context("Failed to load scan configuration")?;
    if cli.identify_fallback {
        config.identify_fallback = true;
    }

    match &cli.command {
        Commands::Scan {
            registry,
            detailed,
            json,
        } => scan(registry, config, *detailed, *json),
        Commands::Query {
            name,
            registry,
            json,
        } => query(registry, config, name, *json),
        Commands::Dump { name, registry } => dump(registry, config, name),
    }
}

fn load_registry(path: &Path) -> Result<MemoryRegistry> {
    MemoryRegistry::load(path)
        .with_context(|| format!("Failed to load registry snapshot {}", path.display()))
}

fn find_device(path: &Path, config: ScanConfig, name: &str) -> Result<BlockStorageDevice> {
    let registry = load_registry(path)?;
    let enumerator = DeviceEnumerator::new(&registry, config).with_identify(&registry);

    enumerator
        .lookup(name)?
        .with_context(|| format!("No block-storage device named '{}'", name))
}

fn scan(path: &Path, config: ScanConfig, detailed: bool, json: bool) -> Result<()> {
    let registry = load_registry(path)?;
    let enumerator = DeviceEnumerator::new(&registry, config).with_identify(&registry);
    let devices = enumerator.enumerate()?;

    if json {
        let summaries: Vec<_> = devices.iter().map(BlockStorageDevice::summary).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No block-storage devices found.");
        return Ok(());
    }

    if detailed {
        for device in &devices {
            print_device_detailed(device);
        }
    } else {
        println!(
            "{:<12} {:<24} {:<20} {:<9} {:<10} {:<6} {:<8}",
            "Device", "Model", "Serial", "Firmware", "Size", "Type", "SED"
        );
        println!("{}", "-".repeat(94));

        for device in &devices {
            let sed = if device.kind().is_security_capable() {
                sed_label(device).green()
            } else {
                "-".normal()
            };
            println!(
                "{:<12} {:<24} {:<20} {:<9} {:<10} {:<6} {:<8}",
                device.dev_name(),
                truncate_string(device.model_num(), 24),
                truncate_string(device.serial_num(), 20),
                device.firmware_rev(),
                format_size(device.size()),
                format!("{:?}", device.dev_type()),
                sed
            );
        }
    }

    println!("\n{} device(s) found.", devices.len());
    Ok(())
}

fn query(path: &Path, config: ScanConfig, name: &str, json: bool) -> Result<()> {
    let device = find_device(path, config, name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&device.summary())?);
    } else {
        print_device_detailed(&device);
    }
    Ok(())
}

fn dump(path: &Path, config: ScanConfig, name: &str) -> Result<()> {
    let device = find_device(path, config, name)?;
    let record = device.descriptor().to_record();

    let origin = if device.descriptor().replayed_record().is_some() {
        ", replayed from driver cache"
    } else {
        ""
    };
    println!(
        "{} ({} bytes{})",
        device.dev_name().as_str().bold(),
        DESCRIPTOR_RECORD_LEN,
        origin
    );
    for (row, chunk) in record.chunks(16).enumerate() {
        println!("{:04x}  {}", row * 16, hex::encode(chunk));
    }
    Ok(())
}

fn print_device_detailed(device: &BlockStorageDevice) {
    println!("\n{}", "=".repeat(60));
    println!("{} {}", "Device:".bold(), device.dev_name());
    println!("Name: {}", device.display_name());
    println!("Type: {:?}", device.dev_type());
    println!("Vendor: {}", device.vendor_name());
    println!("Model: {}", device.model_num());
    println!("Firmware: {}", device.firmware_rev());
    println!("Serial: {}", device.serial_num());
    println!("Size: {}", format_size(device.size()));
    println!(
        "Interconnect: {} ({})",
        device.physical_interconnect(),
        device.physical_interconnect_location()
    );

    let wwn = device.descriptor().world_wide_name;
    if wwn.iter().any(|b| *b != 0) {
        println!("WWN: {}", hex::encode(wwn));
    }

    if !device.kind().is_security_capable() {
        println!("\nSecurity subsystem: {}", "not present".yellow());
        return;
    }

    println!("\nSecurity subsystem: {}", "present".green());
    println!("  Opal 1.0: {}", device.is_opal1());
    println!("  Opal 2.0: {}", device.is_opal2());
    println!("  Enterprise: {}", device.is_enterprise());
    println!("  Any Opal SSC: {}", device.is_any_ssc());
    println!("  Locking enabled: {}", device.locking_enabled());
    if device.locked() {
        println!("  {}", "Locked".red().bold());
    } else {
        println!("  Locked: false");
    }
    println!("  MBR enabled: {}", device.mbr_enabled());
    println!("  MBR done: {}", device.mbr_done());
}

fn sed_label(device: &BlockStorageDevice) -> &'static str {
    if device.is_opal2() {
        "Opal2"
    } else if device.is_opal1() {
        "Opal1"
    } else if device.is_enterprise() {
        "Ent"
    } else {
        "TPer"
    }
}

fn format_size(bytes: u64) -> String {
    const GB: u64 = 1000 * 1000 * 1000;
    if bytes >= GB {
        format!("{}GB", bytes / GB)
    } else {
        format!("{}MB", bytes / (1000 * 1000))
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
