use clap::{Parser, ValueEnum};
use colorsense_usb::buffer::Endian;
use directories::ProjectDirs;
use std::num::ParseIntError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(about, version)]
pub struct Cli {
    /// Minimum log level to print out
    #[clap(long, value_enum, default_value = "info")]
    pub log_level: LevelFilter,

    /// Location of the probe configuration file on disk
    #[clap(long, default_value_os_t = default_config_location())]
    pub config: PathBuf,

    /// USB Vendor ID of the sensor (e.g. 0x0971)
    #[clap(long, value_parser = parse_hex_u16)]
    pub vendor_id: Option<u16>,

    /// USB Product ID of the sensor
    #[clap(long, value_parser = parse_hex_u16)]
    pub product_id: Option<u16>,

    /// Interface number to claim
    #[clap(long)]
    pub interface: Option<u8>,

    /// Configuration to select
    #[clap(long)]
    pub configuration: Option<u8>,

    /// Vendor request used to fetch a reading
    #[clap(long, value_parser = parse_hex_u8)]
    pub request: Option<u8>,

    /// Byte order of the sensor's registers
    #[clap(long, value_enum)]
    pub endian: Option<ByteOrder>,

    /// After reading, keep running and report the sensor being plugged or unplugged
    #[clap(long)]
    pub watch: bool,
}

fn default_config_location() -> PathBuf {
    match ProjectDirs::from("org", "colorsense", "colorsense-probe") {
        Some(dirs) => dirs.config_dir().join("settings.json"),
        None => PathBuf::from("colorsense-probe.json"),
    }
}

fn parse_hex_u16(value: &str) -> Result<u16, ParseIntError> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

fn parse_hex_u8(value: &str) -> Result<u8, ParseIntError> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

#[derive(ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum ByteOrder {
    Big,
    Little,
}

impl From<ByteOrder> for Endian {
    fn from(value: ByteOrder) -> Self {
        match value {
            ByteOrder::Big => Endian::Big,
            ByteOrder::Little => Endian::Little,
        }
    }
}

#[repr(usize)]
#[derive(ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum LevelFilter {
    /// A level lower than all log levels.
    Off,
    /// Corresponds to the `Error` log level.
    Error,
    /// Corresponds to the `Warn` log level.
    Warn,
    /// Corresponds to the `Info` log level.
    Info,
    /// Corresponds to the `Debug` log level.
    Debug,
    /// Corresponds to the `Trace` log level.
    Trace,
}

impl From<LevelFilter> for log::LevelFilter {
    fn from(value: LevelFilter) -> Self {
        match value {
            LevelFilter::Off => log::LevelFilter::Off,
            LevelFilter::Error => log::LevelFilter::Error,
            LevelFilter::Warn => log::LevelFilter::Warn,
            LevelFilter::Info => log::LevelFilter::Info,
            LevelFilter::Debug => log::LevelFilter::Debug,
            LevelFilter::Trace => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_hex_and_decimal() {
        assert_eq!(parse_hex_u16("0x0971"), Ok(0x0971));
        assert_eq!(parse_hex_u16("0XFFFF"), Ok(0xffff));
        assert_eq!(parse_hex_u16("2417"), Ok(2417));
        assert!(parse_hex_u16("0x10000").is_err());
        assert_eq!(parse_hex_u8("0x02"), Ok(2));
    }

    #[test]
    fn arguments_override_nothing_by_default() {
        let cli = Cli::parse_from(["colorsense-probe", "--config", "/tmp/probe.json"]);
        assert_eq!(cli.log_level, LevelFilter::Info);
        assert!(cli.vendor_id.is_none());
        assert!(!cli.watch);
    }

    #[test]
    fn arguments_parse() {
        let cli = Cli::parse_from([
            "colorsense-probe",
            "--vendor-id",
            "0x0971",
            "--product-id",
            "0x2005",
            "--interface",
            "0",
            "--endian",
            "big",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.vendor_id, Some(0x0971));
        assert_eq!(cli.product_id, Some(0x2005));
        assert_eq!(cli.interface, Some(0));
        assert_eq!(cli.endian, Some(ByteOrder::Big));
        assert_eq!(log::LevelFilter::from(cli.log_level), log::LevelFilter::Debug);
    }
}
