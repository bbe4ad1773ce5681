use crate::cli::Cli;
use anyhow::{Context, Result};
use colorsense_usb::buffer::Endian;
use colorsense_usb::Calibration;
use log::error;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub device: DeviceSettings,
    pub reading: ReadingSettings,
    pub calibration: Calibration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub configuration: u8,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        // X-Rite i1Display Pro
        Self {
            vendor_id: 0x0765,
            product_id: 0x5020,
            interface: 0,
            configuration: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingSettings {
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub endian: Endian,
}

impl Default for ReadingSettings {
    fn default() -> Self {
        Self {
            request: 0x01,
            value: 0,
            index: 0,
            endian: Endian::Little,
        }
    }
}

impl Settings {
    /// Reads the settings file, writing out the defaults if it doesn't exist yet.
    pub fn load(path: &Path) -> Result<Settings> {
        let settings = Settings::read(path)?;
        if !path.exists() {
            if let Err(e) = settings.write(path) {
                error!("Couldn't save settings to {}: {}", path.to_string_lossy(), e);
            }
        }
        Ok(settings)
    }

    pub fn read(path: &Path) -> Result<Settings> {
        match File::open(path) {
            Ok(reader) => serde_json::from_reader(reader).context(format!(
                "Could not parse probe settings file at {}",
                path.to_string_lossy()
            )),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Settings::default()),
            Err(error) => Err(error).context(format!(
                "Could not open probe settings file for reading at {}",
                path.to_string_lossy()
            )),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if let Err(e) = create_dir_all(parent) {
                if e.kind() != ErrorKind::AlreadyExists {
                    return Err(e).context(format!(
                        "Could not create settings directory at {}",
                        parent.to_string_lossy()
                    ));
                }
            }
        }
        let writer = File::create(path).context(format!(
            "Could not open probe settings file for writing at {}",
            path.to_string_lossy()
        ))?;
        serde_json::to_writer_pretty(writer, self).context(format!(
            "Could not write to probe settings file at {}",
            path.to_string_lossy()
        ))?;
        Ok(())
    }

    /// Command line values take priority over the file.
    pub fn apply_overrides(&mut self, args: &Cli) {
        if let Some(vendor_id) = args.vendor_id {
            self.device.vendor_id = vendor_id;
        }
        if let Some(product_id) = args.product_id {
            self.device.product_id = product_id;
        }
        if let Some(interface) = args.interface {
            self.device.interface = interface;
        }
        if let Some(configuration) = args.configuration {
            self.device.configuration = configuration;
        }
        if let Some(request) = args.request {
            self.reading.request = request;
        }
        if let Some(endian) = args.endian {
            self.reading.endian = endian.into();
        }
    }
}
