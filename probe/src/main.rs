use anyhow::{Context, Result};
use clap::Parser;
use colorsense_usb::{ErrorKind, HotplugEvent, RuntimeContext, Transport};
use log::{info, warn};
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;

use crate::cli::Cli;
use crate::settings::Settings;

mod cli;
mod settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    CombinedLogger::init(vec![TermLogger::new(
        args.log_level.into(),
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .context("Could not configure the logger")?;

    info!("Starting colorsense probe v{}", VERSION);
    let mut settings = Settings::load(&args.config)?;
    settings.apply_overrides(&args);
    let device = &settings.device;

    let mut transport = Transport::new();
    transport.load().context("Unable to load the USB subsystem")?;
    transport
        .attach_to_context(Some(Arc::new(RuntimeContext::current()?)))
        .context("Unable to attach to the event loop")?;

    if let Err(error) = transport.connect(
        device.vendor_id,
        device.product_id,
        device.interface,
        device.configuration,
    ) {
        if error.kind() == ErrorKind::Internal {
            // Not having the sensor plugged in is perfectly normal.
            warn!("No sensor available: {}", error);
            if !args.watch {
                return Ok(());
            }
        } else {
            return Err(error).context("Unable to connect to the sensor");
        }
    }

    if let Some(handle) = transport.get_device_handle() {
        match handle.describe().await {
            Ok(descriptor) => info!(
                "Found {} {} ({:04x}:{:04x})",
                descriptor.manufacturer(),
                descriptor.product_name(),
                descriptor.vendor_id(),
                descriptor.product_id()
            ),
            Err(error) => warn!("Unable to read the device descriptor: {}", error),
        }

        let reading = &settings.reading;
        let raw = handle
            .read_reading(reading.request, reading.value, reading.index, reading.endian)
            .await
            .context("Unable to read from the sensor")?;
        let calibrated = settings.calibration.apply(&raw);

        println!("Raw:        {}", raw);
        println!("Calibrated: {}", calibrated);
    }

    if args.watch {
        let (sender, mut receiver) = mpsc::channel(16);
        transport
            .watch_hotplug(device.vendor_id, device.product_id, sender)
            .context("Unable to watch for sensors")?;
        info!("Watching for sensors, press Ctrl+C to stop");

        loop {
            tokio::select! {
                Some(event) = receiver.recv() => match event {
                    HotplugEvent::Arrived { bus_number, address } => {
                        println!("Sensor arrived at bus {} address {}", bus_number, address)
                    }
                    HotplugEvent::Left { bus_number, address } => {
                        println!("Sensor left bus {} address {}", bus_number, address)
                    }
                },
                _ = signal::ctrl_c() => break,
            }
        }
    }

    transport.disconnect();
    Ok(())
}
