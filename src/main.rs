//! # Thermoprint CLI
//!
//! Command-line interface for printing images on thermal receipt printers.
//!
//! ## Usage
//!
//! ```bash
//! # Print a photo over BLE on 58mm paper
//! thermoprint print receipt.png
//!
//! # Print on an 80mm USB printer
//! thermoprint print --via usb --paper 80 label.png
//!
//! # Only talk to a specific USB device
//! thermoprint print --via usb --vid 0x0416 --pid 0x5011 label.png
//!
//! # Save the dithered result as PNG instead of printing
//! thermoprint preview --png preview.png receipt.jpg
//!
//! # Dump the raw ESC/POS payload
//! thermoprint encode --out job.bin receipt.png
//! cat job.bin > /dev/usb/lp0
//! ```
//!
//! Set `RUST_LOG=debug` to see connection and pacing details.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use thermoprint::{
    PaperWidth, PrintError, PrintSettings, PrinterConnection,
    render::{PixelSurface, adjust::Adjustments, rasterize, surface::load_image},
    transport::{BluetoothTransport, PrinterTransport, UsbTransport},
};

/// Thermoprint - Thermal receipt printer utility
#[derive(Parser, Debug)]
#[command(name = "thermoprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print an image on a thermal printer
    Print {
        /// Image file to print
        image: PathBuf,

        /// Link to the printer
        #[arg(long, value_enum, default_value_t = Via::Bluetooth)]
        via: Via,

        /// USB vendor ID filter (hex, e.g. 0x0416)
        #[arg(long, value_parser = parse_hex_u16)]
        vid: Option<u16>,

        /// USB product ID filter (hex)
        #[arg(long, value_parser = parse_hex_u16)]
        pid: Option<u16>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Save the dithered bitmap as a PNG instead of printing
    Preview {
        /// Image file to render
        image: PathBuf,

        /// Output PNG file
        #[arg(long, value_name = "FILE")]
        png: PathBuf,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Write the raw ESC/POS payload to a file
    Encode {
        /// Image file to encode
        image: PathBuf,

        /// Output file
        #[arg(long, value_name = "FILE")]
        out: PathBuf,

        #[command(flatten)]
        render: RenderArgs,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Paper width: 58 or 80 (mm)
    #[arg(long)]
    paper: Option<PaperWidth>,

    /// JSON settings file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Contrast applied before dithering (1.0 = unchanged)
    #[arg(long)]
    contrast: Option<f32>,

    /// Brightness applied before dithering (1.0 = unchanged)
    #[arg(long)]
    brightness: Option<f32>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Via {
    Bluetooth,
    Usb,
}

impl RenderArgs {
    /// Load the settings file, if any, and apply flag overrides.
    fn settings(&self) -> Result<PrintSettings, PrintError> {
        let mut settings = match &self.config {
            Some(path) => PrintSettings::from_json_file(path)?,
            None => PrintSettings::default(),
        };
        if let Some(paper) = self.paper {
            settings.paper = paper;
        }
        if let Some(contrast) = self.contrast {
            settings.contrast = contrast;
        }
        if let Some(brightness) = self.brightness {
            settings.brightness = brightness;
        }
        Ok(settings)
    }
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex ID '{}': {}", s, e))
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), PrintError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Print {
            image,
            via,
            vid,
            pid,
            render,
        } => {
            let mut settings = render.settings()?;
            if vid.is_some() || pid.is_some() {
                settings.usb.vendor_id = vid;
                settings.usb.product_id = pid;
            }

            let capture = load_adjusted(&image, &settings)?;
            let surface = PixelSurface::from_rgba_image(&capture);

            let transport: Box<dyn PrinterTransport> = match via {
                Via::Bluetooth => Box::new(BluetoothTransport::from_settings(&settings.bluetooth)),
                Via::Usb => Box::new(UsbTransport::from_settings(&settings.usb)),
            };

            let connection = PrinterConnection::new();
            let name = connection.connect(transport).await?;
            println!("Connected to {}", name);

            let result = thermoprint::print(&surface, settings.paper, &connection).await;
            if let Err(e) = connection.disconnect().await {
                log::warn!("Disconnect failed: {}", e);
            }
            let report = result?;

            println!(
                "Printed {}x{} ({} bytes) on {}",
                report.width, report.height, report.bytes_sent, report.device_name
            );
        }

        Commands::Preview { image, png, render } => {
            let settings = render.settings()?;
            let capture = load_adjusted(&image, &settings)?;
            let bitmap = rasterize(&PixelSurface::from_rgba_image(&capture), settings.paper)?;

            bitmap.save_png(&png)?;
            println!(
                "Saved {}x{} preview to {}",
                bitmap.width(),
                bitmap.height(),
                png.display()
            );
        }

        Commands::Encode { image, out, render } => {
            let settings = render.settings()?;
            let capture = load_adjusted(&image, &settings)?;
            let bitmap = rasterize(&PixelSurface::from_rgba_image(&capture), settings.paper)?;
            let payload = thermoprint::encode(&bitmap);

            std::fs::write(&out, payload.as_bytes())?;
            println!("Wrote {} bytes to {}", payload.len(), out.display());
        }
    }

    Ok(())
}

/// Load an image and apply the contrast/brightness pre-adjustment.
fn load_adjusted(path: &Path, settings: &PrintSettings) -> Result<image::RgbaImage, PrintError> {
    let image = load_image(path)?;
    let adjustments = Adjustments {
        contrast: settings.contrast,
        brightness: settings.brightness,
    };
    if adjustments.is_identity() {
        return Ok(image);
    }
    Ok(adjustments.apply(&PixelSurface::from_rgba_image(&image)))
}
