//! # USB Transport
//!
//! Sends payloads to USB thermal printers over a bulk OUT endpoint using
//! libusb (via `rusb`).
//!
//! ## Device Selection
//!
//! Without a filter the first device exposing a printer-class interface
//! (class `0x07`) is used. A vendor and/or product ID narrows the search to
//! matching devices regardless of class, for printers that report themselves
//! as vendor-specific.
//!
//! ## Opening
//!
//! 1. Select configuration 1 if the device is unconfigured
//! 2. Find the bulk OUT endpoint on interface 0's active alternate setting
//! 3. Detach the kernel driver (`usblp` on Linux) where supported
//! 4. Claim interface 0
//!
//! ## Writes
//!
//! The payload goes out in 64-byte bulk transfers, back to back. libusb calls
//! block, so each transfer runs on tokio's blocking pool.
//!
//! ## Linux Permissions
//!
//! ```bash
//! # /etc/udev/rules.d/99-thermal-printer.rules
//! SUBSYSTEM=="usb", ATTRS{idVendor}=="0416", MODE="0666"
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType, UsbContext};

use super::{ChunkSink, ConnectionKind, Pacing, PrinterTransport, write_paced};
use crate::error::PrintError;
use crate::printer::UsbSettings;

/// USB class code for printers
pub const USB_CLASS_PRINTER: u8 = 0x07;

/// Interface the print channel lives on
const PRINTER_INTERFACE: u8 = 0;

/// Alternate setting active after claiming an interface
const ACTIVE_ALT_SETTING: u8 = 0;

/// Default per-transfer timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Name reported when the device has no product string
const FALLBACK_NAME: &str = "USB Printer";

/// Optional vendor/product restriction for device selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    /// Whether either ID is set.
    pub fn is_set(&self) -> bool {
        self.vendor_id.is_some() || self.product_id.is_some()
    }

    /// Whether a device with these IDs passes the filter.
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id.is_none_or(|vid| vid == vendor_id)
            && self.product_id.is_none_or(|pid| pid == product_id)
    }
}

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    iface: u8,
    address: u8,
}

struct UsbLink {
    handle: Arc<DeviceHandle<Context>>,
    endpoint: Endpoint,
}

/// # USB Printer Transport
///
/// ## Example
///
/// ```no_run
/// use thermoprint::transport::{PrinterTransport, UsbTransport};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), thermoprint::PrintError> {
/// let mut transport = UsbTransport::new().with_ids(Some(0x0416), None);
/// let name = transport.connect().await?;
/// println!("Connected to {}", name);
/// # Ok(())
/// # }
/// ```
pub struct UsbTransport {
    filter: DeviceFilter,
    pacing: Pacing,
    timeout: Duration,
    link: Option<UsbLink>,
}

impl Default for UsbTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbTransport {
    pub fn new() -> Self {
        Self {
            filter: DeviceFilter::default(),
            pacing: Pacing::USB,
            timeout: DEFAULT_TIMEOUT,
            link: None,
        }
    }

    /// Build a transport from the `usb` section of the settings file.
    pub fn from_settings(settings: &UsbSettings) -> Self {
        let mut transport = Self::new().with_ids(settings.vendor_id, settings.product_id);
        transport.pacing = settings.pacing();
        transport.timeout = settings.timeout();
        transport
    }

    /// Restrict selection to devices with these IDs.
    pub fn with_ids(mut self, vendor_id: Option<u16>, product_id: Option<u16>) -> Self {
        self.filter = DeviceFilter {
            vendor_id,
            product_id,
        };
        self
    }

    fn release(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        match Arc::try_unwrap(link.handle) {
            Ok(mut handle) => {
                if let Err(e) = handle.release_interface(link.endpoint.iface) {
                    debug!("Failed to release interface: {}", e);
                }
            }
            // Dropping the last reference closes the device
            Err(_) => debug!("USB handle still shared, closing on drop"),
        }
    }
}

fn usb_err(context: &str) -> impl Fn(rusb::Error) -> PrintError + '_ {
    move |e| PrintError::Connection(format!("{}: {}", context, e))
}

fn has_printer_interface(device: &Device<Context>) -> bool {
    let Ok(config) = device.active_config_descriptor().or_else(|_| device.config_descriptor(0))
    else {
        return false;
    };
    config.interfaces().any(|interface| {
        interface
            .descriptors()
            .any(|desc| desc.class_code() == USB_CLASS_PRINTER)
    })
}

fn find_device(
    context: &Context,
    filter: DeviceFilter,
) -> Result<(Device<Context>, DeviceDescriptor), PrintError> {
    let devices = context
        .devices()
        .map_err(usb_err("Failed to read device list"))?;

    for device in devices.iter() {
        let device_desc = match device.device_descriptor() {
            Ok(d) => d,
            Err(err) => {
                debug!("{:?}", err);
                continue;
            }
        };

        let selected = if filter.is_set() {
            filter.matches(device_desc.vendor_id(), device_desc.product_id())
        } else {
            has_printer_interface(&device)
        };

        if selected {
            debug!(
                "Selected USB device {:04x}:{:04x}",
                device_desc.vendor_id(),
                device_desc.product_id()
            );
            return Ok((device, device_desc));
        }
    }

    Err(PrintError::Connection(if filter.is_set() {
        format!("No USB device matches {:?}", filter)
    } else {
        "No USB printer found".to_string()
    }))
}

/// First bulk OUT endpoint on the printer interface's active alternate
/// setting.
fn find_endpoint_out(device: &Device<Context>) -> Option<Endpoint> {
    let config_desc = device.active_config_descriptor().ok()?;
    for interface in config_desc.interfaces() {
        for interface_desc in interface.descriptors() {
            for endpoint_desc in interface_desc.endpoint_descriptors() {
                if is_print_channel(
                    interface_desc.interface_number(),
                    interface_desc.setting_number(),
                    endpoint_desc.direction(),
                    endpoint_desc.transfer_type(),
                ) {
                    return Some(Endpoint {
                        iface: interface_desc.interface_number(),
                        address: endpoint_desc.address(),
                    });
                }
            }
        }
    }
    None
}

/// Whether an endpoint is the bulk OUT print channel.
///
/// Only the printer interface's default alternate setting is considered;
/// that is the one active right after the interface is claimed, and the
/// driver never switches it.
pub fn is_print_channel(
    interface: u8,
    setting: u8,
    direction: Direction,
    transfer_type: TransferType,
) -> bool {
    interface == PRINTER_INTERFACE
        && setting == ACTIVE_ALT_SETTING
        && direction == Direction::Out
        && transfer_type == TransferType::Bulk
}

/// Blocking device open. Runs on the blocking pool.
fn open_printer(filter: DeviceFilter) -> Result<(UsbLink, String), PrintError> {
    let context = Context::new().map_err(usb_err("USB unavailable"))?;
    let (device, device_desc) = find_device(&context, filter)?;
    let mut handle = device.open().map_err(usb_err("Failed to open device"))?;

    if handle.active_configuration().map_or(true, |c| c == 0) {
        debug!("Device unconfigured, selecting configuration 1");
        handle
            .set_active_configuration(1)
            .map_err(usb_err("Failed to select configuration"))?;
    }

    let endpoint = find_endpoint_out(&device).ok_or_else(|| {
        PrintError::Connection("No bulk OUT endpoint on interface 0".to_string())
    })?;

    // Not supported on every platform
    if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
        debug!("Kernel driver auto-detach unavailable: {}", e);
    }
    handle
        .claim_interface(endpoint.iface)
        .map_err(usb_err("Failed to claim interface"))?;

    let name = handle
        .read_product_string_ascii(&device_desc)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());

    info!(
        "Claimed interface {} on {} (endpoint 0x{:02x})",
        endpoint.iface, name, endpoint.address
    );

    Ok((
        UsbLink {
            handle: Arc::new(handle),
            endpoint,
        },
        name,
    ))
}

struct BulkSink {
    handle: Arc<DeviceHandle<Context>>,
    address: u8,
    timeout: Duration,
}

#[async_trait]
impl ChunkSink for BulkSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), String> {
        let handle = Arc::clone(&self.handle);
        let (address, timeout) = (self.address, self.timeout);
        let buf = chunk.to_vec();

        let written = tokio::task::spawn_blocking(move || handle.write_bulk(address, &buf, timeout))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;

        if written != chunk.len() {
            return Err(format!(
                "short write: {} of {} bytes, possibly timeout",
                written,
                chunk.len()
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PrinterTransport for UsbTransport {
    fn kind(&self) -> ConnectionKind {
        ConnectionKind::Usb
    }

    async fn connect(&mut self) -> Result<String, PrintError> {
        self.release();

        let filter = self.filter;
        let (link, name) = tokio::task::spawn_blocking(move || open_printer(filter))
            .await
            .map_err(|e| PrintError::Connection(e.to_string()))??;

        self.link = Some(link);
        Ok(name)
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), PrintError> {
        let link = self.link.as_ref().ok_or(PrintError::NotConnected)?;

        let mut sink = BulkSink {
            handle: Arc::clone(&link.handle),
            address: link.endpoint.address,
            timeout: self.timeout,
        };

        let result = write_paced(&mut sink, payload, &self.pacing).await;
        drop(sink);
        if let Err(e) = &result {
            warn!("USB transfer failed, closing device: {}", e);
            self.release();
        }
        result.map(|_| ())
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    async fn disconnect(&mut self) -> Result<(), PrintError> {
        if self.link.is_some() {
            self.release();
            info!("USB printer released");
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_unset_matches_everything() {
        let filter = DeviceFilter::default();
        assert!(!filter.is_set());
        assert!(filter.matches(0x0416, 0x5011));
    }

    #[test]
    fn test_filter_vendor_only() {
        let filter = DeviceFilter {
            vendor_id: Some(0x0416),
            product_id: None,
        };
        assert!(filter.is_set());
        assert!(filter.matches(0x0416, 0x5011));
        assert!(filter.matches(0x0416, 0x0001));
        assert!(!filter.matches(0x04B8, 0x5011));
    }

    #[test]
    fn test_filter_vendor_and_product() {
        let filter = DeviceFilter {
            vendor_id: Some(0x04B8),
            product_id: Some(0x0202),
        };
        assert!(filter.matches(0x04B8, 0x0202));
        assert!(!filter.matches(0x04B8, 0x0203));
    }

    #[test]
    fn test_print_channel_is_bulk_out_on_active_setting() {
        assert!(is_print_channel(0, 0, Direction::Out, TransferType::Bulk));

        // Wrong direction or transfer type
        assert!(!is_print_channel(0, 0, Direction::In, TransferType::Bulk));
        assert!(!is_print_channel(0, 0, Direction::Out, TransferType::Interrupt));

        // Another interface, or an inactive alternate setting of interface 0
        assert!(!is_print_channel(1, 0, Direction::Out, TransferType::Bulk));
        assert!(!is_print_channel(0, 1, Direction::Out, TransferType::Bulk));
    }

    #[test]
    fn test_from_settings() {
        let settings = UsbSettings {
            chunk_size: 512,
            timeout_ms: 250,
            vendor_id: Some(0x0416),
            product_id: None,
        };
        let transport = UsbTransport::from_settings(&settings);
        assert_eq!(transport.pacing.chunk_size, 512);
        assert_eq!(transport.pacing.pause_every, None);
        assert_eq!(transport.timeout, Duration::from_millis(250));
        assert_eq!(transport.filter.vendor_id, Some(0x0416));
    }

    #[test]
    fn test_new_transport_is_disconnected() {
        let transport = UsbTransport::new();
        assert!(!transport.is_connected());
        assert_eq!(transport.kind(), ConnectionKind::Usb);
        assert_eq!(transport.pacing, Pacing::USB);
    }

    #[tokio::test]
    async fn test_send_without_connect_fails() {
        let mut transport = UsbTransport::new();
        assert!(matches!(
            transport.send(&[0x1B, 0x40]).await,
            Err(PrintError::NotConnected)
        ));
        assert!(transport.disconnect().await.is_ok());
    }
}
