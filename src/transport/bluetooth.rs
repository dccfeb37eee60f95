//! # Bluetooth Low Energy Transport
//!
//! This module talks to thermal printers that expose their print channel as
//! a GATT characteristic.
//!
//! ## Discovery
//!
//! Most cheap ESC/POS printers advertise the `0x18F0` service
//! (`000018f0-0000-1000-8000-00805f9b34fb`). Connecting:
//!
//! 1. Scans on the first Bluetooth adapter, filtered to that service
//! 2. Takes the first peripheral that advertises it
//! 3. Discovers its services and picks the first characteristic of the
//!    print service that supports `write` or `write without response`
//!
//! ## Chunked Writes
//!
//! Without MTU negotiation a BLE write carries 20 bytes of payload, so the
//! payload is cut into 20-byte chunks and written strictly in order. After
//! the chunks starting at offsets 0, 400, 800, ... the transport sleeps for
//! 15ms so the printer's small receive buffer can drain.
//!
//! When the characteristic supports acknowledged writes they are used, so
//! the next chunk only goes out after the printer has accepted the previous
//! one.
//!
//! ## Linux Setup
//!
//! BLE printers do not need pairing or an RFCOMM binding. BlueZ must be
//! running and the user needs access to the system D-Bus:
//!
//! ```bash
//! $ systemctl status bluetooth
//! $ bluetoothctl power on
//! ```

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, info, warn};
use uuid::Uuid;

use super::{ChunkSink, ConnectionKind, Pacing, PrinterTransport, write_paced};
use crate::error::PrintError;
use crate::printer::BluetoothSettings;

/// Standard thermal printer GATT service
pub const PRINTER_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_18f0_0000_1000_8000_0080_5f9b_34fb);

/// Default time to wait for a printer to show up in a scan
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the scan results are polled
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Name reported when the peripheral does not advertise one
const UNKNOWN_NAME: &str = "Unknown Printer";

/// # Bluetooth Printer Transport
///
/// ## Example
///
/// ```no_run
/// use thermoprint::transport::{BluetoothTransport, PrinterTransport};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), thermoprint::PrintError> {
/// let mut transport = BluetoothTransport::new();
/// let name = transport.connect().await?;
/// println!("Connected to {}", name);
///
/// transport.send(&[0x1B, 0x40]).await?;
/// transport.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct BluetoothTransport {
    service: Uuid,
    pacing: Pacing,
    scan_timeout: Duration,
    link: Option<GattLink>,
}

/// An open channel to one characteristic.
struct GattLink {
    // Kept alive for the lifetime of the connection
    _adapter: Adapter,
    peripheral: Peripheral,
    characteristic: Characteristic,
    write_type: WriteType,
}

impl Default for BluetoothTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BluetoothTransport {
    pub fn new() -> Self {
        Self {
            service: PRINTER_SERVICE_UUID,
            pacing: Pacing::BLUETOOTH,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            link: None,
        }
    }

    /// Build a transport from the `bluetooth` section of the settings file.
    pub fn from_settings(settings: &BluetoothSettings) -> Self {
        let mut transport = Self::new();
        transport.set_pacing(settings.pacing());
        transport.set_scan_timeout(settings.scan_timeout());
        transport
    }

    /// Set the chunk size and pause cadence.
    pub fn set_pacing(&mut self, pacing: Pacing) {
        self.pacing = pacing;
    }

    /// Set how long `connect` scans before giving up.
    pub fn set_scan_timeout(&mut self, timeout: Duration) {
        self.scan_timeout = timeout;
    }

    async fn first_adapter() -> Result<Adapter, PrintError> {
        let manager = Manager::new()
            .await
            .map_err(|e| PrintError::Connection(format!("Bluetooth unavailable: {}", e)))?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| PrintError::Connection(format!("Failed to list adapters: {}", e)))?;
        adapters
            .into_iter()
            .next()
            .ok_or_else(|| PrintError::Connection("No Bluetooth adapter found".to_string()))
    }

    /// Poll scan results until a peripheral advertising the service appears.
    async fn find_printer(&self, adapter: &Adapter) -> Result<(Peripheral, String), PrintError> {
        let deadline = tokio::time::Instant::now() + self.scan_timeout;

        loop {
            let peripherals = adapter
                .peripherals()
                .await
                .map_err(|e| PrintError::Connection(format!("Scan failed: {}", e)))?;

            for peripheral in peripherals {
                let Ok(Some(props)) = peripheral.properties().await else {
                    continue;
                };
                if props.services.contains(&self.service) {
                    let name = props
                        .local_name
                        .unwrap_or_else(|| UNKNOWN_NAME.to_string());
                    debug!("Found {} advertising {}", name, self.service);
                    return Ok((peripheral, name));
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(PrintError::Connection(format!(
                    "No printer advertising service {} found within {:?}",
                    self.service, self.scan_timeout
                )));
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }

    /// Drop the link after a failed write. The caller has to reconnect.
    async fn drop_link(&mut self) {
        if let Some(link) = self.link.take() {
            if let Err(e) = link.peripheral.disconnect().await {
                warn!("Failed to disconnect after write error: {}", e);
            }
        }
    }
}

/// Whether a characteristic accepts writes of either kind.
#[inline]
pub fn is_writable(properties: CharPropFlags) -> bool {
    properties.intersects(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE)
}

/// Prefer acknowledged writes so each chunk completes before the next.
#[inline]
pub fn write_type_for(properties: CharPropFlags) -> WriteType {
    if properties.contains(CharPropFlags::WRITE) {
        WriteType::WithResponse
    } else {
        WriteType::WithoutResponse
    }
}

struct GattSink<'a> {
    peripheral: &'a Peripheral,
    characteristic: &'a Characteristic,
    write_type: WriteType,
}

#[async_trait]
impl ChunkSink for GattSink<'_> {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), String> {
        self.peripheral
            .write(self.characteristic, chunk, self.write_type)
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl PrinterTransport for BluetoothTransport {
    fn kind(&self) -> ConnectionKind {
        ConnectionKind::Bluetooth
    }

    async fn connect(&mut self) -> Result<String, PrintError> {
        self.disconnect().await?;

        let adapter = Self::first_adapter().await?;
        adapter
            .start_scan(ScanFilter {
                services: vec![self.service],
            })
            .await
            .map_err(|e| PrintError::Connection(format!("Failed to start scan: {}", e)))?;

        let found = self.find_printer(&adapter).await;
        if let Err(e) = adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
        let (peripheral, name) = found?;

        peripheral
            .connect()
            .await
            .map_err(|e| PrintError::Connection(format!("Failed to connect to {}: {}", name, e)))?;

        let selected = match peripheral.discover_services().await {
            Ok(()) => peripheral
                .characteristics()
                .into_iter()
                .find(|c| c.service_uuid == self.service && is_writable(c.properties))
                .ok_or_else(|| {
                    PrintError::Connection("No writable characteristic found".to_string())
                }),
            Err(e) => Err(PrintError::Connection(format!(
                "Service discovery failed: {}",
                e
            ))),
        };

        let characteristic = match selected {
            Ok(c) => c,
            Err(e) => {
                if let Err(de) = peripheral.disconnect().await {
                    warn!("Failed to disconnect from {}: {}", name, de);
                }
                return Err(e);
            }
        };

        let write_type = write_type_for(characteristic.properties);
        info!(
            "Connected to {} (characteristic {}, {:?})",
            name, characteristic.uuid, write_type
        );

        self.link = Some(GattLink {
            _adapter: adapter,
            peripheral,
            characteristic,
            write_type,
        });
        Ok(name)
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), PrintError> {
        let link = self.link.as_ref().ok_or(PrintError::NotConnected)?;

        let mut sink = GattSink {
            peripheral: &link.peripheral,
            characteristic: &link.characteristic,
            write_type: link.write_type,
        };

        let result = write_paced(&mut sink, payload, &self.pacing).await;
        if let Err(e) = &result {
            warn!("BLE write failed, dropping connection: {}", e);
            self.drop_link().await;
        }
        result.map(|_| ())
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    async fn disconnect(&mut self) -> Result<(), PrintError> {
        if let Some(link) = self.link.take() {
            link.peripheral
                .disconnect()
                .await
                .map_err(|e| PrintError::Connection(format!("Failed to disconnect: {}", e)))?;
            info!("Bluetooth printer disconnected");
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
