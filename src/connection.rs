//! # Printer Connection
//!
//! The single active channel to a printer. Exactly one transport occupies
//! the slot at a time; connecting a new one disconnects the previous one
//! first.
//!
//! The slot sits behind a `tokio::sync::Mutex`. [`PrinterConnection::lock`]
//! hands out a [`ConnectionGuard`] that is held for a whole print, so two
//! payloads can never interleave on the wire.
//!
//! ```
//! use thermoprint::connection::PrinterConnection;
//! use thermoprint::transport::{ConnectionKind, MockTransport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), thermoprint::PrintError> {
//! let connection = PrinterConnection::new();
//! assert_eq!(connection.device_name().await, "Not Connected");
//!
//! connection
//!     .connect(Box::new(MockTransport::usb().with_name("Counter")))
//!     .await?;
//! assert_eq!(connection.kind().await, ConnectionKind::Usb);
//! assert_eq!(connection.device_name().await, "Counter");
//! # Ok(())
//! # }
//! ```

use log::{info, warn};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::PrintError;
use crate::transport::{ConnectionKind, PrinterTransport};

/// Name reported while nothing is connected
pub const NOT_CONNECTED: &str = "Not Connected";

#[derive(Default)]
struct Slot {
    transport: Option<Box<dyn PrinterTransport>>,
    device_name: Option<String>,
    ready: bool,
}

impl Slot {
    fn kind(&self) -> ConnectionKind {
        match &self.transport {
            Some(transport) if self.ready => transport.kind(),
            _ => ConnectionKind::None,
        }
    }

    fn is_connected(&self) -> bool {
        self.ready
            && self
                .transport
                .as_ref()
                .is_some_and(|transport| transport.is_connected())
    }

    fn device_name(&self) -> String {
        match &self.device_name {
            Some(name) if self.is_connected() => name.clone(),
            _ => NOT_CONNECTED.to_string(),
        }
    }

    /// Disconnect and empty the slot.
    async fn clear(&mut self) -> Result<(), PrintError> {
        self.ready = false;
        self.device_name = None;
        match self.transport.take() {
            Some(mut transport) => transport.disconnect().await,
            None => Ok(()),
        }
    }
}

/// # Printer Connection
///
/// Owns the active transport. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct PrinterConnection {
    slot: Mutex<Slot>,
}

impl PrinterConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `transport` and make it the active connection.
    ///
    /// Whatever occupied the slot is disconnected first, even if the new
    /// connection then fails. Returns the printer's display name.
    pub async fn connect(
        &self,
        mut transport: Box<dyn PrinterTransport>,
    ) -> Result<String, PrintError> {
        let mut slot = self.slot.lock().await;

        if slot.transport.is_some() {
            let previous = slot.kind();
            if let Err(e) = slot.clear().await {
                warn!("Failed to disconnect previous {} printer: {}", previous, e);
            }
        }

        let name = transport.connect().await?;
        info!("Connected to {} via {}", name, transport.kind());

        slot.transport = Some(transport);
        slot.device_name = Some(name.clone());
        slot.ready = true;
        Ok(name)
    }

    /// Disconnect the active transport, if any.
    pub async fn disconnect(&self) -> Result<(), PrintError> {
        let mut slot = self.slot.lock().await;
        if slot.transport.is_some() {
            info!("Disconnecting {}", slot.device_name());
        }
        slot.clear().await
    }

    pub async fn kind(&self) -> ConnectionKind {
        self.slot.lock().await.kind()
    }

    /// Display name of the connected printer, or `"Not Connected"`.
    pub async fn device_name(&self) -> String {
        self.slot.lock().await.device_name()
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_connected()
    }

    /// Send a payload, holding the connection for the duration.
    pub async fn send(&self, payload: &[u8]) -> Result<(), PrintError> {
        self.lock().await.send(payload).await
    }

    /// Take exclusive ownership of the connection.
    ///
    /// Waits for any in-flight print to finish.
    pub async fn lock(&self) -> ConnectionGuard<'_> {
        ConnectionGuard {
            slot: self.slot.lock().await,
        }
    }
}

/// Exclusive access to the active connection.
pub struct ConnectionGuard<'a> {
    slot: MutexGuard<'a, Slot>,
}

impl ConnectionGuard<'_> {
    pub fn is_connected(&self) -> bool {
        self.slot.is_connected()
    }

    pub fn kind(&self) -> ConnectionKind {
        self.slot.kind()
    }

    pub fn device_name(&self) -> String {
        self.slot.device_name()
    }

    /// Deliver a payload through the active transport.
    ///
    /// A transport failure leaves the connection not-ready until the caller
    /// connects again.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), PrintError> {
        if !self.slot.is_connected() {
            return Err(PrintError::NotConnected);
        }
        let Some(transport) = self.slot.transport.as_mut() else {
            return Err(PrintError::NotConnected);
        };

        let result = transport.send(payload).await;
        if let Err(e) = &result {
            warn!("Send failed, connection no longer ready: {}", e);
            self.slot.ready = false;
        }
        result
    }
}

// ============================================================================
// TESTS
// ============================================================================
