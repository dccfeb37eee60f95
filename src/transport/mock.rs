//! # Mock Transport
//!
//! An in-memory [`PrinterTransport`] that records every chunk it is handed.
//! It runs the same [`write_paced`] loop as the real backends, so chunk
//! boundaries, pauses and abort-on-failure behave identically.
//!
//! ```
//! use thermoprint::transport::{ConnectionKind, MockTransport, Pacing, PrinterTransport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut transport = MockTransport::new(ConnectionKind::Usb, Pacing::USB);
//! let log = transport.log();
//!
//! transport.connect().await.unwrap();
//! transport.send(&[0u8; 100]).await.unwrap();
//!
//! assert_eq!(log.lock().unwrap().writes.len(), 2); // 64 + 36
//! # }
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ChunkSink, ConnectionKind, Pacing, PrinterTransport, write_paced};
use crate::error::PrintError;

/// Everything a [`MockTransport`] has seen.
#[derive(Debug, Default, Clone)]
pub struct MockLog {
    /// Chunks successfully written, in order
    pub writes: Vec<Vec<u8>>,
    /// Chunk writes attempted, including a failed one
    pub attempts: usize,
    /// Completed `send` calls
    pub sends: usize,
    pub connects: usize,
    pub disconnects: usize,
}

impl MockLog {
    /// All successfully written bytes concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.writes.concat()
    }
}

/// Recording transport for tests and dry runs.
pub struct MockTransport {
    kind: ConnectionKind,
    name: String,
    pacing: Pacing,
    connected: bool,
    refuse_connect: bool,
    fail_on_write: Option<usize>,
    log: Arc<Mutex<MockLog>>,
}

impl MockTransport {
    /// A mock that reports itself as `kind` and chunks like `pacing`.
    pub fn new(kind: ConnectionKind, pacing: Pacing) -> Self {
        Self {
            kind,
            name: "Mock Printer".to_string(),
            pacing,
            connected: false,
            refuse_connect: false,
            fail_on_write: None,
            log: Arc::new(Mutex::new(MockLog::default())),
        }
    }

    pub fn bluetooth() -> Self {
        Self::new(ConnectionKind::Bluetooth, Pacing::BLUETOOTH)
    }

    pub fn usb() -> Self {
        Self::new(ConnectionKind::Usb, Pacing::USB)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Make the `n`th chunk write (1-based, counted across all sends) fail.
    pub fn fail_on_write(mut self, n: usize) -> Self {
        self.fail_on_write = Some(n);
        self
    }

    /// Make `connect` fail with a connection error.
    pub fn refuse_connect(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    /// Shared handle to the recording; stays valid after the transport is
    /// boxed or dropped.
    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        Arc::clone(&self.log)
    }
}

struct MockSink<'a> {
    log: &'a Mutex<MockLog>,
    fail_on_write: Option<usize>,
}

#[async_trait]
impl ChunkSink for MockSink<'_> {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), String> {
        let mut log = self.log.lock().map_err(|e| e.to_string())?;
        log.attempts += 1;
        if self.fail_on_write == Some(log.attempts) {
            return Err(format!("simulated failure on write {}", log.attempts));
        }
        log.writes.push(chunk.to_vec());
        Ok(())
    }
}

#[async_trait]
impl PrinterTransport for MockTransport {
    fn kind(&self) -> ConnectionKind {
        self.kind
    }

    async fn connect(&mut self) -> Result<String, PrintError> {
        if self.refuse_connect {
            return Err(PrintError::Connection("No printer selected".to_string()));
        }
        self.connected = true;
        if let Ok(mut log) = self.log.lock() {
            log.connects += 1;
        }
        Ok(self.name.clone())
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), PrintError> {
        if !self.connected {
            return Err(PrintError::NotConnected);
        }

        let mut sink = MockSink {
            log: &self.log,
            fail_on_write: self.fail_on_write,
        };
        let result = write_paced(&mut sink, payload, &self.pacing).await;
        if result.is_err() {
            self.connected = false;
        }
        result?;

        if let Ok(mut log) = self.log.lock() {
            log.sends += 1;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> Result<(), PrintError> {
        if self.connected {
            self.connected = false;
            if let Ok(mut log) = self.log.lock() {
                log.disconnects += 1;
            }
        }
        Ok(())
    }
}
