//! # Print Orchestrator
//!
//! Runs one print from pixel surface to printer:
//!
//! ```text
//! Idle ──► Rasterizing ──► Encoding ──► Sending ──► Done
//!   │           │              │           │
//!   └───────────┴──────────────┴───────────┴──► Failed
//! ```
//!
//! The connection is checked before any work is done. Rasterizing and
//! encoding are synchronous. The whole payload then goes to the transport in
//! one `send` while the connection is held exclusively. Errors are returned
//! unchanged and nothing is retried.

use std::fmt;

use log::{debug, info, warn};

use crate::connection::PrinterConnection;
use crate::error::PrintError;
use crate::printer::PaperWidth;
use crate::protocol::encode;
use crate::render::{PixelSurface, rasterize};
use crate::transport::ConnectionKind;

/// Where a print currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStage {
    Idle,
    Rasterizing,
    Encoding,
    Sending,
    Done,
    Failed,
}

impl fmt::Display for PrintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Rasterizing => "rasterizing",
            Self::Encoding => "encoding",
            Self::Sending => "sending",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a completed print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintReport {
    pub device_name: String,
    pub kind: ConnectionKind,
    /// Bitmap width in dots
    pub width: u16,
    /// Bitmap height in dots
    pub height: u16,
    /// Payload length delivered to the transport
    pub bytes_sent: usize,
}

/// Print `surface` at `paper` width on the active connection.
pub async fn print(
    surface: &PixelSurface<'_>,
    paper: PaperWidth,
    connection: &PrinterConnection,
) -> Result<PrintReport, PrintError> {
    print_with_progress(surface, paper, connection, |_| {}).await
}

/// Like [`print`], calling `on_stage` on every state transition.
///
/// The callback sees `Rasterizing`, `Encoding`, `Sending` and then either
/// `Done` or `Failed`. A print rejected because nothing is connected goes
/// straight from `Idle` to `Failed`.
pub async fn print_with_progress<F>(
    surface: &PixelSurface<'_>,
    paper: PaperWidth,
    connection: &PrinterConnection,
    mut on_stage: F,
) -> Result<PrintReport, PrintError>
where
    F: FnMut(PrintStage) + Send,
{
    let mut stage = PrintStage::Idle;
    let mut advance = |next: PrintStage| {
        debug!("Print {} -> {}", stage, next);
        stage = next;
        on_stage(next);
    };

    let mut guard = connection.lock().await;
    if !guard.is_connected() {
        advance(PrintStage::Failed);
        return Err(PrintError::NotConnected);
    }

    advance(PrintStage::Rasterizing);
    let bitmap = match rasterize(surface, paper) {
        Ok(bitmap) => bitmap,
        Err(e) => {
            advance(PrintStage::Failed);
            return Err(e);
        }
    };

    advance(PrintStage::Encoding);
    let payload = encode(&bitmap);

    advance(PrintStage::Sending);
    info!(
        "Printing {}x{} ({} bytes) to {}",
        bitmap.width(),
        bitmap.height(),
        payload.len(),
        guard.device_name()
    );

    let report = PrintReport {
        device_name: guard.device_name(),
        kind: guard.kind(),
        width: bitmap.width(),
        height: bitmap.height(),
        bytes_sent: payload.len(),
    };

    match guard.send(payload.as_bytes()).await {
        Ok(()) => {
            advance(PrintStage::Done);
            Ok(report)
        }
        Err(e) => {
            warn!("Print failed while sending: {}", e);
            advance(PrintStage::Failed);
            Err(e)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
