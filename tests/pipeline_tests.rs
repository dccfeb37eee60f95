//! # Pipeline Tests
//!
//! End-to-end checks of surface → bitmap → payload → transport through the
//! public API, using [`MockTransport`] in place of real hardware.
//!
//! ## Test Coverage
//!
//! - **Framing**: exact payload bytes for a known bitmap size
//! - **Chunking**: BLE and USB write counts and pacing pauses
//! - **Failures**: mid-stream transport error, missing connection
//! - **Determinism**: identical input yields identical bytes

use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::time::Instant;

use thermoprint::connection::PrinterConnection;
use thermoprint::print::{PrintStage, print, print_with_progress};
use thermoprint::printer::PaperWidth;
use thermoprint::protocol::encode;
use thermoprint::render::{PixelFormat, PixelSurface, rasterize};
use thermoprint::transport::{ConnectionKind, MockTransport, Pacing};
use thermoprint::PrintError;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// RGBA horizontal gradient, black on the left to white on the right.
fn gradient(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _y in 0..height {
        for x in 0..width {
            let v = (x * 255 / (width - 1).max(1)) as u8;
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    data
}

async fn connected(transport: MockTransport) -> PrinterConnection {
    let connection = PrinterConnection::new();
    connection
        .connect(Box::new(transport))
        .await
        .expect("mock connect");
    connection
}

// ============================================================================
// FRAMING
// ============================================================================

#[test]
fn test_gradient_payload_framing() {
    // 192x50 doubles to 384x100
    let data = gradient(192, 50);
    let surface = PixelSurface::new(192, 50, PixelFormat::Rgba, &data).unwrap();

    let bitmap = rasterize(&surface, PaperWidth::Mm58).unwrap();
    assert_eq!((bitmap.width(), bitmap.height()), (384, 100));

    let payload = encode(&bitmap);
    let bytes = payload.as_bytes();
    assert_eq!(bytes.len(), 4816);
    assert_eq!(&bytes[..10], &[0x1B, 0x40, 0x1D, 0x76, 0x30, 0x00, 48, 0, 100, 0]);
    assert_eq!(&bytes[4810..], &[0x0A, 0x0A, 0x0A, 0x1D, 0x56, 0x00]);

    // Left edge is black, right edge is white on every row
    for row in bytes[10..4810].chunks(48) {
        assert_eq!(row[0] & 0x80, 0x80);
        assert_eq!(row[47] & 0x01, 0x00);
    }
}

#[test]
fn test_pipeline_is_deterministic() {
    let data = gradient(333, 97);
    let surface = PixelSurface::new(333, 97, PixelFormat::Rgba, &data).unwrap();

    let first = encode(&rasterize(&surface, PaperWidth::Mm80).unwrap());
    let second = encode(&rasterize(&surface, PaperWidth::Mm80).unwrap());
    assert_eq!(first, second);
    assert_eq!(first.width_bytes(), 72);
    assert_eq!(first.height(), 97 * 576 / 333);
}

// ============================================================================
// DELIVERY
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_ble_print_chunks_and_pauses() {
    let data = gradient(192, 50);
    let surface = PixelSurface::new(192, 50, PixelFormat::Rgba, &data).unwrap();
    let expected = encode(&rasterize(&surface, PaperWidth::Mm58).unwrap());

    let transport = MockTransport::bluetooth();
    let log = transport.log();
    let connection = connected(transport).await;

    let start = Instant::now();
    let report = print(&surface, PaperWidth::Mm58, &connection).await.unwrap();

    assert_eq!(report.bytes_sent, 4816);
    assert_eq!(report.kind, ConnectionKind::Bluetooth);

    let log = log.lock().unwrap();
    assert_eq!(log.writes.len(), 241);
    assert_eq!(log.bytes(), expected.as_bytes());

    // One 15ms pause per chunk starting at 0, 400, ..., 4800
    let pauses = Pacing::BLUETOOTH.pause_offsets(4816).len();
    assert_eq!(pauses, 13);
    assert_eq!(start.elapsed(), Duration::from_millis(15) * pauses as u32);
}

#[tokio::test]
async fn test_usb_print_chunks() {
    let data = gradient(192, 50);
    let surface = PixelSurface::new(192, 50, PixelFormat::Rgba, &data).unwrap();

    let transport = MockTransport::usb();
    let log = transport.log();
    let connection = connected(transport).await;

    let start = Instant::now();
    print(&surface, PaperWidth::Mm58, &connection).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));

    let log = log.lock().unwrap();
    let sizes: Vec<usize> = log.writes.iter().map(Vec::len).collect();
    assert_eq!(sizes.len(), 76);
    assert!(sizes[..75].iter().all(|&n| n == 64));
    assert_eq!(sizes[75], 4816 - 75 * 64);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_stops_at_failed_chunk() {
    let data = gradient(192, 50);
    let surface = PixelSurface::new(192, 50, PixelFormat::Rgba, &data).unwrap();

    let transport = MockTransport::bluetooth().fail_on_write(120);
    let log = transport.log();
    let connection = connected(transport).await;

    let mut stages = Vec::new();
    let err = print_with_progress(&surface, PaperWidth::Mm58, &connection, |s| {
        stages.push(s)
    })
    .await
    .unwrap_err();

    match err {
        PrintError::Transport { offset, total, .. } => {
            assert_eq!(offset, 119 * 20);
            assert_eq!(total, 4816);
        }
        other => panic!("expected transport error, got {:?}", other),
    }
    assert_eq!(stages.last(), Some(&PrintStage::Failed));

    // Chunks 121..=241 are never attempted
    {
        let log = log.lock().unwrap();
        assert_eq!(log.attempts, 120);
        assert_eq!(log.writes.len(), 119);
    }

    // The connection is no longer ready; the next print fails fast
    assert!(!connection.is_connected().await);
    assert!(matches!(
        print(&surface, PaperWidth::Mm58, &connection).await,
        Err(PrintError::NotConnected)
    ));
    assert_eq!(log.lock().unwrap().attempts, 120);
}

#[tokio::test]
async fn test_print_without_connection() {
    // A surface whose rasterization would fail: if the connection check
    // did not come first this would be an InvalidInput error instead
    let data = vec![255u8; 3 * 70_000];
    let surface = PixelSurface::new(1, 70_000, PixelFormat::Rgb, &data).unwrap();
    let connection = PrinterConnection::new();

    let mut stages = Vec::new();
    let result = print_with_progress(&surface, PaperWidth::Mm58, &connection, |s| {
        stages.push(s)
    })
    .await;

    assert!(matches!(result, Err(PrintError::NotConnected)));
    assert!(!stages.contains(&PrintStage::Rasterizing));
    assert_eq!(connection.device_name().await, "Not Connected");
}

#[tokio::test]
async fn test_reconnect_after_failure() {
    let data = gradient(96, 10);
    let surface = PixelSurface::new(96, 10, PixelFormat::Rgba, &data).unwrap();
    let connection = connected(MockTransport::usb().fail_on_write(1)).await;

    assert!(print(&surface, PaperWidth::Mm58, &connection).await.is_err());

    let transport = MockTransport::usb().with_name("Replacement");
    let log = transport.log();
    connection.connect(Box::new(transport)).await.unwrap();

    let report = print(&surface, PaperWidth::Mm58, &connection).await.unwrap();
    assert_eq!(report.device_name, "Replacement");
    assert_eq!(report.height, 40);
    assert_eq!(log.lock().unwrap().bytes().len(), 16 + 48 * 40);
}
