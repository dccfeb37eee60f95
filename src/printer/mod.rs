//! # Printer Module
//!
//! This module provides paper and print-run configuration.
//!
//! ## Modules
//!
//! - [`config`]: Paper widths and tunable settings

pub mod config;

pub use config::{BluetoothSettings, PaperWidth, PrintSettings, UsbSettings};
