// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native printer capabilities.
//
// Each transport family is its own trait so the print engine can take exactly
// the capability a strategy needs.  Implementations may suspend for as long
// as the hardware takes; timeouts are owned by the native side.

use async_trait::async_trait;
use tokio::sync::mpsc;

use labelpress_core::error::Result;
use labelpress_core::types::{DiscoveredPrinter, PrinterConfig};

/// Unified bridge that groups all native capabilities.
pub trait PlatformBridge: NativePrinterModule + BleCentral + BluetoothPermissions {
    /// Human-readable platform name (e.g. "iOS 17", "Android 14").
    fn platform_name(&self) -> &str;
}

/// Vendor SDK search + print over Wi-Fi or classic Bluetooth.
#[async_trait]
pub trait NativePrinterModule: Send + Sync {
    /// Enumerate printers for the configured brand and connection.
    ///
    /// An empty list means "no printers found", not an error.
    async fn search(&self, config: &PrinterConfig) -> Result<Vec<DiscoveredPrinter>>;

    /// Send label data to one printer.
    ///
    /// Returns human-readable confirmation lines, or a
    /// `LabelpressError::Transport { code, message }` rejection.
    async fn print_label(
        &self,
        config: &PrinterConfig,
        printer_id: &str,
        data: &str,
    ) -> Result<Vec<String>>;
}

/// Bluetooth Low Energy central used for BLE label printers.
#[async_trait]
pub trait BleCentral: Send + Sync {
    /// Scan for printer peripherals, pushing each one into `found` as it is
    /// seen.  Returns when the scan window closes.  Radio or permission
    /// failures are returned as errors.
    async fn scan(&self, found: mpsc::UnboundedSender<BlePeripheral>) -> Result<()>;

    /// Write one chunk to a characteristic of a peripheral.
    async fn write(&self, peripheral_id: &str, characteristic: &str, chunk: &[u8]) -> Result<()>;
}

/// OS-level permission prompts.
#[async_trait]
pub trait BluetoothPermissions: Send + Sync {
    /// Ask for Bluetooth access.  `Ok(false)` means the user refused.
    async fn request_bluetooth(&self) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Info structs
// ---------------------------------------------------------------------------

/// A BLE peripheral advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlePeripheral {
    pub id: String,
    pub name: Option<String>,
    pub service_uuid: Option<String>,
    /// Characteristic that accepts label data, once services are resolved.
    pub write_characteristic: Option<String>,
}
