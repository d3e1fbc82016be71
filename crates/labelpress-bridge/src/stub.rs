// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where native printer SDKs are unavailable.
//
// Every trait method returns `PlatformUnavailable`.

use async_trait::async_trait;
use tokio::sync::mpsc;

use labelpress_core::error::{LabelpressError, Result};
use labelpress_core::types::{DiscoveredPrinter, PrinterConfig};

use crate::traits::*;

/// No-op bridge returned when the host injects nothing.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

#[async_trait]
impl NativePrinterModule for StubBridge {
    async fn search(&self, config: &PrinterConfig) -> Result<Vec<DiscoveredPrinter>> {
        tracing::warn!(config = %config, "NativePrinterModule::search called on stub bridge");
        Err(LabelpressError::PlatformUnavailable)
    }

    async fn print_label(
        &self,
        _config: &PrinterConfig,
        _printer_id: &str,
        _data: &str,
    ) -> Result<Vec<String>> {
        tracing::warn!("NativePrinterModule::print_label called on stub bridge");
        Err(LabelpressError::PlatformUnavailable)
    }
}

#[async_trait]
impl BleCentral for StubBridge {
    async fn scan(&self, _found: mpsc::UnboundedSender<BlePeripheral>) -> Result<()> {
        tracing::warn!("BleCentral::scan called on stub bridge");
        Err(LabelpressError::PlatformUnavailable)
    }

    async fn write(&self, _peripheral_id: &str, _characteristic: &str, _chunk: &[u8]) -> Result<()> {
        Err(LabelpressError::PlatformUnavailable)
    }
}

#[async_trait]
impl BluetoothPermissions for StubBridge {
    async fn request_bluetooth(&self) -> Result<bool> {
        tracing::warn!("BluetoothPermissions::request_bluetooth called on stub bridge");
        Err(LabelpressError::PlatformUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelpress_core::types::{Connection, PrinterBrand};

    #[tokio::test]
    async fn stub_reports_platform_unavailable() {
        let bridge = StubBridge;
        let config = PrinterConfig::new(PrinterBrand::Zebra, Connection::Wifi);
        assert!(matches!(
            bridge.search(&config).await,
            Err(LabelpressError::PlatformUnavailable)
        ));
        assert!(matches!(
            bridge.request_bluetooth().await,
            Err(LabelpressError::PlatformUnavailable)
        ));
        assert_eq!(bridge.platform_name(), "Desktop (stub)");
    }
}
