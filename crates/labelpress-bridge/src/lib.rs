// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelpress — Native platform bridge abstractions.
//
// The printer vendor SDKs (Zebra, Brother, Bixolon), the BLE central, and the
// OS permission prompt live on the native side of the app.  This crate
// defines the boundary the print engine consumes and a stub implementation
// for desktop/CI builds.  Mobile hosts implement `PlatformBridge` over their
// own SDK bindings and hand it to the print session.

use std::sync::Arc;

pub mod stub;
pub mod traits;

pub use traits::{BleCentral, BlePeripheral, BluetoothPermissions, NativePrinterModule, PlatformBridge};

/// Bridge used when the host does not inject one.
///
/// RETURNS: the stub bridge, whose every transport call fails with
/// `PlatformUnavailable`.
pub fn platform_bridge() -> Arc<dyn PlatformBridge> {
    Arc::new(stub::StubBridge)
}
