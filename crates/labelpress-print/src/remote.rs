// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Server calls the engine depends on.  The HTTP client itself belongs to the
// host application; these traits return the response status so the engine
// can apply its own 2xx rule.

use async_trait::async_trait;

use labelpress_core::error::Result;
use labelpress_core::types::{PrintRecordPayload, PrinterConfig};

/// Idempotent "record these prints" endpoint.
#[async_trait]
pub trait BookkeepingClient: Send + Sync {
    /// Submit one queued payload.  `Err` means the request never completed.
    async fn record_prints(&self, payload: &PrintRecordPayload) -> Result<u16>;
}

/// Location-settings endpoint that owns the confirmed printer config.
#[async_trait]
pub trait LocationSettingsClient: Send + Sync {
    async fn update_printer_config(&self, location_id: i64, config: &PrinterConfig) -> Result<u16>;
}

/// 2xx is success; everything else is not.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
