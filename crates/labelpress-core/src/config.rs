// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use serde::{Deserialize, Serialize};

use crate::types::{PrintContext, PrinterConfig};

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Printer configuration of the current location.
    pub location_printer: PrinterConfig,
    /// Label stock size, matched against template criteria as `size`.
    pub label_size: String,
    /// Customer, location, and user the session prints for.
    pub context: PrintContext,
    /// Bytes per BLE characteristic write (MTU minus ATT header).
    pub ble_chunk_size: usize,
    /// File name of the offline bookkeeping queue inside the data directory.
    pub queue_db_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            location_printer: PrinterConfig::default(),
            label_size: "2x1".into(),
            context: PrintContext::default(),
            ble_chunk_size: 182,
            queue_db_file: "offline_queue.db".into(),
        }
    }
}
