// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Presentation-agnostic session events.  The UI subscribes and decides how
// (and in which language) to show each one.

use labelpress_core::human_errors::HumanError;
use labelpress_core::types::{Connection, PrinterConfig};

/// Capacity of the notice broadcast channel.
pub const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    SearchStarted { config: PrinterConfig },
    PrintersFound { count: usize, connection: Connection },
    /// Hint depends on the connection: check the network (Wi-Fi) or the
    /// device (Bluetooth/BLE).
    NoPrintersFound { connection: Connection },
    SearchFailed { error: HumanError },
    Printing { label: String },
    PrintingQueue { count: usize },
    PrintSucceeded { label: String, lines: Vec<String> },
    PrintFailed { label: String, error: HumanError },
    QueueDrained { submitted: usize, remaining: usize },
}
