// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelpress Print — printer discovery across Wi-Fi, classic Bluetooth, and
// BLE, template selection, label rendering, print dispatch, and the offline
// bookkeeping queue.  This crate sits between the domain types in
// `labelpress-core` and the native printer SDKs behind `labelpress-bridge`.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod cart;
pub mod discovery;
pub mod dispatch;
pub mod notice;
pub mod offline;
pub mod remote;
pub mod render;
pub mod session;
pub mod store;
pub mod template;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use cart::PrintCart;
pub use discovery::{DiscoveryService, SearchReport};
pub use dispatch::{BatchReport, PrintDispatcher};
pub use notice::SessionNotice;
pub use offline::{DrainReport, OfflineQueue};
pub use render::LabelRenderer;
pub use session::PrinterSession;
pub use store::{QueueStore, SqliteQueueStore};
pub use transport::{Transport, Transports};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
