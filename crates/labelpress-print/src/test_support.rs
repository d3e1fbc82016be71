// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hand-written mocks shared by the unit tests in this crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use labelpress_bridge::{BleCentral, BlePeripheral, BluetoothPermissions, NativePrinterModule};
use labelpress_core::error::{LabelpressError, Result};
use labelpress_core::types::{DiscoveredPrinter, PrintRecordPayload, PrinterConfig};

use crate::lock;
use crate::remote::{BookkeepingClient, LocationSettingsClient};
use crate::transport::{Transport, Transports};

// ---------------------------------------------------------------------------
// Native SDK
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockNative {
    printers: Vec<DiscoveredPrinter>,
    search_calls: AtomicUsize,
    sent: Mutex<Vec<(PrinterConfig, String, String)>>,
}

impl MockNative {
    pub fn with_printers(printers: Vec<DiscoveredPrinter>) -> Self {
        Self {
            printers,
            ..Self::default()
        }
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(PrinterConfig, String, String)> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl NativePrinterModule for MockNative {
    async fn search(&self, _config: &PrinterConfig) -> Result<Vec<DiscoveredPrinter>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.printers.clone())
    }

    async fn print_label(
        &self,
        config: &PrinterConfig,
        printer_id: &str,
        data: &str,
    ) -> Result<Vec<String>> {
        lock(&self.sent).push((config.clone(), printer_id.to_owned(), data.to_owned()));
        Ok(vec![format!("printed on {printer_id}")])
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

pub struct MockPermissions {
    granted: bool,
    prompts: AtomicUsize,
}

impl MockPermissions {
    pub fn granted() -> Self {
        Self {
            granted: true,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn denied() -> Self {
        Self {
            granted: false,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BluetoothPermissions for MockPermissions {
    async fn request_bluetooth(&self) -> Result<bool> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(self.granted)
    }
}

// ---------------------------------------------------------------------------
// BLE central
// ---------------------------------------------------------------------------

pub struct MockCentral {
    peripherals: Mutex<Vec<BlePeripheral>>,
    failing: AtomicBool,
    writes: Mutex<Vec<Vec<u8>>>,
}

impl MockCentral {
    pub fn new(peripherals: Vec<BlePeripheral>) -> Self {
        Self {
            peripherals: Mutex::new(peripherals),
            failing: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        let central = Self::new(Vec::new());
        central.set_failing(true);
        central
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn peripheral(id: &str, name: &str) -> BlePeripheral {
        BlePeripheral {
            id: id.to_owned(),
            name: Some(name.to_owned()),
            service_uuid: Some("38eb4a80-c570-11e3-9507-0002a5d5c51b".to_owned()),
            write_characteristic: Some("38eb4a82-c570-11e3-9507-0002a5d5c51b".to_owned()),
        }
    }

    pub fn set_peripherals(&self, peripherals: Vec<BlePeripheral>) {
        *lock(&self.peripherals) = peripherals;
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.writes).clone()
    }
}

#[async_trait]
impl BleCentral for MockCentral {
    async fn scan(&self, found: mpsc::UnboundedSender<BlePeripheral>) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LabelpressError::Bridge("bluetooth radio is off".into()));
        }
        let peripherals = lock(&self.peripherals).clone();
        for peripheral in peripherals {
            let _ = found.send(peripheral);
        }
        Ok(())
    }

    async fn write(&self, _peripheral_id: &str, _characteristic: &str, chunk: &[u8]) -> Result<()> {
        lock(&self.writes).push(chunk.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Transport double with an invocation counter and an ordered send log.
#[derive(Default)]
pub struct MockTransport {
    printers: Mutex<Vec<DiscoveredPrinter>>,
    search_delay: Option<Duration>,
    search_error: Option<i32>,
    search_panics: bool,
    search_calls: AtomicUsize,
    sends: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    pub fn with_printers(printers: Vec<DiscoveredPrinter>) -> Self {
        Self {
            printers: Mutex::new(printers),
            ..Self::default()
        }
    }

    /// Make every search take a while so concurrent callers overlap.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    pub fn failing_search(mut self, code: i32) -> Self {
        self.search_error = Some(code);
        self
    }

    /// Make every search panic, as a crashing native call would.
    pub fn panicking(mut self) -> Self {
        self.search_panics = true;
        self
    }

    pub fn set_printers(&self, printers: Vec<DiscoveredPrinter>) {
        *lock(&self.printers) = printers;
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// `(printer id, payload)` per send, in call order.
    pub fn sends(&self) -> Vec<(String, String)> {
        lock(&self.sends).clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn search(&self, _config: &PrinterConfig) -> Result<Vec<DiscoveredPrinter>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }
        if self.search_panics {
            panic!("native search crashed");
        }
        if let Some(code) = self.search_error {
            return Err(LabelpressError::transport(code, "mock search failure"));
        }
        Ok(lock(&self.printers).clone())
    }

    async fn send(
        &self,
        _config: &PrinterConfig,
        printer: &DiscoveredPrinter,
        payload: &str,
    ) -> Result<Vec<String>> {
        lock(&self.sends).push((printer.id.clone(), payload.to_owned()));
        Ok(vec![format!("Printed on {}", printer.name)])
    }
}

/// Serve both physical paths from the same mock.
pub fn transports(mock: &Arc<MockTransport>) -> Transports {
    Transports::new(mock.clone(), mock.clone())
}

// ---------------------------------------------------------------------------
// Remote collaborators
// ---------------------------------------------------------------------------

/// Bookkeeping client that replays scripted responses, then answers 200.
#[derive(Default)]
pub struct MockBookkeeping {
    responses: Mutex<VecDeque<Result<u16>>>,
    calls: Mutex<Vec<PrintRecordPayload>>,
    on_call: Option<Box<dyn Fn(usize) + Send + Sync>>,
}

impl MockBookkeeping {
    pub fn scripted(responses: Vec<Result<u16>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    /// Run `hook` with the 1-based call number after each submission.
    pub fn on_call(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<PrintRecordPayload> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl BookkeepingClient for MockBookkeeping {
    async fn record_prints(&self, payload: &PrintRecordPayload) -> Result<u16> {
        let number = {
            let mut calls = lock(&self.calls);
            calls.push(payload.clone());
            calls.len()
        };
        let response = lock(&self.responses).pop_front().unwrap_or(Ok(200));
        if let Some(hook) = &self.on_call {
            hook(number);
        }
        response
    }
}

pub struct MockLocationSettings {
    status: u16,
    calls: AtomicUsize,
}

impl MockLocationSettings {
    pub fn answering(status: u16) -> Self {
        Self {
            status,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationSettingsClient for MockLocationSettings {
    async fn update_printer_config(&self, _location_id: i64, _config: &PrinterConfig) -> Result<u16> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.status)
    }
}
