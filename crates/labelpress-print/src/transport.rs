// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport adapters: one uniform search/send contract over three very
// different native channels.
//
//   - `NativeTransport`   vendor SDK request/response (Wi-Fi, classic BT)
//   - `BluetoothGate`     asks for OS Bluetooth permission before any
//                         classic-Bluetooth call
//   - `BleTransport`      stateful BLE scan (NotStarted → Scanning →
//                         Done | Error) plus chunked characteristic writes
//
// Adapters must not be driven concurrently for the same transport; the
// discovery service holds the single in-flight token that guarantees it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use labelpress_bridge::{BleCentral, BlePeripheral, BluetoothPermissions, NativePrinterModule, PlatformBridge};
use labelpress_core::error::{LabelpressError, Result};
use labelpress_core::types::{Connection, DiscoveredPrinter, DiscoveryState, PrinterConfig, PrinterExtra};

use crate::lock;

/// Config key the native SDKs read the target model from.
const MODEL_NAME_KEY: &str = "modelName";

/// Default bytes per BLE write (185-byte MTU minus the 3-byte ATT header).
pub const DEFAULT_BLE_CHUNK_SIZE: usize = 182;

/// Uniform contract every transport strategy implements.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Enumerate printers.  An empty list is "none found", not an error.
    async fn search(&self, config: &PrinterConfig) -> Result<Vec<DiscoveredPrinter>>;

    /// Deliver a rendered payload.  Returns confirmation lines.
    async fn send(
        &self,
        config: &PrinterConfig,
        printer: &DiscoveredPrinter,
        payload: &str,
    ) -> Result<Vec<String>>;

    /// Forget anything remembered from earlier searches.  Called when the
    /// printer config or location changes.
    fn reset(&self) {}
}

// ---------------------------------------------------------------------------
// Native SDK (Wi-Fi / classic Bluetooth)
// ---------------------------------------------------------------------------

/// Single request/response calls into the vendor SDK.
pub struct NativeTransport {
    module: Arc<dyn NativePrinterModule>,
}

impl NativeTransport {
    pub fn new(module: Arc<dyn NativePrinterModule>) -> Self {
        Self { module }
    }
}

#[async_trait]
impl Transport for NativeTransport {
    async fn search(&self, config: &PrinterConfig) -> Result<Vec<DiscoveredPrinter>> {
        let printers = self.module.search(config).await?;
        debug!(config = %config, count = printers.len(), "native search finished");
        Ok(printers)
    }

    async fn send(
        &self,
        config: &PrinterConfig,
        printer: &DiscoveredPrinter,
        payload: &str,
    ) -> Result<Vec<String>> {
        let mut call_config = config.clone();
        call_config
            .extra
            .insert(MODEL_NAME_KEY.to_owned(), printer.name.clone());
        self.module
            .print_label(&call_config, &printer.id, payload)
            .await
    }
}

// ---------------------------------------------------------------------------
// Bluetooth permission gate
// ---------------------------------------------------------------------------

/// Wraps a transport so classic-Bluetooth calls first obtain OS permission.
///
/// Wi-Fi and BLE configs pass straight through.  A refused or failed prompt
/// aborts with `PermissionDenied` without touching the inner transport.
pub struct BluetoothGate<T> {
    inner: T,
    permissions: Arc<dyn BluetoothPermissions>,
}

impl<T: Transport> BluetoothGate<T> {
    pub fn new(inner: T, permissions: Arc<dyn BluetoothPermissions>) -> Self {
        Self { inner, permissions }
    }

    async fn ensure_permission(&self, config: &PrinterConfig) -> Result<()> {
        if config.connection != Connection::Bluetooth {
            return Ok(());
        }
        match self.permissions.request_bluetooth().await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(config = %config, "bluetooth permission refused");
                Err(LabelpressError::PermissionDenied)
            }
            Err(e) => {
                warn!(config = %config, error = %e, "bluetooth permission request failed");
                Err(LabelpressError::PermissionDenied)
            }
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for BluetoothGate<T> {
    async fn search(&self, config: &PrinterConfig) -> Result<Vec<DiscoveredPrinter>> {
        self.ensure_permission(config).await?;
        self.inner.search(config).await
    }

    async fn send(
        &self,
        config: &PrinterConfig,
        printer: &DiscoveredPrinter,
        payload: &str,
    ) -> Result<Vec<String>> {
        self.ensure_permission(config).await?;
        self.inner.send(config, printer, payload).await
    }

    fn reset(&self) {
        self.inner.reset();
    }
}

// ---------------------------------------------------------------------------
// BLE
// ---------------------------------------------------------------------------

/// BLE scan state machine plus the printers seen so far.
///
/// Printers accumulate across the scan and are not cleared between scans;
/// a peripheral seen again replaces its earlier entry.  `reset` starts a new
/// epoch: the list is emptied and peripherals still arriving from a scan
/// begun before it are ignored.
pub struct BleTransport {
    central: Arc<dyn BleCentral>,
    chunk_size: usize,
    status: watch::Sender<DiscoveryState>,
    printers: Mutex<Vec<DiscoveredPrinter>>,
    epoch: AtomicU64,
}

impl BleTransport {
    pub fn new(central: Arc<dyn BleCentral>, chunk_size: usize) -> Self {
        let (status, _) = watch::channel(DiscoveryState::NotStarted);
        Self {
            central,
            chunk_size: chunk_size.max(1),
            status,
            printers: Mutex::new(Vec::new()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Watch scan state transitions.
    pub fn subscribe(&self) -> watch::Receiver<DiscoveryState> {
        self.status.subscribe()
    }

    pub fn state(&self) -> DiscoveryState {
        *self.status.borrow()
    }

    /// Printers accumulated so far.
    pub fn printers(&self) -> Vec<DiscoveredPrinter> {
        lock(&self.printers).clone()
    }

    /// Atomically move to `next` if the transition is legal.
    fn transition(&self, next: DiscoveryState) -> bool {
        self.status.send_if_modified(|current| {
            let legal = matches!(
                (*current, next),
                (
                    DiscoveryState::NotStarted | DiscoveryState::Done | DiscoveryState::Error,
                    DiscoveryState::Scanning
                ) | (
                    DiscoveryState::Scanning,
                    DiscoveryState::Done | DiscoveryState::Error
                )
            );
            if legal {
                *current = next;
            }
            legal
        })
    }

    fn record(&self, epoch: u64, peripheral: BlePeripheral) {
        let mut printers = lock(&self.printers);
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(id = %peripheral.id, "BLE peripheral from a reset scan ignored");
            return;
        }
        let printer = DiscoveredPrinter {
            name: peripheral.name.unwrap_or_else(|| peripheral.id.clone()),
            id: peripheral.id,
            extra: PrinterExtra::Ble {
                service_uuid: peripheral.service_uuid,
                write_characteristic: peripheral.write_characteristic,
            },
        };
        debug!(id = %printer.id, name = %printer.name, "BLE printer seen");
        match printers.iter_mut().find(|p| p.id == printer.id) {
            Some(existing) => *existing = printer,
            None => printers.push(printer),
        }
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn search(&self, _config: &PrinterConfig) -> Result<Vec<DiscoveredPrinter>> {
        if !self.transition(DiscoveryState::Scanning) {
            return Err(LabelpressError::AlreadySearching);
        }
        let epoch = self.epoch.load(Ordering::SeqCst);
        info!("BLE scan started");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let scan = self.central.scan(tx);
        tokio::pin!(scan);

        let result = loop {
            tokio::select! {
                result = &mut scan => break result,
                Some(peripheral) = rx.recv() => self.record(epoch, peripheral),
            }
        };
        while let Ok(peripheral) = rx.try_recv() {
            self.record(epoch, peripheral);
        }

        match result {
            Ok(()) => {
                self.transition(DiscoveryState::Done);
                let printers = self.printers();
                info!(count = printers.len(), "BLE scan done");
                Ok(printers)
            }
            Err(e) => {
                self.transition(DiscoveryState::Error);
                warn!(error = %e, "BLE scan failed");
                Err(e)
            }
        }
    }

    async fn send(
        &self,
        _config: &PrinterConfig,
        printer: &DiscoveredPrinter,
        payload: &str,
    ) -> Result<Vec<String>> {
        let characteristic = match &printer.extra {
            PrinterExtra::Ble {
                write_characteristic: Some(characteristic),
                ..
            } => characteristic,
            _ => {
                return Err(LabelpressError::Bridge(format!(
                    "printer {} has no writable characteristic",
                    printer.name
                )));
            }
        };

        let bytes = payload.as_bytes();
        for chunk in bytes.chunks(self.chunk_size) {
            self.central.write(&printer.id, characteristic, chunk).await?;
        }
        debug!(printer = %printer.name, bytes = bytes.len(), "BLE payload written");
        Ok(vec![format!("Sent {} bytes to {}", bytes.len(), printer.name)])
    }

    fn reset(&self) {
        let mut printers = lock(&self.printers);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let dropped = printers.len();
        printers.clear();
        self.status.send_if_modified(|current| {
            let idle = *current != DiscoveryState::Scanning;
            if idle {
                *current = DiscoveryState::NotStarted;
            }
            idle
        });
        debug!(dropped, "BLE printer list reset");
    }
}

// ---------------------------------------------------------------------------
// Transport set
// ---------------------------------------------------------------------------

/// The two physical paths a session can print over.
#[derive(Clone)]
pub struct Transports {
    native: Arc<dyn Transport>,
    ble: Arc<dyn Transport>,
}

impl Transports {
    pub fn new(native: Arc<dyn Transport>, ble: Arc<dyn Transport>) -> Self {
        Self { native, ble }
    }

    /// Wire the standard strategies over a platform bridge.
    pub fn from_bridge(bridge: Arc<dyn PlatformBridge>, ble_chunk_size: usize) -> Self {
        let native = BluetoothGate::new(
            NativeTransport::new(bridge.clone() as Arc<dyn NativePrinterModule>),
            bridge.clone() as Arc<dyn BluetoothPermissions>,
        );
        let ble = BleTransport::new(bridge as Arc<dyn BleCentral>, ble_chunk_size);
        Self::new(Arc::new(native), Arc::new(ble))
    }

    /// Reset both paths.
    pub fn reset(&self) {
        self.native.reset();
        self.ble.reset();
    }

    /// Transport that serves a connection type.
    pub fn for_connection(&self, connection: Connection) -> Arc<dyn Transport> {
        match connection {
            Connection::Ble => Arc::clone(&self.ble),
            Connection::Wifi | Connection::Bluetooth => Arc::clone(&self.native),
        }
    }
}
