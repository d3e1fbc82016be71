// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer discovery service.
//
// Owns the active printer config (location default unless locally
// overridden), the last discovered printer list, the discovery state, and
// the "user should search" hint.  At most one search runs at a time: the
// in-flight search is held as a shared future, and every `search()` call made
// while it runs joins that same future instead of touching the radio again.
//
// Transport failures never escape this service; callers observe them as
// `DiscoveryState::Error` plus a `SearchFailed` notice.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use labelpress_core::error::{LabelpressError, Result};
use labelpress_core::human_errors::humanize_error;
use labelpress_core::types::{Connection, DiscoveredPrinter, DiscoveryState, PrinterConfig};

use crate::lock;
use crate::notice::{NOTICE_CAPACITY, SessionNotice};
use crate::remote::{LocationSettingsClient, is_success};
use crate::transport::Transports;

type SearchFuture = Shared<BoxFuture<'static, SearchReport>>;

/// What one search produced.  Every caller joined to the same search gets a
/// clone of the same report.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    pub state: DiscoveryState,
    pub printers: Vec<DiscoveredPrinter>,
    pub error: Option<String>,
    /// Stable error code of a failed search.
    pub code: Option<i32>,
    /// The printer config changed while the search ran; its result was
    /// discarded.
    pub stale: bool,
}

impl SearchReport {
    /// The failure as an error carrying the original code, if the search
    /// failed.
    pub fn failure(&self) -> Option<LabelpressError> {
        if self.state != DiscoveryState::Error {
            return None;
        }
        let message = self.error.clone().unwrap_or_else(|| "printer search failed".into());
        Some(LabelpressError::transport(self.code.unwrap_or(0), message))
    }
}

/// Handle to the discovery service.  Clones share the same state.
#[derive(Clone)]
pub struct DiscoveryService {
    shared: Arc<ServiceState>,
}

struct ServiceState {
    transports: Transports,
    location_settings: Option<Arc<dyn LocationSettingsClient>>,
    state: watch::Sender<DiscoveryState>,
    notices: broadcast::Sender<SessionNotice>,
    inner: Mutex<DiscoveryInner>,
}

struct DiscoveryInner {
    location_id: i64,
    location_config: PrinterConfig,
    local_override: Option<PrinterConfig>,
    /// `None` means never searched under the current config.
    printers: Option<Vec<DiscoveredPrinter>>,
    last_search: Option<DateTime<Utc>>,
    user_should_search: bool,
    in_flight: Option<SearchFuture>,
    /// Bumped on every config change; results from older generations are
    /// discarded.
    generation: u64,
}

impl DiscoveryInner {
    fn config(&self) -> PrinterConfig {
        self.local_override
            .clone()
            .unwrap_or_else(|| self.location_config.clone())
    }
}

impl DiscoveryService {
    pub fn new(
        transports: Transports,
        location_id: i64,
        location_config: PrinterConfig,
        location_settings: Option<Arc<dyn LocationSettingsClient>>,
    ) -> Self {
        let (state, _) = watch::channel(DiscoveryState::NotStarted);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            shared: Arc::new(ServiceState {
                transports,
                location_settings,
                state,
                notices,
                inner: Mutex::new(DiscoveryInner {
                    location_id,
                    location_config,
                    local_override: None,
                    printers: None,
                    last_search: None,
                    user_should_search: true,
                    in_flight: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Search for printers on the current config, or join the search that
    /// is already running.
    pub async fn search(&self) -> SearchReport {
        self.start_search().await
    }

    /// Start a search (or return the running one) without awaiting it.
    pub fn start_search(&self) -> SearchFuture {
        let mut inner = lock(&self.shared.inner);
        if let Some(pending) = &inner.in_flight {
            debug!("joining in-flight printer search");
            return pending.clone();
        }

        let config = inner.config();
        if config.connection != Connection::Ble {
            inner.printers = None;
        }
        self.shared.state.send_replace(DiscoveryState::Scanning);
        debug!(
            metric = "printers_search",
            brand = config.brand.as_str(),
            connection = config.connection.as_str(),
            location_id = inner.location_id,
            "printer search started"
        );
        self.notify(SessionNotice::SearchStarted {
            config: config.clone(),
        });

        let generation = inner.generation;
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(run_search(Arc::clone(&shared), config, generation))
                .catch_unwind()
                .await
            {
                Ok(report) => report,
                Err(_) => abandon_search(&shared, generation, "search task panicked"),
            }
        });
        let shared = Arc::clone(&self.shared);
        let search = async move {
            match handle.await {
                Ok(report) => report,
                Err(e) => abandon_search(&shared, generation, &e.to_string()),
            }
        }
        .boxed()
        .shared();

        inner.in_flight = Some(search.clone());
        search
    }

    /// Active config: the local override if one is installed, else the
    /// location default.
    pub fn config(&self) -> PrinterConfig {
        lock(&self.shared.inner).config()
    }

    pub fn location_id(&self) -> i64 {
        lock(&self.shared.inner).location_id
    }

    /// Last discovered printers; `None` if never searched.
    pub fn printers(&self) -> Option<Vec<DiscoveredPrinter>> {
        lock(&self.shared.inner).printers.clone()
    }

    pub fn has_searched(&self) -> bool {
        lock(&self.shared.inner).printers.is_some()
    }

    pub fn state(&self) -> DiscoveryState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DiscoveryState> {
        self.shared.state.subscribe()
    }

    pub fn last_search(&self) -> Option<DateTime<Utc>> {
        lock(&self.shared.inner).last_search
    }

    /// True when the UI should prompt for a search: nothing searched yet,
    /// the last search found nothing, or it failed.
    pub fn user_should_search(&self) -> bool {
        lock(&self.shared.inner).user_should_search
    }

    pub fn is_searching(&self) -> bool {
        lock(&self.shared.inner).in_flight.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.shared.notices.subscribe()
    }

    pub(crate) fn notify(&self, notice: SessionNotice) {
        // No subscribers is fine.
        let _ = self.shared.notices.send(notice);
    }

    /// Apply the location's printer config, e.g. after switching location.
    ///
    /// Drops any local override.  The cached printers are invalidated when
    /// the location or the effective config changes.
    pub fn set_location_default(&self, location_id: i64, config: PrinterConfig) {
        let mut inner = lock(&self.shared.inner);
        let previous = inner.config();
        let changed = inner.location_id != location_id || !previous.same_target(&config);
        inner.location_id = location_id;
        inner.location_config = config;
        inner.local_override = None;
        if changed {
            info!(location_id, config = %inner.config(), "location printer config applied");
            self.invalidate(&mut inner);
        }
    }

    /// Ask the location-settings service to store a new printer config.
    ///
    /// The local override is installed only after the remote update
    /// succeeds; on failure the current config stays in effect.
    pub async fn update_printer_config(&self, config: PrinterConfig) -> Result<()> {
        let client = self
            .shared
            .location_settings
            .clone()
            .ok_or_else(|| LabelpressError::Config("no location settings client".into()))?;
        let location_id = self.location_id();

        let status = client.update_printer_config(location_id, &config).await?;
        if !is_success(status) {
            warn!(
                brand = config.brand.as_str(),
                connection = config.connection.as_str(),
                location_id,
                status,
                "printer config update rejected"
            );
            return Err(LabelpressError::Submission(format!(
                "location settings update returned {status}"
            )));
        }

        let mut inner = lock(&self.shared.inner);
        let changed = !inner.config().same_target(&config);
        info!(location_id, config = %config, "printer config updated");
        inner.local_override = Some(config);
        if changed {
            self.invalidate(&mut inner);
        }
        Ok(())
    }

    fn invalidate(&self, inner: &mut DiscoveryInner) {
        inner.generation += 1;
        self.shared.transports.reset();
        inner.printers = None;
        inner.user_should_search = true;
        self.shared.state.send_replace(DiscoveryState::NotStarted);
    }
}

async fn run_search(shared: Arc<ServiceState>, config: PrinterConfig, generation: u64) -> SearchReport {
    let transport = shared.transports.for_connection(config.connection);
    let result = transport.search(&config).await;

    let mut inner = lock(&shared.inner);
    inner.in_flight = None;
    inner.last_search = Some(Utc::now());

    if inner.generation != generation {
        debug!(config = %config, "printer config changed during search; result discarded");
        return SearchReport {
            state: *shared.state.borrow(),
            printers: Vec::new(),
            error: None,
            code: None,
            stale: true,
        };
    }

    match result {
        Ok(printers) => {
            inner.user_should_search = printers.is_empty();
            inner.printers = Some(printers.clone());
            shared.state.send_replace(DiscoveryState::Done);

            let notice = if printers.is_empty() {
                debug!(
                    metric = "no_printers_on_search",
                    brand = config.brand.as_str(),
                    connection = config.connection.as_str(),
                    location_id = inner.location_id,
                    "no printers found"
                );
                SessionNotice::NoPrintersFound {
                    connection: config.connection,
                }
            } else {
                info!(count = printers.len(), config = %config, "printers found");
                SessionNotice::PrintersFound {
                    count: printers.len(),
                    connection: config.connection,
                }
            };
            let _ = shared.notices.send(notice);

            SearchReport {
                state: DiscoveryState::Done,
                printers,
                error: None,
                code: None,
                stale: false,
            }
        }
        Err(e) => {
            warn!(
                brand = config.brand.as_str(),
                connection = config.connection.as_str(),
                location_id = inner.location_id,
                code = e.code(),
                error = %e,
                "printer search failed"
            );
            inner.user_should_search = true;
            shared.state.send_replace(DiscoveryState::Error);
            let _ = shared.notices.send(SessionNotice::SearchFailed {
                error: humanize_error(&e),
            });

            SearchReport {
                state: DiscoveryState::Error,
                printers: Vec::new(),
                error: Some(e.to_string()),
                code: Some(e.code()),
                stale: false,
            }
        }
    }
}

/// The search task died before reporting.  Release the in-flight token so
/// later searches and prints are not blocked.
fn abandon_search(shared: &ServiceState, generation: u64, reason: &str) -> SearchReport {
    let mut inner = lock(&shared.inner);
    inner.in_flight = None;
    inner.last_search = Some(Utc::now());
    let current = inner.generation == generation;
    if current {
        inner.user_should_search = true;
        shared.state.send_replace(DiscoveryState::Error);
    }
    warn!(location_id = inner.location_id, reason = %reason, "printer search task failed");
    SearchReport {
        state: if current {
            DiscoveryState::Error
        } else {
            *shared.state.borrow()
        },
        printers: Vec::new(),
        error: Some(format!("search task failed: {reason}")),
        code: None,
        stale: !current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use labelpress_core::types::PrinterBrand;

    use crate::test_support::{MockCentral, MockLocationSettings, MockTransport, transports};
    use crate::transport::{BleTransport, DEFAULT_BLE_CHUNK_SIZE};

    fn wifi_zebra() -> PrinterConfig {
        PrinterConfig::new(PrinterBrand::Zebra, Connection::Wifi)
    }

    fn service(mock: &Arc<MockTransport>) -> DiscoveryService {
        DiscoveryService::new(transports(mock), 5, wifi_zebra(), None)
    }

    #[test]
    fn fresh_service_has_not_searched() {
        let mock = Arc::new(MockTransport::default());
        let discovery = service(&mock);
        assert!(!discovery.has_searched());
        assert!(discovery.user_should_search());
        assert_eq!(discovery.state(), DiscoveryState::NotStarted);
        assert!(discovery.last_search().is_none());
    }

    #[tokio::test]
    async fn concurrent_searches_share_one_transport_call() {
        let mock = Arc::new(
            MockTransport::with_printers(vec![DiscoveredPrinter::new("P1", "printer-a")])
                .slow(Duration::from_millis(20)),
        );
        let discovery = service(&mock);
        let other = discovery.clone();

        let (a, b) = tokio::join!(discovery.search(), other.search());

        assert_eq!(mock.search_calls(), 1);
        assert_eq!(a, b);
        assert_eq!(a.printers.len(), 1);
        assert_eq!(discovery.state(), DiscoveryState::Done);
        assert!(!discovery.is_searching());
        assert!(discovery.last_search().is_some());
    }

    #[tokio::test]
    async fn empty_result_means_user_should_search() {
        let mock = Arc::new(MockTransport::default());
        let discovery = service(&mock);
        let mut notices = discovery.subscribe();

        let report = discovery.search().await;

        assert_eq!(report.state, DiscoveryState::Done);
        assert_eq!(discovery.printers(), Some(Vec::new()));
        assert!(discovery.has_searched());
        assert!(discovery.user_should_search());

        assert!(matches!(notices.recv().await, Ok(SessionNotice::SearchStarted { .. })));
        assert_eq!(
            notices.recv().await.ok(),
            Some(SessionNotice::NoPrintersFound {
                connection: Connection::Wifi
            })
        );
    }

    #[tokio::test]
    async fn transport_error_becomes_error_state() {
        let mock = Arc::new(MockTransport::default().failing_search(1002));
        let discovery = service(&mock);

        let report = discovery.search().await;

        assert_eq!(report.state, DiscoveryState::Error);
        assert!(report.error.is_some());
        assert_eq!(discovery.state(), DiscoveryState::Error);
        assert!(discovery.user_should_search());
        assert!(discovery.printers().is_none());
    }

    #[tokio::test]
    async fn failed_search_keeps_its_error_code() {
        let mock = Arc::new(MockTransport::default().failing_search(1001));
        let discovery = service(&mock);

        let report = discovery.search().await;

        assert_eq!(report.code, Some(1001));
        let err = report.failure().unwrap();
        assert!(matches!(err, LabelpressError::PermissionDenied));
        assert_eq!(err.code(), 1001);

        let healthy = Arc::new(MockTransport::default());
        assert!(service(&healthy).search().await.failure().is_none());
    }

    #[tokio::test]
    async fn panicked_search_releases_the_token() {
        let mock = Arc::new(MockTransport::default().panicking());
        let discovery = service(&mock);

        let report = discovery.search().await;

        assert_eq!(report.state, DiscoveryState::Error);
        assert!(!discovery.is_searching());
        assert_eq!(discovery.state(), DiscoveryState::Error);
        assert!(discovery.user_should_search());

        // The next search reaches the transport again instead of joining a
        // dead one.
        discovery.search().await;
        assert_eq!(mock.search_calls(), 2);
    }

    fn ble_zebra() -> PrinterConfig {
        PrinterConfig::new(PrinterBrand::Zebra, Connection::Ble)
    }

    fn ble_service(central: &Arc<MockCentral>) -> DiscoveryService {
        let ble = BleTransport::new(central.clone(), DEFAULT_BLE_CHUNK_SIZE);
        let transports = Transports::new(Arc::new(MockTransport::default()), Arc::new(ble));
        DiscoveryService::new(transports, 5, ble_zebra(), None)
    }

    fn ids(printers: &[DiscoveredPrinter]) -> Vec<&str> {
        printers.iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn ble_searches_accumulate_printers() {
        let central = Arc::new(MockCentral::new(vec![MockCentral::peripheral("dev-1", "ZQ520")]));
        let discovery = ble_service(&central);
        let mut state = discovery.subscribe_state();

        let first = discovery.search().await;
        assert_eq!(ids(&first.printers), ["dev-1"]);
        assert!(state.has_changed().unwrap());
        assert_eq!(*state.borrow_and_update(), DiscoveryState::Done);

        central.set_peripherals(vec![MockCentral::peripheral("dev-2", "ZQ630")]);
        let second = discovery.search().await;
        assert_eq!(ids(&second.printers), ["dev-1", "dev-2"]);
        assert_eq!(discovery.printers().map(|p| p.len()), Some(2));
    }

    #[tokio::test]
    async fn ble_scan_error_keeps_previous_printers() {
        let central = Arc::new(MockCentral::new(vec![MockCentral::peripheral("dev-1", "ZQ520")]));
        let discovery = ble_service(&central);
        discovery.search().await;

        central.set_failing(true);
        let report = discovery.search().await;

        assert_eq!(report.state, DiscoveryState::Error);
        assert_eq!(discovery.state(), DiscoveryState::Error);
        let kept = discovery.printers().unwrap();
        assert_eq!(ids(&kept), ["dev-1"]);
    }

    #[tokio::test]
    async fn location_change_resets_ble_printers() {
        let central = Arc::new(MockCentral::new(vec![MockCentral::peripheral("old-1", "ZQ520")]));
        let discovery = ble_service(&central);
        discovery.search().await;

        discovery.set_location_default(6, ble_zebra());
        assert!(discovery.printers().is_none());

        central.set_peripherals(vec![MockCentral::peripheral("new-1", "ZQ630")]);
        let report = discovery.search().await;
        assert_eq!(ids(&report.printers), ["new-1"]);
    }

    #[tokio::test]
    async fn found_printers_clear_the_search_hint() {
        let mock = Arc::new(MockTransport::with_printers(vec![DiscoveredPrinter::new("P1", "a")]));
        let discovery = service(&mock);
        discovery.search().await;
        assert!(!discovery.user_should_search());

        // A second search clears the cached list first and replaces it.
        mock.set_printers(vec![DiscoveredPrinter::new("P2", "b")]);
        let report = discovery.search().await;
        assert_eq!(report.printers, vec![DiscoveredPrinter::new("P2", "b")]);
        assert_eq!(mock.search_calls(), 2);
    }

    #[tokio::test]
    async fn config_change_during_search_discards_result() {
        let mock = Arc::new(MockTransport::with_printers(vec![DiscoveredPrinter::new("P1", "a")]));
        let discovery = service(&mock);

        let pending = discovery.start_search();
        discovery.set_location_default(
            5,
            PrinterConfig::new(PrinterBrand::Brother, Connection::Bluetooth),
        );
        let report = pending.await;

        assert!(report.stale);
        assert!(discovery.printers().is_none());
        assert_eq!(discovery.state(), DiscoveryState::NotStarted);
        assert_eq!(discovery.config().brand, PrinterBrand::Brother);
    }

    #[tokio::test]
    async fn override_installed_only_after_remote_success() {
        let mock = Arc::new(MockTransport::with_printers(vec![DiscoveredPrinter::new("P1", "a")]));
        let rejecting = Arc::new(MockLocationSettings::answering(500));
        let discovery = DiscoveryService::new(transports(&mock), 5, wifi_zebra(), Some(rejecting.clone()));
        discovery.search().await;

        let ble = PrinterConfig::new(PrinterBrand::Zebra, Connection::Ble);
        assert!(discovery.update_printer_config(ble.clone()).await.is_err());
        assert_eq!(rejecting.calls(), 1);
        assert_eq!(discovery.config(), wifi_zebra());
        assert!(discovery.has_searched());

        let accepting = Arc::new(MockLocationSettings::answering(204));
        let discovery = DiscoveryService::new(transports(&mock), 5, wifi_zebra(), Some(accepting));
        discovery.search().await;
        discovery.update_printer_config(ble.clone()).await.unwrap();
        assert_eq!(discovery.config(), ble);
        assert!(!discovery.has_searched());
        assert_eq!(discovery.state(), DiscoveryState::NotStarted);

        // A location change drops the override again.
        discovery.set_location_default(6, wifi_zebra());
        assert_eq!(discovery.config(), wifi_zebra());
        assert_eq!(discovery.location_id(), 6);
    }

    #[tokio::test]
    async fn update_without_client_is_a_config_error() {
        let mock = Arc::new(MockTransport::default());
        let discovery = service(&mock);
        let err = discovery.update_printer_config(wifi_zebra()).await.unwrap_err();
        assert!(matches!(err, LabelpressError::Config(_)));
    }
}
