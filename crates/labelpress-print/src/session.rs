// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One printer session per location: discovery, dispatch, and bookkeeping
// wired together, with presentation-agnostic notices for the UI.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use labelpress_core::config::AppConfig;
use labelpress_core::error::{LabelpressError, Result};
use labelpress_core::types::{PrintLabel, PrintOutcome, PrintTemplate};

use crate::cart::PrintCart;
use crate::discovery::{DiscoveryService, SearchReport};
use crate::dispatch::{BatchReport, PrintDispatcher};
use crate::notice::SessionNotice;
use crate::offline::{DrainReport, OfflineQueue};
use crate::remote::{BookkeepingClient, LocationSettingsClient};
use crate::render::{IdentifierRegistry, LabelRenderer};
use crate::transport::Transports;

pub struct PrinterSession {
    discovery: DiscoveryService,
    dispatcher: PrintDispatcher,
    queue: Arc<OfflineQueue>,
    bookkeeping: Arc<dyn BookkeepingClient>,
}

impl PrinterSession {
    pub fn new(
        transports: Transports,
        config: &AppConfig,
        templates: Vec<PrintTemplate>,
        identifiers: IdentifierRegistry,
        location_settings: Option<Arc<dyn LocationSettingsClient>>,
        queue: Arc<OfflineQueue>,
        bookkeeping: Arc<dyn BookkeepingClient>,
    ) -> Self {
        let discovery = DiscoveryService::new(
            transports.clone(),
            config.context.location_id,
            config.location_printer.clone(),
            location_settings,
        );
        let renderer = LabelRenderer::new(config.context.clone(), identifiers);
        let dispatcher = PrintDispatcher::new(
            discovery.clone(),
            transports,
            templates,
            config.label_size.clone(),
            renderer,
        );
        Self {
            discovery,
            dispatcher,
            queue,
            bookkeeping,
        }
    }

    pub fn discovery(&self) -> &DiscoveryService {
        &self.discovery
    }

    pub fn dispatcher(&self) -> &PrintDispatcher {
        &self.dispatcher
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.discovery.subscribe()
    }

    pub async fn search(&self) -> SearchReport {
        self.discovery.search().await
    }

    /// Print a single label and queue its bookkeeping record on success.
    pub async fn print_label(&self, label: &PrintLabel) -> PrintOutcome {
        self.discovery.notify(SessionNotice::Printing {
            label: label.name.clone(),
        });
        let outcome = self.dispatcher.print_one(label).await;
        self.announce(&outcome, label);

        if outcome.is_success() {
            self.record(std::slice::from_ref(label)).await;
        }
        outcome
    }

    /// Print every label in the cart.  The cart keeps only the labels that
    /// failed, ready for a retry.
    pub async fn print_cart(&self, cart: &mut PrintCart) -> BatchReport {
        self.discovery.notify(SessionNotice::PrintingQueue { count: cart.len() });
        let report = self.dispatcher.print_batch(cart.labels()).await;
        for (outcome, label) in &report.outcomes {
            self.announce(outcome, label);
        }

        self.record(&report.succeeded).await;
        cart.retain_failed(&report.failed);
        report
    }

    /// Track connectivity; drains the queue when it comes back.
    pub async fn set_online(&self, online: bool) -> Option<DrainReport> {
        if !self.queue.set_online(online) {
            return None;
        }
        self.drain().await.ok()
    }

    /// Submit queued bookkeeping records.
    pub async fn drain(&self) -> Result<DrainReport> {
        let report = self.queue.drain(self.bookkeeping.as_ref()).await?;
        self.discovery.notify(SessionNotice::QueueDrained {
            submitted: report.submitted,
            remaining: report.remaining,
        });
        Ok(report)
    }

    fn announce(&self, outcome: &PrintOutcome, label: &PrintLabel) {
        let notice = match outcome {
            PrintOutcome::Success { delivered } => SessionNotice::PrintSucceeded {
                label: label.name.clone(),
                lines: delivered.clone(),
            },
            PrintOutcome::Failure(failure) => SessionNotice::PrintFailed {
                label: label.name.clone(),
                error: failure.presentation(),
            },
            PrintOutcome::Skipped => return,
        };
        self.discovery.notify(notice);
    }

    async fn record(&self, printed: &[PrintLabel]) {
        let context = self.dispatcher.renderer().context();
        if self.queue.record_prints(context, printed, Utc::now()).is_none() {
            return;
        }
        if !self.queue.is_online() {
            debug!(queued = self.queue.len(), "offline; bookkeeping deferred");
            return;
        }
        match self.drain().await {
            Ok(_) | Err(LabelpressError::AlreadyDraining) => {}
            Err(e) => warn!(error = %e, "bookkeeping drain failed"),
        }
        info!(labels = printed.len(), "print recorded");
    }
}
