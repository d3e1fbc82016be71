// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print dispatch: resolve the printer for a label, pick its template, render
// the payload, and hand it to the transport for the configured connection.
//
// Per-brand behaviour lives in a small strategy table keyed by
// (brand, connection).  Batches print strictly one label at a time; a failed
// label never stops the rest of the batch.

use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use labelpress_core::error::{LabelpressError, Result};
use labelpress_core::types::{
    Connection, DiscoveredPrinter, PrintFailure, PrintLabel, PrintOutcome, PrintTemplate,
    PrinterBrand, PrinterConfig, PrinterInfo,
};

use crate::discovery::DiscoveryService;
use crate::render::{LabelRenderer, decode_escapes};
use crate::template::{label_traits, select_template};
use crate::transport::Transports;

// ---------------------------------------------------------------------------
// Strategy table
// ---------------------------------------------------------------------------

/// How a label is matched to a discovered printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolver {
    /// Match the serial recorded on the label.  When none is recorded yet
    /// and `bind_first_when_unbound` is set, bind to the first printer.
    BySerial { bind_first_when_unbound: bool },
    /// Match the network name recorded on the label, else the first printer.
    ByDnsName,
}

/// Which send path carries the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderKind {
    Native,
    Ble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    pub resolver: Resolver,
    pub sender: SenderKind,
    /// Turn stored `\u{..}`, `\r`, `\n` escapes into real bytes before send.
    pub decode_escapes: bool,
}

pub fn strategy_for(brand: PrinterBrand, connection: Connection) -> Strategy {
    let resolver = match brand {
        // Binding a Bluetooth Brother label to the first printer is kept for
        // compatibility; it is ambiguous with several Brother printers nearby.
        PrinterBrand::Brother => Resolver::BySerial {
            bind_first_when_unbound: connection == Connection::Bluetooth,
        },
        PrinterBrand::Zebra | PrinterBrand::Bixolon | PrinterBrand::Bixolonupos => {
            Resolver::ByDnsName
        }
    };
    let sender = match connection {
        Connection::Ble => SenderKind::Ble,
        Connection::Wifi | Connection::Bluetooth => SenderKind::Native,
    };
    Strategy {
        resolver,
        sender,
        decode_escapes: sender == SenderKind::Native,
    }
}

/// Pick the printer that serves `label`.
pub fn resolve_printer<'a>(
    resolver: Resolver,
    printers: &'a [DiscoveredPrinter],
    label: &PrintLabel,
) -> Result<&'a DiscoveredPrinter> {
    let first = printers.first().ok_or(LabelpressError::NoPrinterFound)?;
    let info = label.printer_info.as_ref();

    match resolver {
        Resolver::BySerial {
            bind_first_when_unbound,
        } => match info.and_then(|i| i.serial.as_deref()) {
            Some(serial) => printers
                .iter()
                .find(|p| p.serial() == Some(serial) || p.id == serial)
                .ok_or_else(|| LabelpressError::NoMatchingPrinter {
                    label: label.name.clone(),
                }),
            None if bind_first_when_unbound => Ok(first),
            None => Err(LabelpressError::NoMatchingPrinter {
                label: label.name.clone(),
            }),
        },
        Resolver::ByDnsName => {
            let dns_name = info.and_then(|i| i.dns_name.as_deref());
            Ok(dns_name
                .and_then(|name| printers.iter().find(|p| p.name == name))
                .unwrap_or(first))
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Outcome of a batch, partitioned for the retry cart.  Zero-count labels
/// are skipped and land in neither partition.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One entry per label, in batch order.
    pub outcomes: Vec<(PrintOutcome, PrintLabel)>,
    pub succeeded: Vec<PrintLabel>,
    pub failed: Vec<PrintLabel>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct PrintDispatcher {
    discovery: DiscoveryService,
    transports: Transports,
    templates: RwLock<Arc<Vec<PrintTemplate>>>,
    label_size: String,
    renderer: LabelRenderer,
}

impl PrintDispatcher {
    pub fn new(
        discovery: DiscoveryService,
        transports: Transports,
        templates: Vec<PrintTemplate>,
        label_size: impl Into<String>,
        renderer: LabelRenderer,
    ) -> Self {
        Self {
            discovery,
            transports,
            templates: RwLock::new(Arc::new(templates)),
            label_size: label_size.into(),
            renderer,
        }
    }

    /// Replace the template catalog.
    pub fn set_templates(&self, templates: Vec<PrintTemplate>) {
        let mut catalog = self.templates.write().unwrap_or_else(|e| e.into_inner());
        *catalog = Arc::new(templates);
    }

    fn catalog(&self) -> Arc<Vec<PrintTemplate>> {
        Arc::clone(&self.templates.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn renderer(&self) -> &LabelRenderer {
        &self.renderer
    }

    /// Print one label.  The caller's label is never mutated.
    pub async fn print_one(&self, label: &PrintLabel) -> PrintOutcome {
        if label.count == 0 {
            debug!(label = %label.name, "zero copies requested; label skipped");
            return PrintOutcome::Skipped;
        }
        let config = self.discovery.config();
        match self.try_print(&config, label).await {
            Ok(delivered) => {
                info!(label = %label.name, config = %config, "label printed");
                PrintOutcome::Success { delivered }
            }
            Err(e) => {
                warn!(
                    brand = config.brand.as_str(),
                    connection = config.connection.as_str(),
                    location_id = self.discovery.location_id(),
                    code = e.code(),
                    label = %label.name,
                    error = %e,
                    "label print failed"
                );
                PrintOutcome::Failure(PrintFailure::from_error(&e))
            }
        }
    }

    async fn try_print(&self, config: &PrinterConfig, label: &PrintLabel) -> Result<Vec<String>> {
        if self.discovery.is_searching() {
            return Err(LabelpressError::AlreadySearching);
        }
        let printers = self.discovery.printers().unwrap_or_default();
        if printers.is_empty() {
            debug!(
                metric = "no_printers_on_print",
                brand = config.brand.as_str(),
                connection = config.connection.as_str(),
                location_id = self.discovery.location_id(),
                "print requested with no printers"
            );
            return Err(LabelpressError::NoPrinterFound);
        }

        let strategy = strategy_for(config.brand, config.connection);
        let printer = resolve_printer(strategy.resolver, &printers, label)?;

        let mut label = label.clone();
        if matches!(
            strategy.resolver,
            Resolver::BySerial {
                bind_first_when_unbound: true
            }
        ) {
            bind_unbound(&mut label, printer);
        }

        let catalog = self.catalog();
        let traits = label_traits(&label, &self.label_size);
        let template = select_template(&traits, &catalog)?;

        let rendered = self.renderer.render(template, &label, config.brand);
        let payload = if strategy.decode_escapes {
            decode_escapes(&rendered)
        } else {
            rendered
        };

        debug!(printer = %printer.id, bytes = payload.len(), "dispatching label");
        let transport = self.transports.for_connection(config.connection);
        transport.send(config, printer, &payload).await
    }

    /// Print labels one after another, collecting an outcome per label.
    pub async fn print_batch(&self, labels: &[PrintLabel]) -> BatchReport {
        let mut report = BatchReport::default();
        for label in labels {
            let outcome = self.print_one(label).await;
            match outcome {
                PrintOutcome::Success { .. } => report.succeeded.push(label.clone()),
                PrintOutcome::Failure(_) => report.failed.push(label.clone()),
                PrintOutcome::Skipped => {}
            }
            report.outcomes.push((outcome, label.clone()));
        }
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "batch finished"
        );
        report
    }
}

/// Record on the working copy the printer an unbound label fell back to.
fn bind_unbound(label: &mut PrintLabel, printer: &DiscoveredPrinter) {
    let info = label.printer_info.get_or_insert_with(PrinterInfo::default);
    if info.serial.is_some() {
        return;
    }
    info.serial = Some(printer.serial().unwrap_or(&printer.id).to_owned());
    if info.model.is_none() {
        info.model = Some(printer.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelpress_core::types::{PrintContext, PrinterExtra};

    use crate::render::IdentifierRegistry;
    use crate::test_support::{MockTransport, transports};

    fn label_for(id: &str, name: &str, dns_name: &str) -> PrintLabel {
        let mut label = PrintLabel::new(id, name);
        label.printer_info = Some(PrinterInfo {
            serial: None,
            dns_name: Some(dns_name.into()),
            model: None,
        });
        label
    }

    fn brother(serial: Option<&str>) -> PrintLabel {
        let mut label = PrintLabel::new("b", "Brother label");
        label.printer_info = serial.map(|s| PrinterInfo {
            serial: Some(s.into()),
            dns_name: None,
            model: None,
        });
        label
    }

    async fn dispatcher(
        mock: &Arc<MockTransport>,
        config: PrinterConfig,
        templates: Vec<PrintTemplate>,
    ) -> PrintDispatcher {
        let discovery = DiscoveryService::new(transports(mock), 5, config, None);
        discovery.search().await;
        let renderer = LabelRenderer::new(PrintContext::default(), IdentifierRegistry::new());
        PrintDispatcher::new(discovery, transports(mock), templates, "2x1", renderer)
    }

    #[test]
    fn zebra_resolves_by_dns_name_and_falls_back_to_first() {
        let printers = vec![
            DiscoveredPrinter::new("P1", "printer-a"),
            DiscoveredPrinter::new("P2", "printer-b"),
        ];
        let strategy = strategy_for(PrinterBrand::Zebra, Connection::Wifi);

        let a = label_for("1", "Rice", "printer-a");
        assert_eq!(resolve_printer(strategy.resolver, &printers, &a).unwrap().id, "P1");

        let b = label_for("1", "Rice", "printer-b");
        assert_eq!(resolve_printer(strategy.resolver, &printers, &b).unwrap().id, "P2");

        let x = label_for("1", "Rice", "printer-x");
        assert_eq!(resolve_printer(strategy.resolver, &printers, &x).unwrap().id, "P1");
    }

    #[test]
    fn empty_list_is_no_printer() {
        let strategy = strategy_for(PrinterBrand::Zebra, Connection::Wifi);
        let err = resolve_printer(strategy.resolver, &[], &label_for("1", "Rice", "a")).unwrap_err();
        assert!(matches!(err, LabelpressError::NoPrinterFound));
        assert_eq!(err.code(), 2004);
    }

    #[test]
    fn brother_matches_serial() {
        let printers = vec![
            DiscoveredPrinter::new("b1", "QL-820").with_extra(PrinterExtra::Brother {
                serial: "S-1".into(),
            }),
            DiscoveredPrinter::new("b2", "QL-820").with_extra(PrinterExtra::Brother {
                serial: "S-2".into(),
            }),
        ];
        let strategy = strategy_for(PrinterBrand::Brother, Connection::Wifi);
        let found = resolve_printer(strategy.resolver, &printers, &brother(Some("S-2"))).unwrap();
        assert_eq!(found.id, "b2");

        let err = resolve_printer(strategy.resolver, &printers, &brother(Some("S-9"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            LabelpressError::NoMatchingPrinter {
                label: "Brother label".into()
            }
            .to_string()
        );
    }

    #[test]
    fn brother_bluetooth_binds_unbound_label_to_first() {
        let printers = vec![DiscoveredPrinter::new("b1", "QL-820")];
        let bt = strategy_for(PrinterBrand::Brother, Connection::Bluetooth);
        assert_eq!(resolve_printer(bt.resolver, &printers, &brother(None)).unwrap().id, "b1");

        let wifi = strategy_for(PrinterBrand::Brother, Connection::Wifi);
        assert!(resolve_printer(wifi.resolver, &printers, &brother(None)).is_err());
    }

    #[test]
    fn ble_sender_skips_escape_decoding() {
        assert!(!strategy_for(PrinterBrand::Zebra, Connection::Ble).decode_escapes);
        assert!(strategy_for(PrinterBrand::Bixolon, Connection::Wifi).decode_escapes);
        assert_eq!(
            strategy_for(PrinterBrand::Zebra, Connection::Ble).sender,
            SenderKind::Ble
        );
    }

    #[tokio::test]
    async fn batch_continues_past_a_failed_label() {
        let mock = Arc::new(MockTransport::with_printers(vec![
            DiscoveredPrinter::new("b1", "QL-820").with_extra(PrinterExtra::Brother {
                serial: "S-1".into(),
            }),
        ]));
        let config = PrinterConfig::new(PrinterBrand::Brother, Connection::Wifi);
        let dispatcher = dispatcher(&mock, config, vec![PrintTemplate::universal("{{name}}")]).await;

        let mut l1 = brother(Some("S-1"));
        l1.id = "L1".into();
        l1.name = "one".into();
        let mut l2 = brother(Some("S-404"));
        l2.id = "L2".into();
        l2.name = "two".into();
        let mut l3 = brother(Some("S-1"));
        l3.id = "L3".into();
        l3.name = "three".into();

        let report = dispatcher.print_batch(&[l1, l2, l3]).await;

        let ids = |labels: &[PrintLabel]| labels.iter().map(|l| l.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&report.succeeded), ["L1", "L3"]);
        assert_eq!(ids(&report.failed), ["L2"]);
        assert_eq!(report.outcomes.len(), 3);

        let sends = mock.sends();
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[0].1, "one");
        assert_eq!(sends[1].1, "three");

        match &report.outcomes[1].0 {
            PrintOutcome::Failure(failure) => {
                assert_eq!(failure.code, 2004);
                assert!(failure.override_message.is_some());
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn print_renders_copies_and_decodes_escapes() {
        let mock = Arc::new(MockTransport::with_printers(vec![DiscoveredPrinter::new(
            "P1",
            "printer-a",
        )]));
        let config = PrinterConfig::new(PrinterBrand::Zebra, Connection::Wifi);
        let dispatcher =
            dispatcher(&mock, config, vec![PrintTemplate::universal(r"^XA{{name}}\r\n")]).await;

        let mut label = label_for("1", "Rice", "printer-a");
        label.count = 2;
        let outcome = dispatcher.print_one(&label).await;

        assert!(outcome.is_success());
        assert_eq!(
            mock.sends()[0],
            ("P1".to_owned(), "^XARice\r\n^XARice\r\n".to_owned())
        );
        // The caller's copy is untouched.
        assert_eq!(label.printer_info.and_then(|i| i.serial), None);
    }

    #[tokio::test]
    async fn zero_count_label_is_not_sent() {
        let mock = Arc::new(MockTransport::with_printers(vec![DiscoveredPrinter::new("P1", "a")]));
        let config = PrinterConfig::new(PrinterBrand::Zebra, Connection::Wifi);
        let dispatcher = dispatcher(&mock, config, vec![PrintTemplate::universal("{{name}}")]).await;

        let mut empty = PrintLabel::new("1", "Rice");
        empty.count = 0;
        let report = dispatcher.print_batch(&[empty.clone(), PrintLabel::new("2", "Soup")]).await;

        assert_eq!(dispatcher.print_one(&empty).await, PrintOutcome::Skipped);
        assert_eq!(report.outcomes[0].0, PrintOutcome::Skipped);
        assert_eq!(report.succeeded.len(), 1);
        assert!(report.failed.is_empty());
        assert_eq!(mock.sends(), vec![("P1".to_owned(), "Soup".to_owned())]);
    }

    #[tokio::test]
    async fn only_the_fallback_binding_reaches_template_traits() {
        let bound_only = |content: &str, info: serde_json::Value| {
            PrintTemplate::with_criteria(
                content,
                serde_json::from_value(serde_json::json!({ "printerInfo": info })).unwrap(),
            )
        };
        let templates = vec![
            bound_only("by-dns", serde_json::json!({ "dnsName": "printer-a" })),
            bound_only("by-serial", serde_json::json!({ "serial": "S-1" })),
            PrintTemplate::universal("plain"),
        ];

        // Zebra never writes a binding the caller did not set.
        let zebra = Arc::new(MockTransport::with_printers(vec![DiscoveredPrinter::new("P1", "printer-a")]));
        let config = PrinterConfig::new(PrinterBrand::Zebra, Connection::Wifi);
        let zebra_dispatch = dispatcher(&zebra, config, templates.clone()).await;
        assert!(zebra_dispatch.print_one(&PrintLabel::new("1", "Rice")).await.is_success());
        assert_eq!(zebra.sends()[0].1, "plain");

        // Brother over Bluetooth binds the unbound label to the first printer.
        let brother_printer = DiscoveredPrinter::new("b1", "QL-820")
            .with_extra(PrinterExtra::Brother { serial: "S-1".into() });
        let mock = Arc::new(MockTransport::with_printers(vec![brother_printer]));
        let config = PrinterConfig::new(PrinterBrand::Brother, Connection::Bluetooth);
        let brother_dispatch = dispatcher(&mock, config, templates).await;
        assert!(brother_dispatch.print_one(&brother(None)).await.is_success());
        assert_eq!(mock.sends()[0].1, "by-serial");
    }

    #[tokio::test]
    async fn missing_template_is_reported_not_guessed() {
        let mock = Arc::new(MockTransport::with_printers(vec![DiscoveredPrinter::new("P1", "a")]));
        let config = PrinterConfig::new(PrinterBrand::Zebra, Connection::Wifi);
        let dispatcher = dispatcher(&mock, config, Vec::new()).await;

        let outcome = dispatcher.print_one(&PrintLabel::new("1", "Rice")).await;
        assert_eq!(
            outcome,
            PrintOutcome::Failure(PrintFailure {
                code: 9001,
                message: LabelpressError::NoTemplate.to_string(),
                override_message: None,
            })
        );
        assert!(mock.sends().is_empty());
    }

    #[tokio::test]
    async fn refuses_to_print_while_searching() {
        let mock = Arc::new(
            MockTransport::with_printers(vec![DiscoveredPrinter::new("P1", "a")])
                .slow(std::time::Duration::from_millis(20)),
        );
        let config = PrinterConfig::new(PrinterBrand::Zebra, Connection::Wifi);
        let dispatcher = dispatcher(&mock, config, vec![PrintTemplate::universal("x")]).await;

        let pending = dispatcher.discovery.start_search();
        let outcome = dispatcher.print_one(&PrintLabel::new("1", "Rice")).await;
        match outcome {
            PrintOutcome::Failure(failure) => assert_eq!(failure.code, 1003),
            other => panic!("expected failure, got {other:?}"),
        }
        pending.await;
        assert!(dispatcher.print_one(&PrintLabel::new("1", "Rice")).await.is_success());
    }

    #[tokio::test]
    async fn unsearched_session_has_no_printer() {
        let mock = Arc::new(MockTransport::default());
        let config = PrinterConfig::new(PrinterBrand::Zebra, Connection::Wifi);
        let discovery = DiscoveryService::new(transports(&mock), 5, config, None);
        let renderer = LabelRenderer::new(PrintContext::default(), IdentifierRegistry::new());
        let dispatcher = PrintDispatcher::new(discovery, transports(&mock), Vec::new(), "2x1", renderer);

        match dispatcher.print_one(&PrintLabel::new("1", "Rice")).await {
            PrintOutcome::Failure(failure) => assert_eq!(failure.code, 2004),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
