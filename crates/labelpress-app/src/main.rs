// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelpress — headless label print runner.
//
// Entry point.  Initialises logging and backend services, searches for
// printers on the configured transport, prints a cart file, and reports
// which labels printed and which are left for a retry.
//
//   labelpress <cart.json> <templates.json>

mod services;

use std::path::Path;
use std::process::ExitCode;

use labelpress_core::error::{LabelpressError, Result};
use labelpress_core::types::{DiscoveryState, PrintOutcome, PrintTemplate};
use labelpress_print::PrintCart;

use services::app_services::AppServices;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Labelpress starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [cart_path, templates_path] = args.as_slice() else {
        eprintln!("usage: labelpress <cart.json> <templates.json>");
        return ExitCode::from(2);
    };

    match run(Path::new(cart_path), Path::new(templates_path)).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "print run failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every label printed.
async fn run(cart_path: &Path, templates_path: &Path) -> Result<bool> {
    let mut cart: PrintCart = serde_json::from_str(&std::fs::read_to_string(cart_path)?)?;
    let templates: Vec<PrintTemplate> =
        serde_json::from_str(&std::fs::read_to_string(templates_path)?)?;
    if cart.is_empty() {
        println!("Cart is empty; nothing to print.");
        return Ok(true);
    }

    let services = match AppServices::init(templates.clone()) {
        Ok(services) => {
            tracing::info!(data_dir = %services.data_dir().display(), "backend services initialised");
            services
        }
        Err(e) => {
            tracing::error!(error = %e, "persistent storage failed; using in-memory fallback");
            AppServices::fallback(templates)
        }
    };
    let session = services.session();
    let config = services.config();

    let search = session.search().await;
    match search.state {
        DiscoveryState::Done if !search.printers.is_empty() => {
            println!("Found {} printer(s) over {}:", search.printers.len(), config.location_printer);
            for printer in &search.printers {
                println!("  {} ({})", printer.name, printer.id);
            }
        }
        DiscoveryState::Done => {
            println!("No printers found over {}.", config.location_printer);
            return Err(LabelpressError::NoPrinterFound);
        }
        _ => {
            let reason = search.error.as_deref().unwrap_or("unknown error");
            println!("Printer search failed: {reason}");
            return Err(search
                .failure()
                .unwrap_or_else(|| LabelpressError::transport(0, reason)));
        }
    }

    let report = session.print_cart(&mut cart).await;
    for (outcome, label) in &report.outcomes {
        match outcome {
            PrintOutcome::Success { delivered } => {
                println!("printed  {:<24} {}", label.name, delivered.join("; "));
            }
            PrintOutcome::Failure(failure) => {
                let human = failure.presentation();
                println!("FAILED   {:<24} {} {}", label.name, human.message, human.suggestion);
            }
            PrintOutcome::Skipped => println!("skipped  {:<24} no copies requested", label.name),
        }
    }
    println!(
        "{} printed, {} left in the cart.",
        report.succeeded.len(),
        cart.len()
    );
    if let Some(status) = session.queue().status_message() {
        println!("{status}");
    } else if !session.queue().is_empty() {
        println!("{} print record(s) waiting to be sent.", session.queue().len());
    }

    Ok(report.all_succeeded())
}
