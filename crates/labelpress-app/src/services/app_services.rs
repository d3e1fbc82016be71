// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: loads config, opens the offline queue database,
// and builds the printer session over the platform bridge.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{error, info, warn};

use labelpress_bridge::platform_bridge;
use labelpress_core::AppConfig;
use labelpress_core::error::{LabelpressError, Result};
use labelpress_core::types::{PrintRecordPayload, PrintTemplate};
use labelpress_print::remote::BookkeepingClient;
use labelpress_print::render::IdentifierRegistry;
use labelpress_print::{OfflineQueue, PrinterSession, SqliteQueueStore, Transports};

use super::data_dir;

const CONFIG_FILE: &str = "config.json";

/// Bookkeeping endpoint for a runner with no server configured.  Every
/// submission fails, so records stay in the offline queue until a host with
/// a real client drains them.
struct HeldBookkeeping;

#[async_trait]
impl BookkeepingClient for HeldBookkeeping {
    async fn record_prints(&self, payload: &PrintRecordPayload) -> Result<u16> {
        Err(LabelpressError::Submission(format!(
            "no bookkeeping endpoint configured; {} record(s) held",
            payload.labels.len()
        )))
    }
}

/// Shared application services.  Cheap to clone.
#[derive(Clone)]
pub struct AppServices {
    session: Arc<PrinterSession>,
    data_dir: PathBuf,
    config: Arc<Mutex<AppConfig>>,
}

impl AppServices {
    /// Initialise all services.  Call once at startup.
    pub fn init(templates: Vec<PrintTemplate>) -> Result<Self> {
        let dir = data_dir::data_dir();
        info!(path = %dir.display(), "initialising app services");

        let config = load_config(&dir).unwrap_or_else(|| {
            let config = AppConfig::default();
            // First run: write the defaults out so the location can be edited.
            if !dir.join(CONFIG_FILE).exists() {
                if let Err(e) = persist_config(&dir, &config) {
                    error!(error = %e, "failed to write default config");
                }
            }
            config
        });
        let store = SqliteQueueStore::open(dir.join(&config.queue_db_file))?;
        let queue = OfflineQueue::with_store(Arc::new(store))?;
        Ok(Self::build(dir, config, templates, queue))
    }

    /// In-memory queue and default config, for when the data directory is
    /// unusable.
    pub fn fallback(templates: Vec<PrintTemplate>) -> Self {
        let dir = std::env::temp_dir();
        warn!("using in-memory offline queue");
        Self::build(dir, AppConfig::default(), templates, OfflineQueue::new())
    }

    fn build(
        data_dir: PathBuf,
        config: AppConfig,
        templates: Vec<PrintTemplate>,
        queue: OfflineQueue,
    ) -> Self {
        let bridge = platform_bridge();
        info!(platform = bridge.platform_name(), config = %config.location_printer, "platform bridge ready");
        let transports = Transports::from_bridge(bridge, config.ble_chunk_size);
        let session = PrinterSession::new(
            transports,
            &config,
            templates,
            IdentifierRegistry::new(),
            None,
            Arc::new(queue),
            Arc::new(HeldBookkeeping),
        );
        Self {
            session: Arc::new(session),
            data_dir,
            config: Arc::new(Mutex::new(config)),
        }
    }

    pub fn session(&self) -> &PrinterSession {
        &self.session
    }

    pub fn config(&self) -> AppConfig {
        self.config
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn load_config(data_dir: &Path) -> Option<AppConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid config file; using defaults");
            None
        }
    }
}

fn persist_config(data_dir: &Path, config: &AppConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path()).is_none());

        let mut config = AppConfig::default();
        config.label_size = "4x6".into();
        config.context.location_id = 42;
        persist_config(dir.path(), &config).unwrap();

        let loaded = load_config(dir.path()).unwrap();
        assert_eq!(loaded.label_size, "4x6");
        assert_eq!(loaded.context.location_id, 42);
    }

    #[test]
    fn invalid_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();
        assert!(load_config(dir.path()).is_none());
    }
}
