// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Labelpress print engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::human_errors::HumanError;

/// Supported label printer brands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterBrand {
    Zebra,
    Brother,
    Bixolon,
    Bixolonupos,
}

impl PrinterBrand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zebra => "zebra",
            Self::Brother => "brother",
            Self::Bixolon => "bixolon",
            Self::Bixolonupos => "bixolonupos",
        }
    }
}

/// Radio/network channel used to reach a printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    Wifi,
    Bluetooth,
    Ble,
}

impl Connection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Bluetooth => "bluetooth",
            Self::Ble => "ble",
        }
    }
}

/// Which printer family to talk to and over which transport.
///
/// One active instance per location.  `extra` carries transport hints for
/// the native SDK (e.g. `modelName`) and is filled in per print call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterConfig {
    pub brand: PrinterBrand,
    pub connection: Connection,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl PrinterConfig {
    pub fn new(brand: PrinterBrand, connection: Connection) -> Self {
        Self {
            brand,
            connection,
            extra: BTreeMap::new(),
        }
    }

    /// Same brand and connection, ignoring per-call extras.
    pub fn same_target(&self, other: &PrinterConfig) -> bool {
        self.brand == other.brand && self.connection == other.connection
    }
}

impl Default for PrinterConfig {
    /// Used when a location has no printer configured.
    fn default() -> Self {
        Self::new(PrinterBrand::Zebra, Connection::Bluetooth)
    }
}

impl std::fmt::Display for PrinterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.brand.as_str(), self.connection.as_str())
    }
}

/// Transport-specific data attached to a discovered printer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrinterExtra {
    #[default]
    None,
    /// Brother SDK reports the device serial.
    Brother { serial: String },
    /// BLE peripheral with the characteristic that accepts label data.
    Ble {
        service_uuid: Option<String>,
        write_characteristic: Option<String>,
    },
}

/// A printer found by one discovery cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredPrinter {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub extra: PrinterExtra,
}

impl DiscoveredPrinter {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extra: PrinterExtra::None,
        }
    }

    pub fn with_extra(mut self, extra: PrinterExtra) -> Self {
        self.extra = extra;
        self
    }

    /// Device serial, when the transport reports one.
    pub fn serial(&self) -> Option<&str> {
        match &self.extra {
            PrinterExtra::Brother { serial } => Some(serial),
            _ => None,
        }
    }
}

/// A label layout plus the traits it applies to.
///
/// A template without criteria matches every label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintTemplate {
    pub content: String,
    #[serde(default)]
    pub criteria: Option<Map<String, Value>>,
}

impl PrintTemplate {
    pub fn universal(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            criteria: None,
        }
    }

    pub fn with_criteria(content: impl Into<String>, criteria: Map<String, Value>) -> Self {
        Self {
            content: content.into(),
            criteria: Some(criteria),
        }
    }

    /// Number of declared criteria; the selector prefers higher values.
    pub fn specificity(&self) -> usize {
        self.criteria.as_ref().map_or(0, Map::len)
    }
}

/// Printer binding recorded on a label.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterInfo {
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub dns_name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Expiration type meaning the label carries no expiration.
pub const NO_EXPIRATION: &str = "No Expiration";

/// A label queued for printing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintLabel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    /// Phase name the label was printed from.
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub phase_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default = "default_count", deserialize_with = "lenient_count")]
    pub count: u32,
    /// Epoch milliseconds.
    #[serde(default)]
    pub expiration_date: Option<i64>,
    #[serde(default)]
    pub expiration_type: String,
    #[serde(default)]
    pub printer_info: Option<PrinterInfo>,
    #[serde(default)]
    pub nutrition: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub prep_time: Option<String>,
    #[serde(default)]
    pub shift: Option<String>,
    #[serde(default)]
    pub lot_number: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    /// Any further label fields the templates may reference.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl PrintLabel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: String::new(),
            context: String::new(),
            phase_id: None,
            category_id: None,
            item_id: None,
            count: 1,
            expiration_date: None,
            expiration_type: String::new(),
            printer_info: None,
            nutrition: None,
            notes: None,
            prep_time: None,
            shift: None,
            lot_number: None,
            instructions: None,
            reference_id: None,
            status: None,
            signature: None,
            fields: BTreeMap::new(),
        }
    }

    /// Two cart entries describe the same label.
    pub fn is_same_label(&self, other: &PrintLabel) -> bool {
        self.id == other.id && self.phase_id == other.phase_id
    }

    pub fn has_expiration(&self) -> bool {
        self.expiration_type != NO_EXPIRATION
    }
}

fn default_count() -> u32 {
    1
}

/// Absent or non-numeric counts become 1; negatives clamp to 0.
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let count = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.clamp(0, u32::MAX as i64) as u32,
            None => n.as_f64().map_or(1, |f| f.max(0.0).trunc() as u32),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_or(1, |i| i.clamp(0, u32::MAX as i64) as u32),
        _ => 1,
    };
    Ok(count)
}

/// State of one discovery session on one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiscoveryState {
    #[default]
    NotStarted,
    Scanning,
    Done,
    Error,
}

/// Broad error families, used for retry decisions and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Hardware, radio, or permission failure; a fresh search may fix it.
    Transport,
    /// No discovered printer matches the label.
    Resolution,
    /// Template catalog misconfiguration; operators must fix the catalog.
    Template,
    /// Bookkeeping call failed; stays queued.
    Submission,
    /// Storage, serialization, or config plumbing.
    Internal,
}

/// Failure half of a print outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintFailure {
    pub code: i32,
    pub message: String,
    /// Preformatted presentation that wins over the code mapping.
    pub override_message: Option<HumanError>,
}

/// Result of printing one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrintOutcome {
    Success { delivered: Vec<String> },
    Failure(PrintFailure),
    /// Zero copies requested; nothing was sent and nothing is recorded.
    Skipped,
}

impl PrintOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Identifiers every bookkeeping call and lookup dictionary needs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrintContext {
    pub customer_id: i64,
    pub location_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub location_name: String,
}

/// Bookkeeping row for one printed label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintRecord {
    pub item_name: String,
    pub category_name: String,
    pub phase_name: String,
    pub phase_id: Option<i64>,
    /// Epoch milliseconds.
    pub print_when: i64,
    pub print_count: u32,
    pub expiration_when: Option<i64>,
    pub has_expiration: bool,
}

impl PrintRecord {
    pub fn from_label(label: &PrintLabel, printed_at: DateTime<Utc>) -> Self {
        Self {
            item_name: label.name.clone(),
            category_name: label.category.clone(),
            phase_name: label.context.clone(),
            phase_id: label.phase_id,
            print_when: printed_at.timestamp_millis(),
            print_count: if label.count == 0 { 1 } else { label.count },
            expiration_when: label.expiration_date,
            has_expiration: label.has_expiration(),
        }
    }
}

/// Body of the "record these prints" call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintRecordPayload {
    pub customer_id: i64,
    pub location_id: i64,
    pub user_id: i64,
    pub labels: Vec<PrintRecord>,
}

/// Unique identifier for an offline queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of deferred network calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueEntryKind {
    PrintLabels,
}

/// A bookkeeping call waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineQueueEntry {
    pub id: EntryId,
    pub kind: QueueEntryKind,
    pub params: PrintRecordPayload,
    pub queued_at: DateTime<Utc>,
}

impl OfflineQueueEntry {
    pub fn print_labels(params: PrintRecordPayload) -> Self {
        Self {
            id: EntryId::new(),
            kind: QueueEntryKind::PrintLabels,
            params,
            queued_at: Utc::now(),
        }
    }
}
