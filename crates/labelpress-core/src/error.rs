// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Labelpress.
//
// Print-path errors carry a stable integer code that the UI layer keys its
// messages on.  The codes must not change.

use thiserror::Error;

use crate::types::ErrorClass;

/// Bluetooth permission was refused by the OS or the user.
pub const CODE_PERMISSION_DENIED: i32 = 1001;
/// No printers are currently known.
pub const CODE_NO_PRINTERS_KNOWN: i32 = 1002;
/// A discovery search is already running.
pub const CODE_ALREADY_SEARCHING: i32 = 1003;
/// No printer (or no matching printer) for the label.
pub const CODE_NO_PRINTER: i32 = 2004;
/// No template matched the label's traits.
pub const CODE_NO_TEMPLATE: i32 = 9001;
/// Internal failures that never reach the code-to-message table.
pub const CODE_INTERNAL: i32 = 0;

/// Top-level error type for all Labelpress operations.
#[derive(Debug, Error)]
pub enum LabelpressError {
    // -- Transport errors --
    #[error("bluetooth permission was not granted")]
    PermissionDenied,

    #[error("no printers currently known")]
    NoPrintersKnown,

    #[error("a printer search is already in progress")]
    AlreadySearching,

    #[error("transport error {code}: {message}")]
    Transport { code: i32, message: String },

    // -- Resolution errors --
    #[error("no printer found")]
    NoPrinterFound,

    #[error("no matching printer found for label {label}")]
    NoMatchingPrinter { label: String },

    // -- Template errors --
    #[error("could not find template")]
    NoTemplate,

    // -- Bookkeeping --
    #[error("bookkeeping submission failed: {0}")]
    Submission(String),

    #[error("offline queue drain already in progress")]
    AlreadyDraining,

    #[error("printer config update failed: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

impl LabelpressError {
    /// Build an error from a transport rejection `{code, message}`.
    ///
    /// Codes the core also produces itself are folded into their dedicated
    /// variants so callers can match on them regardless of origin.
    pub fn transport(code: i32, message: impl Into<String>) -> Self {
        match code {
            CODE_PERMISSION_DENIED => Self::PermissionDenied,
            CODE_NO_PRINTERS_KNOWN => Self::NoPrintersKnown,
            CODE_ALREADY_SEARCHING => Self::AlreadySearching,
            _ => Self::Transport {
                code,
                message: message.into(),
            },
        }
    }

    /// Stable code surfaced to the UI collaborator.
    pub fn code(&self) -> i32 {
        match self {
            Self::PermissionDenied => CODE_PERMISSION_DENIED,
            Self::NoPrintersKnown => CODE_NO_PRINTERS_KNOWN,
            Self::AlreadySearching => CODE_ALREADY_SEARCHING,
            Self::Transport { code, .. } => *code,
            Self::NoPrinterFound | Self::NoMatchingPrinter { .. } => CODE_NO_PRINTER,
            Self::NoTemplate => CODE_NO_TEMPLATE,
            Self::Submission(_)
            | Self::AlreadyDraining
            | Self::Config(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Bridge(_)
            | Self::PlatformUnavailable => CODE_INTERNAL,
        }
    }

    /// Which family of failure this is, for retry and reporting decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::PermissionDenied
            | Self::NoPrintersKnown
            | Self::AlreadySearching
            | Self::Transport { .. }
            | Self::Bridge(_)
            | Self::PlatformUnavailable => ErrorClass::Transport,
            Self::NoPrinterFound | Self::NoMatchingPrinter { .. } => ErrorClass::Resolution,
            Self::NoTemplate => ErrorClass::Template,
            Self::Submission(_) | Self::AlreadyDraining => ErrorClass::Submission,
            Self::Config(_) | Self::Database(_) | Self::Io(_) | Self::Serialization(_) => {
                ErrorClass::Internal
            }
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LabelpressError>;
