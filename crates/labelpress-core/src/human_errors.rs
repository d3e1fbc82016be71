// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for kitchen staff at the label station.
//
// Every print error code is mapped to a plain English message with a clear
// suggestion.  A failure may carry its own preformatted message, which always
// takes precedence over the code mapping.  Translation happens in the UI
// layer; these strings are the untranslated defaults.

use serde::{Deserialize, Serialize};

use crate::error::{
    CODE_ALREADY_SEARCHING, CODE_NO_PRINTER, CODE_NO_PRINTERS_KNOWN, CODE_NO_TEMPLATE,
    CODE_PERMISSION_DENIED, LabelpressError,
};
use crate::types::PrintFailure;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Search again and retry.
    Transient,
    /// User must do something (grant permission, fix the printer binding).
    ActionRequired,
    /// Needs an operator (template catalog).
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying the same action can succeed.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// Message for a stable print error code, if the code is known.
pub fn humanize_code(code: i32) -> Option<HumanError> {
    let human = match code {
        CODE_PERMISSION_DENIED => HumanError {
            message: "Bluetooth permission is needed to print.".into(),
            suggestion: "Allow Bluetooth access for this app in the device settings, then try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
        CODE_NO_PRINTERS_KNOWN => HumanError {
            message: "No printers found.".into(),
            suggestion: "Search for printers again and make sure the printer is turned on.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
        CODE_ALREADY_SEARCHING => HumanError {
            message: "Still searching for printers.".into(),
            suggestion: "Wait for the search to finish, then print again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
        CODE_NO_PRINTER => HumanError {
            message: "No printer available.".into(),
            suggestion: "Search for printers, then try printing again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
        CODE_NO_TEMPLATE => HumanError {
            message: "This label has no print layout.".into(),
            suggestion: "Contact your administrator to set up a label template.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
        _ => return None,
    };
    Some(human)
}

/// Fallback when a code has no dedicated message.
pub fn generic_print_error() -> HumanError {
    HumanError {
        message: "Could not print.".into(),
        suggestion: "Please try again.".into(),
        retriable: true,
        severity: Severity::Transient,
    }
}

/// Preformatted message naming the label that has no matching printer.
pub fn no_matching_printer(label: &str) -> HumanError {
    HumanError {
        message: format!("No printer info for {label}"),
        suggestion: "Contact your administrator to assign a printer to this label.".into(),
        retriable: false,
        severity: Severity::ActionRequired,
    }
}

/// Convert a `LabelpressError` into the message the user sees.
pub fn humanize_error(err: &LabelpressError) -> HumanError {
    match err {
        LabelpressError::NoMatchingPrinter { label } => no_matching_printer(label),
        other => humanize_code(other.code()).unwrap_or_else(generic_print_error),
    }
}

impl PrintFailure {
    /// Build the failure record for a print error.
    pub fn from_error(err: &LabelpressError) -> Self {
        let override_message = match err {
            LabelpressError::NoMatchingPrinter { label } => Some(no_matching_printer(label)),
            _ => None,
        };
        Self {
            code: err.code(),
            message: err.to_string(),
            override_message,
        }
    }

    /// Override first, then the code mapping, then the generic message.
    pub fn presentation(&self) -> HumanError {
        self.override_message
            .clone()
            .or_else(|| humanize_code(self.code))
            .unwrap_or_else(generic_print_error)
    }
}
