// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::PathBuf;

/// Overrides the data directory, e.g. for a kiosk image.
const DATA_DIR_ENV: &str = "LABELPRESS_DATA_DIR";

/// Return the application data directory, creating it if needed.
///
/// On mobile the platform bridge should provide the documents directory
/// instead.
pub fn data_dir() -> PathBuf {
    let dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(explicit) => PathBuf::from(explicit),
        None => dirs_fallback().join("labelpress"),
    };
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn dirs_fallback() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    std::env::temp_dir()
}
