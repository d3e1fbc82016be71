// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: wires the labelpress crates into one session for the
// binary, and owns where config and the offline queue live on disk.

pub mod app_services;
pub mod data_dir;
