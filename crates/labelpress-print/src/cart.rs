// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print cart: the ordered list of labels a user is about to print.

use serde::{Deserialize, Serialize};

use labelpress_core::types::PrintLabel;

/// Labels waiting to be printed, in the order they were added.
///
/// A label is identified by `id` + `phase_id`; adding one that is already
/// present replaces it in place.  A label with a count of 0 is removed.
/// A cart file is a plain label array, loaded through the same rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PrintLabel>", into = "Vec<PrintLabel>")]
pub struct PrintCart {
    labels: Vec<PrintLabel>,
}

impl From<Vec<PrintLabel>> for PrintCart {
    fn from(labels: Vec<PrintLabel>) -> Self {
        let mut cart = Self::new();
        for label in labels {
            cart.add(label);
        }
        cart
    }
}

impl From<PrintCart> for Vec<PrintLabel> {
    fn from(cart: PrintCart) -> Self {
        cart.labels
    }
}

impl PrintCart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label, replacing an existing entry for the same label.
    pub fn add(&mut self, label: PrintLabel) {
        if label.count == 0 {
            self.remove(&label);
            return;
        }
        match self.labels.iter_mut().find(|l| l.is_same_label(&label)) {
            Some(existing) => *existing = label,
            None => self.labels.push(label),
        }
    }

    pub fn remove(&mut self, label: &PrintLabel) {
        self.labels.retain(|l| !l.is_same_label(label));
    }

    /// Change how many copies of a label to print; 0 removes it.
    pub fn set_count(&mut self, label: &PrintLabel, count: u32) {
        if count == 0 {
            self.remove(label);
        } else if let Some(existing) = self.labels.iter_mut().find(|l| l.is_same_label(label)) {
            existing.count = count;
        }
    }

    /// Replace the entry for `label` without changing its position.
    /// Returns `false` if the label is not in the cart.
    pub fn update_item(&mut self, label: PrintLabel) -> bool {
        match self.labels.iter().position(|l| l.is_same_label(&label)) {
            Some(index) if label.count == 0 => {
                self.labels.remove(index);
                true
            }
            Some(index) => {
                self.labels[index] = label;
                true
            }
            None => false,
        }
    }

    /// Keep only the labels that failed, e.g. after a batch print.
    pub fn retain_failed(&mut self, failed: &[PrintLabel]) {
        self.labels
            .retain(|l| failed.iter().any(|f| f.is_same_label(l)));
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn labels(&self) -> &[PrintLabel] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
