// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template selection.
//
// A template matches a label when every criterion it declares is satisfied
// by the label's traits; a template without criteria matches everything.
// Among the matches the most constrained one wins, first-seen on ties.  No
// match is an error: printing never falls back to a guessed layout.

use serde_json::{Map, Value};
use tracing::debug;

use labelpress_core::error::{LabelpressError, Result};
use labelpress_core::types::{PrintLabel, PrintTemplate};

/// Trait key carrying the label stock size.
pub const SIZE_TRAIT: &str = "size";

/// The label as a JSON object, plus its stock size.
pub fn label_traits(label: &PrintLabel, label_size: &str) -> Value {
    let mut traits = match serde_json::to_value(label) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    traits.insert(SIZE_TRAIT.to_owned(), Value::from(label_size));
    Value::Object(traits)
}

/// Partial deep match: every part of `pattern` is present in `value`.
///
/// Objects match on the keys the pattern names; arrays match when each
/// pattern element matches some element of the value; numbers compare
/// numerically.
pub fn is_match(value: &Value, pattern: &Value) -> bool {
    match (value, pattern) {
        (Value::Object(value), Value::Object(pattern)) => pattern
            .iter()
            .all(|(key, expected)| value.get(key).is_some_and(|actual| is_match(actual, expected))),
        (Value::Array(value), Value::Array(pattern)) => pattern
            .iter()
            .all(|expected| value.iter().any(|actual| is_match(actual, expected))),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}

fn template_matches(traits: &Value, template: &PrintTemplate) -> bool {
    match &template.criteria {
        None => true,
        Some(criteria) => criteria
            .iter()
            .all(|(key, expected)| traits.get(key).is_some_and(|actual| is_match(actual, expected))),
    }
}

/// Pick the most specific template whose criteria the traits satisfy.
pub fn select_template<'a>(traits: &Value, catalog: &'a [PrintTemplate]) -> Result<&'a PrintTemplate> {
    let mut best: Option<&PrintTemplate> = None;
    for template in catalog.iter().filter(|t| template_matches(traits, t)) {
        match best {
            Some(current) if template.specificity() <= current.specificity() => {}
            _ => best = Some(template),
        }
    }

    match best {
        Some(template) => {
            debug!(specificity = template.specificity(), "template selected");
            Ok(template)
        }
        None => Err(LabelpressError::NoTemplate),
    }
}
