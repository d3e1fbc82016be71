// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label rendering: lookup dictionary, placeholder substitution, copy count,
// and escape decoding for the native SDKs.
//
// Templates reference values as `{{key}}`.  Keys come from the label's own
// fields, brand- and customer-specific identifier providers, and the
// resolved location name.  The literal value "Custom" (any case, trimmed)
// means the user never filled the custom value in and renders as empty.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use labelpress_core::types::{PrintContext, PrintLabel, PrintTemplate, PrinterBrand};

/// Values available to a template for one render call.
pub type LookupDictionary = BTreeMap<String, String>;

/// Computes extra template identifiers for a label.
pub type IdentifierFn = Arc<dyn Fn(&PrintLabel, &PrintContext) -> LookupDictionary + Send + Sync>;

/// Key the location name is exposed under.
pub const LOCATION_NAME_KEY: &str = "locationName";

/// Sentinel for "custom value never entered".
const CUSTOM_SENTINEL: &str = "custom";

/// Extra identifier providers, applied generic → brand → customer so that
/// more specific providers override.
#[derive(Clone, Default)]
pub struct IdentifierRegistry {
    generic: Option<IdentifierFn>,
    by_brand: HashMap<PrinterBrand, IdentifierFn>,
    by_customer: HashMap<i64, IdentifierFn>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generic(mut self, provider: IdentifierFn) -> Self {
        self.generic = Some(provider);
        self
    }

    pub fn with_brand(mut self, brand: PrinterBrand, provider: IdentifierFn) -> Self {
        self.by_brand.insert(brand, provider);
        self
    }

    pub fn with_customer(mut self, customer_id: i64, provider: IdentifierFn) -> Self {
        self.by_customer.insert(customer_id, provider);
        self
    }

    fn resolve(&self, label: &PrintLabel, context: &PrintContext, brand: PrinterBrand) -> LookupDictionary {
        let mut identifiers = LookupDictionary::new();
        let providers = [
            self.generic.as_ref(),
            self.by_brand.get(&brand),
            self.by_customer.get(&context.customer_id),
        ];
        for provider in providers.into_iter().flatten() {
            identifiers.extend(provider(label, context));
        }
        identifiers
    }
}

/// Renders labels for one print context.
#[derive(Clone, Default)]
pub struct LabelRenderer {
    context: PrintContext,
    identifiers: IdentifierRegistry,
}

impl LabelRenderer {
    pub fn new(context: PrintContext, identifiers: IdentifierRegistry) -> Self {
        Self {
            context,
            identifiers,
        }
    }

    pub fn context(&self) -> &PrintContext {
        &self.context
    }

    /// Union of label fields, extra identifiers, and the location name.
    pub fn lookup_dictionary(&self, label: &PrintLabel, brand: PrinterBrand) -> LookupDictionary {
        let mut dictionary = LookupDictionary::new();
        if let Ok(Value::Object(fields)) = serde_json::to_value(label) {
            for (key, value) in fields {
                if let Some(text) = scalar_text(&value) {
                    dictionary.insert(key, text);
                }
            }
        }
        dictionary.extend(self.identifiers.resolve(label, &self.context, brand));
        dictionary.insert(LOCATION_NAME_KEY.to_owned(), self.context.location_name.clone());

        for value in dictionary.values_mut() {
            if value.trim().eq_ignore_ascii_case(CUSTOM_SENTINEL) {
                value.clear();
            }
        }
        dictionary
    }

    /// Substitute the dictionary into the template and repeat it once per copy.
    pub fn render(&self, template: &PrintTemplate, label: &PrintLabel, brand: PrinterBrand) -> String {
        let dictionary = self.lookup_dictionary(label, brand);
        let single = substitute(&template.content, &dictionary);
        debug!(label = %label.name, copies = label.count, bytes = single.len(), "label rendered");
        single.repeat(label.count as usize)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Replace every `{{key}}` with its dictionary value; unknown keys render
/// empty.  An unterminated `{{` is kept literally.
pub fn substitute(content: &str, dictionary: &LookupDictionary) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(value) = dictionary.get(key) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Turn stored escapes into real characters: `\u{HEX}` becomes the code
/// point (U+FFFD when invalid), `\r` and `\n` become CR and LF.
pub fn decode_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().map(|&(_, next)| next) {
            Some('r') => {
                chars.next();
                out.push('\r');
            }
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('u') => match parse_unicode_escape(&input[index..]) {
                Some((decoded, consumed)) => {
                    out.push(decoded);
                    // `consumed` counts bytes of an ASCII-only sequence.
                    for _ in 1..consumed {
                        chars.next();
                    }
                }
                None => out.push(c),
            },
            _ => out.push(c),
        }
    }
    out
}

/// Parse `\u{HEX}` at the start of `s`; returns the char and bytes consumed.
fn parse_unicode_escape(s: &str) -> Option<(char, usize)> {
    let body = s.strip_prefix("\\u{")?;
    let end = body.find('}')?;
    let hex = &body[..end];
    if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let decoded = u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER);
    Some((decoded, 3 + end + 1))
}
