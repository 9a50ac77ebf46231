//! Content negotiation helpers.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)boundary="?([^";\s]+)"?"#).expect("boundary regex is valid")
});

static DISPOSITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)content-disposition:\s*form-data;\s*name="([^"]*)"(;\s*filename="[^"]*")?"#)
        .expect("disposition regex is valid")
});

/// Extract simple `name → value` fields from a `multipart/form-data` body.
///
/// File parts are recognised but not supported: they are logged and dropped.
pub fn read_multipart_form_data(content_type: &str, body: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();

    let Some(boundary) = BOUNDARY
        .captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        tracing::warn!(content_type, "Multipart content type without boundary");
        return fields;
    };

    let delimiter = format!("--{boundary}");
    for part in body.split(delimiter.as_str()) {
        let part = part.strip_prefix("\r\n").unwrap_or(part);
        // Preamble and the closing `--` carry no header block.
        let Some((head, value)) = part.split_once("\r\n\r\n") else {
            continue;
        };
        let Some(caps) = DISPOSITION.captures(head) else {
            continue;
        };
        let Some(name) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };

        if caps.get(2).is_some() {
            tracing::error!(field = name, "File parts in multipart bodies are not supported, dropping");
            continue;
        }

        let value = value.strip_suffix("\r\n").unwrap_or(value);
        fields.insert(name.to_owned(), value.to_owned());
    }

    fields
}
