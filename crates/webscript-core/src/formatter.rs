//! Media-type formatters and Accept-header negotiation.
//!
//! A manager holds an ordered set of formatters; the first one registered is
//! the default used when a request carries no usable Accept header or nothing
//! matches. Negotiation walks the accepted patterns by descending quality and
//! returns the first registered formatter that matches, so ties go to
//! registration order.

use serde_json::Value as JsonValue;

use crate::error::{Result, WebscriptError};

pub trait MediaTypeFormatter: Send + Sync {
    fn media_type(&self) -> &'static str;
    fn serialize(&self, value: &JsonValue) -> Result<Vec<u8>>;
    fn deserialize(&self, body: &[u8]) -> Result<JsonValue>;
}

pub struct JsonFormatter;

impl MediaTypeFormatter for JsonFormatter {
    fn media_type(&self) -> &'static str {
        "application/json"
    }

    fn serialize(&self, value: &JsonValue) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| WebscriptError::Formatting(e.to_string()))
    }

    fn deserialize(&self, body: &[u8]) -> Result<JsonValue> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Scalars render as bare text, `null` as an empty body. Structured values
/// have no plain-text form and fail, letting the caller fall back to the
/// default formatter.
pub struct PlainTextFormatter;

impl MediaTypeFormatter for PlainTextFormatter {
    fn media_type(&self) -> &'static str {
        "text/plain"
    }

    fn serialize(&self, value: &JsonValue) -> Result<Vec<u8>> {
        let text = match value {
            JsonValue::Null => String::new(),
            JsonValue::Bool(b) => b.to_string(),
            JsonValue::Number(n) => n.to_string(),
            JsonValue::String(s) => s.clone(),
            JsonValue::Array(_) | JsonValue::Object(_) => {
                return Err(WebscriptError::Formatting(
                    "structured value has no text/plain form".into(),
                ))
            }
        };
        Ok(text.into_bytes())
    }

    fn deserialize(&self, body: &[u8]) -> Result<JsonValue> {
        let text = std::str::from_utf8(body)
            .map_err(|e| WebscriptError::Transport(format!("body is not utf-8: {e}")))?;
        Ok(JsonValue::String(text.to_string()))
    }
}

pub struct MediaTypeFormatterManager {
    formatters: Vec<Box<dyn MediaTypeFormatter>>,
}

impl MediaTypeFormatterManager {
    /// Create a manager whose default formatter is `default`.
    pub fn new(default: Box<dyn MediaTypeFormatter>) -> Self {
        Self {
            formatters: vec![default],
        }
    }

    pub fn with_formatter(mut self, formatter: Box<dyn MediaTypeFormatter>) -> Self {
        self.formatters.push(formatter);
        self
    }

    pub fn default_formatter(&self) -> &dyn MediaTypeFormatter {
        self.formatters[0].as_ref()
    }

    /// Exact lookup by a Content-Type header value, parameters ignored.
    pub fn formatter_for_content_type(&self, content_type: &str) -> Option<&dyn MediaTypeFormatter> {
        let essence = content_type_essence(content_type);
        self.formatters
            .iter()
            .find(|f| f.media_type() == essence)
            .map(|f| f.as_ref())
    }

    /// Pick the formatter for an Accept header. Absent, empty, or fully
    /// unmatched headers select the default.
    pub fn negotiate(&self, accept: Option<&str>) -> &dyn MediaTypeFormatter {
        let accept = match accept {
            Some(a) if !a.trim().is_empty() => a,
            _ => return self.default_formatter(),
        };
        for (pattern, _) in parse_accept(accept) {
            for formatter in &self.formatters {
                if media_type_matches(&pattern, formatter.media_type()) {
                    return formatter.as_ref();
                }
            }
        }
        self.default_formatter()
    }

    /// Serialize `value` for `accept` and stamp the matching Content-Type.
    /// Headers are only touched after serialization succeeds, so a failed
    /// attempt leaves the response clean for a fallback.
    pub fn respond_as(
        &self,
        value: &JsonValue,
        accept: Option<&str>,
        headers: &mut http::HeaderMap,
    ) -> Result<Vec<u8>> {
        let formatter = self.negotiate(accept);
        let body = formatter.serialize(value)?;
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static(formatter.media_type()),
        );
        Ok(body)
    }
}

impl Default for MediaTypeFormatterManager {
    fn default() -> Self {
        Self::new(Box::new(JsonFormatter)).with_formatter(Box::new(PlainTextFormatter))
    }
}

pub(crate) fn content_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

/// Parse an Accept header into `(pattern, q)` pairs sorted by descending
/// quality. Entries with `q=0` (or an unparseable negative) are dropped; a
/// malformed q parameter counts as 1.0.
fn parse_accept(accept: &str) -> Vec<(String, f32)> {
    let mut entries: Vec<(String, f32)> = Vec::new();
    for part in accept.split(',') {
        let mut pieces = part.split(';');
        let media = pieces.next().unwrap_or("").trim().to_ascii_lowercase();
        if media.is_empty() {
            continue;
        }
        let mut q = 1.0f32;
        for piece in pieces {
            let piece = piece.trim();
            if let Some(raw) = piece.strip_prefix("q=").or_else(|| piece.strip_prefix("Q=")) {
                q = raw.trim().parse::<f32>().unwrap_or(1.0);
            }
        }
        if !(q > 0.0) {
            continue;
        }
        entries.push((media, q));
    }
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    entries
}

fn media_type_matches(pattern: &str, media_type: &str) -> bool {
    if pattern == "*/*" {
        return true;
    }
    if let Some(kind) = pattern.strip_suffix("/*") {
        return media_type.split('/').next().unwrap_or("") == kind;
    }
    pattern == media_type
}
