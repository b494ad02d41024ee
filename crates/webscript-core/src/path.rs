//! Request path decomposition.
//!
//! A wire path names a function inside a code unit, optionally nested under
//! namespace segments: `/{namespace...}/{unit}.{function}` or
//! `/{namespace...}/{unit}/{function}`. The namespace is a routing prefix
//! joined onto the script root; it never affects which functions a unit
//! exports.

use std::fmt;

use crate::error::{Result, WebscriptError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirePath {
    pub namespace: String,
    pub unit: String,
    pub function: String,
}

impl WirePath {
    /// Decompose a raw request path into (namespace, unit, function).
    ///
    /// Leading and trailing slashes are stripped and empty segments are
    /// collapsed. When the final segment contains a dot it is split at the
    /// last one, so dotted unit names stay intact (`pkg.mod.convert` names
    /// the unit `pkg.mod`). Paths with fewer than two segments do not
    /// identify a unit and are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(WebscriptError::MalformedPath(raw.to_string()));
        }

        let last = segments[segments.len() - 1];
        if let Some((unit, function)) = last.rsplit_once('.') {
            if unit.is_empty() || function.is_empty() {
                return Err(WebscriptError::MalformedPath(raw.to_string()));
            }
            return Ok(Self {
                namespace: segments[..segments.len() - 1].join("/"),
                unit: unit.to_string(),
                function: function.to_string(),
            });
        }

        Ok(Self {
            namespace: segments[..segments.len() - 2].join("/"),
            unit: segments[segments.len() - 2].to_string(),
            function: last.to_string(),
        })
    }
}

impl fmt::Display for WirePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}.{}", self.unit, self.function)
        } else {
            write!(f, "{}/{}.{}", self.namespace, self.unit, self.function)
        }
    }
}
