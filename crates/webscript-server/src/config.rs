//! Server configuration.

use std::path::PathBuf;

/// Environment variable naming the script root directory.
pub const SCRIPT_ROOT_ENV: &str = "WEBSCRIPT_SCRIPT_ROOT";
/// Environment variable enabling debug mode.
pub const DEBUG_ENV: &str = "WEBSCRIPT_DEBUG";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory wire-path namespaces are resolved under.
    pub script_root: PathBuf,
    /// Debug servers accept anonymous requests; production servers require
    /// an authenticated user before dispatching.
    pub debug: bool,
}

impl ServerConfig {
    pub fn new(script_root: impl Into<PathBuf>) -> Self {
        Self {
            script_root: script_root.into(),
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Script root from the environment, when set to a non-empty value.
pub fn script_root_from_env() -> Option<PathBuf> {
    std::env::var(SCRIPT_ROOT_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

pub fn debug_from_env() -> bool {
    truthy(std::env::var(DEBUG_ENV).ok().as_deref())
}

fn truthy(value: Option<&str>) -> bool {
    value
        .map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}
