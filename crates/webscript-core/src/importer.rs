//! Scoped unit imports.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::binder::{bind, InvokeArgs};
use crate::environment::{LoadedUnit, ScriptEnvironment};
use crate::error::{Result, WebscriptError};
use crate::search_path::full_path;

/// A scope over one imported unit. Opening registers the unit's directory on
/// the search path and takes a registry reference; dropping the scope
/// releases it, so a unit nobody holds unloads and picks up file edits on its
/// next import.
pub struct ModuleImporter {
    environment: Arc<ScriptEnvironment>,
    unit: Arc<LoadedUnit>,
    unit_name: String,
}

impl ModuleImporter {
    pub fn open(
        environment: &Arc<ScriptEnvironment>,
        directory: impl AsRef<Path>,
        unit: &str,
    ) -> Result<Self> {
        let directory = full_path(directory, None);
        environment.insert_search_path(&directory, None);
        let loaded = environment.acquire(unit)?;
        tracing::debug!(unit, "import scope opened");
        Ok(Self {
            environment: Arc::clone(environment),
            unit: loaded,
            unit_name: unit.to_string(),
        })
    }

    pub fn unit(&self) -> &LoadedUnit {
        &self.unit
    }

    /// Bind `args` against the function's declared signature and call it.
    pub fn invoke(&self, function: &str, args: &InvokeArgs) -> Result<JsonValue> {
        let signature =
            self.unit
                .signature(function)
                .ok_or_else(|| WebscriptError::FunctionNotFound {
                    unit: self.unit_name.clone(),
                    function: function.to_string(),
                })?;
        let bound = bind(signature, args)?;
        self.unit.call(function, &bound)
    }
}

impl Drop for ModuleImporter {
    fn drop(&mut self) {
        self.environment.release(&self.unit_name);
        tracing::debug!(unit = %self.unit_name, "import scope closed");
    }
}
