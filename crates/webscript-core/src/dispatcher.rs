//! Wire-path dispatch: parse, import, invoke.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::binder::InvokeArgs;
use crate::environment::ScriptEnvironment;
use crate::error::Result;
use crate::importer::ModuleImporter;
use crate::path::WirePath;

/// Execute the invocation named by a wire path, with unit lookup rooted at
/// `script_root`. The path's namespace picks the directory, the unit names
/// the file, and the function must be exported by it.
pub fn execute(
    environment: &Arc<ScriptEnvironment>,
    script_root: &Path,
    module_function_path: &str,
    args: &InvokeArgs,
) -> Result<JsonValue> {
    let path = WirePath::parse(module_function_path)?;
    let directory = script_root.join(&path.namespace);
    tracing::debug!(path = %path, "dispatching invocation");
    let importer = ModuleImporter::open(environment, directory, &path.unit)?;
    importer.invoke(&path.function, args)
}
