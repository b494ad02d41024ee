//! Invocation of script units addressed by wire paths.
//!
//! A wire path such as `billing/reports.summary` names a directory, a script
//! file, and an exported function. Executing it resolves the file under the
//! registered search paths, evaluates it once into a persistent engine
//! context, binds the request's arguments to the function's declared
//! parameters, and returns the JSON result. Units stay loaded while any
//! import scope holds them and are reread from disk once the last scope
//! closes.

pub mod binder;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod formatter;
pub mod importer;
pub mod path;
pub mod runtime;
pub mod search_path;

pub use binder::{
    bind, BoundCallArguments, BoundValue, InvokeArgs, RequestArguments, RequestParts,
};
pub use dispatcher::execute;
pub use environment::{LoadedUnit, ScriptEnvironment};
pub use error::{ErrorPayload, Result, WebscriptError};
pub use formatter::{
    JsonFormatter, MediaTypeFormatter, MediaTypeFormatterManager, PlainTextFormatter,
};
pub use importer::ModuleImporter;
pub use path::WirePath;
pub use runtime::signature::{scan_signatures, DefaultValue, FunctionSignature, Param, TypeTag};
pub use search_path::{full_path, path_key, same_path};
