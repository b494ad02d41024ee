//! HTTP front end: routes incoming requests to script invocations and
//! renders results and failures through the media-type formatters.

pub mod auth;
pub mod config;
pub mod http_router;
pub mod http_server;

pub use auth::{basic_identity, PermissionHook};
pub use config::{debug_from_env, script_root_from_env, ServerConfig};
pub use http_router::ScriptRouter;
pub use http_server::WebscriptServer;
