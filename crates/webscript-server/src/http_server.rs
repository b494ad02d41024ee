//! HTTP server loop.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use webscript_core::{MediaTypeFormatterManager, ScriptEnvironment};

use crate::auth::PermissionHook;
use crate::config::ServerConfig;
use crate::http_router::ScriptRouter;

/// Owns the shared pieces of a running server and accepts connections.
pub struct WebscriptServer {
    environment: Arc<ScriptEnvironment>,
    formatters: Arc<MediaTypeFormatterManager>,
    config: ServerConfig,
    permission: Option<PermissionHook>,
}

impl WebscriptServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            environment: Arc::new(ScriptEnvironment::new()),
            formatters: Arc::new(MediaTypeFormatterManager::default()),
            config,
            permission: None,
        }
    }

    /// Replace the formatter set, e.g. to register additional media types.
    pub fn with_formatters(mut self, formatters: MediaTypeFormatterManager) -> Self {
        self.formatters = Arc::new(formatters);
        self
    }

    pub fn with_permission_hook(mut self, hook: PermissionHook) -> Self {
        self.permission = Some(hook);
        self
    }

    /// Bind `addr` and serve until the process exits.
    pub async fn run(self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let router = Arc::new(ScriptRouter::new(
            self.environment,
            self.formatters,
            self.config,
            self.permission,
        ));
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "listening");
        }
        loop {
            let (stream, peer) = listener.accept().await?;
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let router = Arc::clone(&router);
                    async move { router.handle(req).await }
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}
