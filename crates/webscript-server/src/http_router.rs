//! Request routing and the invocation pipeline.

use std::sync::Arc;

use http::{header, HeaderMap, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response};
use serde_json::Value as JsonValue;

use webscript_core::{
    execute, ErrorPayload, InvokeArgs, MediaTypeFormatterManager, RequestArguments, RequestParts,
    ScriptEnvironment, WebscriptError,
};

use crate::auth::{basic_identity, PermissionHook};
use crate::config::ServerConfig;

pub type HyperRequest = Request<Incoming>;
pub type HyperResponse = Response<Full<Bytes>>;

/// Routes requests to script invocations.
///
/// `/whoami` reports the authenticated username, or `null`. Everything under
/// `/scripts/{app}/{path}` invokes the wire path beneath the configured
/// script root. The `app` segment is a permission scope consulted by the
/// hook; it takes no part in unit resolution.
///
/// Failures map to 401 for the two authorization gates and 500 for
/// everything else, with the error payload rendered through the same
/// formatter negotiation as results.
pub struct ScriptRouter {
    environment: Arc<ScriptEnvironment>,
    formatters: Arc<MediaTypeFormatterManager>,
    config: ServerConfig,
    permission: Option<PermissionHook>,
}

impl ScriptRouter {
    pub fn new(
        environment: Arc<ScriptEnvironment>,
        formatters: Arc<MediaTypeFormatterManager>,
        config: ServerConfig,
        permission: Option<PermissionHook>,
    ) -> Self {
        Self {
            environment,
            formatters,
            config,
            permission,
        }
    }

    pub async fn handle(&self, req: HyperRequest) -> Result<HyperResponse, WebscriptError> {
        Ok(self.route(req).await)
    }

    async fn route(&self, req: HyperRequest) -> HyperResponse {
        let accept = header_string(req.headers(), header::ACCEPT);
        let accept = accept.as_deref();
        let path = req.uri().path().to_string();

        if path == "/whoami" {
            return self.whoami(&req, accept);
        }
        if let Some(rest) = path.strip_prefix("/scripts/") {
            return self.invoke_script(req, rest, accept).await;
        }
        self.respond_error(
            StatusCode::NOT_FOUND,
            ErrorPayload::new("NotFoundError", format!("no route for '{path}'")),
            accept,
        )
    }

    fn whoami(&self, req: &HyperRequest, accept: Option<&str>) -> HyperResponse {
        if !matches!(*req.method(), Method::GET | Method::POST) {
            return self.method_not_allowed(req.method(), accept);
        }
        let identity = match basic_identity(req.headers()) {
            Some(user) => JsonValue::String(user),
            None => JsonValue::Null,
        };
        self.respond_value(&identity, accept)
    }

    async fn invoke_script(
        &self,
        req: HyperRequest,
        rest: &str,
        accept: Option<&str>,
    ) -> HyperResponse {
        let Some((app, wire_path)) = rest.split_once('/').filter(|(a, p)| {
            !a.is_empty() && !p.trim_matches('/').is_empty()
        }) else {
            return self.respond_error(
                StatusCode::NOT_FOUND,
                ErrorPayload::new(
                    "NotFoundError",
                    "script routes are /scripts/{app}/{path}",
                ),
                accept,
            );
        };
        if !matches!(
            *req.method(),
            Method::GET | Method::POST | Method::PUT | Method::DELETE | Method::PATCH
        ) {
            return self.method_not_allowed(req.method(), accept);
        }

        let identity = basic_identity(req.headers());
        if identity.is_none() && !self.config.debug {
            return self.unauthenticated(accept);
        }
        if let Some(hook) = self.permission.as_deref() {
            if !hook(app, identity.as_deref(), wire_path) {
                let user = identity.as_deref().unwrap_or("anonymous");
                tracing::warn!(app, user, path = wire_path, "permission denied");
                return self.respond_error(
                    StatusCode::UNAUTHORIZED,
                    ErrorPayload::new(
                        "PermissionError",
                        format!("user '{user}' has no permission to invoke '{wire_path}'"),
                    ),
                    accept,
                );
            }
        }

        let query = req.uri().query().map(str::to_string);
        let content_type = header_string(req.headers(), header::CONTENT_TYPE);
        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes().to_vec(),
            Err(e) => {
                return self.respond_failure(
                    WebscriptError::Transport(format!("body read failed: {e}")),
                    accept,
                )
            }
        };

        let parts = RequestParts {
            query,
            content_type,
            body,
        };
        let mut arguments = match RequestArguments::from_parts(&parts, &self.formatters) {
            Ok(arguments) => arguments,
            Err(err) => return self.respond_failure(err, accept),
        };
        if let Some(user) = &identity {
            // pinned above anything the request itself supplied
            arguments.override_value("actual_username", JsonValue::String(user.clone()));
        }

        let environment = Arc::clone(&self.environment);
        let script_root = self.config.script_root.clone();
        let wire = wire_path.to_string();
        let args = InvokeArgs::Named(arguments);
        // script execution blocks on the engine; keep it off the io driver
        let outcome =
            tokio::task::spawn_blocking(move || execute(&environment, &script_root, &wire, &args))
                .await;

        match outcome {
            Ok(Ok(value)) => self.respond_value(&value, accept),
            Ok(Err(err)) => self.respond_failure(err, accept),
            Err(e) => self.respond_failure(
                WebscriptError::Transport(format!("invocation task failed: {e}")),
                accept,
            ),
        }
    }

    fn respond_value(&self, value: &JsonValue, accept: Option<&str>) -> HyperResponse {
        let mut headers = HeaderMap::new();
        match self.formatters.respond_as(value, accept, &mut headers) {
            Ok(body) => build_response(StatusCode::OK, headers, body),
            Err(err) => self.respond_failure(err, accept),
        }
    }

    fn respond_failure(&self, err: WebscriptError, accept: Option<&str>) -> HyperResponse {
        tracing::warn!(kind = err.kind(), error = %err, "invocation failed");
        self.respond_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorPayload::from_error(&err),
            accept,
        )
    }

    fn respond_error(
        &self,
        status: StatusCode,
        payload: ErrorPayload,
        accept: Option<&str>,
    ) -> HyperResponse {
        let value = serde_json::to_value(&payload).unwrap_or(JsonValue::Null);
        let mut headers = HeaderMap::new();
        if let Ok(body) = self.formatters.respond_as(&value, accept, &mut headers) {
            return build_response(status, headers, body);
        }
        // the negotiated formatter may not render structured payloads
        let mut headers = HeaderMap::new();
        if let Ok(body) = self.formatters.respond_as(&value, None, &mut headers) {
            return build_response(status, headers, body);
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            http::HeaderValue::from_static("text/plain"),
        );
        build_response(status, headers, payload.message.into_bytes())
    }

    fn unauthenticated(&self, accept: Option<&str>) -> HyperResponse {
        let mut response = self.respond_error(
            StatusCode::UNAUTHORIZED,
            ErrorPayload::new(
                "AuthenticationError",
                "the requested resource requires user authentication",
            ),
            accept,
        );
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            http::HeaderValue::from_static("Basic realm=\"webscript\""),
        );
        response
    }

    fn method_not_allowed(&self, method: &Method, accept: Option<&str>) -> HyperResponse {
        self.respond_error(
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorPayload::new(
                "MethodNotAllowedError",
                format!("method {method} is not supported here"),
            ),
            accept,
        )
    }
}

fn header_string(headers: &HeaderMap, name: impl http::header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> HyperResponse {
    let mut response = Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body)))
        .unwrap();
    response.headers_mut().extend(headers);
    response
}
