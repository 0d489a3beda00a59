//! Route dispatcher built on top of the pattern compiler and the middleware
//! pipeline composer.
use crate::channel::{Broker, ChannelRouter};
use crate::context::{Context, HandlerFn, WsUpgrade};
use crate::http::{Method, Params, Response};
use crate::route::{CompileError, Pattern};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// What [`Router::handle`] produced: the HTTP response to write, plus
/// whatever WebSocket handoff a handler requested via
/// [`crate::Context::upgrade_to_channels`]/[`crate::Context::upgrade_to_raw`].
pub struct Handled {
    pub response: Response,
    pub ws_upgrade: Option<WsUpgrade>,
}

struct Route {
    method: Method,
    pattern: Pattern,
    middleware: Vec<HandlerFn>,
    handler: HandlerFn,
    name: Option<String>,
}

/// Method + pattern + middleware table. Built once at startup and shared
/// (read-only) across every worker thread. Also carries the optional
/// channel-protocol table and the process-wide broker, since both are as
/// long-lived and as widely shared as the route table itself.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    global_middleware: Vec<HandlerFn>,
    names: HashMap<String, usize>,
    channels: Option<Arc<ChannelRouter>>,
    broker: Arc<Broker>,
    next_socket_id: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPathError {
    UnknownRoute,
    MissingParam,
    BufferTooSmall,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a compiled channel table. Connections that call
    /// [`crate::Context::upgrade_to_channels`] are routed through it.
    pub fn mount_channels(&mut self, channels: ChannelRouter) -> &mut Self {
        self.channels = Some(Arc::new(channels));
        self
    }

    pub fn channels(&self) -> Option<&Arc<ChannelRouter>> {
        self.channels.as_ref()
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// A process-wide-unique id for a newly upgraded socket, used as the
    /// broker's subscriber handle.
    pub fn next_socket_id(&self) -> u64 {
        self.next_socket_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers middleware that runs ahead of every route. The terminal
    /// handler in the global pipeline is the router dispatcher itself.
    pub fn wrap(&mut self, mw: HandlerFn) -> &mut Self {
        self.global_middleware.push(mw);
        self
    }

    /// Registers a route. Panics on an invalid pattern — route tables are
    /// compiled once at startup, so a bad pattern is a programmer error
    /// caught immediately rather than a runtime failure deep in a request.
    pub fn add(&mut self, method: Method, pattern: &str, handler: HandlerFn) -> RouteHandle<'_> {
        let compiled = Pattern::compile(pattern).unwrap_or_else(|e| {
            panic!("invalid route pattern {pattern:?}: {e:?}");
        });
        self.routes.push(Route {
            method,
            pattern: compiled,
            middleware: Vec::new(),
            handler,
            name: None,
        });
        let idx = self.routes.len() - 1;
        RouteHandle { router: self, idx }
    }

    pub fn get(&mut self, pattern: &str, handler: HandlerFn) -> RouteHandle<'_> {
        self.add(Method::Get, pattern, handler)
    }
    pub fn post(&mut self, pattern: &str, handler: HandlerFn) -> RouteHandle<'_> {
        self.add(Method::Post, pattern, handler)
    }
    pub fn put(&mut self, pattern: &str, handler: HandlerFn) -> RouteHandle<'_> {
        self.add(Method::Put, pattern, handler)
    }
    pub fn delete(&mut self, pattern: &str, handler: HandlerFn) -> RouteHandle<'_> {
        self.add(Method::Delete, pattern, handler)
    }
    pub fn patch(&mut self, pattern: &str, handler: HandlerFn) -> RouteHandle<'_> {
        self.add(Method::Patch, pattern, handler)
    }
    pub fn options(&mut self, pattern: &str, handler: HandlerFn) -> RouteHandle<'_> {
        self.add(Method::Options, pattern, handler)
    }

    /// Runs the full pipeline for one request: global middleware, then
    /// routing, then the matched route's own middleware and handler. HEAD
    /// requests fall back to the matching GET route and have their body
    /// suppressed afterward while keeping `Content-Length` accurate.
    pub fn handle<'a>(&'a self, request: &'a crate::http::Request<'a>) -> Handled {
        let mut ctx = Context::new(request, self);
        ctx.set_chain(&self.global_middleware, dispatch_entry);

        // A handler or middleware panic must not take down the worker thread
        // or leak into the caller; it becomes a 500 like any other handler
        // failure.
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| ctx.next())) {
            let detail = panic_message(&payload);
            tracing::error!(path = request.path, detail, "handler panicked");
            ctx.response = Response::internal_error();
            ctx.ws_upgrade = None;
        }

        if ctx.ws_upgrade.is_none() && matches!(request.method, Method::Head) {
            ctx.response.suppress_body_for_head();
        }
        Handled {
            response: ctx.response,
            ws_upgrade: ctx.ws_upgrade,
        }
    }

    fn dispatch<'a>(&'a self, ctx: &mut Context<'a>) {
        let path = ctx.request.path;
        let method = ctx.request.method;
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let mut params = Params::new();
            if !route.pattern.matches(path, &mut params) {
                continue;
            }
            let method_matches =
                route.method == method || (method == Method::Head && route.method == Method::Get);
            if method_matches {
                ctx.path_params = params;
                ctx.set_chain(&route.middleware, route.handler);
                ctx.next();
                return;
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method);
            }
        }

        ctx.response = if allowed.is_empty() {
            Response::not_found()
        } else {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            Response::method_not_allowed(&allow)
        };
    }

    /// Interpolates `params` back into the named route's pattern (spec
    /// §4.2 "reverse map from route name... to pattern").
    pub fn build_path(&self, name: &str, params: &[(&str, &str)]) -> Result<String, BuildPathError> {
        let idx = *self.names.get(name).ok_or(BuildPathError::UnknownRoute)?;
        let route = &self.routes[idx];
        let mut out = String::new();
        for segment in route.pattern.source().split('/').filter(|s| !s.is_empty()) {
            out.push('/');
            if let Some(param_name) = segment.strip_prefix(':').or_else(|| segment.strip_prefix('*')) {
                let value = params
                    .iter()
                    .find(|(k, _)| *k == param_name)
                    .map(|(_, v)| *v)
                    .ok_or(BuildPathError::MissingParam)?;
                out.push_str(value);
            } else {
                out.push_str(segment);
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }
}

/// A plain `fn` terminal for the global chain that hands off to the
/// router's own dispatch, which in turn installs the matched route's
/// middleware and handler as the *next* link before calling `ctx.next()`
/// again, saving and restoring `context.next` around it so chaining
/// composes correctly.
fn dispatch_entry(ctx: &mut Context<'_>) {
    ctx.router.dispatch(ctx);
}

/// Best-effort extraction of a panic's message for logging. Handler panics
/// almost always carry a `&str` or `String` payload (from `panic!`/`unwrap`);
/// anything else is logged as opaque.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Returned by route-registration methods so a route's name and
/// per-route middleware can be attached fluently:
/// `router.get("/users/:id", handler).name("user").middleware(&[auth])`.
pub struct RouteHandle<'r> {
    router: &'r mut Router,
    idx: usize,
}

impl<'r> RouteHandle<'r> {
    pub fn name(self, name: &str) -> Self {
        self.router.names.insert(name.to_string(), self.idx);
        self.router.routes[self.idx].name = Some(name.to_string());
        self
    }

    pub fn middleware(self, mw: &[HandlerFn]) -> Self {
        self.router.routes[self.idx].middleware.extend_from_slice(mw);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Version};

    fn echo_id(ctx: &mut Context) {
        let id = ctx.param("id").unwrap_or("").to_string();
        ctx.response = Response::ok(id);
    }

    fn page_handler(ctx: &mut Context) {
        ctx.response = Response::ok("body content");
    }

    fn panicking_handler(_ctx: &mut Context) {
        panic!("boom");
    }

    fn req<'a>(method: Method, path: &'a str) -> Request<'a> {
        Request {
            method,
            version: Version::Http11,
            path,
            query: None,
            headers: crate::http::Headers::new(),
            body: None,
        }
    }

    #[test]
    fn matches_param_route_and_echoes_value() {
        let mut router = Router::new();
        router.get("/users/:id", echo_id);
        let request = req(Method::Get, "/users/42");
        let resp = router.handle(&request).response;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"42");
    }

    #[test]
    fn unmatched_method_on_known_path_is_405_with_allow() {
        let mut router = Router::new();
        router.get("/hello", page_handler);
        let request = req(Method::Post, "/hello");
        let resp = router.handle(&request).response;
        assert_eq!(resp.status, 405);
        assert_eq!(resp.headers.get("Allow"), Some("GET"));
    }

    #[test]
    fn handler_panic_becomes_500_instead_of_unwinding() {
        let mut router = Router::new();
        router.get("/boom", panicking_handler);
        let request = req(Method::Get, "/boom");
        let resp = router.handle(&request).response;
        assert_eq!(resp.status, 500);
    }

    #[test]
    fn unmatched_path_is_404() {
        let router = Router::new();
        let request = req(Method::Get, "/nope");
        let resp = router.handle(&request).response;
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn head_falls_back_to_get_and_suppresses_body_but_keeps_length() {
        let mut router = Router::new();
        router.get("/page", page_handler);
        let request = req(Method::Head, "/page");
        let resp = router.handle(&request).response;
        assert_eq!(resp.status, 200);
        assert!(resp.body.is_empty());
        let bytes = resp.serialize("chopin");
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Content-Length: 12\r\n"));
    }

    fn upgrade_handler(ctx: &mut Context) {
        let _ = ctx.upgrade_to_channels();
    }

    fn ws_upgrade_request<'a>() -> Request<'a> {
        let mut headers = crate::http::Headers::new();
        headers.push("Upgrade", "websocket");
        headers.push("Connection", "Upgrade");
        headers.push("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==");
        headers.push("Sec-WebSocket-Version", "13");
        Request {
            method: Method::Get,
            version: Version::Http11,
            path: "/ws",
            query: None,
            headers,
            body: None,
        }
    }

    #[test]
    fn upgrade_to_channels_returns_101_and_ws_upgrade() {
        let mut router = Router::new();
        router.mount_channels(crate::channel::ChannelRouter::new());
        router.get("/ws", upgrade_handler);
        let request = ws_upgrade_request();
        let handled = router.handle(&request);
        assert_eq!(handled.response.status, 101);
        assert_eq!(handled.response.headers.get("Sec-WebSocket-Accept"), Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
        assert!(matches!(handled.ws_upgrade, Some(WsUpgrade::Channels)));
    }

    #[test]
    fn head_suppression_is_skipped_when_upgrading() {
        let mut router = Router::new();
        router.mount_channels(crate::channel::ChannelRouter::new());
        router.get("/ws", upgrade_handler);
        let mut request = ws_upgrade_request();
        request.method = Method::Head;
        let handled = router.handle(&request);
        assert_eq!(handled.response.status, 101);
    }

    #[test]
    fn build_path_interpolates_named_route() {
        let mut router = Router::new();
        router.get("/users/:id", echo_id).name("user_show");
        let path = router.build_path("user_show", &[("id", "7")]).unwrap();
        assert_eq!(path, "/users/7");
    }

    #[test]
    fn build_path_missing_param_errors() {
        let mut router = Router::new();
        router.get("/users/:id", echo_id).name("user_show");
        assert_eq!(
            router.build_path("user_show", &[]),
            Err(BuildPathError::MissingParam)
        );
    }
}
