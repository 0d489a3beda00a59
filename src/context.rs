//! Per-request pipeline context: request/response, route and query params,
//! the assigns bag, and the remainder of the middleware chain.
use crate::arena::Arena;
use crate::http::{Assigns, Params, Request, Response};
use crate::router::Router;
use crate::ws::{FrameHandler, HandshakeError, WsSender};
use std::sync::Arc;

/// What a handler wants to happen to the connection once the HTTP response
/// has been written: after the handler calls upgrade, the response ends
/// with 101 and the frame loop takes over the same byte stream. `Raw`
/// defers building the actual [`FrameHandler`] until the connection loop
/// has a real [`WsSender`] to hand it, matching the rest of the
/// framework's plain-`fn`-pointer composition style.
pub enum WsUpgrade {
    /// Route the connection through the channel protocol.
    Channels,
    /// Hand the connection to a raw, handler-supplied [`FrameHandler`].
    Raw(fn(Arc<dyn WsSender>) -> Box<dyn FrameHandler>),
}

/// A pipeline step. Handlers and middleware share this signature; a
/// middleware distinguishes itself only by calling [`Context::next`] before
/// or after doing its own work (or not calling it at all, to short-circuit).
/// The higher-ranked lifetime lets one `fn` pointer serve every request,
/// regardless of which request buffer `Context<'a>` currently borrows from.
pub type HandlerFn = for<'r> fn(&mut Context<'r>);

/// Carries the request, the response under construction, route/query
/// params, the assigns bag, a per-request arena, and the remainder of the
/// middleware chain.
pub struct Context<'a> {
    pub request: &'a Request<'a>,
    pub response: Response,
    pub path_params: Params<'a>,
    pub query_params: Params<'a>,
    pub assigns: Assigns,
    pub arena: Arena,
    pub router: &'a Router,
    /// Set by [`Context::upgrade_to_channels`]/[`Context::upgrade_to_raw`]
    /// once the handshake validates; the connection loop reads this after
    /// the pipeline returns to decide whether to hand off to the WebSocket
    /// frame loop.
    pub ws_upgrade: Option<WsUpgrade>,

    remaining: &'a [HandlerFn],
    terminal: Option<HandlerFn>,
}

impl<'a> Context<'a> {
    pub fn new(request: &'a Request<'a>, router: &'a Router) -> Self {
        let query_params = crate::http::parse_query(request.query.unwrap_or(""));
        Self {
            request,
            response: Response::new(200),
            path_params: Params::new(),
            query_params,
            assigns: Assigns::new(),
            arena: Arena::new(),
            router,
            ws_upgrade: None,
            remaining: &[],
            terminal: None,
        }
    }

    /// Validates the request as an RFC 6455 upgrade and, on success, sets
    /// `self.response` to the `101` handshake response and marks the
    /// connection to be routed through the channel protocol once the
    /// pipeline finishes.
    pub fn upgrade_to_channels(&mut self) -> Result<(), HandshakeError> {
        let accept_key = crate::ws::validate_and_accept_key(self.request)?;
        self.response = crate::ws::switching_protocols_response(&accept_key, "");
        self.ws_upgrade = Some(WsUpgrade::Channels);
        Ok(())
    }

    /// Like [`Self::upgrade_to_channels`], but hands the connection to a
    /// raw [`FrameHandler`] built by `factory` once a [`WsSender`] for this
    /// connection exists.
    pub fn upgrade_to_raw(&mut self, factory: fn(Arc<dyn WsSender>) -> Box<dyn FrameHandler>) -> Result<(), HandshakeError> {
        let accept_key = crate::ws::validate_and_accept_key(self.request)?;
        self.response = crate::ws::switching_protocols_response(&accept_key, "");
        self.ws_upgrade = Some(WsUpgrade::Raw(factory));
        Ok(())
    }

    pub(crate) fn set_chain(&mut self, remaining: &'a [HandlerFn], terminal: HandlerFn) {
        self.remaining = remaining;
        self.terminal = Some(terminal);
    }

    /// Invokes the next pipeline step. A no-op once the chain is exhausted.
    pub fn next(&mut self) {
        if let Some((first, rest)) = self.remaining.split_first() {
            self.remaining = rest;
            first(self);
        } else if let Some(handler) = self.terminal.take() {
            handler(self);
        }
    }

    pub fn has_next(&self) -> bool {
        !self.remaining.is_empty() || self.terminal.is_some()
    }

    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.path_params.get(name)
    }

    pub fn query(&self, name: &str) -> Option<&'a str> {
        self.query_params.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, Version};
    use crate::router::Router;

    fn req<'a>() -> Request<'a> {
        Request {
            method: Method::Get,
            version: Version::Http11,
            path: "/",
            query: None,
            headers: crate::http::Headers::new(),
            body: None,
        }
    }

    fn set_body(ctx: &mut Context) {
        ctx.response = Response::ok("from handler");
    }

    fn logs_then_next(ctx: &mut Context) {
        ctx.assigns.set("visited", "mw");
        ctx.next();
    }

    fn short_circuit(ctx: &mut Context) {
        ctx.response = Response::new(401).with_body("blocked");
        // deliberately does not call ctx.next()
    }

    #[test]
    fn chain_runs_middleware_then_handler() {
        let router = Router::new();
        let request = req();
        let mut ctx = Context::new(&request, &router);
        let chain: &[HandlerFn] = &[logs_then_next];
        ctx.set_chain(chain, set_body);
        ctx.next();
        assert_eq!(ctx.assigns.get("visited"), Some("mw"));
        assert_eq!(ctx.response.body, b"from handler");
    }

    #[test]
    fn short_circuit_skips_handler() {
        let router = Router::new();
        let request = req();
        let mut ctx = Context::new(&request, &router);
        let chain: &[HandlerFn] = &[short_circuit];
        ctx.set_chain(chain, set_body);
        ctx.next();
        assert_eq!(ctx.response.status, 401);
    }

    #[test]
    fn next_is_noop_once_chain_exhausted() {
        let router = Router::new();
        let request = req();
        let mut ctx = Context::new(&request, &router);
        ctx.set_chain(&[], set_body);
        ctx.next();
        assert!(!ctx.has_next());
        ctx.next(); // no-op, must not panic or re-run the handler
        assert_eq!(ctx.response.body, b"from handler");
    }
}
