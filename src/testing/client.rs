//! In-process HTTP test client. Builds a request buffer, parses it with
//! the real codec, and invokes [`Router::handle`] directly — no socket,
//! no thread.
use super::cookie::CookieJar;
use crate::http::{Method, Response};
use crate::parser::{self, ParseLimits};
use crate::router::Router;

/// A captured response plus the raw bytes it was built from, so tests can
/// assert on headers, status, and body without re-parsing anything.
pub struct TestResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }
}

/// A request under construction, returned by [`TestClient`]'s verb methods.
pub struct RequestBuilder<'c> {
    client: &'c mut TestClient,
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl<'c> RequestBuilder<'c> {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn send(self) -> TestResponse {
        self.client.execute(self.method, &self.path, self.headers, self.body)
    }
}

/// Drives a [`Router`] in-process with a synchronous call rather than a
/// real socket round trip. Carries a [`CookieJar`] and an optional
/// redirect-follow limit.
pub struct TestClient {
    router: Router,
    limits: ParseLimits,
    cookies: CookieJar,
    follow_redirects: Option<usize>,
}

impl TestClient {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            limits: ParseLimits::default(),
            cookies: CookieJar::new(),
            follow_redirects: None,
        }
    }

    /// Follow 301/302/303/307/308 redirects up to `max` times.
    pub fn follow_redirects(mut self, max: usize) -> Self {
        self.follow_redirects = Some(max);
        self
    }

    pub fn get(&mut self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::Get, path)
    }
    pub fn post(&mut self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::Post, path)
    }
    pub fn put(&mut self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::Put, path)
    }
    pub fn delete(&mut self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::Delete, path)
    }

    pub fn request(&mut self, method: Method, path: &str) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            method,
            path: path.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    fn execute(&mut self, method: Method, path: &str, mut headers: Vec<(String, String)>, body: Vec<u8>) -> TestResponse {
        if let Some(cookie_header) = self.cookies.header_for(path) {
            headers.push(("Cookie".to_string(), cookie_header));
        }

        let resp = self.run_once(method, path, &headers, &body);
        self.cookies.store_all(resp.headers.iter().filter(|(n, _)| n.eq_ignore_ascii_case("Set-Cookie")).map(|(_, v)| v.as_str()));

        let Some(max_redirects) = self.follow_redirects else {
            return resp;
        };

        let mut current = resp;
        let mut remaining = max_redirects;
        let mut method = method;
        let mut body = body;
        while remaining > 0 && matches!(current.status, 301 | 302 | 303 | 307 | 308) {
            let Some(location) = current.header("Location").map(str::to_string) else {
                break;
            };
            if current.status == 303 {
                method = Method::Get;
                body = Vec::new();
            }
            remaining -= 1;
            let mut redirect_headers = Vec::new();
            if let Some(cookie_header) = self.cookies.header_for(&location) {
                redirect_headers.push(("Cookie".to_string(), cookie_header));
            }
            current = self.run_once(method, &location, &redirect_headers, &body);
            self.cookies.store_all(current.headers.iter().filter(|(n, _)| n.eq_ignore_ascii_case("Set-Cookie")).map(|(_, v)| v.as_str()));
        }
        current
    }

    fn run_once(&self, method: Method, path: &str, headers: &[(String, String)], body: &[u8]) -> TestResponse {
        let buf = build_request_bytes(method, path, headers, body);
        let response = match parser::parse_request_with_limits(&buf, self.limits) {
            Ok((mut request, consumed)) => {
                if !body.is_empty() {
                    request.body = Some(&buf[consumed..consumed + body.len()]);
                }
                self.router.handle(&request).response
            }
            Err(_) => Response::bad_request(),
        };
        to_test_response(response)
    }
}

fn build_request_bytes(method: Method, path: &str, headers: &[(String, String)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("{} {} HTTP/1.1\r\n", method.as_str(), path).into_bytes();
    out.extend_from_slice(b"Host: localhost\r\n");
    if !body.is_empty() {
        out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    for (name, value) in headers {
        out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

fn to_test_response(response: Response) -> TestResponse {
    let bytes = response.serialize("chopin-test");
    let text_end = bytes.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4).unwrap_or(bytes.len());
    let head = std::str::from_utf8(&bytes[..text_end]).unwrap_or_default();
    let mut lines = head.split("\r\n").filter(|l| !l.is_empty());
    lines.next();
    let headers = lines
        .filter_map(|line| line.split_once(": "))
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();
    TestResponse {
        status: response.status,
        headers,
        body: bytes[text_end..].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn ok_handler(ctx: &mut Context) {
        ctx.response = Response::ok("hello");
    }

    fn set_cookie_handler(ctx: &mut Context) {
        ctx.response = Response::ok("set").with_header("Set-Cookie", "session=abc; Path=/");
    }

    fn whoami_handler(ctx: &mut Context) {
        let cookie = ctx.request.header("Cookie").unwrap_or("none").to_string();
        ctx.response = Response::ok(cookie);
    }

    fn redirect_handler(ctx: &mut Context) {
        ctx.response = Response::redirect(302, "/target");
    }

    fn target_handler(ctx: &mut Context) {
        ctx.response = Response::ok("landed");
    }

    #[test]
    fn get_request_reaches_handler() {
        let mut router = Router::new();
        router.get("/hello", ok_handler);
        let mut client = TestClient::new(router);
        let resp = client.get("/hello").send();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_str(), "hello");
    }

    #[test]
    fn cookie_set_on_one_request_replays_on_the_next() {
        let mut router = Router::new();
        router.get("/login", set_cookie_handler);
        router.get("/whoami", whoami_handler);
        let mut client = TestClient::new(router);
        client.get("/login").send();
        let resp = client.get("/whoami").send();
        assert_eq!(resp.body_str(), "session=abc");
    }

    #[test]
    fn follows_redirect_when_enabled() {
        let mut router = Router::new();
        router.get("/start", redirect_handler);
        router.get("/target", target_handler);
        let mut client = TestClient::new(router).follow_redirects(3);
        let resp = client.get("/start").send();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_str(), "landed");
    }
}
