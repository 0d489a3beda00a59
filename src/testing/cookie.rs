//! In-process cookie jar for [`super::client::TestClient`].
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct StoredCookie {
    value: String,
    path: String,
}

/// Parses `Set-Cookie` headers and replays matching cookies on later
/// requests, scoped by `Path`. `Max-Age=0` deletes the cookie instead of
/// storing it, matching browser semantics.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: HashMap<String, StoredCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every `Set-Cookie` header value found in `set_cookie_values`.
    pub fn store_all<'a>(&mut self, set_cookie_values: impl IntoIterator<Item = &'a str>) {
        for raw in set_cookie_values {
            self.store_one(raw);
        }
    }

    fn store_one(&mut self, raw: &str) {
        let mut parts = raw.split(';');
        let Some(pair) = parts.next() else { return };
        let Some((name, value)) = pair.split_once('=') else { return };
        let name = name.trim().to_string();
        let value = value.trim().to_string();

        let mut path = "/".to_string();
        let mut max_age: Option<i64> = None;
        for attr in parts {
            let attr = attr.trim();
            if let Some(p) = attr.strip_prefix("Path=").or_else(|| attr.strip_prefix("path=")) {
                path = p.trim().to_string();
            } else if let Some(a) = attr.strip_prefix("Max-Age=").or_else(|| attr.strip_prefix("max-age=")) {
                max_age = a.trim().parse().ok();
            }
        }

        if max_age == Some(0) {
            self.cookies.remove(&name);
        } else {
            self.cookies.insert(name, StoredCookie { value, path });
        }
    }

    /// Builds the `Cookie` header value for a request to `request_path`, or
    /// `None` if no stored cookie is in scope.
    pub fn header_for(&self, request_path: &str) -> Option<String> {
        let in_scope: Vec<String> = self
            .cookies
            .iter()
            .filter(|(_, c)| path_in_scope(&c.path, request_path))
            .map(|(name, c)| format!("{}={}", name, c.value))
            .collect();
        if in_scope.is_empty() {
            None
        } else {
            Some(in_scope.join("; "))
        }
    }
}

fn path_in_scope(cookie_path: &str, request_path: &str) -> bool {
    if cookie_path == "/" {
        return true;
    }
    request_path == cookie_path
        || (request_path.starts_with(cookie_path) && request_path[cookie_path.len()..].starts_with('/'))
}
