//! Fixed-capacity key/value bags. Allocator-free by design: route params and query params
//! are bounded by how many segments/pairs a real URL ever has, and assigns
//! are bounded by how much state middleware realistically attaches to one
//! request. Overflow beyond the capacity is dropped rather than panicking —
//! callers that need more should store a single composite value instead.

pub const MAX_PARAMS: usize = 32;

/// Path or query parameters: ordered, case-sensitive, borrowed from the
/// request buffer.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    entries: [(&'a str, &'a str); MAX_PARAMS],
    len: u8,
}

impl<'a> Default for Params<'a> {
    fn default() -> Self {
        Self {
            entries: [("", ""); MAX_PARAMS],
            len: 0,
        }
    }
}

impl<'a> Params<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a param. Silently drops the pair once `MAX_PARAMS` is reached.
    pub fn push(&mut self, name: &'a str, value: &'a str) {
        if (self.len as usize) < MAX_PARAMS {
            self.entries[self.len as usize] = (name, value);
            self.len += 1;
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.entries[..self.len as usize]
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.entries[..self.len as usize].iter().copied()
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Parses a `key=value&key2=value2` query string into [`Params`]. Percent
/// decoding is intentionally not performed here: the core consumes raw
/// byte-stream requests and leaves richer decoding to callers,
/// matching the "strings only, serialization is the caller's responsibility"
/// design of Assigns.
pub fn parse_query<'a>(query: &'a str) -> Params<'a> {
    let mut params = Params::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((k, v)) => params.push(k, v),
            None => params.push(pair, ""),
        }
    }
    params
}

/// Per-request key/value bag for middleware-to-handler communication.
/// Strings only.
#[derive(Debug, Clone, Default)]
pub struct Assigns {
    entries: [Option<(String, String)>; MAX_PARAMS],
    len: u8,
}

impl Assigns {
    pub fn new() -> Self {
        Self {
            entries: std::array::from_fn(|_| None),
            len: 0,
        }
    }

    /// Sets a key, overwriting any existing value for that key. Silently
    /// ignored once `MAX_PARAMS` distinct keys have been set and `key` is new.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries[..self.len as usize]
            .iter_mut()
            .find(|e| matches!(e, Some((k, _)) if k == &key))
        {
            *slot = Some((key, value));
            return;
        }
        if (self.len as usize) < MAX_PARAMS {
            self.entries[self.len as usize] = Some((key, value));
            self.len += 1;
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries[..self.len as usize]
            .iter()
            .flatten()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_get_is_case_sensitive() {
        let mut p = Params::new();
        p.push("id", "42");
        assert_eq!(p.get("id"), Some("42"));
        assert_eq!(p.get("ID"), None);
    }

    #[test]
    fn query_parsing_handles_valueless_keys() {
        let p = parse_query("a=1&flag&b=2");
        assert_eq!(p.get("a"), Some("1"));
        assert_eq!(p.get("flag"), Some(""));
        assert_eq!(p.get("b"), Some("2"));
    }

    #[test]
    fn assigns_overwrite_existing_key() {
        let mut a = Assigns::new();
        a.set("user_id", "1");
        a.set("user_id", "2");
        assert_eq!(a.get("user_id"), Some("2"));
    }
}
