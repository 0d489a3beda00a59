//! Route pattern compilation and matching.
use crate::http::Params;

/// One compiled path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
    /// Only legal as the final segment; binds the remaining path including
    /// any internal slashes.
    Wildcard(String),
}

/// A compiled route pattern, e.g. `"/users/:id/*rest"`.
#[derive(Debug, Clone)]
pub struct Pattern {
    segments: Vec<Segment>,
    source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileError {
    /// A wildcard segment appeared somewhere other than the final position.
    WildcardNotLast,
    /// A `:name` or `*name` segment had an empty name.
    EmptyParamName,
}

impl Pattern {
    pub fn compile(pattern: &str) -> Result<Self, CompileError> {
        let raw_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw_segments.len());

        for (i, raw) in raw_segments.iter().enumerate() {
            let is_last = i == raw_segments.len() - 1;
            let segment = if let Some(name) = raw.strip_prefix(':') {
                if name.is_empty() {
                    return Err(CompileError::EmptyParamName);
                }
                Segment::Param(name.to_string())
            } else if let Some(name) = raw.strip_prefix('*') {
                if !is_last {
                    return Err(CompileError::WildcardNotLast);
                }
                if name.is_empty() {
                    return Err(CompileError::EmptyParamName);
                }
                Segment::Wildcard(name.to_string())
            } else {
                Segment::Static(raw.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            segments,
            source: pattern.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Matches `path` against this pattern, binding named parameters into
    /// `params` (appended in pattern order). Returns whether the whole path
    /// was consumed.
    pub fn matches<'p>(&self, path: &'p str, params: &mut Params<'p>) -> bool {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let mut i = 0;
        for segment in &self.segments {
            match segment {
                Segment::Static(lit) => {
                    if path_segments.get(i).map(|s| *s) != Some(lit.as_str()) {
                        return false;
                    }
                    i += 1;
                }
                Segment::Param(name) => {
                    let Some(value) = path_segments.get(i) else {
                        return false;
                    };
                    if value.is_empty() {
                        return false;
                    }
                    params.push(name, value);
                    i += 1;
                }
                Segment::Wildcard(name) => {
                    let rest = nth_segment_onward(path, i);
                    params.push(name, rest);
                    return true;
                }
            }
        }

        i == path_segments.len()
    }
}

/// Byte offset of the start of the `n`-th non-empty `/`-separated segment of
/// `path`, so the wildcard tail can borrow directly from `path` (no
/// allocation, no re-searching for a reconstructed substring).
fn nth_segment_onward(path: &str, n: usize) -> &str {
    let mut seen = 0usize;
    let mut chars = path.char_indices().peekable();
    let mut prev_was_slash = true;

    while let Some(&(idx, ch)) = chars.peek() {
        if ch != '/' && prev_was_slash {
            if seen == n {
                return &path[idx..];
            }
            seen += 1;
        }
        prev_was_slash = ch == '/';
        chars.next();
    }

    ""
}
