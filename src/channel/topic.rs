//! Topic pattern matching for channel definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicPattern {
    Literal(String),
    /// `"prefix:*"` — matches any topic starting with `prefix:` followed by
    /// a non-empty tail.
    Prefix(String),
    /// `"*"` — matches every topic.
    Universal,
}

impl TopicPattern {
    pub fn compile(pattern: &str) -> Self {
        if pattern == "*" {
            TopicPattern::Universal
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            TopicPattern::Prefix(prefix.to_string())
        } else {
            TopicPattern::Literal(pattern.to_string())
        }
    }

    pub fn matches(&self, topic: &str) -> bool {
        match self {
            TopicPattern::Literal(lit) => lit == topic,
            TopicPattern::Prefix(prefix) => {
                topic.len() > prefix.len() && topic.starts_with(prefix.as_str())
            }
            TopicPattern::Universal => true,
        }
    }
}
