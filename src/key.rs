//! Composite-key builder and parser shared by every domain cache.
//!
//! Keys are the lowercased, separator-joined concatenation of trimmed,
//! non-empty parts. SP-rate keys use `","` because ARNs contain `":"`; every
//! other composite key uses `":"`.

pub const COLON: &str = ":";
pub const COMMA: &str = ",";

/// Builds a composite key one part at a time.
#[derive(Debug, Default)]
pub struct KeyBuilder {
    sep: String,
    parts: Vec<String>,
}

impl KeyBuilder {
    pub fn new(sep: impl Into<String>) -> Self {
        Self {
            sep: sep.into(),
            parts: Vec::new(),
        }
    }

    /// Trim each part, drop empty results, lowercase, and append in order.
    pub fn add(mut self, parts: &[&str]) -> Self {
        for part in parts {
            let trimmed = part.trim();
            if !trimmed.is_empty() {
                self.parts.push(trimmed.to_lowercase());
            }
        }
        self
    }

    pub fn build(self) -> String {
        self.parts.join(&self.sep)
    }
}

/// Build a composite key directly from a slice of parts, without the
/// builder's fluent API. Equivalent to `KeyBuilder::new(sep).add(parts).build()`.
pub fn build_key(sep: &str, parts: &[&str]) -> String {
    KeyBuilder::new(sep).add(parts).build()
}

/// Split `key` on `sep`. Returns `(parts, ok)`; `ok` is `false` iff `key` is
/// empty.
pub fn parse_key(key: &str, sep: &str) -> (Vec<String>, bool) {
    if key.is_empty() {
        return (Vec::new(), false);
    }
    (key.split(sep).map(|s| s.to_string()).collect(), true)
}

/// Like [`parse_key`], but additionally requires exactly `n` parts.
pub fn parse_key_n(key: &str, sep: &str, n: usize) -> (Vec<String>, bool) {
    let (parts, ok) = parse_key(key, sep);
    if !ok || parts.len() != n {
        return (Vec::new(), false);
    }
    (parts, true)
}
