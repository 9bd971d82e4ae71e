//! Named capture storage.
//!
//! Routes rarely declare more than two captures, so values are stored inline
//! on the stack for the common case.

use smallvec::SmallVec;

/// Named captures extracted from a route match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: SmallVec<[(String, String); 2]>,
}

impl Params {
    /// Creates an empty capture set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capture.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the value captured under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true when no captures were made.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of captures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Consumes the captures into owned pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.inner.into_vec()
    }

    /// Iterates over the captures as string slices.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut params = Params::new();
        params.push("username", "bob");
        params.push("index", "logs");

        assert_eq!(params.get("username"), Some("bob"));
        assert_eq!(params.get("index"), Some("logs"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_into_pairs() {
        let mut params = Params::new();
        params.push("a", "1");
        let pairs = params.into_pairs();
        assert_eq!(pairs, vec![("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_empty() {
        assert!(Params::new().is_empty());
    }
}
