// ── Cache keys ──

use std::fmt;

use crate::model::Resource;

/// Composite cache key: an ordered list of string segments, e.g.
/// `["tickets"]` or `["tickets", "open"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The empty key, a prefix of every key.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn resource(resource: Resource) -> Self {
        resource.key()
    }

    /// Extend with one more segment.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Segment-wise prefix test: `["tickets"]` is a prefix of
    /// `["tickets", "open"]` but not of `["tickets-archive"]`.
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The resource this key belongs to, if its first segment names one.
    pub fn resource_of(&self) -> Option<Resource> {
        self.0.first().and_then(|s| Resource::from_table(s))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl From<Resource> for QueryKey {
    fn from(resource: Resource) -> Self {
        resource.key()
    }
}

impl From<&str> for QueryKey {
    fn from(segment: &str) -> Self {
        Self(vec![segment.to_owned()])
    }
}
