//! Qualified item names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A qualified name of a node, property, or node type (e.g. `"jcr:content"`).
///
/// Names are compared verbatim; namespace remapping belongs to the session
/// layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The prefix before the first `:`, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.0.split_once(':').map(|(p, _)| p)
    }

    /// The part after the first `:`, or the whole name.
    pub fn local_name(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, l)| l)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(v: &str) -> Self { Name(v.to_owned()) }
}

impl From<String> for Name {
    fn from(v: String) -> Self { Name(v) }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str { &self.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_local_name() {
        let n = Name::from("jcr:content");
        assert_eq!(n.prefix(), Some("jcr"));
        assert_eq!(n.local_name(), "content");

        let plain = Name::from("title");
        assert_eq!(plain.prefix(), None);
        assert_eq!(plain.local_name(), "title");
    }
}
