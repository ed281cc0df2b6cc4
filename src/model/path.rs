//! Path: a sequence of name elements addressing an item in the hierarchy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use super::Name;

/// The sibling index of the first (or only) node with a given name.
pub const DEFAULT_INDEX: u32 = 1;

/// One step of a path: a name plus a 1-based same-name-sibling index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathElement {
    pub name: Name,
    pub index: u32,
}

impl PathElement {
    pub fn new(name: impl Into<Name>, index: u32) -> Self {
        Self { name: name.into(), index }
    }

    /// Whether this element addresses the given (name, index) pair.
    pub fn denotes(&self, name: &Name, index: u32) -> bool {
        self.name == *name && self.index == index
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == DEFAULT_INDEX {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.index)
        }
    }
}

/// A hierarchical path. Absolute paths start at the root; relative paths are
/// resolved against a node addressed by unique id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    absolute: bool,
    elements: Vec<PathElement>,
}

impl Path {
    /// The root path `/`.
    pub fn root() -> Self {
        Self { absolute: true, elements: Vec::new() }
    }

    /// An empty relative path.
    pub fn relative() -> Self {
        Self { absolute: false, elements: Vec::new() }
    }

    pub fn is_root(&self) -> bool {
        self.absolute && self.elements.is_empty()
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Number of elements (the root has depth 0).
    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    /// The last element, i.e. the name of the addressed item.
    pub fn name_element(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// The path of the parent item. `None` for the root and for empty
    /// relative paths.
    pub fn parent(&self) -> Option<Path> {
        if self.elements.is_empty() {
            return None;
        }
        let mut elements = self.elements.clone();
        elements.pop();
        Some(Self { absolute: self.absolute, elements })
    }

    /// Extend the path with one element.
    pub fn child(&self, name: impl Into<Name>, index: u32) -> Path {
        let mut elements = self.elements.clone();
        elements.push(PathElement::new(name, index));
        Self { absolute: self.absolute, elements }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        for (i, el) in self.elements.iter().enumerate() {
            if i > 0 || self.absolute {
                write!(f, "/")?;
            }
            write!(f, "{el}")?;
        }
        Ok(())
    }
}

/// Failure to parse a textual path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path '{input}': {reason}")]
pub struct ParsePathError {
    pub input: String,
    pub reason: &'static str,
}

impl FromStr for Path {
    type Err = ParsePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParsePathError { input: s.to_owned(), reason };
        if s.is_empty() {
            return Err(err("empty path"));
        }
        if s == "/" {
            return Ok(Path::root());
        }
        let absolute = s.starts_with('/');
        let body = if absolute { &s[1..] } else { s };

        let mut elements = Vec::new();
        for segment in body.split('/') {
            if segment.is_empty() {
                return Err(err("empty path element"));
            }
            let element = match segment.find('[') {
                Some(open) => {
                    let close = segment.strip_suffix(']').ok_or_else(|| err("unterminated index"))?;
                    let index: u32 = close[open + 1..]
                        .parse()
                        .map_err(|_| err("index is not a number"))?;
                    if index < DEFAULT_INDEX {
                        return Err(err("index must be at least 1"));
                    }
                    PathElement::new(&segment[..open], index)
                }
                None => PathElement::new(segment, DEFAULT_INDEX),
            };
            if element.name.as_str().is_empty() {
                return Err(err("empty name"));
            }
            elements.push(element);
        }
        Ok(Path { absolute, elements })
    }
}
