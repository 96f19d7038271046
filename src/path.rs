//! Slash-delimited addressing into a [`crate::node::Node`] tree.

use im::Vector;
use std::fmt;
use std::sync::Arc;

/// An ordered sequence of segments addressing a location in a document tree.
///
/// Cloning a `Path` is O(1) (it shares the underlying `im::Vector` spine),
/// matching `eidetica::crdt::doc::path::Path`'s cheap-clone contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vector<Arc<str>>,
}

impl Path {
    /// The path addressing the tree's root.
    pub fn root() -> Self {
        Path {
            segments: Vector::new(),
        }
    }

    /// Parses a slash-delimited string into a normalized `Path`.
    ///
    /// A leading slash is optional and ignored; empty segments produced by
    /// repeated or trailing slashes are dropped, mirroring
    /// `normalize_path`'s handling of repeated/trailing dots adapted to `/`.
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(Arc::from)
            .collect();
        Path { segments }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Path {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns `(first segment, remaining path)`, or `None` at the root.
    pub fn split_head(&self) -> Option<(Arc<str>, Path)> {
        let mut rest = self.segments.clone();
        let head = rest.pop_front()?;
        Some((head, Path { segments: rest }))
    }

    /// Returns `(path to parent, last segment)`, or `None` at the root.
    pub fn split_tail(&self) -> Option<(Path, Arc<str>)> {
        let mut init = self.segments.clone();
        let last = init.pop_back()?;
        Some((Path { segments: init }, last))
    }

    pub fn push(&self, segment: impl Into<Arc<str>>) -> Path {
        let mut segments = self.segments.clone();
        segments.push_back(segment.into());
        Path { segments }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<str>> {
        self.segments.iter()
    }

    pub fn as_slice_vec(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.as_ref()).collect()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Path::parse(raw)
    }
}

impl From<String> for Path {
    fn from(raw: String) -> Self {
        Path::parse(&raw)
    }
}
