//! Path splitting for lookups inside the image.
//!
//! Paths and symlink targets are raw bytes: SquashFS stores names without
//! any encoding, so nothing here assumes UTF-8.

/// Split a path into its components, filtering empty segments.
///
/// Leading and trailing slashes are ignored. Multiple consecutive slashes
/// are treated as a single separator. `.` and `..` are returned as-is; the
/// resolver interprets them.
pub fn components(path: &[u8]) -> impl DoubleEndedIterator<Item = &[u8]> {
    path.split(|&b| b == b'/').filter(|s| !s.is_empty())
}

/// Components to walk for `path`.
///
/// Like [`components`], except that a trailing slash is kept as a final `.`
/// so the walk fails unless the last entry resolves to a directory.
pub(crate) fn walk_steps(path: &[u8]) -> impl DoubleEndedIterator<Item = &[u8]> {
    let trailing = (path.len() > 1 && path.ends_with(b"/")).then_some(&b"."[..]);
    components(path).chain(trailing)
}

/// Returns `true` if the path starts with `/`.
#[must_use]
pub fn is_absolute(path: &[u8]) -> bool {
    path.first() == Some(&b'/')
}

/// A single resolved path step.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Step<'a> {
    /// `.`: stay in the current directory.
    Current,
    /// `..`: move to the parent directory.
    Parent,
    /// A named entry.
    Name(&'a [u8]),
}

impl<'a> Step<'a> {
    pub(crate) fn classify(component: &'a [u8]) -> Self {
        match component {
            b"." => Self::Current,
            b".." => Self::Parent,
            name => Self::Name(name),
        }
    }
}
