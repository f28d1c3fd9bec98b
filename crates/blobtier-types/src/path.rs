use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Logical, slash-delimited identifier of an object in the store.
///
/// Paths are normalised on construction: leading, trailing and repeated
/// slashes are dropped, so `"/a//b/"` and `"a/b"` name the same object. The
/// empty path is the store root. `.` and `..` segments are rejected so a
/// path can never escape the staging or remote root it is resolved against.
///
/// An `ObjectPath` may denote either a leaf object or a directory prefix;
/// the type does not distinguish the two.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectPath(String);

impl ObjectPath {
    /// The store root (the empty path).
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse and normalise a path.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobtier_types::ObjectPath;
    ///
    /// let path = ObjectPath::parse("/images//abc/layer/").unwrap();
    /// assert_eq!(path.as_str(), "images/abc/layer");
    /// assert!(ObjectPath::parse("a/../b").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        if raw.contains('\0') {
            return Err(TypeError::InvalidPath {
                path: raw.to_string(),
                reason: "contains NUL byte".into(),
            });
        }

        let mut normalised = String::with_capacity(raw.len());
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(TypeError::InvalidPath {
                    path: raw.to_string(),
                    reason: format!("relative segment {segment:?} not allowed"),
                });
            }
            if !normalised.is_empty() {
                normalised.push('/');
            }
            normalised.push_str(segment);
        }
        Ok(Self(normalised))
    }

    /// The normalised path without leading or trailing slashes.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the store root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the path's segments. The root has none.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The last segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// The containing path, or `None` for the root.
    pub fn parent(&self) -> Option<ObjectPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Append a relative child path.
    pub fn join(&self, child: &str) -> Result<ObjectPath, TypeError> {
        let child = Self::parse(child)?;
        if self.is_root() {
            return Ok(child);
        }
        if child.is_root() {
            return Ok(self.clone());
        }
        Ok(Self(format!("{}/{}", self.0, child.0)))
    }

    /// Returns `true` if `self` equals `prefix` or lies beneath it.
    pub fn starts_with(&self, prefix: &ObjectPath) -> bool {
        if prefix.is_root() {
            return true;
        }
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
    }
}

impl fmt::Debug for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPath(/{})", self.0)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl FromStr for ObjectPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for ObjectPath {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ObjectPath> for String {
    fn from(path: ObjectPath) -> Self {
        path.0
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalises_slashes() {
        let path = ObjectPath::parse("//a///b/c//").unwrap();
        assert_eq!(path.as_str(), "a/b/c");
        assert_eq!(path, "a/b/c".parse().unwrap());
    }

    #[test]
    fn empty_and_slash_are_root() {
        assert!(ObjectPath::parse("").unwrap().is_root());
        assert!(ObjectPath::parse("/").unwrap().is_root());
        assert_eq!(ObjectPath::root(), ObjectPath::default());
    }

    #[test]
    fn rejects_relative_segments() {
        assert!(matches!(
            ObjectPath::parse("a/../b"),
            Err(TypeError::InvalidPath { .. })
        ));
        assert!(ObjectPath::parse("./a").is_err());
        assert!(ObjectPath::parse("a\0b").is_err());
    }

    #[test]
    fn dots_inside_names_are_fine() {
        let path = ObjectPath::parse("repo/v1.0/..hidden.").unwrap();
        assert_eq!(path.segments().count(), 3);
    }

    #[test]
    fn parent_and_file_name() {
        let path = ObjectPath::parse("a/b/c").unwrap();
        assert_eq!(path.file_name(), Some("c"));
        assert_eq!(path.parent().unwrap().as_str(), "a/b");
        assert_eq!(ObjectPath::parse("a").unwrap().parent(), Some(ObjectPath::root()));
        assert_eq!(ObjectPath::root().parent(), None);
        assert_eq!(ObjectPath::root().file_name(), None);
    }

    #[test]
    fn join_paths() {
        let base = ObjectPath::parse("images").unwrap();
        assert_eq!(base.join("abc/json").unwrap().as_str(), "images/abc/json");
        assert_eq!(ObjectPath::root().join("x").unwrap().as_str(), "x");
        assert_eq!(base.join("").unwrap(), base);
        assert!(base.join("..").is_err());
    }

    #[test]
    fn prefix_matching_respects_segments() {
        let prefix = ObjectPath::parse("a/b").unwrap();
        assert!(ObjectPath::parse("a/b/c").unwrap().starts_with(&prefix));
        assert!(ObjectPath::parse("a/b").unwrap().starts_with(&prefix));
        assert!(!ObjectPath::parse("a/bc").unwrap().starts_with(&prefix));
        assert!(prefix.starts_with(&ObjectPath::root()));
    }

    #[test]
    fn display_has_leading_slash() {
        assert_eq!(ObjectPath::parse("a/b").unwrap().to_string(), "/a/b");
        assert_eq!(ObjectPath::root().to_string(), "/");
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let path: ObjectPath = serde_json::from_str("\"/x//y\"").unwrap();
        assert_eq!(path.as_str(), "x/y");
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"x/y\"");
        assert!(serde_json::from_str::<ObjectPath>("\"../etc\"").is_err());
    }

    proptest! {
        #[test]
        fn parse_is_idempotent(segments in proptest::collection::vec("[a-z0-9_.-]{1,8}", 0..6)) {
            let raw = format!("/{}/", segments.join("//"));
            if let Ok(path) = ObjectPath::parse(&raw) {
                let again = ObjectPath::parse(path.as_str()).unwrap();
                prop_assert_eq!(&path, &again);
                prop_assert!(!path.as_str().starts_with('/'));
                prop_assert!(!path.as_str().ends_with('/'));
            }
        }
    }
}
