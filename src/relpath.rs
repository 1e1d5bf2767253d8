// Garner backup engine.
// Copyright 2024-2026 Garner contributors.

// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

//! Relative paths stored inside backup archives.
//!
//! Archive paths are platform-independent: always `/`-separated, never
//! starting with a slash, and never containing `.`, `..`, or empty
//! components. In memory they are simply strings.

use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A validated archive-relative path.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct RelPath(String);

impl RelPath {
    /// True if this string is a well-formed archive path.
    ///
    /// Rust strings are by contract always valid UTF-8, so a checked
    /// conversion from `OsString` is enough to meet that requirement.
    pub fn is_valid(p: &str) -> bool {
        if p.is_empty() || p.starts_with('/') {
            return false;
        }
        for part in p.split('/') {
            if part.is_empty() || part == "." || part == ".." || part.contains('\0') {
                return false;
            }
        }
        true
    }

    /// Construct a new RelPath for a child of `self`.
    #[must_use]
    pub fn join(&self, child_name: &str) -> RelPath {
        let mut c = self.0.clone();
        c.push('/');
        c.push_str(child_name);
        RelPath(c)
    }

    /// Return a PathBuf for this path below a tree root directory.
    #[must_use]
    pub fn below<R: Into<PathBuf>>(&self, tree_root: R) -> PathBuf {
        let mut buf: PathBuf = tree_root.into();
        buf.push(&self.0);
        buf
    }

    /// The first component: the top-level directory or file name.
    #[must_use]
    pub fn top_level(&self) -> &str {
        self.0.split('/').next().expect("relpath is never empty")
    }
}

#[derive(Debug)]
pub struct RelPathParseError {}

impl std::error::Error for RelPathParseError {}

impl fmt::Display for RelPathParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invalid archive path: must be relative with no . or .. components")
    }
}

impl FromStr for RelPath {
    type Err = RelPathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if RelPath::is_valid(s) {
            Ok(RelPath(s.to_owned()))
        } else {
            Err(RelPathParseError {})
        }
    }
}

impl From<RelPath> for String {
    fn from(p: RelPath) -> String {
        p.0
    }
}

impl<'a> From<&'a str> for RelPath {
    fn from(s: &'a str) -> RelPath {
        assert!(RelPath::is_valid(s), "invalid archive path: {s:?}");
        RelPath(s.to_string())
    }
}

impl From<String> for RelPath {
    fn from(s: String) -> RelPath {
        assert!(RelPath::is_valid(&s), "invalid archive path: {s:?}");
        RelPath(s)
    }
}

impl Display for RelPath {
    fn fmt(&self, fmt: &mut Formatter) -> Result<(), fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

impl PartialEq<str> for RelPath {
    fn eq(&self, other: &str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<&str> for RelPath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == **other
    }
}

impl PartialEq<RelPath> for &str {
    fn eq(&self, other: &RelPath) -> bool {
        other == *self
    }
}

impl Deref for RelPath {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for RelPath {
    fn as_ref(&self) -> &Path {
        self.0.as_ref()
    }
}
