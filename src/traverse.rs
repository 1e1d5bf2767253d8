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

//! Find source files within a source directory, in pre-order.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::entry::FileRecord;
use crate::relpath::RelPath;
use crate::{Error, Result};

/// Junk names never worth backing up.
const SKIP_NAMES: &[&str] = &[".DS_Store"];

/// Walk a directory tree, returning one [FileRecord] per entry below `root`.
///
/// Each directory appears before its children; siblings appear in the order
/// the filesystem returns them. The root itself is not emitted. Symlinks
/// are recorded but not followed.
///
/// Fails if the root cannot be stat'd or any descendant directory cannot be
/// read. A child whose metadata cannot be read is skipped with a warning.
pub fn traverse(root: &Path) -> Result<Vec<FileRecord>> {
    // Fail early with a clear error if the root itself is unreadable.
    fs::symlink_metadata(root).map_err(|source| Error::ReadTree {
        path: root.to_owned(),
        source,
    })?;
    let mut records = Vec::new();
    walk_dir(root, None, &mut records)?;
    debug!("Traversed {} entries under {root:?}", records.len());
    Ok(records)
}

fn walk_dir(dir: &Path, dir_relpath: Option<&RelPath>, records: &mut Vec<FileRecord>) -> Result<()> {
    let read_dir = fs::read_dir(dir).map_err(|source| Error::ReadTree {
        path: dir.to_owned(),
        source,
    })?;
    for dir_entry in read_dir {
        let dir_entry = dir_entry.map_err(|source| Error::ReadTree {
            path: dir.to_owned(),
            source,
        })?;
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        if SKIP_NAMES.contains(&name.as_str()) {
            continue;
        }
        let path = dir_entry.path();
        let relpath = match dir_relpath {
            Some(parent) => parent.join(&name),
            None => RelPath::from(name),
        };
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!("Failed to stat {path:?}: {err}");
                continue;
            }
        };
        let record = FileRecord::from_metadata(&path, relpath, &metadata);
        let is_dir = record.kind.is_dir();
        records.push(record);
        if is_dir {
            let child_relpath = records.last().expect("just pushed").relpath.clone();
            walk_dir(&path, Some(&child_relpath), records)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::kind::Kind;
    use crate::test_fixtures::TreeFixture;

    #[test]
    fn missing_root_fails() {
        let tf = TreeFixture::new();
        let err = traverse(&tf.path().join("nonexistent")).unwrap_err();
        assert!(matches!(err, Error::ReadTree { .. }));
    }

    #[test]
    fn directories_precede_their_children() {
        let tf = TreeFixture::new();
        tf.create_dir("jam");
        tf.create_file("jam/apricot");
        tf.create_dir("jam/jars");
        tf.create_file("jam/jars/large");
        tf.create_file("loose");
        let records = traverse(tf.path()).unwrap();
        let position: HashMap<&str, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (&*r.relpath as &str, i))
            .collect();
        assert_eq!(records.len(), 5);
        assert!(position["jam"] < position["jam/apricot"]);
        assert!(position["jam"] < position["jam/jars"]);
        assert!(position["jam/jars"] < position["jam/jars/large"]);
    }

    #[test]
    fn skips_ds_store() {
        let tf = TreeFixture::new();
        tf.create_file(".DS_Store");
        tf.create_file("kept");
        let records = traverse(tf.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].relpath, "kept");
    }

    #[test]
    fn stable_across_reruns() {
        let tf = TreeFixture::new();
        tf.create_dir("a");
        tf.create_file("a/one");
        tf.create_file("b");
        tf.create_dir("c");
        let first = traverse(tf.path()).unwrap();
        let second = traverse(tf.path()).unwrap();
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_not_followed() {
        let tf = TreeFixture::new();
        tf.create_dir("real");
        tf.create_file("real/inner");
        tf.create_symlink("link", "real");
        let records = traverse(tf.path()).unwrap();
        let link = records.iter().find(|r| r.relpath == "link").unwrap();
        assert_eq!(link.kind, Kind::Symlink);
        assert_eq!(link.link_target.as_deref(), Some("real"));
        // The symlink's referent is traversed once, under its own name only.
        assert!(records.iter().all(|r| !r.relpath.starts_with("link/")));
    }
}
