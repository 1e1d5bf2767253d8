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

//! A record describing one entry of a source tree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::kind::Kind;
use crate::owner;
use crate::relpath::RelPath;
use crate::unix_mode::UnixMode;
use crate::Result;

/// POSIX metadata and location for one file, directory, symlink, or
/// special file found by traversal.
///
/// Records are built by [crate::traverse] and immutable afterwards; the
/// packer consumes them without touching the source tree again except to
/// stream regular-file content.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileRecord {
    /// Possibly absolute path through which the file can be opened.
    pub path: PathBuf,

    /// Archive path, relative to the tree root.
    pub relpath: RelPath,

    pub kind: Kind,

    /// Content length in bytes; zero for anything but regular files.
    pub size: u64,

    pub mode: UnixMode,

    /// Modification time, in seconds since the Unix epoch.
    pub mtime: i64,

    pub uid: u32,
    pub gid: u32,

    /// Resolved user name, or the decimal uid if unresolvable.
    pub user: String,

    /// Resolved group name, or the decimal gid if unresolvable.
    pub group: String,

    /// Symlink target, read verbatim and unnormalized. Only for symlinks.
    pub link_target: Option<String>,

    /// Device numbers. Only meaningful for char/block device kinds.
    pub dev_major: u32,
    pub dev_minor: u32,
}

impl FileRecord {
    /// Build a record from an lstat of `path`.
    ///
    /// Symlinks are described, not followed.
    pub fn from_path(path: &Path, relpath: RelPath) -> Result<FileRecord> {
        let metadata =
            fs::symlink_metadata(path).map_err(|source| crate::Error::ReadTree {
                path: path.to_owned(),
                source,
            })?;
        Ok(FileRecord::from_metadata(path, relpath, &metadata))
    }

    pub(crate) fn from_metadata(
        path: &Path,
        relpath: RelPath,
        metadata: &fs::Metadata,
    ) -> FileRecord {
        let kind = Kind::from(metadata.file_type());
        let link_target = if kind.is_symlink() {
            match fs::read_link(path) {
                Ok(target) => Some(target.to_string_lossy().into_owned()),
                Err(err) => {
                    warn!("Failed to read symlink target of {path:?}: {err}");
                    None
                }
            }
        } else {
            None
        };
        let (uid, gid, mode, mtime, dev_major, dev_minor) = stat_fields(metadata, kind);
        FileRecord {
            path: path.to_owned(),
            relpath,
            kind,
            size: if kind.is_file() { metadata.len() } else { 0 },
            mode,
            mtime,
            uid,
            gid,
            user: owner::user_name(uid),
            group: owner::group_name(gid),
            link_target,
            dev_major,
            dev_minor,
        }
    }
}

#[cfg(unix)]
fn stat_fields(metadata: &fs::Metadata, kind: Kind) -> (u32, u32, UnixMode, i64, u32, u32) {
    use std::os::unix::fs::MetadataExt;
    let (dev_major, dev_minor) = if kind.is_device() {
        let rdev = metadata.rdev() as libc::dev_t;
        (libc::major(rdev) as u32, libc::minor(rdev) as u32)
    } else {
        (0, 0)
    };
    (
        metadata.uid(),
        metadata.gid(),
        UnixMode::from(metadata.mode()),
        metadata.mtime(),
        dev_major,
        dev_minor,
    )
}

#[cfg(not(unix))]
fn stat_fields(metadata: &fs::Metadata, _kind: Kind) -> (u32, u32, UnixMode, i64, u32, u32) {
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    (0, 0, UnixMode::default(), mtime, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::TreeFixture;

    #[test]
    fn regular_file_record() {
        let tf = TreeFixture::new();
        tf.create_file_with_contents("hello.txt", b"hello world");
        let record =
            FileRecord::from_path(&tf.path().join("hello.txt"), RelPath::from("hello.txt"))
                .unwrap();
        assert_eq!(record.kind, Kind::File);
        assert_eq!(record.size, 11);
        assert!(record.mtime > 0);
        assert!(record.link_target.is_none());
    }

    #[test]
    fn directory_has_zero_size() {
        let tf = TreeFixture::new();
        tf.create_dir("sub");
        let record =
            FileRecord::from_path(&tf.path().join("sub"), RelPath::from("sub")).unwrap();
        assert_eq!(record.kind, Kind::Dir);
        assert_eq!(record.size, 0);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_target_read_verbatim() {
        let tf = TreeFixture::new();
        tf.create_symlink("link", "../some/relative/../target");
        let record =
            FileRecord::from_path(&tf.path().join("link"), RelPath::from("link")).unwrap();
        assert_eq!(record.kind, Kind::Symlink);
        assert_eq!(
            record.link_target.as_deref(),
            Some("../some/relative/../target")
        );
        assert_eq!(record.size, 0);
    }
}
