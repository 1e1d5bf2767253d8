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

//! The backup pipeline: traverse, pack, compress, encrypt, and the reverse.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, warn};

use crate::compress::{self, Algorithm};
use crate::crypto::Encryptor;
use crate::filter::Filter;
use crate::relpath::RelPath;
use crate::stats::{BackupStats, RestoreStats};
use crate::traverse::traverse;
use crate::ustar;
use crate::{Error, Result};

/// Composes the pipeline stages for backup, restore, and verify.
///
/// Each engine carries its own compression, password, and filter settings,
/// so independent tasks can hold independently configured engines. The
/// public operations return a plain success flag and report failures
/// through the log, which is what the CLI and binding layers consume;
/// nothing here panics on bad input.
pub struct BackupEngine {
    algorithm: Algorithm,
    password: String,
    filter: Option<Filter>,
}

impl BackupEngine {
    pub fn new() -> BackupEngine {
        BackupEngine {
            algorithm: Algorithm::default(),
            password: String::new(),
            filter: None,
        }
    }

    /// Select the compression algorithm by its wire id. Unknown ids are
    /// rejected and leave the setting unchanged.
    pub fn set_compression_algorithm(&mut self, id: u8) -> bool {
        match Algorithm::try_from(id) {
            Ok(algorithm) => {
                self.algorithm = algorithm;
                true
            }
            Err(err) => {
                error!("{err}");
                false
            }
        }
    }

    /// An empty password disables encryption; any other value enables it.
    pub fn set_password(&mut self, password: &str) {
        self.password = password.to_string();
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = Some(Filter {
            enabled: true,
            ..filter
        });
    }

    /// Back up the tree at `src` into a single artifact file.
    ///
    /// `dst` may name the output file, an existing or to-be-created
    /// directory (the filename is then generated from the source name), or
    /// be empty to place the artifact next to the source.
    pub fn backup(&self, src: &Path, dst: &Path) -> bool {
        match self.backup_inner(src, dst) {
            Ok((artifact, stats)) => {
                info!(
                    "Backed up {src:?} to {artifact:?}: {} files, {} bytes in, {} bytes out",
                    stats.files, stats.source_bytes, stats.artifact_bytes
                );
                true
            }
            Err(err) => {
                error!("Backup of {src:?} failed: {err}");
                false
            }
        }
    }

    /// Recreate the tree stored in `artifact` under `dst_dir`.
    pub fn restore(&self, artifact: &Path, dst_dir: &Path) -> bool {
        match self.restore_inner(artifact, dst_dir) {
            Ok(stats) => {
                info!(
                    "Restored {artifact:?} into {dst_dir:?}: {} files, {} dirs",
                    stats.files, stats.directories
                );
                true
            }
            Err(err) => {
                error!("Restore of {artifact:?} failed: {err}");
                false
            }
        }
    }

    /// Check that `artifact` decrypts and decompresses to a plausible
    /// archive without touching the filesystem.
    pub fn verify(&self, artifact: &Path) -> bool {
        match self.verify_inner(artifact) {
            Ok(()) => true,
            Err(err) => {
                warn!("Verification of {artifact:?} failed: {err}");
                false
            }
        }
    }

    fn backup_inner(&self, src: &Path, dst: &Path) -> Result<(PathBuf, BackupStats)> {
        let mut stats = BackupStats::default();
        let mut records = traverse(src)?;
        if records.is_empty() {
            return Err(Error::EmptySource {
                path: src.to_owned(),
            });
        }
        if let Some(filter) = self.filter.as_ref().filter(|f| f.enabled) {
            let compiled = filter.compile()?;
            let before = records.len();
            records.retain(|r| compiled.matches(r));
            stats.filtered_out = before - records.len();
            debug!("Filter kept {} of {before} entries", records.len());
            if records.is_empty() {
                return Err(Error::AllEntriesFiltered);
            }
        }

        // Prefix every path with the source's base name so a restore
        // recreates that directory instead of spilling its children.
        let base = source_basename(src);
        for record in &mut records {
            record.relpath = RelPath::from(format!("{base}/{}", &*record.relpath));
        }
        for record in &records {
            match record.kind {
                crate::Kind::File => {
                    stats.files += 1;
                    stats.source_bytes += record.size;
                }
                crate::Kind::Dir => stats.directories += 1,
                crate::Kind::Symlink => stats.symlinks += 1,
                _ => stats.special_files += 1,
            }
        }

        let mut tar_bytes = Vec::new();
        ustar::pack(&records, &mut tar_bytes)?;
        let compressed = compress::compress(&tar_bytes, self.algorithm);
        drop(tar_bytes);
        let output = if self.password.is_empty() {
            compressed
        } else {
            Encryptor::new(&self.password).encrypt(&compressed)
        };

        let target = resolve_destination(src, dst, &base)?;
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
                    path: parent.to_owned(),
                    source,
                })?;
            }
        }
        stats.artifact_bytes = output.len() as u64;
        fs::write(&target, &output).map_err(|source| Error::WriteFile {
            path: target.clone(),
            source,
        })?;
        Ok((target, stats))
    }

    fn restore_inner(&self, artifact: &Path, dst_dir: &Path) -> Result<RestoreStats> {
        let tar_bytes = self.read_archive(artifact)?;
        fs::create_dir_all(dst_dir).map_err(|source| Error::CreateDir {
            path: dst_dir.to_owned(),
            source,
        })?;

        // If the archive's top-level directory already exists in the
        // destination, extract to the side and move under a fresh name.
        let top = ustar::peek_top_level(&tar_bytes);
        if let Some(top) = top.filter(|t| dst_dir.join(t).exists()) {
            let unix_time = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let tmp_dir = dst_dir.join(format!(".tmp_restore_{unix_time}"));
            fs::create_dir_all(&tmp_dir).map_err(|source| Error::CreateDir {
                path: tmp_dir.clone(),
                source,
            })?;
            let stats = ustar::unpack(&tar_bytes, &tmp_dir)?;
            let renamed = free_sibling_name(dst_dir, &top);
            fs::rename(tmp_dir.join(&top), &renamed).map_err(|source| Error::Restore {
                path: renamed.clone(),
                source,
            })?;
            info!("Destination already had {top:?}; restored as {renamed:?}");
            let _ = fs::remove_dir_all(&tmp_dir);
            Ok(stats)
        } else {
            ustar::unpack(&tar_bytes, dst_dir)
        }
    }

    fn verify_inner(&self, artifact: &Path) -> Result<()> {
        let tar_bytes = self.read_archive(artifact)?;
        if tar_bytes.len() < ustar::BLOCK_SIZE || &tar_bytes[257..262] != b"ustar" {
            return Err(Error::BadArchiveMagic);
        }
        Ok(())
    }

    /// Read an artifact and undo the encrypt and compress stages.
    fn read_archive(&self, artifact: &Path) -> Result<Vec<u8>> {
        let raw = fs::read(artifact).map_err(|source| Error::ReadFile {
            path: artifact.to_owned(),
            source,
        })?;
        let compressed = if self.password.is_empty() {
            raw
        } else {
            Encryptor::new(&self.password).decrypt(&raw)?
        };
        compress::decompress(&compressed)
    }
}

impl Default for BackupEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// The base name of a source directory, with POSIX trailing-slash
/// semantics: `"foo/"` and `"foo"` both yield `"foo"`.
fn source_basename(src: &Path) -> String {
    src.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            fs::canonicalize(src)
                .ok()
                .and_then(|c| c.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| "backup".to_string())
}

/// Work out the artifact file path from the user's `dst`.
fn resolve_destination(src: &Path, dst: &Path, base: &str) -> Result<PathBuf> {
    if dst.as_os_str().is_empty() {
        let dir = src.parent().unwrap_or_else(|| Path::new("."));
        return Ok(generated_name(dir, base));
    }
    let treat_as_dir = dst.is_dir() || (!dst.exists() && dst.extension().is_none());
    if treat_as_dir {
        fs::create_dir_all(dst).map_err(|source| Error::CreateDir {
            path: dst.to_owned(),
            source,
        })?;
        Ok(generated_name(dst, base))
    } else {
        Ok(dst.to_owned())
    }
}

/// `<base>.bin`, then `<base>_1.bin`, `<base>_2.bin`, … whichever is free.
fn generated_name(dir: &Path, base: &str) -> PathBuf {
    let first = dir.join(format!("{base}.bin"));
    if !first.exists() {
        return first;
    }
    for n in 1.. {
        let candidate = dir.join(format!("{base}_{n}.bin"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

/// `<dir>/<name>_N` for the smallest N ≥ 1 that does not exist yet.
fn free_sibling_name(dir: &Path, name: &str) -> PathBuf {
    for n in 1.. {
        let candidate = dir.join(format!("{name}_{n}"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::TreeFixture;

    #[test]
    fn trailing_slash_basename() {
        assert_eq!(source_basename(Path::new("/a/b/foo")), "foo");
        assert_eq!(source_basename(Path::new("/a/b/foo/")), "foo");
        assert_eq!(source_basename(Path::new("foo")), "foo");
    }

    #[test]
    fn destination_directory_generates_name() {
        let tf = TreeFixture::new();
        let target = resolve_destination(Path::new("/src/photos"), tf.path(), "photos").unwrap();
        assert_eq!(target, tf.path().join("photos.bin"));

        // An existing artifact pushes the name to a numbered suffix.
        tf.create_file("photos.bin");
        let target = resolve_destination(Path::new("/src/photos"), tf.path(), "photos").unwrap();
        assert_eq!(target, tf.path().join("photos_1.bin"));
    }

    #[test]
    fn extensionless_missing_destination_is_a_directory() {
        let tf = TreeFixture::new();
        let dst = tf.path().join("nested/out");
        let target = resolve_destination(Path::new("/src/data"), &dst, "data").unwrap();
        assert_eq!(target, dst.join("data.bin"));
        assert!(dst.is_dir());
    }

    #[test]
    fn destination_with_extension_is_a_file() {
        let tf = TreeFixture::new();
        let dst = tf.path().join("exact.bin");
        let target = resolve_destination(Path::new("/src/data"), &dst, "data").unwrap();
        assert_eq!(target, dst);
    }

    #[test]
    fn empty_destination_lands_next_to_source() {
        let tf = TreeFixture::new();
        tf.create_dir("data");
        tf.create_file("data/f");
        let src = tf.path().join("data");
        let target = resolve_destination(&src, Path::new(""), "data").unwrap();
        assert_eq!(target, tf.path().join("data.bin"));
    }

    #[test]
    fn unknown_algorithm_id_rejected() {
        let mut engine = BackupEngine::new();
        assert!(engine.set_compression_algorithm(2));
        assert!(!engine.set_compression_algorithm(7));
        // The previous selection survives a bad id.
        assert_eq!(engine.algorithm, Algorithm::Joined);
    }

    #[test]
    fn empty_source_fails() {
        let src = TreeFixture::new();
        let dst = TreeFixture::new();
        let engine = BackupEngine::new();
        assert!(!engine.backup(src.path(), &dst.path().join("out.bin")));
    }
}
