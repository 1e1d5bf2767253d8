// Copyright 2025-2026 Garner contributors.

//! Count of files, bytes, etc, processed by one operation.

use serde::Serialize;

/// Counts of work done while making a backup artifact.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct BackupStats {
    pub files: usize,
    pub directories: usize,
    pub symlinks: usize,
    /// FIFOs, sockets, and device nodes.
    pub special_files: usize,
    /// Entries removed by the backup filter.
    pub filtered_out: usize,
    /// Total regular-file bytes read from the source tree.
    pub source_bytes: u64,
    /// Size of the finished artifact, after compression and encryption.
    pub artifact_bytes: u64,
}

/// Counts of entries materialized by a restore.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RestoreStats {
    pub files: usize,
    pub directories: usize,
    pub symlinks: usize,
    pub special_files: usize,
    /// Entries skipped: unsafe paths, unsupported kinds, or insufficient
    /// privilege for device nodes.
    pub skipped: usize,
}
