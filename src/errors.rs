// Copyright 2024-2026 Garner contributors.

//! Error types for the backup engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from any stage of the backup pipeline.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read source tree {path:?}: {source}")]
    ReadTree { path: PathBuf, source: io::Error },

    #[error("Failed to read {path:?}: {source}")]
    ReadFile { path: PathBuf, source: io::Error },

    #[error("Failed to write {path:?}: {source}")]
    WriteFile { path: PathBuf, source: io::Error },

    #[error("Failed to create directory {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to restore {path:?}: {source}")]
    Restore { path: PathBuf, source: io::Error },

    #[error("Failed to write archive stream: {source}")]
    WriteArchive { source: io::Error },

    /// The stored header checksum does not match the header bytes.
    #[error("Bad tar header checksum for {name:?}")]
    TarChecksum { name: String },

    #[error("Tar stream ends in the middle of an entry")]
    TarTruncated,

    #[error("Unknown compression algorithm id {id}")]
    UnknownAlgorithm { id: u8 },

    #[error("Compressed data is truncated")]
    CompressedDataTruncated,

    #[error("Corrupt compressed stream")]
    CorruptCompressedStream,

    /// An LZSS back-reference points outside the bytes decoded so far.
    #[error("Back-reference offset {offset} outside decoded output of {produced} bytes")]
    BadBackReference { offset: usize, produced: usize },

    /// Padding check failed on the final block: wrong password or corrupt data.
    #[error("Decryption failed: wrong password or corrupt data")]
    BadPassword,

    #[error("Source tree {path:?} contains no entries")]
    EmptySource { path: PathBuf },

    #[error("No entries match the backup filter")]
    AllEntriesFiltered,

    #[error("Invalid filter regex {pattern:?}: {source}")]
    BadFilterRegex { pattern: String, source: regex::Error },

    /// The decompressed artifact does not carry the ustar magic.
    #[error("Not a valid backup artifact: bad archive magic")]
    BadArchiveMagic,
}
