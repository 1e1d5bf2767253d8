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

//! Garner backup engine.
//!
//! Garner turns a directory tree into a single self-describing artifact:
//! a ustar stream, compressed with Huffman and/or LZSS coding, optionally
//! encrypted with a password. [BackupEngine] performs backup, restore, and
//! verification; [Scheduler] supervises long-lived interval-driven and
//! change-driven backup tasks with retention.

// Implementation modules.
pub mod compress;
pub mod crypto;
pub mod engine;
mod entry;
pub mod errors;
pub mod filter;
pub mod kind;
mod owner;
pub mod relpath;
pub mod scheduler;
pub mod stats;
pub mod test_fixtures;
pub mod traverse;
pub mod unix_mode;
pub mod ustar;

pub use crate::compress::Algorithm;
pub use crate::crypto::Encryptor;
pub use crate::engine::BackupEngine;
pub use crate::entry::FileRecord;
pub use crate::errors::Error;
pub use crate::filter::Filter;
pub use crate::kind::Kind;
pub use crate::relpath::RelPath;
pub use crate::scheduler::Scheduler;
pub use crate::stats::{BackupStats, RestoreStats};
pub use crate::traverse::traverse;
pub use crate::unix_mode::UnixMode;

pub type Result<T> = std::result::Result<T, Error>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> &'static str {
    VERSION
}

pub const SYMLINKS_SUPPORTED: bool = cfg!(target_family = "unix");
