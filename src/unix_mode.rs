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

//! Discretionary Access Control permissions for archived files.
//!
//! Only the low 12 bits of the Unix mode are stored: the three permission
//! classes plus the sticky and set-id bits. The file-type bits are carried
//! separately as a [crate::Kind].

use std::fmt;
#[cfg(unix)]
use std::fs::Permissions;

use serde::{Deserialize, Serialize};

/// Permission, sticky, and set-id bits of a file mode.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnixMode(u32);

// Masks all bits other than the permissions, sticky, and set bits.
const MODE_BITS: u32 = 0o7777;

impl Default for UnixMode {
    fn default() -> Self {
        Self(0o775)
    }
}

impl PartialEq for UnixMode {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for UnixMode {}

impl UnixMode {
    /// The raw permission bits, as stored in a tar header's mode field.
    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn readonly(self) -> bool {
        self.0 & 0o200 == 0
    }
}

impl fmt::Display for UnixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The file type bits are stripped, so unix_mode::to_string renders a
        // leading question mark, which we strip back off.
        write!(
            f,
            "{}",
            unix_mode::to_string(self.0).trim_start_matches('?')
        )
    }
}

impl From<u32> for UnixMode {
    fn from(mode: u32) -> Self {
        Self(mode & MODE_BITS)
    }
}

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[cfg(unix)]
impl From<Permissions> for UnixMode {
    fn from(p: Permissions) -> Self {
        Self(p.mode() & MODE_BITS)
    }
}

#[cfg(unix)]
impl From<UnixMode> for Permissions {
    fn from(u: UnixMode) -> Self {
        Permissions::from_mode(u.0)
    }
}
