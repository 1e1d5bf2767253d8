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

//! The kind of entry found in a source tree or archive.

use std::fs::FileType;

use serde::{Deserialize, Serialize};

/// Kind of file that can be recorded in a backup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub enum Kind {
    File,
    Dir,
    Symlink,
    Fifo,
    Socket,
    CharDevice,
    BlockDevice,
    /// Unknown file observed in the source tree. Recorded but never packed.
    Unknown,
}

impl Kind {
    pub fn is_file(&self) -> bool {
        matches!(self, Kind::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Kind::Dir)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, Kind::Symlink)
    }

    /// True for device nodes, which carry major/minor numbers.
    pub fn is_device(&self) -> bool {
        matches!(self, Kind::CharDevice | Kind::BlockDevice)
    }
}

#[cfg(unix)]
impl From<FileType> for Kind {
    fn from(ft: FileType) -> Kind {
        use std::os::unix::fs::FileTypeExt;
        if ft.is_file() {
            Kind::File
        } else if ft.is_dir() {
            Kind::Dir
        } else if ft.is_symlink() {
            Kind::Symlink
        } else if ft.is_fifo() {
            Kind::Fifo
        } else if ft.is_socket() {
            Kind::Socket
        } else if ft.is_char_device() {
            Kind::CharDevice
        } else if ft.is_block_device() {
            Kind::BlockDevice
        } else {
            Kind::Unknown
        }
    }
}

#[cfg(not(unix))]
impl From<FileType> for Kind {
    fn from(ft: FileType) -> Kind {
        if ft.is_file() {
            Kind::File
        } else if ft.is_dir() {
            Kind::Dir
        } else if ft.is_symlink() {
            Kind::Symlink
        } else {
            Kind::Unknown
        }
    }
}
