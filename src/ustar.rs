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

//! Serialize file records to, and materialize them from, the POSIX ustar
//! archive format.
//!
//! The stream is a sequence of 512-byte blocks: one header per entry,
//! regular-file content zero-padded to the next block boundary, and two
//! all-zero blocks as the terminator. Numeric header fields are
//! right-justified zero-padded octal, NUL-terminated.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use filetime::FileTime;
use tracing::warn;

use crate::entry::FileRecord;
use crate::kind::Kind;
use crate::relpath::RelPath;
use crate::stats::RestoreStats;
use crate::{Error, Result};

pub(crate) const BLOCK_SIZE: usize = 512;

const MAGIC: &[u8; 6] = b"ustar\0";
const VERSION: &[u8; 2] = b"00";

/// Byte ranges of the ustar header fields within a block.
mod field {
    use std::ops::Range;

    pub const NAME: Range<usize> = 0..100;
    pub const MODE: Range<usize> = 100..108;
    pub const UID: Range<usize> = 108..116;
    pub const GID: Range<usize> = 116..124;
    pub const SIZE: Range<usize> = 124..136;
    pub const MTIME: Range<usize> = 136..148;
    pub const CHKSUM: Range<usize> = 148..156;
    pub const TYPEFLAG: usize = 156;
    pub const LINKNAME: Range<usize> = 157..257;
    pub const MAGIC: Range<usize> = 257..263;
    pub const VERSION: Range<usize> = 263..265;
    pub const UNAME: Range<usize> = 265..297;
    pub const GNAME: Range<usize> = 297..329;
    pub const DEVMAJOR: Range<usize> = 329..337;
    pub const DEVMINOR: Range<usize> = 337..345;
    pub const PREFIX: Range<usize> = 345..500;
}

const TYPE_FILE: u8 = b'0';
const TYPE_SYMLINK: u8 = b'2';
const TYPE_CHAR_DEVICE: u8 = b'3';
const TYPE_BLOCK_DEVICE: u8 = b'4';
const TYPE_DIR: u8 = b'5';
const TYPE_FIFO: u8 = b'6';

/// Write `records` as a ustar stream, ending with two zero blocks.
///
/// Regular-file content is streamed from each record's source path.
/// Sockets and unknown kinds have no tar representation and are skipped
/// with a warning.
pub fn pack<W: Write>(records: &[FileRecord], out: &mut W) -> Result<()> {
    for record in records {
        if matches!(record.kind, Kind::Socket | Kind::Unknown) {
            warn!(
                "Skipping {:?}: {:?} entries cannot be archived",
                record.relpath, record.kind
            );
            continue;
        }
        let header = build_header(record);
        out.write_all(&header)
            .map_err(|source| Error::WriteArchive { source })?;
        if record.kind.is_file() {
            write_content(record, out)?;
        }
    }
    out.write_all(&[0u8; BLOCK_SIZE * 2])
        .map_err(|source| Error::WriteArchive { source })
}

/// Read a ustar stream out of `bytes` and materialize it under `dest`.
///
/// A header with a bad checksum aborts the whole unpack. Entries whose
/// paths are unsafe (absolute or containing `..`) are skipped with a
/// warning. Device nodes and FIFOs are attempted and skipped with a
/// warning when the process lacks privilege.
pub fn unpack(bytes: &[u8], dest: &Path) -> Result<RestoreStats> {
    let mut stats = RestoreStats::default();
    let mut offset = 0;
    while offset + BLOCK_SIZE <= bytes.len() {
        let block: &[u8; BLOCK_SIZE] = bytes[offset..offset + BLOCK_SIZE].try_into().unwrap();
        offset += BLOCK_SIZE;
        if block.iter().all(|&b| b == 0) {
            break;
        }
        verify_checksum(block)?;
        let name = full_name(block);
        let size = parse_octal(&block[field::SIZE]) as usize;
        let type_flag = block[field::TYPEFLAG];
        let is_regular = type_flag == TYPE_FILE || type_flag == 0;
        let content_blocks = size.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        if is_regular && offset + size > bytes.len() {
            return Err(Error::TarTruncated);
        }

        if !RelPath::is_valid(&name) {
            warn!("Skipping entry with unsafe path {name:?}");
            stats.skipped += 1;
            if is_regular {
                offset += content_blocks;
            }
            continue;
        }
        let dest_path = RelPath::from(name.clone()).below(dest);
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
                path: parent.to_owned(),
                source,
            })?;
        }

        let mode = parse_octal(&block[field::MODE]) as u32;
        let mtime = parse_octal(&block[field::MTIME]) as i64;
        let mut materialized = true;
        match type_flag {
            t if t == TYPE_FILE || t == 0 => {
                fs::write(&dest_path, &bytes[offset..offset + size]).map_err(|source| {
                    Error::Restore {
                        path: dest_path.clone(),
                        source,
                    }
                })?;
                offset += content_blocks;
                stats.files += 1;
            }
            TYPE_DIR => {
                fs::create_dir_all(&dest_path).map_err(|source| Error::CreateDir {
                    path: dest_path.clone(),
                    source,
                })?;
                stats.directories += 1;
            }
            TYPE_SYMLINK => {
                restore_symlink(block, &dest_path, mtime, &mut stats);
                materialized = false;
            }
            TYPE_CHAR_DEVICE | TYPE_BLOCK_DEVICE | TYPE_FIFO => {
                if restore_special(block, type_flag, &dest_path, mode) {
                    stats.special_files += 1;
                } else {
                    stats.skipped += 1;
                    materialized = false;
                }
            }
            other => {
                warn!("Skipping {name:?} with unsupported type flag {other:?}");
                stats.skipped += 1;
                materialized = false;
            }
        }

        if materialized {
            restore_metadata(&dest_path, mode, mtime);
        }
    }
    Ok(stats)
}

/// The top-level name of the first entry in a tar stream, if any.
///
/// Restore uses this to predict the directory an extraction will create.
pub(crate) fn peek_top_level(bytes: &[u8]) -> Option<String> {
    if bytes.len() < BLOCK_SIZE {
        return None;
    }
    let block: &[u8; BLOCK_SIZE] = bytes[..BLOCK_SIZE].try_into().unwrap();
    if block.iter().all(|&b| b == 0) {
        return None;
    }
    let name = full_name(block);
    name.split('/').next().map(String::from).filter(|s| !s.is_empty())
}

fn build_header(record: &FileRecord) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    let (name, prefix) = split_path(record.relpath.as_bytes());
    block[field::NAME][..name.len()].copy_from_slice(name);
    block[field::PREFIX][..prefix.len()].copy_from_slice(prefix);
    write_octal(&mut block[field::MODE], record.mode.bits() as u64);
    write_octal(&mut block[field::UID], record.uid as u64);
    write_octal(&mut block[field::GID], record.gid as u64);
    write_octal(&mut block[field::SIZE], record.size);
    write_octal(&mut block[field::MTIME], record.mtime.max(0) as u64);
    block[field::TYPEFLAG] = match record.kind {
        Kind::File => TYPE_FILE,
        Kind::Dir => TYPE_DIR,
        Kind::Symlink => TYPE_SYMLINK,
        Kind::CharDevice => TYPE_CHAR_DEVICE,
        Kind::BlockDevice => TYPE_BLOCK_DEVICE,
        Kind::Fifo => TYPE_FIFO,
        Kind::Socket | Kind::Unknown => unreachable!("skipped before header build"),
    };
    if let Some(target) = &record.link_target {
        write_str(&mut block[field::LINKNAME], target);
    }
    block[field::MAGIC].copy_from_slice(MAGIC);
    block[field::VERSION].copy_from_slice(VERSION);
    write_str(&mut block[field::UNAME], &record.user);
    write_str(&mut block[field::GNAME], &record.group);
    if record.kind.is_device() {
        write_octal(&mut block[field::DEVMAJOR], record.dev_major as u64);
        write_octal(&mut block[field::DEVMINOR], record.dev_minor as u64);
    }
    write_checksum(&mut block);
    block
}

/// Split an archive path into ustar `(name, prefix)` fields.
///
/// Paths of 100 bytes or less go entirely in `name`. Longer paths are
/// split at the leftmost `/` that leaves `name` within 100 bytes and
/// `prefix` within 155; the separator itself is not stored. With no such
/// split point the path is truncated into `name` with a warning.
fn split_path(path: &[u8]) -> (&[u8], &[u8]) {
    let len = path.len();
    if len <= field::NAME.len() {
        return (path, &[]);
    }
    let lo = len.saturating_sub(field::NAME.len() + 1);
    let hi = len.min(field::PREFIX.len());
    for i in lo..hi {
        if path[i] == b'/' {
            return (&path[i + 1..], &path[..i]);
        }
    }
    warn!(
        "Path too long for a ustar header, truncated: {:?}",
        String::from_utf8_lossy(path)
    );
    (&path[..field::NAME.len()], &[])
}

fn write_content<W: Write>(record: &FileRecord, out: &mut W) -> Result<()> {
    let mut file = fs::File::open(&record.path).map_err(|source| Error::ReadFile {
        path: record.path.clone(),
        source,
    })?;
    let mut buf = [0u8; 64 * 1024];
    let mut remaining = record.size;
    while remaining > 0 {
        let want = buf.len().min(remaining as usize);
        let read = file
            .read(&mut buf[..want])
            .map_err(|source| Error::ReadFile {
                path: record.path.clone(),
                source,
            })?;
        if read == 0 {
            // File shrank since traversal; the header size must still be
            // honored to keep the stream aligned.
            warn!("{:?} shrank during backup; padding with zeros", record.path);
            break;
        }
        out.write_all(&buf[..read])
            .map_err(|source| Error::WriteArchive { source })?;
        remaining -= read as u64;
    }
    let written = record.size - remaining;
    let padding = (BLOCK_SIZE - (written as usize % BLOCK_SIZE)) % BLOCK_SIZE;
    let zeros = vec![0u8; padding + remaining as usize];
    out.write_all(&zeros)
        .map_err(|source| Error::WriteArchive { source })
}

#[cfg(unix)]
fn restore_symlink(block: &[u8; BLOCK_SIZE], dest_path: &Path, mtime: i64, stats: &mut RestoreStats) {
    let target = parse_str(&block[field::LINKNAME]);
    if target.is_empty() {
        warn!("Symlink entry {dest_path:?} has no target; skipped");
        stats.skipped += 1;
        return;
    }
    // Replace whatever sits at the destination.
    let _ = fs::remove_file(dest_path);
    match std::os::unix::fs::symlink(&target, dest_path) {
        Ok(()) => {
            let ft = FileTime::from_unix_time(mtime, 0);
            let _ = filetime::set_symlink_file_times(dest_path, ft, ft);
            stats.symlinks += 1;
        }
        Err(err) => {
            warn!("Failed to create symlink {dest_path:?} -> {target:?}: {err}");
            stats.skipped += 1;
        }
    }
}

#[cfg(not(unix))]
fn restore_symlink(_block: &[u8; BLOCK_SIZE], dest_path: &Path, _mtime: i64, stats: &mut RestoreStats) {
    warn!("Symlinks are not restored on this platform: {dest_path:?}");
    stats.skipped += 1;
}

/// Recreate a device node or FIFO. Returns false if it could not be
/// created, which is expected for unprivileged processes.
#[cfg(unix)]
fn restore_special(block: &[u8; BLOCK_SIZE], type_flag: u8, dest_path: &Path, mode: u32) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let cpath = match CString::new(dest_path.as_os_str().as_bytes()) {
        Ok(c) => c,
        Err(_) => return false,
    };
    let ret = if type_flag == TYPE_FIFO {
        unsafe { libc::mkfifo(cpath.as_ptr(), mode as libc::mode_t) }
    } else {
        let kind_bits = if type_flag == TYPE_CHAR_DEVICE {
            libc::S_IFCHR
        } else {
            libc::S_IFBLK
        };
        let major = parse_octal(&block[field::DEVMAJOR]);
        let minor = parse_octal(&block[field::DEVMINOR]);
        let dev = libc::makedev(major as _, minor as _);
        unsafe { libc::mknod(cpath.as_ptr(), kind_bits | mode as libc::mode_t, dev) }
    };
    if ret != 0 {
        warn!(
            "Cannot create special file {dest_path:?}: {}",
            std::io::Error::last_os_error()
        );
    }
    ret == 0
}

#[cfg(not(unix))]
fn restore_special(_block: &[u8; BLOCK_SIZE], _type_flag: u8, dest_path: &Path, _mode: u32) -> bool {
    warn!("Special files are not restored on this platform: {dest_path:?}");
    false
}

/// Restore mode bits and both timestamps from the header.
fn restore_metadata(path: &Path, mode: u32, mtime: i64) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
            warn!("Failed to restore permissions on {path:?}: {err}");
        }
    }
    let ft = FileTime::from_unix_time(mtime, 0);
    if let Err(err) = filetime::set_file_times(path, ft, ft) {
        warn!("Failed to restore times on {path:?}: {err}");
    }
}

/// Right-justified zero-padded octal, NUL-terminated, filling the field.
///
/// Values beyond the field's octal capacity are clamped; plain ustar has
/// no representation for them.
fn write_octal(dest: &mut [u8], value: u64) {
    let width = dest.len() - 1;
    let max = (1u64 << (3 * width as u32)) - 1;
    if value > max {
        warn!("Octal field overflow: {value} clamped to {max}");
    }
    let clamped = value.min(max);
    let s = format!("{clamped:0width$o}");
    dest[..s.len()].copy_from_slice(s.as_bytes());
    // Remaining bytes, including the terminator, stay NUL.
}

/// NUL-terminated string field, truncated to fit.
fn write_str(dest: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(dest.len() - 1);
    dest[..n].copy_from_slice(&bytes[..n]);
}

/// Parse an octal field leniently: stop at the first NUL, tolerate
/// leading/trailing spaces, yield 0 for anything unparseable.
fn parse_octal(fieldbytes: &[u8]) -> u64 {
    let end = fieldbytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(fieldbytes.len());
    let s = String::from_utf8_lossy(&fieldbytes[..end]);
    u64::from_str_radix(s.trim(), 8).unwrap_or(0)
}

fn parse_str(fieldbytes: &[u8]) -> String {
    let end = fieldbytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(fieldbytes.len());
    String::from_utf8_lossy(&fieldbytes[..end]).into_owned()
}

fn full_name(block: &[u8; BLOCK_SIZE]) -> String {
    let name = parse_str(&block[field::NAME]);
    let prefix = parse_str(&block[field::PREFIX]);
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

/// Unsigned byte sum of the block with the checksum field read as spaces.
fn checksum(block: &[u8; BLOCK_SIZE]) -> u64 {
    block
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            if field::CHKSUM.contains(&i) {
                b' ' as u64
            } else {
                b as u64
            }
        })
        .sum()
}

/// Six octal digits, NUL, space.
fn write_checksum(block: &mut [u8; BLOCK_SIZE]) {
    let sum = checksum(block);
    let s = format!("{sum:06o}\0 ");
    block[field::CHKSUM].copy_from_slice(s.as_bytes());
}

fn verify_checksum(block: &[u8; BLOCK_SIZE]) -> Result<()> {
    let stored = parse_octal(&block[field::CHKSUM]);
    if stored == checksum(block) {
        Ok(())
    } else {
        Err(Error::TarChecksum {
            name: full_name(block),
        })
    }
}
