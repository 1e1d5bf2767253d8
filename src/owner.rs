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

//! Resolution of numeric user/group ids to names.
//!
//! Archives store both the numeric ids and the names so that a restore on a
//! different host can still render something meaningful. When the
//! name-service database has no entry for an id, the decimal rendering of
//! the id is used instead.

#[cfg(unix)]
mod unix {
    use std::sync::Mutex;

    use lazy_static::lazy_static;
    use uzers::{Groups, Users, UsersCache};

    lazy_static! {
        static ref USERS_CACHE: Mutex<UsersCache> = Mutex::new(UsersCache::new());
    }

    pub fn user_name(uid: u32) -> String {
        let users_cache = USERS_CACHE.lock().unwrap();
        users_cache
            .get_user_by_uid(uid)
            .and_then(|user| user.name().to_str().map(String::from))
            .unwrap_or_else(|| uid.to_string())
    }

    pub fn group_name(gid: u32) -> String {
        let users_cache = USERS_CACHE.lock().unwrap();
        users_cache
            .get_group_by_gid(gid)
            .and_then(|group| group.name().to_str().map(String::from))
            .unwrap_or_else(|| gid.to_string())
    }
}

#[cfg(unix)]
pub use unix::{group_name, user_name};

#[cfg(not(unix))]
pub fn user_name(uid: u32) -> String {
    uid.to_string()
}

#[cfg(not(unix))]
pub fn group_name(gid: u32) -> String {
    gid.to_string()
}
