// Copyright 2025-2026 Garner contributors.

//! Long-running supervision of backup tasks.
//!
//! A scheduler owns a list of tasks, each with its own [BackupEngine], and
//! one supervisor thread that wakes every two seconds. Scheduled tasks run
//! when their interval has elapsed; realtime tasks run when the source
//! tree's mtime snapshot changes. After each successful run the oldest
//! artifacts beyond the task's retention limit are deleted.
//!
//! Tasks live in memory only; there is no persisted registry.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::engine::BackupEngine;
use crate::filter::Filter;
use crate::traverse::traverse;

/// How often the supervisor scans its tasks.
const TICK: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TaskKind {
    /// Runs whenever the configured interval has elapsed.
    Scheduled,
    /// Runs whenever the source tree changes.
    Realtime,
}

struct BackupTask {
    id: u64,
    kind: TaskKind,
    src_dir: PathBuf,
    dst_dir: PathBuf,
    prefix: String,
    interval_secs: u64,
    /// Keep at most this many artifacts; zero or negative disables pruning.
    max_keep: i32,
    /// POSIX seconds of the last successful run.
    last_run: Option<u64>,
    /// relpath -> mtime of non-directory entries, for change detection.
    snapshot: BTreeMap<String, i64>,
    engine: BackupEngine,
}

struct State {
    running: bool,
    next_id: u64,
    tasks: Vec<BackupTask>,
}

type Shared = Arc<(Mutex<State>, Condvar)>;

/// Supervises any number of scheduled and realtime backup tasks.
pub struct Scheduler {
    shared: Shared,
    thread: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler {
            shared: Arc::new((
                Mutex::new(State {
                    running: false,
                    next_id: 1,
                    tasks: Vec::new(),
                }),
                Condvar::new(),
            )),
            thread: None,
        }
    }

    /// Start the supervisor thread. Does nothing if already running.
    pub fn start(&mut self) {
        {
            let (lock, _) = &*self.shared;
            let mut state = lock.lock().unwrap();
            if state.running {
                return;
            }
            state.running = true;
        }
        let shared = Arc::clone(&self.shared);
        self.thread = Some(
            std::thread::Builder::new()
                .name("garner-scheduler".to_string())
                .spawn(move || supervise(shared))
                .expect("spawn scheduler thread"),
        );
        info!("Scheduler started");
    }

    /// Ask the supervisor to exit and wait for it.
    ///
    /// A backup already in progress finishes; nothing is cancelled
    /// mid-operation.
    pub fn stop(&mut self) {
        {
            let (lock, cvar) = &*self.shared;
            let mut state = lock.lock().unwrap();
            if !state.running && self.thread.is_none() {
                return;
            }
            state.running = false;
            cvar.notify_all();
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        info!("Scheduler stopped");
    }

    /// Add a task that runs every `interval_secs` seconds. Returns its id.
    pub fn add_scheduled_task(
        &self,
        src_dir: &Path,
        dst_dir: &Path,
        prefix: &str,
        interval_secs: u64,
        max_keep: i32,
    ) -> u64 {
        self.add_task(TaskKind::Scheduled, src_dir, dst_dir, prefix, interval_secs, max_keep)
    }

    /// Add a task that runs whenever the source tree changes. Returns its id.
    pub fn add_realtime_task(
        &self,
        src_dir: &Path,
        dst_dir: &Path,
        prefix: &str,
        max_keep: i32,
    ) -> u64 {
        self.add_task(TaskKind::Realtime, src_dir, dst_dir, prefix, 0, max_keep)
    }

    fn add_task(
        &self,
        kind: TaskKind,
        src_dir: &Path,
        dst_dir: &Path,
        prefix: &str,
        interval_secs: u64,
        max_keep: i32,
    ) -> u64 {
        if let Err(err) = fs::create_dir_all(dst_dir) {
            warn!("Cannot create task destination {dst_dir:?}: {err}");
        }
        let mut task = BackupTask {
            id: 0,
            kind,
            src_dir: src_dir.to_owned(),
            dst_dir: dst_dir.to_owned(),
            prefix: prefix.to_string(),
            interval_secs,
            max_keep,
            last_run: if kind == TaskKind::Realtime {
                Some(unix_now())
            } else {
                None
            },
            snapshot: BTreeMap::new(),
            engine: BackupEngine::new(),
        };
        if kind == TaskKind::Realtime {
            // Seed the snapshot so only future edits trigger a run.
            task.snapshot = take_snapshot(src_dir).unwrap_or_default();
        }
        let (lock, _) = &*self.shared;
        let mut state = lock.lock().unwrap();
        task.id = state.next_id;
        state.next_id += 1;
        let id = task.id;
        state.tasks.push(task);
        info!("Added {kind:?} task {id} for {src_dir:?}");
        id
    }

    pub fn set_task_filter(&self, task_id: u64, filter: Filter) {
        self.with_task(task_id, |task| task.engine.set_filter(filter));
    }

    pub fn set_task_password(&self, task_id: u64, password: &str) {
        self.with_task(task_id, |task| task.engine.set_password(password));
    }

    pub fn set_task_compression_algorithm(&self, task_id: u64, algorithm: u8) {
        self.with_task(task_id, |task| {
            task.engine.set_compression_algorithm(algorithm);
        });
    }

    fn with_task<F: FnOnce(&mut BackupTask)>(&self, task_id: u64, apply: F) {
        let (lock, _) = &*self.shared;
        let mut state = lock.lock().unwrap();
        match state.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => apply(task),
            None => warn!("No task with id {task_id}"),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn supervise(shared: Shared) {
    let (lock, cvar) = &*shared;
    let mut state = lock.lock().unwrap();
    while state.running {
        let now = unix_now();
        for task in &mut state.tasks {
            let should_run = match task.kind {
                TaskKind::Scheduled => task
                    .last_run
                    .map_or(true, |last| now.saturating_sub(last) >= task.interval_secs),
                TaskKind::Realtime => check_changes(task),
            };
            if should_run {
                run_task(task);
            }
        }
        state = cvar
            .wait_timeout_while(state, TICK, |s| s.running)
            .unwrap()
            .0;
    }
}

fn run_task(task: &mut BackupTask) {
    let artifact = task.dst_dir.join(artifact_name(&task.prefix));
    debug!("Running task {}: {artifact:?}", task.id);
    if task.engine.backup(&task.src_dir, &artifact) {
        task.last_run = Some(unix_now());
        prune_old_backups(task);
    } else {
        warn!("Task {} backup failed; will retry on a later tick", task.id);
    }
}

/// Compare a fresh mtime snapshot of the source against the stored one.
///
/// Reports a change when any file's mtime differs or is new, or when the
/// set of paths shrank. On change the stored snapshot is replaced whole.
/// A traversal error counts as "no change" for this tick.
fn check_changes(task: &mut BackupTask) -> bool {
    let fresh = match take_snapshot(&task.src_dir) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            debug!("Change scan of {:?} failed: {err}", task.src_dir);
            return false;
        }
    };
    let changed = fresh.len() != task.snapshot.len()
        || fresh
            .iter()
            .any(|(path, mtime)| task.snapshot.get(path) != Some(mtime));
    if changed {
        task.snapshot = fresh;
    }
    changed
}

fn take_snapshot(src_dir: &Path) -> crate::Result<BTreeMap<String, i64>> {
    Ok(traverse(src_dir)?
        .into_iter()
        .filter(|r| !r.kind.is_dir())
        .map(|r| (String::from(r.relpath), r.mtime))
        .collect())
}

/// Delete the oldest artifacts beyond the task's retention limit.
///
/// Only files in the task's destination whose names start with the task
/// prefix and end with `.bin` count.
fn prune_old_backups(task: &BackupTask) {
    if task.max_keep <= 0 {
        return;
    }
    let read_dir = match fs::read_dir(&task.dst_dir) {
        Ok(rd) => rd,
        Err(err) => {
            warn!("Cannot list {:?} for pruning: {err}", task.dst_dir);
            return;
        }
    };
    let mut backups: Vec<(SystemTime, PathBuf)> = read_dir
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(&task.prefix)
                && name.ends_with(".bin")
                && entry.file_type().map(|t| t.is_file()).unwrap_or(false)
        })
        .filter_map(|entry| {
            let mtime = entry.metadata().and_then(|m| m.modified()).ok()?;
            Some((mtime, entry.path()))
        })
        .collect();
    if backups.len() <= task.max_keep as usize {
        return;
    }
    backups.sort_by_key(|(mtime, _)| *mtime);
    let excess = backups.len() - task.max_keep as usize;
    for (_, path) in backups.into_iter().take(excess) {
        info!("Pruning old backup {path:?}");
        if let Err(err) = fs::remove_file(&path) {
            warn!("Failed to prune {path:?}: {err}");
        }
    }
}

/// `<prefix>_<YYYYMMDD>_<HHMMSS>.bin`, in local time where available.
fn artifact_name(prefix: &str) -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let stamp = now
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .expect("format timestamp");
    format!("{prefix}_{stamp}.bin")
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
