use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::models::Task;

/// Errors produced while reading or writing the task file.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task {id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict { id: u64, expected: u64, found: u64 },
}

/// Returns the path to the tasks database file (`tasks.json`).
///
/// The path is determined in the following order:
/// 1. `TASKLOOP_DB` environment variable.
/// 2. `~/.local/share/taskloop/tasks.json` (on Linux).
/// 3. `./tasks.json` (fallback).
pub fn db_path() -> PathBuf {
    std::env::var("TASKLOOP_DB").map(PathBuf::from).unwrap_or_else(|_| {
        let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("taskloop");
        p.push("tasks.json");
        p
    })
}

/// Loads all tasks from the storage file.
///
/// A missing file is an empty database.
pub fn load_tasks() -> Result<Vec<Task>, StorageError> {
    let s = match fs::read_to_string(db_path()) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&s)?)
}

/// Loads a single task by its ID.
///
/// Returns `None` if the task is not found.
pub fn load_task(id: u64) -> Result<Option<Task>, StorageError> {
    Ok(load_tasks()?.into_iter().find(|t| t.id == id))
}

/// Saves or adds a single task.
///
/// An existing task is only replaced if its stored version matches
/// `task.version`. The saved copy, with its version bumped, is returned.
pub fn save_task(task: &Task) -> Result<Task, StorageError> {
    let mut tasks = load_tasks()?;
    let mut saved = task.clone();
    saved.version = task.version + 1;
    match tasks.iter_mut().find(|t| t.id == task.id) {
        Some(stored) if stored.version != task.version => {
            return Err(StorageError::Conflict {
                id: task.id,
                expected: task.version,
                found: stored.version,
            });
        }
        Some(stored) => *stored = saved.clone(),
        None => tasks.push(saved.clone()),
    }
    save_tasks(&tasks)?;
    Ok(saved)
}

/// Saves the given list of tasks to the storage file.
///
/// Writes a `.tmp` sibling first and renames it over the database, so readers
/// never see a half-written file.
pub fn save_tasks(tasks: &[Task]) -> Result<(), StorageError> {
    let path = db_path();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut tmp_path = path.clone();
    tmp_path.set_file_name(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("tasks.json")
    ));

    let s = serde_json::to_string_pretty(tasks)?;
    fs::write(&tmp_path, s)?;
    fs::rename(&tmp_path, &path)?;
    info!(path = %path.display(), count = tasks.len(), "saved tasks");
    Ok(())
}

/// Next free task ID.
pub fn next_id(tasks: &[Task]) -> u64 {
    tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
}

/// Deletes the tasks database file.
pub fn delete_database() -> Result<(), StorageError> {
    match fs::remove_file(db_path()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
