// src/core/database.rs

//! The incremental build cache.
//!
//! One embedded transactional key-value store per project, living inside the
//! hidden output directory. It is the single substrate for configuration
//! persistence and change detection: persisted options, input-file change
//! signatures (modification time plus an optional options fingerprint) and
//! output-file content hashes. Deleting the file forces a full,
//! non-incremental regeneration.
//!
//! A single write transaction spans one generation run: the caller commits
//! once at the end or rolls back once on any failure. The store is not safe
//! for concurrent generation runs against the same output directory.

use crate::constants::DATABASE_FILE_NAME;
use crate::core::paths;
use log::error;
use redb::{ReadableTable, TableDefinition};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;
use thiserror::Error;

const OPTIONS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("options");
const INPUT_FILES_TABLE: TableDefinition<&str, u64> = TableDefinition::new("input_files");
const INPUT_FINGERPRINTS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("input_file_fingerprints");
const OUTPUT_FILES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("output_files");

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("build cache error: {0}")]
    Storage(#[from] redb::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(error: redb::DatabaseError) -> Self {
        Self::Storage(error.into())
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(error: redb::TransactionError) -> Self {
        Self::Storage(error.into())
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(error: redb::TableError) -> Self {
        Self::Storage(error.into())
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(error: redb::StorageError) -> Self {
        Self::Storage(error.into())
    }
}

impl From<redb::CommitError> for DatabaseError {
    fn from(error: redb::CommitError) -> Self {
        Self::Storage(error.into())
    }
}

pub struct Database {
    directory: PathBuf,
    /// The write transaction of the current generation run. Kept open between
    /// commits so every read sees the run's own uncommitted writes. Declared
    /// before `db` so it is dropped (discarding uncommitted writes) first.
    txn: Mutex<Option<redb::WriteTransaction>>,
    db: redb::Database,
}

impl Database {
    /// Opens (or creates) the build cache inside `directory`.
    pub fn open(directory: &Path) -> Result<Self, DatabaseError> {
        let db = redb::Database::create(directory.join(DATABASE_FILE_NAME))?;
        let txn = db.begin_write()?;
        Ok(Self {
            directory: directory.to_path_buf(),
            db,
            txn: Mutex::new(Some(txn)),
        })
    }

    /// The directory the cache lives in, used for user-facing relative paths.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn get_option(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let guard = self.lock();
        let txn = guard.as_ref().expect("no active transaction");
        let table = txn.open_table(OPTIONS_TABLE)?;
        Ok(table.get(key)?.map(|value| value.value().to_string()))
    }

    pub fn set_option(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let guard = self.lock();
        let txn = guard.as_ref().expect("no active transaction");
        let mut table = txn.open_table(OPTIONS_TABLE)?;
        table.insert(key, value)?;
        Ok(())
    }

    /// True if the file is missing or its modification time differs from the
    /// recorded one; as a side effect the recorded time is brought up to
    /// date, so the next call reports "unchanged".
    pub fn did_input_file_change(&self, file: &Path) -> Result<bool, DatabaseError> {
        if !file.exists() {
            return Ok(true);
        }

        let key_path = paths::canonicalize(file);
        let key = key_path.to_string_lossy();
        let actual = modification_time_millis(file)?;

        let guard = self.lock();
        let txn = guard.as_ref().expect("no active transaction");
        let mut table = txn.open_table(INPUT_FILES_TABLE)?;
        let recorded = table.get(key.as_ref())?.map(|value| value.value());
        if recorded == Some(actual) {
            return Ok(false);
        }

        table.insert(key.as_ref(), actual)?;
        Ok(true)
    }

    /// Variant that also records a fingerprint of the options that affect how
    /// the file is processed. A fingerprint mismatch reports "changed" even
    /// when the file itself is untouched, so configuration changes invalidate
    /// derived artifacts the same way edits do.
    pub fn did_input_file_change_with_fingerprint(
        &self,
        file: &Path,
        fingerprint: &[u8],
    ) -> Result<bool, DatabaseError> {
        if !file.exists() {
            return Ok(true);
        }

        let key_path = paths::canonicalize(file);
        let key = key_path.to_string_lossy();
        let actual = modification_time_millis(file)?;
        let mut changed = false;

        let guard = self.lock();
        let txn = guard.as_ref().expect("no active transaction");

        {
            let mut fingerprints = txn.open_table(INPUT_FINGERPRINTS_TABLE)?;
            let matches = fingerprints
                .get(key.as_ref())?
                .is_some_and(|value| value.value() == fingerprint);
            if !matches {
                fingerprints.insert(key.as_ref(), fingerprint)?;
                changed = true;
            }
        }

        let mut table = txn.open_table(INPUT_FILES_TABLE)?;
        let recorded = table.get(key.as_ref())?.map(|value| value.value());
        if recorded != Some(actual) {
            table.insert(key.as_ref(), actual)?;
            changed = true;
        }

        Ok(changed)
    }

    /// True (and the hash is recorded) if no hash is recorded for the file or
    /// the recorded one differs. False — without rewriting the record — when
    /// the content is byte-identical to what was last written, which is what
    /// lets callers skip touching unchanged generated files.
    pub fn did_output_file_change(
        &self,
        file: &Path,
        content_hash: &[u8],
    ) -> Result<bool, DatabaseError> {
        let key_path = paths::canonicalize(file);
        let key = key_path.to_string_lossy();

        let guard = self.lock();
        let txn = guard.as_ref().expect("no active transaction");
        let mut table = txn.open_table(OUTPUT_FILES_TABLE)?;
        let unchanged = table
            .get(key.as_ref())?
            .is_some_and(|value| value.value() == content_hash);
        if unchanged {
            return Ok(false);
        }

        table.insert(key.as_ref(), content_hash)?;
        Ok(true)
    }

    /// Durably persists every write made since the last commit and starts a
    /// fresh transaction for the next run.
    pub fn commit(&self) -> Result<(), DatabaseError> {
        let mut guard = self.lock();
        let txn = guard.take().expect("no active transaction");
        let committed = txn.commit();
        *guard = Some(self.db.begin_write()?);
        committed?;
        Ok(())
    }

    /// Discards every write made since the last commit.
    pub fn rollback(&self) -> Result<(), DatabaseError> {
        let mut guard = self.lock();
        let txn = guard.take().expect("no active transaction");
        let aborted = txn.abort();
        *guard = Some(self.db.begin_write()?);
        aborted?;
        Ok(())
    }

    /// Rollback that swallows and logs secondary failures, so the error that
    /// triggered it is the one the caller reports.
    pub fn rollback_safe(&self) {
        if let Err(rollback_error) = self.rollback() {
            error!("failed to roll back the build cache: {rollback_error}");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<redb::WriteTransaction>> {
        self.txn.lock().expect("database mutex poisoned")
    }
}

fn modification_time_millis(file: &Path) -> Result<u64, DatabaseError> {
    let modified = fs::metadata(file)?.modified()?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    Ok(u64::try_from(millis).unwrap_or(u64::MAX))
}
