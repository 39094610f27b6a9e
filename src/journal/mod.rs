//! Durable, append-only run history, one JSONL partition per host.
//!
//! Layout under the journal directory:
//!
//! ```text
//! <host_id>.journal.jsonl   run_started, intent, entry, run_completed records
//! <host_id>.lock            flock held by the single writer of that partition
//! ```
//!
//! Every record is flushed with `fsync` before the call returns. Nothing is ever
//! rewritten; a correction is a later record.
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

use crate::adapters::{FileLockManager, LockGuard, LockManager};
use crate::constants::{FSYNC_WARN_MS, JOURNAL_LOCK_SUFFIX, JOURNAL_SUFFIX};
use crate::logging::now_iso;
use crate::types::errors::{ErrorKind, JournalWriteError};
use crate::types::{
    Intent, JournalEntry, JournalRecord, ReconciliationRun, RunFooter, RunHeader, RunStatus,
};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal partition for `{host}` is locked: {msg}")]
    Locking { host: String, msg: String },
    #[error("invalid host id `{0}` for a journal partition")]
    InvalidHost(String),
    #[error(transparent)]
    Write(#[from] JournalWriteError),
    #[error("journal read failed: {0}")]
    Read(String),
    #[error("run {0} not found in journal")]
    NotFound(Uuid),
}

/// One line per run in `list_runs`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub host_id: String,
    pub started_at: String,
    pub status: Option<RunStatus>,
    pub rollback_of: Option<Uuid>,
}

fn valid_host_id(host: &str) -> bool {
    !host.is_empty()
        && !host.starts_with('.')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Directory of per-host journal partitions.
#[derive(Clone, Debug)]
pub struct FileJournal {
    dir: PathBuf,
    lock_timeout_ms: u64,
    record_limit: Option<usize>,
}

impl FileJournal {
    pub fn new(dir: impl Into<PathBuf>, lock_timeout_ms: u64) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout_ms,
            record_limit: None,
        }
    }

    /// Fail every append of a run once it has written `limit` records, as a full disk would.
    #[must_use]
    pub fn with_record_limit(mut self, limit: Option<usize>) -> Self {
        self.record_limit = limit;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn partition_path(&self, host_id: &str) -> PathBuf {
        self.dir.join(format!("{host_id}{JOURNAL_SUFFIX}"))
    }

    /// Take the partition lock and write the `run_started` record.
    ///
    /// The lock is held until the returned writer is dropped, so two runs against the same
    /// host never interleave.
    ///
    /// # Errors
    ///
    /// `Locking` when another writer holds the partition past the lock timeout, `Write`
    /// when the directory or the header cannot be persisted.
    pub fn open_run(&self, header: RunHeader) -> Result<RunWriter, JournalError> {
        if !valid_host_id(&header.host_id) {
            return Err(JournalError::InvalidHost(header.host_id));
        }
        std::fs::create_dir_all(&self.dir).map_err(JournalWriteError::from)?;
        let lock = FileLockManager::new(
            self.dir
                .join(format!("{}{JOURNAL_LOCK_SUFFIX}", header.host_id)),
        );
        let t0 = Instant::now();
        let guard = lock.acquire(self.lock_timeout_ms).map_err(|e| match e.kind {
            ErrorKind::Locking => JournalError::Locking {
                host: header.host_id.clone(),
                msg: e.msg,
            },
            _ => JournalError::Write(JournalWriteError(e.msg)),
        })?;
        let lock_wait_ms = u64::try_from(t0.elapsed().as_millis()).unwrap_or(u64::MAX);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.partition_path(&header.host_id))
            .map_err(JournalWriteError::from)?;
        let mut w = RunWriter {
            file,
            _guard: guard,
            run_id: header.run_id,
            host_id: header.host_id.clone(),
            lock_wait_ms,
            written: 0,
            limit: self.record_limit,
        };
        w.append(&JournalRecord::RunStarted(header))?;
        Ok(w)
    }

    /// Every parseable record of one host, in write order.
    ///
    /// A torn trailing line (crash mid-write) is skipped with a warning.
    ///
    /// # Errors
    ///
    /// `Read` when the partition exists but cannot be read.
    pub fn read_partition(&self, host_id: &str) -> Result<Vec<JournalRecord>, JournalError> {
        let path = self.partition_path(host_id);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(JournalError::Read(format!("{}: {e}", path.display()))),
        };
        let mut out = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| JournalError::Read(format!("{}: {e}", path.display())))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalRecord>(&line) {
                Ok(r) => out.push(r),
                Err(e) => log::warn!("{}:{}: skipping unreadable record: {e}", path.display(), n + 1),
            }
        }
        Ok(out)
    }

    /// Host ids with a partition in this journal, sorted.
    ///
    /// # Errors
    ///
    /// `Read` when the directory exists but cannot be listed.
    pub fn hosts(&self) -> Result<Vec<String>, JournalError> {
        let rd = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(JournalError::Read(format!("{}: {e}", self.dir.display()))),
        };
        let mut hosts: Vec<String> = rd
            .filter_map(Result::ok)
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_suffix(JOURNAL_SUFFIX))
                    .map(str::to_string)
            })
            .collect();
        hosts.sort();
        Ok(hosts)
    }

    /// Reassemble one run, searching every partition.
    ///
    /// # Errors
    ///
    /// `NotFound` when no partition has a `run_started` record for `run_id`.
    pub fn read_run(&self, run_id: &Uuid) -> Result<ReconciliationRun, JournalError> {
        for host in self.hosts()? {
            let records = self.read_partition(&host)?;
            if let Some(run) = assemble(run_id, records) {
                return Ok(run);
            }
        }
        Err(JournalError::NotFound(*run_id))
    }

    /// Summaries of every run, optionally for one host, in write order per host.
    ///
    /// # Errors
    ///
    /// `Read` on unreadable partitions.
    pub fn list_runs(&self, host_id: Option<&str>) -> Result<Vec<RunSummary>, JournalError> {
        let hosts = match host_id {
            Some(h) => vec![h.to_string()],
            None => self.hosts()?,
        };
        let mut out: Vec<RunSummary> = Vec::new();
        for host in hosts {
            for rec in self.read_partition(&host)? {
                match rec {
                    JournalRecord::RunStarted(h) => out.push(RunSummary {
                        run_id: h.run_id,
                        host_id: h.host_id,
                        started_at: h.started_at,
                        status: None,
                        rollback_of: h.rollback_of,
                    }),
                    JournalRecord::RunCompleted(f) => {
                        if let Some(s) = out.iter_mut().rev().find(|s| s.run_id == f.run_id) {
                            s.status = Some(f.status);
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(out)
    }
}

fn assemble(run_id: &Uuid, records: Vec<JournalRecord>) -> Option<ReconciliationRun> {
    let mut run: Option<ReconciliationRun> = None;
    let mut intents: Vec<Intent> = Vec::new();
    for rec in records.into_iter().filter(|r| r.run_id() == run_id) {
        match rec {
            JournalRecord::RunStarted(h) => {
                run = Some(ReconciliationRun {
                    run_id: h.run_id,
                    host_id: h.host_id,
                    plan_id: h.plan_id,
                    started_at: h.started_at,
                    completed_at: None,
                    status: None,
                    rollback_of: h.rollback_of,
                    root: h.root,
                    items: h.items,
                    entries: Vec::new(),
                    dangling_intents: Vec::new(),
                });
            }
            JournalRecord::Intent(i) => intents.push(i),
            JournalRecord::Entry(e) => {
                // An entry settles the most recent open intent for its item.
                if let Some(pos) = intents.iter().rposition(|i| i.item_id == e.item_id) {
                    intents.remove(pos);
                }
                if let Some(r) = run.as_mut() {
                    r.entries.push(e);
                }
            }
            JournalRecord::RunCompleted(f) => {
                if let Some(r) = run.as_mut() {
                    r.completed_at = Some(f.completed_at);
                    r.status = Some(f.status);
                }
            }
        }
    }
    let mut run = run?;
    run.dangling_intents = intents;
    Some(run)
}

/// Exclusive appender for one run. Dropping it releases the partition lock.
pub struct RunWriter {
    file: File,
    _guard: Box<dyn LockGuard>,
    run_id: Uuid,
    host_id: String,
    lock_wait_ms: u64,
    written: usize,
    limit: Option<usize>,
}

impl RunWriter {
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    #[must_use]
    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    #[must_use]
    pub const fn lock_wait_ms(&self) -> u64 {
        self.lock_wait_ms
    }

    /// Append one record and `fsync` it.
    ///
    /// # Errors
    ///
    /// Any serialization, write or sync failure.
    pub fn append(&mut self, rec: &JournalRecord) -> Result<(), JournalWriteError> {
        if self.limit.is_some_and(|n| self.written >= n) {
            return Err(JournalWriteError(format!(
                "no space left on device after {} records",
                self.written
            )));
        }
        let mut line =
            serde_json::to_string(rec).map_err(|e| JournalWriteError(e.to_string()))?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        let t0 = Instant::now();
        self.file.sync_data()?;
        let ms = t0.elapsed().as_millis();
        if ms > u128::from(FSYNC_WARN_MS) {
            log::warn!("journal fsync took {ms} ms for run {}", self.run_id);
        }
        self.written += 1;
        Ok(())
    }

    /// # Errors
    ///
    /// See [`RunWriter::append`].
    pub fn intent(&mut self, intent: Intent) -> Result<(), JournalWriteError> {
        self.append(&JournalRecord::Intent(intent))
    }

    /// # Errors
    ///
    /// See [`RunWriter::append`].
    pub fn record(&mut self, entry: JournalEntry) -> Result<(), JournalWriteError> {
        self.append(&JournalRecord::Entry(entry))
    }

    /// Write the `run_completed` footer and release the lock.
    ///
    /// # Errors
    ///
    /// See [`RunWriter::append`].
    pub fn complete(mut self, status: RunStatus) -> Result<String, JournalWriteError> {
        let completed_at = now_iso();
        self.append(&JournalRecord::RunCompleted(RunFooter {
            run_id: self.run_id,
            completed_at: completed_at.clone(),
            status,
        }))?;
        Ok(completed_at)
    }
}
