#![warn(missing_docs)]
//! Joulecast Result Store
//!
//! Durable, append-only persistence for trial outcomes. Each condition owns
//! a directory under the output root holding `trials.jsonl` (one JSON record
//! per line, appended and fsynced before the orchestrator advances) and the
//! verbatim raw telemetry CSV of every sampled trial.
//!
//! The store itself is the checkpoint: experiment progress is always
//! rebuilt from it at startup, so correctness never depends on in-memory
//! state surviving a crash. A crash can leave at most one torn trailing
//! line, which reload ignores; the intact prefix is exactly the
//! at-least-the-prior-trials guarantee.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use joulecast_core::TrialRecord;

/// File name of the per-condition append-only record log.
pub const TRIAL_LOG_FILE: &str = "trials.jsonl";

/// Store failure classification. Write failures are fatal to the run: the
/// crash-safety contract depends on every record reaching disk before the
/// next trial begins.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A durable write (create, append, flush, or fsync) did not complete.
    #[error("durable write failed for {path}: {source}")]
    WriteFailed {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("could not encode trial record: {0}")]
    EncodeFailed(#[from] serde_json::Error),

    /// The store could not be read back.
    #[error("could not read result store at {path}: {source}")]
    ReadFailed {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Per-condition progress counts derived from the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionProgress {
    /// Total recorded trials, failures included. The next trial index.
    pub attempts: u32,
    /// Recorded successful trials.
    pub successes: u32,
}

/// Experiment-wide progress, reconstructed from the store on every start
/// and discarded at process exit.
#[derive(Debug, Clone, Default)]
pub struct ExperimentState {
    progress: BTreeMap<String, ConditionProgress>,
}

impl ExperimentState {
    /// Progress for one condition; zero counts when nothing was recorded.
    pub fn progress(&self, condition: &str) -> ConditionProgress {
        self.progress.get(condition).copied().unwrap_or_default()
    }

    /// All conditions with at least one recorded trial, in name order.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, ConditionProgress)> + '_ {
        self.progress.iter().map(|(name, p)| (name.as_str(), *p))
    }
}

/// The on-disk result store rooted at the output directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StoreError::WriteFailed {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// The output root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one condition's records and raw telemetry.
    pub fn condition_dir(&self, condition: &str) -> PathBuf {
        self.root.join(condition)
    }

    /// Destination path for the raw telemetry CSV of one trial, creating the
    /// condition directory on first use. The file itself is written (and
    /// overwritten, never appended) by the sampler.
    pub fn energy_path(&self, condition: &str, index: u32) -> Result<PathBuf, StoreError> {
        let dir = self.condition_dir(condition);
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::WriteFailed {
            path: dir.clone(),
            source,
        })?;
        Ok(dir.join(format!("energy_run_{index:02}.csv")))
    }

    /// Append one record to its condition's log and force it to disk.
    ///
    /// Returns only after flush and fsync: when this returns `Ok`, the trial
    /// survives a crash.
    pub fn append(&self, record: &TrialRecord) -> Result<(), StoreError> {
        let dir = self.condition_dir(&record.condition);
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::WriteFailed {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(TRIAL_LOG_FILE);

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let write = |path: &Path| -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(line.as_bytes())?;
            file.flush()?;
            file.sync_all()
        };
        write(&path).map_err(|source| StoreError::WriteFailed {
            path: path.clone(),
            source,
        })?;

        debug!(
            condition = %record.condition,
            index = record.index,
            success = record.success,
            "trial record persisted"
        );
        Ok(())
    }

    /// All intact records for one condition, in append order. A missing log
    /// means no trials yet. A torn trailing line (crash mid-write) is
    /// ignored; a malformed line elsewhere is skipped with a warning.
    pub fn records(&self, condition: &str) -> Result<Vec<TrialRecord>, StoreError> {
        let path = self.condition_dir(condition).join(TRIAL_LOG_FILE);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::ReadFailed { path, source }),
        };

        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<Result<_, _>>()
            .map_err(|source| StoreError::ReadFailed {
                path: path.clone(),
                source,
            })?;

        let mut records = Vec::with_capacity(lines.len());
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TrialRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) if i == last => {
                    debug!(path = %path.display(), "ignoring torn trailing record: {e}");
                }
                Err(e) => {
                    warn!(path = %path.display(), line = i + 1, "skipping malformed record: {e}");
                }
            }
        }
        Ok(records)
    }

    /// Names of all conditions with a record log, in name order.
    pub fn condition_names(&self) -> Result<Vec<String>, StoreError> {
        let entries = std::fs::read_dir(&self.root).map_err(|source| StoreError::ReadFailed {
            path: self.root.clone(),
            source,
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::ReadFailed {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() && path.join(TRIAL_LOG_FILE).is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Rebuild experiment-wide progress counts from the logs.
    pub fn load_state(&self) -> Result<ExperimentState, StoreError> {
        let mut progress = BTreeMap::new();
        for name in self.condition_names()? {
            let records = self.records(&name)?;
            let successes = records.iter().filter(|r| r.success).count() as u32;
            progress.insert(
                name,
                ConditionProgress {
                    attempts: records.len() as u32,
                    successes,
                },
            );
        }
        Ok(ExperimentState { progress })
    }
}
