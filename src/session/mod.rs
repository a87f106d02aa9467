//! Execution session: the ordered entry list plus the single in-flight slot.
//!
//! The session is owned by one event loop. Starting a run always replaces the
//! slot, which is what keeps at most one entry `Running`; there is no lock.
//! Remote calls run as spawned tasks and report back as [`Settled`] messages
//! that are only applied if they still belong to the entry in the slot.

use std::{sync::Arc, time::Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    execution::{
        EntryId, ExecError, ExecutionBackend, ExecutionEntry, ExecutionLimits,
        ExecutionRequest, ExecutionResult, STOPPED_MESSAGE, SUPERSEDED_MESSAGE,
    },
    source::SourceSnapshot,
};

/// Field of an entry that can be copied to the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyField {
    Stdin,
    Stdout,
    Stderr,
}

/// Everything a spawned task needs to perform one remote run.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: EntryId,
    pub cancel: CancellationToken,
    pub request: ExecutionRequest,
}

#[derive(Debug)]
pub enum Submission {
    /// Supported language: the caller must dispatch the job.
    Dispatch(Job),
    /// Resolved locally to an `error` entry; nothing to send.
    Rejected(EntryId),
}

impl Submission {
    pub fn id(&self) -> EntryId {
        match self {
            Self::Dispatch(job) => job.id,
            Self::Rejected(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Finished(ExecutionResult),
    Failed { error: ExecError, elapsed_ms: u64 },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub id: EntryId,
    pub outcome: Outcome,
}

#[derive(Debug)]
struct InFlight {
    id: EntryId,
    cancel: CancellationToken,
}

#[derive(Debug)]
pub struct ExecutionSession {
    entries: Vec<ExecutionEntry>,
    slot: Option<InFlight>,
    limits: ExecutionLimits,
    keep_history: bool,
    root: CancellationToken,
}

impl ExecutionSession {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self {
            entries: Vec::new(),
            slot: None,
            limits,
            keep_history: false,
            root: CancellationToken::new(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(ExecutionLimits::from_config(cfg)).with_keep_history(cfg.get_bool("KEEP_OUTPUT_HISTORY"))
    }

    /// Keep finished entries across runs instead of clearing on every run.
    pub fn with_keep_history(mut self, keep: bool) -> Self {
        self.keep_history = keep;
        self
    }

    /// Create the entry for a new run and install it in the slot.
    ///
    /// A still-running entry is settled as superseded and its request is
    /// cancelled. Unsupported languages settle immediately to `error`.
    pub fn submit(&mut self, snapshot: &SourceSnapshot, stdin: &str) -> Submission {
        self.release_slot(SUPERSEDED_MESSAGE);
        if !self.keep_history {
            self.entries.clear();
        }

        let mut entry = ExecutionEntry::start(snapshot, stdin);
        let id = entry.id();
        let language = entry.language();

        if !language.is_supported() {
            let err = ExecError::Unsupported { filename: snapshot.filename.clone() };
            log::info!("run {} rejected: {}", id, err);
            entry.settle(ExecutionResult::failure(err.to_string(), 0));
            self.entries.push(entry);
            return Submission::Rejected(id);
        }

        let request = ExecutionRequest::new(language, entry.source_text(), entry.stdin(), &self.limits);
        let cancel = self.root.child_token();
        log::info!("run {} submitted: {} ({})", id, snapshot.filename, language);
        self.entries.push(entry);
        self.slot = Some(InFlight { id, cancel: cancel.clone() });
        Submission::Dispatch(Job { id, cancel, request })
    }

    /// Apply a finished remote call. Returns `false` for results that no
    /// longer belong to the entry in the slot.
    pub fn settle(&mut self, settled: Settled) -> bool {
        match &self.slot {
            Some(in_flight) if in_flight.id == settled.id => {}
            _ => {
                log::debug!("dropping stale result for run {}", settled.id);
                return false;
            }
        }
        self.slot = None;

        let Some(entry) = self.entry_mut(settled.id) else {
            return false;
        };
        let result = match settled.outcome {
            Outcome::Finished(result) => result,
            Outcome::Failed { error, elapsed_ms } => {
                log::warn!("run {} failed: {}", settled.id, error);
                ExecutionResult::failure(error.to_string(), elapsed_ms)
            }
            Outcome::Cancelled => {
                let elapsed = entry.elapsed_since_start_ms();
                ExecutionResult::failure(STOPPED_MESSAGE, elapsed)
            }
        };
        let applied = entry.settle(result);
        if applied {
            log::info!("run {} settled: {}", settled.id, entry.status());
        }
        applied
    }

    /// User-initiated stop. Settles the running entry right away; the
    /// network request is cancelled but not awaited.
    pub fn stop(&mut self) -> bool {
        let stopped = self.release_slot(STOPPED_MESSAGE);
        if stopped {
            log::info!("run stopped by user");
        }
        stopped
    }

    /// Remove every entry, cancelling any in-flight request.
    pub fn clear(&mut self) {
        if let Some(in_flight) = self.slot.take() {
            in_flight.cancel.cancel();
        }
        self.entries.clear();
    }

    /// Cancel everything for good, e.g. when the console exits.
    pub fn shutdown(&mut self) {
        self.root.cancel();
        self.slot = None;
    }

    pub fn entries(&self) -> &[ExecutionEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&ExecutionEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn latest(&self) -> Option<&ExecutionEntry> {
        self.entries.last()
    }

    pub fn running(&self) -> Option<&ExecutionEntry> {
        self.slot.as_ref().and_then(|f| self.entry(f.id))
    }

    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Exact stored text of one field; stdout/stderr are `None` while running.
    pub fn copy_field(&self, id: EntryId, field: CopyField) -> Option<&str> {
        let entry = self.entry(id)?;
        match field {
            CopyField::Stdin => Some(entry.stdin()),
            CopyField::Stdout => entry.result().map(|r| r.stdout.as_str()),
            CopyField::Stderr => entry.result().map(|r| r.stderr.as_str()),
        }
    }

    /// Submit and await a run in place. Used by the one-shot CLI path.
    pub async fn run<B>(&mut self, backend: &B, snapshot: &SourceSnapshot, stdin: &str) -> EntryId
    where
        B: ExecutionBackend + ?Sized,
    {
        match self.submit(snapshot, stdin) {
            Submission::Rejected(id) => id,
            Submission::Dispatch(job) => {
                let id = job.id;
                let settled = execute_job(backend, job).await;
                self.settle(settled);
                id
            }
        }
    }

    fn release_slot(&mut self, message: &str) -> bool {
        let Some(in_flight) = self.slot.take() else {
            return false;
        };
        in_flight.cancel.cancel();
        match self.entry_mut(in_flight.id) {
            Some(entry) => {
                let elapsed = entry.elapsed_since_start_ms();
                entry.settle(ExecutionResult::failure(message, elapsed))
            }
            None => false,
        }
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut ExecutionEntry> {
        self.entries.iter_mut().find(|e| e.id() == id)
    }
}

/// Race the backend call against the job's cancellation token.
pub async fn execute_job<B>(backend: &B, job: Job) -> Settled
where
    B: ExecutionBackend + ?Sized,
{
    let Job { id, cancel, request } = job;
    let started = Instant::now();
    log::debug!("dispatching run {}", id);

    let outcome = tokio::select! {
        _ = cancel.cancelled() => Outcome::Cancelled,
        res = backend.execute(&request) => match res {
            Ok(result) => Outcome::Finished(result),
            Err(error) => Outcome::Failed { error, elapsed_ms: started.elapsed().as_millis() as u64 },
        },
    };
    Settled { id, outcome }
}

/// Spawn [`execute_job`] on the runtime.
pub fn dispatch(backend: Arc<dyn ExecutionBackend>, job: Job) -> JoinHandle<Settled> {
    tokio::spawn(async move { execute_job(backend.as_ref(), job).await })
}
