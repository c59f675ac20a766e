//! # Parallel
//!
//! Transfer of many files at once, spread over several sessions.
//!
//! The session the transfer is started from clones itself once per extra worker. All tasks
//! are queued upfront, followed by one stop job per worker; every worker, the calling session
//! included, dequeues until it meets a stop job. The caller then waits for exactly one outcome
//! per task.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::session::{FtpSession, SessionTemplate};
use crate::types::{FtpError, FtpResult, TransferErrors};

/// Direction of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Upload the local file to the server
    Store,
    /// Download the remote file
    Retrieve,
}

/// One file to transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    direction: TransferDirection,
    local: PathBuf,
    /// Path on the server, relative to the directory the transfer was started from
    remote: String,
}

impl TransferTask {
    pub fn new(direction: TransferDirection, local: impl Into<PathBuf>, remote: &str) -> Self {
        Self {
            direction,
            local: local.into(),
            remote: remote.to_string(),
        }
    }

    /// Upload `local` as `remote`
    pub fn store(local: impl Into<PathBuf>, remote: &str) -> Self {
        Self::new(TransferDirection::Store, local, remote)
    }

    /// Download `remote` into `local`
    pub fn retrieve(local: impl Into<PathBuf>, remote: &str) -> Self {
        Self::new(TransferDirection::Retrieve, local, remote)
    }

    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    pub fn local(&self) -> &Path {
        &self.local
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }
}

impl fmt::Display for TransferTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            TransferDirection::Store => {
                write!(f, "STOR {} -> {}", self.local.display(), self.remote)
            }
            TransferDirection::Retrieve => {
                write!(f, "RETR {} -> {}", self.remote, self.local.display())
            }
        }
    }
}

/// What workers dequeue
enum Job {
    Transfer(TransferTask),
    Stop,
}

/// What workers report
#[derive(Debug)]
enum Outcome {
    Done,
    TaskFailed(String),
    /// The session of a worker could not be opened; the worker dequeued nothing
    WorkerAborted(String),
}

/// Amount of workers for `tasks` tasks: `None` means one per task, and there is always at
/// least one worker unless there is nothing to do.
pub(crate) fn effective_parallelism(tasks: usize, requested: Option<usize>) -> usize {
    if tasks == 0 {
        return 0;
    }
    match requested {
        None => tasks,
        Some(requested) => requested.clamp(1, tasks),
    }
}

impl FtpSession {
    /// Run all `tasks` over up to `parallel` sessions (`None` for one session per task).
    ///
    /// This session is one of the workers and stays open; the others are opened in the
    /// current directory of this session and quit once the queue is empty.
    /// Every task is attempted: failures are collected and reported together as
    /// [`FtpError::TransferFailed`].
    pub fn multiple_transfer(
        &mut self,
        tasks: Vec<TransferTask>,
        parallel: Option<usize>,
    ) -> FtpResult<()> {
        let total = tasks.len();
        let parallel = effective_parallelism(total, parallel);
        if parallel == 0 {
            debug!("nothing to transfer");
            return Ok(());
        }
        info!("transferring {total} files over {parallel} sessions");
        let template = match parallel {
            1 => None,
            _ => {
                let directory = self.pwd()?;
                Some(self.template(&directory)?)
            }
        };

        let (job_tx, job_rx) = bounded(total + parallel);
        for task in tasks {
            let _ = job_tx.send(Job::Transfer(task));
        }
        for _ in 0..parallel {
            let _ = job_tx.send(Job::Stop);
        }
        drop(job_tx);
        let (outcome_tx, outcome_rx) = bounded(total + parallel);

        let errors = std::thread::scope(|scope| {
            if let Some(template) = template.as_ref() {
                for worker in 1..parallel {
                    let jobs = job_rx.clone();
                    let outcomes = outcome_tx.clone();
                    scope.spawn(move || run_worker(worker, template, jobs, outcomes));
                }
            }
            process_jobs(self, &job_rx, &outcome_tx);
            drop(outcome_tx);
            collect_outcomes(&outcome_rx, total)
        });

        if errors.is_empty() {
            info!("all {total} transfers completed");
            Ok(())
        } else {
            error!("{} transfers out of {total} failed", errors.len());
            Err(FtpError::TransferFailed(errors))
        }
    }

    /// Perform a single task on this session
    fn transfer(&mut self, task: &TransferTask) -> FtpResult<()> {
        match task.direction {
            TransferDirection::Store => {
                let mut file = File::open(&task.local).map_err(FtpError::LocalIo)?;
                self.put_file(&task.remote, &mut file).map(|_| ())
            }
            TransferDirection::Retrieve => {
                let mut stream = self.retr_as_stream(&task.remote)?;
                let copied = File::create(&task.local)
                    .and_then(|mut file| io::copy(&mut stream, &mut file))
                    .map_err(FtpError::LocalIo);
                stream.finalize()?;
                copied.map(|_| ())
            }
        }
    }
}

/// Body of a worker thread: open a session, process jobs, quit
fn run_worker(
    worker: usize,
    template: &SessionTemplate,
    jobs: Receiver<Job>,
    outcomes: Sender<Outcome>,
) {
    debug!("worker {worker}: opening session");
    let mut session = match template.open() {
        Ok(session) => session,
        Err(err) => {
            error!("worker {worker}: could not open session: {err}");
            let _ = outcomes.send(Outcome::WorkerAborted(err.to_string()));
            return;
        }
    };
    process_jobs(&mut session, &jobs, &outcomes);
    if let Err(err) = session.quit() {
        warn!("worker {worker}: failed to quit session: {err}");
    }
    debug!("worker {worker}: done");
}

/// Dequeue and perform tasks until a stop job
fn process_jobs(session: &mut FtpSession, jobs: &Receiver<Job>, outcomes: &Sender<Outcome>) {
    while let Ok(job) = jobs.recv() {
        let task = match job {
            Job::Stop => break,
            Job::Transfer(task) => task,
        };
        debug!("{task}");
        let outcome = match session.transfer(&task) {
            Ok(()) => Outcome::Done,
            Err(err) => {
                warn!("{task} failed: {err}");
                Outcome::TaskFailed(format!("{task}: {err}"))
            }
        };
        let _ = outcomes.send(outcome);
    }
}

/// Wait for one outcome per task and collect the failures
fn collect_outcomes(outcomes: &Receiver<Outcome>, total: usize) -> TransferErrors {
    let mut errors = TransferErrors::default();
    let mut reported = 0;
    while reported < total {
        match outcomes.recv() {
            Ok(Outcome::Done) => reported += 1,
            Ok(Outcome::TaskFailed(message)) => {
                reported += 1;
                errors.push(message);
            }
            Ok(Outcome::WorkerAborted(message)) => {
                warn!("a worker gave up: {message}");
            }
            Err(_) => {
                error!("workers exited with {} tasks unreported", total - reported);
                errors.push(format!("{} transfers were not reported", total - reported));
                break;
            }
        }
    }
    errors
}
