//! Conversion/calculation driver
//!
//! Runs the external per-recording pipeline (raw → EDF conversion, HRV calculation,
//! diagnostic rendering) on a bounded worker pool. Steps of one recording run in order;
//! the first failing step ends that recording's pipeline.
//!
//! Each recording's process output is buffered and appended to the run log in one write,
//! behind a `==== <id> (<path>) ====` marker line, so concurrent workers never interleave.
//!
//! Every step runs in its own process group. A step that times out or is cancelled has
//! its whole group terminated (SIGTERM, then SIGKILL after [`TERMINATE_GRACE`]), so
//! helpers it spawned do not outlive it.
//!
//! **Argv placeholders:** `{input}` raw file path, `{record}` recording id,
//! `{dir}` recording directory, `{work_dir}` per-directory work folder.

use crate::models::record::{FailureStage, RecordingFailure};
use crate::models::{RecordKey, RecordingIdentity};
use crate::services::file_scanner::LocatedRecordings;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Time a timed-out or cancelled step group gets to exit after SIGTERM
pub const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Why one recording's pipeline stopped
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error("step '{step}' could not be started: {source}")]
    Spawn {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("step '{step}' exited with {status}")]
    ExitStatus { step: &'static str, status: ExitStatus },

    #[error("step '{step}' timed out after {secs}s")]
    Timeout { step: &'static str, secs: u64 },

    #[error("step '{step}' cancelled")]
    Cancelled { step: &'static str },

    #[error("failed to prepare work directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// External step commands, as argv templates
///
/// An empty template disables that step.
#[derive(Debug, Clone, Default)]
pub struct PipelineSteps {
    pub convert: Vec<String>,
    pub calculate: Vec<String>,
    pub render: Vec<String>,
}

impl PipelineSteps {
    fn enabled(&self) -> impl Iterator<Item = (&'static str, &[String])> + '_ {
        [
            ("convert", self.convert.as_slice()),
            ("calculate", self.calculate.as_slice()),
            ("render", self.render.as_slice()),
        ]
        .into_iter()
        .filter(|(_, argv)| !argv.is_empty())
    }
}

/// Driver settings
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub steps: PipelineSteps,
    /// Work folder name, created next to each raw file
    pub work_dir: String,
    /// Concurrent recordings
    pub max_workers: usize,
    /// Per-step limit; `None` waits indefinitely
    pub step_timeout: Option<Duration>,
    /// Append-only run log for process output
    pub log_file: PathBuf,
}

/// Default worker count: twice the available cores
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(2)
}

/// Outcome of a driver run
#[derive(Debug, Default)]
pub struct DriverReport {
    pub succeeded: Vec<RecordKey>,
    pub failures: Vec<RecordingFailure>,
    /// Run was interrupted before every recording was processed
    pub cancelled: bool,
}

impl DriverReport {
    /// Every recording's pipeline ran to completion
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Substitute placeholders in one argv template
fn expand_argv(template: &[String], identity: &RecordingIdentity, work_dir: &Path) -> Vec<String> {
    let input = identity.source_file_path.to_string_lossy();
    let dir = identity.directory().to_string_lossy();
    let work = work_dir.to_string_lossy();

    template
        .iter()
        .map(|arg| {
            arg.replace("{input}", &input)
                .replace("{record}", &identity.recording_id)
                .replace("{dir}", &dir)
                .replace("{work_dir}", &work)
        })
        .collect()
}

/// Conversion/calculation driver
pub struct PipelineDriver {
    config: Arc<DriverConfig>,
    cancel: CancellationToken,
}

impl PipelineDriver {
    pub fn new(config: DriverConfig, cancel: CancellationToken) -> Self {
        Self {
            config: Arc::new(config),
            cancel,
        }
    }

    /// Run every located recording through the pipeline
    ///
    /// Fails only when the run log cannot be opened.
    pub async fn run(&self, located: &LocatedRecordings) -> std::io::Result<DriverReport> {
        if let Some(parent) = self.config.log_file.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.log_file)
            .await?;
        let log = Arc::new(Mutex::new(log));

        let workers = self.config.max_workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();
        let mut report = DriverReport::default();

        tracing::info!(
            "Driving {} recordings with {} workers (log: {})",
            located.len(),
            workers,
            self.config.log_file.display()
        );

        for identity in located.iter() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::warn!("Interrupted, no further recordings will be started");
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let identity = identity.clone();
            let config = Arc::clone(&self.config);
            let log = Arc::clone(&log);
            let cancel = self.cancel.clone();

            join_set.spawn(async move {
                let _permit = permit;
                let result = run_recording(&identity, &config, &log, &cancel).await;
                (identity, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((identity, Ok(()))) => {
                    tracing::debug!(recording = %identity.recording_id, "Pipeline succeeded");
                    report.succeeded.push(identity.key());
                }
                Ok((identity, Err(e))) => {
                    tracing::error!(
                        recording = %identity.recording_id,
                        path = %identity.source_file_path.display(),
                        "Pipeline failed: {}",
                        e
                    );
                    report.failures.push(RecordingFailure {
                        stage: FailureStage::Driver,
                        path: identity.source_file_path.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!("Pipeline worker panicked: {}", e);
                    report.failures.push(RecordingFailure {
                        stage: FailureStage::Driver,
                        path: PathBuf::new(),
                        reason: format!("worker panicked: {}", e),
                    });
                }
            }
        }

        if let Err(e) = log.lock().await.sync_all().await {
            tracing::warn!(
                "Failed to sync run log {}: {}",
                self.config.log_file.display(),
                e
            );
        }

        report.cancelled = self.cancel.is_cancelled();
        report.succeeded.sort();

        tracing::info!(
            "Driver finished: {} succeeded, {} failed{}",
            report.succeeded.len(),
            report.failures.len(),
            if report.cancelled { " (interrupted)" } else { "" }
        );

        Ok(report)
    }
}

/// One recording's steps, with output appended to the run log afterwards
async fn run_recording(
    identity: &RecordingIdentity,
    config: &DriverConfig,
    log: &Mutex<tokio::fs::File>,
    cancel: &CancellationToken,
) -> Result<(), StepFailure> {
    let mut buffer = format!(
        "==== {} ({}) ====\n",
        identity.recording_id,
        identity.source_file_path.display()
    );

    let result = run_steps(identity, config, cancel, &mut buffer).await;
    if let Err(e) = &result {
        buffer.push_str(&format!("FAILED: {}\n", e));
    }

    let mut file = log.lock().await;
    let appended = match file.write_all(buffer.as_bytes()).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = appended {
        tracing::warn!(
            recording = %identity.recording_id,
            "Failed to append to run log: {}",
            e
        );
    }

    result
}

async fn run_steps(
    identity: &RecordingIdentity,
    config: &DriverConfig,
    cancel: &CancellationToken,
    buffer: &mut String,
) -> Result<(), StepFailure> {
    let work_dir = identity.work_dir(&config.work_dir);
    tokio::fs::create_dir_all(&work_dir)
        .await
        .map_err(|source| StepFailure::WorkDir {
            path: work_dir.clone(),
            source,
        })?;

    for (step, template) in config.steps.enabled() {
        let argv = expand_argv(template, identity, &work_dir);
        buffer.push_str(&format!("---- {}: {}\n", step, argv.join(" ")));

        tracing::debug!(recording = %identity.recording_id, step, "Running {}", argv.join(" "));
        run_step(step, &argv, &work_dir, config.step_timeout, cancel, buffer).await?;
    }

    Ok(())
}

async fn run_step(
    step: &'static str,
    argv: &[String],
    work_dir: &Path,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
    buffer: &mut String,
) -> Result<(), StepFailure> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(());
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|source| StepFailure::Spawn { step, source })?;
    // Also the process group id; still valid after the leader exits if members remain
    let pid = child.id();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let outcome = {
        let finished = async {
            tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StepFailure::Cancelled { step }),
            result = async {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, finished).await.map_err(|_| {
                        StepFailure::Timeout { step, secs: limit.as_secs() }
                    }),
                    None => Ok(finished.await),
                }
            } => result,
        }
    };

    let (status, stdout, stderr) = match outcome {
        Ok(done) => done,
        Err(failure) => {
            terminate_step(&mut child, pid, step).await;
            return Err(failure);
        }
    };

    buffer.push_str(&String::from_utf8_lossy(&stdout));
    buffer.push_str(&String::from_utf8_lossy(&stderr));

    let status = status.map_err(|source| StepFailure::Spawn { step, source })?;
    if !status.success() {
        return Err(StepFailure::ExitStatus { step, status });
    }

    Ok(())
}

/// Drain one child pipe; a read error keeps what was read so far
async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut output = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut output).await {
            tracing::debug!("Step output read failed: {}", e);
        }
    }
    output
}

/// Stop a timed-out or cancelled step together with everything it spawned, then reap it
#[cfg(unix)]
async fn terminate_step(child: &mut Child, pid: Option<u32>, step: &'static str) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return;
    };
    let group = Pid::from_raw(pid as i32);

    if let Err(e) = killpg(group, Signal::SIGTERM) {
        tracing::debug!(step, "SIGTERM to process group {} failed: {}", pid, e);
    }
    let exited = tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_ok();

    // Members that ignored SIGTERM, or outlived the leader
    match killpg(group, Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::debug!(step, "SIGKILL to process group {} failed: {}", pid, e),
    }

    if !exited {
        if let Err(e) = child.wait().await {
            tracing::warn!(step, "Failed to reap step process {}: {}", pid, e);
        }
    }
}

#[cfg(not(unix))]
async fn terminate_step(child: &mut Child, _pid: Option<u32>, step: &'static str) {
    if let Err(e) = child.kill().await {
        tracing::warn!(step, "Failed to kill step process: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_argv_placeholders() {
        let identity = RecordingIdentity {
            recording_id: "rec_01".to_string(),
            source_file_path: PathBuf::from("/data/rec-01.atc"),
            raw_filename: "rec-01.atc".to_string(),
            group: String::new(),
        };
        let template = vec![
            "convert".to_string(),
            "--input".to_string(),
            "{input}".to_string(),
            "--output".to_string(),
            "{work_dir}/{record}.edf".to_string(),
            "{dir}".to_string(),
        ];

        let argv = expand_argv(&template, &identity, Path::new("/data/work"));
        assert_eq!(
            argv,
            vec![
                "convert",
                "--input",
                "/data/rec-01.atc",
                "--output",
                "/data/work/rec_01.edf",
                "/data",
            ]
        );
    }

    #[test]
    fn test_empty_templates_are_skipped() {
        let steps = PipelineSteps {
            convert: vec!["true".to_string()],
            calculate: Vec::new(),
            render: vec!["true".to_string()],
        };
        let names: Vec<&str> = steps.enabled().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["convert", "render"]);
    }

    #[test]
    fn test_report_success_requires_no_cancellation() {
        let mut report = DriverReport::default();
        assert!(report.all_succeeded());
        report.cancelled = true;
        assert!(!report.all_succeeded());
    }

    #[test]
    fn test_default_worker_count_is_positive() {
        assert!(default_worker_count() >= 2);
    }
}
