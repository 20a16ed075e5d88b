//! Bounded readiness polling.
//!
//! A [`Poller`] repeatedly runs a status check until it reports ready,
//! reports a terminal failure, or the wall-clock budget runs out. Sleeps go
//! through `tokio::time` so tests can drive the clock with paused time.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

/// Result of a single status check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollStatus {
    /// The resource is usable; polling stops.
    Ready(String),
    /// The resource reached a terminal failure; polling stops.
    Failed(String),
    /// Not ready yet, or a transient error; polling continues.
    Pending(String),
}

impl PollStatus {
    /// Maps a provider status string onto the tri-state.
    #[must_use]
    pub fn from_resource_status(status: &str, ready: &str, failed: &str) -> Self {
        if status == ready {
            Self::Ready(status.to_owned())
        } else if status == failed {
            Self::Failed(status.to_owned())
        } else {
            Self::Pending(status.to_owned())
        }
    }

    /// Human-readable description of the observation.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Ready(text) | Self::Failed(text) | Self::Pending(text) => text,
        }
    }
}

/// Accounting for a finished poll.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollReport {
    /// Number of checks performed.
    pub attempts: u32,
    /// Time spent between the first check and the final decision.
    pub elapsed: Duration,
    /// Last status observed, if any check ran.
    pub last_status: Option<String>,
}

/// Tri-state outcome of a bounded poll.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    /// The check reported ready.
    Ready(PollReport),
    /// The check reported a terminal failure.
    Failed(PollReport),
    /// The budget ran out while the check was still pending.
    TimedOut(PollReport),
}

impl PollOutcome {
    /// Report attached to the outcome.
    #[must_use]
    pub const fn report(&self) -> &PollReport {
        match self {
            Self::Ready(report) | Self::Failed(report) | Self::TimedOut(report) => report,
        }
    }
}

/// Errors raised when a required condition is not met.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PollError {
    /// The resource reported a terminal failure.
    #[error("{label} failed with status {status} after {elapsed:?}")]
    Failed {
        /// What was being waited on.
        label: String,
        /// Last observed status.
        status: String,
        /// Time spent waiting.
        elapsed: Duration,
    },
    /// The resource did not become ready within the budget.
    #[error("{label} not ready after {elapsed:?} (timeout {timeout:?}), last status {status}")]
    TimedOut {
        /// What was being waited on.
        label: String,
        /// Last observed status.
        status: String,
        /// Time spent waiting.
        elapsed: Duration,
        /// Configured budget.
        timeout: Duration,
    },
}

/// Wall-clock budget and fixed interval for a readiness wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Poller {
    max_wait: Duration,
    interval: Duration,
}

impl Poller {
    /// Creates a poller with the given budget and interval.
    #[must_use]
    pub const fn new(max_wait: Duration, interval: Duration) -> Self {
        Self { max_wait, interval }
    }

    /// Configured wall-clock budget.
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Configured pause between checks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs `check` until it reports ready or failed, or the budget is spent.
    ///
    /// After a pending check the poller sleeps for exactly one interval when
    /// more than one interval of budget remains; otherwise it stops without
    /// sleeping.
    pub async fn poll<F, Fut>(&self, label: &str, mut check: F) -> PollOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PollStatus>,
    {
        let started = Instant::now();
        let mut attempts = 0_u32;
        let mut last_status = None;

        info!(
            "⏳ Waiting for {label} (timeout {:?}, interval {:?})",
            self.max_wait, self.interval
        );

        while started.elapsed() < self.max_wait {
            attempts = attempts.saturating_add(1);
            let status = check().await;
            last_status = Some(status.description().to_owned());

            match status {
                PollStatus::Ready(text) => {
                    let report = report(attempts, started, last_status);
                    info!("✅ {label} ready ({text}) after {:?}", report.elapsed);
                    return PollOutcome::Ready(report);
                }
                PollStatus::Failed(text) => {
                    warn!("❌ {label} failed with status {text}");
                    return PollOutcome::Failed(report(attempts, started, last_status));
                }
                PollStatus::Pending(text) => {
                    info!("⏳ Attempt {attempts}: {label} {text}");
                }
            }

            let remaining = self.max_wait.saturating_sub(started.elapsed());
            if remaining > self.interval {
                sleep(self.interval).await;
            } else {
                break;
            }
        }

        let report = report(attempts, started, last_status);
        warn!("⚠️ {label} not ready within {:?}", self.max_wait);
        PollOutcome::TimedOut(report)
    }

    /// Polls an advisory condition. A timeout yields `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::Failed`] when the check reports a terminal
    /// failure.
    pub async fn await_condition<F, Fut>(&self, label: &str, check: F) -> Result<bool, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PollStatus>,
    {
        match self.poll(label, check).await {
            PollOutcome::Ready(_) => Ok(true),
            PollOutcome::TimedOut(_) => Ok(false),
            PollOutcome::Failed(report) => Err(failed(label, report)),
        }
    }

    /// Polls a required precondition.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::Failed`] on a terminal failure and
    /// [`PollError::TimedOut`] when the budget runs out.
    pub async fn require<F, Fut>(&self, label: &str, check: F) -> Result<PollReport, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PollStatus>,
    {
        match self.poll(label, check).await {
            PollOutcome::Ready(report) => Ok(report),
            PollOutcome::Failed(report) => Err(failed(label, report)),
            PollOutcome::TimedOut(report) => Err(PollError::TimedOut {
                label: label.to_owned(),
                status: last_or_none(report.last_status),
                elapsed: report.elapsed,
                timeout: self.max_wait,
            }),
        }
    }
}

fn report(attempts: u32, started: Instant, last_status: Option<String>) -> PollReport {
    PollReport {
        attempts,
        elapsed: started.elapsed(),
        last_status,
    }
}

fn failed(label: &str, report: PollReport) -> PollError {
    PollError::Failed {
        label: label.to_owned(),
        status: last_or_none(report.last_status),
        elapsed: report.elapsed,
    }
}

fn last_or_none(status: Option<String>) -> String {
    status.unwrap_or_else(|| String::from("<none>"))
}
