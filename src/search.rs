//! Capacity search
//!
//! Walks the fixed dyno sequence 1, 2, 4, 8, 16, 32. For each count it scales
//! the web process, waits until every dyno reports `up`, and rushes the app
//! from one user to the target. A rush whose latest timeline point reaches the
//! error tolerance is aborted early. The first count whose final point stays
//! under the tolerance is the answer. Whatever the outcome, the app is scaled
//! back to a single dyno afterwards.
//!
//! # Failure semantics
//!
//! Errors from either collaborator, including [`BlitzerError::ReadinessTimeout`],
//! propagate straight out of [`CapacitySearch::run`]. The final scale back to
//! one dyno is skipped in that case, so a failed run can leave the app scaled
//! up.

use std::time::Duration;

use crate::error::{BlitzerError, Result};
use crate::pattern::LoadPattern;
use crate::platform::{DynoManager, ScaleRequest, all_up};
use crate::progress::Progress;
use crate::rush::{RushControl, RushExecutor, RushStatus, TimelinePoint};

/// Dyno counts tried, in order
pub const DYNO_SEQUENCE: [u32; 6] = [1, 2, 4, 8, 16, 32];

/// Dyno count restored when the search ends
pub const BASELINE_DYNOS: u32 = 1;

/// How long to wait for scaled dynos to come up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl ReadinessPolicy {
    /// Number of polls that fit in the timeout, never less than one
    pub fn max_attempts(&self) -> u32 {
        if self.interval.is_zero() {
            return 1;
        }
        let attempts = self.timeout.as_nanos().div_ceil(self.interval.as_nanos());
        attempts.clamp(1, u32::MAX as u128) as u32
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        ReadinessPolicy {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub app: String,
    pub app_url: String,
    /// Concurrent users to reach
    pub target: u64,
    /// Error percentage that fails a rush
    pub tolerance: u64,
    pub region: String,
    pub ramp_secs: u64,
    pub expected_status: u16,
    pub readiness: ReadinessPolicy,
}

impl SearchParams {
    /// Defaults for `app` rushed at `http://<app>.herokuapp.com`
    pub fn new(app: impl Into<String>, target: u64) -> Self {
        let app = app.into();
        SearchParams {
            app_url: format!("http://{app}.herokuapp.com"),
            app,
            target,
            tolerance: 2,
            region: "virginia".to_string(),
            ramp_secs: 30,
            expected_status: 200,
            readiness: ReadinessPolicy::default(),
        }
    }

    /// The rush run against every candidate
    pub fn load_pattern(&self) -> LoadPattern {
        LoadPattern::ramp(
            self.region.as_str(),
            self.target,
            self.ramp_secs,
            self.expected_status,
            self.app_url.as_str(),
        )
    }
}

/// Result of rushing one dyno count
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub dynos: u32,
    /// Latest timeline point when the rush ended
    pub final_point: TimelinePoint,
    pub percent_errors: Option<u64>,
    pub sufficient: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// This many dynos kept the error rate under the tolerance
    Sufficient { dynos: u32 },
    /// Every count in the sequence failed
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    pub trials: Vec<Trial>,
    pub outcome: Outcome,
}

impl SearchReport {
    pub fn candidates_tried(&self) -> Vec<u32> {
        self.trials.iter().map(|t| t.dynos).collect()
    }
}

pub struct CapacitySearch<D, R> {
    dynos: D,
    rush: R,
    params: SearchParams,
    progress: Progress,
}

impl<D: DynoManager, R: RushExecutor> CapacitySearch<D, R> {
    pub fn new(dynos: D, rush: R, params: SearchParams, progress: Progress) -> Self {
        CapacitySearch {
            dynos,
            rush,
            params,
            progress,
        }
    }

    /// Scale the web process to `quantity` and wait until every dyno is up.
    ///
    /// Sleeps one interval before each check and prints a dot per check.
    /// Gives up with [`BlitzerError::ReadinessTimeout`] once the policy's
    /// attempts are spent.
    pub async fn scale_to(&mut self, quantity: u32) -> Result<()> {
        self.progress.print(&format!("starting {quantity} dyno(s) "));

        let request = ScaleRequest::web(self.params.app.as_str(), quantity);
        self.dynos.scale(&request).await?;
        tracing::info!(app = %self.params.app, dynos = quantity, "scaling web process");

        let policy = self.params.readiness;
        let attempts = policy.max_attempts();
        for attempt in 1..=attempts {
            self.progress.print(".");
            tokio::time::sleep(policy.interval).await;

            let dynos = self.dynos.dynos(&self.params.app).await?;
            if all_up(&dynos, quantity) {
                tracing::debug!(dynos = quantity, attempt, "all dynos up");
                self.progress.print("done\n");
                return Ok(());
            }

            let up = dynos.iter().filter(|d| d.is_up()).count();
            tracing::debug!(
                expected = quantity,
                reported = dynos.len(),
                up,
                attempt,
                "dynos not ready"
            );
        }

        tracing::warn!(dynos = quantity, attempts, "gave up waiting for dynos");
        Err(BlitzerError::ReadinessTimeout {
            expected: quantity,
            attempts,
        })
    }

    /// Rush the app with `dynos` running and return the last snapshot.
    ///
    /// The rush is aborted as soon as a streamed snapshot's latest point
    /// reaches the tolerance. The completed snapshot is checked the same way,
    /// so a breach at the very end still prints its detail line.
    pub async fn run_rush(&mut self, dynos: u32) -> Result<RushStatus> {
        let pattern = self.params.load_pattern();
        self.progress.print(&format!("{pattern}\n"));
        self.progress.print("  rushing ");
        tracing::info!(
            dynos,
            peak_users = pattern.peak_users(),
            ramp_secs = pattern.total_duration_secs(),
            "starting rush"
        );

        let tolerance = self.params.tolerance;
        let progress = &mut self.progress;
        let mut observe = |snapshot: &RushStatus| {
            progress.print(".");
            let Some(last) = snapshot.last() else {
                return RushControl::Continue;
            };

            match last.percent_errors() {
                Some(percent) if percent >= tolerance => {
                    progress.print(&format!("{} @ {} users\n", last.summary(), last.volume));
                    tracing::debug!(
                        job_id = %snapshot.job_id,
                        percent_errors = percent,
                        volume = last.volume,
                        "error tolerance reached"
                    );
                    RushControl::Abort
                }
                _ => RushControl::Continue,
            }
        };

        self.rush.execute(&pattern, &mut observe).await
    }

    /// Judge a finished rush for `dynos`
    pub fn evaluate(&self, dynos: u32, status: &RushStatus) -> Result<Trial> {
        let last = status.last().ok_or_else(|| BlitzerError::EmptyTimeline {
            job_id: status.job_id.clone(),
        })?;

        let percent_errors = last.percent_errors();
        let sufficient = matches!(percent_errors, Some(p) if p < self.params.tolerance);

        Ok(Trial {
            dynos,
            final_point: last.clone(),
            percent_errors,
            sufficient,
        })
    }

    /// Walk the dyno sequence until a count holds the target, then scale
    /// back to [`BASELINE_DYNOS`]
    pub async fn run(&mut self) -> Result<SearchReport> {
        let mut trials = Vec::new();
        let mut outcome = Outcome::Exhausted;

        for dynos in DYNO_SEQUENCE {
            self.scale_to(dynos).await?;
            let status = self.run_rush(dynos).await?;
            let trial = self.evaluate(dynos, &status)?;

            tracing::info!(
                dynos,
                percent_errors = ?trial.percent_errors,
                sufficient = trial.sufficient,
                "rush finished"
            );

            let sufficient = trial.sufficient;
            trials.push(trial);

            if sufficient {
                self.progress.print("done\n\n");
                self.progress.print(&format!(
                    ">> You need {dynos} dyno(s) to handle {} concurrent users!\n\n",
                    self.params.target
                ));
                outcome = Outcome::Sufficient { dynos };
                break;
            }
        }

        // Only the scale request is sent; nobody waits for the baseline to come up
        let reset = ScaleRequest::web(self.params.app.as_str(), BASELINE_DYNOS);
        self.dynos.scale(&reset).await?;
        tracing::info!(app = %self.params.app, dynos = BASELINE_DYNOS, "reset web process");

        Ok(SearchReport { trials, outcome })
    }
}
