//! Load generation: rush execution and timeline snapshots
//!
//! A rush streams back [`RushStatus`] snapshots while it runs. The caller
//! observes each one through a callback and answers [`RushControl::Continue`]
//! or [`RushControl::Abort`]; either way the executor hands back the last
//! snapshot it saw.
//!
//! - [`blitz`]: the blitz.io implementation

pub mod blitz;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pattern::LoadPattern;

/// One sample on a rush timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// Seconds since the rush started
    #[serde(default)]
    pub timestamp: f64,
    /// Average response time in seconds
    #[serde(default)]
    pub duration: f64,
    /// Requests sent so far
    pub total: u64,
    /// Requests that completed with the expected status
    #[serde(rename = "executed")]
    pub hits: u64,
    #[serde(default)]
    pub errors: Option<u64>,
    #[serde(default)]
    pub timeouts: Option<u64>,
    /// Concurrent users at this point
    pub volume: u64,
}

impl TimelinePoint {
    /// Error rate as `100 - hits * 100 / total` with integer division.
    ///
    /// The truncation is deliberate: 98 of 100 gives 2, 99 of 100 gives 1,
    /// and 985 of 1000 gives 2 as well. Returns `None` before any request
    /// has been sent.
    pub fn percent_errors(&self) -> Option<u64> {
        percent_errors(self.hits, self.total)
    }

    /// `"98 hits | 2 errors | 0 timeouts"`, skipping counters the service left out
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} hits", self.hits)];
        if let Some(errors) = self.errors {
            parts.push(format!("{errors} errors"));
        }
        if let Some(timeouts) = self.timeouts {
            parts.push(format!("{timeouts} timeouts"));
        }
        parts.join(" | ")
    }
}

pub fn percent_errors(hits: u64, total: u64) -> Option<u64> {
    if total == 0 {
        return None;
    }
    Some(100u64.saturating_sub(hits.saturating_mul(100) / total))
}

/// A point-in-time view of a running or finished rush
#[derive(Debug, Clone, PartialEq)]
pub struct RushStatus {
    pub job_id: String,
    pub region: String,
    pub timeline: Vec<TimelinePoint>,
}

impl RushStatus {
    /// The most recent timeline point, the only one that drives decisions
    pub fn last(&self) -> Option<&TimelinePoint> {
        self.timeline.last()
    }
}

/// Observer verdict for a streamed snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RushControl {
    Continue,
    Abort,
}

/// Callback invoked with every snapshot that carries at least one timeline point
pub type RushObserver<'a> = dyn FnMut(&RushStatus) -> RushControl + Send + 'a;

/// Runs a load pattern against a target
#[async_trait]
pub trait RushExecutor: Send + Sync {
    /// Execute `pattern`, streaming snapshots to `observer`.
    ///
    /// Returns the snapshot that made the observer abort, or the final
    /// snapshot once the rush completes on its own. The final snapshot is
    /// observed too; an Abort verdict on it changes nothing. There is no timeout: a
    /// rush that never completes blocks the caller.
    async fn execute(
        &self,
        pattern: &LoadPattern,
        observer: &mut RushObserver<'_>,
    ) -> Result<RushStatus>;
}
