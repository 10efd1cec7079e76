use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::tracking::{DrainOutcome, JobStatsSnapshot};

/// Lifecycle phase of a processor run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Built but not yet run
    Idle,
    Starting,
    Fetching,
    Submitting,
    Draining,
    Done,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobPhase::Idle => "idle",
            JobPhase::Starting => "starting",
            JobPhase::Fetching => "fetching",
            JobPhase::Submitting => "submitting",
            JobPhase::Draining => "draining",
            JobPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub run_id: Uuid,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Percentage rounded to two decimals, 0 when nothing was submitted
    pub success_rate: f64,
    pub elapsed_seconds: f64,
    /// Non-empty batches processed
    pub batches: u64,
    pub drain: DrainOutcome,
    /// No task reported a failure during the run
    pub success: bool,
}

impl JobReport {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        run_id: Uuid,
        job_name: &str,
        started_at: DateTime<Utc>,
        stats: JobStatsSnapshot,
        elapsed: Duration,
        batches: u64,
        drain: DrainOutcome,
        success: bool,
    ) -> Self {
        Self {
            run_id,
            job_name: job_name.to_string(),
            started_at,
            submitted: stats.submitted,
            succeeded: stats.succeeded,
            failed: stats.failed,
            success_rate: stats.success_rate(),
            elapsed_seconds: elapsed.as_secs_f64(),
            batches,
            drain,
            success,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed_seconds)
    }

    /// Operations that had not settled when the drain wait returned
    pub fn outstanding(&self) -> u64 {
        self.submitted.saturating_sub(self.succeeded + self.failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_with_tagged_drain_outcome() {
        let stats = JobStatsSnapshot {
            submitted: 4,
            succeeded: 2,
            failed: 1,
        };
        let report = JobReport::new(
            Uuid::new_v4(),
            "report_test",
            Utc::now(),
            stats,
            Duration::from_millis(1500),
            2,
            DrainOutcome::TimedOut { outstanding: 1 },
            false,
        );

        assert_eq!(report.outstanding(), 1);
        assert_eq!(report.success_rate, 50.0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["drain"]["status"], "timed_out");
        assert_eq!(json["drain"]["outstanding"], 1);
        assert_eq!(json["job_name"], "report_test");
    }

    #[test]
    fn phases_display_in_snake_case() {
        assert_eq!(JobPhase::Draining.to_string(), "draining");
        assert_eq!(
            serde_json::to_string(&JobPhase::Submitting).unwrap(),
            "\"submitting\""
        );
    }
}
