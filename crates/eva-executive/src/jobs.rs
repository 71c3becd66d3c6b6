//! Job runtime state (spec §4.3 `/health`, §9 "global process-wide state ...
//! job runtime state map"). Tracks, per job name, the last requested/started/
//! completed/failed timestamps and the last error, plus an in-flight flag used
//! to resolve the Open Question on concurrent scheduler firings: "skip if a
//! prior run is in flight" (spec.md §9, reaffirmed in `SPEC_FULL.md`).

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobName {
    Compaction,
    Promotion,
}

impl JobName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compaction => "compaction",
            Self::Promotion => "promotion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "compaction" => Some(Self::Compaction),
            "promotion" => Some(Self::Promotion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobRuntime {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_requested_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_started_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failed_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// `JobsState` is scoped to one server instance, per spec §9's "global
/// process-wide state ... scoped to a server instance and torn down on close".
pub struct JobsState {
    jobs: Mutex<HashMap<&'static str, JobRuntime>>,
}

impl JobsState {
    pub fn new() -> Self {
        let mut jobs = HashMap::new();
        jobs.insert(JobName::Compaction.as_str(), JobRuntime::default());
        jobs.insert(JobName::Promotion.as_str(), JobRuntime::default());
        Self { jobs: Mutex::new(jobs) }
    }

    /// Record a request for `job` regardless of whether it is admitted.
    pub fn record_requested(&self, job: JobName, now_ms: i64) {
        let mut jobs = self.jobs.lock().expect("jobs state mutex poisoned");
        jobs.entry(job.as_str()).or_default().last_requested_at_ms = Some(now_ms);
    }

    /// Check-and-set: admit the run iff `job` is not already in flight. Returns
    /// `true` if this call admitted the run (and marked it running).
    pub fn try_start(&self, job: JobName, now_ms: i64) -> bool {
        let mut jobs = self.jobs.lock().expect("jobs state mutex poisoned");
        let entry = jobs.entry(job.as_str()).or_default();
        if entry.running {
            return false;
        }
        entry.running = true;
        entry.last_started_at_ms = Some(now_ms);
        true
    }

    pub fn mark_completed(&self, job: JobName, now_ms: i64) {
        let mut jobs = self.jobs.lock().expect("jobs state mutex poisoned");
        let entry = jobs.entry(job.as_str()).or_default();
        entry.running = false;
        entry.last_completed_at_ms = Some(now_ms);
    }

    pub fn mark_failed(&self, job: JobName, now_ms: i64, error: impl Into<String>) {
        let mut jobs = self.jobs.lock().expect("jobs state mutex poisoned");
        let entry = jobs.entry(job.as_str()).or_default();
        entry.running = false;
        entry.last_failed_at_ms = Some(now_ms);
        entry.last_error = Some(error.into());
    }

    pub fn snapshot(&self) -> HashMap<&'static str, JobRuntime> {
        self.jobs.lock().expect("jobs state mutex poisoned").clone()
    }
}

impl Default for JobsState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_start_rejects_while_running() {
        let jobs = JobsState::new();
        assert!(jobs.try_start(JobName::Compaction, 100));
        assert!(!jobs.try_start(JobName::Compaction, 101));
        jobs.mark_completed(JobName::Compaction, 102);
        assert!(jobs.try_start(JobName::Compaction, 103));
    }

    #[test]
    fn mark_failed_records_error_and_clears_running() {
        let jobs = JobsState::new();
        jobs.try_start(JobName::Promotion, 100);
        jobs.mark_failed(JobName::Promotion, 110, "boom");
        let snap = jobs.snapshot();
        let p = &snap[JobName::Promotion.as_str()];
        assert!(!p.running);
        assert_eq!(p.last_error.as_deref(), Some("boom"));
    }
}
