//! Completion jobs

use crate::priority::LoadOptions;
use bridge_traits::TrackRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Type-safe job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle: `Queued → Running → Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Receives a job's output exactly once.
pub type CompletionCallback = Box<dyn FnOnce(Vec<TrackRecord>) + Send + 'static>;

/// One submitted batch.
pub struct CompletionJob {
    pub(crate) id: JobId,
    pub(crate) records: Vec<TrackRecord>,
    pub(crate) options: LoadOptions,
    pub(crate) priority: i64,
    /// Submission order, breaks priority ties
    pub(crate) seq: u64,
    pub(crate) state: JobState,
    callback: Option<CompletionCallback>,
}

impl CompletionJob {
    pub(crate) fn new(
        records: Vec<TrackRecord>,
        options: LoadOptions,
        priority: i64,
        callback: CompletionCallback,
    ) -> Self {
        Self {
            id: JobId::new(),
            records,
            options,
            priority,
            seq: 0,
            state: JobState::Queued,
            callback: Some(callback),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            priority: self.priority,
            records: self.records.len(),
            page: self.options.page.clone(),
            section: self.options.section.clone(),
            state: self.state,
        }
    }

    /// Moves to a terminal state and hands `records` to the callback.
    pub(crate) fn finish(mut self, state: JobState, records: Vec<TrackRecord>) {
        self.state = state;
        if let Some(callback) = self.callback.take() {
            callback(records);
        }
    }

    /// Fails the job, returning its own records to the callback.
    pub(crate) fn fail_with_original(mut self) {
        let records = std::mem::take(&mut self.records);
        self.finish(JobState::Failed, records);
    }
}

impl fmt::Debug for CompletionJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionJob")
            .field("id", &self.id)
            .field("records", &self.records.len())
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("state", &self.state)
            .finish()
    }
}

/// Read-only view of a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub priority: i64,
    pub records: usize,
    pub page: String,
    pub section: String,
    pub state: JobState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_callback_invoked_once_with_records() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();

        let job = CompletionJob::new(
            vec![TrackRecord::new("a")],
            LoadOptions::new("home", "forYou"),
            10,
            Box::new(move |records| sink.lock().unwrap().push(records)),
        );
        job.fail_with_original();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0][0].id, "a");
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert_eq!(JobState::Queued.as_str(), "queued");
    }
}
