use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler is shut down")]
    ShutDown,

    #[error("Queue is full ({capacity} jobs)")]
    QueueFull { capacity: usize },

    #[error("Pipeline failed: {0}")]
    Pipeline(String),

    #[error("Job timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Pipeline task panicked: {0}")]
    Panicked(String),

    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
