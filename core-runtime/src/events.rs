//! # Event Bus System
//!
//! Broadcasts engine notifications using `tokio::sync::broadcast`, so hosts
//! can observe job progress and provider health without polling.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: `EngineEvent` wrapping job and provider events
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EngineEvent, EventBus, JobEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(EngineEvent::Job(JobEvent::Queued {
//!         job_id: "job-1".to_string(),
//!         priority: 80,
//!         records: 2,
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Completion job queued");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//! - **`RecvError::Closed`**: All senders have been dropped, i.e. the engine shut down.
//!
//! Emission never blocks: publishers call `emit(..).ok()` and ignore the
//! "no subscribers" error.

use bridge_traits::Provider;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// Completion job lifecycle
    Job(JobEvent),
    /// Provider availability changes
    Provider(ProviderEvent),
}

impl EngineEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            EngineEvent::Job(e) => e.description(),
            EngineEvent::Provider(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            EngineEvent::Job(JobEvent::Failed { .. }) => EventSeverity::Warning,
            EngineEvent::Provider(ProviderEvent::Disabled { .. }) => EventSeverity::Warning,
            EngineEvent::Provider(ProviderEvent::Reset) => EventSeverity::Warning,
            EngineEvent::Provider(ProviderEvent::Recovered { .. }) => EventSeverity::Info,
            EngineEvent::Job(JobEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Completion job lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum JobEvent {
    /// Job accepted into the queue.
    Queued {
        job_id: String,
        priority: i64,
        records: usize,
    },
    /// Job dequeued and handed to the pipeline.
    Started { job_id: String, priority: i64 },
    /// Pipeline returned; callback invoked with its output.
    Completed {
        job_id: String,
        records_in: usize,
        records_out: usize,
    },
    /// Pipeline failed, timed out or the engine shut down; callback invoked
    /// with the original records.
    Failed { job_id: String, reason: String },
}

impl JobEvent {
    fn description(&self) -> &str {
        match self {
            JobEvent::Queued { .. } => "Completion job queued",
            JobEvent::Started { .. } => "Completion job started",
            JobEvent::Completed { .. } => "Completion job completed",
            JobEvent::Failed { .. } => "Completion job failed",
        }
    }
}

/// Provider health transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ProviderEvent {
    /// Error count crossed the threshold.
    Disabled { provider: Provider, error_count: u32 },
    /// A success re-enabled a disabled provider.
    Recovered { provider: Provider },
    /// Every provider was unavailable and all were reset.
    Reset,
}

impl ProviderEvent {
    fn description(&self) -> &str {
        match self {
            ProviderEvent::Disabled { .. } => "Provider disabled after repeated errors",
            ProviderEvent::Recovered { .. } => "Provider available again",
            ProviderEvent::Reset => "All providers reset to available",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for engine events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: EngineEvent) -> Result<usize, SendError<EngineEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&EngineEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{EngineEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let provider_events = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, EngineEvent::Provider(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<EngineEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<EngineEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EngineEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<EngineEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    pub fn try_recv(&mut self) -> Option<Result<EngineEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => match &self.filter {
                    Some(filter) if !filter(&event) => continue,
                    _ => return Some(Ok(event)),
                },
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(job_id: &str) -> EngineEvent {
        EngineEvent::Job(JobEvent::Queued {
            job_id: job_id.to_string(),
            priority: 50,
            records: 1,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_an_error() {
        let bus = EventBus::new(10);
        assert!(bus.emit(queued("a")).is_err());
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_events() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        assert_eq!(bus.emit(queued("a")).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), queued("a"));
        assert_eq!(sub2.recv().await.unwrap(), queued("a"));
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, EngineEvent::Provider(_)));

        bus.emit(queued("a")).unwrap();
        bus.emit(EngineEvent::Provider(ProviderEvent::Recovered {
            provider: Provider::YouTube,
        }))
        .unwrap();

        let event = stream.recv().await.unwrap();
        assert_eq!(
            event,
            EngineEvent::Provider(ProviderEvent::Recovered {
                provider: Provider::YouTube
            })
        );
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_severity() {
        let failed = EngineEvent::Job(JobEvent::Failed {
            job_id: "a".to_string(),
            reason: "timeout".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);
        assert_eq!(queued("a").severity(), EventSeverity::Debug);
        assert_eq!(
            EngineEvent::Provider(ProviderEvent::Reset).description(),
            "All providers reset to available"
        );
    }

    #[test]
    fn test_event_serialization_shape() {
        let json = serde_json::to_value(EngineEvent::Provider(ProviderEvent::Disabled {
            provider: Provider::Spotify,
            error_count: 6,
        }))
        .unwrap();

        assert_eq!(json["type"], "Provider");
        assert_eq!(json["payload"]["event"], "Disabled");
        assert_eq!(json["payload"]["provider"], "spotify");
    }
}
