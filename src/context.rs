//! Request Context
//!
//! Opaque per-request data handed through to the storage collaborator.
//! Nothing in the query layer interprets it beyond the request id used in
//! log lines.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;

/// Context carried from the caller to storage
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request ID for tracing
    pub request_id: Uuid,

    /// Point after which storage should give up
    pub deadline: Option<Instant>,

    /// Caller-defined metadata
    pub metadata: HashMap<String, Value>,

    started_at: Instant,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            deadline: None,
            metadata: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// True once the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
