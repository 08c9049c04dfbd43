// SPDX-License-Identifier: AGPL-3.0
// Artify Core - In-flight request tracking
//
// Frontends show a loading indicator per operation. The tracker counts
// requests in flight per label and broadcasts start/finish events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Events emitted while gateway requests run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Started {
        operation: String,
    },
    Finished {
        operation: String,
        success: bool,
    },
    /// One item of a batch upload completed
    UploadProgress {
        index: usize,
        total: usize,
        uri: String,
        id: Option<String>,
    },
}

/// Shared counter of in-flight requests, cheap to clone
#[derive(Clone)]
pub struct ActivityTracker {
    in_flight: Arc<Mutex<HashMap<String, usize>>>,
    event_tx: broadcast::Sender<GatewayEvent>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
        }
    }

    /// Subscribe to gateway events
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.event_tx.subscribe()
    }

    /// Mark a request as started; the returned guard marks it finished
    pub fn begin(&self, operation: impl Into<String>) -> ActivityGuard {
        let operation = operation.into();
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            *in_flight.entry(operation.clone()).or_insert(0) += 1;
        }
        self.emit(GatewayEvent::Started {
            operation: operation.clone(),
        });

        ActivityGuard {
            tracker: self.clone(),
            operation,
            success: false,
        }
    }

    /// Requests currently running under `operation`
    pub fn in_flight(&self, operation: &str) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .any(|count| *count > 0)
    }

    pub(crate) fn emit(&self, event: GatewayEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn finish(&self, operation: &str, success: bool) {
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(count) = in_flight.get_mut(operation) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    in_flight.remove(operation);
                }
            }
        }
        self.emit(GatewayEvent::Finished {
            operation: operation.to_string(),
            success,
        });
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Ends one tracked request on drop; reports failure unless `succeed` was called
pub struct ActivityGuard {
    tracker: ActivityTracker,
    operation: String,
    success: bool,
}

impl ActivityGuard {
    pub fn succeed(&mut self) {
        self.success = true;
    }

    /// Record the outcome of `result` and pass it through
    pub fn track<T, E>(mut self, result: Result<T, E>) -> Result<T, E> {
        self.success = result.is_ok();
        result
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.tracker.finish(&self.operation, self.success);
    }
}
