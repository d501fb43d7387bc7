use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampSeconds};
use time::OffsetDateTime;

use crate::notification::Notification;
use crate::status::Status;

/// How many disconnection events an app retains between drains.
pub const LOG_CAPACITY: usize = 5_000;

/// One rejected-notification event, decoded from an error response.
///
/// `identifier` is the internal 16-bit identifier the gateway echoed back;
/// when it is still in the app's ring the offending notification rides
/// along, otherwise the caller only gets the code and identifier. Pull the
/// log at least daily: it is bounded and old events fall off the front.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DisconnectionEvent {
    #[serde(rename = "code")]
    pub status: Status,
    #[serde_as(as = "TimestampSeconds<f64>")]
    pub timestamp: OffsetDateTime,
    #[serde(rename = "internal_identifier")]
    pub identifier: u16,
    pub offending_notification: Option<Notification>,
}

impl DisconnectionEvent {
    pub fn new(status: Status, identifier: u16, offending: Option<Notification>) -> Self {
        Self {
            status,
            timestamp: OffsetDateTime::now_utc(),
            identifier,
            offending_notification: offending,
        }
    }

    /// Human-readable row from Apple's status table.
    pub fn verbose_message(&self) -> String {
        self.status.to_string()
    }
}

/// Bounded FIFO of disconnection events with drain-on-read semantics.
#[derive(Debug)]
pub struct DisconnectionLog {
    capacity: usize,
    events: VecDeque<DisconnectionEvent>,
}

impl Default for DisconnectionLog {
    fn default() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }
}

impl DisconnectionLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::new(),
        }
    }

    pub fn push(&mut self, event: DisconnectionEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Takes everything recorded so far, leaving the log empty.
    pub fn drain(&mut self) -> Vec<DisconnectionEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
