//! Per-case in-process pub/sub.
//!
//! Subscribers join a case room with a role derived from how they
//! authenticated. Delivery is best-effort within one connection lifetime:
//! publish uses `try_send`, and a subscriber whose buffer is full is
//! dropped from the room rather than blocking the publisher. Nothing is
//! persisted or replayed.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{CaseStatus, SpecialistAdvice};

/// Per-subscriber send buffer; a slow consumer is disconnected once full.
const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberRole {
    Phw,
    Specialist,
}

/// Server -> client case events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum CaseEvent {
    #[serde(rename = "STATUS_UPDATE")]
    StatusUpdate {
        case_id: Uuid,
        status: CaseStatus,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "ADVICE_PUSH")]
    AdvicePush {
        case_id: Uuid,
        advice: SpecialistAdvice,
    },
    #[serde(rename = "PING")]
    Ping { timestamp: DateTime<Utc> },
}

impl CaseEvent {
    pub fn status_update(case_id: Uuid, status: CaseStatus) -> Self {
        CaseEvent::StatusUpdate {
            case_id,
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn advice_push(advice: SpecialistAdvice) -> Self {
        CaseEvent::AdvicePush {
            case_id: advice.case_id,
            advice,
        }
    }

    pub fn ping() -> Self {
        CaseEvent::Ping {
            timestamp: Utc::now(),
        }
    }
}

struct Subscriber {
    id: Uuid,
    role: SubscriberRole,
    tx: mpsc::Sender<CaseEvent>,
}

/// Handle returned by [`CaseEventBus::subscribe`]. Dropping the receiver
/// (or the whole handle) ends the membership on the next publish.
pub struct Subscription {
    pub id: Uuid,
    pub role: SubscriberRole,
    pub rx: mpsc::Receiver<CaseEvent>,
}

#[derive(Default)]
pub struct CaseEventBus {
    rooms: Mutex<HashMap<Uuid, Vec<Subscriber>>>,
}

impl CaseEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a case room.
    pub fn subscribe(&self, case_id: Uuid, role: SubscriberRole) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = Uuid::new_v4();
        let mut rooms = self.rooms.lock().expect("bus lock poisoned");
        rooms
            .entry(case_id)
            .or_default()
            .push(Subscriber { id, role, tx });
        tracing::debug!(case_id = %case_id, subscriber = %id, role = ?role, "bus subscribe");
        Subscription { id, role, rx }
    }

    /// Leave a case room explicitly (normal disconnect path).
    pub fn unsubscribe(&self, case_id: Uuid, subscriber_id: Uuid) {
        let mut rooms = self.rooms.lock().expect("bus lock poisoned");
        if let Some(room) = rooms.get_mut(&case_id) {
            room.retain(|s| s.id != subscriber_id);
            if room.is_empty() {
                rooms.remove(&case_id);
            }
        }
    }

    /// Broadcast to every subscriber in the case room. Slow or closed
    /// subscribers are removed; the publisher never blocks.
    pub fn publish(&self, case_id: Uuid, event: CaseEvent) {
        let mut rooms = self.rooms.lock().expect("bus lock poisoned");
        let Some(room) = rooms.get_mut(&case_id) else {
            return;
        };
        room.retain(|subscriber| match subscriber.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(case_id = %case_id, subscriber = %subscriber.id,
                    "subscriber cannot keep up, disconnecting");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if room.is_empty() {
            rooms.remove(&case_id);
        }
    }

    pub fn room_count(&self, case_id: Uuid) -> usize {
        let rooms = self.rooms.lock().expect("bus lock poisoned");
        rooms.get(&case_id).map(Vec::len).unwrap_or(0)
    }
}
