// domainrisk-core/src/eventbus/mod.rs
//
// Fan-out of evaluation progress to subscribed clients over bounded MPSC
// queues. A late subscriber is caught up with the last retained status
// event; a subscriber that cannot be written to within the deadline is
// dropped.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use domainrisk_common::dto::EvaluationDto;

/// Default size for each subscriber's buffer.
const DEFAULT_BUFFER_SIZE: usize = 200;

/// How long a single subscriber write may take before the subscriber is
/// considered dead.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Started,
    Evaluation,
    Progress,
    Complete,
    Cancelled,
    Error,
}

/// Wire payload emitted during evaluation runs.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub job_id: String,
    pub batch_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reused: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: EventType, job_id: &str, batch_id: i64) -> Self {
        Event {
            event_type,
            job_id: job_id.to_string(),
            batch_id,
            total: None,
            processed: None,
            evaluation: None,
            message: None,
            reused: None,
            timestamp: Utc::now(),
        }
    }
}

/// Handle returned to a subscriber; dropping the receiver ends delivery.
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<Event>,
}

struct NotifierInner {
    subscribers: Vec<(Uuid, mpsc::Sender<Event>)>,
    last_status: Option<Event>,
}

/// Tracks subscribers and broadcasts evaluation events to each of them in
/// registration order.
pub struct EvaluationNotifier {
    inner: Mutex<NotifierInner>,
}

impl Default for EvaluationNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationNotifier {
    pub fn new() -> Self {
        EvaluationNotifier {
            inner: Mutex::new(NotifierInner {
                subscribers: Vec::new(),
                last_status: None,
            }),
        }
    }

    /// Register a subscriber. The last retained status event, if any, is
    /// queued before any live event can arrive.
    pub fn subscribe(&self, buffer_size: Option<usize>) -> Subscription {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE).max(1);
        let (tx, rx) = mpsc::channel(size);
        let id = Uuid::new_v4();

        let mut inner = self.inner.lock().expect("notifier lock");
        if let Some(status) = &inner.last_status {
            // the channel is empty, so this cannot fail on capacity
            let _ = tx.try_send(status.clone());
        }
        inner.subscribers.push((id, tx));
        Subscription { id, receiver: rx }
    }

    /// Remove a subscriber; delivery to its receiver stops immediately.
    pub fn unsubscribe(&self, id: Uuid) {
        let mut inner = self.inner.lock().expect("notifier lock");
        inner.subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("notifier lock").subscribers.len()
    }

    /// Send the event to every subscriber. Status-bearing events are
    /// retained (with the evaluation payload stripped) for replay to late
    /// subscribers.
    pub async fn broadcast(&self, mut event: Event) {
        event.timestamp = Utc::now();

        let senders: Vec<(Uuid, mpsc::Sender<Event>)> = {
            let mut inner = self.inner.lock().expect("notifier lock");
            if matches!(
                event.event_type,
                EventType::Progress | EventType::Evaluation | EventType::Started
            ) {
                let mut snapshot = event.clone();
                snapshot.evaluation = None;
                inner.last_status = Some(snapshot);
            }
            inner.subscribers.clone()
        };

        let mut failed: Vec<Uuid> = Vec::new();
        for (id, sender) in senders {
            if sender
                .send_timeout(event.clone(), WRITE_TIMEOUT)
                .await
                .is_err()
            {
                warn!(subscriber = %id, "dropping unresponsive evaluation subscriber");
                failed.push(id);
            }
        }

        if !failed.is_empty() {
            let mut inner = self.inner.lock().expect("notifier lock");
            inner.subscribers.retain(|(id, _)| !failed.contains(id));
        }
    }

    /// The last retained status event, if any.
    pub fn last_status(&self) -> Option<Event> {
        self.inner.lock().expect("notifier lock").last_status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_event(processed: i64) -> Event {
        let mut event = Event::new(EventType::Started, "job-1", 7);
        event.total = Some(10);
        event.processed = Some(processed);
        event
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let notifier = EvaluationNotifier::new();
        let mut sub = notifier.subscribe(Some(8));

        notifier.broadcast(started_event(0)).await;
        let mut progress = Event::new(EventType::Progress, "job-1", 7);
        progress.processed = Some(3);
        notifier.broadcast(progress).await;

        assert_eq!(sub.receiver.recv().await.unwrap().event_type, EventType::Started);
        let second = sub.receiver.recv().await.unwrap();
        assert_eq!(second.event_type, EventType::Progress);
        assert_eq!(second.processed, Some(3));
    }

    #[tokio::test]
    async fn late_subscriber_gets_one_status_replay() {
        let notifier = EvaluationNotifier::new();
        notifier.broadcast(started_event(2)).await;

        let mut sub = notifier.subscribe(Some(8));
        let replay = sub.receiver.recv().await.unwrap();
        assert_eq!(replay.event_type, EventType::Started);
        assert_eq!(replay.processed, Some(2));

        // nothing else is queued
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn retained_status_strips_evaluation_payload() {
        let notifier = EvaluationNotifier::new();
        let mut event = Event::new(EventType::Evaluation, "job-1", 7);
        event.evaluation = Some(EvaluationDto::from(
            &domainrisk_common::models::Evaluation::default(),
        ));
        notifier.broadcast(event).await;

        let retained = notifier.last_status().unwrap();
        assert_eq!(retained.event_type, EventType::Evaluation);
        assert!(retained.evaluation.is_none());
    }

    #[tokio::test]
    async fn terminal_events_are_not_retained() {
        let notifier = EvaluationNotifier::new();
        notifier.broadcast(Event::new(EventType::Complete, "job-1", 7)).await;
        assert!(notifier.last_status().is_none());
    }

    #[tokio::test]
    async fn dead_subscribers_are_unregistered() {
        let notifier = EvaluationNotifier::new();
        let sub = notifier.subscribe(Some(1));
        drop(sub.receiver);
        assert_eq!(notifier.subscriber_count(), 1);

        notifier.broadcast(started_event(0)).await;
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_removes_registration() {
        let notifier = EvaluationNotifier::new();
        let sub = notifier.subscribe(None);
        notifier.unsubscribe(sub.id);
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
