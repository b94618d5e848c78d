//! Shared setup for integration tests: scratch database, batch seeding,
//! and event collection.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use domainrisk_core::db::Database;
use domainrisk_core::engine::{EvaluateRequest, EvaluationEngine};
use domainrisk_core::eventbus::{Event, EventType, EvaluationNotifier, Subscription};
use domainrisk_core::repositories::sqlite::{BatchRepository, MarkRepository};
use domainrisk_core::scoring::ViceScorer;
use domainrisk_common::models::{DomainBatch, Mark, PopularMark};

pub struct TestDb {
    pub db: Database,
    _dir: TempDir,
}

pub async fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("test.db");
    let db = Database::open(&path).await.expect("open database");
    db.migrate().await.expect("run migrations");
    TestDb { db, _dir: dir }
}

/// Create a batch and attach the supplied domains, one row each.
pub async fn seed_batch(db: &Database, name: &str, domains: &[String]) -> i64 {
    let batches = BatchRepository::new(db.pool().clone());
    let batch = batches
        .create_csv_batch(name, "tester", "test.csv")
        .await
        .expect("create batch");

    let rows: Vec<DomainBatch> = domains
        .iter()
        .enumerate()
        .map(|(idx, domain)| DomainBatch {
            id: 0,
            batch_id: batch.id,
            domain: domain.clone(),
            domain_normalized: String::new(),
            row_index: idx as i64,
        })
        .collect();
    batches
        .replace_domain_batch(batch.id, &rows)
        .await
        .expect("seed batch domains");
    batch.id
}

/// Insert a mark together with a popularity aggregate so the index
/// loader picks it up.
pub async fn seed_popular_mark(
    db: &Database,
    serial: &str,
    display: &str,
    no_spaces: &str,
    fanciful: bool,
    total: i64,
) {
    let marks = MarkRepository::new(db.pool().clone());
    marks
        .upsert_mark(&Mark {
            serial: serial.to_string(),
            mark: display.to_string(),
            mark_normalized: display.to_lowercase(),
            mark_no_spaces: no_spaces.to_string(),
            is_fanciful: fanciful,
            ..Default::default()
        })
        .await
        .expect("upsert mark");

    let existing = marks.list_popular_marks(0).await.expect("list popular");
    let mut popular: Vec<PopularMark> = existing;
    popular.push(PopularMark {
        normalized: no_spaces.to_string(),
        mark: display.to_string(),
        total,
    });
    marks
        .replace_popular_marks(&popular)
        .await
        .expect("replace popular marks");
}

pub struct EngineHarness {
    pub engine: Arc<EvaluationEngine>,
    pub notifier: Arc<EvaluationNotifier>,
}

/// Build an engine over the test database with empty vice terms and no
/// upstream clients unless supplied.
pub fn build_engine(
    db: &Database,
    explainer: Option<Arc<dyn domainrisk_ai::Explainer>>,
    commercial: Option<Arc<domainrisk_core::commercial::CommercialMatcher>>,
    vice_terms: HashMap<String, Vec<String>>,
    config: domainrisk_core::config::EngineConfig,
) -> EngineHarness {
    let notifier = Arc::new(EvaluationNotifier::new());
    let engine = Arc::new(EvaluationEngine::new(
        db.clone(),
        config,
        notifier.clone(),
        Arc::new(ViceScorer::from_map(vice_terms)),
        Default::default(),
        explainer,
        None,
        commercial,
    ));
    EngineHarness { engine, notifier }
}

pub fn default_request(batch_id: i64) -> EvaluateRequest {
    EvaluateRequest {
        batch_id,
        ..Default::default()
    }
}

/// Receive events until a terminal one arrives (or the timeout hits),
/// returning everything seen including the terminal event.
pub async fn collect_until_terminal(sub: &mut Subscription, timeout: Duration) -> Vec<Event> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let event = tokio::time::timeout_at(deadline, sub.receiver.recv())
            .await
            .expect("timed out waiting for terminal event")
            .expect("event stream closed before terminal event");
        let terminal = matches!(
            event.event_type,
            EventType::Complete | EventType::Cancelled | EventType::Error
        );
        events.push(event);
        if terminal {
            return events;
        }
    }
}

/// Wait until the engine reports no running job.
pub async fn wait_for_idle(engine: &Arc<EvaluationEngine>, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if !engine.status().await.running {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "engine did not become idle in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
