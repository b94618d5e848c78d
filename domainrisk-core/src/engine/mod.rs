// domainrisk-core/src/engine/mod.rs
//
// Job lifecycle for batch evaluations: at most one job per process, a
// bounded worker pool fed by a chunked producer, and a single collector
// that persists results and emits throttled progress events.

mod pipeline;

pub use pipeline::build_fallback_narrative;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::{mpsc, watch, Mutex, OnceCell};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use domainrisk_ai::Explainer;
use domainrisk_common::dto::EvaluationDto;
use domainrisk_common::models::{BatchDomain, Mark, RequestStatus};

use crate::commercial::CommercialMatcher;
use crate::config::EngineConfig;
use crate::db::Database;
use crate::eventbus::{Event, EventType, EvaluationNotifier};
use crate::repositories::sqlite::{BatchRepository, EvaluationRepository, MarkRepository};
use crate::scoring::{FancifulDecider, TrademarkScorer, ViceScorer};
use crate::uspto::UsptoClient;
use crate::Error;

use pipeline::{evaluate_domain, DomainOutcome, WorkerContext};

const EVALUATION_THROTTLE: Duration = Duration::from_millis(500);
const MAX_CHUNK_SIZE: i64 = 5000;

/// Parameters for one evaluation run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluateRequest {
    pub batch_id: i64,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub force: bool,
}

/// Kickoff payload returned to the caller once the job is spawned.
#[derive(Debug, Clone)]
pub struct StartedEvaluation {
    pub job_id: String,
    pub batch_id: i64,
    pub request_id: i64,
    pub total: i64,
    pub started_at: DateTime<Utc>,
}

/// Snapshot of the active (or most recent) evaluation state.
#[derive(Debug, Clone, Default)]
pub struct EvaluateStatus {
    pub running: bool,
    pub job_id: Option<String>,
    pub batch_id: Option<i64>,
    pub request_id: Option<i64>,
    pub state: Option<EventType>,
    pub message: Option<String>,
    pub processed: i64,
    pub total: i64,
    pub last_evaluation: Option<EvaluationDto>,
}

struct ActiveJob {
    id: String,
    batch_id: i64,
    request_id: i64,
    total: i64,
    cancel_tx: Arc<watch::Sender<bool>>,
}

struct JobContext {
    id: String,
    batch_id: i64,
    batch_name: String,
    request_id: i64,
    total: i64,
    started: Instant,
    cancel_tx: Arc<watch::Sender<bool>>,
}

/// The evaluation pipeline core. Owns the active-job slot and every
/// component the per-domain pipeline touches.
pub struct EvaluationEngine {
    db: Database,
    marks: MarkRepository,
    batches: BatchRepository,
    evaluations: EvaluationRepository,
    notifier: Arc<EvaluationNotifier>,
    vice_scorer: Arc<ViceScorer>,
    explainer: Option<Arc<dyn Explainer>>,
    uspto: Option<Arc<UsptoClient>>,
    commercial: Option<Arc<CommercialMatcher>>,
    seeds: HashSet<String>,
    config: EngineConfig,
    active_job: Mutex<Option<ActiveJob>>,
    marks_cache: OnceCell<Arc<Vec<Mark>>>,
}

impl EvaluationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        config: EngineConfig,
        notifier: Arc<EvaluationNotifier>,
        vice_scorer: Arc<ViceScorer>,
        seeds: HashSet<String>,
        explainer: Option<Arc<dyn Explainer>>,
        uspto: Option<Arc<UsptoClient>>,
        commercial: Option<Arc<CommercialMatcher>>,
    ) -> Self {
        let pool = db.pool().clone();
        EvaluationEngine {
            marks: MarkRepository::new(pool.clone()),
            batches: BatchRepository::new(pool.clone()),
            evaluations: EvaluationRepository::new(pool),
            db,
            notifier,
            vice_scorer,
            explainer,
            uspto,
            commercial,
            seeds,
            config,
            active_job: Mutex::new(None),
            marks_cache: OnceCell::new(),
        }
    }

    pub fn notifier(&self) -> Arc<EvaluationNotifier> {
        self.notifier.clone()
    }

    /// Launch an asynchronous evaluation job for a batch.
    pub async fn start_evaluation(
        self: &Arc<Self>,
        req: EvaluateRequest,
    ) -> Result<StartedEvaluation, Error> {
        let batch = self
            .batches
            .get_csv_batch(req.batch_id)
            .await?
            .ok_or(Error::BatchNotFound(req.batch_id))?;

        let total = self.batches.count_batch_domains(batch.id).await?;
        if total == 0 {
            return Err(Error::BatchEmpty(batch.id));
        }

        let mut slot = self.active_job.lock().await;
        if slot.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let job_id = Uuid::new_v4().to_string();
        let request = self
            .batches
            .create_batch_request(batch.id, "evaluate", RequestStatus::Running, &job_id)
            .await?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel_tx = Arc::new(cancel_tx);
        let started_at = Utc::now();

        *slot = Some(ActiveJob {
            id: job_id.clone(),
            batch_id: batch.id,
            request_id: request.id,
            total,
            cancel_tx: cancel_tx.clone(),
        });
        drop(slot);

        let job = JobContext {
            id: job_id.clone(),
            batch_id: batch.id,
            batch_name: batch.name,
            request_id: request.id,
            total,
            started: Instant::now(),
            cancel_tx,
        };
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run(job, cancel_rx, req).await;
        });

        Ok(StartedEvaluation {
            job_id,
            batch_id: batch.id,
            request_id: request.id,
            total,
            started_at,
        })
    }

    /// Request cancellation of the active job. Returns whether the id
    /// matched a running job.
    pub async fn cancel(&self, job_id: &str) -> bool {
        let slot = self.active_job.lock().await;
        let Some(job) = slot.as_ref() else {
            return false;
        };
        if job.id != job_id {
            return false;
        }
        let _ = job.cancel_tx.send(true);
        let mut event = Event::new(EventType::Progress, &job.id, job.batch_id);
        event.total = Some(job.total);
        event.message = Some("cancellation requested".to_string());
        let batch_id = job.batch_id;
        drop(slot);
        info!(job = job_id, batch_id, "evaluation cancellation requested");
        self.notifier.broadcast(event).await;
        true
    }

    /// Current engine state: the active job, if any, merged with the last
    /// retained status event.
    pub async fn status(&self) -> EvaluateStatus {
        let slot = self.active_job.lock().await;
        let mut status = EvaluateStatus::default();
        if let Some(job) = slot.as_ref() {
            status.running = true;
            status.job_id = Some(job.id.clone());
            status.batch_id = Some(job.batch_id);
            status.request_id = Some(job.request_id);
            status.total = job.total;
        }
        drop(slot);

        if let Some(event) = self.notifier.last_status() {
            status.state = Some(event.event_type);
            status.message = event.message;
            if let Some(processed) = event.processed {
                status.processed = processed;
            }
            if let Some(total) = event.total {
                status.total = total;
            }
            if status.batch_id.is_none() {
                status.batch_id = Some(event.batch_id);
            }
            if status.job_id.is_none() {
                status.job_id = Some(event.job_id);
            }
            status.last_evaluation = event.evaluation;
        }
        status
    }

    async fn run(self: Arc<Self>, job: JobContext, cancel_rx: watch::Receiver<bool>, req: EvaluateRequest) {
        let finish_status = self.run_inner(&job, cancel_rx, &req).await;

        if let Err(err) = self
            .batches
            .update_batch_request(job.request_id, finish_status)
            .await
        {
            warn!(batch_id = job.batch_id, error = %err, "update batch request");
        }
        if let Err(err) = self.batches.update_batch_processing_info(job.batch_id).await {
            warn!(batch_id = job.batch_id, error = %err, "refresh batch processing info");
        }

        let mut slot = self.active_job.lock().await;
        *slot = None;
    }

    async fn run_inner(
        &self,
        job: &JobContext,
        mut cancel_rx: watch::Receiver<bool>,
        req: &EvaluateRequest,
    ) -> RequestStatus {
        let chunk_size = if req.limit > 0 {
            req.limit.clamp(1, MAX_CHUNK_SIZE)
        } else {
            self.config.chunk_size.clamp(1, MAX_CHUNK_SIZE)
        };

        let marks = match self.load_marks().await {
            Ok(marks) => marks,
            Err(err) => {
                error!(job = %job.id, batch_id = job.batch_id, error = %err, "load marks");
                self.broadcast_error(job, &format!("load marks: {err}")).await;
                return RequestStatus::Failed;
            }
        };
        info!(
            job = %job.id,
            batch_id = job.batch_id,
            marks_loaded = marks.len(),
            marks_limit = self.config.marks_limit,
            "trademark marks ready for evaluation"
        );

        let scorer = Arc::new(TrademarkScorer::new(&marks, self.seeds.clone()));

        let skip_existing = req.resume && !req.force;
        let mut existing: HashSet<String> = HashSet::new();
        if skip_existing {
            match self.batches.evaluated_domains_for_batch(job.batch_id).await {
                Ok(evaluated) => {
                    existing = evaluated
                        .into_iter()
                        .map(|dom| dom.trim().to_string())
                        .filter(|dom| !dom.is_empty())
                        .collect();
                }
                Err(err) => {
                    error!(job = %job.id, batch_id = job.batch_id, error = %err, "load existing evaluations");
                    self.broadcast_error(job, &format!("load existing evaluations: {err}"))
                        .await;
                    return RequestStatus::Failed;
                }
            }
        }
        let mut processed = existing.len() as i64;

        info!(
            job = %job.id,
            batch_id = job.batch_id,
            batch_name = %job.batch_name,
            total = job.total,
            processed,
            resume = req.resume,
            force = req.force,
            "evaluation job started"
        );

        let mut started = Event::new(EventType::Started, &job.id, job.batch_id);
        started.total = Some(job.total);
        started.processed = Some(processed);
        started.message = Some("evaluation started".to_string());
        self.notifier.broadcast(started).await;

        let workers = worker_count();
        info!(job = %job.id, batch_id = job.batch_id, workers, "evaluation worker pool configured");

        let (task_tx, task_rx) = mpsc::channel::<BatchDomain>(workers * 4);
        let (result_tx, mut result_rx) = mpsc::channel::<Result<DomainOutcome, Error>>(workers * 4);
        let (err_tx, mut err_rx) = mpsc::channel::<Error>(1);

        let context = Arc::new(WorkerContext {
            scorer,
            fanciful: Arc::new(FancifulDecider::new(self.seeds.clone())),
            vice: self.vice_scorer.clone(),
            explainer: self.explainer.clone(),
            uspto: self.uspto.clone(),
            uspto_cache: Arc::new(Mutex::new(HashMap::new())),
            commercial: self.commercial.clone(),
            config: self.config.clone(),
            marks_count: marks.len(),
            total_domains: job.total,
            cancel_rx: cancel_rx.clone(),
        });

        let shared_task_rx = Arc::new(Mutex::new(task_rx));
        for _ in 0..workers {
            let context = context.clone();
            let task_rx = shared_task_rx.clone();
            let result_tx = result_tx.clone();
            let mut cancel_rx = cancel_rx.clone();
            tokio::spawn(async move {
                loop {
                    if *cancel_rx.borrow() {
                        return;
                    }
                    let task = {
                        let mut rx = task_rx.lock().await;
                        tokio::select! {
                            task = rx.recv() => task,
                            _ = cancel_rx.changed() => return,
                        }
                    };
                    let Some(task) = task else { return };

                    let outcome = evaluate_domain(&context, &task).await;
                    let failed = outcome.is_err();
                    tokio::select! {
                        sent = result_tx.send(outcome) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                        _ = cancel_rx.changed() => return,
                    }
                    if failed {
                        return;
                    }
                }
            });
        }
        drop(result_tx);

        // producer: enumerate the batch in ordered chunks
        {
            let batches = BatchRepository::new(self.db.pool().clone());
            let batch_id = job.batch_id;
            let start_offset = req.offset.max(0);
            let existing_snapshot = std::mem::take(&mut existing);
            let mut cancel_rx = cancel_rx.clone();
            tokio::spawn(async move {
                let mut offset = start_offset;
                loop {
                    if *cancel_rx.borrow() {
                        return;
                    }
                    let rows = match batches
                        .list_batch_domains_for_eval(batch_id, offset, chunk_size)
                        .await
                    {
                        Ok(rows) => rows,
                        Err(err) => {
                            let _ = err_tx.send(err).await;
                            return;
                        }
                    };
                    if rows.is_empty() {
                        return;
                    }
                    let row_count = rows.len() as i64;
                    for row in rows {
                        let domain = row.domain.trim().to_string();
                        if domain.is_empty() {
                            continue;
                        }
                        let normalized = if row.domain_normalized.trim().is_empty() {
                            domain.to_lowercase()
                        } else {
                            row.domain_normalized.trim().to_string()
                        };
                        if skip_existing && existing_snapshot.contains(&normalized) {
                            continue;
                        }
                        let task = BatchDomain {
                            domain,
                            domain_normalized: normalized,
                            row_index: row.row_index,
                            has_result: row.has_result,
                        };
                        tokio::select! {
                            sent = task_tx.send(task) => {
                                if sent.is_err() {
                                    return;
                                }
                            }
                            _ = cancel_rx.changed() => return,
                        }
                    }
                    offset += row_count;
                    if row_count < chunk_size {
                        return;
                    }
                }
            });
        }

        // collector: single writer for evaluations and progress events
        let mut pending: Option<Event> = None;
        let mut last_emit: Option<Instant> = None;
        let mut done = false;
        let mut result_open = true;
        let mut err_open = true;

        while result_open || err_open {
            tokio::select! {
                _ = cancel_rx.changed(), if !done => {
                    if *cancel_rx.borrow() {
                        self.flush_pending(&mut pending, &mut last_emit, true).await;
                        self.broadcast_cancelled(job, processed).await;
                        return RequestStatus::Cancelled;
                    }
                }
                maybe_err = err_rx.recv(), if err_open => {
                    match maybe_err {
                        None => err_open = false,
                        Some(err) => {
                            self.flush_pending(&mut pending, &mut last_emit, true).await;
                            error!(job = %job.id, batch_id = job.batch_id, error = %err, "list batch domains");
                            self.broadcast_error(job, &format!("list batch domains: {err}")).await;
                            let _ = job.cancel_tx.send(true);
                            return RequestStatus::Failed;
                        }
                    }
                }
                maybe_result = result_rx.recv(), if result_open => {
                    match maybe_result {
                        None => result_open = false,
                        Some(_) if done => {}
                        Some(Err(Error::Cancelled)) => {}
                        Some(Err(err)) => {
                            self.flush_pending(&mut pending, &mut last_emit, true).await;
                            error!(job = %job.id, batch_id = job.batch_id, error = %err, "evaluate domain");
                            self.broadcast_error(job, &format!("evaluate domain: {err}")).await;
                            let _ = job.cancel_tx.send(true);
                            return RequestStatus::Failed;
                        }
                        Some(Ok(outcome)) => {
                            let save_started = Instant::now();
                            if let Err(err) = self.evaluations.save(&outcome.evaluation).await {
                                self.flush_pending(&mut pending, &mut last_emit, true).await;
                                error!(job = %job.id, batch_id = job.batch_id, error = %err, "save evaluation");
                                self.broadcast_error(job, &format!("save evaluation: {err}")).await;
                                let _ = job.cancel_tx.send(true);
                                return RequestStatus::Failed;
                            }

                            processed += 1;
                            let mut event = Event::new(EventType::Evaluation, &job.id, job.batch_id);
                            event.total = Some(job.total);
                            event.processed = Some(processed);
                            event.evaluation = Some(EvaluationDto::from(&outcome.evaluation));
                            pending = Some(event);

                            debug!(
                                job = %job.id,
                                batch_id = job.batch_id,
                                domain = %outcome.evaluation.domain,
                                lookup_ms = outcome.lookup_duration.as_millis() as u64,
                                ai_ms = outcome.ai_duration.as_millis() as u64,
                                save_ms = save_started.elapsed().as_millis() as u64,
                                processing_ms = outcome.evaluation.processing_time_ms,
                                "evaluation timings"
                            );
                            self.flush_pending(&mut pending, &mut last_emit, false).await;

                            if processed >= job.total {
                                done = true;
                                let _ = job.cancel_tx.send(true);
                            }
                        }
                    }
                }
            }
        }

        if !done && *cancel_rx.borrow() {
            self.flush_pending(&mut pending, &mut last_emit, true).await;
            self.broadcast_cancelled(job, processed).await;
            return RequestStatus::Cancelled;
        }

        let _ = job.cancel_tx.send(true);
        self.flush_pending(&mut pending, &mut last_emit, true).await;

        let duration = job.started.elapsed();
        let mut complete = Event::new(EventType::Complete, &job.id, job.batch_id);
        complete.total = Some(job.total);
        complete.processed = Some(processed);
        complete.message = Some(format!("evaluation finished in {}", format_duration(duration)));
        self.notifier.broadcast(complete).await;
        info!(
            job = %job.id,
            batch_id = job.batch_id,
            processed,
            duration_ms = duration.as_millis() as u64,
            "evaluation job completed"
        );
        RequestStatus::Completed
    }

    /// Marks are loaded once per process and shared by every job.
    async fn load_marks(&self) -> Result<Arc<Vec<Mark>>, Error> {
        let limit = if self.config.marks_limit > 0 {
            self.config.marks_limit
        } else {
            500_000
        };
        self.marks_cache
            .get_or_try_init(|| async {
                let started = Instant::now();
                let marks = self.marks.load_popular_ranked(limit).await?;
                info!(
                    marks_loaded = marks.len(),
                    marks_limit = limit,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "trademark marks cached"
                );
                Ok(Arc::new(marks))
            })
            .await
            .cloned()
    }

    async fn flush_pending(
        &self,
        pending: &mut Option<Event>,
        last_emit: &mut Option<Instant>,
        force: bool,
    ) {
        if pending.is_none() {
            return;
        }
        if !force {
            if let Some(at) = last_emit {
                if at.elapsed() < EVALUATION_THROTTLE {
                    return;
                }
            }
        }
        if let Some(event) = pending.take() {
            debug!(
                job = %event.job_id,
                batch_id = event.batch_id,
                processed = event.processed,
                "broadcast evaluation event"
            );
            self.notifier.broadcast(event).await;
            *last_emit = Some(Instant::now());
        }
    }

    async fn broadcast_error(&self, job: &JobContext, message: &str) {
        let mut event = Event::new(EventType::Error, &job.id, job.batch_id);
        event.message = Some(message.to_string());
        self.notifier.broadcast(event).await;
    }

    async fn broadcast_cancelled(&self, job: &JobContext, processed: i64) {
        warn!(job = %job.id, batch_id = job.batch_id, "evaluation job cancelled");
        let mut event = Event::new(EventType::Cancelled, &job.id, job.batch_id);
        event.total = Some(job.total);
        event.processed = Some(processed);
        event.message = Some("evaluation cancelled".to_string());
        self.notifier.broadcast(event).await;
    }
}

fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .clamp(2, 12)
}

fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    let minutes = total_ms / 60_000;
    let seconds = (total_ms % 60_000) as f64 / 1000.0;
    if minutes > 0 {
        format!("{minutes}m{seconds:.0}s")
    } else {
        format!("{seconds:.3}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_is_clamped() {
        let workers = worker_count();
        assert!((2..=12).contains(&workers));
    }

    #[test]
    fn durations_render_compactly() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_duration(Duration::from_secs(72)), "1m12s");
    }
}
