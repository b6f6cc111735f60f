//! The record-driven pipeline runner.
//!
//! One run fetches every record matching a filter, applies a [`Processor`] to
//! each, writes successful transitions back and reports a [`RunSummary`].
//! A record's failure never aborts the run: only an unreachable store does.

use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::{FutureExt, StreamExt, future, stream};
use serde::{Serialize, Serializer};
use tracing::{error, info, instrument, warn};

use contentpipe_formula::Formula;
use contentpipe_shared::{
    ContentPipeError, ErrorKind, Fields, Record, RecordId, Result, RunnerConfig, STATE_FIELD, Stage,
};
use contentpipe_storage::RecordSource;

// ---------------------------------------------------------------------------
// Processor contract
// ---------------------------------------------------------------------------

/// What a processor proposes for one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Write these fields (restricted to the run's persist set).
    Updated(Fields),
    /// Leave the record alone.
    Skipped(String),
}

/// The side-effecting step applied to each record.
///
/// Returning an error is how a processor fails a record. Errors of kind
/// [`ErrorKind::Data`] skip the record instead. Processors must be safe to
/// re-run on an unchanged record.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, record: &Record) -> Result<Transition>;
}

/// A [`Processor`] backed by a closure.
pub struct FnProcessor<F>(F);

/// Wrap `f` as a [`Processor`]. The record is passed by value.
pub fn from_fn<F, Fut>(f: F) -> FnProcessor<F>
where
    F: Fn(Record) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Transition>> + Send + 'static,
{
    FnProcessor(f)
}

#[async_trait]
impl<F, Fut> Processor for FnProcessor<F>
where
    F: Fn(Record) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Transition>> + Send + 'static,
{
    async fn process(&self, record: &Record) -> Result<Transition> {
        (self.0)(record.clone()).await
    }
}

// ---------------------------------------------------------------------------
// Options, cancellation, progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Records in flight at once. 1 is strictly sequential.
    pub concurrency: usize,
    /// Bound on one processor invocation.
    pub record_timeout: Duration,
    /// Bound on one store write.
    pub write_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from(&RunnerConfig::default())
    }
}

impl From<&RunnerConfig> for RunOptions {
    fn from(config: &RunnerConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            record_timeout: Duration::from_secs(config.record_timeout_secs),
            write_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

/// Run-level stop flag. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop dispatching new records. In-flight records still finish.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress callbacks for a run.
pub trait RunProgress: Send + Sync {
    fn run_started(&self, total: usize);
    fn record_finished(&self, outcome: &RecordOutcome, done: usize, total: usize);
    fn run_finished(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl RunProgress for SilentProgress {
    fn run_started(&self, _total: usize) {}
    fn record_finished(&self, _outcome: &RecordOutcome, _done: usize, _total: usize) {}
    fn run_finished(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Outcomes and summary
// ---------------------------------------------------------------------------

/// Final result for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The write landed. Carries the names of the written fields.
    Updated { fields: Vec<String> },
    Skipped { reason: String },
    Failed { error: String, kind: ErrorKind },
}

impl Outcome {
    /// Classify a processor error by its kind.
    fn from_error(err: &ContentPipeError) -> Self {
        match err.kind() {
            ErrorKind::Data => Self::Skipped {
                reason: err.to_string(),
            },
            kind => Self::Failed {
                error: err.to_string(),
                kind,
            },
        }
    }

    fn failed(err: &ContentPipeError) -> Self {
        Self::Failed {
            error: err.to_string(),
            kind: err.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    pub id: RecordId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Aggregate report of one run. Outcomes are in fetch order.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// The cancel signal stopped dispatch before every record was processed.
    pub cancelled: bool,
    /// Records fetched but never handed to the processor.
    pub not_dispatched: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub outcomes: Vec<RecordOutcome>,
}

impl RunSummary {
    fn new(outcomes: Vec<RecordOutcome>, not_dispatched: usize, elapsed: Duration) -> Self {
        let mut summary = Self {
            updated: 0,
            skipped: 0,
            failed: 0,
            cancelled: not_dispatched > 0,
            not_dispatched,
            elapsed,
            outcomes,
        };
        for o in &summary.outcomes {
            match o.outcome {
                Outcome::Updated { .. } => summary.updated += 1,
                Outcome::Skipped { .. } => summary.skipped += 1,
                Outcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub struct Runner {
    source: Arc<dyn RecordSource>,
    options: RunOptions,
    cancel: CancelSignal,
}

impl Runner {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            options: RunOptions::default(),
            cancel: CancelSignal::new(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Apply `processor` to every record matching `filter`.
    ///
    /// Only a failing `list` is an error; everything after that is reported
    /// per record in the summary.
    #[instrument(skip_all, fields(store = self.source.name(), filter = %filter))]
    pub async fn run(
        &self,
        filter: &Formula,
        processor: &dyn Processor,
        fields_to_persist: &[&str],
        progress: &dyn RunProgress,
    ) -> Result<RunSummary> {
        let started = Instant::now();

        let records = self.source.list(filter).await?;
        let total = records.len();
        info!(total, concurrency = self.options.concurrency, "fetched batch");
        progress.run_started(total);

        let cancel = self.cancel.clone();
        let mut seen: HashSet<RecordId> = HashSet::with_capacity(total);
        let mut outcomes = Vec::with_capacity(total);

        let dispatched = stream::iter(records)
            .take_while(move |_| future::ready(!cancel.is_raised()))
            .map(|record| {
                let duplicate = !seen.insert(record.id.clone());
                self.dispatch(record, duplicate, processor, fields_to_persist)
            })
            .buffered(self.options.concurrency.max(1));
        let mut dispatched = std::pin::pin!(dispatched);

        while let Some(outcome) = dispatched.next().await {
            log_outcome(&outcome);
            outcomes.push(outcome);
            progress.record_finished(&outcomes[outcomes.len() - 1], outcomes.len(), total);
        }

        let not_dispatched = total - outcomes.len();
        if not_dispatched > 0 {
            warn!(not_dispatched, "run cancelled");
        }

        let summary = RunSummary::new(outcomes, not_dispatched, started.elapsed());
        info!(
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            "run complete"
        );
        progress.run_finished(&summary);
        Ok(summary)
    }

    async fn dispatch(
        &self,
        record: Record,
        duplicate: bool,
        processor: &dyn Processor,
        fields_to_persist: &[&str],
    ) -> RecordOutcome {
        let outcome = if duplicate {
            Outcome::Skipped {
                reason: "duplicate record in batch".into(),
            }
        } else {
            self.process_record(&record, processor, fields_to_persist).await
        };
        RecordOutcome {
            id: record.id,
            outcome,
        }
    }

    async fn process_record(
        &self,
        record: &Record,
        processor: &dyn Processor,
        fields_to_persist: &[&str],
    ) -> Outcome {
        // A stored state that cannot be ordered is rejected before any side effect runs.
        if fields_to_persist.contains(&STATE_FIELD) {
            if let Err(e) = record.stage() {
                return Outcome::from_error(&e);
            }
        }

        let attempt = AssertUnwindSafe(processor.process(record)).catch_unwind();
        let transition = match tokio::time::timeout(self.options.record_timeout, attempt).await {
            Err(_) => {
                return Outcome::failed(&ContentPipeError::Timeout(format!(
                    "processor exceeded {:?}",
                    self.options.record_timeout
                )));
            }
            Ok(Err(panic)) => {
                return Outcome::Failed {
                    error: format!("processor panicked: {}", panic_message(panic.as_ref())),
                    kind: ErrorKind::Programming,
                };
            }
            Ok(Ok(Err(e))) => return Outcome::from_error(&e),
            Ok(Ok(Ok(transition))) => transition,
        };

        let fields = match transition {
            Transition::Skipped(reason) => return Outcome::Skipped { reason },
            Transition::Updated(fields) => fields,
        };

        let fields = match restrict(record, fields, fields_to_persist) {
            Ok(fields) => fields,
            Err(e) => return Outcome::from_error(&e),
        };

        match tokio::time::timeout(
            self.options.write_timeout,
            self.source.update(&record.id, &fields),
        )
        .await
        {
            Err(_) => Outcome::failed(&ContentPipeError::Timeout(format!(
                "write exceeded {:?}",
                self.options.write_timeout
            ))),
            Ok(Err(e)) => Outcome::failed(&e),
            Ok(Ok(())) => Outcome::Updated {
                fields: fields.into_keys().collect(),
            },
        }
    }
}

/// Keep only persisted fields and refuse non-monotonic state changes.
fn restrict(record: &Record, fields: Fields, fields_to_persist: &[&str]) -> Result<Fields> {
    let kept: Fields = fields
        .into_iter()
        .filter(|(name, _)| fields_to_persist.contains(&name.as_str()))
        .collect();
    if kept.is_empty() {
        return Err(ContentPipeError::contract("no fields to persist"));
    }

    if let Some(value) = kept.get(STATE_FIELD) {
        let proposed = value.to_text();
        let next: Stage = proposed
            .parse()
            .map_err(|_| ContentPipeError::contract(format!("processor produced unknown state {proposed:?}")))?;
        let current = record.stage()?;
        if !current.can_advance_to(next) {
            return Err(ContentPipeError::contract(format!(
                "backward state transition {current} -> {next}"
            )));
        }
    }
    Ok(kept)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn log_outcome(o: &RecordOutcome) {
    match &o.outcome {
        Outcome::Updated { fields } => info!(id = %o.id, ?fields, "record updated"),
        Outcome::Skipped { reason } => warn!(id = %o.id, %reason, "record skipped"),
        Outcome::Failed {
            error,
            kind: ErrorKind::Programming,
        } => error!(id = %o.id, %error, "record failed: contract violation"),
        Outcome::Failed { error, .. } => warn!(id = %o.id, %error, "record failed"),
    }
}
