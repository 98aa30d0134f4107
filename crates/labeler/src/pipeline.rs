use crate::batcher::{batches, Batch};
use crate::errors::{BatchError, StoreError};
use crate::parser::parse_response;
use crate::prompt::build_prompt;
use crate::store::RecordStore;
use crate::types::{LabelTask, TaskReport};
use llm::{Annotator, RunStatistics};
use std::num::NonZeroUsize;
use tracing::{error, info};

/// Result of a complete run over all tasks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub tasks: Vec<TaskReport>,
    pub statistics: RunStatistics,
}

impl RunReport {
    pub fn labeled(&self) -> usize {
        self.tasks.iter().map(|t| t.labeled).sum()
    }

    pub fn failed_batches(&self) -> usize {
        self.tasks.iter().map(|t| t.batches_failed).sum()
    }
}

/// Drives FETCH → (BUILD_PROMPT → CALL_ANNOTATOR → PARSE_VALIDATE → COMMIT)
/// for each task, one batch and one remote call at a time.
///
/// A failing batch is logged and skipped. Its records stay unlabeled and are
/// picked up again by the next run, because only unlabeled records are
/// eligible.
pub struct Pipeline<'a> {
    store: &'a RecordStore,
    annotator: &'a dyn Annotator,
    batch_size: NonZeroUsize,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a RecordStore, annotator: &'a dyn Annotator, batch_size: NonZeroUsize) -> Self {
        Self {
            store,
            annotator,
            batch_size,
        }
    }

    /// Process every task in order. Only a store that cannot be queried
    /// aborts the run.
    pub async fn run(&self, tasks: &[LabelTask]) -> Result<RunReport, StoreError> {
        let mut statistics = RunStatistics::new();
        let mut reports = Vec::with_capacity(tasks.len());

        info!(
            "Starting run: {} tasks, batch size {}, annotator {}",
            tasks.len(),
            self.batch_size,
            self.annotator.name()
        );

        for task in tasks {
            reports.push(self.process_task(task, &mut statistics).await?);
        }

        Ok(RunReport {
            tasks: reports,
            statistics,
        })
    }

    pub async fn process_task(
        &self,
        task: &LabelTask,
        stats: &mut RunStatistics,
    ) -> Result<TaskReport, StoreError> {
        info!("[Processing Phrase: {}]", task.phrase);

        let pending = self.store.fetch_pending(task).await?;
        let mut report = TaskReport::new(task.phrase.as_str(), pending.len());

        if pending.is_empty() {
            info!("No un-processed records found for '{}'", task.phrase);
            return Ok(report);
        }

        info!(
            "Found {} pending records. Processing in batches of {}...",
            pending.len(),
            self.batch_size
        );

        for batch in batches(&pending, self.batch_size) {
            match self.process_batch(task, &batch, stats).await {
                Ok(labeled) => {
                    report.batches_committed += 1;
                    report.labeled += labeled;
                    info!(
                        "Batch {}/{} | Labeled: {} | Calls: {}",
                        batch.index, batch.total, labeled, stats.total_calls
                    );
                }
                Err(e) => {
                    report.batches_failed += 1;
                    error!(
                        "Batch {}/{} for '{}' skipped: {}",
                        batch.index, batch.total, task.phrase, e
                    );
                }
            }
        }

        Ok(report)
    }

    /// One batch end to end. Records are labeled only if every step succeeds.
    pub async fn process_batch(
        &self,
        task: &LabelTask,
        batch: &Batch<'_>,
        stats: &mut RunStatistics,
    ) -> Result<usize, BatchError> {
        let prompt = build_prompt(task, batch);
        let raw = self.annotator.annotate(&prompt, stats).await?;
        let results = parse_response(&raw, batch)?;
        self.store.commit_labels(&results).await?;
        Ok(results.len())
    }
}

/// Prompt of the first pending batch for `task`, without calling any annotator.
pub async fn preview_prompt(
    store: &RecordStore,
    task: &LabelTask,
    batch_size: NonZeroUsize,
) -> Result<Option<String>, StoreError> {
    let pending = store.fetch_pending(task).await?;
    Ok(batches(&pending, batch_size)
        .next()
        .map(|batch| build_prompt(task, &batch)))
}
