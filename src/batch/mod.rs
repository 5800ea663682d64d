//! Multi-archive batch processing
//!
//! A bounded pool of worker threads pulls input archives from a shared queue.
//! Each worker runs one independent pipeline per archive and appends the
//! resulting intervals to an output archive chosen by the grouping key. The
//! LRU archive cache is the only state the workers share.
//!
//! A failing archive is logged and reported; it never stops the batch.

pub mod archive;
pub mod cache;
pub mod progress;

pub use archive::{is_archive, ArchiveReader, ArchiveWriter, ARCHIVE_EXTENSION};
pub use cache::{key_to_relative_path, ArchiveCache, WriterHandle, METADATA_FILE};
pub use progress::{percentage, LogProgress, ProgressLogger};

use crate::config::{BatchConfig, GroupBy};
use crate::error::IntervalError;
use crate::pipeline::IntervalTransformer;
use crate::types::Interval;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Output key for intervals without a known project
pub const UNKNOWN_PROJECT: &str = "unknown";

/// An archive that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveFailure {
    pub archive: PathBuf,
    pub error: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub archives: usize,
    pub processed: usize,
    pub intervals: usize,
    pub malformed_lines: usize,
    pub failures: Vec<ArchiveFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

struct ArchiveSummary {
    intervals: usize,
    malformed: usize,
}

/// Runs the pipeline over many archives in parallel
pub struct BatchProcessor {
    config: BatchConfig,
    progress: Box<dyn ProgressLogger>,
}

impl BatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            progress: Box::new(LogProgress),
        }
    }

    /// Replace the default `log`-based progress reporting
    pub fn with_progress(mut self, progress: Box<dyn ProgressLogger>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Process all archives found below `input` into `output`
    pub fn run_directory(&self, input: &Path, output: &Path) -> Result<BatchReport, IntervalError> {
        let archives = collect_archives(input)?;
        self.run(archives, output)
    }

    /// Process the given archives into the output directory
    pub fn run(&self, archives: Vec<PathBuf>, output: &Path) -> Result<BatchReport, IntervalError> {
        self.config.validate()?;
        let cache = ArchiveCache::new(output, self.config.cache_capacity)?;

        let total = archives.len();
        let workers = self.config.workers.min(total.max(1));
        let queue = Mutex::new(VecDeque::from(archives));
        let report = Mutex::new(BatchReport {
            run_id: Uuid::new_v4(),
            archives: total,
            ..BatchReport::default()
        });
        let run_id = report.lock().run_id;

        self.progress.run_started(run_id, total, workers);

        let panicked: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let (queue, report, cache) = (&queue, &report, &cache);
                    scope.spawn(move || self.work(worker, queue, report, cache))
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .filter_map(|(worker, handle)| handle.join().is_err().then_some(worker))
                .collect()
        });

        cache.dispose()?;
        if let Some(worker) = panicked.first() {
            return Err(IntervalError::WorkerFailed(format!(
                "worker {} panicked",
                worker
            )));
        }

        let mut report = report.into_inner();
        report.failures.sort_by(|a, b| a.archive.cmp(&b.archive));
        self.progress
            .run_finished(run_id, report.processed, report.failures.len());
        Ok(report)
    }

    /// Worker loop: pull archives off the queue until it is empty
    fn work(
        &self,
        worker: usize,
        queue: &Mutex<VecDeque<PathBuf>>,
        report: &Mutex<BatchReport>,
        cache: &ArchiveCache,
    ) {
        self.progress.worker_started(worker);
        let total = report.lock().archives;
        let mut processed = 0;

        loop {
            let Some(archive) = queue.lock().pop_front() else {
                break;
            };
            let outcome = contain_panic(|| self.process_archive(&archive, cache));
            processed += 1;

            let mut report = report.lock();
            match outcome {
                Ok(summary) => {
                    report.processed += 1;
                    report.intervals += summary.intervals;
                    report.malformed_lines += summary.malformed;
                    let done = report.processed + report.failures.len();
                    self.progress
                        .archive_finished(worker, &archive, done, total);
                }
                Err(e) => {
                    let error = e.to_string();
                    self.progress.archive_failed(worker, &archive, &error);
                    report.failures.push(ArchiveFailure { archive, error });
                }
            }
        }

        self.progress.worker_finished(worker, processed);
    }

    fn process_archive(
        &self,
        archive: &Path,
        cache: &ArchiveCache,
    ) -> Result<ArchiveSummary, IntervalError> {
        let user = user_key(archive);
        let mut reader = ArchiveReader::open(archive)?;
        let mut run = IntervalTransformer::new(self.config.pipeline).start();

        for event in reader.by_ref() {
            run.push(event?)?;
        }
        let malformed = reader.malformed();
        let intervals = run.finish(Some(&user))?;

        match self.config.group_by {
            GroupBy::User => cache.append(&user, &intervals)?,
            GroupBy::Project => {
                for (project, intervals) in group_by_project(&intervals) {
                    cache.append(project, &intervals)?;
                }
            }
        }

        Ok(ArchiveSummary {
            intervals: intervals.len(),
            malformed,
        })
    }
}

/// Run one archive's work, turning a panic into an error for that archive
fn contain_panic<T>(
    work: impl FnOnce() -> Result<T, IntervalError>,
) -> Result<T, IntervalError> {
    panic::catch_unwind(AssertUnwindSafe(work))
        .unwrap_or_else(|payload| Err(IntervalError::WorkerFailed(panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

fn group_by_project(intervals: &[Interval]) -> BTreeMap<&str, Vec<&Interval>> {
    let mut groups: BTreeMap<&str, Vec<&Interval>> = BTreeMap::new();
    for interval in intervals {
        let project = interval.project.as_deref().unwrap_or(UNKNOWN_PROJECT);
        groups.entry(project).or_default().push(interval);
    }
    groups
}

/// User identifier of an archive: its file name without archive extensions
pub fn user_key(archive: &Path) -> String {
    let name = archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    [".ndjson.zst", ".ndjson", ".jsonl"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .map(str::to_string)
        .unwrap_or(name)
}

/// All archives below `root`, sorted by path
pub fn collect_archives(root: &Path) -> Result<Vec<PathBuf>, IntervalError> {
    let mut archives = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_archive(&path) {
                archives.push(path);
            }
        }
    }
    archives.sort();
    Ok(archives)
}
