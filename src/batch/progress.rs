//! Progress reporting for batch runs
//!
//! Progress notifications are purely informational; nothing in the batch
//! depends on what a logger does with them.

use std::path::Path;
use uuid::Uuid;

/// Receives lifecycle notifications of a batch run.
///
/// Implementations are shared between worker threads.
pub trait ProgressLogger: Send + Sync {
    fn run_started(&self, run_id: Uuid, archives: usize, workers: usize);

    fn run_finished(&self, run_id: Uuid, processed: usize, failed: usize);

    fn worker_started(&self, worker: usize);

    fn worker_finished(&self, worker: usize, processed: usize);

    /// An archive is done; `done` counts finished archives of the whole run
    fn archive_finished(&self, worker: usize, archive: &Path, done: usize, total: usize);

    fn archive_failed(&self, worker: usize, archive: &Path, error: &str);
}

/// Progress logger writing through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

/// Share of `done` in `total`, in percent
pub fn percentage(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 * 100.0 / total as f64
    }
}

impl ProgressLogger for LogProgress {
    fn run_started(&self, run_id: Uuid, archives: usize, workers: usize) {
        log::info!(
            "[{}] starting batch over {} archives with {} workers",
            run_id,
            archives,
            workers
        );
    }

    fn run_finished(&self, run_id: Uuid, processed: usize, failed: usize) {
        if failed > 0 {
            log::warn!(
                "[{}] batch finished: {} archives processed, {} failed",
                run_id,
                processed,
                failed
            );
        } else {
            log::info!("[{}] batch finished: {} archives processed", run_id, processed);
        }
    }

    fn worker_started(&self, worker: usize) {
        log::info!("worker {} started", worker);
    }

    fn worker_finished(&self, worker: usize, processed: usize) {
        log::info!("worker {} finished after {} archives", worker, processed);
    }

    fn archive_finished(&self, worker: usize, archive: &Path, done: usize, total: usize) {
        log::info!(
            "worker {}: {} done ({}/{}, {:.1}%)",
            worker,
            archive.display(),
            done,
            total,
            percentage(done, total)
        );
    }

    fn archive_failed(&self, worker: usize, archive: &Path, error: &str) {
        log::error!("worker {}: {} failed: {}", worker, archive.display(), error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 4), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(4, 4), 100.0);
        assert_eq!(percentage(0, 0), 100.0);
    }
}
