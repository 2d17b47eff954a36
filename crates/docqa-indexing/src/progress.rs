//! Build progress reporting.

use tracing::info;

/// Progress through one embedding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildProgress {
    pub chunks_total: usize,
    pub chunks_embedded: usize,
    pub batches: usize,
}

impl BuildProgress {
    pub fn new(chunks_total: usize) -> Self {
        Self {
            chunks_total,
            ..Default::default()
        }
    }

    pub fn record_batch(&mut self, size: usize) {
        self.chunks_embedded += size;
        self.batches += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.chunks_embedded >= self.chunks_total
    }
}

/// Receives progress updates after each embedding batch.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, progress: &BuildProgress);
}

pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn on_progress(&self, _progress: &BuildProgress) {}
}

/// Logs every `every`-th batch, and the last one, at info level.
pub struct LoggingProgressCallback {
    every: usize,
}

impl LoggingProgressCallback {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl ProgressCallback for LoggingProgressCallback {
    fn on_progress(&self, progress: &BuildProgress) {
        if progress.batches % self.every == 0 || progress.is_complete() {
            info!(
                embedded = progress.chunks_embedded,
                total = progress.chunks_total,
                batches = progress.batches,
                "Embedding progress"
            );
        }
    }
}
