//! Run-log lifecycle.
//!
//! A [`RunLogger`] writes an `in_progress` record as soon as a command
//! starts and replaces it with a terminal record when the command ends.
//! Both writes are best-effort; analytics never block the actual work.

use std::time::Instant;

use tracing::{debug, warn};
use uuid::Uuid;

use filament_core::{CacheStore, ChangeStats, RunRecord, RunStatus};

pub struct RunLogger<'a> {
    store: &'a dyn CacheStore,
    record: RunRecord,
    timer: Instant,
}

impl<'a> RunLogger<'a> {
    /// Open a run: assigns an id and records it as `in_progress`.
    pub fn start(store: &'a dyn CacheStore, tool: &str, operation: &str, vault_path: &str) -> Self {
        let mut record = RunRecord::started(tool, operation, vault_path);
        record.run_id = Uuid::new_v4().to_string();
        if let Err(err) = store.record_run(&record) {
            warn!(error = %err, "failed to record run start");
        }
        Self {
            store,
            record,
            timer: Instant::now(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.record.run_id
    }

    /// Counters and timings are filled in by the command as it goes.
    pub fn record_mut(&mut self) -> &mut RunRecord {
        &mut self.record
    }

    pub fn set_parameters(&mut self, parameters: &serde_json::Value) {
        self.record.parameters = Some(parameters.to_string());
    }

    pub fn set_model(&mut self, model: &str, dimensions: usize) {
        self.record.model = Some(model.to_string());
        self.record.dimensions = Some(dimensions);
    }

    pub fn apply_change_stats(&mut self, stats: &ChangeStats) {
        self.record.files_total = stats.total();
        self.record.files_new = stats.new;
        self.record.files_modified = stats.modified;
        self.record.files_unchanged = stats.unchanged;
        self.record.files_deleted = stats.deleted;
        self.record.cache_hit_ratio = stats.hit_ratio();
    }

    /// Record a non-fatal error: bumps the count and appends the message.
    pub fn add_error(&mut self, message: &str) {
        self.record.error_count += 1;
        match &mut self.record.error_message {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(message);
            }
            None => self.record.error_message = Some(message.to_string()),
        }
    }

    /// Close the run: success normally, partial when errors were recorded.
    pub fn complete(self) {
        let status = if self.record.error_count > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };
        self.finish(status);
    }

    /// Close the run with a terminal status.
    pub fn finish(mut self, status: RunStatus) {
        self.record.status = status;
        self.finalize();
    }

    /// Close the run as failed.
    pub fn finish_error(mut self, message: &str) {
        self.record.status = RunStatus::Error;
        self.record.error_message = Some(message.to_string());
        if self.record.error_count == 0 {
            self.record.error_count = 1;
        }
        self.finalize();
    }

    fn finalize(&mut self) {
        self.record.duration_seconds = Some(self.timer.elapsed().as_secs_f64());
        match self.store.record_run(&self.record) {
            Ok(()) => {
                debug!(
                    run_id = %self.record.run_id,
                    status = self.record.status.as_str(),
                    "run recorded"
                )
            }
            Err(err) => {
                warn!(run_id = %self.record.run_id, error = %err, "failed to finalize run record")
            }
        }
    }
}
