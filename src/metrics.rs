//! Metrics for the normalization pipeline.
//!
//! Everything goes through the `metrics` facade; without an installed recorder
//! the calls are no-ops. The CLI installs the Prometheus recorder and renders a
//! text snapshot at the end of a run.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::Path;

pub mod registry {
    use super::*;

    pub fn ids_allocated(registry: &str, count: usize) {
        counter!("data_france_registry_ids_allocated_total", "registry" => registry.to_string())
            .increment(count as u64);
    }
}

pub mod join {
    use super::*;

    pub fn lookup(stream: &'static str, matched: bool) {
        let outcome = if matched { "matched" } else { "empty" };
        counter!("data_france_join_lookups_total", "stream" => stream, "outcome" => outcome)
            .increment(1);
    }
}

pub mod tables {
    use super::*;

    pub fn rows_written(table: &str, count: usize) {
        counter!("data_france_rows_written_total", "table" => table.to_string())
            .increment(count as u64);
    }

    pub fn rows_filtered(table: &str, count: usize) {
        counter!("data_france_rows_filtered_total", "table" => table.to_string())
            .increment(count as u64);
    }
}

pub mod tasks {
    use super::*;

    pub fn success(task: &str, duration_secs: f64) {
        counter!("data_france_task_runs_total", "task" => task.to_string(), "status" => "success")
            .increment(1);
        histogram!("data_france_task_duration_seconds", "task" => task.to_string())
            .record(duration_secs);
    }

    pub fn failure(task: &str) {
        counter!("data_france_task_runs_total", "task" => task.to_string(), "status" => "failure")
            .increment(1);
    }

    pub fn skipped(task: &str) {
        counter!("data_france_task_runs_total", "task" => task.to_string(), "status" => "skipped")
            .increment(1);
    }
}

/// Install the Prometheus recorder as the global metrics recorder
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Write the current metrics in Prometheus text format
pub fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, handle.render())
}
