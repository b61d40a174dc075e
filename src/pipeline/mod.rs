//! Task graph around the normalizers.
//!
//! Every output table is produced by one [`Task`]. Tasks declare the tasks they
//! depend on (whose registries must be complete first), the files they read and
//! the tables they write, so the [`Orchestrator`] can order them and skip the
//! ones whose inputs did not change.

mod orchestrator;

pub use orchestrator::{Orchestrator, RunReport, TaskManifest};

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::metrics;
use crate::output::{StagedTable, TableWriter};
use crate::registry::{IdRegistry, Mode, RegistrySpec, RegistryStore};
use crate::sources::SourceTable;

/// One entity normalizer as seen by the orchestrator
pub trait Task {
    /// Unique task name, also the name of its main output table
    fn name(&self) -> &'static str;

    /// Tasks that must have completed before this one runs
    fn task_deps(&self) -> &'static [&'static str] {
        &[]
    }

    /// Source files read by the task
    fn file_deps(&self, config: &Config) -> Vec<PathBuf>;

    /// Output tables written by the task
    fn targets(&self, config: &Config) -> Vec<PathBuf>;

    /// Registries opened by the task, and how
    fn registries(&self) -> Vec<(RegistrySpec, Mode)>;

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport>;
}

/// What a task gets to work with: configuration and the registry store
pub struct TaskContext<'a> {
    pub config: &'a Config,
    pub store: &'a RegistryStore,
}

impl<'a> TaskContext<'a> {
    pub fn new(config: &'a Config, store: &'a RegistryStore) -> Self {
        Self { config, store }
    }

    pub fn registry(&self, spec: RegistrySpec, mode: Mode) -> Result<IdRegistry> {
        self.store.open_spec(spec, mode)
    }

    /// Open a comma-delimited source extract configured under `[sources]`
    pub fn source(&self, name: &str, file_name: &str, required: &[&str]) -> Result<SourceTable> {
        self.delimited_source(name, file_name, b',', required)
    }

    pub fn delimited_source(
        &self,
        name: &str,
        file_name: &str,
        delimiter: u8,
        required: &[&str],
    ) -> Result<SourceTable> {
        SourceTable::open(name, &self.config.source_path(file_name), delimiter, required)
    }

    pub fn source_path(&self, file_name: &str) -> PathBuf {
        self.config.source_path(file_name)
    }

    pub fn table_writer(&self, table: &str, columns: &[&str]) -> Result<TableWriter> {
        TableWriter::create(
            table,
            &self.config.output_path(table),
            columns,
            self.config.output.compression,
        )
    }

    /// Success path of a task: commit every registry, then publish every table.
    ///
    /// Registries go first so a published table never references IDs that were
    /// not persisted.
    pub fn complete(
        &self,
        task: &str,
        registries: Vec<IdRegistry>,
        tables: Vec<StagedTable>,
        rows_filtered: usize,
    ) -> Result<TaskReport> {
        let ids_allocated = registries.iter().map(IdRegistry::allocated).sum();
        for registry in registries {
            registry.commit()?;
        }

        let mut published = Vec::with_capacity(tables.len());
        for staged in tables {
            let table = staged.table().to_string();
            let rows = staged.rows();
            let path = staged.publish()?;
            metrics::tables::rows_written(&table, rows);
            info!("📦 Published {} ({} rows) to {}", table, rows, path.display());
            published.push(TableReport { table, rows, path });
        }
        if rows_filtered > 0 {
            metrics::tables::rows_filtered(task, rows_filtered);
        }

        Ok(TaskReport {
            task: task.to_string(),
            tables: published,
            ids_allocated,
            rows_filtered,
        })
    }
}

/// Outcome of a successful task
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub tables: Vec<TableReport>,
    /// IDs newly allocated across the task's registries
    pub ids_allocated: usize,
    /// Source rows dropped by a documented filter
    pub rows_filtered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub rows: usize,
    pub path: PathBuf,
}

impl TaskReport {
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
    }

    pub fn path(&self, table: &str) -> Option<&Path> {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.path.as_path())
    }
}
