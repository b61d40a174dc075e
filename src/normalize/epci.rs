use std::path::PathBuf;

use super::EPCI_REGISTRY;
use crate::config::Config;
use crate::constants::EPCI;
use crate::error::Result;
use crate::pipeline::{Task, TaskContext, TaskReport};
use crate::registry::{Mode, RegistrySpec};

const COLUMNS: [&str; 4] = ["id", "code", "type", "nom"];

/// Établissements publics de coopération intercommunale
pub struct EpciTask;

impl Task for EpciTask {
    fn name(&self) -> &'static str {
        EPCI
    }

    fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.source_path(&config.sources.epci)]
    }

    fn targets(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.output_path(EPCI)]
    }

    fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
        vec![(EPCI_REGISTRY, Mode::ReadWrite)]
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut epci = ctx.registry(EPCI_REGISTRY, Mode::ReadWrite)?;
        let source = ctx.source(EPCI, &ctx.config.sources.epci, &["code", "type", "nom"])?;
        let mut writer = ctx.table_writer(EPCI, &COLUMNS)?;

        for row in source.rows() {
            let row = row?;
            let code = row.required("code")?;
            writer.write_row(vec![
                epci.resolve(&[code])?.into(),
                code.into(),
                row.get("type").into(),
                row.get("nom").into(),
            ])?;
        }

        let staged = writer.finish()?;
        ctx.complete(self.name(), vec![epci], vec![staged], 0)
    }
}
