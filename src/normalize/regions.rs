use std::path::PathBuf;

use super::{commune_fk, COMMUNES_REGISTRY, REGIONS_REGISTRY};
use crate::config::Config;
use crate::constants::{COMMUNE_IDS_TASK, REGIONS};
use crate::error::Result;
use crate::pipeline::{Task, TaskContext, TaskReport};
use crate::registry::{Mode, RegistrySpec};

const COLUMNS: [&str; 5] = ["id", "code", "nom", "type_nom", "chef_lieu_id"];

pub struct RegionsTask;

impl Task for RegionsTask {
    fn name(&self) -> &'static str {
        REGIONS
    }

    fn task_deps(&self) -> &'static [&'static str] {
        &[COMMUNE_IDS_TASK]
    }

    fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.source_path(&config.sources.regions)]
    }

    fn targets(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.output_path(REGIONS)]
    }

    fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
        vec![
            (REGIONS_REGISTRY, Mode::ReadWrite),
            (COMMUNES_REGISTRY, Mode::ReadOnly),
        ]
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut regions = ctx.registry(REGIONS_REGISTRY, Mode::ReadWrite)?;
        let mut communes = ctx.registry(COMMUNES_REGISTRY, Mode::ReadOnly)?;
        let source = ctx.source(
            REGIONS,
            &ctx.config.sources.regions,
            &["REG", "CHEFLIEU", "TNCC", "NCCENR"],
        )?;
        let mut writer = ctx.table_writer(REGIONS, &COLUMNS)?;

        for row in source.rows() {
            let row = row?;
            let code = row.required("REG")?;
            writer.write_row(vec![
                regions.resolve(&[code])?.into(),
                code.into(),
                row.get("NCCENR").into(),
                row.get("TNCC").into(),
                commune_fk(&mut communes, row.get("CHEFLIEU"))?,
            ])?;
        }

        let staged = writer.finish()?;
        ctx.complete(self.name(), vec![regions, communes], vec![staged], 0)
    }
}
