//! Seeds the communes registry from the commune register.
//!
//! Regions and departments reference their chef-lieu commune while communes
//! reference their department. Allocating every commune ID first lets both
//! sides resolve read-only.

use std::path::PathBuf;
use tracing::info;

use super::{commune_ordering_key, COMMUNES_REGISTRY};
use crate::config::Config;
use crate::constants::{COMMUNES, COMMUNE_IDS_TASK};
use crate::error::Result;
use crate::pipeline::{Task, TaskContext, TaskReport};
use crate::registry::{Mode, RegistrySpec};

pub struct CommuneIdsTask;

impl Task for CommuneIdsTask {
    fn name(&self) -> &'static str {
        COMMUNE_IDS_TASK
    }

    fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.source_path(&config.sources.communes)]
    }

    fn targets(&self, _config: &Config) -> Vec<PathBuf> {
        Vec::new()
    }

    fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
        vec![(COMMUNES_REGISTRY, Mode::ReadWrite)]
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut communes = ctx.registry(COMMUNES_REGISTRY, Mode::ReadWrite)?;
        let source = ctx.source(COMMUNES, &ctx.config.sources.communes, &["type", "code"])?;

        let mut seen = 0usize;
        for row in source.rows() {
            let row = row?;
            // rejects unknown types before they get an ID
            commune_ordering_key(&row)?;
            communes.resolve(&[row.required("type")?, row.required("code")?])?;
            seen += 1;
        }
        info!(
            "🏘️  {} communes in the register, {} new ids",
            seen,
            communes.allocated()
        );

        ctx.complete(self.name(), vec![communes], Vec::new(), 0)
    }
}
