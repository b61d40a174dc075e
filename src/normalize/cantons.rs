use std::path::PathBuf;

use super::{commune_fk, CANTONS_REGISTRY, COMMUNES_REGISTRY, DEPARTEMENTS_REGISTRY};
use crate::config::Config;
use crate::constants::{CANTONS, COMMUNES, DEPARTEMENTS};
use crate::error::Result;
use crate::output::Cell;
use crate::pipeline::{Task, TaskContext, TaskReport};
use crate::registry::{Mode, RegistrySpec};

const COLUMNS: [&str; 8] = [
    "id",
    "code",
    "type",
    "composition",
    "nom",
    "type_nom",
    "departement_id",
    "bureau_centralisateur_id",
];

const SOURCE_COLUMNS: [&str; 7] = [
    "code",
    "type",
    "composition",
    "nom",
    "type_nom",
    "departement",
    "bureau_centralisateur",
];

/// Cantons and pseudo-cantons, with their central office commune
pub struct CantonsTask;

impl Task for CantonsTask {
    fn name(&self) -> &'static str {
        CANTONS
    }

    fn task_deps(&self) -> &'static [&'static str] {
        &[COMMUNES, DEPARTEMENTS]
    }

    fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.source_path(&config.sources.cantons)]
    }

    fn targets(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.output_path(CANTONS)]
    }

    fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
        vec![
            (CANTONS_REGISTRY, Mode::ReadWrite),
            (COMMUNES_REGISTRY, Mode::ReadOnly),
            (DEPARTEMENTS_REGISTRY, Mode::ReadOnly),
        ]
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut cantons = ctx.registry(CANTONS_REGISTRY, Mode::ReadWrite)?;
        let mut communes = ctx.registry(COMMUNES_REGISTRY, Mode::ReadOnly)?;
        let mut departements = ctx.registry(DEPARTEMENTS_REGISTRY, Mode::ReadOnly)?;
        let source = ctx.source(CANTONS, &ctx.config.sources.cantons, &SOURCE_COLUMNS)?;
        let mut writer = ctx.table_writer(CANTONS, &COLUMNS)?;

        for row in source.rows() {
            let row = row?;
            let code = row.required("code")?;
            writer.write_row(vec![
                cantons.resolve(&[code])?.into(),
                code.into(),
                row.get("type").into(),
                Cell::or_null(row.opt("composition")),
                row.get("nom").into(),
                row.get("type_nom").into(),
                departements.resolve(&[row.required("departement")?])?.into(),
                commune_fk(&mut communes, row.get("bureau_centralisateur"))?,
            ])?;
        }

        let staged = writer.finish()?;
        ctx.complete(
            self.name(),
            vec![cantons, communes, departements],
            vec![staged],
            0,
        )
    }
}
