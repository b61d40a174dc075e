//! Postal codes and their correspondence with communes.
//!
//! La Poste lists one row per (INSEE code, postal code, locality); only the
//! distinct (INSEE code, postal code) pairs matter here.

use indexmap::IndexSet;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

use super::{commune_types, read_commune_register, CODES_POSTAUX_REGISTRY, COMMUNES_REGISTRY};
use crate::config::Config;
use crate::constants::{fix_insee_code, CODES_POSTAUX, CODES_POSTAUX_COMMUNES, COMMUNES};
use crate::error::Result;
use crate::pipeline::{Task, TaskContext, TaskReport};
use crate::registry::{Mode, RegistrySpec};

const INSEE_COLUMN: &str = "Code_commune_INSEE";
const POSTAL_COLUMN: &str = "Code_postal";

pub struct CodesPostauxTask;

impl Task for CodesPostauxTask {
    fn name(&self) -> &'static str {
        CODES_POSTAUX
    }

    fn task_deps(&self) -> &'static [&'static str] {
        &[COMMUNES]
    }

    fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
        vec![
            config.source_path(&config.sources.codes_postaux),
            config.source_path(&config.sources.communes),
        ]
    }

    fn targets(&self, config: &Config) -> Vec<PathBuf> {
        vec![
            config.output_path(CODES_POSTAUX),
            config.output_path(CODES_POSTAUX_COMMUNES),
        ]
    }

    fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
        vec![
            (CODES_POSTAUX_REGISTRY, Mode::ReadWrite),
            (COMMUNES_REGISTRY, Mode::ReadOnly),
        ]
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut codes_postaux = ctx.registry(CODES_POSTAUX_REGISTRY, Mode::ReadWrite)?;
        let mut communes = ctx.registry(COMMUNES_REGISTRY, Mode::ReadOnly)?;
        let types = commune_types(&read_commune_register(ctx)?)?;

        let source = ctx.source(
            CODES_POSTAUX,
            &ctx.config.sources.codes_postaux,
            &[INSEE_COLUMN, POSTAL_COLUMN],
        )?;
        let mut pairs: IndexSet<(String, String)> = IndexSet::new();
        for row in source.rows() {
            let row = row?;
            let insee = fix_insee_code(row.required(INSEE_COLUMN)?);
            let postal = row.required(POSTAL_COLUMN)?;
            pairs.insert((insee.to_string(), postal.to_string()));
        }

        let mut codes_writer = ctx.table_writer(CODES_POSTAUX, &["id", "code"])?;
        let mut seen: HashSet<&str> = HashSet::new();
        for (_, postal) in &pairs {
            if seen.insert(postal.as_str()) {
                codes_writer.write_row(vec![
                    codes_postaux.resolve(&[postal.as_str()])?.into(),
                    postal.as_str().into(),
                ])?;
            }
        }

        let mut links_writer =
            ctx.table_writer(CODES_POSTAUX_COMMUNES, &["codepostal_id", "commune_id"])?;
        let mut filtered = 0usize;
        for (insee, postal) in &pairs {
            let Some(commune_type) = types.get(insee) else {
                filtered += 1;
                continue;
            };
            links_writer.write_row(vec![
                codes_postaux.resolve(&[postal.as_str()])?.into(),
                communes.resolve(&[commune_type.as_str(), insee.as_str()])?.into(),
            ])?;
        }
        if filtered > 0 {
            warn!(
                "{} postal code pairs reference an INSEE code missing from the commune register",
                filtered
            );
        }
        info!(
            "📮 {} postal codes, {} commune links",
            codes_writer.rows(),
            links_writer.rows()
        );

        let staged = vec![codes_writer.finish()?, links_writer.finish()?];
        ctx.complete(self.name(), vec![codes_postaux, communes], staged, filtered)
    }
}
