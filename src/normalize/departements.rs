use std::path::PathBuf;

use super::{commune_fk, COMMUNES_REGISTRY, DEPARTEMENTS_REGISTRY, REGIONS_REGISTRY};
use crate::config::Config;
use crate::constants::{COMMUNE_IDS_TASK, DEPARTEMENTS, REGIONS};
use crate::error::Result;
use crate::pipeline::{Task, TaskContext, TaskReport};
use crate::registry::{Mode, RegistrySpec};

const COLUMNS: [&str; 6] = ["id", "code", "nom", "type_nom", "chef_lieu_id", "region_id"];

pub struct DepartementsTask;

impl Task for DepartementsTask {
    fn name(&self) -> &'static str {
        DEPARTEMENTS
    }

    fn task_deps(&self) -> &'static [&'static str] {
        &[REGIONS, COMMUNE_IDS_TASK]
    }

    fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.source_path(&config.sources.departements)]
    }

    fn targets(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.output_path(DEPARTEMENTS)]
    }

    fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
        vec![
            (DEPARTEMENTS_REGISTRY, Mode::ReadWrite),
            (REGIONS_REGISTRY, Mode::ReadOnly),
            (COMMUNES_REGISTRY, Mode::ReadOnly),
        ]
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut departements = ctx.registry(DEPARTEMENTS_REGISTRY, Mode::ReadWrite)?;
        let mut regions = ctx.registry(REGIONS_REGISTRY, Mode::ReadOnly)?;
        let mut communes = ctx.registry(COMMUNES_REGISTRY, Mode::ReadOnly)?;
        let source = ctx.source(
            DEPARTEMENTS,
            &ctx.config.sources.departements,
            &["DEP", "REG", "CHEFLIEU", "TNCC", "NCCENR"],
        )?;
        let mut writer = ctx.table_writer(DEPARTEMENTS, &COLUMNS)?;

        for row in source.rows() {
            let row = row?;
            let code = row.required("DEP")?;
            writer.write_row(vec![
                departements.resolve(&[code])?.into(),
                code.into(),
                row.get("NCCENR").into(),
                row.get("TNCC").into(),
                commune_fk(&mut communes, row.get("CHEFLIEU"))?,
                regions.resolve(&[row.required("REG")?])?.into(),
            ])?;
        }

        let staged = writer.finish()?;
        ctx.complete(
            self.name(),
            vec![departements, regions, communes],
            vec![staged],
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::test_support::Workspace;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_departements_reference_region_and_chef_lieu() {
        let ws = Workspace::new();
        ws.source(
            &ws.config.sources.departements,
            "DEP,REG,CHEFLIEU,TNCC,NCCENR\n01,84,01053,5,Ain\n2A,94,2A004,3,Corse-du-Sud\n",
        );
        ws.registry("regions", "code,id\n84,0\n94,1\n");
        ws.registry("communes", "type,code,id\nCOM,01053,0\nCOM,2A004,1\n");
        ws.registry("departements", "code,id\n2A,0\n");

        let report = DepartementsTask.run(&ws.ctx()).unwrap();
        assert_eq!(report.ids_allocated, 1);
        assert_eq!(
            ws.output(DEPARTEMENTS),
            "id,code,nom,type_nom,chef_lieu_id,region_id\n1,01,Ain,5,0,0\n0,2A,Corse-du-Sud,3,1,1\n"
        );
    }

    #[test]
    fn test_unknown_region_is_fatal() {
        let ws = Workspace::new();
        ws.source(
            &ws.config.sources.departements,
            "DEP,REG,CHEFLIEU,TNCC,NCCENR\n01,84,01053,5,Ain\n",
        );
        ws.registry("communes", "type,code,id\nCOM,01053,0\n");

        assert!(DepartementsTask.run(&ws.ctx()).is_err());
        assert!(!ws.output_exists(DEPARTEMENTS));
    }
}
