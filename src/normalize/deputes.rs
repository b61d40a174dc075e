//! Members of the Assemblée nationale with their current group and party.

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

use super::{CIRCONSCRIPTIONS_LEGISLATIVES_REGISTRY, DEPUTES_REGISTRY};
use crate::config::Config;
use crate::constants::{CIRCONSCRIPTIONS_LEGISLATIVES, DEPUTES};
use crate::error::Result;
use crate::output::Cell;
use crate::pipeline::{Task, TaskContext, TaskReport};
use crate::registry::{Mode, RegistrySpec};

const COLUMNS: [&str; 14] = [
    "id",
    "circonscription_id",
    "code",
    "nom",
    "prenom",
    "sexe",
    "date_naissance",
    "legislature",
    "date_debut_mandat",
    "groupe",
    "parti",
    "date_fin_mandat",
    "relation",
    "profession",
];

const DEPUTES_COLUMNS: [&str; 9] = [
    "code",
    "nom",
    "prenom",
    "sexe",
    "date_naissance",
    "legislature",
    "date_debut_mandat",
    "date_fin_mandat",
    "circonscription",
];

/// Current group membership of one deputy
struct Membership {
    groupe: String,
    relation: String,
}

pub struct DeputesTask;

impl Task for DeputesTask {
    fn name(&self) -> &'static str {
        DEPUTES
    }

    fn task_deps(&self) -> &'static [&'static str] {
        &[CIRCONSCRIPTIONS_LEGISLATIVES]
    }

    fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
        let sources = &config.sources;
        [
            &sources.deputes,
            &sources.groupes,
            &sources.partis,
            &sources.deputes_groupes,
            &sources.deputes_partis,
        ]
        .into_iter()
        .map(|file_name| config.source_path(file_name))
        .collect()
    }

    fn targets(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.output_path(DEPUTES)]
    }

    fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
        vec![
            (DEPUTES_REGISTRY, Mode::ReadWrite),
            (CIRCONSCRIPTIONS_LEGISLATIVES_REGISTRY, Mode::ReadOnly),
        ]
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut deputes = ctx.registry(DEPUTES_REGISTRY, Mode::ReadWrite)?;
        let mut circonscriptions =
            ctx.registry(CIRCONSCRIPTIONS_LEGISLATIVES_REGISTRY, Mode::ReadOnly)?;
        let sources = &ctx.config.sources;

        let groupes = read_labels(ctx, "groupes", &sources.groupes)?;
        let partis = read_labels(ctx, "partis", &sources.partis)?;

        let mut memberships: HashMap<String, Membership> = HashMap::new();
        let source = ctx.source(
            "deputes_groupes",
            &sources.deputes_groupes,
            &["code_depute", "code", "relation", "date_fin"],
        )?;
        for row in source.rows() {
            let row = row?;
            if row.opt("date_fin").is_some() {
                continue;
            }
            let membership = Membership {
                groupe: groupes.get(row.get("code")).cloned().unwrap_or_default(),
                relation: row.get("relation").to_string(),
            };
            let code_depute = row.required("code_depute")?.to_string();
            // président ("P") sorts after membre ("M"); equal relations keep the later row
            match memberships.get_mut(&code_depute) {
                Some(existing) if existing.relation > membership.relation => {}
                Some(existing) => *existing = membership,
                None => {
                    memberships.insert(code_depute, membership);
                }
            }
        }

        let mut affiliations: HashMap<String, String> = HashMap::new();
        let source = ctx.source(
            "deputes_partis",
            &sources.deputes_partis,
            &["code_depute", "code", "date_fin"],
        )?;
        for row in source.rows() {
            let row = row?;
            if row.opt("date_fin").is_some() {
                continue;
            }
            affiliations.insert(
                row.required("code_depute")?.to_string(),
                partis.get(row.get("code")).cloned().unwrap_or_default(),
            );
        }

        let source = ctx.source(DEPUTES, &sources.deputes, &DEPUTES_COLUMNS)?;
        let mut writer = ctx.table_writer(DEPUTES, &COLUMNS)?;
        for row in source.rows() {
            let row = row?;
            let code = row.required("code")?;
            let membership = memberships.get(code);

            let mut cells: Vec<Cell> = vec![
                deputes.resolve(&[code])?.into(),
                circonscriptions
                    .resolve(&[row.required("circonscription")?])?
                    .into(),
            ];
            cells.extend(DEPUTES_COLUMNS[..7].iter().map(|c| Cell::from(row.get(c))));
            cells.push(membership.map_or("", |m| m.groupe.as_str()).into());
            cells.push(affiliations.get(code).map_or("", String::as_str).into());
            cells.push(Cell::or_null(row.opt("date_fin_mandat")));
            cells.push(membership.map_or("", |m| m.relation.as_str()).into());
            cells.push(Cell::Null);
            writer.write_row(cells)?;
        }
        info!(
            "🏛️  {} deputies, {} with a current group",
            writer.rows(),
            memberships.len()
        );

        let staged = writer.finish()?;
        ctx.complete(
            self.name(),
            vec![deputes, circonscriptions],
            vec![staged],
            0,
        )
    }
}

/// `code → "<nom> (<sigle>)"` for groups or parties
fn read_labels(ctx: &TaskContext, name: &str, file_name: &str) -> Result<HashMap<String, String>> {
    let mut labels = HashMap::new();
    for row in ctx.source(name, file_name, &["code", "nom", "sigle"])?.rows() {
        let row = row?;
        labels.insert(
            row.required("code")?.to_string(),
            format!("{} ({})", row.get("nom"), row.get("sigle")),
        );
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::normalize::test_support::Workspace;
    use pretty_assertions::assert_eq;

    fn setup(deputes: &str) -> Workspace {
        let ws = Workspace::new();
        let sources = ws.config.sources.clone();
        ws.source(
            &sources.deputes,
            &format!(
                "code,nom,prenom,sexe,date_naissance,legislature,date_debut_mandat,date_fin_mandat,circonscription\n{}",
                deputes
            ),
        );
        ws.source(
            &sources.groupes,
            "code,nom,sigle\nG1,Renaissance,RE\nG2,Les Républicains,LR\n",
        );
        ws.source(&sources.partis, "code,nom,sigle\nP1,Parti A,PA\nP2,Parti B,PB\n");
        ws.source(
            &sources.deputes_groupes,
            "code_depute,code,relation,date_fin\n\
             PA1,G2,M,2020-01-01\n\
             PA1,G1,P,\n\
             PA1,G1,M,\n\
             PA2,G2,M,\n\
             PA2,G9,M,\n",
        );
        ws.source(
            &sources.deputes_partis,
            "code_depute,code,date_fin\nPA1,P1,\nPA1,P2,2019-05-01\nPA2,P1,\nPA2,P2,\n",
        );
        ws.registry("circonscriptions_legislatives", "code,id\n01-01,0\n01-02,1\n");
        ws
    }

    #[test]
    fn test_current_affiliations() {
        let ws = setup(
            "PA1,Dupont,Marie,F,1962-04-01,16,2022-06-22,,01-01\n\
             PA2,Durand,Paul,M,1970-01-01,16,2022-06-22,2023-01-01,01-02\n\
             PA3,Martin,Luc,M,1980-05-05,16,2022-06-22,,01-02\n",
        );
        DeputesTask.run(&ws.ctx()).unwrap();

        assert_eq!(
            ws.output(DEPUTES),
            "id,circonscription_id,code,nom,prenom,sexe,date_naissance,legislature,date_debut_mandat,groupe,parti,date_fin_mandat,relation,profession\n\
             0,0,PA1,Dupont,Marie,F,1962-04-01,16,2022-06-22,Renaissance (RE),Parti A (PA),\\N,P,\\N\n\
             1,1,PA2,Durand,Paul,M,1970-01-01,16,2022-06-22,,Parti B (PB),2023-01-01,M,\\N\n\
             2,1,PA3,Martin,Luc,M,1980-05-05,16,2022-06-22,,,\\N,,\\N\n"
        );
        assert_eq!(ws.read_registry("deputes"), "code,id\nPA1,0\nPA2,1\nPA3,2\n");
    }

    #[test]
    fn test_unknown_constituency_is_fatal() {
        let ws = setup("PA1,Dupont,Marie,F,1962-04-01,16,2022-06-22,,02-01\n");
        let err = DeputesTask.run(&ws.ctx()).unwrap_err();
        assert!(matches!(err, DataError::UnknownKey { .. }));
        assert!(!ws.output_exists(DEPUTES));
        assert!(!ws.store.path("deputes").exists());
    }
}
