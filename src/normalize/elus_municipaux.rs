//! Municipal councillors from the Répertoire national des élus.
//!
//! The register may list a councillor twice, once per mandate. One row is kept
//! per councillor, the one that carries the inter-communal function when there
//! is one, a presidency first.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

use super::{normalize_date, read_commune_register, COMMUNES_REGISTRY, ELUS_MUNICIPAUX_REGISTRY};
use crate::config::Config;
use crate::constants::{fix_insee_code, COMMUNES, ELUS_MUNICIPAUX};
use crate::domain::CommuneType;
use crate::error::Result;
use crate::output::Cell;
use crate::pipeline::{Task, TaskContext, TaskReport};
use crate::registry::{Id, Mode, RegistrySpec};
use crate::sources::SourceRow;

const SOURCE_COLUMNS: [&str; 15] = [
    "code",
    "nom",
    "prenom",
    "sexe",
    "date_naissance",
    "profession",
    "date_debut_mandat",
    "fonction",
    "ordre_fonction",
    "date_debut_fonction",
    "date_debut_mandat_epci",
    "fonction_epci",
    "date_debut_fonction_epci",
    "nationalite",
    "parrainage2017",
];

const COLUMNS: [&str; 16] = [
    "id",
    "commune_id",
    "nom",
    "prenom",
    "sexe",
    "date_naissance",
    "profession",
    "date_debut_mandat",
    "fonction",
    "ordre_fonction",
    "date_debut_fonction",
    "date_debut_mandat_epci",
    "fonction_epci",
    "date_debut_fonction_epci",
    "nationalite",
    "parrainage2017",
];

/// Columns written as NULL when empty; the others keep the empty string
const NULLABLE: [&str; 5] = [
    "profession",
    "ordre_fonction",
    "date_debut_fonction",
    "date_debut_mandat_epci",
    "date_debut_fonction_epci",
];
const OPTIONAL_DATES: [&str; 3] = [
    "date_debut_fonction",
    "date_debut_mandat_epci",
    "date_debut_fonction_epci",
];

/// Councillor identity: commune ID, nom, prenom, sexe, ISO birth date
type EluKey = (Id, String, String, String, String);

struct Elu {
    commune_id: Id,
    date_naissance: String,
    date_debut_mandat: String,
    row: SourceRow,
}

impl Elu {
    /// Preference among duplicate rows of one councillor
    fn priority(&self) -> u8 {
        let fonction_epci = self.row.get("fonction_epci");
        if fonction_epci.starts_with("Président") {
            2
        } else if !fonction_epci.is_empty() {
            1
        } else {
            0
        }
    }

    fn cells(&self, id: Id) -> Result<Vec<Cell>> {
        let mut cells = Vec::with_capacity(COLUMNS.len());
        cells.push(id.into());
        cells.push(self.commune_id.into());
        for column in &COLUMNS[2..] {
            let cell = match *column {
                "date_naissance" => self.date_naissance.as_str().into(),
                "date_debut_mandat" => self.date_debut_mandat.as_str().into(),
                c if OPTIONAL_DATES.contains(&c) => match self.row.opt(c) {
                    Some(value) => iso_date(&self.row, c, value)?.into(),
                    None => Cell::Null,
                },
                c if NULLABLE.contains(&c) => Cell::or_null(self.row.opt(c)),
                c => self.row.get(c).into(),
            };
            cells.push(cell);
        }
        Ok(cells)
    }
}

fn iso_date(row: &SourceRow, column: &str, value: &str) -> Result<String> {
    normalize_date(value)
        .ok_or_else(|| row.malformed(format!("invalid date '{}' in {}", value, column)))
}

pub struct ElusMunicipauxTask;

impl Task for ElusMunicipauxTask {
    fn name(&self) -> &'static str {
        ELUS_MUNICIPAUX
    }

    fn task_deps(&self) -> &'static [&'static str] {
        &[COMMUNES]
    }

    fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
        vec![
            config.source_path(&config.sources.elus_municipaux),
            config.source_path(&config.sources.communes),
        ]
    }

    fn targets(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.output_path(ELUS_MUNICIPAUX)]
    }

    fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
        vec![
            (ELUS_MUNICIPAUX_REGISTRY, Mode::ReadWrite),
            (COMMUNES_REGISTRY, Mode::ReadOnly),
        ]
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut elus = ctx.registry(ELUS_MUNICIPAUX_REGISTRY, Mode::ReadWrite)?;
        let mut communes = ctx.registry(COMMUNES_REGISTRY, Mode::ReadOnly)?;

        let full_communes: HashSet<String> = read_commune_register(ctx)?
            .iter()
            .filter(|row| row.get("type") == CommuneType::Com.as_str())
            .map(|row| row.get("code").to_string())
            .collect();

        let source = ctx.source(
            ELUS_MUNICIPAUX,
            &ctx.config.sources.elus_municipaux,
            &SOURCE_COLUMNS,
        )?;

        let mut kept: IndexMap<EluKey, Elu> = IndexMap::new();
        let mut filtered = 0usize;
        let mut duplicates = 0usize;
        for row in source.rows() {
            let row = row?;
            let code = fix_insee_code(row.required("code")?);
            // councillors of communes that no longer exist are dropped
            if !full_communes.contains(code) {
                filtered += 1;
                continue;
            }

            let commune_id = communes.resolve(&[CommuneType::Com.as_str(), code])?;
            let date_naissance = iso_date(&row, "date_naissance", row.required("date_naissance")?)?;
            let date_debut_mandat =
                iso_date(&row, "date_debut_mandat", row.required("date_debut_mandat")?)?;
            let key = (
                commune_id,
                row.get("nom").to_string(),
                row.get("prenom").to_string(),
                row.get("sexe").to_string(),
                date_naissance.clone(),
            );
            let elu = Elu {
                commune_id,
                date_naissance,
                date_debut_mandat,
                row,
            };

            match kept.get_mut(&key) {
                Some(existing) => {
                    duplicates += 1;
                    if elu.priority() > existing.priority() {
                        *existing = elu;
                    }
                }
                None => {
                    kept.insert(key, elu);
                }
            }
        }

        let mut writer = ctx.table_writer(ELUS_MUNICIPAUX, &COLUMNS)?;
        for ((commune_id, nom, prenom, sexe, date_naissance), elu) in &kept {
            let commune_id = commune_id.to_string();
            let id = elus.resolve(&[
                commune_id.as_str(),
                nom.as_str(),
                prenom.as_str(),
                sexe.as_str(),
                date_naissance.as_str(),
            ])?;
            writer.write_row(elu.cells(id)?)?;
        }

        if filtered > 0 {
            warn!("{} councillors dropped: commune not in the register", filtered);
        }
        info!(
            "🧑‍💼 {} municipal councillors ({} duplicate rows merged)",
            writer.rows(),
            duplicates
        );

        let staged = writer.finish()?;
        ctx.complete(self.name(), vec![elus, communes], vec![staged], filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::normalize::test_support::Workspace;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "code,nom,prenom,sexe,date_naissance,profession,date_debut_mandat,fonction,ordre_fonction,date_debut_fonction,date_debut_mandat_epci,fonction_epci,date_debut_fonction_epci,nationalite,parrainage2017";

    fn setup(rows: &[&str]) -> Workspace {
        let ws = Workspace::new();
        ws.source(
            &ws.config.sources.communes,
            "type,code\nCOM,01001\nCOM,27058\nCOMD,01003\n",
        );
        ws.registry(
            "communes",
            "type,code,id\nCOM,01001,0\nCOM,27058,1\nCOMD,01003,2\n",
        );
        let mut content = format!("{}\n", HEADER);
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        ws.source(&ws.config.sources.elus_municipaux, &content);
        ws
    }

    fn output_rows(ws: &Workspace) -> Vec<Vec<String>> {
        let output = ws.output(ELUS_MUNICIPAUX);
        csv::Reader::from_reader(output.as_bytes())
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_councillor_row() {
        let ws = setup(&["01001,DUPONT,Marie,F,01/04/1962,,28/06/0020,Maire,,28/06/2020,,,,FR,"]);
        ElusMunicipauxTask.run(&ws.ctx()).unwrap();

        assert_eq!(
            output_rows(&ws),
            vec![vec![
                "0", "0", "DUPONT", "Marie", "F", "1962-04-01", "\\N", "2020-06-28", "Maire",
                "\\N", "2020-06-28", "\\N", "", "\\N", "FR", ""
            ]]
        );
        assert_eq!(
            ws.read_registry("elus_municipaux"),
            "commune_id,nom,prenom,sexe,date_naissance,id\n0,DUPONT,Marie,F,1962-04-01,0\n"
        );
    }

    #[test]
    fn test_president_row_wins_over_member_row() {
        let ws = setup(&[
            "01001,DUPONT,Marie,F,1962-04-01,,2020-06-28,Maire,,,,,,FR,",
            "01001,DUPONT,Marie,F,01/04/1962,,2020-06-28,Maire,,,2020-07-10,Membre,,FR,",
            "01001,DUPONT,Marie,F,1962-04-01,,2020-06-28,Maire,,,2020-07-10,Président du conseil communautaire,2020-07-15,FR,",
            "01001,DURAND,Paul,M,1970-01-01,,2020-06-28,Conseiller Municipal,,,2020-07-10,Membre,,FR,",
        ]);
        ElusMunicipauxTask.run(&ws.ctx()).unwrap();

        let rows = output_rows(&ws);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][2], "DUPONT");
        assert_eq!(rows[0][12], "Président du conseil communautaire");
        assert_eq!(rows[0][13], "2020-07-15");
        assert_eq!(rows[1][2], "DURAND");
    }

    #[test]
    fn test_epci_function_wins_over_plain_row() {
        let ws = setup(&[
            "01001,DUPONT,Marie,F,1962-04-01,,2020-06-28,Maire,,,,,,FR,",
            "01001,DUPONT,Marie,F,1962-04-01,,2020-06-28,Maire,,,2020-07-10,Vice-président,,FR,",
            "01001,DUPONT,Marie,F,1962-04-01,,2020-06-28,Maire,,,2020-07-10,Membre,,FR,",
        ]);
        ElusMunicipauxTask.run(&ws.ctx()).unwrap();

        let rows = output_rows(&ws);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][12], "Vice-président");
    }

    #[test]
    fn test_unknown_and_delegated_communes_are_filtered() {
        let ws = setup(&[
            "27676,MARTIN,Luc,M,1980-05-05,,2020-06-28,Maire,,,,,,FR,",
            "99999,NULLE,Part,M,1980-05-05,,2020-06-28,Maire,,,,,,FR,",
            "01003,DELEGUE,Jean,M,1980-05-05,,2020-06-28,Maire délégué,,,,,,FR,",
        ]);
        let report = ElusMunicipauxTask.run(&ws.ctx()).unwrap();

        let rows = output_rows(&ws);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], "1");
        assert_eq!(report.rows_filtered, 2);
    }

    #[test]
    fn test_bad_date_aborts_the_table() {
        let ws = setup(&[
            "01001,DUPONT,Marie,F,1962-04-01,,2020-06-28,Maire,,,,,,FR,",
            "01001,DURAND,Paul,M,31/02/1970,,2020-06-28,Maire,,,,,,FR,",
        ]);
        let err = ElusMunicipauxTask.run(&ws.ctx()).unwrap_err();
        assert!(matches!(err, DataError::MalformedInput { line: 3, .. }));
        assert!(!ws.output_exists(ELUS_MUNICIPAUX));
        assert!(!ws.store.path("elus_municipaux").exists());
    }
}
