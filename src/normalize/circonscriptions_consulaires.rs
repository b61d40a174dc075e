//! Consular constituencies, from the list annexed to the ministerial order.

use std::path::PathBuf;

use super::CIRCONSCRIPTIONS_CONSULAIRES_REGISTRY;
use crate::config::Config;
use crate::constants::CIRCONSCRIPTIONS_CONSULAIRES;
use crate::error::Result;
use crate::output::Cell;
use crate::pipeline::{Task, TaskContext, TaskReport};
use crate::registry::{Mode, RegistrySpec};

const COLUMNS: [&str; 4] = ["id", "nom", "consulats", "nombre_conseillers"];

pub struct CirconscriptionsConsulairesTask;

impl Task for CirconscriptionsConsulairesTask {
    fn name(&self) -> &'static str {
        CIRCONSCRIPTIONS_CONSULAIRES
    }

    fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.source_path(&config.sources.circonscriptions_consulaires)]
    }

    fn targets(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.output_path(CIRCONSCRIPTIONS_CONSULAIRES)]
    }

    fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
        vec![(CIRCONSCRIPTIONS_CONSULAIRES_REGISTRY, Mode::ReadWrite)]
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut circonscriptions =
            ctx.registry(CIRCONSCRIPTIONS_CONSULAIRES_REGISTRY, Mode::ReadWrite)?;
        let source = ctx.delimited_source(
            CIRCONSCRIPTIONS_CONSULAIRES,
            &ctx.config.sources.circonscriptions_consulaires,
            b';',
            &["nom", "consulats", "nombre_conseillers"],
        )?;
        let mut writer = ctx.table_writer(CIRCONSCRIPTIONS_CONSULAIRES, &COLUMNS)?;

        for row in source.rows() {
            let row = row?;
            let nom = row.required("nom")?;
            let conseillers = row.required("nombre_conseillers")?;
            let conseillers: i64 = conseillers.parse().map_err(|_| {
                row.malformed(format!("nombre_conseillers '{}' is not an integer", conseillers))
            })?;

            writer.write_row(vec![
                circonscriptions.resolve(&[nom])?.into(),
                nom.into(),
                consulats_array(row.get("consulats")).into(),
                Cell::Int(conseillers),
            ])?;
        }

        let staged = writer.finish()?;
        ctx.complete(self.name(), vec![circonscriptions], vec![staged], 0)
    }
}

/// `Berlin/Munich` as the array literal `{"Berlin", "Munich"}`
fn consulats_array(consulats: &str) -> String {
    let items: Vec<String> = consulats
        .split('/')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("\"{}\"", c))
        .collect();
    format!("{{{}}}", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::normalize::test_support::Workspace;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_consulats_array() {
        assert_eq!(consulats_array("Berlin/Munich"), r#"{"Berlin", "Munich"}"#);
        assert_eq!(consulats_array("Dakar"), r#"{"Dakar"}"#);
        assert_eq!(consulats_array(""), "{}");
    }

    #[test]
    fn test_consular_constituencies() {
        let ws = Workspace::new();
        ws.source(
            &ws.config.sources.circonscriptions_consulaires,
            "nom;consulats;nombre_conseillers\nAllemagne;Berlin/Munich;9\nSénégal;Dakar;3\n",
        );

        CirconscriptionsConsulairesTask.run(&ws.ctx()).unwrap();
        assert_eq!(
            ws.output(CIRCONSCRIPTIONS_CONSULAIRES),
            "id,nom,consulats,nombre_conseillers\n\
             0,Allemagne,\"{\"\"Berlin\"\", \"\"Munich\"\"}\",9\n\
             1,Sénégal,\"{\"\"Dakar\"\"}\",3\n"
        );
        assert_eq!(
            ws.read_registry("circonscriptions_consulaires"),
            "nom,id\nAllemagne,0\nSénégal,1\n"
        );
    }

    #[test]
    fn test_non_integer_councillor_count_is_malformed() {
        let ws = Workspace::new();
        ws.source(
            &ws.config.sources.circonscriptions_consulaires,
            "nom;consulats;nombre_conseillers\nAllemagne;Berlin;neuf\n",
        );

        let err = CirconscriptionsConsulairesTask.run(&ws.ctx()).unwrap_err();
        assert!(matches!(err, DataError::MalformedInput { line: 2, .. }));
    }
}
