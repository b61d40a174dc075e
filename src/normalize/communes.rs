//! Communes table: the commune register enriched from three auxiliary extracts
//! (geometry, population, town halls), each sorted by the same ordering key as
//! the register and merged in a single pass.

use std::path::PathBuf;
use tracing::info;

use super::{
    commune_fk, commune_ordering_key, optional_fk, COMMUNES_REGISTRY, DEPARTEMENTS_REGISTRY,
    EPCI_REGISTRY,
};
use crate::config::Config;
use crate::constants::{COMMUNES, COMMUNE_IDS_TASK, DEPARTEMENTS, EPCI};
use crate::error::Result;
use crate::geometry::to_multipolygon_hex;
use crate::merge::MergeJoiner;
use crate::output::Cell;
use crate::pipeline::{Task, TaskContext, TaskReport};
use crate::registry::{Mode, RegistrySpec};

const COLUMNS: [&str; 19] = [
    "id",
    "code",
    "type",
    "nom",
    "type_nom",
    "population_municipale",
    "population_cap",
    "departement_id",
    "commune_parent_id",
    "epci_id",
    "geometry",
    "mairie_adresse",
    "mairie_accessibilite",
    "mairie_accessibilite_details",
    "mairie_localisation",
    "mairie_horaires",
    "mairie_email",
    "mairie_telephone",
    "mairie_site",
];

const REGISTER_COLUMNS: [&str; 7] = [
    "type",
    "code",
    "nom",
    "type_nom",
    "code_departement",
    "commune_parent",
    "epci",
];
const GEOMETRY_COLUMNS: [&str; 3] = ["type", "code", "geometry"];
const POPULATION_COLUMNS: [&str; 4] = ["type", "code", "population_municipale", "population_cap"];
const MAIRIE_COLUMNS: [&str; 10] = [
    "type",
    "code",
    "adresse",
    "accessibilite",
    "accessibilite_details",
    "localisation",
    "horaires",
    "email",
    "telephone",
    "site",
];

/// Plain text town-hall fields, copied as is (empty string when no town hall)
const MAIRIE_TEXT_FIELDS: [&str; 3] = ["adresse", "accessibilite", "accessibilite_details"];
const MAIRIE_CONTACT_FIELDS: [&str; 3] = ["email", "telephone", "site"];
const NO_HORAIRES: &str = "[]";

pub struct CommunesTask;

impl Task for CommunesTask {
    fn name(&self) -> &'static str {
        COMMUNES
    }

    fn task_deps(&self) -> &'static [&'static str] {
        &[DEPARTEMENTS, EPCI, COMMUNE_IDS_TASK]
    }

    fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
        let s = &config.sources;
        [&s.communes, &s.communes_geometrie, &s.communes_population, &s.mairies]
            .into_iter()
            .map(|f| config.source_path(f))
            .collect()
    }

    fn targets(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.output_path(COMMUNES)]
    }

    fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
        vec![
            (COMMUNES_REGISTRY, Mode::ReadOnly),
            (DEPARTEMENTS_REGISTRY, Mode::ReadOnly),
            (EPCI_REGISTRY, Mode::ReadOnly),
        ]
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        // every (type, code) of the register was allocated by the commune_ids task
        let mut communes = ctx.registry(COMMUNES_REGISTRY, Mode::ReadOnly)?;
        let mut departements = ctx.registry(DEPARTEMENTS_REGISTRY, Mode::ReadOnly)?;
        let mut epci = ctx.registry(EPCI_REGISTRY, Mode::ReadOnly)?;

        let sources = &ctx.config.sources;
        let register = ctx.source(COMMUNES, &sources.communes, &REGISTER_COLUMNS)?;
        let mut geometries = MergeJoiner::new(
            "geometrie",
            ctx.source("communes_geometrie", &sources.communes_geometrie, &GEOMETRY_COLUMNS)?
                .rows(),
            commune_ordering_key,
        );
        let mut populations = MergeJoiner::new(
            "population",
            ctx.source("communes_population", &sources.communes_population, &POPULATION_COLUMNS)?
                .rows(),
            commune_ordering_key,
        );
        let mut mairies = MergeJoiner::new(
            "mairies",
            ctx.source("mairies", &sources.mairies, &MAIRIE_COLUMNS)?.rows(),
            commune_ordering_key,
        );

        let mut writer = ctx.table_writer(COMMUNES, &COLUMNS)?;
        let mut matched = [0usize; 3];

        for row in register.rows() {
            let row = row?;
            let key = commune_ordering_key(&row)?;
            let commune_type = row.required("type")?;
            let code = row.required("code")?;

            let mut cells: Vec<Cell> = Vec::with_capacity(COLUMNS.len());
            cells.push(communes.resolve(&[commune_type, code])?.into());
            cells.push(code.into());
            cells.push(commune_type.into());
            cells.push(row.get("nom").into());
            cells.push(row.get("type_nom").into());

            let population = populations.advance_to(&key)?;
            matched[1] += usize::from(population.is_some());
            cells.push(Cell::or_null(population.map(|p| p.get("population_municipale"))));
            cells.push(Cell::or_null(population.map(|p| p.get("population_cap"))));

            cells.push(optional_fk(&mut departements, row.get("code_departement"))?);
            cells.push(commune_fk(&mut communes, row.get("commune_parent"))?);
            cells.push(optional_fk(&mut epci, row.get("epci"))?);

            let geometry = match geometries.advance_to(&key)? {
                Some(g) => {
                    matched[0] += 1;
                    to_multipolygon_hex(g.get("geometry"))
                        .map_err(|e| g.malformed(e.to_string()))?
                }
                None => None,
            };
            cells.push(geometry.map_or(Cell::Null, Cell::Text));

            match mairies.advance_to(&key)? {
                Some(mairie) => {
                    matched[2] += 1;
                    for field in MAIRIE_TEXT_FIELDS {
                        cells.push(mairie.get(field).into());
                    }
                    cells.push(Cell::or_null(mairie.opt("localisation")));
                    cells.push(mairie.opt("horaires").unwrap_or(NO_HORAIRES).into());
                    for field in MAIRIE_CONTACT_FIELDS {
                        cells.push(mairie.get(field).into());
                    }
                }
                None => {
                    cells.extend(MAIRIE_TEXT_FIELDS.iter().map(|_| Cell::from("")));
                    cells.push(Cell::Null);
                    cells.push(NO_HORAIRES.into());
                    cells.extend(MAIRIE_CONTACT_FIELDS.iter().map(|_| Cell::from("")));
                }
            }

            writer.write_row(cells)?;
        }

        info!(
            "🗺️  {} communes: {} geometries, {} populations, {} town halls matched",
            writer.rows(),
            matched[0],
            matched[1],
            matched[2]
        );
        let staged = writer.finish()?;
        ctx.complete(self.name(), vec![communes, departements, epci], vec![staged], 0)
    }
}
