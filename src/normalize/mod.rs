//! Entity normalizers, one [`Task`] per output table.
//!
//! Each normalizer reads its source extracts, resolves its own IDs in its
//! registry (read-write) and foreign keys in upstream registries (read-only),
//! and stages its output tables. Nothing is committed or published until the
//! whole source has been processed without error.

pub mod cantons;
pub mod circonscriptions_consulaires;
pub mod circonscriptions_legislatives;
pub mod codes_postaux;
pub mod commune_ids;
pub mod communes;
mod dates;
pub mod departements;
pub mod deputes;
pub mod elus_municipaux;
pub mod epci;
pub mod regions;

pub use dates::normalize_date;

use std::collections::HashMap;

use crate::constants;
use crate::domain::{CommuneType, OrderingKey};
use crate::error::Result;
use crate::output::Cell;
use crate::pipeline::{Task, TaskContext};
use crate::registry::{IdRegistry, RegistrySpec};
use crate::sources::SourceRow;

pub const REGIONS_REGISTRY: RegistrySpec = RegistrySpec::new(constants::REGIONS, &["code"]);
pub const DEPARTEMENTS_REGISTRY: RegistrySpec =
    RegistrySpec::new(constants::DEPARTEMENTS, &["code"]);
pub const EPCI_REGISTRY: RegistrySpec = RegistrySpec::new(constants::EPCI, &["code"]);
pub const COMMUNES_REGISTRY: RegistrySpec =
    RegistrySpec::new(constants::COMMUNES, &["type", "code"]);
pub const CODES_POSTAUX_REGISTRY: RegistrySpec =
    RegistrySpec::new(constants::CODES_POSTAUX, &["code"]);
pub const CANTONS_REGISTRY: RegistrySpec = RegistrySpec::new(constants::CANTONS, &["code"]);
pub const CIRCONSCRIPTIONS_CONSULAIRES_REGISTRY: RegistrySpec =
    RegistrySpec::new(constants::CIRCONSCRIPTIONS_CONSULAIRES, &["nom"]);
pub const CIRCONSCRIPTIONS_LEGISLATIVES_REGISTRY: RegistrySpec =
    RegistrySpec::new(constants::CIRCONSCRIPTIONS_LEGISLATIVES, &["code"]);
pub const ELUS_MUNICIPAUX_REGISTRY: RegistrySpec = RegistrySpec::new(
    constants::ELUS_MUNICIPAUX,
    &["commune_id", "nom", "prenom", "sexe", "date_naissance"],
);
pub const DEPUTES_REGISTRY: RegistrySpec = RegistrySpec::new(constants::DEPUTES, &["code"]);

/// Every normalizer, in declaration order
pub fn standard_tasks() -> Vec<Box<dyn Task>> {
    vec![
        Box::new(commune_ids::CommuneIdsTask),
        Box::new(epci::EpciTask),
        Box::new(regions::RegionsTask),
        Box::new(departements::DepartementsTask),
        Box::new(communes::CommunesTask),
        Box::new(codes_postaux::CodesPostauxTask),
        Box::new(cantons::CantonsTask),
        Box::new(circonscriptions_consulaires::CirconscriptionsConsulairesTask),
        Box::new(circonscriptions_legislatives::CirconscriptionsLegislativesTask),
        Box::new(elus_municipaux::ElusMunicipauxTask),
        Box::new(deputes::DeputesTask),
    ]
}

/// Ordering key of a row carrying `type` and `code` columns
pub(crate) fn commune_ordering_key(row: &SourceRow) -> Result<OrderingKey> {
    OrderingKey::from_fields(row.get("type"), row.get("code")).map_err(|m| row.malformed(m))
}

/// Resolve a single-column foreign key; an empty value is NULL
pub(crate) fn optional_fk(registry: &mut IdRegistry, code: &str) -> Result<Cell> {
    if code.is_empty() {
        return Ok(Cell::Null);
    }
    Ok(registry.resolve(&[code])?.into())
}

/// Resolve a reference to a full commune (`COM`) by its code; an empty code is NULL
pub(crate) fn commune_fk(communes: &mut IdRegistry, code: &str) -> Result<Cell> {
    if code.is_empty() {
        return Ok(Cell::Null);
    }
    Ok(communes.resolve(&[CommuneType::Com.as_str(), code])?.into())
}

/// Type of every code of the commune register. A code carried by several
/// types (a commune and its delegated commune) keeps the lowest-ranked one.
pub(crate) fn commune_types(rows: &[SourceRow]) -> Result<HashMap<String, CommuneType>> {
    let mut types: HashMap<String, CommuneType> = HashMap::with_capacity(rows.len());
    for row in rows {
        let commune_type: CommuneType = row.required("type")?.parse().map_err(|m| row.malformed(m))?;
        types
            .entry(row.required("code")?.to_string())
            .and_modify(|existing| {
                if commune_type < *existing {
                    *existing = commune_type;
                }
            })
            .or_insert(commune_type);
    }
    Ok(types)
}

/// Read the commune register's `type` and `code` columns
pub(crate) fn read_commune_register(ctx: &TaskContext) -> Result<Vec<SourceRow>> {
    ctx.source(
        constants::COMMUNES,
        &ctx.config.sources.communes,
        &["type", "code"],
    )?
    .read_all()
}
