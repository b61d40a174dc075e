//! Legislative constituencies, from the Sciences Po GeoJSON contours.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::info;

use super::{CIRCONSCRIPTIONS_LEGISLATIVES_REGISTRY, DEPARTEMENTS_REGISTRY};
use crate::config::Config;
use crate::constants::{
    interieur_to_departement, CIRCONSCRIPTIONS_LEGISLATIVES, DEPARTEMENTS,
    FRANCAIS_ETRANGER_CIRCONSCRIPTIONS,
};
use crate::error::{DataError, Result};
use crate::geometry::geojson_to_multipolygon_hex;
use crate::output::Cell;
use crate::pipeline::{Task, TaskContext, TaskReport};
use crate::registry::{Mode, RegistrySpec};

const COLUMNS: [&str; 4] = ["id", "code", "departement_id", "geometry"];

/// Overseas collectivities with constituencies but no department
static NON_DEPARTEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^9(?:7[57]|8\d)$").expect("static regex"));

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: Properties,
    #[serde(default)]
    geometry: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    code_dpt: String,
    num_circ: Value,
}

struct Circonscription {
    code: String,
    departement: Option<String>,
    geometry: Option<String>,
}

pub struct CirconscriptionsLegislativesTask;

impl Task for CirconscriptionsLegislativesTask {
    fn name(&self) -> &'static str {
        CIRCONSCRIPTIONS_LEGISLATIVES
    }

    fn task_deps(&self) -> &'static [&'static str] {
        &[DEPARTEMENTS]
    }

    fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.source_path(&config.sources.circonscriptions_legislatives)]
    }

    fn targets(&self, config: &Config) -> Vec<PathBuf> {
        vec![config.output_path(CIRCONSCRIPTIONS_LEGISLATIVES)]
    }

    fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
        vec![
            (CIRCONSCRIPTIONS_LEGISLATIVES_REGISTRY, Mode::ReadWrite),
            (DEPARTEMENTS_REGISTRY, Mode::ReadOnly),
        ]
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut circonscriptions =
            ctx.registry(CIRCONSCRIPTIONS_LEGISLATIVES_REGISTRY, Mode::ReadWrite)?;
        let mut departements = ctx.registry(DEPARTEMENTS_REGISTRY, Mode::ReadOnly)?;

        let path = ctx.source_path(&ctx.config.sources.circonscriptions_legislatives);
        let file = File::open(&path).map_err(|source| DataError::SourceUnavailable {
            path: path.clone(),
            source,
        })?;
        let collection: FeatureCollection = serde_json::from_reader(BufReader::new(file))?;

        let mut rows = collection
            .features
            .into_iter()
            .enumerate()
            .map(|(i, feature)| parse_feature(i + 1, feature))
            .collect::<Result<Vec<_>>>()?;
        // IDs are allocated in code order, independently of the file's feature order
        rows.sort_by(|a, b| a.code.cmp(&b.code));

        let mut writer = ctx.table_writer(CIRCONSCRIPTIONS_LEGISLATIVES, &COLUMNS)?;
        for row in &rows {
            let departement: Cell = match &row.departement {
                Some(code) => departements.resolve(&[code.as_str()])?.into(),
                None => Cell::Null,
            };
            writer.write_row(vec![
                circonscriptions.resolve(&[row.code.as_str()])?.into(),
                row.code.as_str().into(),
                departement,
                row.geometry.clone().map_or(Cell::Null, Cell::Text),
            ])?;
        }

        for num in 1..=FRANCAIS_ETRANGER_CIRCONSCRIPTIONS {
            let code = format!("99-{:02}", num);
            writer.write_row(vec![
                circonscriptions.resolve(&[code.as_str()])?.into(),
                code.into(),
                Cell::Null,
                Cell::Null,
            ])?;
        }
        info!(
            "🗳️  {} legislative constituencies ({} abroad)",
            writer.rows(),
            FRANCAIS_ETRANGER_CIRCONSCRIPTIONS
        );

        let staged = writer.finish()?;
        ctx.complete(
            self.name(),
            vec![circonscriptions, departements],
            vec![staged],
            0,
        )
    }
}

fn parse_feature(index: usize, feature: Feature) -> Result<Circonscription> {
    let malformed = |message: String| {
        DataError::malformed(CIRCONSCRIPTIONS_LEGISLATIVES, index as u64, message)
    };

    let num = match &feature.properties.num_circ {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return Err(malformed(format!("invalid num_circ {}", other))),
    };
    if num.is_empty() {
        return Err(malformed("empty num_circ".to_string()));
    }

    let departement = interieur_to_departement(feature.properties.code_dpt.trim());
    let code = format!("{}-{:0>2}", departement, num);
    let departement = if NON_DEPARTEMENT.is_match(departement) {
        None
    } else {
        Some(departement.to_string())
    };

    let geometry = match &feature.geometry {
        Some(geometry) => Some(
            geojson_to_multipolygon_hex(geometry)
                .map_err(|e| malformed(format!("{} ({})", e, code)))?,
        ),
        None => None,
    };

    Ok(Circonscription {
        code,
        departement,
        geometry,
    })
}
