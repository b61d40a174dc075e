//! Administrative commune types and the ordering key shared by every sorted source.
//!
//! The commune register, the geometry extract, the population extract and the
//! town-hall extract are all sorted by `(type rank, code)` with the fixed type
//! order `COM < ARM < COMA < COMD < <no type>`. The merge joiner relies on it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommuneType {
    /// Commune de plein exercice
    #[serde(rename = "COM")]
    Com,
    /// Arrondissement municipal (Paris, Lyon, Marseille)
    #[serde(rename = "ARM")]
    Arm,
    /// Commune associée
    #[serde(rename = "COMA")]
    Coma,
    /// Commune déléguée
    #[serde(rename = "COMD")]
    Comd,
}

impl CommuneType {
    /// All types, in ordering-key order
    pub const ORDERING: [CommuneType; 4] = [
        CommuneType::Com,
        CommuneType::Arm,
        CommuneType::Coma,
        CommuneType::Comd,
    ];

    /// Rank given to records without a type; sorts after every known type
    pub const NO_TYPE_RANK: u8 = 4;

    pub fn as_str(&self) -> &'static str {
        match self {
            CommuneType::Com => "COM",
            CommuneType::Arm => "ARM",
            CommuneType::Coma => "COMA",
            CommuneType::Comd => "COMD",
        }
    }

    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for CommuneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommuneType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COM" => Ok(CommuneType::Com),
            "ARM" => Ok(CommuneType::Arm),
            "COMA" => Ok(CommuneType::Coma),
            "COMD" => Ok(CommuneType::Comd),
            other => Err(format!("unknown commune type '{}'", other)),
        }
    }
}

/// Composite sort key `(type rank, code)` of a commune-like record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderingKey {
    pub rank: u8,
    pub code: String,
}

impl OrderingKey {
    pub fn new(commune_type: Option<CommuneType>, code: impl Into<String>) -> Self {
        Self {
            rank: commune_type.map_or(CommuneType::NO_TYPE_RANK, |t| t.rank()),
            code: code.into(),
        }
    }

    /// Build the key from raw `type` and `code` fields; an empty type is "no type"
    pub fn from_fields(commune_type: &str, code: &str) -> Result<Self, String> {
        let parsed = if commune_type.is_empty() {
            None
        } else {
            Some(commune_type.parse::<CommuneType>()?)
        };
        Ok(Self::new(parsed, code))
    }
}
