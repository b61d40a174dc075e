/// Token written in output tables for "no value", distinct from an empty string
pub const NULL: &str = r"\N";

/// Default configuration file looked up by the CLI
pub const DEFAULT_CONFIG_FILE: &str = "data_france.toml";

/// Fingerprint manifest kept next to the output tables
pub const FINGERPRINTS_FILE: &str = ".fingerprints.json";

// Task names, also used as output table and registry store names
pub const COMMUNE_IDS_TASK: &str = "commune_ids";
pub const REGIONS: &str = "regions";
pub const DEPARTEMENTS: &str = "departements";
pub const EPCI: &str = "epci";
pub const COMMUNES: &str = "communes";
pub const CODES_POSTAUX: &str = "codes_postaux";
pub const CODES_POSTAUX_COMMUNES: &str = "codes_postaux_communes";
pub const CANTONS: &str = "cantons";
pub const CIRCONSCRIPTIONS_CONSULAIRES: &str = "circonscriptions_consulaires";
pub const CIRCONSCRIPTIONS_LEGISLATIVES: &str = "circonscriptions_legislatives";
pub const ELUS_MUNICIPAUX: &str = "elus_municipaux";
pub const DEPUTES: &str = "deputes";

/// Les Trois Lacs changed INSEE code on 2021-01-01; some registers still carry the old one
pub const TROIS_LACS_OLD_CODE: &str = "27676";
pub const TROIS_LACS_CODE: &str = "27058";

/// Number of constituencies for French residents abroad (99-01 to 99-11)
pub const FRANCAIS_ETRANGER_CIRCONSCRIPTIONS: u32 = 11;

/// Map the Interior ministry's overseas department codes to INSEE codes
pub fn interieur_to_departement(code: &str) -> &str {
    match code {
        "ZA" => "971",
        "ZB" => "972",
        "ZC" => "973",
        "ZD" => "974",
        "ZM" => "976",
        "ZN" => "988",
        "ZP" => "987",
        "ZS" => "975",
        // chosen by the Assemblée nationale for the constituency concerned
        "ZX" => "977",
        "ZW" => "986",
        other => other,
    }
}

/// Rewrite INSEE codes that changed but are still used by some registers
pub fn fix_insee_code(code: &str) -> &str {
    if code == TROIS_LACS_OLD_CODE {
        TROIS_LACS_CODE
    } else {
        code
    }
}
