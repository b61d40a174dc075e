#![allow(dead_code)]

use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

use data_france::config::Config;
use data_france::pipeline::Orchestrator;
use data_france::{Result, RunReport};

pub const POLYGON: &str = "0103000000010000000400000000000000000000000000000000000000000000000000F03F0000000000000000000000000000F03F000000000000F03F00000000000000000000000000000000";

/// Source extracts covering every task, small enough to read in assertions
pub const SOURCES: &[(&str, &str)] = &[
    (
        "cog/regions.csv",
        "REG,CHEFLIEU,TNCC,NCCENR\n84,01053,1,Auvergne-Rhône-Alpes\n",
    ),
    (
        "cog/departements.csv",
        "DEP,REG,CHEFLIEU,TNCC,NCCENR\n01,84,01053,5,Ain\n",
    ),
    (
        "cog/epci.csv",
        "code,type,nom\n200069193,CC,CC de la Dombes\n",
    ),
    (
        "cog/communes.csv",
        "type,code,nom,type_nom,code_departement,commune_parent,epci\n\
         COM,01001,L'Abergement-Clémenciat,5,01,,200069193\n\
         COM,01002,L'Abergement-de-Varey,5,01,,\n\
         COM,01053,Bourg-en-Bresse,0,01,,\n\
         COMD,01003,Amareins,1,01,01001,\n",
    ),
    (
        "admin_express/communes_geometrie.csv",
        "type,code,geometry\n\
         COM,01001,0103000000010000000400000000000000000000000000000000000000000000000000F03F0000000000000000000000000000F03F000000000000F03F00000000000000000000000000000000\n",
    ),
    (
        "insee/communes_population.csv",
        "type,code,population_municipale,population_cap\n\
         COM,01001,767,780\n\
         COM,01053,41365,42090\n",
    ),
    (
        "annuaire_administratif/mairies.csv",
        "type,code,adresse,accessibilite,accessibilite_details,localisation,horaires,email,telephone,site\n\
         COM,01053,Place de l'Hôtel de Ville,ACC,,,,mairie@bourgenbresse.fr,0474455000,\n",
    ),
    (
        "laposte/codes_postaux.csv",
        "Code_commune_INSEE,Nom_commune,Code_postal\n\
         01001,L ABERGEMENT CLEMENCIAT,01400\n\
         01053,BOURG EN BRESSE,01000\n\
         01003,AMAREINS,01090\n",
    ),
    (
        "cog/cantons.csv",
        "code,type,composition,nom,type_nom,departement,bureau_centralisateur\n\
         0101,C,3,Bourg-en-Bresse-1,1,01,01053\n\
         0199,V,,Ain,1,01,\n",
    ),
    (
        "consulaires/circonscriptions_consulaires.csv",
        "nom;consulats;nombre_conseillers\nAllemagne;Berlin/Munich;9\n",
    ),
    (
        "sciences_po/circonscriptions_legislatives.json",
        r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"code_dpt":"01","num_circ":"1"},"geometry":{"type":"Polygon","coordinates":[[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,0.0]]]}}]}"#,
    ),
    (
        "interieur/rne/elus_municipaux.csv",
        "code,nom,prenom,sexe,date_naissance,profession,date_debut_mandat,fonction,ordre_fonction,date_debut_fonction,date_debut_mandat_epci,fonction_epci,date_debut_fonction_epci,nationalite,parrainage2017\n\
         01053,DUPONT,Marie,F,01/04/1962,,28/06/2020,Maire,,28/06/2020,,,,FR,\n",
    ),
    (
        "assemblee_nationale/deputes.csv",
        "code,nom,prenom,sexe,date_naissance,legislature,date_debut_mandat,date_fin_mandat,circonscription\n\
         PA1,Durand,Paul,M,1970-01-01,16,2022-06-22,,01-01\n",
    ),
    ("assemblee_nationale/groupes.csv", "code,nom,sigle\nG1,Renaissance,RE\n"),
    ("assemblee_nationale/partis.csv", "code,nom,sigle\nP1,Parti A,PA\n"),
    (
        "assemblee_nationale/deputes_groupes.csv",
        "code_depute,code,relation,date_fin\nPA1,G1,M,\n",
    ),
    (
        "assemblee_nationale/deputes_partis.csv",
        "code_depute,code,date_fin\nPA1,P1,\n",
    ),
];

/// Scratch data directory with every source extract in place
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::rooted_at(dir.path());
        config.logging.json_file = false;
        let fixture = Self { dir, config };
        for (file_name, content) in SOURCES {
            fixture.write_source(file_name, content);
        }
        fixture
    }

    pub fn write_source(&self, file_name: &str, content: &str) {
        let path = self.config.source_path(file_name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn write_registry(&self, name: &str, content: &str) {
        fs::create_dir_all(&self.config.paths.references_dir).unwrap();
        fs::write(self.config.registry_path(name), content).unwrap();
    }

    pub fn registry(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.config.registry_path(name)).ok()
    }

    pub fn run(&self, tasks: &[&str], force: bool) -> Result<RunReport> {
        let tasks: Vec<String> = tasks.iter().map(|t| t.to_string()).collect();
        Orchestrator::standard(self.config.clone()).run(&tasks, force)
    }

    pub fn output_bytes(&self, table: &str) -> Option<Vec<u8>> {
        fs::read(self.config.output_path(table)).ok()
    }

    pub fn output(&self, table: &str) -> String {
        gunzip(&self.config.output_path(table))
    }

    /// Data rows of an output table, header excluded
    pub fn rows(&self, table: &str) -> Vec<Vec<String>> {
        let content = self.output(table);
        csv::Reader::from_reader(content.as_bytes())
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }
}

pub fn gunzip(path: &Path) -> String {
    let bytes = fs::read(path).unwrap();
    let mut content = String::new();
    GzDecoder::new(&bytes[..]).read_to_string(&mut content).unwrap();
    content
}
