//! Declarative field-mapping tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered candidate source keys for each target field of a [`GeoPoint`].
///
/// Candidates are tried in order; the first key holding a non-empty value
/// wins.
///
/// [`GeoPoint`]: crate::models::GeoPoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub latitude: Vec<String>,
    pub longitude: Vec<String>,

    /// Display attribute name -> candidate source keys
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl FieldMapping {
    pub fn new<S: AsRef<str>>(latitude: &[S], longitude: &[S]) -> Self {
        Self {
            latitude: to_keys(latitude),
            longitude: to_keys(longitude),
            attributes: BTreeMap::new(),
        }
    }

    /// Add (or replace) a display attribute target
    pub fn with_attribute<S: AsRef<str>>(mut self, target: &str, candidates: &[S]) -> Self {
        self.attributes
            .insert(target.to_string(), to_keys(candidates));
        self
    }

    /// Mapping used by facility datasets that already carry plain
    /// `latitude`/`longitude` columns.
    pub fn facility() -> Self {
        Self::new(&["latitude"], &["longitude"])
            .with_attribute("endereco", &["endereco", "Endereço", "nome"])
            .with_attribute("bairro", &["bairro", "Bairro"])
            .with_attribute("nome", &["nome"])
    }

    /// Mapping used by the housing-project dataset (centroid columns).
    pub fn housing() -> Self {
        Self::new(
            &["Latitude centróide", "latitude"],
            &["Longitude centróide", "longitude"],
        )
        .with_attribute("endereco", &["endereco", "Endereço"])
        .with_attribute("bairro", &["bairro", "Bairro"])
        .with_attribute("processo", &["processo", "Processo"])
        .with_attribute("tipo_de_uso", &["Tipo de uso"])
        .with_attribute("titulo", &["Título do projeto"])
        .with_attribute("construtora", &["Construtora contratada"])
        .with_attribute("status", &["status_enquadramento"])
        .with_attribute("licenca", &["Licença"])
        .with_attribute("data_licenca", &["Data da licença"])
        .with_attribute("habite_se", &["Habite-se"])
    }
}

fn to_keys<S: AsRef<str>>(keys: &[S]) -> Vec<String> {
    keys.iter().map(|k| k.as_ref().to_string()).collect()
}
