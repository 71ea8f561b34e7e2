//! Types de données pour le crate geonames

use crate::GeonamesError;

/// Code EPSG des coordonnées geonames (WGS84)
pub const WGS84_EPSG: u32 = 4326;

/// Taille de lot historique
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Un enregistrement geonames (point nommé)
#[derive(Debug, Clone, PartialEq)]
pub struct GeonamesRecord {
    /// Identifiant geonames (token 0 par défaut)
    pub id: String,

    /// Nom affiché (token 1 par défaut)
    pub name: String,

    /// Latitude en degrés décimaux, toujours finie
    pub latitude: f64,

    /// Longitude en degrés décimaux, toujours finie
    pub longitude: f64,
}

/// Position des colonnes utiles dans une ligne
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub id: usize,
    pub name: usize,
    pub longitude: usize,
    pub latitude: usize,
}

impl ColumnLayout {
    /// Disposition historique : id, nom, longitude (4), latitude (5)
    pub const DEFAULT: Self = Self {
        id: 0,
        name: 1,
        longitude: 4,
        latitude: 5,
    };

    /// Disposition des dumps publics geonames : latitude (4), longitude (5)
    pub const GEONAMES_DUMP: Self = Self {
        id: 0,
        name: 1,
        longitude: 5,
        latitude: 4,
    };

    /// Crée une disposition en vérifiant que les colonnes numériques sont distinctes
    pub fn new(
        id: usize,
        name: usize,
        longitude: usize,
        latitude: usize,
    ) -> Result<Self, GeonamesError> {
        if longitude == latitude {
            return Err(GeonamesError::invalid_layout(format!(
                "longitude and latitude share column {}",
                longitude
            )));
        }
        if id == longitude || id == latitude || name == longitude || name == latitude {
            return Err(GeonamesError::invalid_layout(
                "id/name columns overlap a coordinate column",
            ));
        }
        Ok(Self {
            id,
            name,
            longitude,
            latitude,
        })
    }

    /// Nombre minimal de tokens pour qu'une ligne soit exploitable
    pub fn min_tokens(&self) -> usize {
        self.id
            .max(self.name)
            .max(self.longitude)
            .max(self.latitude)
            + 1
    }

    /// Dernier index de colonne utilisé
    pub(crate) fn last_index(&self) -> usize {
        self.min_tokens() - 1
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Compteurs de lecture d'un flux
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Lignes lues (y compris vides)
    pub lines: u64,
    /// Enregistrements émis
    pub records: u64,
    /// Lignes ignorées (tokens manquants ou coordonnées invalides)
    pub skipped: u64,
}
