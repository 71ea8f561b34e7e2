//! Configuration du système

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use geonames::{ColumnLayout, LineParser, DEFAULT_BATCH_SIZE};

use crate::country::AttributeFields;
use crate::pipeline::{PipelineOptions, DEFAULT_CHANNEL_CAPACITY};

/// Presets embarqués
pub const PRESETS: &[&str] = &["arcgis", "natural-earth"];

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub countries: CountriesConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Source des polygones de pays
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CountriesConfig {
    /// Service HTTP renvoyant une FeatureCollection GeoJSON
    #[serde(default)]
    pub url: Option<String>,

    /// Fichier GeoJSON local (prioritaire sur l'URL)
    #[serde(default)]
    pub path: Option<String>,

    /// Attribut portant l'identifiant du pays
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Attribut portant le nom du pays
    #[serde(default = "default_name_field")]
    pub name_field: String,

    /// Délai maximal du chargement
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Lecture des fichiers geonames
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Séparateur (un caractère ASCII)
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

/// Index (base 0) des colonnes utilisées
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ColumnsConfig {
    pub id: usize,
    pub name: usize,
    pub longitude: usize,
    pub latitude: usize,
}

fn default_id_field() -> String {
    "FID".to_string()
}

fn default_name_field() -> String {
    "COUNTRY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_delimiter() -> String {
    "\t".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            channel_capacity: default_channel_capacity(),
            columns: ColumnsConfig::default(),
            delimiter: default_delimiter(),
        }
    }
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self::from(ColumnLayout::DEFAULT)
    }
}

impl From<ColumnLayout> for ColumnsConfig {
    fn from(layout: ColumnLayout) -> Self {
        Self {
            id: layout.id,
            name: layout.name,
            longitude: layout.longitude,
            latitude: layout.latitude,
        }
    }
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "arcgis" => Self::load_embedded(include_str!("presets/arcgis.json")),
            "natural-earth" => Self::load_embedded(include_str!("presets/natural-earth.json")),
            _ => bail!("Unknown preset: {}. Use: {}", preset, PRESETS.join(", ")),
        }
    }

    /// Preset embarqué ou chemin vers un fichier JSON
    pub fn resolve(name: &str) -> Result<Self> {
        if PRESETS.contains(&name) {
            Self::from_preset(name)
        } else {
            Self::load(Path::new(name))
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Surcharge par les variables d'environnement
    ///
    /// `GEONAMES_COUNTRIES_URL`, `GEONAMES_COUNTRIES_PATH`, `GEONAMES_BATCH_SIZE`
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("GEONAMES_COUNTRIES_URL") {
            self.countries.url = Some(url);
            self.countries.path = None;
        }
        if let Ok(path) = std::env::var("GEONAMES_COUNTRIES_PATH") {
            self.countries.path = Some(path);
        }
        if let Ok(size) = std::env::var("GEONAMES_BATCH_SIZE") {
            self.ingest.batch_size = size
                .parse()
                .context(format!("Invalid GEONAMES_BATCH_SIZE: {}", size))?;
        }
        Ok(())
    }
}

impl CountriesConfig {
    /// Emplacement effectif : chemin local en priorité, sinon URL
    pub fn location(&self) -> Result<&str> {
        match (&self.path, &self.url) {
            (Some(path), _) => Ok(path.as_str()),
            (None, Some(url)) => Ok(url.as_str()),
            (None, None) => bail!("No country source: set countries.url or countries.path"),
        }
    }

    pub fn fields(&self) -> AttributeFields {
        AttributeFields {
            id: self.id_field.clone(),
            name: self.name_field.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl IngestConfig {
    /// Surcharges de la ligne de commande
    pub fn apply_overrides(&mut self, batch_size: Option<usize>, lat_lon: bool) {
        if let Some(size) = batch_size {
            self.batch_size = size;
        }
        if lat_lon {
            self.columns = ColumnsConfig::from(ColumnLayout::GEONAMES_DUMP);
        }
    }

    pub fn layout(&self) -> Result<ColumnLayout> {
        let c = self.columns;
        ColumnLayout::new(c.id, c.name, c.longitude, c.latitude).context("Invalid column layout")
    }

    pub fn parser(&self) -> Result<LineParser> {
        let delimiter = match self.delimiter.as_bytes() {
            [byte] => *byte,
            _ => bail!(
                "Delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            ),
        };
        LineParser::new(self.layout()?, delimiter).context("Invalid delimiter")
    }

    pub fn options(&self) -> Result<PipelineOptions> {
        let Some(batch_size) = NonZeroUsize::new(self.batch_size) else {
            bail!("batch_size must be greater than 0");
        };
        Ok(PipelineOptions {
            batch_size,
            channel_capacity: self.channel_capacity.max(1),
            parser: self.parser()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_parse() {
        for preset in PRESETS {
            let config = Config::from_preset(preset).unwrap();
            assert!(config.countries.url.is_some(), "{}", preset);
            assert_eq!(config.ingest.batch_size, 10_000);
            config.ingest.options().unwrap();
        }
    }

    #[test]
    fn test_arcgis_fields() {
        let config = Config::from_preset("arcgis").unwrap();
        let fields = config.countries.fields();
        assert_eq!(fields.id, "FID");
        assert_eq!(fields.name, "COUNTRY");
        assert_eq!(config.countries.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_unknown_preset() {
        assert!(Config::from_preset("osm").is_err());
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"countries": {"path": "countries.geojson"}}"#).unwrap();
        assert_eq!(config.countries.location().unwrap(), "countries.geojson");
        assert_eq!(config.countries.id_field, "FID");
        assert_eq!(config.ingest.columns.longitude, 4);
        assert_eq!(config.ingest.columns.latitude, 5);
    }

    #[test]
    fn test_path_wins_over_url() {
        let config: Config = serde_json::from_str(
            r#"{"countries": {"url": "https://example.org", "path": "local.geojson"}}"#,
        )
        .unwrap();
        assert_eq!(config.countries.location().unwrap(), "local.geojson");
    }

    #[test]
    fn test_no_location_is_error() {
        let config: Config = serde_json::from_str(r#"{"countries": {}}"#).unwrap();
        assert!(config.countries.location().is_err());
    }

    #[test]
    fn test_custom_layout_reaches_parser() {
        let config: Config = serde_json::from_str(
            r#"{
                "countries": {"path": "countries.geojson"},
                "ingest": {
                    "delimiter": ";",
                    "columns": {"id": 0, "name": 1, "longitude": 2, "latitude": 3}
                }
            }"#,
        )
        .unwrap();

        let mut ingest = config.ingest.clone();
        ingest.apply_overrides(Some(50), false);
        let options = ingest.options().unwrap();
        assert_eq!(options.batch_size.get(), 50);

        let record = options.parser.parse(b"7;Lyon;4.83;45.76\n").unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.longitude, 4.83);
        assert_eq!(record.latitude, 45.76);

        // --lat-lon remplace la disposition, pas le séparateur
        let mut dump = config.ingest;
        dump.apply_overrides(None, true);
        assert_eq!(dump.columns.latitude, 4);
        assert_eq!(dump.delimiter, ";");
    }

    #[test]
    fn test_invalid_ingest_settings() {
        let mut ingest = IngestConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(ingest.options().is_err());

        ingest.batch_size = 10;
        ingest.delimiter = ";;".into();
        assert!(ingest.options().is_err());

        ingest.delimiter = ";".into();
        ingest.columns.latitude = ingest.columns.longitude;
        assert!(ingest.options().is_err());
    }
}
